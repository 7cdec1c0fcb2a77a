use serde_json::{Map, Value};

use crate::error::ConfigError;

use super::defaults::has_builtin_metrics;

/// Platform-level keys from the single-endpoint schema, with their replacement.
const LEGACY_PLATFORM_KEYS: [(&str, &str); 5] = [
    ("balanceEndpoint", "metrics.balance.endpoint"),
    ("balancePath", "metrics.balance.fields[0].path"),
    ("currencyPath", "metrics.balance.fields[0].currencyPath"),
    ("usageEndpoint", "metrics.usage.endpoint"),
    ("planEndpoint", "metrics.plan.endpoint"),
];

const LEGACY_METRIC_KEYS: [(&str, &str); 5] = [
    ("balanceEndpoint", "endpoint"),
    ("url", "endpoint"),
    ("balancePath", "fields[0].path"),
    ("path", "fields[0].path"),
    ("currencyPath", "fields[0].currencyPath"),
];

const LEGACY_FIELD_KEYS: [(&str, &str); 3] = [
    ("balancePath", "path"),
    ("jsonPath", "path"),
    ("currency_path", "currencyPath"),
];

/// Reject documents that are malformed or still use a retired schema.
///
/// Runs on the raw JSON value so deprecated keys that the typed model would
/// silently ignore are still caught.
pub fn validate_document(document: &Value) -> Result<(), ConfigError> {
    let Some(root) = document.as_object() else {
        return Err(ConfigError::malformed("$", "expected a JSON object"));
    };

    let platforms = match root.get("platforms") {
        Some(Value::Object(platforms)) => platforms,
        Some(_) => {
            return Err(ConfigError::malformed(
                "platforms",
                "expected an object keyed by platform",
            ))
        }
        None => {
            return Err(ConfigError::malformed(
                "platforms",
                "missing; declare at least one platform",
            ))
        }
    };

    for (key, entry) in platforms {
        validate_platform(key, entry)?;
    }

    Ok(())
}

fn validate_platform(key: &str, entry: &Value) -> Result<(), ConfigError> {
    let base = format!("platforms.{key}");
    let Some(platform) = entry.as_object() else {
        return Err(ConfigError::malformed(base, "expected an object"));
    };

    reject_legacy_keys(platform, &base, &LEGACY_PLATFORM_KEYS)?;

    let metrics_path = format!("{base}.metrics");
    match platform.get("metrics") {
        None | Some(Value::Null) => {
            if has_builtin_metrics(key) {
                Ok(())
            } else {
                Err(ConfigError::MetricsMissing { path: metrics_path })
            }
        }
        Some(Value::Object(metrics)) if metrics.is_empty() => {
            Err(ConfigError::MetricsEmpty { path: metrics_path })
        }
        Some(Value::Object(metrics)) => {
            for (metric_id, metric) in metrics {
                validate_metric(&format!("{metrics_path}.{metric_id}"), metric)?;
            }
            Ok(())
        }
        Some(_) => Err(ConfigError::malformed(
            metrics_path,
            "expected an object keyed by metric id",
        )),
    }
}

fn validate_metric(base: &str, entry: &Value) -> Result<(), ConfigError> {
    let Some(metric) = entry.as_object() else {
        return Err(ConfigError::malformed(base, "expected an object"));
    };

    reject_legacy_keys(metric, base, &LEGACY_METRIC_KEYS)?;

    match metric.get("fields") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Array(fields)) => {
            for (index, field) in fields.iter().enumerate() {
                let path = format!("{base}.fields[{index}]");
                let Some(field) = field.as_object() else {
                    return Err(ConfigError::malformed(path, "expected an object"));
                };
                reject_legacy_keys(field, &path, &LEGACY_FIELD_KEYS)?;
            }
            Ok(())
        }
        Some(_) => Err(ConfigError::malformed(
            format!("{base}.fields"),
            "expected an array of field definitions",
        )),
    }
}

fn reject_legacy_keys(
    object: &Map<String, Value>,
    base: &str,
    legacy: &[(&str, &str)],
) -> Result<(), ConfigError> {
    match legacy
        .iter()
        .find(|(legacy_key, _)| object.contains_key(*legacy_key))
    {
        Some((legacy_key, replacement)) => Err(ConfigError::legacy_key(
            format!("{base}.{legacy_key}"),
            format!("{base}.{replacement}"),
        )),
        None => Ok(()),
    }
}
