use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::FetchOptions;
use crate::config::model::non_blank;
use crate::config::{AuthFailure, EffectiveMetric, EffectivePlatform, FieldConfig, MetricConfig};
use crate::i18n::Messages;
use crate::path_expr::{extract, PathExpr};
use crate::result::{FetchError, FetchErrorKind, FieldResult, MetricResult};
use crate::transport::{HttpClient, HttpErrorKind, HttpMethod, HttpRequest};

/// Fetches one metric and extracts its fields.
///
/// Never fails: every problem ends up inside the returned [`MetricResult`].
#[derive(Clone)]
pub struct MetricFetcher {
    client: Arc<dyn HttpClient>,
    options: FetchOptions,
}

impl MetricFetcher {
    pub fn new(client: Arc<dyn HttpClient>, options: FetchOptions) -> Self {
        Self { client, options }
    }

    pub const fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub async fn fetch_metric(
        &self,
        platform: &EffectivePlatform,
        metric_id: &str,
        metric: Option<&MetricConfig>,
    ) -> MetricResult {
        let effective = platform.effective_metric(metric_id, metric);
        self.fetch_effective(&effective).await
    }

    pub async fn fetch_effective(&self, metric: &EffectiveMetric) -> MetricResult {
        let messages = self.options.lang.messages();

        let Some(endpoint) = metric.endpoint.clone() else {
            return self.fail(
                metric,
                FetchError::new(
                    FetchErrorKind::MissingEndpoint,
                    format!("{} {}", messages.missing_endpoint, metric.endpoint_config_path()),
                ),
            );
        };

        let headers = match metric.request_headers() {
            Ok(headers) => headers,
            Err(AuthFailure::MissingApiKey) => {
                return self.fail(
                    metric,
                    FetchError::new(FetchErrorKind::MissingApiKey, messages.no_key),
                )
            }
            Err(AuthFailure::UnknownType(kind)) => {
                return self.fail(
                    metric,
                    FetchError::new(
                        FetchErrorKind::UnknownAuthType,
                        format!(
                            "{}: {kind} (platforms.{}.auth.type)",
                            messages.unknown_auth_type, metric.platform
                        ),
                    ),
                )
            }
        };

        let mut request = HttpRequest::new(HttpMethod::parse(&metric.method), endpoint.clone())
            .with_headers(headers)
            .with_timeout_ms(metric.timeout_ms.unwrap_or(self.options.default_timeout_ms));
        for (name, value) in query_pairs(&metric.query) {
            request = request.with_query(name, value);
        }
        if let Some(body) = &metric.body {
            request = request.with_body(body.clone());
        }

        debug!(
            platform = %metric.platform,
            metric = %metric.id,
            method = %request.method,
            endpoint = %endpoint,
            timeout_ms = request.timeout_ms,
            "fetching metric"
        );

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                let kind = match error.kind() {
                    HttpErrorKind::Timeout => FetchErrorKind::Timeout,
                    HttpErrorKind::ProxyConnect => FetchErrorKind::ProxyTunnel,
                    HttpErrorKind::InvalidUrl => FetchErrorKind::InvalidRequest,
                    _ => FetchErrorKind::Network,
                };
                return self.fail(
                    metric,
                    FetchError::new(
                        kind,
                        format!("{}: {error} ({endpoint})", messages.request_failed),
                    ),
                );
            }
        };

        let raw = self.options.include_raw.then(|| response.data.clone());

        if !response.is_success() {
            let mut result = self.fail(
                metric,
                FetchError::http_status(
                    response.status,
                    format!("{}: {}", messages.http_error, response.status),
                ),
            );
            result.raw = raw;
            return result;
        }

        let mut fields: Vec<(String, FieldResult)> = Vec::with_capacity(metric.fields.len());
        for field in &metric.fields {
            let Some(key) = non_blank(field.key.as_ref()) else {
                continue;
            };
            let result = extract_field(field, metric, &response.data, messages);
            match fields.iter_mut().find(|(existing, _)| existing.as_str() == key) {
                Some(slot) => slot.1 = result,
                None => fields.push((key.to_owned(), result)),
            }
        }

        if fields.is_empty() && !metric.fields.is_empty() {
            let mut result = self.fail(
                metric,
                FetchError::new(
                    FetchErrorKind::FieldKeysMissing,
                    format!(
                        "{}: {}",
                        messages.field_keys_missing,
                        metric.fields_config_path()
                    ),
                ),
            );
            result.raw = raw;
            return result;
        }

        if fields.is_empty() {
            return MetricResult {
                metric: metric.id.clone(),
                name: metric.name.clone(),
                ok: true,
                fields,
                message: Some(messages.fields_not_configured.to_owned()),
                raw,
                error: None,
            };
        }

        let failed = fields.iter().filter(|(_, field)| !field.ok).count();
        let ok = failed < fields.len();
        let message = (failed > 0).then(|| format!("{failed}/{} {}", fields.len(), messages.fields_failed));
        let error = if ok {
            None
        } else {
            fields.iter().find_map(|(_, field)| field.error.clone())
        };
        if failed > 0 {
            warn!(
                platform = %metric.platform,
                metric = %metric.id,
                failed,
                total = fields.len(),
                "some fields could not be extracted"
            );
        }

        MetricResult {
            metric: metric.id.clone(),
            name: metric.name.clone(),
            ok,
            fields,
            message,
            raw,
            error,
        }
    }

    fn fail(&self, metric: &EffectiveMetric, error: FetchError) -> MetricResult {
        warn!(
            platform = %metric.platform,
            metric = %metric.id,
            code = error.code(),
            "metric failed: {}",
            error.message()
        );
        MetricResult::failed(metric.id.clone(), metric.name.clone(), error)
    }
}

fn extract_field(
    field: &FieldConfig,
    metric: &EffectiveMetric,
    data: &Value,
    messages: &Messages,
) -> FieldResult {
    let unit = non_blank(field.unit.as_ref())
        .or_else(|| non_blank(metric.unit.as_ref()))
        .map(str::to_owned);
    let literal_currency = non_blank(field.currency.as_ref())
        .or_else(|| non_blank(metric.currency.as_ref()))
        .map(str::to_owned);

    let Some(path) = non_blank(field.path.as_ref()) else {
        return FieldResult {
            ok: true,
            value: Value::Null,
            unit,
            currency: literal_currency,
            message: Some(messages.path_not_configured.to_owned()),
            error: None,
        };
    };

    let Some(value) = extract(data, path) else {
        return FieldResult {
            ok: false,
            value: Value::Null,
            unit,
            currency: literal_currency,
            message: None,
            error: Some(FetchError::new(
                FetchErrorKind::PathNotFound,
                format!("{}: {path}", messages.path_not_found),
            )),
        };
    };

    let currency = non_blank(field.currency_path.as_ref())
        .and_then(|currency_path| PathExpr::parse(currency_path).evaluate(data))
        .and_then(currency_text)
        .or(literal_currency);

    FieldResult {
        ok: true,
        value,
        unit,
        currency,
        message: None,
        error: None,
    }
}

fn currency_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Flatten a query map into pairs: arrays repeat the key, `null` is skipped,
/// scalars are stringified.
pub fn query_pairs(query: &BTreeMap<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (name, value) in query {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = query_text(item) {
                        pairs.push((name.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = query_text(other) {
                    pairs.push((name.clone(), text));
                }
            }
        }
    }
    pairs
}

fn query_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metric_with_fields(fields: Value) -> EffectiveMetric {
        let platform: crate::config::PlatformConfig = serde_json::from_value(json!({
            "unit": "tokens",
            "metrics": { "m": { "endpoint": "https://x.test", "fields": fields } }
        }))
        .expect("valid platform");
        let effective = crate::config::merge_platform("qwen", &platform);
        effective.effective_metric("m", effective.metrics.get("m"))
    }

    #[test]
    fn query_pairs_repeat_arrays_and_skip_nulls() {
        let query: BTreeMap<String, Value> = serde_json::from_value(json!({
            "ids": [1, "b", null],
            "skip": null,
            "flag": true,
            "page": 2
        }))
        .expect("valid query");

        assert_eq!(
            query_pairs(&query),
            vec![
                (String::from("flag"), String::from("true")),
                (String::from("ids"), String::from("1")),
                (String::from("ids"), String::from("b")),
                (String::from("page"), String::from("2")),
            ]
        );
    }

    #[test]
    fn field_unit_overrides_metric_unit() {
        let metric = metric_with_fields(json!([
            { "key": "a", "path": "a", "unit": "calls" },
            { "key": "b", "path": "b" }
        ]));
        let data = json!({ "a": 1, "b": 2 });
        let messages = crate::i18n::Lang::En.messages();

        let a = extract_field(&metric.fields[0], &metric, &data, messages);
        let b = extract_field(&metric.fields[1], &metric, &data, messages);
        assert_eq!(a.unit.as_deref(), Some("calls"));
        assert_eq!(b.unit.as_deref(), Some("tokens"));
    }

    #[test]
    fn currency_path_beats_literal_and_falls_back_when_missing() {
        let metric = metric_with_fields(json!([
            { "key": "a", "path": "amount", "currencyPath": "cur", "currency": "USD" },
            { "key": "b", "path": "amount", "currencyPath": "missing", "currency": "USD" }
        ]));
        let data = json!({ "amount": "3.5", "cur": "CNY" });
        let messages = crate::i18n::Lang::En.messages();

        let a = extract_field(&metric.fields[0], &metric, &data, messages);
        let b = extract_field(&metric.fields[1], &metric, &data, messages);
        assert_eq!(a.value, json!(3.5));
        assert_eq!(a.currency.as_deref(), Some("CNY"));
        assert_eq!(b.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn unconfigured_path_is_informational_but_missing_path_fails() {
        let metric = metric_with_fields(json!([
            { "key": "a" },
            { "key": "b", "path": "nope" }
        ]));
        let data = json!({});
        let messages = crate::i18n::Lang::En.messages();

        let a = extract_field(&metric.fields[0], &metric, &data, messages);
        let b = extract_field(&metric.fields[1], &metric, &data, messages);
        assert!(a.ok);
        assert_eq!(a.message.as_deref(), Some(messages.path_not_configured));
        assert!(!b.ok);
        assert_eq!(
            b.error.as_ref().map(FetchError::kind),
            Some(FetchErrorKind::PathNotFound)
        );
    }
}
