use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ConfigError;

use super::validate::validate_document;

/// Parsed configuration document.
///
/// Every optional field distinguishes "not provided" (`None`) from an explicit
/// value, so layered merging can tell an empty override from a missing one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformConfig>,
}

impl ConfigDocument {
    /// Validate a raw JSON document and decode it into typed form.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        validate_document(&value)?;
        serde_path_to_error::deserialize(value).map_err(|error| {
            let path = error.path().to_string();
            ConfigError::malformed(path, error.into_inner().to_string())
        })
    }

    pub fn platform(&self, key: &str) -> Option<&PlatformConfig> {
        self.platforms.get(key)
    }

    pub fn platform_keys(&self) -> Vec<String> {
        self.platforms.keys().cloned().collect()
    }
}

/// User configuration for one platform.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub query: Option<BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "present_value")]
    pub body: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metrics: Option<BTreeMap<String, MetricConfig>>,
}

/// Authentication override. Each key merges independently across layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl AuthConfig {
    /// Overlay `upper` on top of `self`, key by key.
    pub fn overlaid_with(&self, upper: Option<&AuthConfig>) -> AuthConfig {
        let Some(upper) = upper else {
            return self.clone();
        };

        AuthConfig {
            kind: upper.kind.clone().or_else(|| self.kind.clone()),
            header_name: upper.header_name.clone().or_else(|| self.header_name.clone()),
            prefix: upper.prefix.clone().or_else(|| self.prefix.clone()),
        }
    }
}

/// One metric (plan, usage, balance, ...) fetched from a platform.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub query: Option<BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "present_value")]
    pub body: Option<Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldConfig>>,
}

/// One value to extract from a metric response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub currency_path: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl FieldConfig {
    pub fn new(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_currency_path(mut self, currency_path: impl Into<String>) -> Self {
        self.currency_path = Some(currency_path.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

/// Keeps an explicit `null` as `Some(Value::Null)`; absence stays `None` via `#[serde(default)]`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Treat empty or whitespace-only strings as unset.
pub(crate) fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|text| text.trim()).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_null_body_is_distinct_from_missing_body() {
        let with_null: MetricConfig =
            serde_json::from_value(json!({ "body": null })).expect("valid metric");
        let without: MetricConfig = serde_json::from_value(json!({})).expect("valid metric");

        assert_eq!(with_null.body, Some(Value::Null));
        assert_eq!(without.body, None);
    }

    #[test]
    fn explicit_empty_headers_are_kept() {
        let metric: MetricConfig =
            serde_json::from_value(json!({ "headers": {} })).expect("valid metric");
        assert_eq!(metric.headers, Some(BTreeMap::new()));
    }

    #[test]
    fn camel_case_keys_decode() {
        let platform: PlatformConfig = serde_json::from_value(json!({
            "apiKey": "sk-test",
            "timeoutMs": 5000,
            "auth": { "type": "header", "headerName": "X-Key", "prefix": "" },
            "metrics": {
                "balance": {
                    "endpoint": "https://example.test/balance",
                    "fields": [{ "key": "balance", "path": "a.b", "currencyPath": "a.c" }]
                }
            }
        }))
        .expect("valid platform");

        assert_eq!(platform.api_key.as_deref(), Some("sk-test"));
        assert_eq!(platform.timeout_ms, Some(5000));
        let auth = platform.auth.expect("auth present");
        assert_eq!(auth.kind.as_deref(), Some("header"));
        assert_eq!(auth.prefix.as_deref(), Some(""));
        let metrics = platform.metrics.expect("metrics present");
        let fields = metrics["balance"].fields.clone().expect("fields present");
        assert_eq!(fields[0].currency_path.as_deref(), Some("a.c"));
    }

    #[test]
    fn type_errors_name_the_offending_key() {
        let error = ConfigDocument::from_value(json!({
            "platforms": {
                "qwen": {
                    "timeoutMs": "15000",
                    "metrics": { "usage": { "endpoint": "https://x.test" } }
                }
            }
        }))
        .expect_err("timeoutMs must be a number");
        assert!(matches!(
            error,
            ConfigError::Malformed { ref path, .. } if path == "platforms.qwen.timeoutMs"
        ));

        let error = ConfigDocument::from_value(json!({
            "platforms": {
                "qwen": {
                    "metrics": { "usage": { "fields": [{ "key": "used", "unit": 5 }] } }
                }
            }
        }))
        .expect_err("unit must be a string");
        assert!(matches!(
            error,
            ConfigError::Malformed { ref path, .. }
                if path == "platforms.qwen.metrics.usage.fields[0].unit"
        ));
    }

    #[test]
    fn auth_overlay_merges_key_by_key() {
        let lower = AuthConfig {
            kind: Some(String::from("bearer")),
            header_name: Some(String::from("Authorization")),
            prefix: None,
        };
        let upper = AuthConfig {
            kind: None,
            header_name: None,
            prefix: Some(String::from("Token ")),
        };

        let merged = lower.overlaid_with(Some(&upper));
        assert_eq!(merged.kind.as_deref(), Some("bearer"));
        assert_eq!(merged.header_name.as_deref(), Some("Authorization"));
        assert_eq!(merged.prefix.as_deref(), Some("Token "));
    }
}
