use std::fmt::{Display, Formatter};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::CoreError;
use crate::i18n::Lang;

/// Broad failure family, used by callers that only care about severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Auth,
    Network,
    HttpStatus,
    Extraction,
}

/// Machine-readable reason a platform, metric or field did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    MissingEndpoint,
    MissingMetrics,
    MissingApiKey,
    UnknownAuthType,
    InvalidRequest,
    Network,
    Timeout,
    ProxyTunnel,
    HttpStatus,
    PathNotFound,
    FieldKeysMissing,
    PlatformNotFound,
}

impl FetchErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingEndpoint => "missing_endpoint",
            Self::MissingMetrics => "missing_metrics",
            Self::MissingApiKey => "missing_api_key",
            Self::UnknownAuthType => "unknown_auth_type",
            Self::InvalidRequest => "invalid_request",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::ProxyTunnel => "proxy_tunnel",
            Self::HttpStatus => "http_status",
            Self::PathNotFound => "path_not_found",
            Self::FieldKeysMissing => "field_keys_missing",
            Self::PlatformNotFound => "platform_not_found",
        }
    }

    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::MissingEndpoint
            | Self::MissingMetrics
            | Self::InvalidRequest
            | Self::FieldKeysMissing
            | Self::PlatformNotFound => ErrorCategory::Configuration,
            Self::MissingApiKey | Self::UnknownAuthType => ErrorCategory::Auth,
            Self::Network | Self::Timeout | Self::ProxyTunnel => ErrorCategory::Network,
            Self::HttpStatus => ErrorCategory::HttpStatus,
            Self::PathNotFound => ErrorCategory::Extraction,
        }
    }
}

/// Scoped failure recorded in the result tree instead of being raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchError {
    #[serde(rename = "code")]
    kind: FetchErrorKind,
    #[serde(rename = "error")]
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::HttpStatus,
            message: message.into(),
            status: Some(status),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

/// Outcome of extracting one field from a metric response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult {
    pub ok: bool,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub error: Option<FetchError>,
}

/// Outcome of fetching one metric of a platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ok: bool,
    #[serde(serialize_with = "serialize_fields")]
    pub fields: Vec<(String, FieldResult)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(flatten)]
    pub error: Option<FetchError>,
}

impl MetricResult {
    pub fn failed(metric: impl Into<String>, name: Option<String>, error: FetchError) -> Self {
        Self {
            metric: metric.into(),
            name,
            ok: false,
            fields: Vec::new(),
            message: None,
            raw: None,
            error: Some(error),
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldResult> {
        self.fields
            .iter()
            .find_map(|(field_key, field)| (field_key == key).then_some(field))
    }
}

/// Outcome of every metric of one platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformResult {
    pub platform: String,
    pub name: String,
    pub ok: bool,
    #[serde(serialize_with = "serialize_metrics")]
    pub metrics: Vec<MetricResult>,
    /// Top-level `value`/`unit`/`currency`, present whenever the platform
    /// produced a `balance.balance` field.
    #[serde(flatten)]
    pub summary: Option<BalanceSummary>,
    #[serde(flatten)]
    pub error: Option<FetchError>,
}

/// Copy of the `balance.balance` field for consumers of the single-value
/// report. All three keys are `null` when that field failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceSummary {
    pub value: Value,
    pub unit: Option<String>,
    pub currency: Option<String>,
}

impl PlatformResult {
    pub fn failed(platform: impl Into<String>, name: impl Into<String>, error: FetchError) -> Self {
        Self {
            platform: platform.into(),
            name: name.into(),
            ok: false,
            metrics: Vec::new(),
            summary: None,
            error: Some(error),
        }
    }

    pub fn metric(&self, id: &str) -> Option<&MetricResult> {
        self.metrics.iter().find(|metric| metric.metric == id)
    }
}

/// Everything one check run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub timestamp: String,
    pub language: Lang,
    pub results: Vec<PlatformResult>,
}

impl CheckReport {
    /// True when something ran and every platform failed.
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|result| !result.ok)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, CoreError> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }
}

fn serialize_fields<S>(fields: &[(String, FieldResult)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (key, field) in fields {
        map.serialize_entry(key, field)?;
    }
    map.end()
}

fn serialize_metrics<S>(metrics: &[MetricResult], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(metrics.len()))?;
    for metric in metrics {
        map.serialize_entry(&metric.metric, metric)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_serializes_as_code_and_message() {
        let result = MetricResult::failed(
            "usage",
            None,
            FetchError::new(FetchErrorKind::MissingEndpoint, "set platforms.qwen.metrics.usage.endpoint"),
        );

        let value = serde_json::to_value(&result).expect("serializes");
        assert_eq!(value["code"], json!("missing_endpoint"));
        assert_eq!(value["error"], json!("set platforms.qwen.metrics.usage.endpoint"));
        assert_eq!(value["ok"], json!(false));
        assert!(value.get("raw").is_none());
    }

    #[test]
    fn metrics_serialize_as_map_in_run_order() {
        let ok_field = FieldResult {
            ok: true,
            value: json!(1),
            unit: None,
            currency: None,
            message: None,
            error: None,
        };
        let metric = |id: &str| MetricResult {
            metric: id.to_owned(),
            name: None,
            ok: true,
            fields: vec![(String::from("used"), ok_field.clone())],
            message: None,
            raw: None,
            error: None,
        };
        let platform = PlatformResult {
            platform: String::from("qwen"),
            name: String::from("Qwen"),
            ok: true,
            metrics: vec![metric("usage"), metric("balance")],
            summary: None,
            error: None,
        };

        let text = serde_json::to_string(&platform).expect("serializes");
        let usage_at = text.find("\"usage\"").expect("usage key");
        let balance_at = text.find("\"balance\"").expect("balance key");
        assert!(usage_at < balance_at);

        let value: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["metrics"]["usage"]["fields"]["used"]["value"], json!(1));
        assert!(value.get("code").is_none());
    }

    #[test]
    fn http_status_error_carries_status() {
        let error = FetchError::http_status(503, "HTTP error: 503");
        assert_eq!(error.status(), Some(503));
        assert_eq!(error.category(), ErrorCategory::HttpStatus);
        assert_eq!(error.code(), "http_status");
    }

    #[test]
    fn all_failed_requires_at_least_one_result() {
        let empty = CheckReport {
            timestamp: String::new(),
            language: Lang::En,
            results: Vec::new(),
        };
        assert!(!empty.all_failed());

        let text = empty.to_json(false).expect("serializes");
        assert_eq!(text, r#"{"timestamp":"","language":"en","results":[]}"#);
    }
}
