use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::defaults::{builtin_metric, builtin_platform};
use super::model::{non_blank, AuthConfig, FieldConfig, MetricConfig, PlatformConfig};

const AUTHORIZATION: &str = "authorization";
const API_KEY_HEADER: &str = "x-api-key";
const ACCEPT: &str = "accept";

/// How a secret is attached to outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    None,
    Bearer,
    Header,
}

impl AuthKind {
    /// Parse the configured auth type. Unset means bearer.
    pub fn parse(raw: Option<&str>) -> Result<Self, AuthFailure> {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(Self::Bearer);
        };

        match raw.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "bearer" => Ok(Self::Bearer),
            "header" => Ok(Self::Header),
            _ => Err(AuthFailure::UnknownType(raw.to_owned())),
        }
    }
}

/// Why auth headers could not be built for a metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    MissingApiKey,
    UnknownType(String),
}

/// Platform configuration after built-in defaults and the user's platform
/// entry have been layered together.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePlatform {
    pub key: String,
    pub name: String,
    pub api_key: Option<String>,
    pub auth: AuthConfig,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, Value>,
    pub body: Option<Value>,
    pub method: Option<String>,
    pub timeout_ms: Option<u64>,
    pub unit: Option<String>,
    pub currency: Option<String>,
    pub metrics: BTreeMap<String, MetricConfig>,
}

/// Fully resolved configuration for a single metric fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveMetric {
    pub platform: String,
    pub id: String,
    pub name: Option<String>,
    pub endpoint: Option<String>,
    pub method: String,
    pub api_key: Option<String>,
    pub auth: AuthConfig,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, Value>,
    pub body: Option<Value>,
    pub timeout_ms: Option<u64>,
    pub unit: Option<String>,
    pub currency: Option<String>,
    pub fields: Vec<FieldConfig>,
}

/// Layer built-in defaults and the user's entry for platform `key`.
pub fn merge_platform(key: &str, user: &PlatformConfig) -> EffectivePlatform {
    let defaults = builtin_platform(key).unwrap_or_default();

    let name = non_blank(user.name.as_ref())
        .or_else(|| non_blank(defaults.name.as_ref()))
        .unwrap_or(key)
        .to_owned();

    let auth = defaults
        .auth
        .clone()
        .unwrap_or_default()
        .overlaid_with(user.auth.as_ref());

    let mut headers = BTreeMap::new();
    overlay_headers(&mut headers, defaults.headers.as_ref());
    overlay_headers(&mut headers, user.headers.as_ref());

    let mut query = BTreeMap::new();
    overlay_query(&mut query, defaults.query.as_ref());
    overlay_query(&mut query, user.query.as_ref());

    let metrics = match &user.metrics {
        Some(metrics) => metrics.clone(),
        None => defaults.metrics.clone().unwrap_or_default(),
    };

    EffectivePlatform {
        key: key.to_owned(),
        name,
        api_key: non_blank(user.api_key.as_ref()).map(str::to_owned),
        auth,
        headers,
        query,
        body: user.body.clone().or_else(|| defaults.body.clone()),
        method: first_non_blank([user.method.as_ref(), defaults.method.as_ref()]),
        timeout_ms: user.timeout_ms.or(defaults.timeout_ms),
        unit: first_non_blank([user.unit.as_ref(), defaults.unit.as_ref()]),
        currency: first_non_blank([user.currency.as_ref(), defaults.currency.as_ref()]),
        metrics,
    }
}

impl EffectivePlatform {
    pub fn metric_ids(&self) -> Vec<String> {
        self.metrics.keys().cloned().collect()
    }

    /// Resolve metric `id`: this platform, then the built-in skeleton for
    /// `id`, then the user's metric entry.
    pub fn effective_metric(&self, id: &str, user: Option<&MetricConfig>) -> EffectiveMetric {
        let skeleton = builtin_metric(&self.key, id).unwrap_or_default();
        let user = user.cloned().unwrap_or_default();

        let auth = self
            .auth
            .overlaid_with(skeleton.auth.as_ref())
            .overlaid_with(user.auth.as_ref());

        let mut headers = self.headers.clone();
        overlay_headers(&mut headers, skeleton.headers.as_ref());
        overlay_headers(&mut headers, user.headers.as_ref());

        let mut query = self.query.clone();
        overlay_query(&mut query, skeleton.query.as_ref());
        overlay_query(&mut query, user.query.as_ref());

        let method = first_non_blank([
            user.method.as_ref(),
            skeleton.method.as_ref(),
            self.method.as_ref(),
        ])
        .map_or_else(|| String::from("GET"), |method| method.to_ascii_uppercase());

        let fields = user
            .fields
            .clone()
            .or_else(|| skeleton.fields.clone())
            .unwrap_or_default();

        let endpoint = first_non_blank([user.endpoint.as_ref(), skeleton.endpoint.as_ref()]);
        debug!(
            platform = %self.key,
            metric = id,
            method = %method,
            has_endpoint = endpoint.is_some(),
            field_count = fields.len(),
            "merged metric config"
        );

        EffectiveMetric {
            platform: self.key.clone(),
            id: id.to_owned(),
            name: first_non_blank([user.name.as_ref(), skeleton.name.as_ref()]),
            endpoint,
            method,
            api_key: self.api_key.clone(),
            auth,
            headers,
            query,
            body: user.body.or(skeleton.body).or_else(|| self.body.clone()),
            timeout_ms: user.timeout_ms.or(skeleton.timeout_ms).or(self.timeout_ms),
            unit: first_non_blank([
                user.unit.as_ref(),
                skeleton.unit.as_ref(),
                self.unit.as_ref(),
            ]),
            currency: first_non_blank([
                user.currency.as_ref(),
                skeleton.currency.as_ref(),
                self.currency.as_ref(),
            ]),
            fields,
        }
    }

    /// Whether any metric of this platform resolves to an endpoint.
    pub fn has_any_endpoint(&self) -> bool {
        self.metrics
            .iter()
            .any(|(id, metric)| self.effective_metric(id, Some(metric)).endpoint.is_some())
    }
}

impl EffectiveMetric {
    /// Dotted config path the user fills in to give this metric an endpoint.
    pub fn endpoint_config_path(&self) -> String {
        format!("platforms.{}.metrics.{}.endpoint", self.platform, self.id)
    }

    pub fn fields_config_path(&self) -> String {
        format!("platforms.{}.metrics.{}.fields", self.platform, self.id)
    }

    /// Request headers: configured headers, then synthesized auth and
    /// `Accept`, neither of which replaces a header that is already set.
    pub fn request_headers(&self) -> Result<BTreeMap<String, String>, AuthFailure> {
        let mut headers = self.headers.clone();

        match AuthKind::parse(self.auth.kind.as_deref())? {
            AuthKind::None => {}
            kind => {
                let Some(secret) = self.api_key.as_deref() else {
                    return Err(AuthFailure::MissingApiKey);
                };
                let (default_name, default_prefix) = match kind {
                    AuthKind::Header => (API_KEY_HEADER, ""),
                    _ => (AUTHORIZATION, "Bearer "),
                };
                let name = non_blank(self.auth.header_name.as_ref())
                    .map_or_else(|| String::from(default_name), str::to_ascii_lowercase);
                let prefix = self.auth.prefix.as_deref().unwrap_or(default_prefix);

                headers
                    .entry(name)
                    .or_insert_with(|| format!("{prefix}{secret}"));
            }
        }

        headers
            .entry(String::from(ACCEPT))
            .or_insert_with(|| String::from("application/json"));

        Ok(headers)
    }
}

fn overlay_headers(target: &mut BTreeMap<String, String>, layer: Option<&BTreeMap<String, String>>) {
    if let Some(layer) = layer {
        for (name, value) in layer {
            target.insert(name.trim().to_ascii_lowercase(), value.clone());
        }
    }
}

fn overlay_query(target: &mut BTreeMap<String, Value>, layer: Option<&BTreeMap<String, Value>>) {
    if let Some(layer) = layer {
        for (name, value) in layer {
            target.insert(name.clone(), value.clone());
        }
    }
}

fn first_non_blank<const N: usize>(candidates: [Option<&String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .find_map(non_blank)
        .map(str::to_owned)
}
