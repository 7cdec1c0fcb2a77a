//! # AI Balance Core
//!
//! Configuration-driven engine that queries AI provider APIs for account
//! metrics (plan, usage, balance) and extracts values from arbitrary JSON
//! responses without per-provider code.
//!
//! ## Overview
//!
//! - **Layered configuration**: built-in defaults, platform, metric and field
//!   settings merged into one effective config per fetch
//! - **Schema validation** that rejects retired config shapes with the exact
//!   key path to migrate
//! - **Path expressions** (`a.b[0].c`) for pulling values out of responses
//! - **Proxy-aware transport**: direct, HTTP relay, or HTTPS CONNECT tunnel,
//!   driven by the usual proxy environment variables
//! - **Result tree** where every field, metric and platform records its own
//!   outcome instead of aborting the run
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Document model, validator, defaults, merger, loader |
//! | [`error`] | Fatal configuration errors |
//! | [`fetch`] | Metric fetcher and platform aggregator |
//! | [`i18n`] | zh/en message tables |
//! | [`path_expr`] | Path tokenizer and evaluator |
//! | [`proxy`] | Proxy selection and no-proxy matching |
//! | [`result`] | Field/metric/platform results and tagged fetch errors |
//! | [`transport`] | `HttpClient` seam and the production client |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ai_balance_core::{
//!     load_config, EnvSnapshot, FetchOptions, Lang, PlatformFetcher, ProxyAwareHttpClient,
//!     select_platforms,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let env = EnvSnapshot::from_process();
//!     let loaded = load_config(None, &env)?;
//!     let client = Arc::new(ProxyAwareHttpClient::from_env(&env)?);
//!     let options = FetchOptions::from_env(&env, Lang::En);
//!
//!     let selection = select_platforms(&loaded.document, None, false);
//!     let report = PlatformFetcher::new(client, options)
//!         .check(&loaded.document, &selection.run)
//!         .await;
//!
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod i18n;
pub mod path_expr;
pub mod proxy;
pub mod result;
pub mod transport;

pub use config::{
    load_config, merge_platform, parse_config_str, AuthConfig, ConfigDocument, EffectiveMetric,
    EffectivePlatform, EnvSnapshot, FieldConfig, LoadedConfig, MetricConfig, PlatformConfig,
    DEFAULT_TIMEOUT_MS, KNOWN_PLATFORMS,
};
pub use error::{ConfigError, CoreError};
pub use fetch::{
    order_metric_ids, select_platforms, FetchOptions, MetricFetcher, PlatformFetcher,
    PlatformSelection,
};
pub use i18n::Lang;
pub use path_expr::{extract, PathExpr, PathToken};
pub use proxy::{NoProxy, ProxyEndpoint, ProxyResolver, ProxyRoute};
pub use result::{
    BalanceSummary, CheckReport, ErrorCategory, FetchError, FetchErrorKind, FieldResult, MetricResult,
    PlatformResult,
};
pub use transport::{
    parse_body, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    Ipv4FirstResolver, ProxyAwareHttpClient,
};
