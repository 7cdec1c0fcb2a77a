use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use super::{FetchOptions, MetricFetcher};
use crate::config::{merge_platform, ConfigDocument, EffectivePlatform};
use crate::result::{BalanceSummary, CheckReport, FetchError, FetchErrorKind, PlatformResult};
use crate::transport::HttpClient;

const METRIC_PRIORITY: [&str; 3] = ["plan", "usage", "balance"];
const LEGACY_METRIC: &str = "balance";
const LEGACY_FIELD: &str = "balance";

/// `plan`, `usage`, `balance` first, then the remaining ids alphabetically.
pub fn order_metric_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
    ids.sort_by(|left, right| {
        let rank = |id: &str| {
            METRIC_PRIORITY
                .iter()
                .position(|known| *known == id)
                .unwrap_or(METRIC_PRIORITY.len())
        };
        rank(left.as_str()).cmp(&rank(right.as_str())).then_with(|| left.cmp(right))
    });
    ids.dedup();
    ids
}

/// Which platforms a run covers and which were left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformSelection {
    pub run: Vec<String>,
    pub skipped: Vec<String>,
}

/// Pick the platforms to check.
///
/// An explicit `requested` key is always run, even when the document lacks it.
/// Otherwise platforms without any resolvable endpoint are skipped unless
/// `include_unconfigured` is set or skipping would leave nothing to run.
pub fn select_platforms(
    document: &ConfigDocument,
    requested: Option<&str>,
    include_unconfigured: bool,
) -> PlatformSelection {
    if let Some(requested) = requested.map(str::trim).filter(|key| !key.is_empty()) {
        return PlatformSelection {
            run: vec![requested.to_ascii_lowercase()],
            skipped: Vec::new(),
        };
    }

    let keys = document.platform_keys();
    if include_unconfigured {
        return PlatformSelection {
            run: keys,
            skipped: Vec::new(),
        };
    }

    let (run, skipped): (Vec<String>, Vec<String>) = keys.into_iter().partition(|key| {
        document
            .platform(key)
            .is_some_and(|platform| merge_platform(key, platform).has_any_endpoint())
    });

    if run.is_empty() {
        PlatformSelection {
            run: skipped,
            skipped: Vec::new(),
        }
    } else {
        PlatformSelection { run, skipped }
    }
}

/// Runs every metric of a platform and collates the results.
#[derive(Clone)]
pub struct PlatformFetcher {
    metrics: MetricFetcher,
}

impl PlatformFetcher {
    pub fn new(client: Arc<dyn HttpClient>, options: FetchOptions) -> Self {
        Self {
            metrics: MetricFetcher::new(client, options),
        }
    }

    pub fn from_metric_fetcher(metrics: MetricFetcher) -> Self {
        Self { metrics }
    }

    pub const fn options(&self) -> &FetchOptions {
        self.metrics.options()
    }

    /// Fetch platform `key` from `document`.
    pub async fn fetch_platform(&self, document: &ConfigDocument, key: &str) -> PlatformResult {
        let Some(platform) = document.platform(key) else {
            let messages = self.options().lang.messages();
            return PlatformResult::failed(
                key,
                key,
                FetchError::new(
                    FetchErrorKind::PlatformNotFound,
                    format!("{}: {key}", messages.platform_not_found),
                ),
            );
        };

        let effective = merge_platform(key, platform);
        self.fetch_effective(&effective).await
    }

    /// Fetch every metric of an already merged platform, strictly in order.
    pub async fn fetch_effective(&self, platform: &EffectivePlatform) -> PlatformResult {
        let ids = order_metric_ids(platform.metric_ids());
        if ids.is_empty() {
            let messages = self.options().lang.messages();
            return PlatformResult::failed(
                platform.key.clone(),
                platform.name.clone(),
                FetchError::new(
                    FetchErrorKind::MissingMetrics,
                    format!("{} platforms.{}.metrics", messages.missing_metrics, platform.key),
                ),
            );
        }

        let mut metrics = Vec::with_capacity(ids.len());
        for id in &ids {
            let result = self
                .metrics
                .fetch_metric(platform, id, platform.metrics.get(id))
                .await;
            metrics.push(result);
        }

        let ok = metrics.iter().any(|metric| metric.ok);
        let error = if ok {
            None
        } else {
            metrics.iter().find_map(|metric| metric.error.clone())
        };

        let mut result = PlatformResult {
            platform: platform.key.clone(),
            name: platform.name.clone(),
            ok,
            metrics,
            summary: None,
            error,
        };
        promote_legacy_balance(&mut result);
        debug!(platform = %platform.key, ok, "platform checked");
        result
    }

    /// Check each of `keys` in turn and stamp the report.
    pub async fn check(&self, document: &ConfigDocument, keys: &[String]) -> CheckReport {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.fetch_platform(document, key).await);
        }

        CheckReport {
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            language: self.options().lang,
            results,
        }
    }
}

/// Mirror the `balance.balance` field at the platform's top level; a failed
/// field leaves `null`s there.
fn promote_legacy_balance(result: &mut PlatformResult) {
    result.summary = result
        .metric(LEGACY_METRIC)
        .and_then(|metric| metric.field(LEGACY_FIELD))
        .map(|field| {
            if field.ok {
                BalanceSummary {
                    value: field.value.clone(),
                    unit: field.unit.clone(),
                    currency: field.currency.clone(),
                }
            } else {
                BalanceSummary::default()
            }
        });
}
