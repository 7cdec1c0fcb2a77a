//! Fetch orchestration: one metric at a time, one platform at a time.

mod metric;
mod platform;

use crate::config::{EnvSnapshot, DEFAULT_TIMEOUT_MS};
use crate::i18n::Lang;

pub use metric::{query_pairs, MetricFetcher};
pub use platform::{order_metric_ids, select_platforms, PlatformFetcher, PlatformSelection};

/// Knobs shared by every fetch in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub lang: Lang,
    pub include_raw: bool,
    /// Used when neither the metric nor its platform sets `timeoutMs`.
    pub default_timeout_ms: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            lang: Lang::default(),
            include_raw: false,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl FetchOptions {
    pub fn from_env(env: &EnvSnapshot, lang: Lang) -> Self {
        Self {
            lang,
            include_raw: false,
            default_timeout_ms: env.timeout_ms().unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_lang(mut self, lang: Lang) -> Self {
        self.lang = lang;
        self
    }

    pub fn with_raw(mut self, include_raw: bool) -> Self {
        self.include_raw = include_raw;
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }
}
