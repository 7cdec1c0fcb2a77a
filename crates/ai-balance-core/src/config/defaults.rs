use std::collections::BTreeMap;

use super::model::{AuthConfig, FieldConfig, MetricConfig, PlatformConfig};

/// Request timeout used when no layer or environment variable sets one.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Platforms listed in help text and used to seed a starter config.
pub const KNOWN_PLATFORMS: [&str; 6] = ["qwen", "doubao", "kimi", "deepseek", "minimax", "zhipu"];

/// Built-in platform layer, if `key` has one.
pub fn builtin_platform(key: &str) -> Option<PlatformConfig> {
    match key {
        "deepseek" => Some(PlatformConfig {
            name: Some(String::from("DeepSeek")),
            auth: Some(bearer()),
            metrics: Some(single_metric(
                "balance",
                "https://api.deepseek.com/user/balance",
                FieldConfig::new("balance", "balance_infos[0].total_balance")
                    .with_currency_path("balance_infos[0].currency"),
            )),
            ..PlatformConfig::default()
        }),
        "kimi" => Some(PlatformConfig {
            name: Some(String::from("Moonshot AI (Kimi)")),
            auth: Some(bearer()),
            metrics: Some(single_metric(
                "balance",
                "https://api.moonshot.cn/v1/users/me/balance",
                FieldConfig::new("balance", "data.available_balance").with_currency("CNY"),
            )),
            ..PlatformConfig::default()
        }),
        "zhipu" => Some(PlatformConfig {
            name: Some(String::from("智谱AI (ZAI)")),
            auth: Some(bearer()),
            ..PlatformConfig::default()
        }),
        _ => None,
    }
}

/// Built-in metric skeleton for `metric_id` on platform `key`.
pub fn builtin_metric(key: &str, metric_id: &str) -> Option<MetricConfig> {
    builtin_platform(key)
        .and_then(|platform| platform.metrics)
        .and_then(|mut metrics| metrics.remove(metric_id))
}

/// Whether `key` may omit `metrics` and fall back to a built-in skeleton.
pub fn has_builtin_metrics(key: &str) -> bool {
    builtin_platform(key)
        .and_then(|platform| platform.metrics)
        .is_some_and(|metrics| !metrics.is_empty())
}

/// Environment variables that override the API key of `key`, highest priority first.
pub fn api_key_env_names(key: &str) -> Vec<String> {
    let generic = format!(
        "AI_BALANCE_{}_API_KEY",
        key.to_ascii_uppercase().replace('-', "_")
    );
    let aliases: &[&str] = match key {
        "deepseek" => &["DEEPSEEK_API_KEY"],
        "qwen" => &["DASHSCOPE_API_KEY", "QWEN_API_KEY"],
        "kimi" => &["KIMI_API_KEY", "MOONSHOT_API_KEY"],
        "zhipu" => &["ZHIPU_API_KEY", "BIGMODEL_API_KEY"],
        "minimax" => &["MINIMAX_API_KEY"],
        "doubao" => &["DOUBAO_API_KEY"],
        _ => &[],
    };

    std::iter::once(generic)
        .chain(aliases.iter().map(|alias| (*alias).to_owned()))
        .collect()
}

fn bearer() -> AuthConfig {
    AuthConfig {
        kind: Some(String::from("bearer")),
        ..AuthConfig::default()
    }
}

fn single_metric(id: &str, endpoint: &str, field: FieldConfig) -> BTreeMap<String, MetricConfig> {
    let metric = MetricConfig {
        endpoint: Some(endpoint.to_owned()),
        fields: Some(vec![field]),
        ..MetricConfig::default()
    };
    BTreeMap::from([(id.to_owned(), metric)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deepseek_has_balance_skeleton() {
        let metric = builtin_metric("deepseek", "balance").expect("deepseek balance skeleton");
        assert_eq!(
            metric.endpoint.as_deref(),
            Some("https://api.deepseek.com/user/balance")
        );
        let fields = metric.fields.expect("skeleton fields");
        assert_eq!(fields[0].path.as_deref(), Some("balance_infos[0].total_balance"));
        assert_eq!(fields[0].currency_path.as_deref(), Some("balance_infos[0].currency"));
    }

    #[test]
    fn only_skeleton_platforms_may_omit_metrics() {
        assert!(has_builtin_metrics("deepseek"));
        assert!(has_builtin_metrics("kimi"));
        assert!(!has_builtin_metrics("zhipu"));
        assert!(!has_builtin_metrics("qwen"));
    }

    #[test]
    fn api_key_env_names_put_generic_name_first() {
        assert_eq!(
            api_key_env_names("qwen"),
            vec!["AI_BALANCE_QWEN_API_KEY", "DASHSCOPE_API_KEY", "QWEN_API_KEY"]
        );
        assert_eq!(api_key_env_names("my-proxy"), vec!["AI_BALANCE_MY_PROXY_API_KEY"]);
    }
}
