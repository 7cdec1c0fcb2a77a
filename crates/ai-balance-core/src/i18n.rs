use serde::Serialize;

/// Output language for user-visible messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Zh,
    En,
}

impl Lang {
    /// `en` and `en-*` select English; anything else is Chinese.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized == "en" || normalized.starts_with("en-") || normalized.starts_with("en_") {
            Self::En
        } else {
            Self::Zh
        }
    }

    /// Command-line choice, then the document's `language`, then Chinese.
    pub fn resolve(cli: Option<&str>, document: Option<&str>) -> Self {
        cli.or(document).map(Self::parse).unwrap_or_default()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
        }
    }

    pub fn messages(self) -> &'static Messages {
        match self {
            Self::Zh => &ZH,
            Self::En => &EN,
        }
    }

    /// Display label for a metric id; unknown ids are shown as-is.
    pub fn metric_label(self, id: &str) -> String {
        let label = match (self, id) {
            (Self::Zh, "plan") => "套餐",
            (Self::Zh, "usage") => "用量",
            (Self::Zh, "balance") => "余额",
            (Self::En, "plan") => "Plan",
            (Self::En, "usage") => "Usage",
            (Self::En, "balance") => "Balance",
            _ => id,
        };
        label.to_owned()
    }
}

/// Message table for one language.
#[derive(Debug)]
pub struct Messages {
    pub loading: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub no_key: &'static str,
    pub platform_not_found: &'static str,
    pub missing_endpoint: &'static str,
    pub missing_metrics: &'static str,
    pub unknown_auth_type: &'static str,
    pub request_failed: &'static str,
    pub http_error: &'static str,
    pub fields_not_configured: &'static str,
    pub field_keys_missing: &'static str,
    pub path_not_configured: &'static str,
    pub path_not_found: &'static str,
    pub fields_failed: &'static str,
    pub skipped_platforms: &'static str,
    pub run_all_hint: &'static str,
    pub currency: &'static str,
}

static ZH: Messages = Messages {
    loading: "查询余额中...",
    success: "查询成功",
    error: "查询失败",
    no_key: "API Key 未配置",
    platform_not_found: "平台不存在",
    missing_endpoint: "需要具体 API endpoint，请配置",
    missing_metrics: "未配置任何指标，请配置",
    unknown_auth_type: "不支持的认证类型",
    request_failed: "请求失败",
    http_error: "HTTP 错误",
    fields_not_configured: "请求成功，但未配置 fields",
    field_keys_missing: "fields 均缺少 key，无法输出结果",
    path_not_configured: "未配置 path",
    path_not_found: "响应中未找到路径",
    fields_failed: "个字段失败",
    skipped_platforms: "已跳过未配置 endpoint 的平台",
    run_all_hint: "使用 --all 查询全部平台",
    currency: "货币",
};

static EN: Messages = Messages {
    loading: "Checking balance...",
    success: "Success",
    error: "Failed",
    no_key: "API Key not configured",
    platform_not_found: "Platform not found",
    missing_endpoint: "A concrete API endpoint is required; set",
    missing_metrics: "No metrics configured; set",
    unknown_auth_type: "Unsupported auth type",
    request_failed: "Request failed",
    http_error: "HTTP error",
    fields_not_configured: "Request succeeded but no fields are configured",
    field_keys_missing: "every field is missing its key; nothing to report",
    path_not_configured: "path not configured",
    path_not_found: "path not found in response",
    fields_failed: "fields failed",
    skipped_platforms: "Skipped platforms without an endpoint",
    run_all_hint: "use --all to check every platform",
    currency: "Currency",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_variants_select_english() {
        assert_eq!(Lang::parse("en"), Lang::En);
        assert_eq!(Lang::parse("EN-us"), Lang::En);
        assert_eq!(Lang::parse("zh"), Lang::Zh);
        assert_eq!(Lang::parse("fr"), Lang::Zh);
    }

    #[test]
    fn cli_choice_beats_document_language() {
        assert_eq!(Lang::resolve(Some("zh"), Some("en")), Lang::Zh);
        assert_eq!(Lang::resolve(None, Some("en")), Lang::En);
        assert_eq!(Lang::resolve(None, None), Lang::Zh);
    }

    #[test]
    fn metric_labels_are_localized() {
        assert_eq!(Lang::En.metric_label("balance"), "Balance");
        assert_eq!(Lang::Zh.metric_label("usage"), "用量");
        assert_eq!(Lang::En.metric_label("quota"), "quota");
    }
}
