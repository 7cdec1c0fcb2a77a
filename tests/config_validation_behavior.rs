//! Behavior-driven tests for loading and validating the config document.
//!
//! A bad document must be rejected before any request is attempted, with an
//! error that names the key the user has to change.

use std::sync::Arc;

use ai_balance_core::config::{candidate_paths, load_from_path};
use ai_balance_core::{
    load_config, parse_config_str, select_platforms, ConfigError, EnvSnapshot, Lang,
};
use serde_json::json;
use tempfile::tempdir;

use ai_balance_tests::{english, platform_fetcher, RecordingHttpClient};

fn parse(text: &str) -> Result<ai_balance_core::ConfigDocument, ConfigError> {
    parse_config_str(text, "test.json", &EnvSnapshot::empty())
}

// =============================================================================
// Retired schema keys
// =============================================================================

#[test]
fn platform_level_balance_endpoint_is_rejected_with_its_replacement() {
    // Given: A config written for the single-endpoint schema
    let text = r#"{ "platforms": { "qwen": {
        "balanceEndpoint": "https://q.test/balance",
        "metrics": { "balance": {} }
    } } }"#;

    // When: It is parsed
    let error = parse(text).expect_err("legacy key should be rejected");

    // Then: The error names the old key and where it moved
    match &error {
        ConfigError::LegacyKey { path, replacement } => {
            assert_eq!(path, "platforms.qwen.balanceEndpoint");
            assert_eq!(replacement, "platforms.qwen.metrics.balance.endpoint");
        }
        other => panic!("expected LegacyKey, got {other:?}"),
    }
    assert_eq!(error.code(), "config.legacy_key");
}

#[test]
fn legacy_key_stops_the_run_before_any_request() {
    // Given: A transport that would answer if asked
    let client = Arc::new(RecordingHttpClient::responding(json!({})));

    // When: Loading fails on a retired key
    let loaded = parse(
        r#"{ "platforms": { "deepseek": { "apiKey": "k", "balancePath": "data.balance" } } }"#,
    );

    // Then: There is no document to fetch with and nothing was sent
    assert!(matches!(loaded, Err(ConfigError::LegacyKey { .. })));
    assert_eq!(client.request_count(), 0);
}

#[test]
fn legacy_metric_and_field_keys_point_at_the_new_spelling() {
    let metric_error = parse(
        r#"{ "platforms": { "qwen": { "metrics": { "usage": { "url": "https://q.test" } } } } }"#,
    )
    .expect_err("url is retired");
    assert!(matches!(
        metric_error,
        ConfigError::LegacyKey { ref path, ref replacement }
            if path == "platforms.qwen.metrics.usage.url"
                && replacement == "platforms.qwen.metrics.usage.endpoint"
    ));

    let field_error = parse(
        r#"{ "platforms": { "qwen": { "metrics": { "usage": {
            "endpoint": "https://q.test",
            "fields": [ { "key": "used", "jsonPath": "data.used" } ]
        } } } } }"#,
    )
    .expect_err("jsonPath is retired");
    assert!(matches!(
        field_error,
        ConfigError::LegacyKey { ref path, .. }
            if path == "platforms.qwen.metrics.usage.fields[0].jsonPath"
    ));
}

// =============================================================================
// Metrics presence
// =============================================================================

#[test]
fn platform_without_metrics_needs_a_built_in_skeleton() {
    // Given: qwen has no built-in metrics, deepseek does
    let missing = parse(r#"{ "platforms": { "qwen": { "apiKey": "k" } } }"#);
    let allowed = parse(r#"{ "platforms": { "deepseek": { "apiKey": "k" } } }"#);

    // Then: Only the platform without defaults is rejected
    assert!(matches!(
        missing,
        Err(ConfigError::MetricsMissing { ref path }) if path == "platforms.qwen.metrics"
    ));
    assert!(allowed.is_ok());
}

#[test]
fn empty_metrics_object_is_rejected_even_with_defaults() {
    let error = parse(r#"{ "platforms": { "kimi": { "apiKey": "k", "metrics": {} } } }"#)
        .expect_err("empty metrics");
    assert!(matches!(
        error,
        ConfigError::MetricsEmpty { ref path } if path == "platforms.kimi.metrics"
    ));
}

#[test]
fn zhipu_has_a_name_but_no_metric_defaults() {
    let error = parse(r#"{ "platforms": { "zhipu": { "apiKey": "k" } } }"#)
        .expect_err("zhipu needs metrics");
    assert!(matches!(error, ConfigError::MetricsMissing { .. }));
}

// =============================================================================
// Document shape
// =============================================================================

#[test]
fn invalid_json_is_a_parse_error_naming_the_origin() {
    let error = parse("{ not json").expect_err("parse error");
    assert!(matches!(error, ConfigError::Parse { ref path, .. } if path == "test.json"));
}

#[test]
fn non_array_fields_are_malformed() {
    let error = parse(
        r#"{ "platforms": { "qwen": { "metrics": { "usage": { "fields": { "key": "x" } } } } } }"#,
    )
    .expect_err("fields must be an array");
    assert!(matches!(error, ConfigError::Malformed { .. }));
}

#[test]
fn wrong_value_type_names_the_exact_key() {
    // Given: A timeout written as a string
    let text = r#"{ "platforms": { "qwen": {
        "timeoutMs": "15000",
        "metrics": { "usage": { "endpoint": "https://q.test" } }
    } } }"#;

    // When: It is parsed
    let error = parse(text).expect_err("timeoutMs must be a number");

    // Then: The error points at that key, not at the whole document
    match &error {
        ConfigError::Malformed { path, .. } => assert_eq!(path, "platforms.qwen.timeoutMs"),
        other => panic!("expected Malformed, got {other:?}"),
    }
    assert!(error.to_string().contains("platforms.qwen.timeoutMs"));
}

#[test]
fn language_is_read_from_the_document() {
    let doc = parse(r#"{ "language": "en-US", "platforms": { "deepseek": {} } }"#)
        .expect("valid");
    assert_eq!(Lang::resolve(None, doc.language.as_deref()), Lang::En);
    assert_eq!(Lang::resolve(Some("zh"), doc.language.as_deref()), Lang::Zh);
}

// =============================================================================
// Environment overrides
// =============================================================================

#[test]
fn generic_variable_beats_alias_and_file() {
    let env = EnvSnapshot::from_pairs([
        ("AI_BALANCE_KIMI_API_KEY", "from-generic"),
        ("MOONSHOT_API_KEY", "from-alias"),
    ]);
    let doc = parse_config_str(
        r#"{ "platforms": { "kimi": { "apiKey": "from-file" } } }"#,
        "test.json",
        &env,
    )
    .expect("valid");

    assert_eq!(
        doc.platform("kimi").and_then(|p| p.api_key.as_deref()),
        Some("from-generic")
    );
}

#[test]
fn blank_environment_values_leave_the_file_key_alone() {
    let env = EnvSnapshot::from_pairs([("DEEPSEEK_API_KEY", "   ")]);
    let doc = parse_config_str(
        r#"{ "platforms": { "deepseek": { "apiKey": "from-file" } } }"#,
        "test.json",
        &env,
    )
    .expect("valid");

    assert_eq!(
        doc.platform("deepseek").and_then(|p| p.api_key.as_deref()),
        Some("from-file")
    );
}

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn explicit_path_is_loaded_first() {
    // Given: A config file in a temporary directory
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("custom.json");
    std::fs::write(&path, r#"{ "platforms": { "deepseek": { "apiKey": "k" } } }"#)
        .expect("write config");

    // When: It is named explicitly
    let loaded = load_config(Some(&path), &EnvSnapshot::empty()).expect("loads");

    // Then: That file is the one used
    assert_eq!(loaded.path, path);
    assert_eq!(loaded.document.platform_keys(), vec!["deepseek"]);
    assert_eq!(candidate_paths(Some(&path))[0], path);
}

#[test]
fn unreadable_document_reports_the_file() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "[]").expect("write config");

    let error = load_from_path(&path, &EnvSnapshot::empty()).expect_err("array root");
    assert!(matches!(error, ConfigError::Malformed { .. }));

    let missing = dir.path().join("absent.json");
    let error = load_from_path(&missing, &EnvSnapshot::empty()).expect_err("missing file");
    assert!(matches!(error, ConfigError::Io { .. }));
}

// =============================================================================
// Platform selection
// =============================================================================

#[tokio::test]
async fn platforms_without_endpoints_are_skipped_unless_requested() {
    // Given: One platform ready to query and one still missing its endpoint
    let doc = parse(
        r#"{ "platforms": {
            "deepseek": { "apiKey": "k" },
            "doubao": { "apiKey": "d", "metrics": { "usage": { "fields": [] } } }
        } }"#,
    )
    .expect("valid");

    // When: Platforms are selected without --all
    let selection = select_platforms(&doc, None, false);

    // Then: doubao is listed as skipped
    assert_eq!(selection.run, vec!["deepseek"]);
    assert_eq!(selection.skipped, vec!["doubao"]);

    // And: Asking for it by name still runs it, and it reports the missing endpoint
    let requested = select_platforms(&doc, Some("DOUBAO"), false);
    assert_eq!(requested.run, vec!["doubao"]);

    let client = Arc::new(RecordingHttpClient::responding(json!({})));
    let report = platform_fetcher(&client, english())
        .check(&doc, &requested.run)
        .await;
    assert!(report.all_failed());
    assert_eq!(client.request_count(), 0);
}
