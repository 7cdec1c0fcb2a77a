//! Human-readable rendering of a [`CheckReport`].

use ai_balance_core::{CheckReport, FieldResult, MetricResult, PlatformResult};
use serde_json::Value;

const METRIC_INDENT: &str = "  ";
const FIELD_INDENT: &str = "    ";

pub fn render_text(report: &CheckReport, include_raw: bool) -> String {
    let mut out = String::new();
    for platform in &report.results {
        render_platform(&mut out, report, platform, include_raw);
        out.push('\n');
    }
    out
}

fn render_platform(out: &mut String, report: &CheckReport, platform: &PlatformResult, include_raw: bool) {
    let messages = report.language.messages();
    let (mark, status) = if platform.ok {
        ("✓", messages.success)
    } else {
        ("✗", messages.error)
    };
    out.push_str(&format!("{mark} {} [{status}]\n", platform.name));

    if platform.metrics.is_empty() {
        if let Some(error) = &platform.error {
            out.push_str(&format!("{METRIC_INDENT}{error}\n"));
        }
        return;
    }

    for metric in &platform.metrics {
        render_metric(out, report, metric, include_raw);
    }
}

fn render_metric(out: &mut String, report: &CheckReport, metric: &MetricResult, include_raw: bool) {
    let label = metric
        .name
        .clone()
        .unwrap_or_else(|| report.language.metric_label(&metric.metric));

    if metric.fields.is_empty() {
        let detail = metric
            .error
            .as_ref()
            .map(|error| error.message().to_owned())
            .or_else(|| metric.message.clone())
            .unwrap_or_default();
        out.push_str(&format!("{METRIC_INDENT}{label}: {detail}\n"));
    } else {
        out.push_str(&format!("{METRIC_INDENT}{label}:\n"));
        for (key, field) in &metric.fields {
            out.push_str(&format!("{FIELD_INDENT}{key}: {}\n", field_text(field)));
        }
        if let Some(message) = &metric.message {
            out.push_str(&format!("{FIELD_INDENT}({message})\n"));
        }
    }

    if include_raw {
        if let Some(raw) = &metric.raw {
            let text = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
            for line in text.lines() {
                out.push_str(&format!("{FIELD_INDENT}{line}\n"));
            }
        }
    }
}

fn field_text(field: &FieldResult) -> String {
    if let Some(error) = &field.error {
        return error.message().to_owned();
    }
    if field.value.is_null() {
        return field.message.clone().unwrap_or_else(|| String::from("-"));
    }

    let mut text = value_text(&field.value);
    if let Some(unit) = &field.unit {
        text.push(' ');
        text.push_str(unit);
    }
    if let Some(currency) = &field.currency {
        if field.unit.as_deref() != Some(currency.as_str()) {
            text.push(' ');
            text.push_str(currency);
        }
    }
    text
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::from("-"),
        other => other.to_string(),
    }
}
