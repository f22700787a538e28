//! CLI presentation: run reports and handler listings as text or JSON.

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::error::ProgressError;
use crate::progress::{HandlerRegistry, HandlerSpec, ScopeReport};

/// Result of a simulated `run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub workers: usize,
    pub steps_per_worker: u64,
    /// Steps completed by workers that returned successfully.
    pub completed_steps: u64,
    pub failures: Vec<String>,
    pub report: ScopeReport,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ProgressError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ProgressError::Config(format!("Failed to serialize output: {}", e)))
}

fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold())
}

pub fn format_run_json(summary: &RunSummary) -> Result<String, ProgressError> {
    to_json(summary)
}

pub fn format_run_text(summary: &RunSummary) -> String {
    let state = &summary.report.state;
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Run summary")));
    out.push_str(&format!("  Scope: {}\n", summary.report.scope_id));
    out.push_str(&format!("  Strategy: {}\n", summary.report.strategy.as_str()));
    out.push_str(&format!(
        "  Workers: {} x {} steps\n",
        summary.workers, summary.steps_per_worker
    ));
    out.push_str(&format!("  Completed steps: {}\n", summary.completed_steps));

    let progress = match (state.total, state.percent()) {
        (Some(total), Some(percent)) => format!("{}/{} ({:.0}%)", state.done, total, percent),
        (None, Some(percent)) => format!("{} steps ({:.0}%)", state.done, percent),
        _ => format!("{} steps", state.done),
    };
    out.push_str(&format!("  Displayed progress: {}\n", progress));
    out.push_str(&format!(
        "  Events: {} received, {} ignored, {} signalers\n",
        state.events_received, state.ignored_events, state.signalers
    ));
    out.push_str(&format!("  Elapsed: {} ms\n", summary.report.elapsed_ms));
    if summary.report.timed_out {
        out.push_str("  Drain: timed out, report uses the last snapshot\n");
    }

    if !summary.failures.is_empty() {
        out.push_str(&format!("\nFailures ({}):", summary.failures.len()));
        for failure in &summary.failures {
            out.push_str(&format!("\n  - {}", failure));
        }
        out.push('\n');
    }
    out
}

fn spec_settings(spec: &HandlerSpec) -> String {
    match spec {
        HandlerSpec::Custom(_) => "programmatic".to_string(),
        HandlerSpec::Debug | HandlerSpec::Void => "-".to_string(),
        other => serde_json::to_value(other)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .map(|mut fields| {
                fields.remove("type");
                fields
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|| "-".to_string()),
    }
}

pub fn format_handlers_text(registry: &HandlerRegistry) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Handlers")));
    if registry.is_empty() {
        out.push_str("No handlers configured; scopes run silently.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Handler", "Settings"]);
    for (i, spec) in registry.specs().iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            spec.name().to_string(),
            spec_settings(spec),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_handlers_json(registry: &HandlerRegistry) -> Result<String, ProgressError> {
    let handlers: Vec<serde_json::Value> = registry
        .specs()
        .iter()
        .map(|spec| match spec {
            HandlerSpec::Custom(_) => serde_json::json!({ "type": spec.name(), "custom": true }),
            other => serde_json::to_value(other)
                .unwrap_or_else(|_| serde_json::json!({ "type": other.name() })),
        })
        .collect();
    to_json(&serde_json::json!({
        "handlers": handlers,
        "total": registry.len(),
    }))
}
