//! Run report rendering
//!
//! The text report is deterministic for a given set of outcomes: a counts
//! line, then one line per non-live entry in input order. The JSON report
//! carries the same rows plus a generation timestamp for publishers that
//! template it into a status page.

use chrono::Utc;
use serde::Serialize;

use crate::errors::AppResult;
use crate::models::{ProbeStatus, RunReport};

/// Render the deterministic plain-text summary.
pub fn render_text(report: &RunReport) -> String {
    let mut out = format!(
        "total={} live={} dead={} error={}\n",
        report.total, report.live, report.dead, report.errors
    );

    for outcome in &report.outcomes {
        if outcome.is_live() {
            continue;
        }
        let entry = &report.entries[outcome.index];
        let name = if entry.name.is_empty() {
            entry.url.as_str()
        } else {
            entry.name.as_str()
        };
        out.push_str(&format!("{:<7} {} - {}\n", outcome.status, name, outcome.detail));
    }

    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    total: usize,
    live: usize,
    dead: usize,
    errors: usize,
    channels: Vec<JsonChannel<'a>>,
}

#[derive(Serialize)]
struct JsonChannel<'a> {
    name: &'a str,
    url: &'a str,
    status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    detail: &'a str,
}

/// Render the structured JSON report.
pub fn render_json(report: &RunReport) -> AppResult<String> {
    let channels = report
        .outcomes
        .iter()
        .map(|outcome| {
            let entry = &report.entries[outcome.index];
            JsonChannel {
                name: &entry.name,
                url: &entry.url,
                status: outcome.status,
                latency_ms: outcome.latency_ms,
                detail: &outcome.detail,
            }
        })
        .collect();

    let envelope = JsonReport {
        generated_at: Utc::now().to_rfc3339(),
        total: report.total,
        live: report.live,
        dead: report.dead,
        errors: report.errors,
        channels,
    };

    Ok(serde_json::to_string_pretty(&envelope)?)
}
