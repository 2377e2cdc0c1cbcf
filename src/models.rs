//! Domain models shared across the checker
//!
//! A run is a pure function of (playlist text, configuration): the loader
//! produces `ChannelEntry` records, the prober turns each into exactly one
//! `ProbeOutcome`, and the coordinator aggregates them into a `RunReport`.
//! Nothing here is persisted between runs.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One playlist record, immutable after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    /// Display name (text after the last comma of the `#EXTINF` line).
    pub name: String,
    /// Parsed `key="value"` attributes (tvg-id, group-title, ...), lookup only.
    pub attributes: HashMap<String, String>,
    /// Stream endpoint.
    pub url: String,
    /// Per-entry User-Agent from a preceding `#EXTVLCOPT:http-user-agent=` line.
    pub user_agent: Option<String>,
    /// The original `#EXTINF` line, re-emitted verbatim by the writer so
    /// attributes we do not understand survive untouched.
    pub raw_extinf: String,
}

/// Classification of one liveness probe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ProbeStatus {
    /// Endpoint answered with an acceptable response within the timeout.
    Live,
    /// Connection refused, DNS failure, bad payload, or a definitive 4xx/5xx.
    Dead,
    /// No response within the timeout after the whole retry budget.
    Timeout,
    /// Malformed URL or unsupported scheme; never retried.
    Error,
}

/// Result of checking one `ChannelEntry`.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    /// Position of the probed entry in the input playlist.
    pub index: usize,
    pub status: ProbeStatus,
    /// Time to response (or to giving up), absent when the probe never
    /// reached the network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Short diagnostic: HTTP status, network error class, ...
    pub detail: String,
}

impl ProbeOutcome {
    pub fn new<S: Into<String>>(
        index: usize,
        status: ProbeStatus,
        latency: Option<Duration>,
        detail: S,
    ) -> Self {
        Self {
            index,
            status,
            latency_ms: latency.map(|d| d.as_millis() as u64),
            detail: detail.into(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == ProbeStatus::Live
    }
}

/// Aggregate of a single verification pass.
///
/// `dead` counts both `Dead` and `Timeout` outcomes (in both cases the
/// endpoint did not serve), so `total == live + dead + errors` always holds.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub live: usize,
    pub dead: usize,
    pub errors: usize,
    /// One outcome per input entry, in input order.
    pub outcomes: Vec<ProbeOutcome>,
    #[serde(skip)]
    pub entries: Vec<ChannelEntry>,
}

impl RunReport {
    /// Build a report from the probed entries and their outcomes.
    ///
    /// Outcomes may arrive in completion order; they are re-indexed into
    /// input order here. There must be exactly one outcome per entry.
    pub fn new(entries: Vec<ChannelEntry>, mut outcomes: Vec<ProbeOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        debug_assert_eq!(entries.len(), outcomes.len());

        let mut live = 0;
        let mut dead = 0;
        let mut errors = 0;
        for outcome in &outcomes {
            match outcome.status {
                ProbeStatus::Live => live += 1,
                ProbeStatus::Dead | ProbeStatus::Timeout => dead += 1,
                ProbeStatus::Error => errors += 1,
            }
        }

        Self {
            total: entries.len(),
            live,
            dead,
            errors,
            outcomes,
            entries,
        }
    }

    /// Entries whose outcome is `Live`, in input order.
    pub fn live_entries(&self) -> impl Iterator<Item = &ChannelEntry> {
        self.outcomes
            .iter()
            .filter(|o| o.is_live())
            .map(|o| &self.entries[o.index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> ChannelEntry {
        ChannelEntry {
            name: format!("channel {url}"),
            attributes: HashMap::new(),
            url: url.to_string(),
            user_agent: None,
            raw_extinf: format!("#EXTINF:-1,channel {url}"),
        }
    }

    #[test]
    fn report_counts_satisfy_invariant() {
        let entries = vec![entry("a"), entry("b"), entry("c"), entry("d")];
        let outcomes = vec![
            ProbeOutcome::new(0, ProbeStatus::Live, Some(Duration::from_millis(10)), "HTTP 200"),
            ProbeOutcome::new(1, ProbeStatus::Dead, Some(Duration::from_millis(5)), "HTTP 404"),
            ProbeOutcome::new(2, ProbeStatus::Timeout, Some(Duration::from_secs(10)), "timed out"),
            ProbeOutcome::new(3, ProbeStatus::Error, None, "invalid URL"),
        ];

        let report = RunReport::new(entries, outcomes);
        assert_eq!(report.total, 4);
        assert_eq!(report.live, 1);
        assert_eq!(report.dead, 2); // Dead + Timeout
        assert_eq!(report.errors, 1);
        assert_eq!(report.total, report.live + report.dead + report.errors);
    }

    #[test]
    fn outcomes_are_reordered_by_input_position() {
        let entries = vec![entry("a"), entry("b"), entry("c")];
        let outcomes = vec![
            ProbeOutcome::new(2, ProbeStatus::Live, None, "HTTP 200"),
            ProbeOutcome::new(0, ProbeStatus::Live, None, "HTTP 200"),
            ProbeOutcome::new(1, ProbeStatus::Dead, None, "HTTP 500"),
        ];

        let report = RunReport::new(entries, outcomes);
        let indices: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn live_entries_preserve_relative_order() {
        let entries = vec![entry("a"), entry("b"), entry("c")];
        let outcomes = vec![
            ProbeOutcome::new(0, ProbeStatus::Live, None, "HTTP 200"),
            ProbeOutcome::new(1, ProbeStatus::Dead, None, "HTTP 404"),
            ProbeOutcome::new(2, ProbeStatus::Live, None, "HTTP 200"),
        ];

        let report = RunReport::new(entries, outcomes);
        let urls: Vec<&str> = report.live_entries().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "c"]);
    }

    #[test]
    fn empty_report_is_valid() {
        let report = RunReport::new(Vec::new(), Vec::new());
        assert_eq!(report.total, 0);
        assert_eq!(report.total, report.live + report.dead + report.errors);
    }

    #[test]
    fn status_display_is_uppercase() {
        assert_eq!(ProbeStatus::Live.to_string(), "LIVE");
        assert_eq!(ProbeStatus::Timeout.to_string(), "TIMEOUT");
    }
}
