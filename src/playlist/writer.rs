//! Filtered playlist regeneration
//!
//! Rebuilds valid M3U syntax from checked entries. Metadata lines are the
//! original `#EXTINF` text, emitted verbatim; the writer never rewrites
//! attributes it does not understand. Even when zero entries survive the
//! output degenerates to a header-only document, which is still valid M3U.

use crate::models::{ChannelEntry, RunReport};

const HEADER: &str = "#EXTM3U";
const VLCOPT_USER_AGENT: &str = "#EXTVLCOPT:http-user-agent=";

/// Serialize entries back into an M3U document, preserving order and metadata.
pub fn write_entries<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a ChannelEntry>,
{
    let mut out = String::from(HEADER);
    out.push('\n');
    for entry in entries {
        out.push_str(&entry.raw_extinf);
        out.push('\n');
        if let Some(agent) = &entry.user_agent {
            out.push_str(VLCOPT_USER_AGENT);
            out.push_str(agent);
            out.push('\n');
        }
        out.push_str(&entry.url);
        out.push('\n');
    }
    out
}

/// Regenerate an M3U document containing only the live entries of a run,
/// in their original relative order.
pub fn write_playlist(report: &RunReport) -> String {
    write_entries(report.live_entries())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeOutcome, ProbeStatus};
    use crate::playlist::parse;

    const SAMPLE: &str = concat!(
        "#EXTM3U\n",
        "#EXTINF:-1 tvg-id=\"one.it\" group-title=\"News\",Channel One\n",
        "http://example.com/one.m3u8\n",
        "#EXTINF:-1,Channel Two\n",
        "#EXTVLCOPT:http-user-agent=VLC/3.0\n",
        "http://example.com/two\n",
    );

    fn report_with_statuses(statuses: &[ProbeStatus]) -> RunReport {
        let entries = parse(SAMPLE).unwrap();
        let outcomes = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| ProbeOutcome::new(i, *s, None, "test"))
            .collect();
        RunReport::new(entries, outcomes)
    }

    #[test]
    fn round_trips_all_entries() {
        let entries = parse(SAMPLE).unwrap();
        let rewritten = write_entries(&entries);
        assert_eq!(parse(&rewritten).unwrap(), entries);
    }

    #[test]
    fn keeps_only_live_entries_with_identical_metadata() {
        let report = report_with_statuses(&[ProbeStatus::Live, ProbeStatus::Dead]);
        let out = write_playlist(&report);
        assert!(out.starts_with("#EXTM3U\n"));
        assert!(out.contains("#EXTINF:-1 tvg-id=\"one.it\" group-title=\"News\",Channel One\n"));
        assert!(out.contains("http://example.com/one.m3u8\n"));
        assert!(!out.contains("Channel Two"));
        assert!(!out.contains("http://example.com/two"));
    }

    #[test]
    fn reemits_user_agent_option() {
        let report = report_with_statuses(&[ProbeStatus::Dead, ProbeStatus::Live]);
        let out = write_playlist(&report);
        assert!(out.contains("#EXTVLCOPT:http-user-agent=VLC/3.0\nhttp://example.com/two\n"));
    }

    #[test]
    fn zero_live_entries_degenerates_to_header_only() {
        let report = report_with_statuses(&[ProbeStatus::Dead, ProbeStatus::Timeout]);
        assert_eq!(write_playlist(&report), "#EXTM3U\n");
    }
}
