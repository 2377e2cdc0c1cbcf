//! M3U playlist parsing
//!
//! Parses an extended-M3U document into ordered `ChannelEntry` records. This
//! is a pure textual transformation: no network access, no side effects, and
//! parsing the same text twice yields structurally equal results.
//!
//! The grammar is strict where it matters: the `#EXTM3U` header must come
//! first, every `#EXTINF` line must be followed by a stream URL, and a URL
//! without metadata is rejected. Attribute parsing on the `#EXTINF` line is
//! tolerant instead (a key with a missing value is recorded as empty).

use std::collections::HashMap;

use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::models::ChannelEntry;

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";
const VLCOPT_USER_AGENT: &str = "#EXTVLCOPT:http-user-agent=";

/// Recover playlists that were collapsed onto a single line.
///
/// Some published playlists arrive with all their lines joined by spaces.
/// When the document has no line breaks at all, whitespace runs are
/// collapsed and a break is re-inserted before each `#EXT` directive and
/// each `http(s)://` URL. Multi-line documents pass through unchanged.
pub fn normalize(raw: &str) -> String {
    if raw.trim().contains('\n') {
        return raw.to_string();
    }

    let mut flat = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars() {
        match ch {
            '\r' => {}
            ' ' | '\t' | '\n' => pending_space = true,
            _ => {
                if pending_space && !flat.is_empty() {
                    flat.push(' ');
                }
                pending_space = false;
                flat.push(ch);
            }
        }
    }

    let mut broken = flat
        .replace(" #EXT", "\n#EXT")
        .replace(" http://", "\nhttp://")
        .replace(" https://", "\nhttps://");
    broken.push('\n');
    broken
}

struct PendingEntry {
    raw_extinf: String,
    line: usize,
}

/// Parse an M3U document into an ordered sequence of channel entries.
///
/// Duplicate URLs are preserved as separate entries; filtering policy
/// belongs to the writer, not the loader.
pub fn parse(text: &str) -> AppResult<Vec<ChannelEntry>> {
    let doc = normalize(text);
    let mut entries = Vec::new();
    let mut pending: Option<PendingEntry> = None;
    let mut pending_user_agent: Option<String> = None;
    let mut saw_header = false;

    for (idx, raw_line) in doc.lines().enumerate() {
        let line = raw_line.trim();
        let line_no = idx + 1;
        if line.is_empty() {
            continue;
        }

        if !saw_header {
            if !line.starts_with(HEADER) {
                return Err(AppError::malformed_playlist(
                    line_no,
                    "missing #EXTM3U header",
                ));
            }
            saw_header = true;
            continue;
        }

        if line.starts_with(EXTINF) {
            if let Some(previous) = pending.take() {
                return Err(AppError::malformed_playlist(
                    previous.line,
                    "#EXTINF entry has no stream URL",
                ));
            }
            pending = Some(PendingEntry {
                raw_extinf: line.to_string(),
                line: line_no,
            });
        } else if let Some(agent) = line.strip_prefix(VLCOPT_USER_AGENT) {
            pending_user_agent = Some(agent.trim().to_string());
        } else if line.starts_with('#') {
            // Unrelated directives (#EXTGRP, #PLAYLIST, ...) carry nothing we
            // check, skip them.
            continue;
        } else {
            let Some(meta) = pending.take() else {
                return Err(AppError::malformed_playlist(
                    line_no,
                    format!("stream URL without a preceding #EXTINF: {line}"),
                ));
            };
            let (name, attributes) = parse_extinf(&meta.raw_extinf);
            entries.push(ChannelEntry {
                name,
                attributes,
                url: line.to_string(),
                user_agent: pending_user_agent.take(),
                raw_extinf: meta.raw_extinf,
            });
        }
    }

    if !saw_header {
        return Err(AppError::malformed_playlist(1, "missing #EXTM3U header"));
    }
    if let Some(dangling) = pending {
        return Err(AppError::malformed_playlist(
            dangling.line,
            "#EXTINF entry has no stream URL",
        ));
    }

    debug!("Parsed {} channel entries", entries.len());
    Ok(entries)
}

/// Split an `#EXTINF` line into display name and attribute map.
///
/// The name is whatever follows the last comma; when that is empty the
/// `tvg-name` attribute is used as a fallback.
fn parse_extinf(line: &str) -> (String, HashMap<String, String>) {
    let body = &line[EXTINF.len()..];
    let (attr_part, name) = match body.rfind(',') {
        Some(pos) => (&body[..pos], body[pos + 1..].trim().to_string()),
        None => (body, String::new()),
    };

    let attributes = parse_attributes(attr_part);
    let name = if name.is_empty() {
        attributes.get("tvg-name").cloned().unwrap_or_default()
    } else {
        name
    };
    (name, attributes)
}

/// Character-by-character `key="value"` scanner.
///
/// Quoted values may contain spaces and escaped quotes. Bare tokens without
/// `=` (the duration field) are not attributes and are dropped. A key that
/// saw `=` is recorded even when its value is empty.
fn parse_attributes(input: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_quotes = false;
    let mut in_value = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            if in_value {
                value.push(ch);
            } else {
                key.push(ch);
            }
            escape_next = false;
            continue;
        }

        match ch {
            '\\' => escape_next = true,
            '"' if in_value => in_quotes = !in_quotes,
            '=' if !in_quotes && !in_value => in_value = true,
            ' ' | '\t' if !in_quotes => {
                if in_value {
                    attrs.insert(
                        key.trim().to_string(),
                        value.trim_matches('"').to_string(),
                    );
                    key.clear();
                    value.clear();
                    in_value = false;
                } else {
                    key.clear();
                }
            }
            _ => {
                if in_value {
                    value.push(ch);
                } else {
                    key.push(ch);
                }
            }
        }
    }

    if in_value {
        attrs.insert(key.trim().to_string(), value.trim_matches('"').to_string());
    }

    attrs
}
