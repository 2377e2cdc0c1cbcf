//! Stream liveness probing
//!
//! Each probe issues a streaming GET against the entry URL and samples at
//! most `probe_bytes` of the body. HEAD is deliberately not used: many
//! public IPTV endpoints reject it while serving GET fine. Classification:
//!
//! - `Live`: 2xx/3xx within the timeout, and for HLS/DASH URLs a body
//!   sample that actually looks like a playlist/manifest
//! - `Dead`: connection refused, DNS failure, definitive 4xx/5xx, or a
//!   payload that fails the HLS/DASH sniff
//! - `Timeout`: no response within the per-attempt timeout after the whole
//!   retry budget
//! - `Error`: malformed URL or unsupported scheme, reported without any
//!   network attempt and never retried
//!
//! Transient failures (timeouts, resets, flapping 5xx in non-strict mode)
//! are retried with a linear backoff: attempt n sleeps `backoff * n`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use tracing::{debug, trace};
use url::Url;

use crate::config::CheckOptions;
use crate::errors::AppResult;
use crate::models::{ChannelEntry, ProbeOutcome, ProbeStatus};
use crate::utils::url::obfuscate_credentials;

/// Probing seam; the coordinator depends only on this trait.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Check one entry and produce exactly one outcome. Never fails at the
    /// process level: every network fault becomes an outcome status.
    async fn probe(&self, index: usize, entry: &ChannelEntry) -> ProbeOutcome;
}

/// What a URL is expected to serve, sniffed from the URL itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Hls,
    Dash,
    Plain,
}

fn sniff_kind(url: &str) -> StreamKind {
    let lower = url.to_ascii_lowercase();
    if lower.contains(".m3u8") {
        StreamKind::Hls
    } else if lower.contains(".mpd") {
        StreamKind::Dash
    } else {
        StreamKind::Plain
    }
}

/// One attempt's failure, driving the retry decision.
enum AttemptError {
    /// No response in time; retried, exhausted budget reports `Timeout`.
    Timeout,
    /// Reset/flapping-5xx class; retried, exhausted budget reports `Dead`.
    Transient(String),
    /// Definitive verdict, no retry.
    Fatal(ProbeStatus, String),
}

/// Exhausted-budget failure memory for the retry loop.
enum LastFailure {
    Timeout,
    Transient(String),
}

/// HTTP(S) liveness prober.
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
    probe_bytes: usize,
    strict: bool,
    user_agent: String,
}

impl HttpProber {
    pub fn new(options: &CheckOptions) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.probe_timeout)
            .build()?;

        Ok(Self {
            client,
            timeout: options.probe_timeout,
            max_retries: options.max_retries,
            backoff: options.retry_backoff,
            probe_bytes: options.probe_bytes,
            strict: options.strict,
            user_agent: options.user_agent.clone(),
        })
    }

    async fn attempt(
        &self,
        url: &str,
        user_agent: &str,
        kind: StreamKind,
    ) -> Result<(ProbeStatus, String), AttemptError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| classify_request_error(&e))?;

        let status = response.status();

        // Geo/bot blocking on CI runners; the stream usually works in real
        // players, so non-strict mode keeps the channel.
        if !self.strict
            && (status == StatusCode::FORBIDDEN
                || status == StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS)
        {
            return Ok((
                ProbeStatus::Live,
                format!("restricted (HTTP {})", status.as_u16()),
            ));
        }

        if status.is_client_error() {
            return Err(AttemptError::Fatal(
                ProbeStatus::Dead,
                format!("HTTP {}", status.as_u16()),
            ));
        }
        if status.is_server_error() {
            let detail = format!("HTTP {}", status.as_u16());
            if self.strict {
                return Err(AttemptError::Fatal(ProbeStatus::Dead, detail));
            }
            // Public sources flap on 5xx.
            return Err(AttemptError::Transient(detail));
        }

        match kind {
            StreamKind::Plain => {
                Ok((ProbeStatus::Live, format!("HTTP {}", status.as_u16())))
            }
            StreamKind::Hls => {
                let head = self.sample_body(response).await?;
                if head.contains("#EXTM3U") {
                    Ok((ProbeStatus::Live, "OK (HLS)".to_string()))
                } else {
                    Err(AttemptError::Fatal(
                        ProbeStatus::Dead,
                        "invalid HLS payload".to_string(),
                    ))
                }
            }
            StreamKind::Dash => {
                let head = self.sample_body(response).await?;
                if head.contains("<MPD") || head.contains("urn:mpeg:dash:schema:mpd") {
                    Ok((ProbeStatus::Live, "OK (DASH)".to_string()))
                } else {
                    Err(AttemptError::Fatal(
                        ProbeStatus::Dead,
                        "invalid DASH payload".to_string(),
                    ))
                }
            }
        }
    }

    /// Read at most `probe_bytes` of the response body.
    async fn sample_body(&self, response: reqwest::Response) -> Result<String, AttemptError> {
        let mut buf: Vec<u8> = Vec::with_capacity(self.probe_bytes.min(4096));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify_request_error(&e))?;
            buf.extend_from_slice(&chunk);
            if buf.len() >= self.probe_bytes {
                buf.truncate(self.probe_bytes);
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, index: usize, entry: &ChannelEntry) -> ProbeOutcome {
        let parsed = match Url::parse(&entry.url) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ProbeOutcome::new(
                    index,
                    ProbeStatus::Error,
                    None,
                    format!("invalid URL: {e}"),
                );
            }
        };
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return ProbeOutcome::new(
                    index,
                    ProbeStatus::Error,
                    None,
                    format!("unsupported scheme: {other}"),
                );
            }
        }

        let kind = sniff_kind(&entry.url);
        let user_agent = entry.user_agent.as_deref().unwrap_or(&self.user_agent);
        let attempts = self.max_retries + 1;
        let started = Instant::now();
        let mut last_failure = LastFailure::Timeout;

        for attempt in 1..=attempts {
            let attempt_started = Instant::now();
            let result = match tokio::time::timeout(
                self.timeout,
                self.attempt(&entry.url, user_agent, kind),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AttemptError::Timeout),
            };

            match result {
                Ok((status, detail)) => {
                    debug!(
                        "Probe {} -> {} ({}) in {:?}",
                        obfuscate_credentials(&entry.url),
                        status,
                        detail,
                        attempt_started.elapsed()
                    );
                    return ProbeOutcome::new(
                        index,
                        status,
                        Some(attempt_started.elapsed()),
                        detail,
                    );
                }
                Err(AttemptError::Fatal(status, detail)) => {
                    debug!(
                        "Probe {} -> {} ({})",
                        obfuscate_credentials(&entry.url),
                        status,
                        detail
                    );
                    let latency = (status != ProbeStatus::Error)
                        .then(|| attempt_started.elapsed());
                    return ProbeOutcome::new(index, status, latency, detail);
                }
                Err(AttemptError::Timeout) => {
                    trace!(
                        "Probe {} attempt {}/{} timed out",
                        obfuscate_credentials(&entry.url),
                        attempt,
                        attempts
                    );
                    last_failure = LastFailure::Timeout;
                }
                Err(AttemptError::Transient(detail)) => {
                    trace!(
                        "Probe {} attempt {}/{} transient failure: {}",
                        obfuscate_credentials(&entry.url),
                        attempt,
                        attempts,
                        detail
                    );
                    last_failure = LastFailure::Transient(detail);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }

        match last_failure {
            LastFailure::Timeout => ProbeOutcome::new(
                index,
                ProbeStatus::Timeout,
                Some(started.elapsed()),
                format!("no response within timeout ({attempts} attempts)"),
            ),
            LastFailure::Transient(detail) => ProbeOutcome::new(
                index,
                ProbeStatus::Dead,
                Some(started.elapsed()),
                detail,
            ),
        }
    }
}

/// Map a reqwest error onto the retry taxonomy.
///
/// Walks the error source chain looking for the underlying I/O failure;
/// DNS failures are recognized by resolver message tokens since they do not
/// surface as a typed error.
fn classify_request_error(error: &reqwest::Error) -> AttemptError {
    if error.is_timeout() {
        return AttemptError::Timeout;
    }

    let message = error_chain_message(error);
    if is_dns_failure(&message.to_ascii_lowercase()) {
        return AttemptError::Fatal(
            ProbeStatus::Dead,
            "DNS resolution failed".to_string(),
        );
    }

    if let Some(io) = find_io_error(error) {
        match io.kind() {
            std::io::ErrorKind::ConnectionRefused => {
                return AttemptError::Fatal(
                    ProbeStatus::Dead,
                    "connection refused".to_string(),
                );
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => {
                return AttemptError::Transient("connection reset".to_string());
            }
            std::io::ErrorKind::TimedOut => return AttemptError::Timeout,
            _ => {}
        }
    }

    if error.is_connect() {
        // Unreachable host without a recognizable io kind still means the
        // endpoint is down.
        return AttemptError::Fatal(ProbeStatus::Dead, format!("connect failed: {message}"));
    }

    AttemptError::Fatal(ProbeStatus::Error, format!("request failed: {message}"))
}

fn find_io_error<'a>(
    error: &'a (dyn std::error::Error + 'static),
) -> Option<&'a std::io::Error> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return Some(io);
        }
        source = err.source();
    }
    None
}

fn error_chain_message(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}

fn is_dns_failure(message: &str) -> bool {
    [
        "dns error",
        "failed to lookup",
        "name or service not known",
        "no such host",
    ]
    .iter()
    .any(|token| message.contains(token))
}
