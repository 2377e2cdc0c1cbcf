//! Bounded-concurrency probe coordination
//!
//! Fans the entry list out to the prober with at most `concurrency` probes
//! in flight. Each probe writes an outcome tagged with the entry's input
//! position, so completion order never affects the report and no locking is
//! needed. An optional whole-run deadline abandons in-flight probes and
//! records everything still pending as `Timeout`; the run itself always
//! completes with exactly one outcome per entry.

use std::sync::Arc;
use std::time::Instant;

use futures::{StreamExt, stream};
use tracing::info;

use crate::models::{ChannelEntry, ProbeOutcome, ProbeStatus, RunReport};
use crate::prober::Probe;

pub struct ProbeRunner<P> {
    prober: Arc<P>,
    concurrency: usize,
    deadline: Option<std::time::Duration>,
}

impl<P: Probe> ProbeRunner<P> {
    /// `concurrency` must be at least 1; config validation enforces this
    /// before a runner is ever constructed.
    pub fn new(prober: P, concurrency: usize, deadline: Option<std::time::Duration>) -> Self {
        debug_assert!(concurrency > 0);
        Self {
            prober: Arc::new(prober),
            concurrency,
            deadline,
        }
    }

    /// Probe every entry and aggregate the outcomes into a `RunReport`.
    ///
    /// Empty input is not an error; it yields a report with `total = 0`.
    pub async fn run_all(&self, entries: Vec<ChannelEntry>) -> RunReport {
        let deadline = self
            .deadline
            .map(|limit| tokio::time::Instant::now() + limit);
        info!(
            "Starting probe run: {} entries, concurrency {}",
            entries.len(),
            self.concurrency
        );

        let outcomes: Vec<ProbeOutcome> = stream::iter(entries.iter().enumerate())
            .map(|(index, entry)| {
                let prober = Arc::clone(&self.prober);
                async move {
                    let task_started = Instant::now();
                    match deadline {
                        Some(at) if tokio::time::Instant::now() >= at => ProbeOutcome::new(
                            index,
                            ProbeStatus::Timeout,
                            Some(task_started.elapsed()),
                            "run deadline exceeded",
                        ),
                        Some(at) => {
                            match tokio::time::timeout_at(at, prober.probe(index, entry)).await {
                                Ok(outcome) => outcome,
                                Err(_) => ProbeOutcome::new(
                                    index,
                                    ProbeStatus::Timeout,
                                    Some(task_started.elapsed()),
                                    "run deadline exceeded",
                                ),
                            }
                        }
                        None => prober.probe(index, entry).await,
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let report = RunReport::new(entries, outcomes);
        info!(
            "Probe run finished: {} live, {} dead, {} errors of {} total",
            report.live, report.dead, report.errors, report.total
        );
        report
    }
}
