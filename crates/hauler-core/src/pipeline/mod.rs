//! Update batching pipeline.
//!
//! Turns the append-only job log plus a FIFO of status updates into a stream of pushes with
//! bounded retry. The pipeline holds no timers and performs no I/O: the executor calls
//! [`UpdatePipeline::next_batch`] on every tick, pushes the batch, and reports the result
//! back through [`UpdatePipeline::complete`].
//!
//! Invariants:
//! - at most one batch is in flight at any time;
//! - a batch's trace is always `logs[last_pushed_log_index..]` at dequeue time, so successful
//!   pushes ship disjoint, contiguous log slices in arrival order;
//! - a failed update goes back to the head of the queue unchanged, ahead of anything newer.
use std::{collections::VecDeque, time::Duration};

use tracing::{debug, trace, warn};

use hauler_model::{LogEntry, LogLevel, PendingUpdate, StatusPayload, UpdateBatch};

/// Default interval between pipeline ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(3_000);

/// Total push attempts per update before it is dropped.
pub const MAX_RETRY: u32 = 3;

/// Result of a completed push as seen by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Push succeeded; more updates may follow.
    Delivered,
    /// Push of the `done` update succeeded; the pipeline is stopped.
    Finished,
    /// Push failed; the update is back at the head of the queue.
    Requeued { attempt: u32 },
    /// Push failed for the last allowed time; the update is gone.
    Dropped,
}

/// Log buffer, update queue and push bookkeeping for one job.
#[derive(Debug, Default)]
pub struct UpdatePipeline {
    logs: Vec<LogEntry>,
    last_pushed_log_index: usize,
    queue: VecDeque<PendingUpdate>,
    in_flight: bool,
    // Head of `queue` is an update that already failed at least once.
    retrying: bool,
    failed_push_count: u32,
    stopped: bool,
}

impl UpdatePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a log entry.
    ///
    /// With nothing queued, an empty placeholder update is enqueued so the next tick still ships the log.
    pub fn append_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        if self.queue.is_empty() {
            self.queue.push_back(PendingUpdate::default());
        }
    }

    /// Enqueue a status event.
    ///
    /// A trailing placeholder that was never pushed is filled in rather than followed, so logs
    /// that arrived just before the event travel together with it. A placeholder awaiting retry
    /// is left as it was attempted.
    pub fn enqueue_status(&mut self, payload: StatusPayload) {
        let tail_is_retry = self.retrying && self.queue.len() == 1;
        match self.queue.back_mut() {
            Some(tail) if tail.is_placeholder() && !tail_is_retry => {
                tail.job_updates = Some(payload)
            }
            _ => self.queue.push_back(PendingUpdate::status(payload)),
        }
    }

    /// Enqueue an arbitrary update at the tail.
    pub fn enqueue(&mut self, update: PendingUpdate) {
        self.queue.push_back(update);
    }

    /// Dequeue the next batch to push, if any.
    ///
    /// Returns `None` while a push is in flight, after the pipeline stopped, or when the queue is empty.
    pub fn next_batch(&mut self) -> Option<UpdateBatch> {
        if self.in_flight || self.stopped {
            return None;
        }
        let update = self.queue.pop_front()?;
        self.retrying = false;
        let trace = self.logs[self.last_pushed_log_index..].to_vec();

        trace!(
            trace_len = trace.len(),
            queued = self.queue.len(),
            done = update.is_done(),
            "dequeued update batch"
        );
        self.in_flight = true;
        Some(UpdateBatch::new(update, trace))
    }

    /// Record the result of pushing `batch`.
    pub fn complete<E>(&mut self, batch: UpdateBatch, result: Result<(), E>) -> PushOutcome
    where
        E: std::fmt::Display,
    {
        self.in_flight = false;
        match result {
            Ok(()) => {
                self.last_pushed_log_index += batch.trace.len();
                self.failed_push_count = 0;
                if batch.is_done() {
                    debug!(pushed_logs = self.last_pushed_log_index, "final update delivered");
                    self.stopped = true;
                    return PushOutcome::Finished;
                }
                PushOutcome::Delivered
            }
            Err(e) => {
                self.logs.push(LogEntry::now(
                    LogLevel::Error,
                    format!("Failed to push job update: {e}"),
                ));
                self.failed_push_count += 1;

                if self.failed_push_count < MAX_RETRY {
                    debug!(attempt = self.failed_push_count, error = %e, "push failed; retrying");
                    self.queue.push_front(batch.update);
                    self.retrying = true;
                    PushOutcome::Requeued {
                        attempt: self.failed_push_count,
                    }
                } else {
                    warn!(
                        attempts = self.failed_push_count,
                        error = %e,
                        "push failed; update dropped"
                    );
                    self.failed_push_count = 0;
                    PushOutcome::Dropped
                }
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Returns `true` once the `done` update has been delivered.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Nothing queued and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && !self.in_flight
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn last_pushed_log_index(&self) -> usize {
        self.last_pushed_log_index
    }

    pub fn failed_push_count(&self) -> u32 {
        self.failed_push_count
    }
}
