//! Background match-search queue.
//!
//! New records are pushed onto a bounded channel and picked up by a fixed
//! pool of worker tasks. Storage backends are synchronous, so each search runs
//! on the blocking thread pool. Enqueueing never waits: when the queue is full
//! the job is dropped, logged and counted.

use super::MatchSearchEngine;
use crate::models::SourceRecord;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Bounded queue feeding a pool of match-search workers.
#[derive(Debug)]
pub struct MatchQueue {
    sender: mpsc::Sender<SourceRecord>,
    workers: Vec<JoinHandle<()>>,
}

impl MatchQueue {
    /// Spawns `workers` tasks sharing a queue of `capacity` jobs.
    ///
    /// Both values are raised to at least 1. Must be called from within a
    /// Tokio runtime.
    #[must_use]
    pub fn start(engine: Arc<MatchSearchEngine>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let engine = Arc::clone(&engine);
                tokio::spawn(run_worker(worker, receiver, engine))
            })
            .collect();

        Self { sender, workers }
    }

    /// Queues a search for `record`.
    ///
    /// Returns `false` if the job was rejected because the queue is full or
    /// closed; the caller carries on either way.
    pub fn enqueue(&self, record: SourceRecord) -> bool {
        let kind = record.kind();
        let id = record.report().id;
        match self.sender.try_send(record) {
            Ok(()) => {
                metrics::counter!("match_queue_enqueued_total", "kind" => kind.as_str())
                    .increment(1);
                true
            },
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%kind, id, "Match queue full, search skipped");
                metrics::counter!("match_queue_rejected_total", "reason" => "full").increment(1);
                false
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(%kind, id, "Match queue closed, search skipped");
                metrics::counter!("match_queue_rejected_total", "reason" => "closed").increment(1);
                false
            },
        }
    }

    /// Number of worker tasks.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Closes the queue and waits until every queued job has run.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.workers {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Match worker ended abnormally");
            }
        }
        tracing::debug!("Match queue drained");
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<SourceRecord>>>,
    engine: Arc<MatchSearchEngine>,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(record) = job else {
            break;
        };

        let engine = Arc::clone(&engine);
        match tokio::task::spawn_blocking(move || engine.find_and_record_matches(&record)).await {
            Ok(_) => {
                metrics::counter!("match_queue_completed_total").increment(1);
            },
            Err(e) => {
                tracing::error!(worker, error = %e, "Match search task panicked");
                metrics::counter!("match_queue_failed_total").increment(1);
            },
        }
    }
    tracing::debug!(worker, "Match worker stopped");
}
