//! Parallel analysis of many reports.
//!
//! Reports share no state, so they are analyzed on a fixed pool of scoped
//! worker threads fed through a bounded job queue. A [`CancelToken`] stops
//! dispatching new jobs; reports not yet analyzed come back as
//! [`BatchOutcome::Cancelled`].

use crossbeam_channel::{bounded, unbounded};
use log::{debug, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::domain::BatchError;
use crate::report::{ReportAnalyzer, ReportInput, ReportSignatures};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result for one report of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Analyzed(ReportSignatures),
    Failed { error: String },
    Cancelled,
}

/// Analyze `inputs` on `workers` threads; outcomes are in input order.
///
/// # Errors
/// Returns [`BatchError::NoWorkers`] for a zero worker count and
/// [`BatchError::WorkerPanicked`] if a worker thread panicked.
pub fn analyze_batch(
    analyzer: &ReportAnalyzer,
    inputs: &[ReportInput],
    workers: usize,
    cancel: &CancelToken,
) -> Result<Vec<BatchOutcome>, BatchError> {
    if workers == 0 {
        return Err(BatchError::NoWorkers);
    }

    // At most one worker per report
    let workers = workers.min(inputs.len().max(1));
    let mut outcomes = vec![BatchOutcome::Cancelled; inputs.len()];
    let (job_tx, job_rx) = bounded::<usize>(workers.saturating_mul(2));
    let (result_tx, result_rx) = unbounded::<(usize, BatchOutcome)>();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for index in job_rx {
                        let outcome = if cancel.is_cancelled() {
                            BatchOutcome::Cancelled
                        } else {
                            match analyzer.analyze(&inputs[index]) {
                                Ok(signatures) => BatchOutcome::Analyzed(signatures),
                                Err(e) => BatchOutcome::Failed { error: e.to_string() },
                            }
                        };
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                    debug!("Batch worker {worker} finished");
                })
            })
            .collect();
        drop(job_rx);
        drop(result_tx);

        for index in 0..inputs.len() {
            if cancel.is_cancelled() {
                info!("Batch cancelled after dispatching {index} of {} reports", inputs.len());
                break;
            }
            if job_tx.send(index).is_err() {
                break;
            }
        }
        drop(job_tx);

        for (index, outcome) in &result_rx {
            outcomes[index] = outcome;
        }

        for handle in handles {
            handle.join().map_err(|_| BatchError::WorkerPanicked)?;
        }
        Ok::<(), BatchError>(())
    })?;

    let analyzed = outcomes.iter().filter(|o| matches!(o, BatchOutcome::Analyzed(_))).count();
    info!("Batch finished: {analyzed}/{} reports analyzed", inputs.len());

    Ok(outcomes)
}
