//! Sequential batch driver shared by the per-article stages.

use std::collections::VecDeque;
use std::future::Future;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Abort,
}

/// Decides whether a failed item ends the whole run.
pub trait FailurePolicy: Send + Sync {
    fn on_error(&self, error: &AppError) -> Verdict;
}

/// Abort on errors whose HTTP status makes retrying pointless (400/401/403);
/// keep going on anything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOnFatal;

impl FailurePolicy for StopOnFatal {
    fn on_error(&self, error: &AppError) -> Verdict {
        if error.is_fatal() {
            Verdict::Abort
        } else {
            Verdict::Continue
        }
    }
}

/// Work items handed out in fixed-size batches.
#[derive(Debug)]
pub struct BatchQueue<T> {
    items: VecDeque<T>,
    batch_size: usize,
}

impl<T> BatchQueue<T> {
    pub fn new(items: impl IntoIterator<Item = T>, batch_size: usize) -> Self {
        Self {
            items: items.into_iter().collect(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn next_batch(&mut self) -> Option<Vec<T>> {
        if self.items.is_empty() {
            return None;
        }
        let take = self.batch_size.min(self.items.len());
        Some(self.items.drain(..take).collect())
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug)]
pub struct StageReport<O> {
    pub outputs: Vec<O>,
    pub failed: usize,
    /// Items never attempted because the policy aborted.
    pub skipped_after_abort: usize,
    pub aborted: bool,
}

impl<O> StageReport<O> {
    fn new() -> Self {
        Self {
            outputs: Vec::new(),
            failed: 0,
            skipped_after_abort: 0,
            aborted: false,
        }
    }
}

/// Run `stage` over every queued item, one at a time, batch after batch.
pub async fn drive<T, O, F, Fut>(
    mut queue: BatchQueue<T>,
    policy: &dyn FailurePolicy,
    mut stage: F,
) -> StageReport<O>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    let mut report = StageReport::new();
    let mut batch_number = 0usize;

    while let Some(batch) = queue.next_batch() {
        batch_number += 1;
        let mut items = batch.into_iter();

        for item in items.by_ref() {
            match stage(item).await {
                Ok(output) => report.outputs.push(output),
                Err(e) => {
                    report.failed += 1;
                    if policy.on_error(&e) == Verdict::Abort {
                        tracing::error!(batch = batch_number, error = %e, "Fatal error, stopping batch processing");
                        report.aborted = true;
                        break;
                    }
                    tracing::warn!(batch = batch_number, error = %e, "Item failed, continuing");
                }
            }
        }

        if report.aborted {
            report.skipped_after_abort = items.len() + queue.remaining();
            return report;
        }
    }

    report
}
