//! Channel-Backed Consumer Context
//!
//! A ready-made [`ConsumerContext`] for consumers that live on a tokio
//! task. The producer side ([`ChannelContext`]) only pushes jobs onto an
//! unbounded mpsc queue; the consumer side ([`ContextRunner`]) applies them
//! on whatever task owns it.
//!
//! ```text
//! feed task ── submit ──▶ mpsc ──▶ ContextRunner::next_change ── apply ──▶ series
//! ```
//!
//! Dropping the runner closes the context: later submissions fail with
//! [`DeliveryError::Closed`] and the scheduler keeps the job pending. Jobs
//! the context had already accepted are dropped with the runner; use
//! [`ContextRunner::drain_ready`] or [`ContextRunner::into_pending`] first
//! to keep them.

use tokio::sync::mpsc;

use crate::application::ports::{ConsumerContext, DeliveryError};
use crate::application::services::scheduler::{SeriesChange, UpdateJob};

/// Create a connected context/runner pair.
#[must_use]
pub fn channel_context() -> (ChannelContext, ContextRunner) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelContext { tx }, ContextRunner { rx })
}

// =============================================================================
// Producer Side
// =============================================================================

/// Producer half, attached to channels in the registry.
#[derive(Debug, Clone)]
pub struct ChannelContext {
    tx: mpsc::UnboundedSender<UpdateJob>,
}

impl ChannelContext {
    /// True once the runner has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ConsumerContext for ChannelContext {
    fn submit(&self, job: UpdateJob) -> Result<(), DeliveryError> {
        self.tx
            .send(job)
            .map_err(|mpsc::error::SendError(job)| DeliveryError::Closed(job))
    }
}

// =============================================================================
// Consumer Side
// =============================================================================

/// Consumer half. Applies jobs in submission order.
#[derive(Debug)]
pub struct ContextRunner {
    rx: mpsc::UnboundedReceiver<UpdateJob>,
}

impl ContextRunner {
    /// Wait for the next job and apply it.
    ///
    /// Returns `None` once every [`ChannelContext`] is gone and the queue is
    /// empty. Jobs that fail to apply are logged and skipped.
    pub async fn next_change(&mut self) -> Option<SeriesChange> {
        loop {
            let job = self.rx.recv().await?;
            if let Some(change) = apply_logged(job) {
                return Some(change);
            }
        }
    }

    /// Apply every job already queued without waiting.
    pub fn drain_ready(&mut self) -> Vec<SeriesChange> {
        let mut changes = Vec::new();
        while let Ok(job) = self.rx.try_recv() {
            changes.extend(apply_logged(job));
        }
        changes
    }

    /// Stop accepting new jobs. Already queued jobs can still be drained.
    ///
    /// Queued jobs are not applied by closing; they are lost if the runner
    /// is dropped without draining.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Close the context and hand back the jobs it accepted but never
    /// applied, in submission order.
    #[must_use]
    pub fn into_pending(mut self) -> Vec<UpdateJob> {
        self.rx.close();
        let mut jobs = Vec::new();
        while let Ok(job) = self.rx.try_recv() {
            jobs.push(job);
        }
        jobs
    }
}

fn apply_logged(job: UpdateJob) -> Option<SeriesChange> {
    let channel = job.channel().to_string();
    match job.apply() {
        Ok(change) => Some(change),
        Err(e) => {
            tracing::warn!(channel = %channel, error = %e, "Update job rejected by series");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_pending, assert_ready};

    use super::*;
    use crate::application::services::registry::ChannelRegistry;
    use crate::domain::event::{EventRecord, SymbolClass};

    fn trade(price: f64) -> EventRecord {
        EventRecord::trade(SymbolClass::Equity, "TSLA", price, 10, Some(1_700_000_000_000))
    }

    #[tokio::test]
    async fn applies_jobs_in_order() {
        let registry = ChannelRegistry::standard(10).unwrap();
        let (context, mut runner) = channel_context();
        registry.attach("stock_price", Arc::new(context)).unwrap();

        registry.route("stock_price", &trade(1.0));
        registry.route("stock_price", &trade(2.0));

        let first = runner.next_change().await.unwrap();
        assert_eq!(&*first.channel, "stock_price");
        assert_eq!(first.len, 1);
        let second = runner.next_change().await.unwrap();
        assert_eq!(second.len, 2);
        assert_eq!(registry.snapshot("stock_price").unwrap().len(), 2);
    }

    #[test]
    fn drain_ready_applies_backlog() {
        let registry = ChannelRegistry::standard(10).unwrap();
        registry.route("stock_volume", &trade(1.0));
        registry.route("stock_volume", &trade(2.0));
        registry.route("stock_volume", &trade(3.0));

        let (context, mut runner) = channel_context();
        registry.attach("stock_volume", Arc::new(context));

        let changes = runner.drain_ready();
        assert_eq!(changes.iter().map(|c| c.len).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(registry.pending_len("stock_volume"), Some(0));
    }

    #[test]
    fn next_change_waits_for_work() {
        let registry = ChannelRegistry::standard(10).unwrap();
        let (context, mut runner) = channel_context();
        registry.attach("stock_price", Arc::new(context));

        let mut next = tokio_test::task::spawn(runner.next_change());
        assert_pending!(next.poll());

        registry.route("stock_price", &trade(5.0));
        assert!(next.is_woken());
        let change = assert_ready!(next.poll()).unwrap();
        assert_eq!(change.latest.map(|p| p.timestamp.timestamp_millis()), Some(1_700_000_000_000));
    }

    #[test]
    fn dropped_runner_closes_context() {
        let registry = ChannelRegistry::standard(10).unwrap();
        let (context, runner) = channel_context();
        let observer = context.clone();
        registry.attach("stock_price", Arc::new(context));
        drop(runner);

        assert!(observer.is_closed());
        registry.route("stock_price", &trade(1.0));

        assert_eq!(registry.pending_len("stock_price"), Some(1));
        assert!(registry.session("stock_price").is_none());
    }

    #[test]
    fn into_pending_returns_accepted_jobs() {
        let registry = ChannelRegistry::standard(10).unwrap();
        let (context, runner) = channel_context();
        registry.attach("stock_price", Arc::new(context));
        registry.route("stock_price", &trade(1.0));
        registry.route("stock_price", &trade(2.0));

        let jobs = runner.into_pending();
        assert_eq!(jobs.len(), 2);
        assert!(registry.snapshot("stock_price").unwrap().is_empty());

        let lens: Vec<_> = jobs.into_iter().map(|job| job.apply().unwrap().len).collect();
        assert_eq!(lens, vec![1, 2]);

        // Later work stays with the registry.
        registry.route("stock_price", &trade(3.0));
        assert_eq!(registry.pending_len("stock_price"), Some(1));
    }

    #[tokio::test]
    async fn ends_when_contexts_dropped() {
        let (context, mut runner) = channel_context();
        drop(context);
        assert!(runner.next_change().await.is_none());
    }
}
