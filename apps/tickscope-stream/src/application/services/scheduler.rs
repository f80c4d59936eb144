//! Update Scheduler
//!
//! Moves series mutations from the feed tasks into the consumer's
//! execution context.
//!
//! # Delivery Rules
//!
//! - A mutation is never applied on the producer's task. It is wrapped in
//!   an [`UpdateJob`] and submitted to the attached [`ConsumerContext`],
//!   which applies it when it gets to it.
//! - While no consumer is attached, jobs wait in a FIFO pending queue.
//! - The pending queue is flushed when a consumer attaches and before
//!   every new job is scheduled, so jobs always reach the consumer in the
//!   order they were scheduled.
//! - If a context refuses a job (it has been torn down), the job goes back
//!   to the head of the queue, the attachment is dropped and nothing is
//!   lost; the next consumer to attach receives the whole backlog.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::application::ports::{ConsumerContext, DeliveryError};
use crate::application::services::registry::ChannelEntry;
use crate::domain::series::{Point, RollingSeries, SeriesError, SeriesValue};

/// A series shared between the registry and the jobs that mutate it.
pub type SharedSeries = Arc<Mutex<RollingSeries>>;

// =============================================================================
// Session Identity
// =============================================================================

/// Identifies one attachment of a consumer to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// A change to a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mutation {
    /// Append one point.
    Append(Point),
    /// Clear the series.
    Reset,
}

impl Mutation {
    /// Append mutation for a value at `timestamp`.
    #[must_use]
    pub const fn append(timestamp: DateTime<Utc>, value: SeriesValue) -> Self {
        Self::Append(Point { timestamp, value })
    }
}

/// A mutation bound to the series it targets, ready to run in a consumer
/// context.
#[derive(Debug)]
pub struct UpdateJob {
    channel: Arc<str>,
    series: SharedSeries,
    mutation: Mutation,
}

impl UpdateJob {
    fn new(entry: &ChannelEntry, mutation: Mutation) -> Self {
        Self {
            channel: entry.shared_name(),
            series: entry.shared_series(),
            mutation,
        }
    }

    /// Channel the job belongs to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The pending mutation.
    #[must_use]
    pub const fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    /// Apply the mutation. Call this from the consumer's own context.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::KindMismatch`] when an appended value does not
    /// fit the series.
    pub fn apply(self) -> Result<SeriesChange, SeriesError> {
        let mut series = self.series.lock();
        match self.mutation {
            Mutation::Append(point) => series.append(point.timestamp, point.value)?,
            Mutation::Reset => series.reset(),
        }

        Ok(SeriesChange {
            channel: self.channel,
            len: series.len(),
            padded_range: series.padded_range(),
            latest: series.latest().copied(),
            was_reset: matches!(self.mutation, Mutation::Reset),
        })
    }
}

/// Change notification produced by applying a job.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesChange {
    /// Channel whose series changed.
    pub channel: Arc<str>,
    /// Number of points after the change.
    pub len: usize,
    /// Padded value range after the change.
    pub padded_range: (f64, f64),
    /// Most recent point after the change.
    pub latest: Option<Point>,
    /// True when the change cleared the series.
    pub was_reset: bool,
}

// =============================================================================
// Per-Channel Delivery State
// =============================================================================

struct Attachment {
    session: SessionId,
    context: Arc<dyn ConsumerContext>,
}

/// Attached consumer and pending jobs of one channel.
#[derive(Default)]
pub struct DeliveryQueue {
    attachment: Option<Attachment>,
    pending: VecDeque<UpdateJob>,
}

impl DeliveryQueue {
    /// Jobs waiting for a consumer.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Session of the attached consumer.
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        self.attachment.as_ref().map(|a| a.session)
    }

    fn context(&self) -> Option<Arc<dyn ConsumerContext>> {
        self.attachment.as_ref().map(|a| Arc::clone(&a.context))
    }
}

impl fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("session", &self.session())
            .field("pending", &self.pending.len())
            .finish()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Counters describing scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Jobs accepted by a consumer context.
    pub delivered: u64,
    /// Jobs placed in a pending queue.
    pub queued: u64,
    /// Submissions refused by a closed context.
    pub failed: u64,
}

/// Hands mutations to attached consumers, queueing them otherwise.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    delivered: AtomicU64,
    queued: AtomicU64,
    failed: AtomicU64,
}

impl UpdateScheduler {
    /// Create a scheduler with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a mutation of `entry`'s series.
    ///
    /// Flushes any backlog first so the new job lands behind it.
    pub fn schedule(&self, entry: &ChannelEntry, mutation: Mutation) {
        let mut delivery = entry.delivery().lock();
        self.flush_locked(entry.name(), &mut delivery);

        let job = UpdateJob::new(entry, mutation);
        let context = if delivery.pending.is_empty() {
            delivery.context()
        } else {
            None
        };

        match context {
            Some(context) => {
                if let Err(job) = self.submit(entry.name(), context.as_ref(), job) {
                    delivery.attachment = None;
                    delivery.pending.push_back(job);
                }
            }
            None => self.enqueue(entry.name(), &mut delivery, job),
        }
    }

    /// Drain the pending queue into the attached consumer.
    ///
    /// Returns the number of jobs delivered.
    pub fn flush_pending(&self, entry: &ChannelEntry) -> usize {
        let mut delivery = entry.delivery().lock();
        self.flush_locked(entry.name(), &mut delivery)
    }

    /// Attach a consumer, replacing any previous one, and flush the backlog
    /// into it.
    pub fn attach(&self, entry: &ChannelEntry, context: Arc<dyn ConsumerContext>) -> SessionId {
        let session = SessionId::new();
        let mut delivery = entry.delivery().lock();

        if let Some(previous) = delivery.attachment.replace(Attachment { session, context }) {
            tracing::debug!(
                channel = entry.name(),
                previous = %previous.session,
                session = %session,
                "Consumer superseded"
            );
        }

        let flushed = self.flush_locked(entry.name(), &mut delivery);
        tracing::debug!(
            channel = entry.name(),
            session = %session,
            flushed,
            "Consumer attached"
        );
        session
    }

    /// Detach the current consumer. Later jobs are queued.
    pub fn detach(&self, entry: &ChannelEntry) -> Option<SessionId> {
        let detached = entry.delivery().lock().attachment.take().map(|a| a.session);
        if let Some(session) = detached {
            tracing::debug!(channel = entry.name(), session = %session, "Consumer detached");
        }
        detached
    }

    /// Snapshot of the scheduler counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn flush_locked(&self, channel: &str, delivery: &mut DeliveryQueue) -> usize {
        if delivery.pending.is_empty() {
            return 0;
        }
        let Some(context) = delivery.context() else {
            return 0;
        };

        let mut flushed = 0;
        while let Some(job) = delivery.pending.pop_front() {
            match self.submit(channel, context.as_ref(), job) {
                Ok(()) => flushed += 1,
                Err(job) => {
                    delivery.pending.push_front(job);
                    delivery.attachment = None;
                    break;
                }
            }
        }

        if flushed > 0 {
            tracing::debug!(
                channel,
                flushed,
                remaining = delivery.pending.len(),
                "Flushed pending updates"
            );
        }
        flushed
    }

    fn submit(
        &self,
        channel: &str,
        context: &dyn ConsumerContext,
        job: UpdateJob,
    ) -> Result<(), UpdateJob> {
        match context.submit(job) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    channel,
                    error = %err,
                    "Update delivery failed, retaining for next consumer"
                );
                Err(err.into_job())
            }
        }
    }

    fn enqueue(&self, channel: &str, delivery: &mut DeliveryQueue, job: UpdateJob) {
        if matches!(job.mutation, Mutation::Reset) && !delivery.pending.is_empty() {
            let discarded = delivery.pending.len();
            delivery.pending.clear();
            tracing::trace!(channel, discarded, "Reset superseded pending updates");
        }

        delivery.pending.push_back(job);
        self.queued.fetch_add(1, Ordering::Relaxed);
    }
}
