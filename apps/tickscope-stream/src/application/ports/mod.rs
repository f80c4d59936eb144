//! Port Interfaces
//!
//! Contracts the rendering side implements to receive series updates.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`ConsumerContext`]: an execution context that accepts [`UpdateJob`]s
//!   and runs them on its own schedule. Jobs are never executed inline by
//!   the producer; the context decides when to call [`UpdateJob::apply`].
//! - [`ExchangeNames`]: reference lookup from exchange id to display name.

use crate::application::services::scheduler::UpdateJob;

/// Errors returned when a job cannot be handed to a consumer.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The context has been torn down. The job is handed back so it can
    /// be retained for a later consumer.
    #[error("consumer context for channel '{}' is closed", .0.channel())]
    Closed(UpdateJob),
}

impl DeliveryError {
    /// Recover the job that could not be delivered.
    #[must_use]
    pub fn into_job(self) -> UpdateJob {
        match self {
            Self::Closed(job) => job,
        }
    }
}

/// Execution context of a series consumer (a rendering session).
///
/// `submit` must only enqueue: it is called while the channel's delivery
/// lock is held and from the feed's receive task.
#[cfg_attr(test, mockall::automock)]
pub trait ConsumerContext: Send + Sync {
    /// Hand a job to the context for later execution.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Closed`] with the job when the context can
    /// no longer run work.
    fn submit(&self, job: UpdateJob) -> Result<(), DeliveryError>;
}

/// Lookup of display names for the exchange ids carried by trades.
pub trait ExchangeNames: Send + Sync + std::fmt::Debug {
    /// Display name for `id`. Unknown ids still resolve to a label.
    fn name(&self, id: u32) -> String;
}

/// Names every exchange by its id (`"ID 4"`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericExchangeNames;

impl ExchangeNames for NumericExchangeNames {
    fn name(&self, id: u32) -> String {
        format!("ID {id}")
    }
}
