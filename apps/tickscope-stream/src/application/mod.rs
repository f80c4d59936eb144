//! Application Layer - Delivery of series updates to consumers.
//!
//! This layer owns the channel registry and the scheduler that moves
//! series mutations into whichever execution context the rendering side
//! has attached.

/// Port interfaces implemented by consumers of series updates.
pub mod ports;

/// Channel registry and update scheduling services.
pub mod services;
