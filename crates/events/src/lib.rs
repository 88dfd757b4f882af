//! Job lifecycle event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope.
//! - [`event_types`]: the dot-separated names published by the pipeline.

pub mod bus;

pub use bus::{event_types, EventBus, PlatformEvent};
