//! Domain types for podcast ad generation jobs.
//!
//! Holds the job record, its state machine, component results and
//! creation-time input validation. Storage, providers and HTTP live in
//! the other workspace crates.

pub mod component;
pub mod error;
pub mod input;
pub mod job;
pub mod types;
