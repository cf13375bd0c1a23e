//! Domain types shared by every recap crate.
//!
//! This crate has zero internal dependencies so the queue, the event bus,
//! the API server and the worker process can all agree on the same
//! vocabulary:
//!
//! - [`status`]: the resource lifecycle and its transition table.
//! - [`job`]: job descriptors and the executor's outcome reports.
//! - [`events`]: events routed over the bus by resource id.
//! - [`quota`] / [`admission`]: quota windows, tiers and admission rejections.
//! - [`retry`]: automatic retry backoff and queue retention policies.

pub mod admission;
pub mod error;
pub mod events;
pub mod job;
pub mod quota;
pub mod retry;
pub mod status;
pub mod types;
