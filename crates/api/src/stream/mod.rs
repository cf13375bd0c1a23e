//! Push gateway: one event-bus subscription turned into a long-lived
//! `text/event-stream` response.
//!
//! - [`frame`]: wire encoding of the `connected`, event and keep-alive frames.
//! - [`manager`]: registry of open sessions, used for shutdown.
//! - [`session`]: the per-connection forwarding loop.
//! - [`handler`]: `GET /summaries/{id}/events`.

pub mod frame;
pub mod handler;
pub mod manager;
pub mod session;

pub use manager::StreamManager;
