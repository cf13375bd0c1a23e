//! Per-resource publish/subscribe for recap job events.
//!
//! - [`EventBus`]: the contract publishers and the push gateway share.
//! - [`Subscription`]: RAII handle; dropping it releases the channel.
//! - [`LocalEventBus`]: in-process channel registry for single-node runs.
//! - [`PgEventBus`]: `LISTEN/NOTIFY` bridge so a worker process can publish
//!   to subscribers living in the API process.
//!
//! Every implementation is fire-and-forget: events are delivered in publish
//! order to the subscribers connected at the time, and never replayed.

pub mod bus;
pub mod error;
pub mod local;
pub mod postgres;

pub use bus::{EventBus, Subscription};
pub use error::EventBusError;
pub use local::LocalEventBus;
pub use postgres::PgEventBus;
