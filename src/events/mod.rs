//! # Event Bus
//!
//! Fan-out of committed mutations to live subscribers.
//!
//! Guarantees and policies:
//! - `publish` is called strictly after the store confirms a commit, while
//!   the commit's publish permit is still held, so per-collection event
//!   order equals commit order.
//! - Every subscriber re-evaluates the collection's *current* view rule
//!   against its own identity at publish time; a subscriber never receives
//!   an event for a record it could not view itself.
//! - Per-subscriber queues are bounded. A slow subscriber loses its oldest
//!   buffered events and receives a gap signal; publishers are never
//!   backpressured by subscriber speed.
//! - Disconnect closes the queue and releases its buffer immediately.

mod bus;
mod errors;
mod event;
mod subscriber;

pub use bus::EventBus;
pub use errors::{BusError, BusResult};
pub use event::{EventKind, RecordEvent};
pub use subscriber::{BusMessage, EventStream};
