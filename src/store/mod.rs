//! # Record Store
//!
//! Per-collection in-memory authority over records, durably backed by an
//! append-only checksummed journal. Every mutation happens under its
//! collection shard's write lock: schema-version compare, uniqueness checks,
//! journal append and the in-memory apply are one atomic step, so no reader
//! ever observes a half-committed record and uniqueness can never race.
//!
//! Commit order is carried out of the store by a per-shard publish permit:
//! the permit is acquired inside the critical section and released by the
//! caller after the event bus has accepted the event, which makes event
//! order equal commit order without the store ever calling the bus.

mod cursor;
mod errors;
mod expand;
mod journal;
mod record;
mod store;

pub use cursor::{Cursor, SortKey, SortSpec};
pub use errors::{StoreError, StoreResult};
pub use expand::{expand_record, parse_expand_paths};
pub use journal::{JournalEntry, JournalWriter, replay};
pub use record::{new_record_id, Record};
pub use store::{CommitReceipt, ListPage, RecordStore};
