//! rigbridge-accessory: adapter for accessory boxes speaking the
//! sequence-correlated line protocol.
//!
//! Requests go out as `C<seq>|<verb> <args>`; the box answers with one or
//! more `R<seq>|<hex-status>|<payload>` rows, a multi-row result repeating
//! the sequence and ending with an empty-payload terminator row.
//! Unsolicited status rows reuse the response shape with sequence 0 (or a
//! sequence the client never issued) and are not correlated to any
//! outstanding request.
//!
//! Several commands may be outstanding at once; a streaming multi-row
//! response never blocks an unrelated command.

pub mod adapter;
pub mod protocol;

pub use adapter::{AccessoryAdapter, Ack};
pub use protocol::ResponseRow;
