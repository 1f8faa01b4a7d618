//! rigbridge-native: adapter for rigs controlled through a natively-linked
//! synchronous library.
//!
//! The wrapped library is blocking and, in general, not safe to call
//! reentrantly from multiple threads. Every call for a given device is
//! therefore serialized through a single dedicated worker thread that owns
//! the library handle exclusively; the async side talks to it over
//! channels and never touches the library directly.
//!
//! State is obtained by polling: a ticker requests a snapshot each
//! interval and only the fields that changed since the previous snapshot
//! are pushed as deltas.

pub mod adapter;
pub mod backend;
pub mod worker;

pub use adapter::NativeRigAdapter;
pub use backend::{RigBackend, RigSnapshot};
