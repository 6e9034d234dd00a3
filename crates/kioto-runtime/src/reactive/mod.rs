//! Single-threaded reactive cells.
//!
//! - [`Observable`]: versioned value with change notification.
//! - [`EventStream`]: fan-out of discrete events.

pub mod event_stream;
pub mod observable;

pub use event_stream::EventStream;
pub use observable::{Observable, Subscription};
