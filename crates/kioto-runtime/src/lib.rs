#![forbid(unsafe_code)]

//! Execution substrate for the kioto navigation engine.
//!
//! # Role in kioto
//! `kioto-runtime` owns everything the engine needs that is not navigation:
//! the single-thread confinement check, cooperative cancellation scopes,
//! single-threaded reactive cells, and the [`Looper`] that runs producers on
//! worker threads and delivers their output back on the confinement thread.
//!
//! # How it fits in the system
//! The `kioto` crate builds one [`Looper`] per UI thread. Every node owns a
//! [`CancellationSource`] scope; subscriptions started through
//! [`Looper::produce`] observe that scope and stop delivering the instant
//! the node is released.

pub mod cancellation;
pub mod config;
pub mod confinement;
pub mod effect_system;
pub mod looper;
pub mod reactive;
pub mod worker;

pub use cancellation::{CancellationSource, CancellationToken};
pub use config::{ConfigError, RuntimeConfig};
pub use confinement::{Confinement, ConfinementViolation};
pub use looper::{Emitter, Looper, ProducerError, SubId};
pub use reactive::{EventStream, Observable, Subscription};
pub use worker::WorkerPool;
