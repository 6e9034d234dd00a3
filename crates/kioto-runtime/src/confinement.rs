#![forbid(unsafe_code)]

//! Single-thread confinement checks.
//!
//! Every mutation of navigation state, node state and navigator calls must
//! happen on the thread that created the [`Looper`](crate::Looper). Engine
//! handles are `Rc`-based and therefore `!Send`, so most violations are
//! rejected by the compiler; [`Confinement`] is the runtime backstop for
//! the entry points.

use std::fmt;
use std::thread::{self, ThreadId};

/// Identity of the confinement thread.
///
/// `Confinement` is `Copy + Send`, so it can be moved to any thread and
/// asked whether the current thread is the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confinement {
    owner: ThreadId,
}

/// A call was made from a thread other than the confinement thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinementViolation {
    /// Operation that was attempted.
    pub op: &'static str,
    /// Thread that owns the confined state.
    pub owner: ThreadId,
    /// Thread that made the call.
    pub caller: ThreadId,
}

impl fmt::Display for ConfinementViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` called from {:?}, but state is confined to {:?}",
            self.op, self.caller, self.owner
        )
    }
}

impl std::error::Error for ConfinementViolation {}

impl Confinement {
    /// Bind to the current thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// Thread that owns the confined state.
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns `true` when called from the owning thread.
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Verify the caller runs on the owning thread.
    pub fn verify(&self, op: &'static str) -> Result<(), ConfinementViolation> {
        let caller = thread::current().id();
        if caller == self.owner {
            Ok(())
        } else {
            Err(ConfinementViolation {
                op,
                owner: self.owner,
                caller,
            })
        }
    }

    /// Like [`verify`](Self::verify), but a violation is fatal.
    ///
    /// # Panics
    ///
    /// Panics when called from any thread other than the owner.
    #[track_caller]
    pub fn check(&self, op: &'static str) {
        if let Err(violation) = self.verify(op) {
            tracing::error!(
                target: "kioto.confinement",
                op = violation.op,
                "confinement violation"
            );
            panic!("confinement violation: {violation}");
        }
    }
}
