#![forbid(unsafe_code)]

//! Fatal precondition failures.
//!
//! These indicate a programming error in host or node code. They are
//! logged at ERROR under `kioto.violation` and then abort the call with a
//! panic; no partial mutation is committed before the check.

use std::fmt;

use kioto_runtime::{Confinement, ConfinementViolation};

use crate::context::ContextError;
use crate::node::NodeId;

/// A broken engine precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Engine state touched from a thread other than the confinement thread.
    Confinement(ConfinementViolation),
    /// State read, update or hosting on a node whose record left the stack.
    ReleasedNode {
        /// The released node.
        id: NodeId,
        /// Operation that was attempted.
        op: &'static str,
    },
    /// Lookup of a context key nobody provided.
    MissingDependency(ContextError),
    /// A mutation left the navigation stack empty.
    EmptyStack,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confinement(v) => write!(f, "confinement violation: {v}"),
            Self::ReleasedNode { id, op } => {
                write!(f, "`{op}` called on released node {id}")
            }
            Self::MissingDependency(e) => write!(f, "missing dependency: {e}"),
            Self::EmptyStack => write!(f, "navigation stack is empty after a mutation"),
        }
    }
}

impl std::error::Error for Violation {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Confinement(v) => Some(v),
            Self::MissingDependency(e) => Some(e),
            Self::ReleasedNode { .. } | Self::EmptyStack => None,
        }
    }
}

/// Log `violation` and abort the current call.
#[track_caller]
pub(crate) fn fail(violation: Violation) -> ! {
    tracing::error!(target: "kioto.violation", %violation, "fatal engine violation");
    panic!("{violation}");
}

/// Abort unless called on the confinement thread.
#[track_caller]
pub(crate) fn confined(confinement: &Confinement, op: &'static str) {
    if let Err(v) = confinement.verify(op) {
        fail(Violation::Confinement(v));
    }
}
