#![forbid(unsafe_code)]

//! Per-record navigation capability.
//!
//! Every operation first seeks to the owning record: records above it are
//! released before the operation applies. Once the record leaves the stack
//! the navigator turns inert and every call is ignored, which tolerates a
//! node's in-flight callback racing a navigation triggered elsewhere.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::nav::{NavOp, NavShared, NodeNav, NodeOp};
use crate::node::NodeId;
use crate::token::NodeToken;

/// Navigation handle bound to one stack record. Hosted nodes share their
/// host's navigator.
#[derive(Clone)]
pub struct Navigator {
    record: NodeId,
    nav: Weak<NavShared>,
    valid: Rc<Cell<bool>>,
}

impl Navigator {
    pub(crate) fn new(record: NodeId, nav: Weak<NavShared>, valid: Rc<Cell<bool>>) -> Self {
        Self { record, nav, valid }
    }

    /// Id of the record this navigator is bound to.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.record
    }

    /// `false` once the record left the stack.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid.get() && self.nav.strong_count() > 0
    }

    /// Push `token` as a sibling, or as a new segment when this record's
    /// segment top is the root.
    pub fn navigate(&self, token: NodeToken) {
        self.submit("Navigator::navigate", NodeOp::Navigate(token));
    }

    /// Push `token` as the root of a new segment.
    pub fn begin_stack(&self, token: NodeToken) {
        self.submit("Navigator::begin_stack", NodeOp::BeginStack(token));
    }

    /// Swap this record for `token`, keeping its tag. Replacing the root
    /// resets the whole stack.
    pub fn replace(&self, token: NodeToken) {
        self.submit("Navigator::replace", NodeOp::Replace(token));
    }

    /// Drop this record's whole segment and push `token` as a new segment.
    pub fn replace_stack(&self, token: NodeToken) {
        self.submit("Navigator::replace_stack", NodeOp::ReplaceStack(token));
    }

    /// Release this record (and everything above it).
    pub fn navigate_back(&self) {
        self.submit("Navigator::navigate_back", NodeOp::Back);
    }

    /// Release the child records of this segment down to its root.
    pub fn navigate_up(&self) {
        self.submit("Navigator::navigate_up", NodeOp::Up);
    }

    /// Release everything down to the root record.
    pub fn pop_to_root(&self) {
        self.submit("Navigator::pop_to_root", NodeOp::PopToRoot);
    }

    /// Replace the whole stack with `token` as the new root.
    pub fn reset_navigation(&self, token: NodeToken) {
        self.submit("Navigator::reset_navigation", NodeOp::Reset(token));
    }

    fn submit(&self, op_name: &'static str, op: NodeOp) {
        let Some(shared) = self.nav.upgrade() else {
            tracing::trace!(target: "kioto.nav", op = op_name, "navigation gone, call ignored");
            return;
        };
        let nav = NodeNav::from_shared(shared);
        nav.check(op_name);
        if !self.valid.get() {
            tracing::trace!(
                target: "kioto.nav",
                op = op_name,
                record = %self.record,
                "invalid navigator, call ignored"
            );
            return;
        }
        nav.submit(NavOp::Node {
            origin: self.record,
            valid: Rc::clone(&self.valid),
            op,
        });
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("record", &self.record)
            .field("valid", &self.is_valid())
            .finish()
    }
}
