#![forbid(unsafe_code)]

//! Renderable projections of the stack.
//!
//! A [`Pane`] is what a renderer sees of one node: a way to compose its
//! view against the current state, change notifications, hosted child
//! panes and a back action. [`ActivePanes`] is the snapshot published
//! after every effective stack mutation.

use std::fmt;
use std::rc::Rc;

use kioto_runtime::{Observable, Subscription};

use crate::navigator::Navigator;
use crate::node::NodeId;
use crate::transition::Transition;

pub(crate) trait PaneSource {
    fn compose(&self);
    fn state_version(&self) -> u64;
    fn watch_state(&self, callback: Box<dyn Fn()>) -> Subscription;
    fn hosted_panes(&self) -> &Observable<Vec<Pane>>;
    fn is_released(&self) -> bool;
}

/// Renderable handle on one node. Equality is by node id.
#[derive(Clone)]
pub struct Pane {
    id: NodeId,
    name: &'static str,
    source: Rc<dyn PaneSource>,
    navigator: Navigator,
}

impl Pane {
    pub(crate) fn new(
        id: NodeId,
        name: &'static str,
        source: Rc<dyn PaneSource>,
        navigator: Navigator,
    ) -> Self {
        Self {
            id,
            name,
            source,
            navigator,
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Type name of the node.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the node's view against its current state.
    pub fn compose(&self) {
        self.source.compose();
    }

    /// Bumped on every state change; lets renderers skip recomposition.
    #[must_use]
    pub fn state_version(&self) -> u64 {
        self.source.state_version()
    }

    /// Call `callback` after every state change.
    pub fn watch_state(&self, callback: impl Fn() + 'static) -> Subscription {
        self.source.watch_state(Box::new(callback))
    }

    /// Panes of the nodes hosted inline by this node.
    #[must_use]
    pub fn hosted_panes(&self) -> Vec<Pane> {
        self.source.hosted_panes().get()
    }

    /// Call `callback` with the hosted panes now and after every change.
    pub fn watch_hosted(&self, callback: impl Fn(&[Pane]) + 'static) -> Subscription {
        self.source
            .hosted_panes()
            .subscribe_current(move |panes| callback(panes))
    }

    /// `true` once the node was released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.source.is_released()
    }

    /// The navigator of the record owning this pane.
    #[must_use]
    pub fn navigator(&self) -> Navigator {
        self.navigator.clone()
    }

    /// Go back from this pane's record.
    pub fn navigate_back(&self) {
        self.navigator.navigate_back();
    }
}

impl PartialEq for Pane {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Pane {}

impl fmt::Debug for Pane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pane")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// What sits behind the foreground pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    /// The record below the foreground.
    Pane {
        pane: Pane,
        /// The foreground opens a presented stack over this pane.
        presented: bool,
    },
    /// Only the root is on the stack, but a dismiss callback owns what is
    /// behind it. Not renderable by the engine.
    Handled,
}

impl Background {
    /// The background pane, if renderable.
    #[must_use]
    pub fn pane(&self) -> Option<&Pane> {
        match self {
            Self::Pane { pane, .. } => Some(pane),
            Self::Handled => None,
        }
    }
}

/// Snapshot published after every effective stack mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePanes {
    pub foreground: Pane,
    pub background: Option<Background>,
    pub transition: Transition,
    /// Ids of every record on the stack, bottom first.
    pub active_ids: Vec<NodeId>,
}

/// Host-side sink for snapshots and disposals.
pub trait Renderer {
    /// A new snapshot is current.
    fn on_active_panes(&self, panes: &ActivePanes);

    /// A node was released; saved UI state for it can be dropped.
    fn on_disposed(&self, _id: NodeId) {}
}

/// Keeps a [`Renderer`] attached. Dropping it detaches the renderer.
#[must_use = "dropping the binding detaches the renderer"]
pub struct RendererBinding {
    _subscriptions: Subscription,
}

impl RendererBinding {
    pub(crate) fn new(subscriptions: Subscription) -> Self {
        Self {
            _subscriptions: subscriptions,
        }
    }
}

impl fmt::Debug for RendererBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererBinding").finish_non_exhaustive()
    }
}
