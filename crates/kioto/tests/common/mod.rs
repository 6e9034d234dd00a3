//! Shared fixtures for the navigation integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kioto::{
    ActivePanes, Background, Navigator, Node, NodeId, NodeNav, NodeNavBuilder, NodeScope,
    NodeToken, Tag, Transition,
};
use kioto_runtime::{Looper, RuntimeConfig, Subscription};

/// Remembers which label each node was built from, plus a lifecycle log.
#[derive(Clone, Default)]
pub struct Registry {
    labels: Rc<RefCell<HashMap<NodeId, &'static str>>>,
    scopes: Rc<RefCell<HashMap<&'static str, NodeScope<u32>>>>,
    log: Rc<RefCell<Vec<String>>>,
}

pub struct Screen {
    pub label: &'static str,
    pub scope: NodeScope<u32>,
    registry: Registry,
}

impl Node for Screen {
    fn on_cleared(&self) {
        self.registry.log(format!("cleared:{}", self.label));
    }
}

impl Registry {
    /// A token building a [`Screen`] labelled `label`.
    pub fn token(&self, label: &'static str) -> NodeToken {
        let registry = self.clone();
        NodeToken::new(
            move |scope: NodeScope<u32>| {
                registry.labels.borrow_mut().insert(scope.id(), label);
                registry.scopes.borrow_mut().insert(label, scope.clone());
                registry.log(format!("built:{label}"));
                Screen {
                    label,
                    scope,
                    registry: registry.clone(),
                }
            },
            || 0u32,
            |_: &Rc<Screen>| |_: &u32| {},
        )
    }

    pub fn label(&self, id: NodeId) -> &'static str {
        self.labels.borrow().get(&id).copied().unwrap_or("?")
    }

    /// Scope of the most recent node built from `label`.
    pub fn scope(&self, label: &str) -> NodeScope<u32> {
        self.scopes
            .borrow()
            .get(label)
            .cloned()
            .unwrap_or_else(|| panic!("no node labelled {label}"))
    }

    pub fn log(&self, line: String) {
        self.log.borrow_mut().push(line);
    }

    pub fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

/// Compact view of a snapshot: foreground, background, transition.
pub type Snap = (&'static str, Option<&'static str>, Transition);

pub struct Harness {
    pub looper: Looper,
    pub nav: NodeNav,
    pub registry: Registry,
    snapshots: Rc<RefCell<Vec<ActivePanes>>>,
    _panes: Subscription,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_builder(|builder| builder)
    }

    pub fn with_builder(configure: impl FnOnce(NodeNavBuilder) -> NodeNavBuilder) -> Self {
        let looper = Looper::new(&RuntimeConfig::default()).expect("looper");
        let nav = configure(NodeNav::builder(&looper)).build();
        let snapshots = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&snapshots);
        let panes = nav.subscribe_panes(move |panes| sink.borrow_mut().push(panes.clone()));
        Self {
            looper,
            nav,
            registry: Registry::default(),
            snapshots,
            _panes: panes,
        }
    }

    pub fn token(&self, label: &'static str) -> NodeToken {
        self.registry.token(label)
    }

    /// Labels and tags of the stack, bottom first.
    pub fn stack(&self) -> Vec<(&'static str, Tag)> {
        self.nav
            .entries()
            .iter()
            .map(|entry| (self.registry.label(entry.id), entry.tag))
            .collect()
    }

    /// Navigator of the record built from `label`.
    pub fn navigator(&self, label: &str) -> Navigator {
        self.nav
            .entries()
            .iter()
            .find(|entry| self.registry.label(entry.id) == label)
            .map(|entry| entry.pane.navigator())
            .unwrap_or_else(|| panic!("no record labelled {label}"))
    }

    pub fn snap(&self) -> Snap {
        self.describe(&self.nav.active_panes().expect("snapshot"))
    }

    pub fn describe(&self, panes: &ActivePanes) -> Snap {
        let background = match &panes.background {
            None => None,
            Some(Background::Handled) => Some("handled"),
            Some(Background::Pane { pane, .. }) => Some(self.registry.label(pane.id())),
        };
        (
            self.registry.label(panes.foreground.id()),
            background,
            panes.transition,
        )
    }

    /// Every snapshot published so far.
    pub fn snapshots(&self) -> Vec<ActivePanes> {
        self.snapshots.borrow().clone()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.borrow().len()
    }
}

/// A node with no state and no registry entry.
pub struct Screenless;

impl Node for Screenless {}
