#![forbid(unsafe_code)]

//! Node identity and lifecycle.
//!
//! Every instantiated node owns a state cell, a cancellation scope that is
//! a child of its parent's scope, and optionally a set of hosted child
//! nodes. A [`NodeScope`] is the only handle node code gets; it can only be
//! created by the engine while instantiating a [`NodeToken`].
//!
//! Release is synchronous and total:
//!
//! 1. mark released (state access becomes fatal, subscriptions are dropped)
//! 2. cancel the scope (in-flight producers stop delivering)
//! 3. run [`Node::on_cleared`]
//! 4. release hosted children, depth-first
//!
//! [`Node::on_cleared`]: crate::token::Node::on_cleared

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use kioto_runtime::{
    CancellationSource, CancellationToken, Emitter, EventStream, Looper, Observable,
    ProducerError, SubId,
};
use uuid::Uuid;

use crate::context::{ContextError, ContextKey, ContextSupplier};
use crate::navigator::Navigator;
use crate::panes::{Pane, PaneSource};
use crate::token::{Node, NodeToken, NodeView};
use crate::violation::{Violation, confined, fail};

/// Process-unique node identity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Uuid);

impl NodeId {
    pub(crate) fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Everything the engine hands to a token when instantiating it.
pub(crate) struct BuildContext {
    pub(crate) id: NodeId,
    pub(crate) navigator: Navigator,
    pub(crate) context: Rc<ContextSupplier>,
    pub(crate) looper: Looper,
    pub(crate) parent_scope: CancellationToken,
    pub(crate) disposals: EventStream<NodeId>,
}

/// Type-erased live node, as held by stack records and hosts.
pub(crate) trait NodeHandle {
    fn id(&self) -> NodeId;
    fn pane(&self) -> Pane;
    /// Release the node and its hosted children, appending released ids.
    fn release(&self, released: &mut Vec<NodeId>);
}

pub(crate) struct NodeCore<S> {
    id: NodeId,
    state: Observable<S>,
    released: Cell<bool>,
    scope: CancellationSource,
    navigator: Navigator,
    context: Rc<ContextSupplier>,
    looper: Looper,
    disposals: EventStream<NodeId>,
    hosted: RefCell<Vec<Rc<dyn NodeHandle>>>,
    hosted_panes: Observable<Vec<Pane>>,
}

impl<S: Clone + PartialEq + 'static> NodeCore<S> {
    #[track_caller]
    fn active(&self, op: &'static str) {
        confined(&self.looper.confinement(), op);
        if self.released.get() {
            fail(Violation::ReleasedNode { id: self.id, op });
        }
    }

    fn release(&self, node: &dyn Node, released: &mut Vec<NodeId>) {
        if self.released.replace(true) {
            return;
        }
        self.scope.cancel();
        node.on_cleared();
        let hosted = std::mem::take(&mut *self.hosted.borrow_mut());
        for child in hosted.iter().rev() {
            child.release(released);
        }
        tracing::trace!(target: "kioto.node", id = %self.id, "node released");
        released.push(self.id);
    }
}

pub(crate) struct NodeInstance<N, S> {
    core: Rc<NodeCore<S>>,
    node: Rc<N>,
    pane: Pane,
}

impl<N: Node, S: Clone + PartialEq + 'static> NodeInstance<N, S> {
    pub(crate) fn build<V: NodeView<S>>(
        name: &'static str,
        build: BuildContext,
        initial_state: &dyn Fn() -> S,
        node: &dyn Fn(NodeScope<S>) -> N,
        view: &dyn Fn(&Rc<N>) -> V,
    ) -> Rc<dyn NodeHandle> {
        let core = Rc::new(NodeCore {
            id: build.id,
            state: Observable::new(initial_state()),
            released: Cell::new(false),
            scope: build.parent_scope.child(),
            navigator: build.navigator,
            context: build.context,
            looper: build.looper,
            disposals: build.disposals,
            hosted: RefCell::new(Vec::new()),
            hosted_panes: Observable::new(Vec::new()),
        });
        let node = Rc::new(node(NodeScope {
            core: Rc::clone(&core),
        }));
        let view = view(&node);
        let pane = Pane::new(
            core.id,
            name,
            Rc::new(NodePaneSource {
                core: Rc::clone(&core),
                view,
            }),
            core.navigator.clone(),
        );
        tracing::trace!(target: "kioto.node", id = %core.id, name, "node built");
        Rc::new(Self { core, node, pane })
    }
}

impl<N: Node, S: Clone + PartialEq + 'static> NodeHandle for NodeInstance<N, S> {
    fn id(&self) -> NodeId {
        self.core.id
    }

    fn pane(&self) -> Pane {
        self.pane.clone()
    }

    fn release(&self, released: &mut Vec<NodeId>) {
        self.core.release(self.node.as_ref(), released);
    }
}

struct NodePaneSource<S, V> {
    core: Rc<NodeCore<S>>,
    view: V,
}

// Pane reads bypass the released check: renderers keep drawing outgoing
// panes while their exit animation runs.
impl<S: Clone + PartialEq + 'static, V: NodeView<S>> PaneSource for NodePaneSource<S, V> {
    fn compose(&self) {
        self.core.state.with(|state| self.view.compose(state));
    }

    fn state_version(&self) -> u64 {
        self.core.state.version()
    }

    fn watch_state(&self, callback: Box<dyn Fn()>) -> kioto_runtime::Subscription {
        self.core.state.subscribe(move |_| callback())
    }

    fn hosted_panes(&self) -> &Observable<Vec<Pane>> {
        &self.core.hosted_panes
    }

    fn is_released(&self) -> bool {
        self.core.released.get()
    }
}

/// The node's handle on its own state, navigation and async work.
///
/// Cloneable; all clones refer to the same node.
pub struct NodeScope<S> {
    core: Rc<NodeCore<S>>,
}

impl<S> Clone for NodeScope<S> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<S: Clone + PartialEq + 'static> NodeScope<S> {
    /// This node's id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.core.id
    }

    /// `false` once the node has been released.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.core.released.get()
    }

    /// Navigator of the record this node belongs to.
    #[must_use]
    pub fn nav(&self) -> Navigator {
        self.core.navigator.clone()
    }

    /// A clone of the current state.
    ///
    /// # Panics
    ///
    /// Panics off the confinement thread or after release.
    #[track_caller]
    pub fn state(&self) -> S {
        self.core.active("NodeScope::state");
        self.core.state.get()
    }

    /// Read the state by reference.
    #[track_caller]
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.core.active("NodeScope::with_state");
        self.core.state.with(f)
    }

    /// Replace the state. Returns `true` if it changed.
    #[track_caller]
    pub fn set_state(&self, state: S) -> bool {
        self.core.active("NodeScope::set_state");
        self.core.state.set(state)
    }

    /// Mutate the state in place. Returns `true` if it changed.
    #[track_caller]
    pub fn update_state(&self, f: impl FnOnce(&mut S)) -> bool {
        self.core.active("NodeScope::update_state");
        self.core.state.update(f)
    }

    /// Look up a context value. A missing key is fatal.
    #[track_caller]
    pub fn context<T: 'static>(&self, key: &ContextKey<T>) -> Rc<T> {
        match self.try_context(key) {
            Ok(value) => value,
            Err(e) => fail(Violation::MissingDependency(e)),
        }
    }

    /// Look up a context value.
    pub fn try_context<T: 'static>(&self, key: &ContextKey<T>) -> Result<Rc<T>, ContextError> {
        confined(&self.core.looper.confinement(), "NodeScope::context");
        self.core.context.get(key)
    }

    /// Run `source` off the confinement thread and deliver its single
    /// result to `on_completed`, or its failure to `on_error`.
    ///
    /// Returns `None` when the node is already released.
    pub fn subscribe<T, P, E, C>(&self, source: P, on_error: E, on_completed: C) -> Option<SubId>
    where
        T: Send + 'static,
        P: FnOnce() -> Result<T, ProducerError> + Send + 'static,
        E: FnOnce(ProducerError) + 'static,
        C: FnOnce(T) + 'static,
    {
        let mut on_completed = Some(on_completed);
        self.stream_subscribe(
            move |emitter: &Emitter<T>| {
                emitter.emit(source()?);
                Ok(())
            },
            on_error,
            move |value| {
                if let Some(on_completed) = on_completed.take() {
                    on_completed(value);
                }
            },
        )
    }

    /// Drain the iterator built by `source` off the confinement thread,
    /// delivering each `Ok` item to `on_next`. The first `Err` ends the
    /// subscription and goes to `on_error`.
    pub fn flow_subscribe<T, I, P, E, F>(&self, source: P, on_error: E, on_next: F) -> Option<SubId>
    where
        T: Send + 'static,
        I: IntoIterator<Item = Result<T, ProducerError>>,
        P: FnOnce() -> I + Send + 'static,
        E: FnOnce(ProducerError) + 'static,
        F: FnMut(T) + 'static,
    {
        self.stream_subscribe(
            move |emitter: &Emitter<T>| {
                for item in source() {
                    if !emitter.emit(item?) {
                        break;
                    }
                }
                Ok(())
            },
            on_error,
            on_next,
        )
    }

    /// Run `producer` on a worker with an [`Emitter`]; emitted values are
    /// delivered to `on_next` on the confinement thread until the node is
    /// released.
    pub fn stream_subscribe<T, P, E, F>(&self, producer: P, on_error: E, on_next: F) -> Option<SubId>
    where
        T: Send + 'static,
        P: FnOnce(&Emitter<T>) -> Result<(), ProducerError> + Send + 'static,
        E: FnOnce(ProducerError) + 'static,
        F: FnMut(T) + 'static,
    {
        confined(&self.core.looper.confinement(), "NodeScope::subscribe");
        if self.core.released.get() {
            tracing::trace!(target: "kioto.node", id = %self.core.id, "subscribe on released node dropped");
            return None;
        }
        Some(
            self.core
                .looper
                .produce(self.core.scope.token(), producer, on_next, on_error),
        )
    }

    /// Replace the hosted children with nodes built from `tokens`.
    ///
    /// The previous set is fully released before the new set is built.
    /// Hosted nodes share this node's navigator.
    #[track_caller]
    pub fn host(&self, tokens: impl IntoIterator<Item = NodeToken>) {
        self.core.active("NodeScope::host");
        let core = &self.core;

        let old = std::mem::take(&mut *core.hosted.borrow_mut());
        let mut released = Vec::new();
        for child in old.iter().rev() {
            child.release(&mut released);
        }
        drop(old);
        for id in &released {
            core.disposals.emit(id);
        }

        let children: Vec<Rc<dyn NodeHandle>> = tokens
            .into_iter()
            .map(|token| {
                token.instantiate(BuildContext {
                    id: NodeId::new(),
                    navigator: core.navigator.clone(),
                    context: Rc::clone(&core.context),
                    looper: core.looper.clone(),
                    parent_scope: core.scope.token(),
                    disposals: core.disposals.clone(),
                })
            })
            .collect();
        let panes = children.iter().map(|child| child.pane()).collect();
        tracing::debug!(
            target: "kioto.node",
            host = %core.id,
            released = released.len(),
            hosted = children.len(),
            "hosted set replaced"
        );
        // The host may have been released by a child factory.
        if core.released.get() {
            let mut late = Vec::new();
            for child in children.iter().rev() {
                child.release(&mut late);
            }
            for id in &late {
                core.disposals.emit(id);
            }
            return;
        }
        *core.hosted.borrow_mut() = children;
        core.hosted_panes.set(panes);
    }

    /// Panes of the currently hosted children.
    #[must_use]
    pub fn hosted_panes(&self) -> Vec<Pane> {
        self.core.hosted_panes.get()
    }
}

impl<S> fmt::Debug for NodeScope<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeScope")
            .field("id", &self.core.id)
            .field("released", &self.core.released.get())
            .finish()
    }
}
