#![forbid(unsafe_code)]

//! Node descriptors.
//!
//! A [`NodeToken`] pairs a node factory, an initial-state factory and a
//! view factory. It is the unit every navigation operation takes; the
//! engine instantiates it into a live node when a record is pushed.
//!
//! ```
//! use std::rc::Rc;
//! use kioto::{Node, NodeScope, NodeToken};
//!
//! struct Counter {
//!     scope: NodeScope<u32>,
//! }
//!
//! impl Node for Counter {}
//!
//! impl Counter {
//!     fn increment(&self) {
//!         self.scope.update_state(|n| *n += 1);
//!     }
//! }
//!
//! let token = NodeToken::new(
//!     |scope| Counter { scope },
//!     || 0u32,
//!     |_node: &Rc<Counter>| |count: &u32| println!("count = {count}"),
//! );
//! assert!(token.name().ends_with("Counter"));
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::node::{BuildContext, NodeHandle, NodeInstance, NodeScope};

/// Behavior of a live node.
pub trait Node: 'static {
    /// Runs once when the node is released, after its scope is cancelled
    /// and before hosted children are released.
    fn on_cleared(&self) {}
}

/// Render hook for a node's state. Rendering itself is up to the host.
pub trait NodeView<S>: 'static {
    fn compose(&self, state: &S);
}

impl<S, F> NodeView<S> for F
where
    F: Fn(&S) + 'static,
{
    fn compose(&self, state: &S) {
        self(state)
    }
}

pub(crate) trait NodeSpec {
    fn name(&self) -> &'static str;
    fn instantiate(&self, build: BuildContext) -> Rc<dyn NodeHandle>;
}

struct TypedSpec<N, S, V, FN, FS, FV> {
    node: FN,
    state: FS,
    view: FV,
    _marker: PhantomData<fn() -> (N, S, V)>,
}

impl<N, S, V, FN, FS, FV> NodeSpec for TypedSpec<N, S, V, FN, FS, FV>
where
    N: Node,
    S: Clone + PartialEq + 'static,
    V: NodeView<S>,
    FN: Fn(NodeScope<S>) -> N + 'static,
    FS: Fn() -> S + 'static,
    FV: Fn(&Rc<N>) -> V + 'static,
{
    fn name(&self) -> &'static str {
        std::any::type_name::<N>()
    }

    fn instantiate(&self, build: BuildContext) -> Rc<dyn NodeHandle> {
        NodeInstance::build(self.name(), build, &self.state, &self.node, &self.view)
    }
}

/// Immutable, cheaply cloneable node descriptor.
#[derive(Clone)]
pub struct NodeToken {
    spec: Rc<dyn NodeSpec>,
}

impl NodeToken {
    /// Describe a node type.
    ///
    /// `node` receives the node's [`NodeScope`]; `initial_state` runs once
    /// per instantiation; `view` receives the constructed node.
    pub fn new<N, S, V>(
        node: impl Fn(NodeScope<S>) -> N + 'static,
        initial_state: impl Fn() -> S + 'static,
        view: impl Fn(&Rc<N>) -> V + 'static,
    ) -> Self
    where
        N: Node,
        S: Clone + PartialEq + 'static,
        V: NodeView<S>,
    {
        Self {
            spec: Rc::new(TypedSpec {
                node,
                state: initial_state,
                view,
                _marker: PhantomData,
            }),
        }
    }

    /// Type name of the node this token builds.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.spec.name()
    }

    pub(crate) fn instantiate(&self, build: BuildContext) -> Rc<dyn NodeHandle> {
        self.spec.instantiate(build)
    }
}

impl fmt::Debug for NodeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeToken").field(&self.name()).finish()
    }
}
