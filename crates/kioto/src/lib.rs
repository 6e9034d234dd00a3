#![forbid(unsafe_code)]

//! Stacks-of-stacks navigation engine.
//!
//! # Role in kioto
//! `kioto` tracks which nodes are on screen and in what history order.
//! Nodes are described by [`NodeToken`]s and pushed through a per-record
//! [`Navigator`]; the [`NodeNav`] stack model classifies every mutation
//! into a [`Transition`] and publishes an [`ActivePanes`] snapshot for the
//! renderer.
//!
//! # How it fits in the system
//! All engine state is confined to the thread of the
//! [`Looper`](kioto_runtime::Looper) it was built with. Asynchronous node
//! work runs on the looper's workers and is delivered back on that thread,
//! never after the node is released.
//!
//! ```
//! use std::rc::Rc;
//! use kioto::{Node, NodeNav, NodeScope, NodeToken, Transition};
//! use kioto_runtime::{Looper, RuntimeConfig};
//!
//! struct Home;
//! impl Node for Home {}
//!
//! let looper = Looper::new(&RuntimeConfig::default()).unwrap();
//! let nav = NodeNav::new(&looper);
//! nav.set_navigation(NodeToken::new(|_: NodeScope<()>| Home, || (), |_: &Rc<Home>| |_: &()| {}));
//!
//! let panes = nav.active_panes().unwrap();
//! assert_eq!(panes.transition, Transition::Replace);
//! assert!(panes.background.is_none());
//! ```

pub mod back;
pub mod context;
pub mod nav;
pub mod navigator;
pub mod node;
pub mod panes;
pub mod token;
pub mod transition;
pub mod violation;

pub use back::{BackEvent, BackGesture, BackOutcome};
pub use context::{ContextError, ContextKey, NodeContext};
pub use nav::{DismissCallback, NavEntry, NodeNav, NodeNavBuilder, PresentedStack};
pub use navigator::Navigator;
pub use node::{NodeId, NodeScope};
pub use panes::{ActivePanes, Background, Pane, Renderer, RendererBinding};
pub use token::{Node, NodeToken, NodeView};
pub use transition::{Direction, NavigationKind, Tag, Transition};
pub use violation::Violation;
