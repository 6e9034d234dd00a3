#![forbid(unsafe_code)]

//! The stack model.
//!
//! [`NodeNav`] owns the navigation stack: an ordered list of records
//! segmented by their [`Tag`]s into stacks-of-stacks.
//!
//! ```text
//!   index   0        1        2        3
//!         ┌──────┬────────┬────────┬────────┐
//!         │ ROOT │ STACK  │ CHILD  │ CHILD  │
//!         │  A   │   B    │   C    │   D    │
//!         └──────┴────────┴────────┴────────┘
//!         └ seg ┘└────────── segment ────────┘
//! ```
//!
//! Every mutation goes through one routine: pop records while a release
//! predicate holds, optionally push one record, classify the transition
//! and publish an [`ActivePanes`] snapshot. The first record is protected:
//! a `Pop` that would empty the stack stops at the root and invokes the
//! root-dismiss callback instead, if one was installed.
//!
//! Operations requested while another one runs (from a node factory, a
//! cleanup hook, a dismiss callback or a renderer) are queued and run
//! right after it, in call order.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use kioto_runtime::{CancellationSource, EventStream, Looper, Observable, Subscription};
use tracing::field::Empty;

use crate::back::{BackEvent, BackGesture, BackOutcome};
use crate::context::{ContextSupplier, NodeContext};
use crate::navigator::Navigator;
use crate::node::{BuildContext, NodeHandle, NodeId};
use crate::panes::{ActivePanes, Background, Pane, Renderer, RendererBinding};
use crate::token::NodeToken;
use crate::transition::{NavigationKind, Tag, TransitionInput, classify};
use crate::violation::{Violation, confined, fail};

/// Callback run instead of popping the root.
pub type DismissCallback = Rc<dyn Fn()>;

type DismissHandler = Rc<dyn Fn(&NodeNav, &NodeToken) -> Option<DismissCallback>>;

pub(crate) enum NodeOp {
    Navigate(NodeToken),
    BeginStack(NodeToken),
    Replace(NodeToken),
    ReplaceStack(NodeToken),
    Back,
    Up,
    PopToRoot,
    Reset(NodeToken),
}

pub(crate) enum NavOp {
    SetNavigation(NodeToken),
    Present {
        token: NodeToken,
        slot: Option<Rc<PresentSlot>>,
    },
    Node {
        origin: NodeId,
        valid: Rc<Cell<bool>>,
        op: NodeOp,
    },
    UnwindTo(usize),
    Release,
}

impl NavOp {
    fn name(&self) -> &'static str {
        match self {
            Self::SetNavigation(_) => "set_navigation",
            Self::Present { .. } => "present_stack",
            Self::Node { op, .. } => match op {
                NodeOp::Navigate(_) => "navigate",
                NodeOp::BeginStack(_) => "begin_stack",
                NodeOp::Replace(_) => "replace",
                NodeOp::ReplaceStack(_) => "replace_stack",
                NodeOp::Back => "navigate_back",
                NodeOp::Up => "navigate_up",
                NodeOp::PopToRoot => "pop_to_root",
                NodeOp::Reset(_) => "reset_navigation",
            },
            Self::UnwindTo(_) => "unwind_to",
            Self::Release => "release",
        }
    }

    /// Drop the waiter of a present that will never run.
    fn abandon(self) {
        if let Self::Present {
            slot: Some(slot), ..
        } = self
        {
            slot.sender.borrow_mut().take();
        }
    }
}

pub(crate) struct PresentSlot {
    index: Cell<Option<usize>>,
    abandoned: Cell<bool>,
    sender: RefCell<Option<oneshot::Sender<()>>>,
}

struct NodeRecord {
    id: NodeId,
    tag: Tag,
    token: NodeToken,
    handle: Rc<dyn NodeHandle>,
    pane: Pane,
    valid: Rc<Cell<bool>>,
}

struct PresentedRecord {
    index: usize,
    signal: Option<oneshot::Sender<()>>,
}

impl PresentedRecord {
    fn resolve(self) {
        if let Some(signal) = self.signal {
            // The waiter may already be gone.
            let _ = signal.send(());
        }
    }
}

#[derive(Default)]
struct NavState {
    stack: Vec<NodeRecord>,
    presented: Vec<PresentedRecord>,
    on_root_dismiss: Option<DismissCallback>,
    released: bool,
}

/// Pop and signal every presented record whose boundary is at or above
/// `len`. Returns the lowest resolved index.
///
/// Signals go out while the record is popped, before any node hook or
/// subscriber runs, so a waiter dropped from one of those sees the present
/// as finished.
fn resolve_presented(presented: &mut Vec<PresentedRecord>, len: usize) -> Option<usize> {
    let mut lowest = None;
    while presented.last().is_some_and(|p| p.index >= len) {
        if let Some(record) = presented.pop() {
            lowest = Some(record.index);
            record.resolve();
        }
    }
    lowest
}

pub(crate) struct NavShared {
    looper: Looper,
    context: Rc<ContextSupplier>,
    root_scope: CancellationSource,
    dismiss_handler: Option<DismissHandler>,
    state: RefCell<NavState>,
    busy: Cell<bool>,
    queue: RefCell<VecDeque<NavOp>>,
    panes: Observable<Option<ActivePanes>>,
    disposals: EventStream<NodeId>,
    back: Observable<BackGesture>,
}

impl Drop for NavShared {
    fn drop(&mut self) {
        for op in self.queue.get_mut().drain(..) {
            op.abandon();
        }
        let state = self.state.get_mut();
        if state.released {
            return;
        }
        let mut released = Vec::new();
        for record in state.stack.drain(..).rev() {
            record.valid.set(false);
            record.handle.release(&mut released);
        }
        self.root_scope.cancel();
        tracing::debug!(target: "kioto.nav", released = released.len(), "navigation dropped");
    }
}

struct BusyGuard<'a>(&'a Cell<bool>);

impl<'a> BusyGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// One record as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub id: NodeId,
    pub tag: Tag,
    /// Type name of the node.
    pub name: &'static str,
    pub pane: Pane,
}

/// Builder for [`NodeNav`].
pub struct NodeNavBuilder {
    looper: Looper,
    context: NodeContext,
    dismiss_handler: Option<DismissHandler>,
}

impl NodeNavBuilder {
    /// Context values made available to every node.
    #[must_use]
    pub fn context(mut self, context: NodeContext) -> Self {
        self.context = context;
        self
    }

    /// Asked each time a new root is installed for a callback that runs
    /// instead of popping that root.
    #[must_use]
    pub fn on_root_dismiss(
        mut self,
        handler: impl Fn(&NodeNav, &NodeToken) -> Option<DismissCallback> + 'static,
    ) -> Self {
        self.dismiss_handler = Some(Rc::new(handler));
        self
    }

    /// Build the navigation. Must run on the looper's thread.
    #[track_caller]
    pub fn build(self) -> NodeNav {
        confined(&self.looper.confinement(), "NodeNav::build");
        NodeNav {
            shared: Rc::new(NavShared {
                context: Rc::new(ContextSupplier::new(&self.context)),
                looper: self.looper,
                root_scope: CancellationSource::new(),
                dismiss_handler: self.dismiss_handler,
                state: RefCell::new(NavState::default()),
                busy: Cell::new(false),
                queue: RefCell::new(VecDeque::new()),
                panes: Observable::new(None),
                disposals: EventStream::new(),
                back: Observable::new(BackGesture::Idle),
            }),
        }
    }
}

/// Handle on one navigation tree. Cheap to clone; confined to the thread
/// of its [`Looper`].
#[derive(Clone)]
pub struct NodeNav {
    shared: Rc<NavShared>,
}

impl NodeNav {
    /// Start building a navigation driven by `looper`.
    #[must_use]
    pub fn builder(looper: &Looper) -> NodeNavBuilder {
        NodeNavBuilder {
            looper: looper.clone(),
            context: NodeContext::new(),
            dismiss_handler: None,
        }
    }

    /// Navigation with an empty context and no root-dismiss handler.
    #[track_caller]
    pub fn new(looper: &Looper) -> Self {
        Self::builder(looper).build()
    }

    pub(crate) fn from_shared(shared: Rc<NavShared>) -> Self {
        Self { shared }
    }

    #[track_caller]
    pub(crate) fn check(&self, op: &'static str) {
        confined(&self.shared.looper.confinement(), op);
    }

    /// Tear down the stack and install `token` as the new root.
    #[track_caller]
    pub fn set_navigation(&self, token: NodeToken) {
        self.check("NodeNav::set_navigation");
        self.submit(NavOp::SetNavigation(token));
    }

    /// Push `token` as a new presented segment.
    #[track_caller]
    pub fn present_stack(&self, token: NodeToken) {
        self.check("NodeNav::present_stack");
        self.submit(NavOp::Present { token, slot: None });
    }

    /// Present `token` now and return a future that resolves once the
    /// stack unwinds back below the presented segment.
    ///
    /// Dropping the future before it resolves unwinds the segment.
    #[track_caller]
    pub fn await_present_stack(&self, token: NodeToken) -> PresentedStack {
        self.check("NodeNav::await_present_stack");
        let (sender, receiver) = oneshot::channel();
        let slot = Rc::new(PresentSlot {
            index: Cell::new(None),
            abandoned: Cell::new(false),
            sender: RefCell::new(Some(sender)),
        });
        self.submit(NavOp::Present {
            token,
            slot: Some(Rc::clone(&slot)),
        });
        PresentedStack {
            receiver,
            slot,
            nav: Rc::downgrade(&self.shared),
            finished: false,
        }
    }

    /// Release every node, resolve every presented waiter and turn every
    /// later call into a no-op.
    #[track_caller]
    pub fn release(&self) {
        self.check("NodeNav::release");
        self.submit(NavOp::Release);
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.shared.state.borrow().released
    }

    /// The current snapshot, if any.
    #[must_use]
    pub fn active_panes(&self) -> Option<ActivePanes> {
        self.check("NodeNav::active_panes");
        self.shared.panes.get()
    }

    /// Receive the current snapshot now (if one exists) and every later one.
    #[track_caller]
    pub fn subscribe_panes(&self, callback: impl Fn(&ActivePanes) + 'static) -> Subscription {
        self.check("NodeNav::subscribe_panes");
        self.shared.panes.subscribe_current(move |panes| {
            if let Some(panes) = panes {
                callback(panes);
            }
        })
    }

    /// Receive the id of every released node.
    #[track_caller]
    pub fn subscribe_disposals(&self, callback: impl Fn(NodeId) + 'static) -> Subscription {
        self.check("NodeNav::subscribe_disposals");
        self.shared.disposals.subscribe(move |id| callback(*id))
    }

    /// Receive back-gesture feedback.
    #[track_caller]
    pub fn subscribe_back(&self, callback: impl Fn(BackGesture) + 'static) -> Subscription {
        self.check("NodeNav::subscribe_back");
        self.shared.back.subscribe(move |gesture| callback(*gesture))
    }

    /// Attach `renderer` to snapshots and disposals.
    #[track_caller]
    pub fn bind_renderer(&self, renderer: Rc<dyn Renderer>) -> RendererBinding {
        let on_panes = Rc::clone(&renderer);
        let panes = self.subscribe_panes(move |panes| on_panes.on_active_panes(panes));
        let disposals = self.subscribe_disposals(move |id| renderer.on_disposed(id));
        RendererBinding::new(Subscription::merge(vec![panes, disposals]))
    }

    /// Feed a platform back event.
    ///
    /// Ignored when the current snapshot has nothing behind the foreground.
    #[track_caller]
    pub fn on_back(&self, event: BackEvent) -> BackOutcome {
        self.check("NodeNav::on_back");
        let Some(panes) = self.shared.panes.get() else {
            return BackOutcome::Ignored;
        };
        if panes.background.is_none() {
            self.shared.back.set(BackGesture::Idle);
            return BackOutcome::Ignored;
        }
        let (next, outcome) = self.shared.back.get().apply(event);
        self.shared.back.set(next);
        tracing::trace!(target: "kioto.back", ?event, ?outcome, "back event");
        if outcome == BackOutcome::Committed {
            panes.foreground.navigate_back();
        }
        outcome
    }

    /// Current gesture feedback.
    #[must_use]
    pub fn back_gesture(&self) -> BackGesture {
        self.shared.back.get()
    }

    /// The stack, bottom first.
    #[must_use]
    pub fn entries(&self) -> Vec<NavEntry> {
        self.check("NodeNav::entries");
        self.shared
            .state
            .borrow()
            .stack
            .iter()
            .map(|record| NavEntry {
                id: record.id,
                tag: record.tag,
                name: record.token.name(),
                pane: record.pane.clone(),
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.borrow().stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The looper driving this navigation.
    #[must_use]
    pub fn looper(&self) -> &Looper {
        &self.shared.looper
    }

    pub(crate) fn submit(&self, op: NavOp) {
        self.shared.queue.borrow_mut().push_back(op);
        if self.shared.busy.get() {
            return;
        }
        let _busy = BusyGuard::enter(&self.shared.busy);
        loop {
            // Not `while let`: the queue must not stay borrowed while an op runs.
            let next = self.shared.queue.borrow_mut().pop_front();
            let Some(op) = next else {
                break;
            };
            self.execute(op);
        }
    }

    fn execute(&self, op: NavOp) {
        if self.shared.state.borrow().released {
            tracing::trace!(target: "kioto.nav", op = op.name(), "navigation released, op ignored");
            op.abandon();
            return;
        }
        match op {
            NavOp::SetNavigation(token) => self.reset(token),
            NavOp::Present { token, slot } => self.present(token, slot),
            NavOp::Node { origin, valid, op } => {
                let on_stack = self
                    .shared
                    .state
                    .borrow()
                    .stack
                    .iter()
                    .any(|record| record.id == origin);
                if valid.get() && on_stack {
                    self.node_op(origin, op);
                } else {
                    tracing::trace!(target: "kioto.nav", record = %origin, "stale navigator op ignored");
                }
            }
            NavOp::UnwindTo(index) => {
                self.update_nav(NavigationKind::Pop, |_, len| len > index, |_| None);
            }
            NavOp::Release => self.release_all(),
        }
    }

    fn reset(&self, token: NodeToken) {
        self.update_nav(NavigationKind::Replace, |_, _| true, |_| {
            Some((token, Tag::Root))
        });
    }

    fn present(&self, token: NodeToken, slot: Option<Rc<PresentSlot>>) {
        if let Some(slot) = &slot {
            if slot.abandoned.get() {
                slot.sender.borrow_mut().take();
                return;
            }
        }
        let index = {
            let mut state = self.shared.state.borrow_mut();
            let index = state.stack.len();
            let signal = slot.as_ref().and_then(|s| s.sender.borrow_mut().take());
            state.presented.push(PresentedRecord { index, signal });
            index
        };
        if let Some(slot) = &slot {
            slot.index.set(Some(index));
        }
        self.update_nav(NavigationKind::Push, |_, _| false, |stack| {
            let tag = if stack.is_empty() { Tag::Root } else { Tag::Stack };
            Some((token, tag))
        });
    }

    fn node_op(&self, origin: NodeId, op: NodeOp) {
        match op {
            NodeOp::Navigate(token) => {
                self.update_nav(NavigationKind::Push, seek(origin, |_| false), |stack| {
                    let tag = match stack.last() {
                        Some(top) if top.tag == Tag::Root => Tag::Stack,
                        _ => Tag::Child,
                    };
                    Some((token, tag))
                });
            }
            NodeOp::BeginStack(token) => {
                self.update_nav(NavigationKind::Push, seek(origin, |_| false), |_| {
                    Some((token, Tag::Stack))
                });
            }
            NodeOp::Replace(token) => {
                let replaced = Cell::new(None);
                self.update_nav(
                    NavigationKind::Replace,
                    seek(origin, |record| {
                        let release = replaced.get().is_none();
                        if release {
                            replaced.set(Some(record.tag));
                        }
                        release
                    }),
                    |_| Some((token, replaced.get().unwrap_or(Tag::Child))),
                );
            }
            NodeOp::ReplaceStack(token) => {
                let last = Cell::new(None);
                self.update_nav(
                    NavigationKind::Replace,
                    seek(origin, |record| {
                        let release = !matches!(last.get(), Some(Tag::Stack | Tag::Root));
                        last.set(Some(record.tag));
                        release
                    }),
                    |_| Some((token, Tag::Stack)),
                );
            }
            NodeOp::Back => {
                let done = Cell::new(false);
                self.update_nav(
                    NavigationKind::Pop,
                    seek(origin, |_| !done.replace(true)),
                    |_| None,
                );
            }
            NodeOp::Up => {
                self.update_nav(
                    NavigationKind::Pop,
                    seek(origin, |record| record.tag == Tag::Child),
                    |_| None,
                );
            }
            NodeOp::PopToRoot => {
                let on_root = Cell::new(false);
                self.update_nav(
                    NavigationKind::Pop,
                    seek(origin, |record| {
                        let release = record.tag != Tag::Root || !on_root.get();
                        on_root.set(true);
                        release
                    }),
                    |_| None,
                );
            }
            NodeOp::Reset(token) => self.reset(token),
        }
    }

    fn build_record(&self, token: NodeToken, tag: Tag) -> NodeRecord {
        let id = NodeId::new();
        let valid = Rc::new(Cell::new(true));
        let navigator = Navigator::new(id, Rc::downgrade(&self.shared), Rc::clone(&valid));
        let handle = token.instantiate(BuildContext {
            id,
            navigator,
            context: Rc::clone(&self.shared.context),
            looper: self.shared.looper.clone(),
            parent_scope: self.shared.root_scope.token(),
            disposals: self.shared.disposals.clone(),
        });
        NodeRecord {
            id: handle.id(),
            tag,
            pane: handle.pane(),
            token,
            handle,
            valid,
        }
    }

    /// Pop while `release` holds, push what `push` returns, then classify
    /// and publish.
    fn update_nav(
        &self,
        kind: NavigationKind,
        mut release: impl FnMut(&NodeRecord, usize) -> bool,
        push: impl FnOnce(&[NodeRecord]) -> Option<(NodeToken, Tag)>,
    ) {
        let span = tracing::debug_span!(
            "nav.update",
            kind = ?kind,
            from_len = Empty,
            to_len = Empty,
            transition = Empty
        );
        let _entered = span.enter();

        let mut popped: Vec<NodeRecord> = Vec::new();
        let mut unwound_presented = None;
        let mut dismiss = None;
        let starting_len;
        let was_empty;
        let pushed_spec;
        {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            starting_len = state.stack.len();
            loop {
                let len = state.stack.len();
                let Some(top) = state.stack.last() else {
                    break;
                };
                if !release(top, len) {
                    break;
                }
                if len == 1 && kind == NavigationKind::Pop {
                    dismiss = state.on_root_dismiss.clone();
                    break;
                }
                // Replace keeps a waiter attached to a boundary that is
                // popped and refilled in the same mutation.
                if kind == NavigationKind::Replace {
                    resolve_presented(&mut state.presented, len);
                }
                let Some(record) = state.stack.pop() else {
                    break;
                };
                record.valid.set(false);
                if kind != NavigationKind::Replace {
                    if let Some(index) = resolve_presented(&mut state.presented, len - 1) {
                        unwound_presented = Some(index);
                    }
                }
                popped.push(record);
            }
            if state.stack.is_empty() {
                state.on_root_dismiss = None;
            }
            was_empty = state.stack.is_empty();
            pushed_spec = push(&state.stack);
        }
        span.record("from_len", starting_len);

        let mut released = Vec::new();
        for record in &popped {
            record.handle.release(&mut released);
        }
        if !released.is_empty() {
            tracing::trace!(target: "kioto.nav", ?released, "records released");
        }

        let pushed_tag = pushed_spec.map(|(token, tag)| {
            let tag = if was_empty { Tag::Root } else { tag };
            let record = self.build_record(token, tag);
            let callback = if was_empty {
                self.shared
                    .dismiss_handler
                    .as_ref()
                    .and_then(|handler| handler(self, &record.token))
            } else {
                None
            };
            let mut state = self.shared.state.borrow_mut();
            if was_empty {
                state.on_root_dismiss = callback;
            }
            state.stack.push(record);
            tag
        });

        if popped.is_empty() && pushed_tag.is_none() {
            drop(_entered);
            if let Some(callback) = dismiss {
                tracing::debug!(target: "kioto.nav", "root kept, dismiss callback invoked");
                callback();
            }
            return;
        }

        let snapshot = {
            let state = self.shared.state.borrow();
            let input = TransitionInput {
                kind,
                starting_len,
                ending_len: state.stack.len(),
                pushed_tag,
                last_removed_tag: popped.last().map(|record| record.tag),
                presented_top: state.presented.last().map(|p| p.index),
                unwound_presented,
            };
            snapshot(&state, &input)
        };
        let Some(snapshot) = snapshot else {
            fail(Violation::EmptyStack);
        };
        span.record("to_len", snapshot.active_ids.len());
        span.record("transition", snapshot.transition.as_str());
        drop(_entered);

        self.shared.panes.set(Some(snapshot));
        self.shared.back.set(BackGesture::Idle);
        for id in &released {
            self.shared.disposals.emit(id);
        }
        drop(popped);
        if let Some(callback) = dismiss {
            tracing::debug!(target: "kioto.nav", "root kept, dismiss callback invoked");
            callback();
        }
    }

    fn release_all(&self) {
        let (records, presented) = {
            let mut state = self.shared.state.borrow_mut();
            state.released = true;
            state.on_root_dismiss = None;
            (
                std::mem::take(&mut state.stack),
                std::mem::take(&mut state.presented),
            )
        };
        for record in presented {
            record.resolve();
        }
        for record in &records {
            record.valid.set(false);
        }
        let mut released = Vec::new();
        for record in records.iter().rev() {
            record.handle.release(&mut released);
        }
        self.shared.root_scope.cancel();
        self.shared.panes.set(None);
        self.shared.back.set(BackGesture::Idle);
        for id in &released {
            self.shared.disposals.emit(id);
        }
        tracing::debug!(target: "kioto.nav", released = released.len(), "navigation released");
    }
}

/// Release predicate that discards everything above `origin`, then defers
/// to `inner` from `origin` downwards.
fn seek<'a>(
    origin: NodeId,
    mut inner: impl FnMut(&NodeRecord) -> bool + 'a,
) -> impl FnMut(&NodeRecord, usize) -> bool + 'a {
    let mut reached = false;
    move |record: &NodeRecord, _: usize| {
        if !reached && record.id == origin {
            reached = true;
        }
        !reached || inner(record)
    }
}

fn snapshot(state: &NavState, input: &TransitionInput) -> Option<ActivePanes> {
    let len = state.stack.len();
    let foreground = state.stack.last()?.pane.clone();
    let background = if len >= 2 {
        Some(Background::Pane {
            pane: state.stack[len - 2].pane.clone(),
            presented: state.presented.iter().any(|p| p.index == len - 1),
        })
    } else if state.on_root_dismiss.is_some() {
        Some(Background::Handled)
    } else {
        None
    };
    Some(ActivePanes {
        foreground,
        background,
        transition: classify(input),
        active_ids: state.stack.iter().map(|record| record.id).collect(),
    })
}

impl fmt::Debug for NodeNav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("NodeNav")
            .field("len", &state.stack.len())
            .field("presented", &state.presented.len())
            .field("released", &state.released)
            .finish()
    }
}

/// Future returned by [`NodeNav::await_present_stack`].
///
/// Resolves once the presented segment is fully unwound (or the navigation
/// is released). Dropping it early unwinds the segment.
#[must_use = "dropping the future unwinds the presented stack"]
pub struct PresentedStack {
    receiver: oneshot::Receiver<()>,
    slot: Rc<PresentSlot>,
    nav: Weak<NavShared>,
    finished: bool,
}

impl PresentedStack {
    /// Index the segment was presented at, once the present has run.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.slot.index.get()
    }
}

impl Future for PresentedStack {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(());
        }
        match Pin::new(&mut this.receiver).poll(cx) {
            // A dropped signal means the navigation is gone.
            Poll::Ready(_) => {
                this.finished = true;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PresentedStack {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.receiver.try_recv() {
            Ok(Some(())) | Err(_) => return,
            Ok(None) => {}
        }
        self.slot.abandoned.set(true);
        let (Some(index), Some(shared)) = (self.slot.index.get(), self.nav.upgrade()) else {
            return;
        };
        tracing::debug!(target: "kioto.nav", index, "presented stack abandoned, unwinding");
        NodeNav::from_shared(shared).submit(NavOp::UnwindTo(index));
    }
}

impl fmt::Debug for PresentedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentedStack")
            .field("index", &self.slot.index.get())
            .field("finished", &self.finished)
            .finish()
    }
}
