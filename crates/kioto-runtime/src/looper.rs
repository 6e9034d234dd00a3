#![forbid(unsafe_code)]

//! The confinement-thread pump.
//!
//! A [`Looper`] is created on the thread that owns navigation state. It
//! runs producers on its [`WorkerPool`] and hands their output back to
//! callbacks only from [`Looper::run_until_stalled`], which the host calls
//! from its frame loop on the confinement thread. It also drives `!Send`
//! futures spawned with [`Looper::spawn_local`].
//!
//! ```text
//!  worker thread                    confinement thread
//!  ─────────────                    ──────────────────
//!  producer(&emitter)
//!    emitter.emit(v) ──channel──▶  run_until_stalled()
//!                     ──wake────▶    token cancelled? drop : on_next(v)
//!  Ok / Err / panic ───channel──▶    on_error(e) at most once
//! ```
//!
//! Once the subscription token is cancelled nothing more reaches the
//! callbacks: pending items, errors and completions are dropped.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Condvar, Mutex};

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::RemoteHandle;
use futures::task::{LocalSpawnExt, SpawnError};
use web_time::{Duration, Instant};

use crate::cancellation::CancellationToken;
use crate::config::RuntimeConfig;
use crate::confinement::Confinement;
use crate::effect_system::{
    error_effect_panic, record_delivery, record_produce_finish, record_produce_start,
    warn_producer_failure,
};
use crate::worker::{WorkerPool, panic_message};

static NEXT_SUB_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one producer subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubId(u64);

impl SubId {
    fn next() -> Self {
        Self(NEXT_SUB_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id, as recorded in `effect.produce` spans.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Recoverable failure of an asynchronous producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    /// The producer returned an error.
    Failed(String),
    /// The producer panicked on its worker thread.
    Panicked(String),
}

impl ProducerError {
    /// Build a [`ProducerError::Failed`] from any displayable error.
    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "producer failed: {reason}"),
            Self::Panicked(msg) => write!(f, "producer panicked: {msg}"),
        }
    }
}

impl std::error::Error for ProducerError {}

enum Produced<T> {
    Item(T),
    Failed(ProducerError),
    Done,
}

#[derive(Default)]
struct WakeSignal {
    pending: Mutex<bool>,
    cvar: Condvar,
}

impl WakeSignal {
    fn notify(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        *pending = true;
        self.cvar.notify_all();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        while !*pending {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(pending, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            pending = guard;
        }
        *pending = false;
        true
    }
}

/// Producer-side handle for pushing values to the confinement thread.
pub struct Emitter<T> {
    sender: mpsc::Sender<Produced<T>>,
    token: CancellationToken,
    wake: Arc<WakeSignal>,
}

impl<T> Emitter<T> {
    /// Queue a value for delivery.
    ///
    /// Returns `false` once the subscription is cancelled or its consumer
    /// is gone; producers should stop at that point.
    pub fn emit(&self, value: T) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let sent = self.sender.send(Produced::Item(value)).is_ok();
        if sent {
            self.wake.notify();
        }
        sent
    }

    /// Returns `true` once the subscription is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The subscription token, for blocking waits inside the producer.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn finish(&self, outcome: Produced<T>) {
        let _ = self.sender.send(outcome);
        self.wake.notify();
    }
}

trait Delivery {
    /// Deliver what is queued. Returns the number of callbacks invoked and
    /// whether the subscription is finished.
    fn pump(&mut self) -> (usize, bool);
}

struct ProducerDelivery<T, N, E> {
    sub_id: SubId,
    token: CancellationToken,
    receiver: mpsc::Receiver<Produced<T>>,
    on_next: N,
    on_error: Option<E>,
    item_count: u64,
}

impl<T, N, E> ProducerDelivery<T, N, E> {
    fn finish(&self, cancelled: bool) {
        record_produce_finish(self.sub_id.get(), self.item_count, cancelled);
    }
}

impl<T, N, E> Delivery for ProducerDelivery<T, N, E>
where
    N: FnMut(T),
    E: FnOnce(ProducerError),
{
    fn pump(&mut self) -> (usize, bool) {
        let mut delivered = 0;
        loop {
            // Checked before every item: a callback may release the node.
            if self.token.is_cancelled() {
                self.finish(true);
                return (delivered, true);
            }
            match self.receiver.try_recv() {
                Ok(Produced::Item(value)) => {
                    self.item_count += 1;
                    delivered += 1;
                    record_delivery();
                    (self.on_next)(value);
                }
                Ok(Produced::Failed(error)) => {
                    if let Some(on_error) = self.on_error.take() {
                        delivered += 1;
                        on_error(error);
                    }
                    self.finish(false);
                    return (delivered, true);
                }
                Ok(Produced::Done) | Err(TryRecvError::Disconnected) => {
                    self.finish(false);
                    return (delivered, true);
                }
                Err(TryRecvError::Empty) => return (delivered, false),
            }
        }
    }
}

struct LooperInner {
    // Dropped first: disconnects emitters so looping producers stop before
    // the worker pool joins its threads.
    deliveries: RefCell<Vec<Box<dyn Delivery>>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    workers: WorkerPool,
    wake: Arc<WakeSignal>,
    confinement: Confinement,
}

/// Confinement-thread executor and delivery pump. Cheap to clone.
#[derive(Clone)]
pub struct Looper {
    inner: Rc<LooperInner>,
}

impl Looper {
    /// Create a looper bound to the current thread.
    ///
    /// Fails with [`std::io::ErrorKind::InvalidInput`] when `config` does not
    /// pass [`RuntimeConfig::validate`].
    pub fn new(config: &RuntimeConfig) -> std::io::Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                problems.join("; "),
            ));
        }
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Ok(Self {
            inner: Rc::new(LooperInner {
                deliveries: RefCell::new(Vec::new()),
                pool: RefCell::new(pool),
                spawner,
                workers: WorkerPool::new(config)?,
                wake: Arc::new(WakeSignal::default()),
                confinement: Confinement::current(),
            }),
        })
    }

    /// The thread this looper is confined to.
    #[must_use]
    pub fn confinement(&self) -> Confinement {
        self.inner.confinement
    }

    /// Run `producer` on a worker and deliver its output on this thread.
    ///
    /// `on_next` receives every emitted value; `on_error` runs at most once
    /// if the producer returns `Err` or panics. Nothing is delivered after
    /// `token` is cancelled.
    pub fn produce<T, P, N, E>(
        &self,
        token: CancellationToken,
        producer: P,
        on_next: N,
        on_error: E,
    ) -> SubId
    where
        T: Send + 'static,
        P: FnOnce(&Emitter<T>) -> Result<(), ProducerError> + Send + 'static,
        N: FnMut(T) + 'static,
        E: FnOnce(ProducerError) + 'static,
    {
        self.inner.confinement.check("Looper::produce");
        let sub_id = SubId::next();
        let (sender, receiver) = mpsc::channel();
        let emitter = Emitter {
            sender,
            token: token.clone(),
            wake: Arc::clone(&self.inner.wake),
        };
        self.inner
            .deliveries
            .borrow_mut()
            .push(Box::new(ProducerDelivery {
                sub_id,
                token,
                receiver,
                on_next,
                on_error: Some(on_error),
                item_count: 0,
            }));
        record_produce_start(sub_id.get());

        self.inner.workers.execute(move || {
            if emitter.is_cancelled() {
                return;
            }
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| producer(&emitter))) {
                Ok(Ok(())) => Produced::Done,
                Ok(Err(error)) => {
                    warn_producer_failure(sub_id.get(), &error.to_string());
                    Produced::Failed(error)
                }
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    error_effect_panic("producer", &msg);
                    Produced::Failed(ProducerError::Panicked(msg))
                }
            };
            emitter.finish(outcome);
        });
        sub_id
    }

    /// Spawn a `!Send` future on the confinement thread.
    ///
    /// Dropping the returned handle drops the future.
    pub fn spawn_local<F>(&self, future: F) -> Result<RemoteHandle<F::Output>, SpawnError>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.inner.confinement.check("Looper::spawn_local");
        self.inner.spawner.spawn_local_with_handle(future)
    }

    /// Deliver queued producer output and poll local futures until neither
    /// makes progress. Returns the number of callbacks invoked.
    pub fn run_until_stalled(&self) -> usize {
        self.inner.confinement.check("Looper::run_until_stalled");
        let mut total = 0;
        loop {
            // Re-entrant calls from inside a local future skip the pool.
            if let Ok(mut pool) = self.inner.pool.try_borrow_mut() {
                pool.run_until_stalled();
            }
            let delivered = self.pump_deliveries();
            total += delivered;
            if delivered == 0 {
                return total;
            }
        }
    }

    fn pump_deliveries(&self) -> usize {
        // Callbacks may register new subscriptions; they land in the fresh vec.
        let mut active = std::mem::take(&mut *self.inner.deliveries.borrow_mut());
        let mut delivered = 0;
        active.retain_mut(|delivery| {
            let (count, finished) = delivery.pump();
            delivered += count;
            !finished
        });
        let mut deliveries = self.inner.deliveries.borrow_mut();
        active.append(&mut deliveries);
        *deliveries = active;
        delivered
    }

    /// Block until a worker posted output or `timeout` elapses.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        self.inner.wake.wait(timeout)
    }

    /// Pump until `done` returns `true` or `timeout` elapses.
    ///
    /// Returns the final value of `done`.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_until_stalled();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.wait_for_work((deadline - now).min(Duration::from_millis(10)));
        }
    }

    /// Subscriptions that have not finished yet.
    #[must_use]
    pub fn pending_deliveries(&self) -> usize {
        self.inner.deliveries.borrow().len()
    }
}

impl fmt::Debug for Looper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Looper")
            .field("owner", &self.inner.confinement.owner())
            .field("workers", &self.inner.workers.size())
            .field("pending_deliveries", &self.pending_deliveries())
            .finish()
    }
}
