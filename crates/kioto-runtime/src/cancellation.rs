//! Cooperative cancellation scopes for nodes and their subscriptions.
//!
//! [`CancellationToken`] is a thread-safe, cloneable signal that producers
//! poll to detect cancellation. [`CancellationSource`] is the control side.
//! Sources form a tree through [`CancellationSource::child`]: cancelling a
//! scope cancels every live descendant, never its parent.
//!
//! The navigation engine builds one tree per navigation instance:
//!
//! ```text
//! nav root scope
//!  ├── record scope (node A)
//!  │    └── hosted scope (node A.0)
//!  └── record scope (node B)
//! ```
//!
//! # Example
//!
//! ```
//! use kioto_runtime::cancellation::CancellationSource;
//!
//! let root = CancellationSource::new();
//! let node = root.child();
//! let token = node.token();
//!
//! root.cancel();
//! assert!(token.is_cancelled());
//! ```

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use web_time::Duration;

/// A thread-safe, cloneable cancellation token.
///
/// Tokens are cheap to clone and share across thread boundaries.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationInner>,
}

/// The control handle that triggers cancellation.
///
/// Dropping the source does **not** cancel the token; call
/// [`cancel`](Self::cancel) explicitly.
pub struct CancellationSource {
    inner: Arc<CancellationInner>,
}

struct CancellationInner {
    cancelled: AtomicBool,
    notify: (Mutex<()>, Condvar),
    children: Mutex<Vec<Weak<CancellationInner>>>,
}

impl CancellationInner {
    fn new(cancelled: bool) -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(cancelled),
            notify: (Mutex::new(()), Condvar::new()),
            children: Mutex::new(Vec::new()),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        // Flag first, then take the children under the lock: `child()` checks
        // the flag while holding the same lock, so no child can slip in between.
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let (lock, cvar) = &self.notify;
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            cvar.notify_all();
        }
        let children = {
            let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *children)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn child(&self) -> Arc<Self> {
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_cancelled() {
            return Self::new(true);
        }
        children.retain(|weak| weak.strong_count() > 0);
        let child = Self::new(false);
        children.push(Arc::downgrade(&child));
        child
    }

    fn live_children(&self) -> usize {
        let children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children.iter().filter(|weak| weak.strong_count() > 0).count()
    }
}

impl CancellationSource {
    /// Create a new root scope with an uncancelled token.
    pub fn new() -> Self {
        Self {
            inner: CancellationInner::new(false),
        }
    }

    /// Create a child scope that is cancelled together with this one.
    ///
    /// A child created from an already-cancelled scope starts cancelled.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child(),
        }
    }

    /// Obtain a cloneable token that observes this source's state.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Signal cancellation to this scope and all of its descendants.
    ///
    /// Idempotent; pending `wait_timeout` calls wake up.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Check whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Number of child scopes still alive.
    #[must_use]
    pub fn live_children(&self) -> usize {
        self.inner.live_children()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    /// Returns `true` if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Create a child scope of the scope this token observes.
    #[must_use]
    pub fn child(&self) -> CancellationSource {
        CancellationSource {
            inner: self.inner.child(),
        }
    }

    /// Block until either cancellation is requested or the timeout elapses.
    ///
    /// Returns `true` if cancelled, `false` if timed out.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let (lock, cvar) = &self.inner.notify;
        let mut guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let start = web_time::Instant::now();
        let mut remaining = duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let (new_guard, result) = cvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(|e| e.into_inner());
            guard = new_guard;
            if self.is_cancelled() {
                return true;
            }
            if result.timed_out() {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            remaining = duration - elapsed;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
