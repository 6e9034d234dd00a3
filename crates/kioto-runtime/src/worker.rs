#![forbid(unsafe_code)]

//! Fixed-size worker pool for producers that must not run on the
//! confinement thread.
//!
//! Jobs are boxed closures consumed from one shared channel. A panicking
//! job is caught and logged; the worker keeps serving. Dropping the pool
//! closes the channel and joins every worker, so jobs must observe their
//! cancellation token to finish promptly.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::config::RuntimeConfig;
use crate::effect_system::error_effect_panic;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool of named worker threads.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.worker_threads` workers, at least one.
    ///
    /// The pool does not validate `config`; [`Looper::new`](crate::Looper::new) does.
    pub fn new(config: &RuntimeConfig) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(config.worker_threads);
        for index in 0..config.worker_threads.max(1) {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("{}-{index}", config.worker_thread_name))
                .spawn(move || worker_loop(&receiver))?;
            workers.push(handle);
        }
        tracing::debug!(
            target: "kioto.worker",
            workers = workers.len(),
            "worker pool started"
        );
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Queue a job. Returns `false` if the pool is shutting down.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(receiver: &Mutex<mpsc::Receiver<Job>>) {
    loop {
        let job = {
            let guard = receiver.lock().unwrap_or_else(|e| e.into_inner());
            guard.recv()
        };
        let Ok(job) = job else {
            break;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error_effect_panic("worker.job", &panic_message(payload.as_ref()));
        }
    }
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        tracing::debug!(target: "kioto.worker", "worker pool stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}
