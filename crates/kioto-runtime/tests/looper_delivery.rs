//! Integration tests for worker-to-confinement delivery.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc;

use kioto_runtime::{CancellationSource, Looper, ProducerError, RuntimeConfig};
use web_time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn looper() -> Looper {
    Looper::new(&RuntimeConfig::default()).expect("looper")
}

#[test]
fn callbacks_run_on_the_confinement_thread() {
    let looper = looper();
    let scope = CancellationSource::new();
    let owner = std::thread::current().id();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    looper.produce(
        scope.token(),
        |emitter| {
            emitter.emit(std::thread::current().id());
            Ok(())
        },
        move |producer_thread| sink.borrow_mut().push((producer_thread, std::thread::current().id())),
        |_| {},
    );
    assert!(looper.run_until(TIMEOUT, || !seen.borrow().is_empty()));
    let (producer_thread, callback_thread) = seen.borrow()[0];
    assert_ne!(producer_thread, owner);
    assert_eq!(callback_thread, owner);
}

#[test]
fn child_scope_cancellation_stops_a_stream() {
    let looper = looper();
    let root = CancellationSource::new();
    let node = root.child();
    let count = Rc::new(Cell::new(0u32));
    let sink = Rc::clone(&count);
    looper.produce(
        node.token(),
        |emitter| {
            let mut i = 0u32;
            while emitter.emit(i) {
                i += 1;
                emitter.token().wait_timeout(Duration::from_millis(1));
            }
            Ok(())
        },
        move |_| sink.set(sink.get() + 1),
        |_| {},
    );
    assert!(looper.run_until(TIMEOUT, || count.get() >= 3));
    root.cancel();
    let frozen = count.get();
    looper.run_until(Duration::from_millis(30), || false);
    assert_eq!(count.get(), frozen);
    assert_eq!(looper.pending_deliveries(), 0);
}

#[test]
fn callbacks_may_start_new_subscriptions() {
    let looper = looper();
    let scope = CancellationSource::new();
    let results = Rc::new(RefCell::new(Vec::new()));
    let outer_sink = Rc::clone(&results);
    let inner_looper = looper.clone();
    let token = scope.token();
    looper.produce(
        scope.token(),
        |emitter| {
            emitter.emit(1);
            Ok(())
        },
        move |v: i32| {
            outer_sink.borrow_mut().push(v);
            let sink = Rc::clone(&outer_sink);
            inner_looper.produce(
                token.clone(),
                move |emitter| {
                    emitter.emit(v + 1);
                    Ok(())
                },
                move |w| sink.borrow_mut().push(w),
                |_| {},
            );
        },
        |_| {},
    );
    assert!(looper.run_until(TIMEOUT, || results.borrow().len() == 2));
    assert_eq!(*results.borrow(), vec![1, 2]);
}

#[test]
fn failure_after_values_delivers_both_in_order() {
    let looper = looper();
    let scope = CancellationSource::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let values = Rc::clone(&log);
    let errors = Rc::clone(&log);
    looper.produce(
        scope.token(),
        |emitter| {
            emitter.emit("a".to_string());
            Err(ProducerError::failed("disk full"))
        },
        move |v| values.borrow_mut().push(v),
        move |e| errors.borrow_mut().push(e.to_string()),
    );
    assert!(looper.run_until(TIMEOUT, || log.borrow().len() == 2));
    assert_eq!(
        *log.borrow(),
        vec!["a".to_string(), "producer failed: disk full".to_string()]
    );
}

#[test]
fn producer_skipped_when_cancelled_before_start() {
    let looper = looper();
    let scope = CancellationSource::new();
    scope.cancel();
    let (tx, rx) = mpsc::channel::<()>();
    looper.produce::<u8, _, _, _>(
        scope.token(),
        move |_| {
            tx.send(()).ok();
            Ok(())
        },
        |_| {},
        |_| {},
    );
    assert!(looper.run_until(TIMEOUT, || looper.pending_deliveries() == 0));
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}
