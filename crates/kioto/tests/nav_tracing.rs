//! Structured tracing emitted by stack mutations and violations.

mod common;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use common::Harness;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone)]
struct CapturedSpan {
    id: u64,
    name: String,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    target: String,
    fields: HashMap<String, String>,
}

#[derive(Default, Clone)]
struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        self.spans.lock().unwrap().push(CapturedSpan {
            id: id.into_u64(),
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        values.record(&mut visitor);
        let mut spans = self.spans.lock().unwrap();
        if let Some(span) = spans.iter_mut().rev().find(|s| s.id == id.into_u64()) {
            span.fields.extend(visitor.0);
        }
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }
}

fn with_captured_tracing(f: impl FnOnce()) -> Capture {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    tracing::subscriber::with_default(subscriber, f);
    capture
}

fn nav_updates(capture: &Capture) -> Vec<HashMap<String, String>> {
    capture
        .spans
        .lock()
        .unwrap()
        .iter()
        .filter(|s| s.name == "nav.update")
        .map(|s| s.fields.clone())
        .collect()
}

#[test]
fn every_mutation_records_a_nav_update_span() {
    let capture = with_captured_tracing(|| {
        let h = Harness::new();
        h.nav.set_navigation(h.token("A"));
        h.navigator("A").begin_stack(h.token("B"));
        h.navigator("B").navigate_back();
    });

    let updates = nav_updates(&capture);
    assert_eq!(updates.len(), 3);

    let field = |i: usize, name: &str| updates[i].get(name).cloned().unwrap_or_default();
    assert_eq!(field(0, "kind"), "Replace");
    assert_eq!(field(0, "from_len"), "0");
    assert_eq!(field(0, "to_len"), "1");
    assert_eq!(field(0, "transition"), "replace");

    assert_eq!(field(1, "kind"), "Push");
    assert_eq!(field(1, "to_len"), "2");
    assert_eq!(field(1, "transition"), "begin_stack");

    assert_eq!(field(2, "kind"), "Pop");
    assert_eq!(field(2, "from_len"), "2");
    assert_eq!(field(2, "transition"), "close_stack");
}

#[test]
fn ignored_root_pop_records_no_transition() {
    let capture = with_captured_tracing(|| {
        let h = Harness::new();
        h.nav.set_navigation(h.token("A"));
        h.navigator("A").navigate_back();
    });

    let updates = nav_updates(&capture);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].get("kind").map(String::as_str), Some("Pop"));
    assert!(!updates[1].contains_key("transition"));
}

#[test]
fn violations_are_logged_before_the_panic() {
    let capture = with_captured_tracing(|| {
        let h = Harness::new();
        h.nav.set_navigation(h.token("A"));
        let scope = h.registry.scope("A");
        h.nav.release();

        let result = panic::catch_unwind(AssertUnwindSafe(|| scope.set_state(3)));
        assert!(result.is_err());
    });

    let events = capture.events.lock().unwrap();
    let violation = events
        .iter()
        .find(|e| e.target == "kioto.violation")
        .expect("violation event");
    assert_eq!(violation.level, tracing::Level::ERROR);
    let message = violation.fields.get("violation").expect("violation field");
    assert!(message.contains("NodeScope::set_state"));
    assert!(message.contains("released node"));
}

#[test]
fn release_logs_the_released_count() {
    let capture = with_captured_tracing(|| {
        let h = Harness::new();
        h.nav.set_navigation(h.token("A"));
        h.navigator("A").navigate(h.token("B"));
        h.nav.release();
    });

    let events = capture.events.lock().unwrap();
    let released = events
        .iter()
        .find(|e| e.target == "kioto.nav" && e.fields.contains_key("released"))
        .expect("release event");
    assert_eq!(released.level, tracing::Level::DEBUG);
    assert_eq!(released.fields.get("released").map(String::as_str), Some("2"));
}
