#![forbid(unsafe_code)]

//! Producer effect observability.
//!
//! Every subscription started through [`Looper::produce`](crate::Looper::produce)
//! is recorded here:
//!
//! - **Tracing spans**: `effect.produce` spans with `sub_id`, `item_count`
//!   and `active` fields, emitted under the `kioto.effect` target.
//! - **Counters**: `effects_produced_total` counts started producers,
//!   `effects_delivered_total` counts items delivered on the confinement
//!   thread.

use std::sync::atomic::{AtomicU64, Ordering};

static EFFECTS_PRODUCED_TOTAL: AtomicU64 = AtomicU64::new(0);
static EFFECTS_DELIVERED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Total producers started (monotonic counter).
#[must_use]
pub fn effects_produced_total() -> u64 {
    EFFECTS_PRODUCED_TOTAL.load(Ordering::Relaxed)
}

/// Total items delivered to consumers (monotonic counter).
#[must_use]
pub fn effects_delivered_total() -> u64 {
    EFFECTS_DELIVERED_TOTAL.load(Ordering::Relaxed)
}

/// Record that a producer was scheduled on the worker pool.
pub fn record_produce_start(sub_id: u64) {
    EFFECTS_PRODUCED_TOTAL.fetch_add(1, Ordering::Relaxed);

    let _span = tracing::debug_span!(
        "effect.produce",
        sub_id = sub_id,
        item_count = 0u64,
        active = true,
    )
    .entered();

    tracing::debug!(
        target: "kioto.effect",
        sub_id = sub_id,
        active = true,
        "producer started"
    );
}

/// Record a delivered item.
pub(crate) fn record_delivery() {
    EFFECTS_DELIVERED_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Record that a producer's delivery finished, cancelled or not.
pub fn record_produce_finish(sub_id: u64, item_count: u64, cancelled: bool) {
    let _span = tracing::debug_span!(
        "effect.produce",
        sub_id = sub_id,
        item_count = item_count,
        active = false,
    )
    .entered();

    tracing::debug!(
        target: "kioto.effect",
        sub_id = sub_id,
        item_count = item_count,
        cancelled = cancelled,
        "producer finished"
    );
}

/// Record a producer that reported an error.
pub fn warn_producer_failure(sub_id: u64, reason: &str) {
    tracing::warn!(
        target: "kioto.effect",
        sub_id = sub_id,
        reason = %reason,
        "producer failed"
    );
}

/// Record a panic caught on a worker thread.
pub fn error_effect_panic(effect_type: &str, panic_msg: &str) {
    tracing::error!(
        target: "kioto.effect",
        effect_type = %effect_type,
        panic_msg = %panic_msg,
        "effect panicked during execution"
    );
}
