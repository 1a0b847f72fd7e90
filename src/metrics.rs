//! Metric helpers for `http_push`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking frames handled by the engine.
pub const FRAMES_TOTAL: &str = "http_push_frames_total";
/// Name of the counter tracking streams reset by the engine.
pub const RESETS_TOTAL: &str = "http_push_resets_total";
/// Name of the counter tracking synthetic push frames.
pub const PUSH_PROMISES_TOTAL: &str = "http_push_push_promises_total";
/// Name of the counter tracking deferred begins that fired.
pub const DEFERRED_BEGINS_TOTAL: &str = "http_push_deferred_begins_total";
/// Name of the gauge tracking acquired slab slots.
pub const SLAB_SLOTS_IN_USE: &str = "http_push_slab_slots_in_use";

/// Path a frame arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Request streams written by a source partner.
    Request,
    /// Reply streams written by a destination partner.
    Reply,
    /// Window and Reset frames flowing back along a written stream.
    Throttle,
}

impl Role {
    /// Label value used for the `role` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Request => "request",
            Role::Reply => "reply",
            Role::Throttle => "throttle",
        }
    }
}

/// Record a frame handled on the given path.
pub fn inc_frames(role: Role) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "role" => role.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = role;
}

/// Record a stream reset on the given path.
pub fn inc_resets(role: Role) {
    #[cfg(feature = "metrics")]
    counter!(RESETS_TOTAL, "role" => role.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = role;
}

/// Record a synthetic push frame.
pub fn inc_push_promises() {
    #[cfg(feature = "metrics")]
    counter!(PUSH_PROMISES_TOTAL).increment(1);
}

/// Record a deferred begin that fired.
pub fn inc_deferred_begins() {
    #[cfg(feature = "metrics")]
    counter!(DEFERRED_BEGINS_TOTAL).increment(1);
}

/// Publish the number of slab slots currently acquired.
#[cfg_attr(
    feature = "metrics",
    expect(
        clippy::cast_precision_loss,
        reason = "slot counts are far below f64's exact integer range"
    )
)]
pub fn set_slots_in_use(in_use: usize) {
    #[cfg(feature = "metrics")]
    gauge!(SLAB_SLOTS_IN_USE).set(in_use as f64);
    #[cfg(not(feature = "metrics"))]
    let _ = in_use;
}
