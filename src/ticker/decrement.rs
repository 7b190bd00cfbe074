//! # Ticker subscriber contract.

/// A countdown-driven participant of the [`Ticker`](crate::Ticker).
///
/// Both methods are called synchronously from the tick dispatch, so they must
/// return quickly: anything that can block (pipe reads, process waits) has to
/// be handed off to a task by the implementor.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use netvisor::Decrement;
///
/// struct Heartbeat(AtomicU64);
///
/// impl Decrement for Heartbeat {
///     fn is_decrementable(&self) -> bool { true }
///     fn decrement(&self) { self.0.fetch_add(1, Ordering::Relaxed); }
/// }
/// ```
pub trait Decrement: Send + Sync + 'static {
    /// Whether this subscriber wants the current tick.
    fn is_decrementable(&self) -> bool;

    /// Advances the subscriber by one tick.
    fn decrement(&self);
}
