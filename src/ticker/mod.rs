//! Shared periodic broadcaster.
//!
//! One [`Ticker`] drives every time-based behavior of the runtime: queue
//! countdowns and the read cadence of passive output communicators.
//!
//! ```text
//!   Ticker loop ── sleep(tick) ──► dispatch()
//!                                    ├─► sub[0].is_decrementable()? ─► sub[0].decrement()
//!                                    ├─► sub[1].is_decrementable()? ─► sub[1].decrement()
//!                                    └─► ...                          (subscription order)
//! ```

mod decrement;
mod ticker;

pub use decrement::Decrement;
pub use ticker::Ticker;
