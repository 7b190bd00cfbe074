//! Retry policies.
//!
//! This module groups the knobs that control the bounded waits of the runtime:
//! how often a passive launch polls for its process output, and how many times
//! (and how far apart) a stop request re-interrupts surviving workers.
//!
//! ## Contents
//! - [`BackoffPolicy`] how delays evolve (first / factor / max)
//! - [`RetryPolicy`]   bounded attempt count paired with a backoff
//!
//! ## Quick wiring
//! ```text
//! Config { spawn_wait: RetryPolicy, interrupt: RetryPolicy, .. }
//!      ├─► modules::passive launch   polls for the process output
//!      └─► modules::passive stop     re-interrupts live background workers
//! ```

mod backoff;
mod retry;

pub use backoff::BackoffPolicy;
pub use retry::RetryPolicy;
