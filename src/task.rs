//! Progress and cancellation plumbing shared by the long-running operations.
//!
//! Callbacks receive a fraction in `0.0..=1.0`.  Sector loops report exact
//! progress; tree walks report `processed / discovered`, which converges on
//! 1.0 as the queue drains.  Cancellation is cooperative: the flag is polled
//! once per unit of work and loops stop silently, returning whatever partial
//! result they have accumulated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress callback: fraction of the current phase completed.
pub type ProgressFn<'a> = dyn FnMut(f32) + 'a;

/// Shared cancellation flag.  Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.  Irrevocable for this token and its clones.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
