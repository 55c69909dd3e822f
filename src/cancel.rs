//! # Cooperative cancellation
//!
//! The corpus this crate is grounded on has no `context.Context`-equivalent convention for
//! synchronous code, so cancellation is a small hand-rolled token instead: check it at loop
//! boundaries, bail out with [`crate::error::Error::Cancelled`] when it trips.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative, cloneable cancel flag. Cancelling is one-way: once tripped, a token stays
/// tripped.
#[derive(Clone, Default)]
pub struct CancellationToken {
  cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
  /// Creates a fresh, not-yet-cancelled token.
  pub fn new() -> Self {
    CancellationToken::default()
  }

  /// Trips the token. Visible to every clone.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  /// Whether the token has been tripped.
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }
}
