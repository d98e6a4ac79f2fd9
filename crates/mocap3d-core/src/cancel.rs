//! Cooperative cancellation for long-running reconstruction calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag.
///
/// Clones share the same flag, so a token handed to a worker thread can be
/// cancelled from the caller. Long-running operations poll
/// [`CancelToken::is_cancelled`] at defined points and return
/// [`Completion::Cancelled`] instead of a result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear a previous cancellation request so the token can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Outcome of a cancellable operation.
///
/// `Cancelled` is neither a success nor an error: no result was committed
/// for the interrupted step.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<T> {
    Completed(T),
    Cancelled,
}

impl<T> Completion<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Completion<U> {
        match self {
            Self::Completed(value) => Completion::Completed(f(value)),
            Self::Cancelled => Completion::Cancelled,
        }
    }
}
