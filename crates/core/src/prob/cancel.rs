use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{MpError, Result};

/// A wall-clock limit measured from when it was created.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.limit
    }
}

/// Cooperative cancellation shared between the caller and the workers.
///
/// Clones share the same flag. Backends call [`CancelToken::check`] between
/// individuals.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Deadline>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also expires `limit` from now.
    pub fn with_deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(Deadline::after(limit));
        self
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// # Errors
    /// Returns `Cancelled` after [`cancel`](Self::cancel) and
    /// `DeadlineExceeded` once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(MpError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if deadline.is_expired() {
                return Err(MpError::DeadlineExceeded {
                    elapsed: deadline.elapsed(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_shared_between_clones() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());
        token.cancel();
        assert!(matches!(worker.check(), Err(MpError::Cancelled)));
    }

    #[test]
    fn test_expired_deadline() {
        let token = CancelToken::new().with_deadline(Duration::ZERO);
        assert!(matches!(token.check(), Err(MpError::DeadlineExceeded { .. })));
    }

    #[test]
    fn test_generous_deadline() {
        let token = CancelToken::new().with_deadline(Duration::from_secs(3600));
        assert!(token.check().is_ok());
    }
}
