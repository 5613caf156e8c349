use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Process-wide "is the vector service usable" flag.
///
/// Starts down. Flips up only after a successful collection reconcile, and
/// back down when a call finds the service unreachable. Readers never block.
#[derive(Debug, Default)]
pub struct VectorAvailability {
    available: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl VectorAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub fn mark_available(&self) {
        if !self.available.swap(true, Ordering::AcqRel) {
            tracing::info!("vector service available");
        }
        *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    pub fn mark_unavailable(&self, reason: impl std::fmt::Display) {
        let reason = reason.to_string();
        if self.available.swap(false, Ordering::AcqRel) {
            tracing::warn!(reason = %reason, "vector service marked unavailable");
        }
        *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason);
    }

    /// Reason recorded by the most recent [`mark_unavailable`](Self::mark_unavailable).
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
