//! # Install Guard
//!
//! Single-flight gate for install and reload operations. At most one
//! operation holds the guard at a time; a second caller is rejected
//! immediately instead of being queued, and is expected to retry later.
//!
//! Holding the guard is represented by an [`InstallPermit`]. The permit
//! releases the guard when dropped, so every exit path (success, error,
//! early return, cancelled future) gives it back.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::errors::InstallError;
use crate::metrics::{MetricsRecorder, NoOpMetrics};

/// Process-wide install/reload mutual exclusion.
pub struct InstallGuard {
    in_progress: AtomicBool,
    /// Archive currently being installed, for diagnostics only.
    current: Mutex<Option<String>>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl InstallGuard {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(NoOpMetrics))
    }

    pub fn with_metrics(metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            in_progress: AtomicBool::new(false),
            current: Mutex::new(None),
            metrics,
        }
    }

    /// Atomically claim the guard for `archive`.
    ///
    /// Returns [`InstallError::InProgress`] if another operation holds it.
    pub fn try_begin_install(
        &self,
        archive: impl Into<String>,
    ) -> Result<InstallPermit<'_>, InstallError> {
        let archive = archive.into();
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let holder = self.current.lock().clone().unwrap_or_default();
            warn!(archive = %archive, holder = %holder, "Install rejected, another is in progress");
            self.metrics.record_install(false);
            return Err(InstallError::InProgress { archive: holder });
        }

        *self.current.lock() = Some(archive.clone());
        debug!(archive = %archive, "Install started");
        self.metrics.record_install(true);
        Ok(InstallPermit {
            guard: self,
            archive,
        })
    }

    /// Release the guard held by `permit`. Equivalent to dropping it.
    pub fn end_install(&self, permit: InstallPermit<'_>) {
        debug_assert!(std::ptr::eq(permit.guard, self));
        drop(permit);
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Archive held by the in-flight operation, if any.
    pub fn current_archive(&self) -> Option<String> {
        self.current.lock().clone()
    }

    fn release(&self, archive: &str) {
        *self.current.lock() = None;
        self.in_progress.store(false, Ordering::Release);
        debug!(archive = %archive, "Install finished");
    }
}

impl Default for InstallGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of holding the [`InstallGuard`]; releases it on drop.
#[must_use = "dropping the permit releases the install guard immediately"]
pub struct InstallPermit<'a> {
    guard: &'a InstallGuard,
    archive: String,
}

impl InstallPermit<'_> {
    pub fn archive(&self) -> &str {
        &self.archive
    }
}

impl fmt::Debug for InstallPermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallPermit")
            .field("archive", &self.archive)
            .finish()
    }
}

impl Drop for InstallPermit<'_> {
    fn drop(&mut self) {
        self.guard.release(&self.archive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_second_caller_is_rejected() {
        let guard = InstallGuard::new();
        let permit = guard.try_begin_install("plc-connector").unwrap();
        assert!(guard.in_progress());
        assert_eq!(permit.archive(), "plc-connector");

        let err = guard.try_begin_install("historian").unwrap_err();
        assert_eq!(
            err,
            InstallError::InProgress {
                archive: "plc-connector".into()
            }
        );

        guard.end_install(permit);
        assert!(!guard.in_progress());
        assert!(guard.try_begin_install("historian").is_ok());
    }

    #[test]
    fn test_permit_debug_shows_archive() {
        let guard = InstallGuard::new();
        let permit = guard.try_begin_install("plc-connector").unwrap();
        assert_eq!(
            format!("{:?}", permit),
            r#"InstallPermit { archive: "plc-connector" }"#
        );
    }

    #[test]
    fn test_permit_released_on_error_path() {
        fn failing_install(guard: &InstallGuard) -> Result<(), String> {
            let _permit = guard.try_begin_install("broken").map_err(|e| e.to_string())?;
            Err("unpack failed".into())
        }

        let guard = InstallGuard::new();
        assert!(failing_install(&guard).is_err());
        assert!(!guard.in_progress());
        assert_eq!(guard.current_archive(), None);
    }

    #[test]
    fn test_concurrent_begin_admits_exactly_one() {
        let guard = InstallGuard::new();
        let barrier = Barrier::new(2);

        let (a, b) = thread::scope(|scope| {
            let attempt = || {
                barrier.wait();
                match guard.try_begin_install("archive") {
                    // Keep the permit alive until both threads have tried.
                    Ok(permit) => {
                        barrier.wait();
                        drop(permit);
                        true
                    }
                    Err(_) => {
                        barrier.wait();
                        false
                    }
                }
            };
            let a = scope.spawn(attempt);
            let b = scope.spawn(attempt);
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(a ^ b, "exactly one caller must win");
        assert!(!guard.in_progress());
        assert!(guard.try_begin_install("next").is_ok());
    }
}
