//! # Install Guard Integration Tests
//!
//! At most one install/reload in flight, process-wide: concurrent attempts
//! are rejected rather than queued, and the guard is released on every
//! exit path.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use connector_core::{
        DirectoryError, InstallError, InstallGuard, ItemProvider, ProviderDirectory, State,
    };

    use crate::integration::support::slow_provider;

    #[test]
    fn test_concurrent_try_begin_admits_exactly_one() {
        let guard = InstallGuard::new();
        let barrier = Barrier::new(16);
        let admitted = AtomicUsize::new(0);
        let rejected = AtomicUsize::new(0);

        thread::scope(|s| {
            for i in 0..16 {
                let (guard, barrier, admitted, rejected) = (&guard, &barrier, &admitted, &rejected);
                s.spawn(move || {
                    barrier.wait();
                    match guard.try_begin_install(format!("pkg-{}.zip", i)) {
                        Ok(permit) => {
                            admitted.fetch_add(1, Ordering::SeqCst);
                            // Hold until every contender has tried.
                            thread::sleep(Duration::from_millis(50));
                            drop(permit);
                        }
                        Err(InstallError::InProgress { .. }) => {
                            rejected.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 15);
        assert!(!guard.in_progress());
        assert!(guard.try_begin_install("after.zip").is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reloads_are_rejected_not_queued() {
        let directory = Arc::new(ProviderDirectory::new());
        directory
            .register(slow_provider("plc1", &["A"], Duration::ZERO))
            .unwrap();
        directory.start_all().await.unwrap();

        // The first reload holds the guard while its replacement connects.
        let slow = {
            let directory = directory.clone();
            tokio::spawn(async move {
                directory
                    .reload(
                        "plc1",
                        slow_provider("plc1", &["B"], Duration::from_millis(100)),
                        "v2.zip",
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            directory.install_guard().current_archive().as_deref(),
            Some("v2.zip")
        );

        let second = directory
            .reload("plc1", slow_provider("plc1", &["C"], Duration::ZERO), "v3.zip")
            .await;
        assert_eq!(
            second,
            Err(DirectoryError::Install(InstallError::InProgress {
                archive: "v2.zip".into()
            }))
        );

        slow.await.unwrap().unwrap();
        assert!(!directory.install_guard().in_progress());
        assert!(directory.resolve("plc1.B").is_some());
        assert!(directory.resolve("plc1.C").is_none());
        assert_eq!(directory.get("plc1").unwrap().state(), State::Running);

        // Retrying after release succeeds.
        directory
            .reload("plc1", slow_provider("plc1", &["C"], Duration::ZERO), "v3.zip")
            .await
            .unwrap();
        assert!(directory.resolve("plc1.C").is_some());
    }

    #[tokio::test]
    async fn test_guard_released_when_reload_task_is_cancelled() {
        let directory = Arc::new(ProviderDirectory::new());
        directory
            .register(slow_provider("plc1", &["A"], Duration::ZERO))
            .unwrap();
        directory.start_all().await.unwrap();

        let replacement = slow_provider("plc1", &["B"], Duration::from_secs(10));
        let task = {
            let directory = directory.clone();
            let replacement = replacement.clone();
            tokio::spawn(async move { directory.reload("plc1", replacement, "stuck.zip").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(directory.install_guard().in_progress());

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!directory.install_guard().in_progress());

        // The half-started replacement owns the slot and is left Faulted,
        // so a later bulk start brings it up.
        let slot = directory.get("plc1").unwrap();
        assert_eq!(slot.state(), State::Faulted);
        replacement.source().set_connect_delay(Duration::ZERO);
        directory.start_all().await.unwrap();
        assert_eq!(slot.state(), State::Running);
        assert!(directory.resolve("plc1.B").is_some());
    }
}
