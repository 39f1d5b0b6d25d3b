//! # Lifecycle Integration Tests
//!
//! The state-machine contract as seen through real providers: event order,
//! no-op starts, concurrent lifecycle calls and observer fault isolation.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use connector_core::{
        DirectoryError, ItemProvider, LifecycleError, LifecycleOp, Observer, ObserverError,
        ProviderDirectory, State, StateChange, StopType, Transition,
    };
    use parking_lot::Mutex;

    use crate::integration::support::slow_provider;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn record(provider: &dyn ItemProvider) -> Arc<Mutex<Vec<(State, State)>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        provider.on_state_changed(Observer::infallible(move |c: &StateChange| {
            sink.lock().push((c.previous, c.current));
        }));
        events
    }

    // =============================================================================
    // EVENT SEQUENCES
    // =============================================================================

    #[tokio::test]
    async fn test_full_cycle_event_order() {
        let provider = slow_provider("plc", &["A.B"], Duration::ZERO);
        let events = record(provider.as_ref());

        provider.start().await.unwrap();
        provider.restart(StopType::Normal).await.unwrap();
        provider.stop(StopType::Shutdown).await.unwrap();

        use State::*;
        assert_eq!(
            *events.lock(),
            vec![
                (Initialized, Starting),
                (Starting, Running),
                (Running, Restarting),
                (Restarting, Stopping),
                (Stopping, Stopped),
                (Stopped, Starting),
                (Starting, Running),
                (Running, Stopping),
                (Stopping, Stopped),
            ]
        );
        assert_eq!(provider.source().connects.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_every_observer_sees_the_same_sequence() {
        let provider = slow_provider("plc", &["A"], Duration::ZERO);
        let first = record(provider.as_ref());
        let second = record(provider.as_ref());

        provider.start().await.unwrap();
        assert_eq!(
            provider.start().await.unwrap(),
            Transition::NoOp {
                state: State::Running
            }
        );
        provider.stop(StopType::Normal).await.unwrap();

        assert_eq!(first.lock().len(), 4);
        assert_eq!(*first.lock(), *second.lock());
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_change_state_once() {
        let provider = slow_provider("plc", &["A"], Duration::from_millis(30));
        let events = record(provider.as_ref());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let provider = provider.clone();
            handles.push(tokio::spawn(async move { provider.start().await }));
        }

        let mut changed = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Transition::Changed { .. } => changed += 1,
                Transition::NoOp { state } => {
                    assert!(matches!(state, State::Starting | State::Running))
                }
            }
        }

        assert_eq!(changed, 1);
        assert_eq!(provider.state(), State::Running);
        assert_eq!(
            *events.lock(),
            vec![
                (State::Initialized, State::Starting),
                (State::Starting, State::Running)
            ]
        );
        assert_eq!(provider.source().connects.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_racing_start_is_noop() {
        let provider = slow_provider("plc", &["A"], Duration::from_millis(50));

        let starter = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.start().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            provider.stop(StopType::Normal).await.unwrap(),
            Transition::NoOp {
                state: State::Starting
            }
        );
        starter.await.unwrap().unwrap();
        assert_eq!(provider.state(), State::Running);
    }

    // =============================================================================
    // CANCELLATION
    // =============================================================================

    #[tokio::test]
    async fn test_cancelled_start_leaves_provider_restartable() {
        let provider = slow_provider("plc", &["A"], Duration::from_millis(200));
        let events = record(provider.as_ref());

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), provider.start()).await;
        assert!(cancelled.is_err());
        assert_eq!(provider.state(), State::Faulted);
        assert!(provider.find("A").is_none());

        provider.source().set_connect_delay(Duration::ZERO);
        assert_eq!(
            provider.start().await.unwrap(),
            Transition::Changed {
                from: State::Faulted,
                to: State::Running
            }
        );
        assert!(provider.find("A").is_some());

        use State::*;
        assert_eq!(
            *events.lock(),
            vec![
                (Initialized, Starting),
                (Starting, Faulted),
                (Faulted, Starting),
                (Starting, Running),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_stop_can_be_repeated() {
        let provider = slow_provider("plc", &["A"], Duration::ZERO);
        provider.start().await.unwrap();

        // A stop that is dropped before it runs never claims the provider.
        drop(provider.stop(StopType::Normal));
        assert_eq!(provider.state(), State::Running);

        provider.stop(StopType::Normal).await.unwrap();
        assert_eq!(provider.state(), State::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_start_all_reports_provider_owned_by_another_call() {
        let provider = slow_provider("plc", &["A"], Duration::from_millis(200));
        let directory = ProviderDirectory::new();
        directory.register(provider.clone()).unwrap();

        let starter = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.start().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        match directory.start_all().await {
            Err(DirectoryError::Many(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "plc");
                assert_eq!(
                    failures[0].1,
                    LifecycleError::Unsettled {
                        component: "plc".into(),
                        operation: LifecycleOp::Start,
                        state: State::Starting,
                    }
                );
            }
            other => panic!("expected an unsettled provider, got {:?}", other),
        }

        starter.await.unwrap().unwrap();
        directory.start_all().await.unwrap();
        assert_eq!(provider.state(), State::Running);
    }

    // =============================================================================
    // OBSERVER FAULTS
    // =============================================================================

    #[tokio::test]
    async fn test_faulty_observers_do_not_stop_transitions() {
        let provider = slow_provider("plc", &["A"], Duration::ZERO);
        let healthy = record(provider.as_ref());
        provider.on_state_changed(Observer::new(|_: &StateChange| Err(ObserverError::failed("audit log full"))));
        provider.on_state_changed(Observer::infallible(|c: &StateChange| {
            if c.current == State::Running {
                panic!("dashboard crashed");
            }
        }));
        let late = record(provider.as_ref());

        match provider.start().await {
            Err(LifecycleError::Observers { failures, .. }) => {
                // One error per event from the failing observer, one panic.
                assert_eq!(failures.len(), 3);
            }
            other => panic!("expected observer failures, got {:?}", other),
        }

        assert_eq!(provider.state(), State::Running);
        assert_eq!(healthy.lock().len(), 2);
        assert_eq!(*healthy.lock(), *late.lock());
    }

    #[tokio::test]
    async fn test_removed_observer_receives_nothing() {
        let provider = slow_provider("plc", &["A"], Duration::ZERO);
        let events = Arc::new(Mutex::new(0usize));
        let sink = events.clone();
        let observer = Observer::infallible(move |_: &StateChange| *sink.lock() += 1);

        assert!(provider.on_state_changed(observer.clone()));
        assert!(!provider.on_state_changed(observer.clone()));
        provider.start().await.unwrap();
        assert!(provider.remove_state_observer(&observer));
        provider.stop(StopType::Normal).await.unwrap();

        assert_eq!(*events.lock(), 2);
    }
}
