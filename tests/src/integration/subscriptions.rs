//! # Subscription Integration Tests
//!
//! Registry bookkeeping under contention: concurrent subscribe/unsubscribe
//! on distinct items, duplicate races on one item, fan-out order and fault
//! isolation, and invalidation when a provider stops.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use connector_core::{
        ItemChange, ItemId, ItemProvider, ObserverError, ProviderError, StopType, Subscriber,
    };
    use parking_lot::Mutex;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    use crate::integration::support::simulated_provider;

    // =============================================================================
    // CONTENTION
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_subscribe_unsubscribe_net_counts() {
        let provider = simulated_provider("plc", 32).await;
        let items: Vec<ItemId> = provider.leaves().into_iter().map(|i| i.guid).collect();
        assert_eq!(items.len(), 32);

        // Each task owns a disjoint set of items, subscribes 8 callbacks to
        // each and removes a pseudo-random subset again.
        let mut handles = Vec::new();
        for (task, chunk) in items.chunks(4).enumerate() {
            let provider = provider.clone();
            let chunk = chunk.to_vec();
            handles.push(tokio::task::spawn_blocking(move || {
                let mut rng = rand::rngs::StdRng::seed_from_u64(task as u64);
                let mut expected = Vec::new();
                for item in chunk {
                    let callbacks: Vec<Subscriber> =
                        (0..8).map(|_| Subscriber::infallible(|_| {})).collect();
                    for cb in &callbacks {
                        assert_eq!(provider.subscribe(item, cb.clone()), Ok(true));
                    }
                    let mut kept = 8;
                    for cb in &callbacks {
                        if rng.gen_bool(0.5) {
                            assert!(provider.unsubscribe(item, cb));
                            assert!(!provider.unsubscribe(item, cb));
                            kept -= 1;
                        }
                    }
                    expected.push((item, kept));
                }
                expected
            }));
        }

        for handle in handles {
            for (item, kept) in handle.await.unwrap() {
                assert_eq!(provider.subscriber_count(item), kept);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_duplicate_subscribe_race_admits_one() {
        let provider = simulated_provider("plc", 1).await;
        let item = provider.leaves()[0].guid;
        let shared = Subscriber::infallible(|_| {});

        let mut handles = Vec::new();
        for _ in 0..32 {
            let provider = provider.clone();
            let cb = shared.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                provider.subscribe(item, cb).unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(provider.subscriber_count(item), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_publish_while_subscribing() {
        let provider = simulated_provider("plc", 1).await;
        let item = provider.leaves()[0].guid;
        let delivered = Arc::new(AtomicUsize::new(0));

        let subscriber_task = {
            let provider = provider.clone();
            let delivered = delivered.clone();
            tokio::task::spawn_blocking(move || {
                for _ in 0..200 {
                    let delivered = delivered.clone();
                    provider
                        .subscribe(
                            item,
                            Subscriber::infallible(move |_| {
                                delivered.fetch_add(1, Ordering::Relaxed);
                            }),
                        )
                        .unwrap();
                }
            })
        };
        let publisher_task = {
            let provider = provider.clone();
            tokio::task::spawn_blocking(move || {
                let mut total = 0;
                for i in 0..200 {
                    let report = provider.publish(item, json!(i)).unwrap();
                    assert!(report.is_clean());
                    total += report.delivered;
                }
                total
            })
        };

        subscriber_task.await.unwrap();
        let reported = publisher_task.await.unwrap();
        assert_eq!(delivered.load(Ordering::Relaxed), reported);
        assert_eq!(provider.subscriber_count(item), 200);
    }

    // =============================================================================
    // FAN-OUT
    // =============================================================================

    #[tokio::test]
    async fn test_fan_out_order_and_fault_isolation() {
        let provider = simulated_provider("plc", 1).await;
        let item = provider.leaves()[0].guid;
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "broken", "panicking", "last"] {
            let order = order.clone();
            let cb = Subscriber::new(move |_: &ItemChange| {
                order.lock().push(label);
                match label {
                    "broken" => Err(ObserverError::failed("downstream rejected")),
                    "panicking" => panic!("subscriber bug"),
                    _ => Ok(()),
                }
            });
            provider.subscribe(item, cb).unwrap();
        }

        let report = provider.publish(item, json!(1.25)).unwrap();
        assert_eq!(*order.lock(), vec!["first", "broken", "panicking", "last"]);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_stop_invalidates_all_subscriptions() {
        let provider = simulated_provider("plc", 8).await;
        for leaf in provider.leaves() {
            provider
                .subscribe(leaf.guid, Subscriber::infallible(|_| {}))
                .unwrap();
        }
        assert_eq!(provider.subscribed_items(), 8);

        let stale = provider.leaves()[0].guid;
        provider.stop(StopType::Normal).await.unwrap();
        assert_eq!(provider.subscribed_items(), 0);

        // Handles from the previous session are gone for good.
        assert!(matches!(
            provider.subscribe(stale, Subscriber::infallible(|_| {})),
            Err(ProviderError::ItemNotFound { .. })
        ));
        assert!(!provider.unsubscribe(stale, &Subscriber::infallible(|_| {})));
    }
}
