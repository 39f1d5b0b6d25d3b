//! # Directory Integration Tests
//!
//! Cross-provider address resolution over simulated connectors: FQN
//! round-trips, sync/async agreement and browsing while trees mutate.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use connector_core::{ItemProvider, ProviderDirectory, StopType};

    use crate::integration::support::simulated_provider;

    async fn directory() -> ProviderDirectory {
        let directory = ProviderDirectory::new();
        directory.register(simulated_provider("plc1", 12).await).unwrap();
        directory.register(simulated_provider("plc2", 5).await).unwrap();
        directory
    }

    #[tokio::test]
    async fn test_every_item_round_trips_through_the_directory() {
        let directory = directory().await;
        for name in directory.provider_names() {
            let provider = directory.get(&name).unwrap();
            let mut pending = vec![provider.root()];
            while let Some(item) = pending.pop() {
                let resolved = directory.resolve(&item.fqn).unwrap();
                assert_eq!(resolved.guid, item.guid, "{}", item.fqn);
                pending.extend(provider.browse(Some(item.guid)));
            }
        }
    }

    #[tokio::test]
    async fn test_async_resolution_agrees_with_sync() {
        let directory = directory().await;
        let paths = [
            "plc1",
            "plc1.Line0",
            "plc1.Line3.Tag7",
            "plc2.Line1.Tag1",
            "plc2.Line1.Tag2",
            "plc3.Line0",
            "plc1.",
        ];
        for path in paths {
            assert_eq!(
                directory.resolve_async(path).await.unwrap(),
                directory.resolve(path),
                "{}",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_browse_reflects_stopped_providers() {
        let directory = directory().await;
        assert_eq!(directory.browse(Some("plc2")).len(), 4);

        directory
            .get("plc2")
            .unwrap()
            .stop(StopType::Normal)
            .await
            .unwrap();
        assert!(directory.browse(Some("plc2")).is_empty());
        assert!(directory.resolve("plc2.Line1.Tag1").is_none());
        assert!(directory.resolve("plc2").is_some());

        directory.start_all().await.unwrap();
        assert!(directory.resolve("plc2.Line1.Tag1").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_resolution_during_tree_mutation() {
        let provider = simulated_provider("plc1", 4).await;
        let directory = Arc::new(ProviderDirectory::new());
        directory.register(provider.clone()).unwrap();
        let line0 = provider.find("Line0").unwrap().guid;

        let writer = {
            let provider = provider.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    let id = provider.add_item(Some(line0), &format!("Dyn{}", i)).unwrap();
                    if i % 2 == 0 {
                        provider.remove_item(id).unwrap();
                    }
                }
            })
        };
        let reader = {
            let directory = directory.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    assert!(directory
                        .resolve_async("plc1.Line0.Tag0")
                        .await
                        .unwrap()
                        .is_some());
                    directory.browse(Some("plc1.Line0"));
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        // Tag0 plus the 50 odd-numbered survivors.
        assert_eq!(directory.browse(Some("plc1.Line0")).len(), 51);
    }
}
