//! Property tests for sequence uniqueness under random contention.

mod common;

use std::collections::HashSet;

use ordinal::Clock;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn increments_are_unique_and_dense(
        callers in 1usize..6,
        increments in 1usize..12,
        keys in prop::collection::vec("[a-z]{1,6}", 1..4),
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(3).enable_all().build().unwrap();
        rt.block_on(async {
            let (_ensemble, coordinator, _) = common::coordinator(10);
            let clock = coordinator.clock();

            let mut tasks = Vec::new();
            for caller in 0..callers {
                let clock = clock.clone();
                let key = keys[caller % keys.len()].clone();
                tasks.push(tokio::spawn(async move {
                    let mut seen = Vec::new();
                    for _ in 0..increments {
                        seen.push(clock.get_next_sequence(&key).await.unwrap());
                    }
                    (key, seen)
                }));
            }

            let mut per_key: std::collections::HashMap<String, HashSet<i64>> = Default::default();
            for task in tasks {
                let (key, seen) = task.await.unwrap();
                let values = per_key.entry(key).or_default();
                for value in seen {
                    prop_assert!(values.insert(value), "duplicate value {}", value);
                }
            }

            // Without faults no value is skipped, so each key's values are 0..n.
            for (key, values) in per_key {
                let n = values.len() as i64;
                prop_assert_eq!(values, (0..n).collect::<HashSet<_>>());
                prop_assert_eq!(clock.get_sequence(&key).await.unwrap(), n - 1);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
