//! Shared test helpers for store tests.

#![allow(dead_code)]

use conflux_store::IndexedStore;
use std::time::Duration;

/// Store of strings keyed by their upper-case form.
pub fn upper_case_store() -> IndexedStore<String, String> {
    IndexedStore::new(|value: &String| Some(value.to_uppercase()))
}

/// Store of `(name, group)` pairs keyed by name.
pub fn pair_store() -> IndexedStore<String, (String, u32)> {
    IndexedStore::new(|value: &(String, u32)| Some(value.0.clone()))
}

pub fn s(value: &str) -> String {
    value.to_string()
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met within timeout");
}
