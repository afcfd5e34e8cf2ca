//! Small helpers shared by the integration tests

use std::time::Duration;

use tokio::time::{sleep, Instant};

/// `item-1`, `item-2`, ... `item-n`
pub fn numbered_items(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("item-{i}")).collect()
}

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }

        condition()
    }
}
