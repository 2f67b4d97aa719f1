//! Waiting for the harness to serve its info endpoint.
//!
//! Polls the harness info endpoint until it answers. Any HTTP answer below 500
//! counts as ready; connection errors and 5xx mean keep waiting.

use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;

use crate::error::BridgeError;

/// Delay between readiness checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Per-request timeout of a single check.
const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Wait until the harness at `info_url` answers, or fail after `timeout`.
pub async fn wait_for_harness(info_url: &str, timeout: Duration) -> Result<(), BridgeError> {
    let client = Client::builder()
        .timeout(POLL_REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new());

    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match client.get(info_url).send().await {
            Ok(response) if response.status().as_u16() < 500 => {
                tracing::info!(
                    url = info_url,
                    status = response.status().as_u16(),
                    attempts,
                    "Remote UI harness is ready"
                );
                return Ok(());
            }
            Ok(response) => {
                tracing::debug!(url = info_url, status = response.status().as_u16(), "Harness not ready yet");
            }
            Err(e) => {
                tracing::debug!(url = info_url, error = %e, "Harness not reachable yet");
            }
        }

        let waited = started.elapsed();
        if waited >= timeout {
            tracing::warn!(url = info_url, attempts, waited_ms = waited.as_millis() as u64, "Timed out waiting for harness");
            return Err(BridgeError::HarnessUnavailable {
                url: info_url.to_string(),
                waited_ms: waited.as_millis() as u64,
            });
        }

        tokio::time::sleep(POLL_INTERVAL.min(timeout - waited)).await;
    }
}
