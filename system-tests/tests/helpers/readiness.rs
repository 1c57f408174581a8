// system-tests/tests/helpers/readiness.rs
// ============================================================================
// Module: Readiness Helpers
// Description: Readiness polling for evalstream servers.
// Purpose: Ensure servers are ready without arbitrary sleeps.
// Dependencies: tokio
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use tokio::time::sleep;

use super::client::ApiClient;

/// Polls `GET /ready` until it answers 200 or the timeout expires.
pub async fn wait_for_server_ready(client: &ApiClient, timeout: Duration) -> Result<(), String> {
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        let outcome = match client.get("/ready").await {
            Ok(response) if response.status == 200 => return Ok(()),
            Ok(response) => format!("status {}", response.status),
            Err(err) => err,
        };
        if start.elapsed() > timeout {
            return Err(format!("server readiness timeout after {attempts} attempts: {outcome}"));
        }
        sleep(Duration::from_millis(50)).await;
    }
}
