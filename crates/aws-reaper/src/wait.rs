//! Polling with exponential backoff until a condition holds.
//!
//! Used where a delete call returns before the resource is actually gone and a
//! later resource type depends on it (terminating instances still hold the
//! network interfaces their security groups and subnets are waiting on).

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for resource waiting with exponential backoff.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between checks
    pub initial_delay: Duration,
    /// Maximum delay between checks (cap for exponential growth)
    pub max_delay: Duration,
    /// Maximum total time to wait before timeout
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(15),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll `check` until it returns `Ok(true)`.
///
/// # Returns
/// * `Ok(())` - Condition holds
/// * `Err` - Timeout, or `check` returned an error
pub async fn wait_until<F, Fut>(config: WaitConfig, what: &str, check: F) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    loop {
        attempts += 1;

        match check().await {
            Ok(true) => {
                debug!(what, attempts, "Condition reached");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(what, error = ?e, "Wait check failed");
                return Err(e);
            }
        }

        if start.elapsed() >= config.timeout {
            anyhow::bail!(
                "Timeout waiting for {} after {:?} ({} attempts)",
                what,
                config.timeout,
                attempts
            );
        }

        let delay = delays.next().unwrap_or(config.max_delay);
        debug!(
            what,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Not ready, waiting"
        );
        tokio::time::sleep(delay).await;
    }
}
