use std::time::Duration;
use tracing::debug;

/// Rule delay overrides definition delay; zero means none.
pub fn resolve_delay(rule_delay_ms: Option<u64>, definition_delay_ms: Option<u64>) -> Option<Duration> {
    rule_delay_ms
        .or(definition_delay_ms)
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Suspend the current task only.
pub async fn apply_delay(delay: Option<Duration>) {
    if let Some(delay) = delay {
        debug!("Delaying response by {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}
