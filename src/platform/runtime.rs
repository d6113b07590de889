//! Async runtime helpers shared by the retry resolver and the storage boundary.

use std::time::Duration;

/// Asynchronously waits for the provided duration. Zero durations return immediately.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn sleep_advances_paused_clock() {
        let start = tokio::time::Instant::now();
        sleep(Duration::from_millis(250)).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250) && elapsed < Duration::from_millis(252));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn zero_sleep_does_not_advance() {
        let start = tokio::time::Instant::now();
        sleep(Duration::ZERO).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
