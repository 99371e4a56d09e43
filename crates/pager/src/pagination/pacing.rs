// ABOUTME: Jittered delay ranges for page and item transitions, plus a cancellable pause.
// ABOUTME: Delays are drawn uniformly from [min, max] seconds on every transition.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::CrawlError;

/// A `[min, max]` range in seconds. Serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl From<(f64, f64)> for DelayRange {
    fn from((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }
}

impl From<DelayRange> for (f64, f64) {
    fn from(range: DelayRange) -> Self {
        (range.min, range.max)
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Longest delay a range may ask for, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange { min: 0.0, max: 0.0 };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Rejects negative, non-finite, oversized or inverted bounds.
    pub fn validate(&self, name: &str) -> Result<(), CrawlError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(CrawlError::config(
                "Validate",
                anyhow::anyhow!("{} bounds must be finite", name),
            ));
        }
        if self.min < 0.0 || self.max < 0.0 {
            return Err(CrawlError::config(
                "Validate",
                anyhow::anyhow!("{} bounds must be >= 0", name),
            ));
        }
        if self.max > MAX_DELAY_SECS {
            return Err(CrawlError::config(
                "Validate",
                anyhow::anyhow!("{} bounds must be <= {} seconds", name, MAX_DELAY_SECS),
            ));
        }
        if self.min > self.max {
            return Err(CrawlError::config(
                "Validate",
                anyhow::anyhow!("{} min {} exceeds max {}", name, self.min, self.max),
            ));
        }
        Ok(())
    }

    pub fn is_zero(&self) -> bool {
        self.max <= 0.0
    }

    /// Draws a delay in seconds, uniformly within the bounds (inclusive).
    pub fn sample_secs<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    /// Draws a delay using the thread-local generator.
    pub fn sample(&self) -> Duration {
        let secs = self.sample_secs(&mut rand::thread_rng());
        Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS)).unwrap_or(Duration::ZERO)
    }
}

/// Sleeps for `delay` unless cancelled first. Returns false when cancelled.
///
/// Only the calling task waits; other crawls on the runtime keep running.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_samples_stay_within_bounds() {
        let range = DelayRange::new(0.5, 2.0);
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let secs = range.sample_secs(&mut rng);
            assert!((0.5..=2.0).contains(&secs), "sample {} out of bounds", secs);
        }
        for _ in 0..1000 {
            let delay = range.sample();
            assert!(delay >= Duration::from_millis(500) && delay <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_degenerate_range_returns_min() {
        let range = DelayRange::new(1.5, 1.5);
        assert_eq!(range.sample_secs(&mut rand::thread_rng()), 1.5);
        assert!(DelayRange::ZERO.is_zero());
        assert!(!range.is_zero());
    }

    #[test]
    fn test_validate_bounds() {
        assert!(DelayRange::new(0.0, 0.0).validate("page_delay").is_ok());
        assert!(DelayRange::new(1.0, 3.0).validate("page_delay").is_ok());

        let err = DelayRange::new(3.0, 1.0).validate("page_delay").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("page_delay"));

        assert!(DelayRange::new(-1.0, 1.0).validate("item_delay").is_err());
        assert!(DelayRange::new(0.0, f64::INFINITY).validate("item_delay").is_err());
        assert!(DelayRange::new(f64::NAN, 1.0).validate("item_delay").is_err());

        assert!(DelayRange::new(MAX_DELAY_SECS, MAX_DELAY_SECS).validate("page_delay").is_ok());
        let err = DelayRange::new(1e20, 1e20).validate("page_delay").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_sample_never_panics_on_huge_bounds() {
        let delay = DelayRange::new(1e20, 1e20).sample();
        assert_eq!(delay, Duration::from_secs_f64(MAX_DELAY_SECS));
    }

    #[test]
    fn test_deserialize_from_pair() {
        let range: DelayRange = serde_json::from_str("[1.0, 3.5]").unwrap();
        assert_eq!(range, DelayRange::new(1.0, 3.5));
        assert_eq!(serde_json::to_string(&range).unwrap(), "[1.0,3.5]");
    }

    #[tokio::test]
    async fn test_pause_is_cut_short_by_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let completed = pause(Duration::from_secs(10), &cancel).await;
        assert!(!completed);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_pause_completes() {
        let cancel = CancellationToken::new();
        assert!(pause(Duration::from_millis(5), &cancel).await);
        assert!(pause(Duration::ZERO, &cancel).await);
    }
}
