//! Error circuit breaker
//!
//! Counts consecutive per-frame processing failures and trips once the
//! threshold is reached. Malformed-frame skips are not failures; any
//! successful frame resets the counter.

/// Consecutive-failure counter owned by the frame loop
#[derive(Debug)]
pub struct ErrorCircuitBreaker {
    consecutive: u32,
    threshold: u32,
}

impl ErrorCircuitBreaker {
    /// Create a breaker that trips at `threshold` consecutive failures
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    /// Record a per-frame failure; returns true when the breaker trips
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        tracing::warn!(
            consecutive = self.consecutive,
            threshold = self.threshold,
            "Consecutive frame errors"
        );
        self.consecutive >= self.threshold
    }

    /// Record a successfully processed frame, resetting the counter
    pub fn record_success(&mut self) {
        if self.consecutive > 0 {
            tracing::debug!(
                consecutive = self.consecutive,
                "Frame succeeded, resetting error counter"
            );
            self.consecutive = 0;
        }
    }

    /// Current consecutive-failure count
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }
}
