//! Reconnect policy: jittered exponential back-off, base 1s, cap 60s, ×2
//! per attempt, ±10% jitter, infinite by default unless a max-attempts cap
//! is configured.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// `0` means unlimited retries.
    pub max_attempts: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            max_attempts: 0,
        }
    }
}

impl ReconnectBackoff {
    /// Delay for the given 0-indexed attempt, capped, with ±10% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.backoff_factor.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        let spread = capped_ms * 0.10;
        let jitter = (pseudo_random_fraction(attempt) * 2.0 - 1.0) * spread;
        let jittered_ms = (capped_ms + jitter).max(0.0);
        Duration::from_millis(jittered_ms as u64)
    }

    pub fn should_give_up(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Deterministic pseudo-random fraction in `[0, 1)`, seeded by attempt
/// number so repeated calls for the same attempt are reproducible in
/// tests while still spreading reconnect storms across real callers.
fn pseudo_random_fraction(attempt: u32) -> f64 {
    let hash = attempt.wrapping_mul(2654435761);
    (hash as f64) / (u32::MAX as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let p = ReconnectBackoff::default();
        assert_eq!(p.initial_delay, Duration::from_secs(1));
        assert_eq!(p.max_delay, Duration::from_secs(60));
        assert_eq!(p.max_attempts, 0);
    }

    #[test]
    fn delay_grows_then_caps() {
        let p = ReconnectBackoff::default();
        let d0 = p.delay_for_attempt(0);
        let d3 = p.delay_for_attempt(3);
        let d20 = p.delay_for_attempt(20);
        assert!(d3 > d0);
        assert!(d20 <= Duration::from_millis(66_000));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let p = ReconnectBackoff::default();
        for attempt in 0..10 {
            let d = p.delay_for_attempt(attempt);
            let base = (1000.0 * 2f64.powi(attempt as i32)).min(60_000.0);
            let lower = (base * 0.9) as u64;
            let upper = (base * 1.1) as u64;
            assert!(d.as_millis() as u64 >= lower && d.as_millis() as u64 <= upper);
        }
    }

    #[test]
    fn unlimited_never_gives_up() {
        assert!(!ReconnectBackoff::default().should_give_up(1_000_000));
    }

    #[test]
    fn capped_attempts_give_up() {
        let p = ReconnectBackoff {
            max_attempts: 5,
            ..Default::default()
        };
        assert!(!p.should_give_up(4));
        assert!(p.should_give_up(5));
    }
}
