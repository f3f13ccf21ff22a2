use rand::Rng;

pub const DEFAULT_JITTER_RATIO: f64 = 0.1;

/// Exponential backoff for queue entries, computed from the attempt count so that
/// nothing has to keep a timer alive between passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }

    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Retry immediately; used by tests that drive the queue by hand.
    pub fn immediate() -> Self {
        Self::new(0, 0).with_jitter(0.0)
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    /// Delay before retry number `attempts` (1-based), without jitter.
    pub fn base_delay_for(&self, attempts: u32) -> u64 {
        if attempts == 0 {
            return 0;
        }
        let exponent = (attempts - 1).min(32);
        self.base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms)
    }

    pub fn delay_for(&self, attempts: u32) -> u64 {
        let base = self.base_delay_for(attempts);
        if base == 0 || self.jitter_ratio <= 0.0 {
            return base;
        }
        let spread = (base as f64 * self.jitter_ratio) as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        base.saturating_add(jitter).min(self.max_delay_ms)
    }

    pub fn next_attempt_at(&self, attempts: u32, failed_at: i64) -> i64 {
        let delay = i64::try_from(self.delay_for(attempts)).unwrap_or(i64::MAX);
        failed_at.saturating_add(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5_000, 300_000)
    }
}
