use std::time::{Duration, Instant};

/// Decaying liveness/latency score for one endpoint. Lower is healthier.
///
/// Failure penalties halve every `half_life`, so a transient outage stops
/// counting against an endpoint after a few half-lives.
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    latency_ms: f64,
    penalty_ms: f64,
    updated_at: Instant,
}

impl EndpointHealth {
    pub fn new(now: Instant) -> Self {
        Self {
            latency_ms: 0.0,
            penalty_ms: 0.0,
            updated_at: now,
        }
    }

    fn decayed_penalty(&self, now: Instant, half_life: Duration) -> f64 {
        if half_life.is_zero() {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(self.updated_at);
        self.penalty_ms * 0.5f64.powf(elapsed.as_secs_f64() / half_life.as_secs_f64())
    }

    pub fn score(&self, now: Instant, half_life: Duration) -> f64 {
        self.latency_ms + self.decayed_penalty(now, half_life)
    }

    pub fn record_success(
        &mut self,
        latency: Duration,
        smoothing: f64,
        now: Instant,
        half_life: Duration,
    ) {
        let sample = latency.as_secs_f64() * 1_000.0;
        self.latency_ms = if self.latency_ms == 0.0 {
            sample
        } else {
            smoothing * sample + (1.0 - smoothing) * self.latency_ms
        };
        self.penalty_ms = self.decayed_penalty(now, half_life);
        self.updated_at = now;
    }

    pub fn record_failure(&mut self, penalty_ms: f64, now: Instant, half_life: Duration) {
        self.penalty_ms = self.decayed_penalty(now, half_life) + penalty_ms;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_penalty_decays() {
        let start = Instant::now();
        let half_life = Duration::from_secs(10);
        let mut health = EndpointHealth::new(start);

        health.record_failure(1_000.0, start, half_life);
        assert!((health.score(start, half_life) - 1_000.0).abs() < 1e-6);

        let later = start + Duration::from_secs(10);
        assert!((health.score(later, half_life) - 500.0).abs() < 1e-6);

        let much_later = start + Duration::from_secs(100);
        assert!(health.score(much_later, half_life) < 1.0);
    }

    #[test]
    fn test_latency_is_smoothed() {
        let now = Instant::now();
        let half_life = Duration::from_secs(10);
        let mut health = EndpointHealth::new(now);

        health.record_success(Duration::from_millis(100), 0.5, now, half_life);
        assert!((health.score(now, half_life) - 100.0).abs() < 1e-6);

        health.record_success(Duration::from_millis(300), 0.5, now, half_life);
        assert!((health.score(now, half_life) - 200.0).abs() < 1e-6);
    }
}
