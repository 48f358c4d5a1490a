//! Retransmission-timeout estimator (Jacobson/Karn-style, no Karn
//! correction for retransmitted segments — matching the reference
//! implementation, which re-samples every ACKed segment regardless of
//! whether it was retransmitted).

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RttEstimator {
    estimated: f64,
    deviation: f64,
    timeout: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
}

impl RttEstimator {
    pub fn new(initial_timeout: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        RttEstimator {
            estimated: initial_timeout,
            deviation: 0.0,
            timeout: initial_timeout,
            alpha,
            beta,
            gamma,
        }
    }

    /// Folds one new RTT sample into the estimator.
    pub fn sample(&mut self, sample: Duration) {
        let sample = sample.as_secs_f64();

        self.estimated = (1.0 - self.alpha) * self.estimated + self.alpha * sample;
        self.deviation = (1.0 - self.beta) * self.deviation + self.beta * (sample - self.estimated).abs();
        self.timeout = self.estimated + self.gamma * self.deviation;
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.max(0.0))
    }

    pub fn estimated_rtt(&self) -> f64 {
        self.estimated
    }

    pub fn deviation_rtt(&self) -> f64 {
        self.deviation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_timeout_is_one_second() {
        let est = RttEstimator::new(1.0, 0.125, 0.25, 4.0);
        assert_eq!(est.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn sampling_moves_estimate_toward_the_sample() {
        let mut est = RttEstimator::new(1.0, 0.125, 0.25, 4.0);
        est.sample(Duration::from_millis(200));

        assert!(est.estimated_rtt() < 1.0);
        assert!(est.estimated_rtt() > 0.2);
    }

    #[test]
    fn repeated_stable_samples_converge() {
        let mut est = RttEstimator::new(1.0, 0.125, 0.25, 4.0);
        for _ in 0..50 {
            est.sample(Duration::from_millis(100));
        }

        assert!((est.estimated_rtt() - 0.1).abs() < 0.01);
        assert!(est.deviation_rtt() < 0.01);
    }
}
