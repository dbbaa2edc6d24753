use std::time::Duration;

/// Gain applied to each new sample in the smoothed estimate (1/8).
const SRTT_GAIN: f64 = 0.125;
/// Gain applied to each new deviation in the variance estimate (1/4).
const RTTVAR_GAIN: f64 = 0.25;

/// Smoothed round-trip-time estimator fed by the liveness check.
///
/// Follows the TCP SRTT scheme: the first sample seeds the estimate, later
/// samples move it by an exponentially weighted moving average. The mean
/// deviation and the minimum ever observed are tracked alongside.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RttEstimator {
    smoothed: Option<Duration>,
    variance: Duration,
    min: Option<Duration>,
    last: Option<Duration>,
    samples: u64,
}

/// Point-in-time view of an [`RttEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttSnapshot {
    pub smoothed: Duration,
    pub variance: Duration,
    pub min: Duration,
    pub last: Duration,
    pub samples: u64,
}

impl RttEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one measured round trip, returning the updated smoothed value.
    pub fn record(&mut self, sample: Duration) -> Duration {
        self.samples += 1;
        self.last = Some(sample);
        self.min = Some(self.min.map_or(sample, |min| min.min(sample)));

        let smoothed = match self.smoothed {
            None => {
                self.variance = sample / 2;
                sample
            }
            Some(srtt) => {
                let deviation = srtt.abs_diff(sample);
                self.variance = blend(self.variance, deviation, RTTVAR_GAIN);
                blend(srtt, sample, SRTT_GAIN)
            }
        };
        self.smoothed = Some(smoothed);
        smoothed
    }

    pub fn smoothed(&self) -> Option<Duration> {
        self.smoothed
    }

    pub fn variance(&self) -> Duration {
        self.variance
    }

    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    pub fn last(&self) -> Option<Duration> {
        self.last
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// `None` until the first sample arrives.
    pub fn snapshot(&self) -> Option<RttSnapshot> {
        Some(RttSnapshot {
            smoothed: self.smoothed?,
            variance: self.variance,
            min: self.min?,
            last: self.last?,
            samples: self.samples,
        })
    }

    /// Retransmission-style deadline: smoothed plus four deviations.
    pub fn timeout_hint(&self) -> Option<Duration> {
        self.smoothed.map(|srtt| srtt + self.variance * 4)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn blend(current: Duration, sample: Duration, gain: f64) -> Duration {
    let secs = (sample.as_secs_f64() - current.as_secs_f64()).mul_add(gain, current.as_secs_f64());
    Duration::from_secs_f64(secs.max(0.0))
}

/// Render a duration in microseconds with two decimals.
pub fn format_us(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64() * 1_000_000.0)
}
