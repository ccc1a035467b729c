//! Running minimum/maximum/average of a sample stream

use serde::{Deserialize, Serialize};

/// Min/max/mean of every sample seen since the last reset.
///
/// Inputs are never rejected. A NaN sticks in min, max and average until
/// `reset`, and an infinity sticks in whichever bound it exceeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStatistic {
    min: Option<f32>,
    max: Option<f32>,
    sum: f64,
    count: u64,
}

/// Point-in-time copy of a statistic, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticSummary {
    pub minimum: Option<f32>,
    pub maximum: Option<f32>,
    pub average: Option<f32>,
    pub count: u64,
}

impl RunningStatistic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the statistic
    pub fn process(&mut self, value: f32) {
        self.min = Some(match self.min {
            Some(current) if !(value.is_nan() || value < current) => current,
            _ => value,
        });
        self.max = Some(match self.max {
            Some(current) if !(value.is_nan() || value > current) => current,
            _ => value,
        });
        self.sum += f64::from(value);
        self.count += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Smallest sample, `None` before the first sample
    pub fn minimum(&self) -> Option<f32> {
        self.min
    }

    /// Largest sample, `None` before the first sample
    pub fn maximum(&self) -> Option<f32> {
        self.max
    }

    /// Mean of all samples, `None` before the first sample
    pub fn average(&self) -> Option<f32> {
        if self.count > 0 {
            Some((self.sum / self.count as f64) as f32)
        } else {
            None
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn summary(&self) -> StatisticSummary {
        StatisticSummary {
            minimum: self.minimum(),
            maximum: self.maximum(),
            average: self.average(),
            count: self.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_empty_statistic_is_undefined() {
        let stat = RunningStatistic::new();
        assert_eq!(stat.minimum(), None);
        assert_eq!(stat.maximum(), None);
        assert_eq!(stat.average(), None);
        assert_eq!(stat.count(), 0);
    }

    #[test]
    fn test_min_max_average() {
        let mut stat = RunningStatistic::new();
        for value in [3.0, -1.0, 5.0, 2.0] {
            stat.process(value);
        }

        assert_eq!(stat.minimum(), Some(-1.0));
        assert_eq!(stat.maximum(), Some(5.0));
        assert_approx_eq!(stat.average().unwrap(), 2.25, 1e-6);
        assert_eq!(stat.count(), 4);
    }

    #[test]
    fn test_no_leakage_across_reset() {
        let mut stat = RunningStatistic::new();
        for value in [3.0, -1.0, 5.0, 2.0] {
            stat.process(value);
        }
        stat.reset();
        stat.process(10.0);

        assert_eq!(stat.minimum(), Some(10.0));
        assert_eq!(stat.maximum(), Some(10.0));
        assert_eq!(stat.average(), Some(10.0));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut stat = RunningStatistic::new();
        stat.process(4.0);
        stat.reset();
        stat.reset();
        assert_eq!(stat, RunningStatistic::new());
    }

    #[test]
    fn test_constant_stream() {
        let mut stat = RunningStatistic::new();
        for _ in 0..1000 {
            stat.process(0.7);
        }

        let summary = stat.summary();
        assert_eq!(summary.minimum, Some(0.7));
        assert_eq!(summary.maximum, Some(0.7));
        assert_approx_eq!(summary.average.unwrap(), 0.7, 1e-6);
        assert_eq!(summary.count, 1000);
    }

    #[test]
    fn test_nan_poisons_until_reset() {
        let mut stat = RunningStatistic::new();
        stat.process(1.0);
        stat.process(f32::NAN);
        stat.process(2.0);

        assert!(stat.minimum().unwrap().is_nan());
        assert!(stat.maximum().unwrap().is_nan());
        assert!(stat.average().unwrap().is_nan());

        stat.reset();
        stat.process(2.0);
        assert_eq!(stat.minimum(), Some(2.0));
    }

    #[test]
    fn test_infinity_sticks_in_bound() {
        let mut stat = RunningStatistic::new();
        stat.process(1.0);
        stat.process(f32::INFINITY);
        stat.process(3.0);

        assert_eq!(stat.minimum(), Some(1.0));
        assert_eq!(stat.maximum(), Some(f32::INFINITY));
        assert_eq!(stat.average(), Some(f32::INFINITY));
    }
}
