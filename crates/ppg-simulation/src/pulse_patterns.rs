//! Heart-rate patterns and the pulse waveform shape for PPG simulation

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// How the simulated heart rate evolves over time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HeartRatePattern {
    /// Fixed rate
    Constant { bpm: f32 },
    /// Linear change, holding `end_bpm` after `duration` seconds
    Ramp {
        start_bpm: f32,
        end_bpm: f32,
        duration: f32,
    },
    /// Rate modulated by breathing (respiratory sinus arrhythmia)
    Respiratory {
        mean_bpm: f32,
        depth_bpm: f32,
        breaths_per_minute: f32,
    },
}

impl HeartRatePattern {
    /// Heart rate in beats per minute at `time` seconds
    pub fn bpm_at_time(&self, time: f32) -> f32 {
        match self {
            HeartRatePattern::Constant { bpm } => *bpm,

            HeartRatePattern::Ramp { start_bpm, end_bpm, duration } => {
                if time >= *duration {
                    *end_bpm
                } else {
                    start_bpm + (end_bpm - start_bpm) * (time / duration)
                }
            },

            HeartRatePattern::Respiratory { mean_bpm, depth_bpm, breaths_per_minute } => {
                let breath_hz = breaths_per_minute / 60.0;
                mean_bpm + depth_bpm * (2.0 * PI * breath_hz * time).sin()
            },
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            HeartRatePattern::Constant { .. } => "Constant heart rate",
            HeartRatePattern::Ramp { .. } => "Heart rate ramp",
            HeartRatePattern::Respiratory { .. } => "Respiratory sinus arrhythmia",
        }
    }

    /// Create common preset patterns
    pub fn presets() -> Vec<(&'static str, HeartRatePattern)> {
        vec![
            ("Resting", HeartRatePattern::Constant { bpm: 62.0 }),
            ("Normal", HeartRatePattern::Constant { bpm: 75.0 }),
            ("Tachycardia", HeartRatePattern::Constant { bpm: 130.0 }),
            ("Warmup", HeartRatePattern::Ramp {
                start_bpm: 70.0, end_bpm: 140.0, duration: 60.0
            }),
            ("Recovery", HeartRatePattern::Ramp {
                start_bpm: 150.0, end_bpm: 80.0, duration: 90.0
            }),
            ("Relaxed Breathing", HeartRatePattern::Respiratory {
                mean_bpm: 68.0, depth_bpm: 6.0, breaths_per_minute: 12.0
            }),
        ]
    }
}

impl Default for HeartRatePattern {
    fn default() -> Self {
        HeartRatePattern::Constant { bpm: 75.0 }
    }
}

/// Normalised pulse shape over one cardiac cycle, `phase` in [0, 1).
///
/// A systolic peak followed by a smaller diastolic wave after the dicrotic
/// notch; the peak value is close to 1.0.
pub fn pulse_shape(phase: f32) -> f32 {
    const SYSTOLIC_CENTER: f32 = 0.2;
    const SYSTOLIC_WIDTH: f32 = 0.07;
    const DIASTOLIC_CENTER: f32 = 0.5;
    const DIASTOLIC_WIDTH: f32 = 0.1;
    const DIASTOLIC_HEIGHT: f32 = 0.4;

    let bump = |center: f32, width: f32| {
        let d = (phase - center) / width;
        (-0.5 * d * d).exp()
    };

    bump(SYSTOLIC_CENTER, SYSTOLIC_WIDTH) + DIASTOLIC_HEIGHT * bump(DIASTOLIC_CENTER, DIASTOLIC_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_ramp_pattern() {
        let ramp = HeartRatePattern::Ramp { start_bpm: 60.0, end_bpm: 120.0, duration: 10.0 };
        assert_eq!(ramp.bpm_at_time(0.0), 60.0);
        assert_approx_eq!(ramp.bpm_at_time(5.0), 90.0, 1e-4);
        assert_eq!(ramp.bpm_at_time(20.0), 120.0);
    }

    #[test]
    fn test_respiratory_pattern_bounds() {
        let pattern = HeartRatePattern::Respiratory {
            mean_bpm: 70.0, depth_bpm: 5.0, breaths_per_minute: 15.0
        };
        for i in 0..100 {
            let bpm = pattern.bpm_at_time(i as f32 * 0.1);
            assert!((65.0..=75.0).contains(&bpm));
        }
    }

    #[test]
    fn test_pulse_shape_peaks_in_systole() {
        let systolic = pulse_shape(0.2);
        let diastolic = pulse_shape(0.5);
        let end = pulse_shape(0.95);

        assert!(systolic > 0.95);
        assert!(diastolic > 0.3 && diastolic < systolic);
        assert!(end < 0.05);
    }

    #[test]
    fn test_presets_are_plausible() {
        for (name, pattern) in HeartRatePattern::presets() {
            let bpm = pattern.bpm_at_time(0.0);
            assert!(bpm > 30.0 && bpm < 220.0, "{} starts at {} bpm", name, bpm);
        }
    }
}
