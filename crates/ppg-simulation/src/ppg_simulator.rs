//! Synthetic PPG signal generator

use crate::pulse_patterns::{pulse_shape, HeartRatePattern};
use ppg_core::{validate_sampling_frequency, PpgError, PpgResult, DEFAULT_SAMPLING_FREQUENCY};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Configuration for PPG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpgSimulatorConfig {
    /// Sampling rate in Hz
    pub sampling_frequency: f32,
    /// Heart rate over time
    pub heart_rate: HeartRatePattern,
    /// Raw sensor level the pulse rides on (ADC counts)
    pub dc_level: f32,
    /// Peak-to-trough size of the pulsatile component (ADC counts)
    pub pulse_amplitude: f32,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// Noise configuration for realistic PPG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (ADC counts, 0.0 = no noise)
    pub gaussian_std: f32,
    /// Baseline wander amplitude (ADC counts)
    pub baseline_wander: f32,
    /// Baseline wander frequency in Hz
    pub wander_frequency: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 5.0,
            baseline_wander: 80.0,
            wander_frequency: 0.1,
        }
    }
}

impl NoiseConfig {
    /// Noise-free configuration
    pub fn clean() -> Self {
        Self {
            gaussian_std: 0.0,
            baseline_wander: 0.0,
            wander_frequency: 0.1,
        }
    }
}

impl Default for PpgSimulatorConfig {
    fn default() -> Self {
        Self {
            sampling_frequency: DEFAULT_SAMPLING_FREQUENCY,
            heart_rate: HeartRatePattern::default(),
            dc_level: 50_000.0,
            pulse_amplitude: 600.0,
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

impl PpgSimulatorConfig {
    fn validate(&self) -> PpgResult<()> {
        validate_sampling_frequency(self.sampling_frequency)?;

        if !(self.noise.gaussian_std.is_finite() && self.noise.gaussian_std >= 0.0) {
            return Err(PpgError::SimulationError {
                message: format!("Noise standard deviation {} must be non-negative", self.noise.gaussian_std),
            });
        }

        Ok(())
    }
}

/// PPG signal simulator.
///
/// The cardiac phase is accumulated sample by sample, so heart-rate changes
/// never cause a discontinuity in the waveform.
pub struct PpgSimulator {
    config: PpgSimulatorConfig,
    rng: StdRng,
    normal_dist: Normal<f32>,
    sample_index: u64,
    phase: f32,
}

impl PpgSimulator {
    /// Create new PPG simulator with configuration
    pub fn new(config: PpgSimulatorConfig) -> PpgResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let normal_dist = Self::noise_distribution(&config)?;

        Ok(PpgSimulator {
            config,
            rng,
            normal_dist,
            sample_index: 0,
            phase: 0.0,
        })
    }

    fn noise_distribution(config: &PpgSimulatorConfig) -> PpgResult<Normal<f32>> {
        Normal::new(0.0, config.noise.gaussian_std).map_err(|e| PpgError::SimulationError {
            message: format!("Failed to create normal distribution: {}", e),
        })
    }

    /// Generate the next raw sample
    pub fn next_sample(&mut self) -> f32 {
        let time = self.elapsed();

        let mut value = self.config.dc_level + self.config.pulse_amplitude * pulse_shape(self.phase);

        // Baseline wander (respiration, motion, perfusion changes)
        value += self.config.noise.baseline_wander
            * (2.0 * PI * self.config.noise.wander_frequency * time).sin();

        if self.config.noise.gaussian_std > 0.0 {
            value += self.normal_dist.sample(&mut self.rng);
        }

        let beats_per_sample = self.config.heart_rate.bpm_at_time(time) / 60.0
            / self.config.sampling_frequency;
        self.phase = (self.phase + beats_per_sample).fract();
        self.sample_index += 1;

        value
    }

    /// Generate `count` consecutive samples
    pub fn generate(&mut self, count: usize) -> Vec<f32> {
        (0..count).map(|_| self.next_sample()).collect()
    }

    /// Generate samples covering `duration` seconds
    pub fn generate_duration(&mut self, duration: f32) -> Vec<f32> {
        let count = (duration * self.config.sampling_frequency) as usize;
        self.generate(count)
    }

    /// Seconds of signal generated so far
    pub fn elapsed(&self) -> f32 {
        self.sample_index as f32 / self.config.sampling_frequency
    }

    /// Number of samples generated so far
    pub fn samples_generated(&self) -> u64 {
        self.sample_index
    }

    /// Reset time and cardiac phase (useful for restarting simulation)
    pub fn reset_time(&mut self) {
        self.sample_index = 0;
        self.phase = 0.0;
    }

    /// Get current configuration
    pub fn config(&self) -> &PpgSimulatorConfig {
        &self.config
    }

    /// Update configuration, keeping time and phase
    pub fn update_config(&mut self, config: PpgSimulatorConfig) -> PpgResult<()> {
        config.validate()?;

        self.normal_dist = Self::noise_distribution(&config)?;
        self.config = config;
        Ok(())
    }

    /// Switch heart-rate pattern, keeping time and phase
    pub fn set_heart_rate(&mut self, pattern: HeartRatePattern) {
        self.config.heart_rate = pattern;
    }
}
