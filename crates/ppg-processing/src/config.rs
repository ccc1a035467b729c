//! Configuration management for PPG processing pipelines

use crate::filters::BaselineBlend;
use ppg_core::{
    validate_buffer_size, validate_cutoff, validate_sampling_frequency, PpgError, PpgResult,
    DEFAULT_SAMPLING_FREQUENCY,
};
use serde::{Deserialize, Serialize};

/// Filter chain configuration.
///
/// Stages run in a fixed order: high-pass, band-pass, low-pass,
/// differentiator, moving average. Optional stages are skipped when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Configuration name/profile
    pub name: String,
    /// Sampling frequency of the raw stream (Hz)
    pub sampling_frequency: f32,
    /// High-pass cutoff ahead of the band-pass (Hz)
    #[serde(default)]
    pub highpass_cutoff: Option<f32>,
    /// Run the band-pass stage
    #[serde(default = "default_true")]
    pub bandpass: bool,
    /// Band-pass baseline update weights
    #[serde(default)]
    pub baseline_blend: BaselineBlend,
    /// Low-pass cutoff after the band-pass (Hz)
    #[serde(default)]
    pub lowpass_cutoff: Option<f32>,
    /// Differentiate the filtered signal
    #[serde(default)]
    pub differentiate: bool,
    /// Moving-average length in samples
    #[serde(default)]
    pub moving_average: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    /// Band-pass followed by light smoothing, for waveform display
    pub fn ppg_default() -> Self {
        PipelineConfig {
            name: "PPG waveform".to_string(),
            sampling_frequency: DEFAULT_SAMPLING_FREQUENCY,
            highpass_cutoff: None,
            bandpass: true,
            baseline_blend: BaselineBlend::Normalized,
            lowpass_cutoff: None,
            differentiate: false,
            moving_average: Some(4),
        }
    }

    /// Band-pass, derivative and smoothing, emphasising the systolic upstroke
    pub fn pulse_slope() -> Self {
        PipelineConfig {
            name: "PPG pulse slope".to_string(),
            differentiate: true,
            moving_average: Some(8),
            ..Self::ppg_default()
        }
    }

    /// Drift removal and smoothing without the fixed-coefficient band-pass,
    /// for sampling rates the band-pass was not designed for
    pub fn raw_smoothing(sampling_frequency: f32) -> Self {
        PipelineConfig {
            name: "Raw smoothing".to_string(),
            sampling_frequency,
            highpass_cutoff: Some(0.5),
            bandpass: false,
            baseline_blend: BaselineBlend::Normalized,
            lowpass_cutoff: Some(8.0),
            differentiate: false,
            moving_average: None,
        }
    }

    /// Validate configuration without building any filter
    pub fn validate(&self) -> PpgResult<()> {
        if self.name.is_empty() {
            return Err(PpgError::ConfigurationError {
                message: "Pipeline name cannot be empty".to_string(),
            });
        }

        validate_sampling_frequency(self.sampling_frequency)?;

        if let Some(cutoff) = self.highpass_cutoff {
            validate_cutoff(cutoff, self.sampling_frequency)?;
        }
        if let Some(cutoff) = self.lowpass_cutoff {
            validate_cutoff(cutoff, self.sampling_frequency)?;
        }
        if let (Some(high), Some(low)) = (self.highpass_cutoff, self.lowpass_cutoff) {
            if high >= low {
                return Err(PpgError::ConfigurationError {
                    message: format!(
                        "High-pass cutoff {}Hz must be below low-pass cutoff {}Hz",
                        high, low
                    ),
                });
            }
        }
        if let Some(size) = self.moving_average {
            validate_buffer_size(size)?;
        }

        Ok(())
    }

    /// Number of stages this configuration produces
    pub fn stage_count(&self) -> usize {
        [
            self.highpass_cutoff.is_some(),
            self.bandpass,
            self.lowpass_cutoff.is_some(),
            self.differentiate,
            self.moving_average.is_some(),
        ]
        .iter()
        .filter(|enabled| **enabled)
        .count()
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> PpgResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PpgError::ConfigurationError {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> PpgResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| PpgError::ConfigurationError {
            message: format!("Failed to deserialize configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::ppg_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(PipelineConfig::ppg_default().validate().is_ok());
        assert!(PipelineConfig::pulse_slope().validate().is_ok());
        assert!(PipelineConfig::raw_smoothing(250.0).validate().is_ok());
    }

    #[test]
    fn test_stage_count() {
        assert_eq!(PipelineConfig::ppg_default().stage_count(), 2);
        assert_eq!(PipelineConfig::pulse_slope().stage_count(), 3);
        assert_eq!(PipelineConfig::raw_smoothing(100.0).stage_count(), 2);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = PipelineConfig::ppg_default();
        config.lowpass_cutoff = Some(60.0);
        assert!(matches!(config.validate(), Err(PpgError::InvalidCutoff { .. })));

        let mut config = PipelineConfig::raw_smoothing(100.0);
        config.highpass_cutoff = Some(10.0);
        assert!(matches!(config.validate(), Err(PpgError::ConfigurationError { .. })));

        let mut config = PipelineConfig::ppg_default();
        config.moving_average = Some(0);
        assert_eq!(config.validate(), Err(PpgError::InvalidBufferSize { size: 0 }));

        let mut config = PipelineConfig::ppg_default();
        config.sampling_frequency = -1.0;
        assert!(matches!(config.validate(), Err(PpgError::InvalidSamplingFrequency { .. })));

        let mut config = PipelineConfig::ppg_default();
        config.name.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_defaults_and_round_trip() {
        let config = PipelineConfig::from_json(
            r#"{ "name": "minimal", "sampling_frequency": 50.0 }"#,
        )
        .unwrap();
        assert!(config.bandpass);
        assert_eq!(config.baseline_blend, BaselineBlend::Normalized);
        assert_eq!(config.stage_count(), 1);

        let original = PipelineConfig::pulse_slope();
        let restored = PipelineConfig::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_json_rejects_invalid_config() {
        let result = PipelineConfig::from_json(
            r#"{ "name": "bad", "sampling_frequency": 100.0, "moving_average": 0 }"#,
        );
        assert_eq!(result, Err(PpgError::InvalidBufferSize { size: 0 }));

        assert!(PipelineConfig::from_json("not json").is_err());
    }
}
