//! PPG-specific sample types and configuration validation

use serde::{Deserialize, Serialize};
use crate::error::{PpgError, PpgResult};

/// Sampling frequency the band-pass coefficients were designed for (Hz)
pub const DEFAULT_SAMPLING_FREQUENCY: f32 = 100.0;

/// One filtered value as handed to the presentation layer.
///
/// Serializes to a single numeric `ppg_value` field plus a sequence number so
/// a reconnecting consumer can tell how many updates it missed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredSample {
    /// Monotonic index of the raw sample this value was produced from
    pub sequence: u64,
    /// Filtered PPG value
    pub ppg_value: f32,
}

impl FilteredSample {
    pub fn new(sequence: u64, ppg_value: f32) -> Self {
        Self { sequence, ppg_value }
    }
}

/// Validate a sampling frequency: positive and finite
pub fn validate_sampling_frequency(rate: f32) -> PpgResult<()> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(PpgError::InvalidSamplingFrequency { rate })
    }
}

/// Validate a cutoff frequency against the Nyquist limit of `sampling_frequency`
pub fn validate_cutoff(cutoff: f32, sampling_frequency: f32) -> PpgResult<()> {
    validate_sampling_frequency(sampling_frequency)?;

    let nyquist = sampling_frequency / 2.0;
    if cutoff.is_finite() && cutoff > 0.0 && cutoff < nyquist {
        Ok(())
    } else {
        Err(PpgError::InvalidCutoff { cutoff, nyquist })
    }
}

/// Validate a moving-average buffer size
pub fn validate_buffer_size(size: usize) -> PpgResult<()> {
    if size == 0 {
        Err(PpgError::InvalidBufferSize { size })
    } else {
        Ok(())
    }
}

impl std::fmt::Display for FilteredSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {:.4}", self.sequence, self.ppg_value)
    }
}
