//! Error handling for the PPG framework
//!
//! Every failure in the filter core is a construction-time misconfiguration;
//! sample processing itself never fails.

use core::fmt;

/// Result type alias for PPG framework operations
pub type PpgResult<T> = Result<T, PpgError>;

/// Error type for all PPG framework operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PpgError {
    /// Generic configuration error
    ConfigurationError {
        /// Description of the configuration error
        message: String,
    },

    /// Sampling frequency is not a positive finite number
    InvalidSamplingFrequency {
        /// Provided sampling frequency in Hz
        rate: f32,
    },

    /// Cutoff frequency outside (0, Nyquist)
    InvalidCutoff {
        /// Provided cutoff in Hz
        cutoff: f32,
        /// Nyquist limit for the configured sampling frequency
        nyquist: f32,
    },

    /// Moving-average buffer with no slots
    InvalidBufferSize {
        /// Requested buffer size
        size: usize,
    },

    /// Signal generation failure
    SimulationError {
        /// Simulation error description
        message: String,
    },

    /// A sample or command channel was closed
    StreamClosed {
        /// Which channel closed
        reason: &'static str,
    },
}

impl fmt::Display for PpgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PpgError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            PpgError::InvalidSamplingFrequency { rate } => {
                write!(f, "Invalid sampling frequency: {}Hz, must be positive and finite", rate)
            }
            PpgError::InvalidCutoff { cutoff, nyquist } => {
                write!(f, "Invalid cutoff frequency: {}Hz, valid range: 0-{}Hz (exclusive)",
                       cutoff, nyquist)
            }
            PpgError::InvalidBufferSize { size } => {
                write!(f, "Invalid buffer size: {}, must be at least 1", size)
            }
            PpgError::SimulationError { message } => {
                write!(f, "Simulation error: {}", message)
            }
            PpgError::StreamClosed { reason } => {
                write!(f, "Stream closed: {}", reason)
            }
        }
    }
}

impl std::error::Error for PpgError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::PpgError::ConfigurationError {
            message: format!($($arg)+),
        }
    };
}
