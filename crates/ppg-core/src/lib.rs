//! PPG-Core: Foundation types for PPG signal processing
//!
//! Error types, configuration validation and the sample types shared between
//! the acquisition, processing and presentation sides.

pub mod error;
pub mod ppg_types;

pub use error::{PpgError, PpgResult};
pub use ppg_types::*;
