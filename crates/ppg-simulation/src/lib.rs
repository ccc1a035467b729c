//! PPG-Simulation: Synthetic PPG generation and paced sample streaming
//!
//! Stands in for the sensor and acquisition loop when developing and testing
//! processing pipelines.

pub mod real_time_stream;
pub mod pulse_patterns;
pub mod ppg_simulator;

pub use ppg_simulator::*;
pub use real_time_stream::*;
pub use pulse_patterns::*;
