//! PPG-Monitor: wires the simulated sensor stream to a filter chain and
//! publishes filtered samples to subscribers.

pub mod processing_service;

pub use processing_service::*;
