//! Filter chain for running a sample through several filters in order

use crate::config::PipelineConfig;
use crate::filters::{
    BandpassFilter, Differentiator, FilterType, HighPassFilter, LowPassFilter,
    MovingAverageFilter, SampleFilter,
};
use crate::statistics::RunningStatistic;
use ppg_core::PpgResult;
use tracing::debug;

/// Ordered chain of filters with a running statistic over its output.
///
/// Each stage is owned by the chain, so the chain as a whole must be fed by a
/// single sample stream in order.
pub struct FilterChain {
    name: String,
    stages: Vec<Box<dyn SampleFilter>>,
    statistic: RunningStatistic,
}

/// Builder for constructing filter chains
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Box<dyn SampleFilter>>,
}

impl FilterChain {
    /// Create new empty chain (passes samples through unchanged)
    pub fn new(name: &str) -> Self {
        FilterChain {
            name: name.to_string(),
            stages: Vec::new(),
            statistic: RunningStatistic::new(),
        }
    }

    /// Build the chain described by `config`
    pub fn from_config(config: &PipelineConfig) -> PpgResult<Self> {
        config.validate()?;

        let fs = config.sampling_frequency;
        let mut builder = PipelineBuilder::new(&config.name);

        if let Some(cutoff) = config.highpass_cutoff {
            builder.add_highpass(cutoff, fs)?;
        }
        if config.bandpass {
            builder.add_filter(Box::new(BandpassFilter::with_blend(config.baseline_blend)));
        }
        if let Some(cutoff) = config.lowpass_cutoff {
            builder.add_lowpass(cutoff, fs)?;
        }
        if config.differentiate {
            builder.add_differentiator(fs)?;
        }
        if let Some(size) = config.moving_average {
            builder.add_moving_average(size)?;
        }

        let chain = builder.build();
        debug!(
            pipeline = %chain.name,
            sampling_frequency = fs,
            stages = ?chain.stage_types(),
            "Built filter chain"
        );
        Ok(chain)
    }

    /// Append a stage at the end of the chain
    pub fn add_stage(&mut self, stage: Box<dyn SampleFilter>) {
        self.stages.push(stage);
    }

    /// Run one sample through every stage and record the result
    pub fn process(&mut self, sample: f32) -> f32 {
        let output = self
            .stages
            .iter_mut()
            .fold(sample, |value, stage| stage.process(value));
        self.statistic.process(output);
        output
    }

    /// Run a block of samples through the chain in order.
    ///
    /// Processes `min(input.len(), output.len())` samples.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process(sample);
        }
    }

    /// Reset every stage and the output statistic
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
        self.statistic.reset();
    }

    /// Statistic over every output since the last reset
    pub fn statistic(&self) -> &RunningStatistic {
        &self.statistic
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Get stage types in execution order
    pub fn stage_types(&self) -> Vec<FilterType> {
        self.stages.iter().map(|s| s.filter_type()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl PipelineBuilder {
    /// Create new pipeline builder
    pub fn new(name: &str) -> Self {
        PipelineBuilder {
            name: name.to_string(),
            stages: Vec::new(),
        }
    }

    /// Add any filter to the chain
    pub fn add_filter(&mut self, filter: Box<dyn SampleFilter>) -> &mut Self {
        self.stages.push(filter);
        self
    }

    /// Add high-pass filter
    pub fn add_highpass(&mut self, cutoff: f32, sampling_frequency: f32) -> PpgResult<&mut Self> {
        let filter = HighPassFilter::new(cutoff, sampling_frequency)?;
        self.stages.push(Box::new(filter));
        Ok(self)
    }

    /// Add low-pass filter
    pub fn add_lowpass(&mut self, cutoff: f32, sampling_frequency: f32) -> PpgResult<&mut Self> {
        let filter = LowPassFilter::new(cutoff, sampling_frequency)?;
        self.stages.push(Box::new(filter));
        Ok(self)
    }

    /// Add band-pass filter with normalized baseline weights
    pub fn add_bandpass(&mut self) -> &mut Self {
        self.stages.push(Box::new(BandpassFilter::new()));
        self
    }

    /// Add differentiator
    pub fn add_differentiator(&mut self, sampling_frequency: f32) -> PpgResult<&mut Self> {
        let filter = Differentiator::new(sampling_frequency)?;
        self.stages.push(Box::new(filter));
        Ok(self)
    }

    /// Add moving average filter
    pub fn add_moving_average(&mut self, buffer_size: usize) -> PpgResult<&mut Self> {
        let filter = MovingAverageFilter::new(buffer_size)?;
        self.stages.push(Box::new(filter));
        Ok(self)
    }

    /// Build the chain
    pub fn build(self) -> FilterChain {
        FilterChain {
            name: self.name,
            stages: self.stages,
            statistic: RunningStatistic::new(),
        }
    }
}
