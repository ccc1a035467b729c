//! Digital filters for PPG signal processing
//!
//! All filters are single-channel, one sample in and one sample out. Filter
//! coefficients are derived once in the constructor and never recomputed;
//! only the history changes on `process`.

use ppg_core::{
    config_error, validate_buffer_size, validate_cutoff, validate_sampling_frequency, PpgResult,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Streaming interface shared by every filter in the framework
pub trait SampleFilter: Send + Sync {
    /// Filter one sample and return the new output
    fn process(&mut self, value: f32) -> f32;

    /// Return to the construction-time empty history
    fn reset(&mut self);

    /// Get filter name/identifier
    fn name(&self) -> &str;

    /// Get filter type for pipeline inspection
    fn filter_type(&self) -> FilterType;

    /// Filter a block of samples in order.
    ///
    /// Processes `min(input.len(), output.len())` samples; the rest of
    /// `output` is left untouched.
    fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process(sample);
        }
    }
}

/// Filter types supported by the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    /// Single-pole high-pass for drift removal
    HighPass,
    /// Single-pole low-pass for noise smoothing
    LowPass,
    /// First-difference derivative
    Differentiator,
    /// Zero-padded boxcar average
    MovingAverage,
    /// Second-order band-pass with baseline removal
    Bandpass,
}

/// Smoothing factor `x = exp(-1 / (fs / (fc * 2π)))` of a single-pole section.
///
/// Evaluated in double precision so the result does not depend on the
/// platform's single-precision `exp`.
fn smoothing_factor(cutoff: f32, sampling_frequency: f32) -> PpgResult<f32> {
    validate_cutoff(cutoff, sampling_frequency)?;

    let fc = f64::from(cutoff);
    let fs = f64::from(sampling_frequency);
    let x = libm::exp(-1.0 / (fs / (fc * 2.0 * PI))) as f32;

    // A tiny fc/fs ratio rounds to 1.0 in single precision and freezes the filter
    if x > 0.0 && x < 1.0 {
        Ok(x)
    } else {
        Err(config_error!(
            "Cutoff {}Hz at {}Hz sampling gives smoothing factor {} outside (0, 1)",
            cutoff, sampling_frequency, x
        ))
    }
}

/// Single-pole recursive high-pass filter.
///
/// `y[n] = a0*x[n] + a1*x[n-1] + b1*y[n-1]` with `a0 = (1 + x) / 2`,
/// `a1 = -a0` and `b1 = x`.
#[derive(Debug, Clone, PartialEq)]
pub struct HighPassFilter {
    a0: f32,
    a1: f32,
    b1: f32,
    last_input: f32,
    last_output: f32,
}

impl HighPassFilter {
    /// Create a high-pass filter, rejecting cutoffs outside (0, Nyquist)
    pub fn new(cutoff: f32, sampling_frequency: f32) -> PpgResult<Self> {
        let x = smoothing_factor(cutoff, sampling_frequency)?;
        let a0 = (1.0 + x) / 2.0;

        Ok(HighPassFilter {
            a0,
            a1: -a0,
            b1: x,
            last_input: 0.0,
            last_output: 0.0,
        })
    }

    /// Smoothing factor derived from the cutoff
    pub fn coefficient(&self) -> f32 {
        self.b1
    }
}

impl SampleFilter for HighPassFilter {
    fn process(&mut self, value: f32) -> f32 {
        self.last_output = self.a0 * value + self.a1 * self.last_input + self.b1 * self.last_output;
        self.last_input = value;
        self.last_output
    }

    fn reset(&mut self) {
        self.last_input = 0.0;
        self.last_output = 0.0;
    }

    fn name(&self) -> &str {
        "High-Pass Filter"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::HighPass
    }
}

/// Single-pole recursive low-pass filter: `y[n] = (1 - x)*v[n] + x*y[n-1]`
#[derive(Debug, Clone, PartialEq)]
pub struct LowPassFilter {
    a0: f32,
    b1: f32,
    last_output: f32,
}

impl LowPassFilter {
    /// Create a low-pass filter, rejecting cutoffs outside (0, Nyquist)
    pub fn new(cutoff: f32, sampling_frequency: f32) -> PpgResult<Self> {
        let x = smoothing_factor(cutoff, sampling_frequency)?;

        Ok(LowPassFilter {
            a0: 1.0 - x,
            b1: x,
            last_output: 0.0,
        })
    }

    /// Smoothing factor derived from the cutoff
    pub fn coefficient(&self) -> f32 {
        self.b1
    }
}

impl SampleFilter for LowPassFilter {
    fn process(&mut self, value: f32) -> f32 {
        self.last_output = self.a0 * value + self.b1 * self.last_output;
        self.last_output
    }

    fn reset(&mut self) {
        self.last_output = 0.0;
    }

    fn name(&self) -> &str {
        "Low-Pass Filter"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::LowPass
    }
}

/// First-difference derivative scaled to units per second.
///
/// There is no warm-up: the first sample after construction or reset is
/// differentiated against zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Differentiator {
    sampling_frequency: f32,
    last_value: f32,
}

impl Differentiator {
    pub fn new(sampling_frequency: f32) -> PpgResult<Self> {
        validate_sampling_frequency(sampling_frequency)?;

        Ok(Differentiator {
            sampling_frequency,
            last_value: 0.0,
        })
    }

    pub fn sampling_frequency(&self) -> f32 {
        self.sampling_frequency
    }
}

impl SampleFilter for Differentiator {
    fn process(&mut self, value: f32) -> f32 {
        let diff = (value - self.last_value) * self.sampling_frequency;
        self.last_value = value;
        diff
    }

    fn reset(&mut self) {
        self.last_value = 0.0;
    }

    fn name(&self) -> &str {
        "Differentiator"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Differentiator
    }
}

/// Moving average over a zero-initialised circular buffer.
///
/// The divisor is always the buffer size, so the first `N - 1` outputs are
/// biased toward zero (zero-padded boxcar). The running sum is kept in `f64`
/// and rebuilt from the buffer every time the write index wraps, so it never
/// drifts from the buffer contents.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageFilter {
    buffer: Box<[f32]>,
    index: usize,
    running_sum: f64,
}

impl MovingAverageFilter {
    /// Create a moving average over `buffer_size` samples (at least 1)
    pub fn new(buffer_size: usize) -> PpgResult<Self> {
        validate_buffer_size(buffer_size)?;

        Ok(MovingAverageFilter {
            buffer: vec![0.0; buffer_size].into_boxed_slice(),
            index: 0,
            running_sum: 0.0,
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

impl SampleFilter for MovingAverageFilter {
    fn process(&mut self, value: f32) -> f32 {
        // Swap the oldest sample out of the running sum
        self.running_sum -= f64::from(self.buffer[self.index]);
        self.buffer[self.index] = value;
        self.running_sum += f64::from(value);

        self.index = (self.index + 1) % self.buffer.len();
        if self.index == 0 {
            self.running_sum = self.buffer.iter().copied().map(f64::from).sum();
        }

        (self.running_sum / self.buffer.len() as f64) as f32
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
        self.running_sum = 0.0;
    }

    fn name(&self) -> &str {
        "Moving Average Filter"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::MovingAverage
    }
}

const BANDPASS_ORDER: usize = 2;

/// Numerator coefficients of the PPG band-pass (roughly 0.5-8Hz)
const BANDPASS_B: [f32; BANDPASS_ORDER + 1] = [0.2929, 0.0, -0.2929];
/// Denominator coefficients, `a[0]` is unity
const BANDPASS_A: [f32; BANDPASS_ORDER + 1] = [1.0, -0.5858, 0.1716];

/// Weights of the band-pass baseline update `dc = keep*dc + admit*input`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BaselineBlend {
    /// `0.99*dc + 0.01*input`, converges to the signal mean
    #[default]
    Normalized,
    /// `0.99*dc + 0.001*input` as shipped in the sensor firmware.
    ///
    /// The weights sum to 0.991, so on a constant input the baseline settles
    /// at a tenth of the signal level.
    Firmware,
}

impl BaselineBlend {
    /// (keep, admit) weights
    pub fn weights(self) -> (f64, f64) {
        match self {
            BaselineBlend::Normalized => (0.99, 0.01),
            BaselineBlend::Firmware => (0.99, 0.001),
        }
    }
}

/// Second-order IIR band-pass with slow baseline (DC) removal.
///
/// The baseline is seeded from the first sample rather than zero, so a large
/// sensor offset does not produce a start-up transient.
#[derive(Debug, Clone, PartialEq)]
pub struct BandpassFilter {
    b: [f32; BANDPASS_ORDER + 1],
    a: [f32; BANDPASS_ORDER + 1],
    // Most recent first
    x: [f32; BANDPASS_ORDER + 1],
    y: [f32; BANDPASS_ORDER + 1],
    baseline: Option<f32>,
    blend: BaselineBlend,
}

impl BandpassFilter {
    /// Create a band-pass filter with normalized baseline weights
    pub fn new() -> Self {
        Self::with_blend(BaselineBlend::Normalized)
    }

    /// Create a band-pass filter with the given baseline weights
    pub fn with_blend(blend: BaselineBlend) -> Self {
        BandpassFilter {
            b: BANDPASS_B,
            a: BANDPASS_A,
            x: [0.0; BANDPASS_ORDER + 1],
            y: [0.0; BANDPASS_ORDER + 1],
            baseline: None,
            blend,
        }
    }

    /// Current baseline estimate, `None` until the first sample
    pub fn dc_offset(&self) -> Option<f32> {
        self.baseline
    }

    /// Baseline weights this filter was built with
    pub fn blend(&self) -> BaselineBlend {
        self.blend
    }

    fn update_baseline(&mut self, input: f32) -> f32 {
        let previous = f64::from(self.baseline.unwrap_or(input));
        let (keep, admit) = self.blend.weights();

        let baseline = (keep * previous + admit * f64::from(input)) as f32;
        self.baseline = Some(baseline);
        baseline
    }
}

impl Default for BandpassFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleFilter for BandpassFilter {
    fn process(&mut self, input: f32) -> f32 {
        let corrected = input - self.update_baseline(input);

        self.x.copy_within(0..BANDPASS_ORDER, 1);
        self.y.copy_within(0..BANDPASS_ORDER, 1);

        self.x[0] = corrected;
        let mut output = self.b[0] * self.x[0];
        for i in 1..=BANDPASS_ORDER {
            output += self.b[i] * self.x[i] - self.a[i] * self.y[i];
        }
        self.y[0] = output;

        output
    }

    fn reset(&mut self) {
        self.x = [0.0; BANDPASS_ORDER + 1];
        self.y = [0.0; BANDPASS_ORDER + 1];
        self.baseline = None;
    }

    fn name(&self) -> &str {
        "Bandpass Filter"
    }

    fn filter_type(&self) -> FilterType {
        FilterType::Bandpass
    }
}
