//! Paced raw-sample streaming, standing in for the sensor acquisition loop

use crate::ppg_simulator::{PpgSimulator, PpgSimulatorConfig};
use crate::pulse_patterns::HeartRatePattern;
use ppg_core::{config_error, PpgError, PpgResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for real-time streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// PPG simulation configuration
    pub simulator: PpgSimulatorConfig,
    /// Samples emitted per timer tick
    pub samples_per_tick: usize,
    /// Capacity of the outgoing sample channel
    pub channel_capacity: usize,
    /// Stop after this many samples
    pub max_samples: Option<u64>,
    /// Emit at the sampling cadence; when false, emit as fast as the
    /// consumer accepts samples
    pub paced: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            simulator: PpgSimulatorConfig::default(),
            samples_per_tick: 10, // 100ms ticks at 100Hz
            channel_capacity: 1024,
            max_samples: None,
            paced: true,
        }
    }
}

impl StreamConfig {
    /// Time between ticks at the configured sampling frequency.
    ///
    /// Fails when the period is not representable or rounds to zero.
    pub fn tick_period(&self) -> PpgResult<Duration> {
        let seconds = self.samples_per_tick as f32 / self.simulator.sampling_frequency;
        match Duration::try_from_secs_f32(seconds) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(config_error!(
                "Tick period of {} samples at {}Hz is not a usable timer period",
                self.samples_per_tick,
                self.simulator.sampling_frequency
            )),
        }
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Start,
    Stop,
    Pause,
    Resume,
    SetHeartRate(HeartRatePattern),
    Shutdown,
}

/// Stream statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub samples_sent: u64,
    pub signal_seconds: f32,
}

/// Real-time PPG sample stream.
///
/// The single producer of raw samples: every sample goes over one bounded
/// `mpsc` channel, in order, to whichever task owns the filters.
pub struct RealTimePpgStream {
    config: StreamConfig,
    simulator: PpgSimulator,
    sample_sender: mpsc::Sender<f32>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    /// Only set when paced
    tick_period: Option<Duration>,
    is_running: bool,
    stats: StreamStats,
}

impl RealTimePpgStream {
    /// Create new stream; returns the raw-sample receiver and a control handle
    pub fn new(
        config: StreamConfig,
    ) -> PpgResult<(Self, mpsc::Receiver<f32>, mpsc::Sender<StreamCommand>)> {
        if config.samples_per_tick == 0 || config.channel_capacity == 0 {
            return Err(PpgError::ConfigurationError {
                message: "Samples per tick and channel capacity must be greater than 0".to_string(),
            });
        }

        let simulator = PpgSimulator::new(config.simulator.clone())?;
        let tick_period = if config.paced {
            Some(config.tick_period()?)
        } else {
            None
        };
        let (sample_sender, sample_receiver) = mpsc::channel(config.channel_capacity);
        let (control_sender, control_receiver) = mpsc::channel(32);

        let stream = RealTimePpgStream {
            config,
            simulator,
            sample_sender,
            control_receiver,
            tick_period,
            is_running: false,
            stats: StreamStats::default(),
        };

        Ok((stream, sample_receiver, control_sender))
    }

    /// Run until `Shutdown`, the control channel closing, or `max_samples`.
    ///
    /// Fails with `StreamClosed` if the sample receiver is dropped.
    pub async fn run(&mut self) -> PpgResult<StreamStats> {
        let mut ticker = self.tick_period.map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(
            sampling_frequency = self.config.simulator.sampling_frequency,
            samples_per_tick = self.config.samples_per_tick,
            paced = self.config.paced,
            "PPG stream ready"
        );

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker), if ticker.is_some() => {
                    if self.is_running && self.emit_tick().await? {
                        break;
                    }
                }

                _ = tokio::task::yield_now(), if !self.config.paced && self.is_running => {
                    if self.emit_tick().await? {
                        break;
                    }
                }

                command = self.control_receiver.recv() => {
                    match command {
                        Some(StreamCommand::Start) | Some(StreamCommand::Resume) => {
                            self.is_running = true;
                            info!("PPG stream running");
                        }
                        Some(StreamCommand::Pause) => {
                            self.is_running = false;
                            info!("PPG stream paused");
                        }
                        Some(StreamCommand::Stop) => {
                            self.is_running = false;
                            self.simulator.reset_time();
                            info!(samples_sent = self.stats.samples_sent, "PPG stream stopped");
                        }
                        Some(StreamCommand::SetHeartRate(pattern)) => {
                            self.simulator.set_heart_rate(pattern);
                            info!("PPG stream pattern updated: {}", pattern.description());
                        }
                        Some(StreamCommand::Shutdown) | None => {
                            debug!("PPG stream control closed");
                            break;
                        }
                    }
                }
            }
        }

        self.stats.is_running = false;
        Ok(self.stats.clone())
    }

    /// Emit one tick of samples; returns true once `max_samples` is reached
    async fn emit_tick(&mut self) -> PpgResult<bool> {
        let started = Instant::now();

        for _ in 0..self.config.samples_per_tick {
            if self.limit_reached() {
                break;
            }

            let sample = self.simulator.next_sample();
            self.sample_sender
                .send(sample)
                .await
                .map_err(|_| PpgError::StreamClosed { reason: "sample receiver dropped" })?;
            self.stats.samples_sent += 1;
        }

        self.stats.is_running = true;
        self.stats.signal_seconds = self.simulator.elapsed();

        if self.tick_period.map_or(false, |period| started.elapsed() > period) {
            warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Tick took longer than its period, consumer is falling behind"
            );
        }

        if self.limit_reached() {
            info!(samples_sent = self.stats.samples_sent, "PPG stream reached sample limit");
            return Ok(true);
        }
        Ok(false)
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_samples
            .map_or(false, |max| self.stats.samples_sent >= max)
    }

    /// Get current stream statistics
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Get current configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    if let Some(ticker) = ticker {
        ticker.tick().await;
    }
}

/// Create a stream and run it in a background task, already started
pub async fn start_ppg_stream(
    config: StreamConfig,
) -> PpgResult<(
    mpsc::Receiver<f32>,
    mpsc::Sender<StreamCommand>,
    tokio::task::JoinHandle<PpgResult<StreamStats>>,
)> {
    let (mut stream, sample_receiver, control_sender) = RealTimePpgStream::new(config)?;

    control_sender
        .send(StreamCommand::Start)
        .await
        .map_err(|_| PpgError::StreamClosed { reason: "stream control channel" })?;

    let handle = tokio::spawn(async move { stream.run().await });

    Ok((sample_receiver, control_sender, handle))
}
