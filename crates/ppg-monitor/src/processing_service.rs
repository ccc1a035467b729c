//! Processing service: owns the filter chain and publishes filtered samples

use ppg_core::{FilteredSample, PpgError, PpgResult};
use ppg_processing::{FilterChain, PipelineConfig, StatisticSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

/// Samples between published stats updates
const STATS_INTERVAL: u64 = 10;

/// Commands for controlling processing
#[derive(Debug, Clone)]
pub enum ServiceCommand {
    /// Clear filter history and the output statistic
    Reset,
    /// Replace the chain; the running chain is kept if the new one is invalid
    UpdatePipeline(PipelineConfig),
    Shutdown,
}

/// Statistics about the processed stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub is_running: bool,
    pub samples_processed: u64,
    pub pipeline_name: String,
    pub output: StatisticSummary,
}

/// Single consumer of the raw sample stream.
///
/// Every filter lives inside this task, so filter state is only ever touched
/// from one place and samples are processed strictly in arrival order.
pub struct ProcessingService {
    config: PipelineConfig,
    chain: FilterChain,

    input_receiver: mpsc::Receiver<f32>,
    output_sender: broadcast::Sender<FilteredSample>,
    command_receiver: mpsc::Receiver<ServiceCommand>,

    sequence: u64,
    stats: Arc<Mutex<ServiceStats>>,
}

impl ProcessingService {
    /// Create new processing service; returns it with its command handle
    pub fn new(
        input_receiver: mpsc::Receiver<f32>,
        config: PipelineConfig,
    ) -> PpgResult<(Self, mpsc::Sender<ServiceCommand>)> {
        let chain = FilterChain::from_config(&config)?;
        let (output_sender, _) = broadcast::channel(1024);
        let (command_sender, command_receiver) = mpsc::channel(32);

        let stats = ServiceStats {
            is_running: false,
            samples_processed: 0,
            pipeline_name: config.name.clone(),
            output: chain.statistic().summary(),
        };

        let service = ProcessingService {
            config,
            chain,
            input_receiver,
            output_sender,
            command_receiver,
            sequence: 0,
            stats: Arc::new(Mutex::new(stats)),
        };

        Ok((service, command_sender))
    }

    /// Get output receiver for filtered samples
    pub fn subscribe_output(&self) -> broadcast::Receiver<FilteredSample> {
        self.output_sender.subscribe()
    }

    /// Shared handle to the periodically refreshed stats
    pub fn stats_handle(&self) -> Arc<Mutex<ServiceStats>> {
        self.stats.clone()
    }

    /// Main processing loop.
    ///
    /// Runs until the input stream ends or `Shutdown` arrives; commands
    /// already queued are handled before the next sample.
    pub async fn run(&mut self) -> PpgResult<ServiceStats> {
        info!(
            pipeline = %self.config.name,
            stages = ?self.chain.stage_names(),
            "Processing service started"
        );
        self.update_stats(|stats| stats.is_running = true).await;

        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;

                command = self.command_receiver.recv(), if commands_open => {
                    match command {
                        Some(ServiceCommand::Reset) => {
                            self.chain.reset();
                            self.publish_stats().await;
                            info!("Filter chain reset");
                        }
                        Some(ServiceCommand::UpdatePipeline(new_config)) => {
                            if let Err(e) = self.update_pipeline(new_config).await {
                                warn!("Failed to update pipeline: {}", e);
                            }
                        }
                        Some(ServiceCommand::Shutdown) => {
                            info!("Processing service shutting down");
                            break;
                        }
                        None => {
                            debug!("Command channel closed, processing continues");
                            commands_open = false;
                        }
                    }
                }

                sample = self.input_receiver.recv() => {
                    match sample {
                        Some(sample) => self.process_sample(sample).await,
                        None => {
                            info!(samples = self.sequence, "Input stream ended");
                            break;
                        }
                    }
                }
            }
        }

        self.publish_stats().await;
        self.update_stats(|stats| stats.is_running = false).await;
        Ok(self.stats.lock().await.clone())
    }

    async fn process_sample(&mut self, sample: f32) {
        let ppg_value = self.chain.process(sample);
        let filtered = FilteredSample::new(self.sequence, ppg_value);
        self.sequence += 1;

        // No subscribers is not an error
        let _ = self.output_sender.send(filtered);

        if self.sequence % STATS_INTERVAL == 0 {
            self.publish_stats().await;
        }
    }

    /// Build the new chain first so a bad config leaves processing untouched
    async fn update_pipeline(&mut self, new_config: PipelineConfig) -> PpgResult<()> {
        let chain = FilterChain::from_config(&new_config)?;
        info!(pipeline = %new_config.name, "Pipeline replaced");

        self.chain = chain;
        self.config = new_config;
        let name = self.config.name.clone();
        self.update_stats(|stats| stats.pipeline_name = name).await;
        self.publish_stats().await;
        Ok(())
    }

    async fn publish_stats(&self) {
        let processed = self.sequence;
        let output = self.chain.statistic().summary();
        self.update_stats(|stats| {
            stats.samples_processed = processed;
            stats.output = output;
        })
        .await;
    }

    /// Update stats with a closure
    async fn update_stats<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut ServiceStats),
    {
        let mut stats = self.stats.lock().await;
        update_fn(&mut stats);
    }
}

/// Send a command, mapping a stopped service to `StreamClosed`
pub async fn send_command(
    commands: &mpsc::Sender<ServiceCommand>,
    command: ServiceCommand,
) -> PpgResult<()> {
    commands
        .send(command)
        .await
        .map_err(|_| PpgError::StreamClosed { reason: "processing service stopped" })
}

/// Helper function to start the processing service in background
pub fn start_processing_service(
    input_receiver: mpsc::Receiver<f32>,
    config: PipelineConfig,
) -> PpgResult<(
    broadcast::Receiver<FilteredSample>,
    mpsc::Sender<ServiceCommand>,
    Arc<Mutex<ServiceStats>>,
    tokio::task::JoinHandle<PpgResult<ServiceStats>>,
)> {
    let (mut service, command_sender) = ProcessingService::new(input_receiver, config)?;
    let output_receiver = service.subscribe_output();
    let stats_handle = service.stats_handle();

    let handle = tokio::spawn(async move { service.run().await });

    Ok((output_receiver, command_sender, stats_handle, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(count: usize) -> Vec<f32> {
        (0..count).map(|n| 1000.0 + (n % 37) as f32).collect()
    }

    async fn feed(sender: &mpsc::Sender<f32>, samples: &[f32]) {
        for &sample in samples {
            sender.send(sample).await.unwrap();
        }
    }

    async fn collect(output: &mut broadcast::Receiver<FilteredSample>, count: usize) -> Vec<FilteredSample> {
        let mut received = Vec::with_capacity(count);
        for _ in 0..count {
            received.push(output.recv().await.unwrap());
        }
        received
    }

    #[tokio::test]
    async fn test_service_matches_direct_chain() {
        let config = PipelineConfig::pulse_slope();
        let (input, input_receiver) = mpsc::channel(256);
        let (mut output, _commands, _stats, handle) =
            start_processing_service(input_receiver, config.clone()).unwrap();

        let samples = ramp(200);
        feed(&input, &samples).await;
        let received = collect(&mut output, samples.len()).await;

        let mut chain = FilterChain::from_config(&config).unwrap();
        for (index, (filtered, &sample)) in received.iter().zip(&samples).enumerate() {
            assert_eq!(filtered.sequence, index as u64);
            assert_eq!(filtered.ppg_value, chain.process(sample));
        }

        drop(input);
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.samples_processed, 200);
        assert_eq!(stats.output.count, 200);
        assert!(!stats.is_running);
    }

    #[tokio::test]
    async fn test_reset_restarts_filters() {
        let config = PipelineConfig::ppg_default();
        let (input, input_receiver) = mpsc::channel(256);
        let (mut output, commands, _stats, handle) =
            start_processing_service(input_receiver, config.clone()).unwrap();

        let samples = ramp(100);
        feed(&input, &samples).await;
        collect(&mut output, samples.len()).await;

        send_command(&commands, ServiceCommand::Reset).await.unwrap();
        feed(&input, &samples).await;
        let after_reset = collect(&mut output, samples.len()).await;

        let mut fresh = FilterChain::from_config(&config).unwrap();
        for (filtered, &sample) in after_reset.iter().zip(&samples) {
            assert_eq!(filtered.ppg_value, fresh.process(sample));
        }
        // Sequence numbers keep counting raw samples across a reset
        assert_eq!(after_reset[0].sequence, 100);

        drop(input);
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.samples_processed, 200);
        assert_eq!(stats.output.count, 100);
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_pipeline() {
        let config = PipelineConfig::ppg_default();
        let (input, input_receiver) = mpsc::channel(64);
        let (mut service, commands) = ProcessingService::new(input_receiver, config.clone()).unwrap();
        let mut output = service.subscribe_output();
        let stats_handle = service.stats_handle();
        let handle = tokio::spawn(async move { service.run().await });

        let mut bad = PipelineConfig::ppg_default();
        bad.name = "bad".to_string();
        bad.moving_average = Some(0);
        send_command(&commands, ServiceCommand::UpdatePipeline(bad)).await.unwrap();

        let samples = ramp(20);
        feed(&input, &samples).await;
        let received = collect(&mut output, samples.len()).await;

        let mut chain = FilterChain::from_config(&config).unwrap();
        for (filtered, &sample) in received.iter().zip(&samples) {
            assert_eq!(filtered.ppg_value, chain.process(sample));
        }
        assert_eq!(stats_handle.lock().await.pipeline_name, config.name);

        send_command(&commands, ServiceCommand::Shutdown).await.unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.samples_processed, 20);
    }

    #[tokio::test]
    async fn test_update_pipeline_switches_chain() {
        let (input, input_receiver) = mpsc::channel(64);
        let (mut output, commands, _stats, handle) =
            start_processing_service(input_receiver, PipelineConfig::ppg_default()).unwrap();

        let slope = PipelineConfig::pulse_slope();
        send_command(&commands, ServiceCommand::UpdatePipeline(slope.clone())).await.unwrap();

        let samples = ramp(30);
        feed(&input, &samples).await;
        let received = collect(&mut output, samples.len()).await;

        let mut chain = FilterChain::from_config(&slope).unwrap();
        for (filtered, &sample) in received.iter().zip(&samples) {
            assert_eq!(filtered.ppg_value, chain.process(sample));
        }

        drop(input);
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.pipeline_name, slope.name);
    }

    #[tokio::test]
    async fn test_dropped_commands_do_not_stop_processing() {
        let (input, input_receiver) = mpsc::channel(64);
        let (mut output, commands, _stats, handle) =
            start_processing_service(input_receiver, PipelineConfig::ppg_default()).unwrap();
        drop(commands);

        feed(&input, &ramp(15)).await;
        assert_eq!(collect(&mut output, 15).await.len(), 15);

        drop(input);
        assert_eq!(handle.await.unwrap().unwrap().samples_processed, 15);
    }

    #[tokio::test]
    async fn test_send_command_to_stopped_service() {
        let (input, input_receiver) = mpsc::channel::<f32>(4);
        let (_output, commands, _stats, handle) =
            start_processing_service(input_receiver, PipelineConfig::ppg_default()).unwrap();

        drop(input);
        handle.await.unwrap().unwrap();

        let result = send_command(&commands, ServiceCommand::Reset).await;
        assert!(matches!(result, Err(PpgError::StreamClosed { .. })));
    }

    #[test]
    fn test_invalid_initial_config() {
        let (_input, input_receiver) = mpsc::channel::<f32>(4);
        let mut config = PipelineConfig::ppg_default();
        config.sampling_frequency = 0.0;
        assert!(ProcessingService::new(input_receiver, config).is_err());
    }
}
