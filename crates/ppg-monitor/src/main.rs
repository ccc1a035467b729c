//! PPG Monitor - simulated sensor, filter chain and JSON line output
//!
//! Signal flow: PPG simulator -> processing service -> one JSON object per
//! published sample on stdout, shaped the way the dashboard reads it
//! (`{"sequence":..,"ppg_value":..}`).

use anyhow::Context;
use clap::Parser;
use ppg_core::{FilteredSample, DEFAULT_SAMPLING_FREQUENCY};
use ppg_monitor::{send_command, start_processing_service, ServiceCommand};
use ppg_processing::PipelineConfig;
use ppg_simulation::{start_ppg_stream, HeartRatePattern, PpgSimulatorConfig, StreamCommand, StreamConfig};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// [clap] derived struct to handle command line parameters.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sampling frequency in Hz, overriding the pipeline config
    #[clap(long)]
    sampling_frequency: Option<f32>,

    /// Simulated heart rate in beats per minute
    #[clap(long, default_value = "75")]
    heart_rate: f32,

    /// Seconds of signal to generate
    #[clap(long, default_value = "10")]
    duration_secs: f32,

    /// Seed for reproducible sensor noise
    #[clap(long)]
    seed: Option<u64>,

    /// Pipeline configuration as JSON
    #[clap(long)]
    config: Option<PathBuf>,

    /// Publish every n-th filtered sample
    #[clap(long, default_value = "1")]
    every: u64,

    /// Generate as fast as the filters keep up instead of in real time
    #[clap(long)]
    unpaced: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr; stdout carries only the sample stream
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_pipeline(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
            PipelineConfig::from_json(&json)?
        }
        None => PipelineConfig::ppg_default(),
    };

    if let Some(rate) = cli.sampling_frequency {
        config.sampling_frequency = rate;
        config.validate()?;
    }

    if config.bandpass && config.sampling_frequency != DEFAULT_SAMPLING_FREQUENCY {
        warn!(
            sampling_frequency = config.sampling_frequency,
            "Band-pass coefficients are designed for {}Hz, pass band will shift",
            DEFAULT_SAMPLING_FREQUENCY
        );
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    anyhow::ensure!(cli.every > 0, "--every must be at least 1");
    anyhow::ensure!(
        cli.duration_secs.is_finite() && cli.duration_secs > 0.0,
        "--duration-secs must be positive"
    );

    let pipeline = load_pipeline(&cli)?;
    let sampling_frequency = pipeline.sampling_frequency;

    let stream_config = StreamConfig {
        simulator: PpgSimulatorConfig {
            sampling_frequency,
            heart_rate: HeartRatePattern::Constant { bpm: cli.heart_rate },
            seed: cli.seed,
            ..Default::default()
        },
        max_samples: Some((cli.duration_secs * sampling_frequency) as u64),
        paced: !cli.unpaced,
        ..Default::default()
    };

    info!(
        pipeline = %pipeline.name,
        sampling_frequency,
        heart_rate = cli.heart_rate,
        duration_secs = cli.duration_secs,
        "Starting PPG monitor"
    );

    let (raw_samples, stream_control, stream_handle) = start_ppg_stream(stream_config).await?;
    let (mut filtered, service_commands, service_stats, service_handle) =
        start_processing_service(raw_samples, pipeline)?;

    let mut stdout = std::io::stdout().lock();

    let end = forward_samples(&mut filtered, &mut stdout, cli.every, tokio::signal::ctrl_c()).await?;
    if end == OutputEnd::Interrupted {
        let processed = service_stats.lock().await.samples_processed;
        info!(samples_processed = processed, "Interrupted, stopping stream");
        // Stream shutdown closes the raw channel, which drains the service
        if stream_control.send(StreamCommand::Shutdown).await.is_err() {
            send_command(&service_commands, ServiceCommand::Shutdown).await?;
        }
        forward_samples(&mut filtered, &mut stdout, cli.every, std::future::pending::<()>()).await?;
    }
    stdout.flush()?;

    let stream_stats = stream_handle.await??;
    let service_stats = service_handle.await??;

    info!(
        samples_sent = stream_stats.samples_sent,
        signal_seconds = stream_stats.signal_seconds,
        samples_processed = service_stats.samples_processed,
        "PPG monitor finished"
    );
    let output = service_stats.output;
    if let (Some(min), Some(max), Some(avg)) = (output.minimum, output.maximum, output.average) {
        info!(min, max, avg, count = output.count, "Filtered output summary");
    } else {
        info!("No filtered output recorded");
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputEnd {
    /// The service closed its output
    Closed,
    Interrupted,
}

/// Write filtered samples until the output closes or `interrupt` resolves.
///
/// `interrupt` is created once and polled for the whole run, so a signal
/// arriving while a sample is being written is still seen.
async fn forward_samples<I: Future>(
    filtered: &mut broadcast::Receiver<FilteredSample>,
    out: &mut impl Write,
    every: u64,
    interrupt: I,
) -> anyhow::Result<OutputEnd> {
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            sample = filtered.recv() => {
                match sample {
                    Ok(sample) => write_sample(out, &sample, every)?,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Output lagged, skipped {} samples", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(OutputEnd::Closed),
                }
            }

            _ = &mut interrupt => return Ok(OutputEnd::Interrupted),
        }
    }
}

fn write_sample(out: &mut impl Write, sample: &FilteredSample, every: u64) -> anyhow::Result<()> {
    if sample.sequence % every == 0 {
        writeln!(out, "{}", serde_json::to_string(sample)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();

        let cli = Cli::parse_from(["ppg-monitor", "--heart-rate", "90", "--every", "5"]);
        assert_eq!(cli.heart_rate, 90.0);
        assert_eq!(cli.every, 5);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_write_sample_json_lines() {
        let mut out = Vec::new();
        for sequence in 0..6 {
            write_sample(&mut out, &FilteredSample::new(sequence, 0.5), 3).unwrap();
        }

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            r#"{"sequence":0,"ppg_value":0.5}"#,
            r#"{"sequence":3,"ppg_value":0.5}"#,
        ]);
    }

    #[tokio::test]
    async fn test_forward_samples_until_closed() {
        let (sender, mut filtered) = broadcast::channel(16);
        for sequence in 0..4 {
            sender.send(FilteredSample::new(sequence, 1.0)).unwrap();
        }
        drop(sender);

        let mut out = Vec::new();
        let end = forward_samples(&mut filtered, &mut out, 2, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(end, OutputEnd::Closed);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_forward_samples_interrupted() {
        let (sender, mut filtered) = broadcast::channel::<FilteredSample>(16);
        let (interrupt_tx, interrupt_rx) = tokio::sync::oneshot::channel::<()>();

        let writer = tokio::spawn(async move {
            let mut out = Vec::new();
            let end = forward_samples(&mut filtered, &mut out, 1, interrupt_rx).await.unwrap();
            (end, out, filtered)
        });

        sender.send(FilteredSample::new(0, 2.0)).unwrap();
        tokio::task::yield_now().await;
        interrupt_tx.send(()).unwrap();

        let (end, _out, mut filtered) = writer.await.unwrap();
        assert_eq!(end, OutputEnd::Interrupted);

        // Samples published after the interrupt are still drained
        sender.send(FilteredSample::new(1, 3.0)).unwrap();
        drop(sender);
        let mut out = Vec::new();
        let end = forward_samples(&mut filtered, &mut out, 1, std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(end, OutputEnd::Closed);
        assert!(String::from_utf8(out).unwrap().contains(r#""sequence":1"#));
    }

    #[test]
    fn test_sampling_frequency_override() {
        let cli = Cli::parse_from(["ppg-monitor", "--sampling-frequency", "250"]);
        let config = load_pipeline(&cli).unwrap();
        assert_eq!(config.sampling_frequency, 250.0);

        let cli = Cli::parse_from(["ppg-monitor", "--sampling-frequency", "0"]);
        assert!(load_pipeline(&cli).is_err());
    }
}
