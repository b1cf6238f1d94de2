//! iotstream CLI
//!
//! Analyzes a Kafka stream of sensor readings with a logistic regression model,
//! one reporting interval at a time.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::error::ErrorKind;
use clap::Parser;
use iotstream::{
    config::Config,
    core::{
        banner, stream_intervals, IntervalAggregator, IntervalBatcher, LogisticRegressionModel,
        ThroughputSummary,
    },
    source::KafkaSource,
    storage::{BlockingModelStore, ModelLocation},
    USAGE, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "iotstream")]
#[command(version = VERSION)]
#[command(about = "Evaluate a logistic regression model on a Kafka stream of sensor readings", long_about = None)]
struct Cli {
    /// Number of sensors (length of the feature vector)
    n_sensors: String,

    /// Reporting interval in seconds
    reporting_interval: String,

    /// Comma-separated Kafka bootstrap servers
    kafka_server_list: String,

    /// Kafka topic carrying the sensor readings
    kafka_topic: String,

    /// Model storage backend: S3, or anything else for a filesystem path
    storage: String,

    /// S3 bucket or path prefix holding the model
    storage_root: String,

    /// Model name (key or sub-path under the storage root)
    model_name: String,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kafka consumer group id (overrides the configuration file)
    #[arg(long)]
    group_id: Option<String>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !is_usage_error(&e) => e.exit(),
        Err(_) => {
            eprintln!("{USAGE}");
            std::process::exit(-1);
        }
    };

    init_tracing();

    if let Err(e) = run(cli) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

/// Parse failures other than `--help` and `--version` print the usage line.
fn is_usage_error(e: &clap::Error) -> bool {
    !matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let n_sensors: usize = cli
        .n_sensors
        .trim()
        .parse()
        .with_context(|| format!("Invalid sensor count '{}'", cli.n_sensors))?;
    let interval = parse_interval(&cli.reporting_interval)?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {path:?}"))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    if let Some(group_id) = cli.group_id {
        config.group_id = Some(group_id);
    }

    let location = ModelLocation::from_args(&cli.storage, &cli.storage_root, &cli.model_name);
    println!(
        "{}",
        banner(
            Utc::now(),
            &cli.kafka_topic,
            &cli.kafka_server_list,
            &location.uri(),
            interval
        )
    );

    let model = load_model(&config, &location, n_sensors)?;
    let mut aggregator = IntervalAggregator::new(n_sensors, model);

    let mut source = KafkaSource::start(&config.kafka_source(&cli.kafka_server_list, &cli.kafka_topic))
        .context("Failed to start Kafka source")?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let start = Instant::now();
    let mut batcher = IntervalBatcher::starting_at(interval, start);
    stream_intervals(
        &mut aggregator,
        &mut batcher,
        source.receiver(),
        &running,
        &mut std::io::stdout().lock(),
    )?;

    source.stop();

    let summary = ThroughputSummary::compute(
        &aggregator.counters(),
        start.elapsed(),
        interval,
        config.shutdown_allowance,
    );
    println!("{summary}");

    Ok(())
}

fn parse_interval(raw: &str) -> anyhow::Result<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid reporting interval '{raw}'"))?;
    let interval = Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Invalid reporting interval '{raw}'"))?;
    if interval.is_zero() {
        bail!("Reporting interval must be greater than zero");
    }
    Ok(interval)
}

/// Fetch, parse and check the model against the sensor count.
fn load_model(
    config: &Config,
    location: &ModelLocation,
    n_sensors: usize,
) -> anyhow::Result<LogisticRegressionModel> {
    let store = BlockingModelStore::new(config.s3_settings())?;
    let bytes = store
        .fetch(location)
        .with_context(|| format!("Failed to load model {location}"))?;
    let model = LogisticRegressionModel::from_json(&bytes)
        .with_context(|| format!("Failed to parse model {location}"))?;
    model.validate(n_sensors)?;

    tracing::info!(
        model = %location,
        features = model.num_features(),
        threshold = model.threshold,
        "Model loaded"
    );
    Ok(model)
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARGS: [&str; 7] = ["4", "1.5", "kafka:9092", "sensors", "S3", "models", "lr"];

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("iotstream").chain(args.iter().copied()))
    }

    #[test]
    fn test_seven_positionals_parse() {
        let cli = parse(&ARGS).unwrap();
        assert_eq!(cli.n_sensors, "4");
        assert_eq!(cli.storage_root, "models");
        assert_eq!(cli.model_name, "lr");
        assert!(cli.group_id.is_none());
    }

    #[test]
    fn test_too_few_positionals_is_usage_error() {
        let err = parse(&ARGS[..6]).err().unwrap();
        assert!(is_usage_error(&err));
    }

    #[test]
    fn test_too_many_positionals_is_usage_error() {
        let mut args = ARGS.to_vec();
        args.push("extra");
        let err = parse(&args).err().unwrap();
        assert!(is_usage_error(&err));
    }

    #[test]
    fn test_help_is_not_usage_error() {
        let err = parse(&["--help"]).err().unwrap();
        assert!(!is_usage_error(&err));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("0.5").unwrap(), Duration::from_millis(500));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-1").is_err());
        assert!(parse_interval("soon").is_err());
    }
}
