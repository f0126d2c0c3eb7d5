use clap::Parser;
use eyre::{Context, Result};
use hdrhistogram::Histogram;
use iqstream::{Config, IqStreamError, Stream, StreamFormat, ToneSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

static LONG_VERSION: OnceLock<String> = OnceLock::new();

fn get_long_version() -> &'static str {
    LONG_VERSION.get_or_init(|| {
        format!(
            "{} (commit: {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_REVISION", "unknown"),
        )
    })
}

#[derive(Parser)]
#[command(name = "iqstream")]
#[command(about = "stream complex samples from a simulated receiver")]
#[command(version = None, long_version = get_long_version())]
struct Args {
    #[arg(short, long, help = "configuration file path (toml format)")]
    config: Option<String>,

    #[arg(
        short,
        long,
        default_value = "CF32",
        help = "output sample format (CF32, CF64, CS16, CS8, CU8)"
    )]
    format: StreamFormat,

    #[arg(
        short,
        long,
        default_value = "10s",
        value_parser = humantime::parse_duration,
        help = "how long to stream (e.g. 10s, 5m)"
    )]
    duration: Duration,

    #[arg(
        long,
        default_value = "100ms",
        value_parser = humantime::parse_duration,
        help = "timeout for a single read"
    )]
    read_timeout: Duration,

    #[arg(long, default_value_t = 1000.0, help = "tone offset from center in Hz")]
    tone_hz: f64,

    #[arg(short, long, help = "samples per read, capped at the mtu")]
    num_elems: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config path={}", path))?,
        None => Config::default(),
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("received ctrl+c, shutting down gracefully...");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut stream = Stream::setup(&config, args.format).wrap_err("failed to set up stream")?;
    let num_elems = args.num_elems.unwrap_or(stream.mtu());
    let mut out = vec![0u8; num_elems.min(stream.mtu()) * args.format.bytes_per_sample()];

    stream.activate(ToneSource::new(args.tone_hz, config.sample_rate, 0.7))?;
    info!(
        format = %args.format,
        num_elems = num_elems,
        duration = %humantime::format_duration(args.duration),
        "streaming"
    );

    let mut histogram = Histogram::<u64>::new(3)?;
    let mut samples = 0u64;
    let mut timeouts = 0u64;
    let start = Instant::now();
    let mut last_report = start;
    let mut last_samples = 0u64;

    while running.load(Ordering::SeqCst) && start.elapsed() < args.duration {
        let before = Instant::now();
        match stream.read(&mut out, num_elems, args.read_timeout) {
            Ok(res) => {
                histogram.saturating_record(before.elapsed().as_micros() as u64);
                samples += res.samples as u64;
            }
            Err(IqStreamError::Timeout) => timeouts += 1,
            Err(e) => return Err(e).wrap_err("stream read failed"),
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_report);
        if elapsed >= Duration::from_secs(1) {
            let rate = (samples - last_samples) as f64 / elapsed.as_secs_f64();
            info!(
                rate = format!("{:.0}", rate),
                total_samples = samples,
                buffered = stream.buffered(),
                time_ns = stream.time_ns(),
                "statistics report"
            );
            last_report = now;
            last_samples = samples;
        }
    }

    stream.deactivate()?;

    let elapsed = start.elapsed();
    info!(
        total_samples = samples,
        timeouts = timeouts,
        rate = format!("{:.0}", samples as f64 / elapsed.as_secs_f64()),
        expected_rate = config.sample_rate,
        "streaming complete"
    );
    if histogram.is_empty() {
        warn!("no successful reads");
    } else {
        info!(
            p50_us = histogram.value_at_quantile(0.50),
            p90_us = histogram.value_at_quantile(0.90),
            p99_us = histogram.value_at_quantile(0.99),
            p99_9_us = histogram.value_at_quantile(0.999),
            max_us = histogram.max(),
            "read latency percentiles"
        );
    }

    Ok(())
}
