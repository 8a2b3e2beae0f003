use anyhow::Context;
use clap::{Parser, ValueEnum};
use metrics_value_publisher::{Builder, DEFAULT_URL, Publisher, Transport};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How samples reach the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// POST to the collector's HTTP listener.
    Http,
    /// One datagram per sample to the collector's socket listener.
    Udp,
}

/// Publish a synthetic cycling gauge to a line protocol collector.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Transport used to reach the collector.
    #[arg(long, env = "VALUE_PUBLISHER_TRANSPORT", value_enum, default_value_t = TransportKind::Http)]
    transport: TransportKind,

    /// Collector endpoint receiving the samples over HTTP.
    #[arg(long, env = "VALUE_PUBLISHER_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Collector `host:port` receiving the samples over UDP.
    #[arg(long, env = "VALUE_PUBLISHER_UDP_ADDR", default_value = "telegraf:8094")]
    udp_addr: String,

    /// Measurement name of the series.
    #[arg(long, env = "VALUE_PUBLISHER_MEASUREMENT", default_value = "value")]
    measurement: String,

    /// Static `key=value` tag added to every sample, may be repeated.
    #[arg(long = "tag", env = "VALUE_PUBLISHER_TAG", value_parser = parse_tag)]
    tags: Vec<(String, String)>,

    /// Add a `hostname` tag with the name of this machine.
    #[arg(long, env = "VALUE_PUBLISHER_HOSTNAME_TAG")]
    hostname_tag: bool,

    /// Amount added to the gauge after every successful send.
    #[arg(long, env = "VALUE_PUBLISHER_STEP", default_value_t = 0.1)]
    step: f64,

    /// Value at which the gauge wraps back to zero.
    #[arg(long, env = "VALUE_PUBLISHER_MODULUS", default_value_t = 10.0)]
    modulus: f64,

    /// Delay between two sends in milliseconds.
    #[arg(long, env = "VALUE_PUBLISHER_INTERVAL_MS", default_value_t = 100)]
    interval_ms: u64,

    /// Seconds between two progress summaries.
    #[arg(long, env = "VALUE_PUBLISHER_SUMMARY_SECS", default_value_t = 5)]
    summary_secs: u64,

    /// Send timeout in milliseconds, 0 waits forever.
    #[arg(long, env = "VALUE_PUBLISHER_TIMEOUT_MS", default_value_t = 1000)]
    timeout_ms: u64,

    /// Minimum milliseconds between two logged send failures, 0 logs all.
    #[arg(long, env = "VALUE_PUBLISHER_FAILURE_LOG_MS", default_value_t = 0)]
    failure_log_ms: u64,

    /// Stop after this many send attempts instead of running until
    /// interrupted.
    #[arg(long, env = "VALUE_PUBLISHER_ITERATIONS")]
    iterations: Option<u64>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "VALUE_PUBLISHER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn builder(&self) -> Builder {
        let timeout = (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms));

        let mut builder = Builder::new()
            .url(&self.url)
            .measurement(&self.measurement)
            .step(self.step)
            .modulus(self.modulus)
            .pacing_interval(Duration::from_millis(self.interval_ms))
            .summary_interval(Duration::from_secs(self.summary_secs))
            .failure_log_interval(Duration::from_millis(self.failure_log_ms))
            .timeout(timeout);

        for (key, value) in &self.tags {
            builder = builder.tag(key, value);
        }

        if self.hostname_tag {
            builder = builder.hostname_tag();
        }

        builder
    }
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    tracing::info!("Starting up.");

    match args.transport {
        TransportKind::Http => {
            let publisher = args
                .builder()
                .build()
                .context("invalid publisher settings")?;
            tracing::info!("Publishing over HTTP to {}", args.url);
            serve(publisher, &args)
        }
        TransportKind::Udp => {
            let publisher = args
                .builder()
                .build_udp(&args.udp_addr)
                .context("invalid publisher settings")?;
            tracing::info!("Publishing over UDP to {}", args.udp_addr);
            serve(publisher, &args)
        }
    }
}

fn serve<T: Transport>(mut publisher: Publisher<T>, args: &Args) -> anyhow::Result<()> {
    tracing::info!(
        "Measurement `{}` every {}ms",
        publisher.series().measurement(),
        args.interval_ms
    );

    let (tx_shutdown, rx_shutdown) = crossbeam::channel::bounded(1);
    ctrlc::set_handler(move || {
        tx_shutdown.try_send(()).ok();
    })
    .context("could not install interrupt handler")?;

    publisher.run(&rx_shutdown, args.iterations);
    publisher.close();

    Ok(())
}
