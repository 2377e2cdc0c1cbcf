use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_checker::{
    config::{Config, ReportFormat},
    playlist,
    prober::HttpProber,
    report,
    runner::ProbeRunner,
};

#[derive(Parser)]
#[command(name = "m3u-checker")]
#[command(version)]
#[command(about = "Checks IPTV playlist stream endpoints and republishes only the live channels")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Playlist to check; use '-' to read from stdin
    #[arg(short, long, default_value = "-", value_name = "FILE")]
    input: String,

    /// Filtered playlist output path
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Report output path; omit to print the report to stdout
    #[arg(short, long, value_name = "FILE")]
    report: Option<String>,

    /// Report format
    #[arg(long, value_enum, value_name = "FORMAT")]
    report_format: Option<ReportFormat>,

    /// Per-probe timeout (e.g. 10s, 750ms)
    #[arg(long, value_name = "DURATION")]
    timeout: Option<String>,

    /// Retry budget for transient failures
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Base backoff between retry attempts
    #[arg(long, value_name = "DURATION")]
    backoff: Option<String>,

    /// Maximum concurrent probes
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Whole-run deadline
    #[arg(long, value_name = "DURATION")]
    deadline: Option<String>,

    /// Treat restricted responses (403/451) as dead and fail 5xx without retry
    #[arg(long)]
    strict: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("m3u_checker={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting m3u-checker v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path, true)?,
        None => Config::load_from_file("config.toml", false)?,
    };

    // CLI arguments override config file values.
    if let Some(timeout) = cli.timeout {
        config.probe_timeout = timeout;
    }
    if let Some(retries) = cli.retries {
        config.max_retries = retries;
    }
    if let Some(backoff) = cli.backoff {
        config.retry_backoff = backoff;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(deadline) = cli.deadline {
        config.run_deadline = Some(deadline);
    }
    if cli.strict {
        config.strict = true;
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    if let Some(report_path) = cli.report {
        config.report = Some(report_path);
    }
    if let Some(format) = cli.report_format {
        config.report_format = format;
    }

    let options = config.validate()?;

    let text = if cli.input == "-" {
        use tokio::io::AsyncReadExt;
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read playlist from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("failed to read playlist {}", cli.input))?
    };

    let entries = playlist::parse(&text)?;
    info!(
        "Parsed {} channel entries from {}",
        entries.len(),
        if cli.input == "-" { "stdin" } else { cli.input.as_str() }
    );

    let prober = HttpProber::new(&options)?;
    let runner = ProbeRunner::new(prober, options.concurrency, options.run_deadline);
    let run_report = runner.run_all(entries).await;

    let filtered = playlist::write_playlist(&run_report);
    tokio::fs::write(&config.output, filtered)
        .await
        .with_context(|| format!("failed to write playlist {}", config.output))?;
    info!(
        "Wrote filtered playlist with {} live channels to {}",
        run_report.live, config.output
    );

    let rendered = match config.report_format {
        ReportFormat::Text => report::render_text(&run_report),
        ReportFormat::Json => report::render_json(&run_report)?,
    };
    match &config.report {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("failed to write report {path}"))?;
            info!("Wrote report to {}", path);
        }
        None => print!("{rendered}"),
    }

    // Per-channel probe failures are reported, never fatal.
    Ok(())
}
