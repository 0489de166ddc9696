mod action;
mod config;
mod filelog;
mod runner;
mod signals;
#[cfg(test)]
mod test_support;
mod ticker;

use action::PrintAction;
use clap::Parser;
use config::PulseConfig;
use filelog::FileWriter;
use signals::SignalHandler;
use std::path::PathBuf;
use std::sync::Arc;
use ticker::Ticker;

/// Print a message on a fixed interval until interrupted, then stop the
/// ticker cooperatively and exit after a short grace period.
#[derive(Parser, Debug)]
#[command(name = "pulse", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "pulse.toml")]
    config: PathBuf,

    /// Tick interval in seconds (overrides config)
    #[arg(long)]
    interval: Option<u64>,

    /// Shutdown grace period in seconds (overrides config)
    #[arg(long)]
    grace: Option<u64>,

    /// Message printed on every tick (overrides config)
    #[arg(short, long)]
    message: Option<String>,

    /// Append every printed line to this file (overrides config)
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Prefix log file lines with a UTC timestamp
    #[arg(long)]
    timestamps: bool,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-tick events)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn apply_overrides(&self, cfg: &mut PulseConfig) {
        if let Some(interval) = self.interval {
            cfg.ticker.interval_secs = interval;
        }
        if let Some(grace) = self.grace {
            cfg.shutdown.grace_secs = grace;
        }
        if let Some(message) = &self.message {
            cfg.ticker.message = message.clone();
        }
        if let Some(path) = &self.log_file {
            cfg.log.file = Some(path.clone());
        }
        if self.timestamps {
            cfg.log.timestamps = true;
        }
    }

    fn default_filter(&self) -> &'static str {
        if self.verbose {
            "pulse=debug"
        } else if self.quiet {
            "pulse=warn"
        } else {
            "pulse=info"
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.default_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "pulse failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = PulseConfig::load(&cli.config)?;
    cli.apply_overrides(&mut cfg);
    cfg.validate()?;

    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    let ticker = Ticker::new(cfg.ticker.interval())?;
    let mut action = PrintAction::new(&cfg.ticker.message, &cfg.ticker.stop_notice);

    let log = match &cfg.log.file {
        Some(path) => {
            let writer = Arc::new(FileWriter::open(path, cfg.log.timestamps)?);
            tracing::info!(path = %writer.path().display(), "mirroring output to log file");
            action = action.with_log(Arc::clone(&writer));
            Some(writer)
        }
        None => None,
    };

    let mut signals = SignalHandler::install()?;
    tracing::info!(
        interval_secs = ticker.period().as_secs(),
        grace_secs = cfg.shutdown.grace_secs,
        "starting ticker"
    );
    let outcome = runner::run(
        ticker,
        action,
        cfg.shutdown.grace(),
        signals.wait(),
        std::io::stdout(),
    )
    .await;

    tracing::info!(
        signal = %outcome.reason,
        ticker_finished = outcome.ticker_finished,
        ticks = outcome.report.map(|r| r.ticks),
        "run complete"
    );

    // An abandoned ticker that writes after this gets FileWriterError::Closed.
    if let Some(log) = log {
        if let Err(e) = log.close() {
            tracing::warn!(error = %e, "failed to close log file");
        }
    }

    Ok(())
}
