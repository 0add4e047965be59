use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use acquisition::consensus::COMPARISON_WINDOW;
use acquisition::AttackKind;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sensor_monitor::report;
use sensor_monitor::{MonitorConfig, MonitorSession};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML config file (environment variables take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text reports
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the detection backend
    Health,

    /// Stream readings for a while, then print history statistics
    Stream {
        #[arg(long, default_value_t = 20)]
        seconds: u64,

        /// Explain the most recent anomaly, if any
        #[arg(long, default_value_t = false)]
        explain: bool,
    },

    /// Stream until enough history exists, then compare all three models
    Compare {
        #[arg(long, default_value_t = 60)]
        warmup_seconds: u64,
    },

    /// Generate attack samples and compare them with normal traffic
    Attack {
        #[arg(long)]
        kind: AttackKind,

        #[arg(long, default_value = "50")]
        count: NonZeroUsize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = MonitorConfig::load(cli.config.as_deref())?;
    let session = MonitorSession::connect(&config)?;
    info!(session = %session.id(), backend = %config.backend_url, "Sensor monitor starting");

    match cli.command {
        Command::Health => {
            let health = session
                .backend_health()
                .await
                .context("Backend health probe failed")?;
            emit(cli.json, &health, report::format_health)?;
            if !health.is_healthy() {
                bail!("backend reports status '{}'", health.status);
            }
        }

        Command::Stream { seconds, explain } => {
            session.set_streaming(true);
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            session.set_streaming(false);

            let stats = session.stats();
            let threshold = session.store().threshold();
            emit(cli.json, &stats, |s| report::format_stats(s.as_ref(), threshold))?;
            if !cli.json {
                println!("{}", report::format_stream_health(&session.stream_health()));
            }

            if explain {
                session.select_latest_anomaly();
                match session.explanation() {
                    Some(explanation) => {
                        emit(cli.json, &explanation, report::format_explanation)?
                    }
                    None => println!("No anomalies recorded"),
                }
            }
        }

        Command::Compare { warmup_seconds } => {
            session.set_streaming(true);
            let ready = session
                .wait_for_readings(COMPARISON_WINDOW, Duration::from_secs(warmup_seconds))
                .await;
            session.set_streaming(false);
            if !ready {
                warn!(
                    have = session.store().reading_count(),
                    need = COMPARISON_WINDOW,
                    "warm-up ended before history filled"
                );
            }

            let result = session.compare().await.context("Model comparison failed")?;
            emit(cli.json, &result, report::format_consensus)?;
        }

        Command::Attack { kind, count } => {
            let attack = session
                .attack(kind, count)
                .await
                .with_context(|| format!("Attack comparison for {kind} failed"))?;
            emit(cli.json, &attack, report::format_attack)?;
        }
    }

    Ok(())
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to serialize report")?
        );
    } else {
        println!("{}", text(value));
    }
    Ok(())
}
