//! Mixdown command-line front end.
//!
//! Mixes two audio files through the pipeline and prints the job summary
//! as JSON on stdout.
//!
//! Usage:
//!   mixdown voice.mp3 music.mp3 --gain 0.4 --policy first -o mixed.aac

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use mixdown_core::config::ConfigManager;
use mixdown_core::logging::{init_tracing, LogLevel};
use mixdown_core::models::{DurationPolicy, MixOptions};
use mixdown_core::orchestrator::{CancelHandle, MixRequest};
use mixdown_core::Mixer;

/// Command-line arguments for mixdown
#[derive(Parser, Debug)]
#[command(name = "mixdown")]
#[command(about = "Mix a foreground and a background audio track with FFmpeg")]
#[command(version)]
struct Args {
    /// Primary input (mix input A)
    primary: PathBuf,

    /// Secondary input (mix input B)
    secondary: PathBuf,

    /// Settings file, created with defaults when missing
    #[arg(short, long, default_value = "mixdown.toml", env = "MIXDOWN_CONFIG")]
    config: PathBuf,

    /// Gain applied to the shorter input, in (0, 1]
    #[arg(short, long)]
    gain: Option<f64>,

    /// Output length: shortest, longest or first
    #[arg(short, long)]
    policy: Option<DurationPolicy>,

    /// Copy the result here and remove it from the outputs folder
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Console log level (debug, info, warn, error)
    #[arg(long, env = "MIXDOWN_LOG_LEVEL")]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = ConfigManager::new(&args.config);
    config
        .load_or_create()
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.settings_mut().logging.level = level;
    }
    config
        .ensure_dirs_exist()
        .context("Failed to create storage folders")?;

    let settings = config.settings().clone();
    init_tracing(settings.logging.level);
    info!("Settings: {}", config.path().display());

    let mixer = Mixer::from_settings(settings);
    let options = MixOptions {
        gain_factor: args.gain,
        duration_policy: args.policy,
    };

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling job");
            on_interrupt.cancel();
        }
    });

    let request = MixRequest::files(&args.primary, &args.secondary, options)
        .with_cancel_handle(cancel);
    let outcome = mixer
        .spawn(request)
        .await
        .context("Mix task aborted")?;

    let mut summary = outcome.summary;
    if let Some(result) = outcome.result {
        match args.output {
            Some(dest) => {
                result
                    .copy_to(&dest)
                    .await
                    .with_context(|| format!("Failed to write {}", dest.display()))?;
                result.confirm_delivery();
                summary.download_reference = Some(dest);
            }
            None => {
                summary.download_reference = Some(result.persist());
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
