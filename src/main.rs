use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;

use linecast::{
    ApiKey, LinecastConfig, PlaybackScheduler, ReaderSession, SilentSink, create_synthesizer,
    default_sink,
};

/// linecast - read text aloud line by line with Gemini TTS
#[derive(Parser, Debug)]
#[command(name = "linecast")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play text aloud, generating audio ahead of playback
    Speak {
        /// Text file to read (stdin if omitted)
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,

        /// 1-based line to start from
        #[arg(long = "from", default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        from: u64,
    },

    /// Generate every line and write a single merged WAV file
    Export {
        /// Text file to read (stdin if omitted)
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,

        /// Output directory (defaults to the configured export directory)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Store an API key
    Set { key: String },
    /// Remove the stored API key
    Clear,
    /// Show the active API key (redacted) and where it came from
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        info!("Loading configuration from {}", config_path.display());
        LinecastConfig::from_file(config_path)?
    } else {
        LinecastConfig::from_env()?
    };

    match cli.command {
        Commands::Speak { file, from } => speak(&config, file.as_deref(), from).await,
        Commands::Export { file, output } => {
            let dir = output.unwrap_or_else(|| config.export_dir.clone());
            export(&config, file.as_deref(), &dir).await
        }
        Commands::Key { action } => manage_key(&config, action),
    }
}

fn read_text(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn build_session(
    config: &LinecastConfig,
    sink: Arc<dyn linecast::AudioSink>,
) -> anyhow::Result<ReaderSession> {
    let synthesizer = create_synthesizer(config.gemini_config()?)?;
    Ok(ReaderSession::new(synthesizer, sink)
        .with_batch_size(config.batch_size)
        .with_playback(PlaybackScheduler::new(
            config.poll_interval,
            config.segment_pause,
        )))
}

async fn speak(config: &LinecastConfig, file: Option<&Path>, from: u64) -> anyhow::Result<()> {
    let text = read_text(file)?;
    let session = build_session(config, default_sink())?;
    session.set_text(&text).await;

    let start = usize::try_from(from - 1).map_err(|_| anyhow!("--from is too large"))?;
    session.play_from(start).await?;

    let outcome = tokio::select! {
        outcome = session.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping playback");
            session.stop().await
        }
    };

    let snapshot = session.snapshot();
    if let Some(outcome) = outcome {
        let generation = outcome.generation?;
        println!(
            "Played {} of {} line(s); {} generated, {} failed{}",
            outcome.playback.played.len(),
            snapshot.total - outcome.start_index,
            generation.succeeded,
            generation.failed.len(),
            if outcome.playback.cancelled { " (stopped)" } else { "" },
        );
        if !outcome.playback.skipped.is_empty() {
            let lines: Vec<String> = outcome
                .playback
                .skipped
                .iter()
                .map(|index| (index + 1).to_string())
                .collect();
            println!("Skipped line(s): {}", lines.join(", "));
        }
    }
    Ok(())
}

async fn export(config: &LinecastConfig, file: Option<&Path>, dir: &Path) -> anyhow::Result<()> {
    let text = read_text(file)?;
    let session = build_session(config, Arc::new(SilentSink::instant()))?;
    session.set_text(&text).await;

    let report = session.generate_all().await?;
    info!(
        succeeded = report.succeeded,
        failed = report.failed.len(),
        "Generation complete"
    );

    let path = session.export_to(dir)?;
    println!("Exported {} line(s) to {}", session.snapshot().total, path.display());
    Ok(())
}

fn manage_key(config: &LinecastConfig, action: KeyAction) -> anyhow::Result<()> {
    let store = config.credential_store();
    match action {
        KeyAction::Set { key } => {
            let key = ApiKey::new(key);
            store.save(&key)?;
            println!("Saved API key {} to {}", key.redacted(), store.path().display());
        }
        KeyAction::Clear => {
            if store.clear()? {
                println!("Removed stored API key from {}", store.path().display());
            } else {
                println!("No stored API key");
            }
        }
        KeyAction::Show => {
            if let Some(key) = &config.api_key {
                println!("{} (from configuration)", key.redacted());
            } else if let Some(key) = store.load()? {
                println!("{} (from {})", key.redacted(), store.path().display());
            } else {
                println!("No API key configured");
            }
        }
    }
    Ok(())
}
