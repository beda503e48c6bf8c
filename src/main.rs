//! vibehub - local gateway for several LLM providers
//!
//! Serves an OpenAI-compatible chat completions endpoint, routes each call
//! by model name, and keeps a JSONL log of every call.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vibehub::config::{key_env_description, KeySource};
use vibehub::router::Provider;
use vibehub::storage::{clamp_limit, read_history};
use vibehub::Config;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "hub.toml";

#[derive(Parser)]
#[command(name = "vibehub")]
#[command(about = "Local gateway routing chat completions across LLM providers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Path to configuration file (defaults to ./hub.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration and show where each provider's key comes from
    Check {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print recent events from the log, one JSON object per line
    History {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of events to show (capped at 500)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only show events for this trace id
        #[arg(short, long)]
        trace_id: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<(Config, Vec<(Provider, KeySource)>)> {
    Config::load(path, Path::new(DEFAULT_CONFIG_FILE)).context("Failed to load configuration")
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vibehub={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let (mut config, key_sources) = load_config(config.as_deref())?;
            init_tracing(&config.logging.level);

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            for (provider, source) in &key_sources {
                if *source == KeySource::None && *provider != Provider::Local {
                    tracing::warn!(
                        provider = %provider,
                        env = %key_env_description(*provider),
                        "No API key configured; calls routed here will fail"
                    );
                }
            }

            vibehub::proxy::run_server(config).await
        }

        Commands::Check { config } => {
            let (config, key_sources) = load_config(config.as_deref())?;

            println!("Configuration OK");
            println!("  listen:   {}", config.server.listen);
            println!("  history:  {}", config.storage.history_path().display());
            println!();
            for (provider, source) in &key_sources {
                let settings = config.providers.get(*provider);
                println!(
                    "  {:<10} key: {:<28} url: {}",
                    provider.as_str(),
                    source.to_string(),
                    settings.url
                );
            }
            Ok(())
        }

        Commands::History {
            config,
            limit,
            trace_id,
        } => {
            let (config, _) = load_config(config.as_deref())?;
            init_tracing(&config.logging.level);

            let events = read_history(
                &config.storage.history_path(),
                clamp_limit(limit),
                trace_id.as_deref(),
            )
            .await;

            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
            Ok(())
        }
    }
}
