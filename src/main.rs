//! chatrelay - streaming chat backend
//!
//! A small server that relays streamed LLM completions to callers as
//! Server-Sent Events and persists chat history in SQLite.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay::api::run_server;
use chatrelay::Config;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Streaming chat relay with SQLite history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatrelay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            tracing::info!(config = %config, "Loading configuration");
            let mut config = Config::from_file(&config)?;

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            tracing::info!(config = %config, "Checking configuration");
            let config = Config::from_file(&config)?;
            println!("config OK");
            println!("  listen:   {}", config.server.listen);
            println!("  database: {}", config.database.path);
            println!("  upstream: {}", config.upstream.base_url);
            println!("  model:    {}", config.upstream.model);
            Ok(())
        }
    }
}
