//! Intake server entry point

use std::sync::Arc;

use clap::{Parser, Subcommand};
use intake::api::{create_combined_router, ApiState, RestApiConfig};
use intake::{create_store, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

/// Intake: feedback interviews and voice-command scheduling
#[derive(Parser, Debug)]
#[command(name = "intake")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default behavior)
    Serve {
        /// HTTP port. If not specified, uses config file value.
        #[arg(short, long)]
        port: Option<u16>,
        /// Enable JSON logging format
        #[arg(long)]
        json_logs: bool,
    },
    /// Classify feedback or a scheduling command
    Classify {
        /// Text to classify
        text: String,
        /// Label set: feedback or scheduling
        #[arg(short, long, default_value = "feedback")]
        domain: String,
    },
    /// Resolve a natural-language time expression
    Resolve {
        /// Expression, e.g. "tomorrow at 3pm and Wednesday 10 to noon"
        expression: String,
        /// Reference instant (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Interpret a voice transcript against a fresh store (dry run)
    Voice {
        /// Transcript text
        transcript: String,
        /// Property the showing is for, unless the transcript names one
        #[arg(short, long)]
        property: Option<i64>,
        /// Reference instant (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if let Some(path) = &args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    let is_serve = matches!(args.command, Some(Command::Serve { .. }) | None);

    if !is_serve {
        // Minimal logging for CLI commands
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::stderr)
            .init();
    }

    match args.command {
        Some(Command::Serve { port, json_logs }) => run_http_server(config, port, json_logs).await,
        Some(Command::Classify { text, domain }) => cli::run_classify(&config, &text, &domain, args.json),
        Some(Command::Resolve { expression, at }) => {
            cli::run_resolve(&config, &expression, at.as_deref(), args.json)
        }
        Some(Command::Voice {
            transcript,
            property,
            at,
        }) => cli::run_voice(&config, &transcript, property, at.as_deref(), args.json).await,
        None => run_http_server(config, None, false).await,
    }
}

/// Run the HTTP API until interrupted.
async fn run_http_server(mut config: Config, port: Option<u16>, json_logs: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if json_logs || config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Intake server v{}", env!("CARGO_PKG_VERSION"));

    if let Some(p) = port {
        config.server.http_port = p;
    }

    tracing::info!(
        utc_offset = %config.scheduling.utc_offset,
        persistent = config.storage.data_dir.is_some(),
        "Configuration loaded"
    );

    let store = Arc::new(create_store(&config).await?);
    let state = Arc::new(ApiState::from_config(store, &config)?);
    let router = create_combined_router(state, &RestApiConfig::from(&config.server));

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}{}", addr, config.server.api_prefix);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
