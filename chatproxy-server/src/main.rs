use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chatproxy_core::auth::{AllowAll, BearerTokenAuth, SessionAuth};
use chatproxy_core::config::Config;
use chatproxy_core::http_client::HttpClient;
use chatproxy_core::relay::{RelayState, router};
use chatproxy_core::upstream::ResponsesClient;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "chat streaming relay server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        #[arg(short, long, help = "Path to a JSON or TOML config file")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { config } => serve(config).await,
    }
}

async fn serve(config_path: PathBuf) -> anyhow::Result<()> {
    let cfg = Config::from_path(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let api_key = std::env::var(&cfg.upstream.api_key_env)
        .with_context(|| format!("environment variable {} not set", cfg.upstream.api_key_env))?;
    let http = HttpClient::from_config(&cfg.http)?;
    let upstream = ResponsesClient::new(
        http,
        SecretString::new(api_key.into()),
        cfg.upstream.base.clone(),
    );

    let auth: Arc<dyn SessionAuth> = match &cfg.server.auth_token_env {
        Some(var) => {
            let token = std::env::var(var)
                .with_context(|| format!("environment variable {var} not set"))?;
            Arc::new(BearerTokenAuth::new(SecretString::new(token.into())))
        }
        None => {
            info!("no auth token configured, accepting all callers");
            Arc::new(AllowAll)
        }
    };

    let state = RelayState {
        auth,
        upstream,
        default_model: cfg.upstream.default_model.clone(),
        title_model: cfg.upstream.title_model.clone(),
        titles: None,
    };

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    info!(addr = %cfg.server.bind, "relay listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
