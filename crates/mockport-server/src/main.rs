use anyhow::Context;
use clap::{Parser, ValueEnum};
use mockport_server::admin_api::AdminApiServer;
use mockport_server::config::Config;
use mockport_server::proxy::install_crypto_provider;
use mockport_server::store::{Fixtures, InMemoryStore};
use mockport_server::{MockEngine, MockServer};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// HTTP mock/proxy engine
#[derive(Parser, Debug)]
#[command(name = "mockport-server", author, version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "MOCKPORT_CONFIG")]
    config: Option<String>,

    /// Mock listener port (overrides the config file)
    #[arg(short, long, env = "MOCKPORT_PORT")]
    port: Option<u16>,

    /// Admin API port (overrides the config file)
    #[arg(long, env = "MOCKPORT_ADMIN_PORT")]
    admin_port: Option<u16>,

    /// Fixtures file with projects, definitions, rules and callbacks
    #[arg(short, long, env = "MOCKPORT_FIXTURES")]
    fixtures: Option<String>,

    #[arg(long, value_enum, default_value = "text", env = "MOCKPORT_LOG_FORMAT")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = Registry::default().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

fn load_config(args: &Args) -> Result<Config, anyhow::Error> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config {path}"))?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if let Some(port) = args.admin_port {
        config.admin.port = port;
    }
    if let Some(fixtures) = &args.fixtures {
        config.store.fixtures_path = Some(fixtures.clone());
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_tracing(args.log_format);
    install_crypto_provider();

    let config = load_config(&args)?;
    let store = match &config.store.fixtures_path {
        Some(path) => {
            let fixtures = Fixtures::from_file(path)?;
            info!("Loaded {} project(s) from {}", fixtures.projects.len(), path);
            InMemoryStore::from_fixtures(fixtures, config.store.log_capacity)?
        }
        None => {
            info!("No fixtures file configured; starting with an empty store");
            InMemoryStore::new(config.store.log_capacity)
        }
    };

    let engine = Arc::new(MockEngine::new(config, Arc::new(store))?);
    engine.start();

    let mock_server = MockServer::new(Arc::clone(&engine))?;
    let admin_server = AdminApiServer::new(Arc::clone(&engine));

    tokio::select! {
        result = mock_server.run() => {
            if let Err(e) = result {
                error!("Mock listener stopped: {:#}", e);
            }
        }
        result = admin_server.run() => {
            if let Err(e) = result {
                error!("Admin API stopped: {:#}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    engine.shutdown().await;
    Ok(())
}
