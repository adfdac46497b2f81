//! SWIFT node daemon.
//!
//! Serves every endpoint a node needs for its role: the storage hop
//! pages, the access-node API, roster sharing, liveness and enrolment.
//! The roster is seeded from a share-record file into an in-memory store;
//! production deployments plug real store back-ends in instead.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use swift_core::Configuration;
use swift_net::{spawn_alive, AccessFixed, DefaultPages, Services};
use swift_proto::share::NodeShare;
use swift_ring::Node;
use swift_store::{StorageService, Store, Volatile};
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// SWIFT daemon service.
#[derive(Parser)]
#[command(name = "swiftd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, default_value = "swift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (default)
    Run {
        /// Listen address
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        listen: SocketAddr,

        /// Roster file: a JSON array of node share records
        #[arg(short, long)]
        roster: Option<PathBuf>,

        /// Access keys authorised for the protected endpoints
        #[arg(short, long)]
        access_key: Vec<String>,
    },

    /// Validate the configuration and roster, then exit
    Check {
        /// Roster file: a JSON array of node share records
        #[arg(short, long)]
        roster: Option<PathBuf>,
    },
}

fn load_config(path: &PathBuf) -> Result<Configuration> {
    if !path.exists() {
        info!("no config file at {:?}, using defaults", path);
        return Ok(Configuration::default());
    }
    let content = std::fs::read_to_string(path).context("failed to read config file")?;
    let config: Configuration = toml::from_str(&content).context("failed to parse config file")?;
    Ok(config)
}

fn load_roster(path: &PathBuf) -> Result<Vec<Node>> {
    let content = std::fs::read_to_string(path).context("failed to read roster file")?;
    let records: Vec<NodeShare> =
        serde_json::from_str(&content).context("failed to parse roster file")?;
    let mut nodes = Vec::with_capacity(records.len());
    for record in &records {
        match Node::from_share(record) {
            Ok(node) => nodes.push(node),
            Err(e) => warn!(domain = %record.domain, error = %e, "skipping bad roster record"),
        }
    }
    Ok(nodes)
}

async fn build_services(
    config: Configuration,
    roster: Option<&PathBuf>,
    access_keys: Vec<String>,
) -> Result<Arc<Services>> {
    let nodes = match roster {
        Some(path) => load_roster(path)?,
        None => Vec::new(),
    };
    info!(count = nodes.len(), "seeded roster");

    let store: Arc<dyn Store> = Arc::new(Volatile::with_nodes("main", false, nodes));
    let storage = StorageService::new(config.clone(), vec![store])
        .await
        .map_err(|e| anyhow::anyhow!("storage service failed: {e}"))?;

    Ok(Services::new(
        config,
        storage,
        Arc::new(AccessFixed::new(access_keys)),
        Arc::new(DefaultPages),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set up logging")?;

    let config = load_config(&cli.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration invalid: {e}"))?;

    match cli.command.unwrap_or(Commands::Run {
        listen: "0.0.0.0:8080".parse().context("default listen address")?,
        roster: None,
        access_key: Vec::new(),
    }) {
        Commands::Run {
            listen,
            roster,
            access_key,
        } => {
            let services = build_services(config, roster.as_ref(), access_key).await?;

            let refresh = services.store.spawn_refresh();
            let alive = spawn_alive(services.clone());

            let router = swift_net::router(services);
            let listener = tokio::net::TcpListener::bind(listen)
                .await
                .context("failed to bind listen address")?;
            info!("listening on {listen}");

            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server failed")?;

            refresh.abort();
            alive.abort();
            info!("daemon stopped");
        }

        Commands::Check { roster } => {
            if let Some(path) = &roster {
                let nodes = load_roster(path)?;
                println!("roster ok: {} nodes", nodes.len());
            }
            println!("configuration ok");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
