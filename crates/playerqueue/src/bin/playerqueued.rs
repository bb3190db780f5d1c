//! `playerqueued`: a single-node player queue.
//!
//! Serves the lobbies listed in the config file, keeps chat and profiles
//! in memory, and accepts the caller's Steam ID as the upgrade token. The
//! last part is for development only; real deployments put an
//! authenticating proxy in front or embed the library with their own
//! [`Authenticator`].

use std::path::PathBuf;

use clap::Parser;
use playerqueue::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "playerqueued", version, about = "Player queue coordinator for game-server fleets")]
struct Args {
    /// Configuration file path. A missing file means defaults.
    #[arg(short, long, value_name = "FILE", default_value = "playerqueue.toml")]
    config: PathBuf,

    /// Bind address, overriding `listen_addr` from the config.
    #[arg(short, long, value_name = "ADDRESS")]
    listen: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,
}

/// Takes the token to be the caller's Steam ID.
struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<SteamId, ClientError> {
        token
            .parse()
            .map_err(|_| ClientError::AuthFailed("token must be a steam id".into()))
    }
}

fn setup_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_logging(args.debug);

    let mut config = QueueConfig::load(&args.config).await?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    tracing::info!(lobbies = config.lobbies.len(), "configuration loaded");

    let feed = StaticLobbyFeed::new(config.lobbies.clone());
    let server = PlayerQueueServer::builder()
        .config(config)
        .build(
            DevAuthenticator,
            MemoryChatStore::new(),
            MemoryProfiles::new(),
            PermissionAuthorizer,
        )
        .await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                signal.cancel();
            }
            Err(e) => tracing::error!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    server.run(feed, shutdown).await?;
    Ok(())
}
