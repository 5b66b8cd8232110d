//! LinkVue headless peer entry point.
//!
//! Runs one peer of a shared whiteboard session without a window: as a host it
//! relays snapshots between every connected client and keeps its own copy of
//! the document; as a client it mirrors the host's document.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML file, then CLI overrides
//!  └─ spawn_blocking           -- bind (host) or connect (client)
//!       └─ ConnectionManager   -- accept thread + one receive thread per peer
//!  └─ tick loop (interval)
//!       └─ SyncSession::tick   -- drain the relay, publish local changes
//!  └─ Ctrl-C                   -- stop the manager, clear the relay
//! ```
//!
//! If networking cannot be set up the peer keeps running offline; a failed
//! bind or connect is logged, never fatal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use linkvue_core::Document;
use linkvue_peer::application::relay::MessageRelay;
use linkvue_peer::application::session::SyncSession;
use linkvue_peer::infrastructure::network::connection_manager::{
    ConnectionManager, PeerEventSink,
};
use linkvue_peer::infrastructure::storage::config::{
    load_config, load_config_from, AppConfig, ConfigError, PeerRoleSetting, MIN_PORT,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// LinkVue peer.
///
/// Hosts a shared whiteboard session or joins one.  Values given here override
/// the config file.
#[derive(Debug, Parser)]
#[command(
    name = "linkvue-peer",
    about = "Headless LinkVue peer: host or join a shared whiteboard session",
    version
)]
struct Cli {
    /// Host a session, listening for clients.
    #[arg(long, conflicts_with = "connect")]
    host: bool,

    /// Join the session hosted at this IPv4 address.
    #[arg(long, value_name = "IPV4", env = "LINKVUE_CONNECT")]
    connect: Option<String>,

    /// TCP port to listen on or connect to.
    #[arg(
        long,
        env = "LINKVUE_PORT",
        value_parser = clap::value_parser!(u16).range(i64::from(MIN_PORT)..)
    )]
    port: Option<u16>,

    /// Read configuration from this file instead of the platform default.
    #[arg(long, value_name = "PATH", env = "LINKVUE_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Applies the command-line overrides on top of `config`.
    fn apply(&self, config: &mut AppConfig) {
        if self.host {
            config.network.role = PeerRoleSetting::Host;
        }
        if let Some(address) = &self.connect {
            config.network.role = PeerRoleSetting::Client;
            config.network.host_address = address.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
    }
}

/// Loads the config file named on the command line, or the platform default.
///
/// A platform without a config directory runs on defaults.
fn load(cli: &Cli) -> anyhow::Result<AppConfig> {
    let loaded = match &cli.config {
        Some(path) => load_config_from(path),
        None => match load_config() {
            Err(ConfigError::NoPlatformConfigDir) => Ok(AppConfig::default()),
            other => other,
        },
    };
    loaded.context("failed to load configuration")
}

// ── Networking setup ──────────────────────────────────────────────────────────

/// Initializes and starts a connection manager for the configured role.
///
/// Returns `None` when networking is unavailable; the reason is logged.
async fn connect_network(
    config: &AppConfig,
    relay: &Arc<MessageRelay>,
) -> anyhow::Result<Option<ConnectionManager>> {
    let network = config.network.clone();
    let sink: Arc<dyn PeerEventSink> = Arc::clone(relay) as Arc<dyn PeerEventSink>;

    // Bind/connect can block for the whole connect timeout.
    let (mut manager, result) = tokio::task::spawn_blocking(move || {
        let mut manager = ConnectionManager::new(network.manager_config(), sink);
        let result = match network.role {
            PeerRoleSetting::Host => manager.initialize_host(network.port),
            PeerRoleSetting::Client => {
                manager.initialize_client(&network.host_address, network.port)
            }
        };
        (manager, result)
    })
    .await
    .context("network setup task failed")?;

    if let Err(e) = result {
        error!("networking disabled, drawing stays local: {e}");
        return Ok(None);
    }
    if let Err(e) = manager.start() {
        error!("could not start networking, drawing stays local: {e}");
        return Ok(None);
    }
    Ok(Some(manager))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load(&cli)?;
    cli.apply(&mut config);

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.peer.log_level)),
        )
        .init();

    info!(
        "LinkVue peer starting as {:?} on port {}",
        config.network.role, config.network.port
    );

    let relay = Arc::new(MessageRelay::new());
    let document = Document::with_history_limit(config.session.history_limit);
    let mut session = SyncSession::new(document, Arc::clone(&relay));

    if let Some(manager) = connect_network(&config, &relay).await? {
        session.attach(Box::new(manager));
    }

    let mut ticker = tokio::time::interval(config.session.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut was_online = session.is_online();
    info!("LinkVue peer ready.  Press Ctrl-C to exit.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Publishing may block on socket backpressure.
                let report = tokio::task::block_in_place(|| session.tick());
                if report.drained.rejected > 0 {
                    warn!("{} malformed snapshot(s) discarded", report.drained.rejected);
                }
                if report.drained.applied > 0 || report.published {
                    let doc = session.document();
                    info!(
                        "document now has {} stroke(s) (revision {}, {} peer(s))",
                        doc.strokes().len(),
                        doc.revision(),
                        relay.connected_peers()
                    );
                }

                let online = session.is_online();
                if was_online && !online {
                    warn!("network session ended; continuing offline");
                }
                was_online = online;
            }
            result = &mut shutdown => {
                match result {
                    Ok(()) => info!("shutdown signal received"),
                    Err(e) => error!("failed to listen for Ctrl-C: {e}"),
                }
                break;
            }
        }
    }

    tokio::task::block_in_place(|| session.shutdown());
    info!("LinkVue peer stopped");
    Ok(())
}
