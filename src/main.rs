use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use clap::{ArgAction, Parser};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use drive_photo_frame::config::Configuration;
use drive_photo_frame::connectivity::{ConnectivityProbe, FixedProbe, TcpProbe};
use drive_photo_frame::events::NavigationEvent;
use drive_photo_frame::remote::{
    DriveClient, RemoteCatalog, RemoteContainer, RemoteError, RemoteListing,
};
use drive_photo_frame::tasks::{keys, manager, settings, viewer};

#[derive(Debug, Parser)]
#[command(
    name = "photo-frame",
    version,
    about = "Slideshow over a mirrored Google Drive folder"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Show the local mirror only; never contact Drive
    #[arg(long)]
    offline: bool,
    /// Deterministic RNG seed for shuffling
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Pin photos whose name or description contains this text to the front
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("info,drive_photo_frame=debug,photo_frame=debug"),
        _ => EnvFilter::new("info,drive_photo_frame=trace,photo_frame=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        offline,
        seed,
        search,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;
    if let Some(query) = search {
        cfg.defaults.search_query = Some(query);
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::info!(
        library = %cfg.photo_library_path.display(),
        folder = %cfg.remote_folder_id,
        "loaded configuration from {}",
        config.display()
    );
    tracing::debug!("slideshow defaults: {:#?}", cfg.defaults);

    let (catalog, probe): (Arc<dyn RemoteCatalog>, Arc<dyn ConnectivityProbe>) = if offline {
        tracing::info!("offline mode; showing the local mirror only");
        (Arc::new(OfflineCatalog), Arc::new(FixedProbe(false)))
    } else {
        let tokens = cfg.drive.token_source()?;
        let client = DriveClient::new(tokens, cfg.drive.request_timeout, cfg.drive.download_timeout)
            .context("failed to build Drive client")?;
        let probe = TcpProbe::new(cfg.connectivity.probe_address.clone(), cfg.connectivity.timeout);
        (Arc::new(client), Arc::new(probe))
    };

    let mut effective = cfg.defaults.clone();
    let mut settings_container = None;
    if !offline {
        match settings::bootstrap(catalog.as_ref(), &cfg.remote_folder_id, &cfg.defaults).await {
            Ok((container, resolved)) => {
                settings_container = Some(container);
                effective = resolved;
            }
            Err(err) => tracing::warn!("remote settings unavailable; using defaults: {err}"),
        }
    }

    let cancel = CancellationToken::new();
    let (key_tx, key_rx) = mpsc::channel::<NavigationEvent>(16); // Keys -> Renderer

    // Ctrl-D/Ctrl-C cancel the slideshow
    if io::stdin().is_terminal() {
        let cancel = cancel.clone();
        let key_tx = key_tx.clone();
        tokio::spawn(async move {
            keys::run(BufReader::new(tokio::io::stdin()), key_tx, cancel).await;
        });
    } else {
        tracing::debug!("stdin is not a terminal; keyboard navigation disabled");
    }

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let key_tx = key_tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::user_defined1()) {
                Ok(mut sigusr1) => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = sigusr1.recv() => {
                            if received.is_none() {
                                break;
                            }
                            tracing::info!("SIGUSR1 received; checking for new photos");
                            if let Err(err) = key_tx.send(NavigationEvent::New).await {
                                tracing::warn!("failed to forward refresh request: {err}");
                            }
                        }
                    }
                },
                Err(err) => tracing::warn!("failed to install SIGUSR1 handler: {err}"),
            }
        });
    }
    drop(key_tx);

    let mut renderer = viewer::renderer_for(
        effective.display_mode,
        Box::new(io::stdout()),
        key_rx,
        cancel.clone(),
    );
    let ctx = manager::FrameContext {
        config: cfg,
        catalog,
        probe,
        settings_container,
    };
    manager::run(ctx, effective, renderer.as_mut(), cancel.clone(), seed)
        .await
        .context("slideshow failed")?;
    cancel.cancel();
    Ok(())
}

/// Catalog for `--offline`; the probe keeps the loop from ever calling it.
struct OfflineCatalog;

#[async_trait]
impl RemoteCatalog for OfflineCatalog {
    async fn list_items(
        &self,
        _folder_id: &str,
        _recursive: bool,
        _exclude_names: &[&str],
    ) -> Result<Vec<RemoteListing>, RemoteError> {
        Err(offline_error())
    }

    async fn fetch(&self, _id: &str) -> Result<Bytes, RemoteError> {
        Err(offline_error())
    }

    async fn list_containers(
        &self,
        _parent_id: &str,
    ) -> Result<Vec<RemoteContainer>, RemoteError> {
        Err(offline_error())
    }

    async fn create_container(
        &self,
        _name: &str,
        _parent_id: &str,
    ) -> Result<RemoteContainer, RemoteError> {
        Err(offline_error())
    }
}

fn offline_error() -> RemoteError {
    RemoteError::Network("offline mode".into())
}
