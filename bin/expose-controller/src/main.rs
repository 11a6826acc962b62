use anyhow::{Context, Result};
use clap::Parser;
use expose_core::{ConfigSet, MemoryStore, ReconcileEngine, ResourceStore};
use expose_kube::{DeploymentWatcher, KubeStore};
use futures::StreamExt;
use kube::Client;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod queue;

use cli::ControllerArgs;
use queue::WorkQueue;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ControllerArgs::parse();
    init_tracing(args.log_json);

    info!("Starting expose-controller...");

    let config = args.config_set();
    config.validate().context("Invalid configuration")?;
    config.log_summary();

    let client = Client::try_default()
        .await
        .context("Failed to build Kubernetes client")?;
    let kube_store = KubeStore::new(client.clone());
    let version = kube_store
        .check_connection()
        .await
        .context("Kubernetes API server is unreachable")?;
    info!("Connected to Kubernetes API server {}", version);

    let config = Arc::new(config);
    if args.dry_run {
        warn!("Dry run: Services and Ingresses are kept in memory only");
        run(client, config, Arc::new(MemoryStore::new()), args.workers).await
    } else {
        run(client, config, Arc::new(kube_store), args.workers).await
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run<S: ResourceStore + 'static>(
    client: Client,
    config: Arc<ConfigSet>,
    store: Arc<S>,
    workers: usize,
) -> Result<()> {
    let engine = Arc::new(ReconcileEngine::new(config, store));
    let mut queue = WorkQueue::new(engine, workers);
    info!("Reconciling with {} workers", workers.max(1));

    let events = DeploymentWatcher::new(client).events();
    futures::pin_mut!(events);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signals: {}", e);
                }
                break;
            }
            event = events.next() => match event {
                Some(event) => queue.push(event).await?,
                None => {
                    warn!("Deployment watch stream ended");
                    break;
                }
            },
        }
    }

    info!("Shutting down, finishing queued work...");
    queue.shutdown().await;
    info!("expose-controller stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() -> Result<()> {
    let terminate = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate())?;
            sigterm.recv().await;
            Ok::<(), anyhow::Error>(())
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
            Ok::<(), anyhow::Error>(())
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT");
            result.map_err(anyhow::Error::from)
        }
        result = terminate => {
            info!("Received SIGTERM");
            result
        }
    }
}
