//! Grass Coach host - drives the offline cache lifecycle by hand.
//!
//! Each subcommand delivers one lifecycle event to the cache for the
//! configured deployment and waits for it to finish:
//!
//! ```text
//! grasscoach install            populate the current epoch's store
//! grasscoach activate           make the current epoch live, drop old stores
//! grasscoach deploy             install, then activate if install succeeded
//! grasscoach fetch <url> [method]
//!                               answer a request the way the app shell would
//! grasscoach status             list stores in the namespace
//! ```

mod runtime;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use grasscoach_cache::utils::{format_age, format_bytes};
use grasscoach_cache::{CacheConfig, CacheManager, ContentRequest};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use runtime::{EventOutcome, HostRuntime, LifecycleEvent};

// ============================================================================
// Constants
// ============================================================================

/// Directory for an additional daily log file, if set
const LOG_DIR_ENV: &str = "GRASSCOACH_LOG_DIR";

const LOG_FILE_PREFIX: &str = "grasscoach.log";

const USAGE: &str = "usage: grasscoach <install|activate|deploy|fetch <url> [method]|status>";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!(USAGE);
    };

    let config = CacheConfig::load()?;
    let manager = Arc::new(CacheManager::from_config(&config)?);
    info!(
        namespace = manager.namespace(),
        epoch = %config.epoch,
        command,
        "Grass Coach host starting"
    );

    // Pick up a store completed by an earlier run; install re-populates anyway
    if command != "install" && command != "deploy" {
        manager.resume(&config.epoch).await?;
    }

    let runtime = HostRuntime::new(manager.clone(), config.epoch.clone(), config.seed_set.clone());

    match command {
        "install" => install(&runtime).await,
        "activate" => activate(&runtime).await,
        "deploy" => {
            install(&runtime).await?;
            activate(&runtime).await
        }
        "fetch" => {
            let Some(url) = args.get(1) else {
                bail!(USAGE);
            };
            let method = args.get(2).map(String::as_str).unwrap_or("GET");
            fetch(&runtime, ContentRequest::new(method, url.as_str())).await
        }
        "status" => status(&manager).await,
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }
}

async fn install(runtime: &HostRuntime) -> Result<()> {
    if let EventOutcome::Installed(report) =
        runtime.dispatch(LifecycleEvent::Install).wait_until().await?
    {
        eprintln!(
            "Installed {}: {} assets, {}",
            report.store,
            report.entries,
            format_bytes(report.bytes)
        );
    }
    Ok(())
}

async fn activate(runtime: &HostRuntime) -> Result<()> {
    if let EventOutcome::Activated(report) =
        runtime.dispatch(LifecycleEvent::Activate).wait_until().await?
    {
        for name in &report.failed {
            warn!(store = %name, "Superseded store could not be deleted");
        }
        eprintln!(
            "Activated epoch {}: reclaimed {} store(s)",
            runtime.epoch(),
            report.reclaimed_count()
        );
    }
    Ok(())
}

async fn fetch(runtime: &HostRuntime, request: ContentRequest) -> Result<()> {
    if let EventOutcome::Responded(asset) = runtime
        .dispatch(LifecycleEvent::Fetch(request))
        .wait_until()
        .await?
    {
        eprintln!(
            "{} {} ({}, captured {})",
            asset.status,
            asset.content_type().unwrap_or("unknown type"),
            format_bytes(asset.len() as u64),
            format_age(asset.captured_at)
        );
        let mut stdout = io::stdout().lock();
        stdout.write_all(&asset.body)?;
        stdout.flush()?;
    }
    Ok(())
}

async fn status(manager: &CacheManager) -> Result<()> {
    let stores = manager.inventory().await?;
    if stores.is_empty() {
        println!("No content stores in namespace {}", manager.namespace());
        return Ok(());
    }

    for store in stores {
        let marker = if store.current { "*" } else { " " };
        let sealed = match &store.seal {
            Some(seal) => format!("sealed {}", format_age(seal.sealed_at)),
            None => "incomplete".to_string(),
        };
        println!("{} {:<32} {:>4} entries  {}", marker, store.name.as_str(), store.entries, sealed);
    }
    Ok(())
}
