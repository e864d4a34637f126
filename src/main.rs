//! dweb-cache - Cache-first fetching of dweb resolver manifests
//!
//! Hosts a `ManifestInterceptor` over a named on-disk cache store: requests
//! for `/manifests/` resources are served from the store when possible and
//! stored after a successful fetch, everything else goes straight to the
//! network. Also offers maintenance commands for the store.

use std::io::{self, Write};

use clap::Parser;
use futures::future::join_all;

use dweb_cache::cache::{CacheManager, CacheStore, DiskStore, StoreError};
use dweb_cache::cli::{parse_url_arg, write_served, Cli, CliError, Command};
use dweb_cache::config::HostConfig;
use dweb_cache::data::{HttpFetcher, ManifestRequest};
use dweb_cache::interceptor::ManifestInterceptor;
use dweb_cache::logging;
use dweb_cache::registration::Registration;

/// Resolves the cache manager from configuration
fn cache_manager(config: &HostConfig) -> Result<CacheManager, StoreError> {
    match &config.cache_dir {
        Some(dir) => Ok(CacheManager::with_dir(dir.clone())),
        None => CacheManager::new().ok_or(StoreError::Unavailable),
    }
}

/// Routes every URL through the interceptor concurrently and prints the results
async fn run_fetch(
    config: &HostConfig,
    store: DiskStore,
    urls: &[String],
    status_only: bool,
) -> Result<(), CliError> {
    let requests = urls
        .iter()
        .map(|url| parse_url_arg(url))
        .collect::<Result<Vec<ManifestRequest>, CliError>>()?;

    let network = match config.request_timeout {
        Some(timeout) => HttpFetcher::with_timeout(timeout)?,
        None => HttpFetcher::new(),
    };

    let registration = Registration::new();
    let interceptor =
        ManifestInterceptor::with_config(store, network.clone(), config.interceptor.clone());
    registration.register(interceptor).await;
    let client = registration.open_client();

    let results = join_all(
        requests
            .iter()
            .map(|request| registration.fetch(client, request, &network)),
    )
    .await;

    let mut failed = 0;
    let mut stdout = io::stdout().lock();
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(served) => write_served(&mut stdout, request, &served, status_only)?,
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", request.url, e);
            }
        }
    }
    stdout.flush()?;

    registration.close_client(client);

    if failed > 0 {
        return Err(CliError::FetchesFailed(failed, requests.len()));
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = HostConfig::from_cli(&cli);
    let manager = cache_manager(&config)?;
    let store_name = config.interceptor.store_name.as_str();

    match &cli.command {
        Command::Fetch { urls, status } => {
            let store = manager.open(store_name)?;
            run_fetch(&config, store, urls, *status).await
        }
        Command::List => {
            let store = manager.open(store_name)?;
            for key in store.keys().await? {
                println!("{}", key);
            }
            Ok(())
        }
        Command::Evict { url } => {
            let request = parse_url_arg(url)?;
            let store = manager.open(store_name)?;
            if store.delete(&request.key()).await? {
                println!("evicted {}", request.key());
            } else {
                println!("not cached: {}", request.key());
            }
            Ok(())
        }
        Command::Stores => {
            for name in manager.names().await? {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Clear => {
            if manager.delete(store_name).await? {
                println!("deleted store {}", store_name);
            } else {
                println!("store {} does not exist", store_name);
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    run(cli).await?;
    Ok(())
}
