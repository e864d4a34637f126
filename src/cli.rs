//! Command-line interface parsing for dweb-cache
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! the host configuration used by `main`.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Url;
use thiserror::Error;

use crate::cache::StoreError;
use crate::config::{HostConfig, InterceptorConfig};
use crate::data::{FetchError, ManifestRequest, DEFAULT_STORE_NAME};
use crate::interceptor::{ResponseSource, Served};

/// Error types for the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// A URL argument could not be parsed
    #[error("Invalid URL: '{0}'. Expected an absolute http(s) URL")]
    InvalidUrl(String),

    /// The cache store could not be opened or modified
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The HTTP client could not be built
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// One or more fetches failed
    #[error("{0} of {1} fetches failed")]
    FetchesFailed(usize, usize),

    /// Output could not be written
    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// dweb-cache - Cache-first fetching of dweb resolver manifests
#[derive(Parser, Debug)]
#[command(name = "dweb-cache")]
#[command(about = "Cache-first fetching of dweb resolver manifests")]
#[command(version)]
pub struct Cli {
    /// Directory holding the cache stores (defaults to the XDG cache directory)
    #[arg(long, global = true, env = "DWEB_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Name of the cache store
    #[arg(long, global = true, env = "DWEB_CACHE_STORE", default_value = DEFAULT_STORE_NAME)]
    pub store: String,

    /// Give up on network requests after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch URLs through the cache-first interceptor and print their bodies
    Fetch {
        /// URLs to fetch; manifest URLs are served from and stored in the cache
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Print status and source instead of the body
        #[arg(long)]
        status: bool,
    },
    /// List the request identities held in the store
    List,
    /// Remove the stored response for a URL
    Evict {
        /// URL whose cached response should be removed
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Delete the whole store
    Clear,
    /// List the stores present in the cache directory
    Stores,
}

/// Parses a URL argument into a GET request
///
/// # Returns
/// * `Ok(ManifestRequest)` for an absolute http or https URL
/// * `Err(CliError::InvalidUrl)` otherwise
pub fn parse_url_arg(s: &str) -> Result<ManifestRequest, CliError> {
    let url = Url::parse(s).map_err(|_| CliError::InvalidUrl(s.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CliError::InvalidUrl(s.to_string()));
    }
    Ok(ManifestRequest::get(url))
}

/// Writes one served response to `out`
///
/// With `status_only` this is a `<status> <source> <url>` line; otherwise the
/// body, newline-terminated.
pub fn write_served<W: Write>(
    out: &mut W,
    request: &ManifestRequest,
    served: &Served,
    status_only: bool,
) -> io::Result<()> {
    if status_only {
        let source = match served.source {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
        };
        return writeln!(out, "{} {} {}", served.response.status, source, request.url);
    }

    out.write_all(&served.response.body)?;
    if !served.response.body.ends_with(b"\n") {
        writeln!(out)?;
    }
    Ok(())
}

impl HostConfig {
    /// Creates a HostConfig from parsed CLI arguments
    pub fn from_cli(cli: &Cli) -> Self {
        HostConfig {
            interceptor: InterceptorConfig {
                store_name: cli.store.clone(),
                ..InterceptorConfig::default()
            },
            cache_dir: cli.cache_dir.clone(),
            request_timeout: cli.timeout_secs.map(Duration::from_secs),
        }
    }
}
