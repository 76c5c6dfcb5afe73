//! MogileFS Rust Client
//!
//! Main client struct for storing, fetching and deleting keyed files.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::admin::Admin;
use crate::catalog;
use crate::errors::{MogileError, Result, ERR_NONE_MATCH, ERR_UNKNOWN_KEY};
use crate::operations::Operations;
use crate::transfer::{HttpTransfer, Transfer};
use crate::types::*;

/// MogileFS client for file operations in one domain
///
/// Tracker requests go through a shared pool with failover; file content
/// moves over HTTP to the storage URLs the trackers hand out.
///
/// # Example
///
/// ```no_run
/// use mogilefs::{Client, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::new(vec!["10.0.0.1:7001".to_string()], "photos");
///     let client = Client::new(config)?;
///
///     client.store_file(&b"hello"[..], "greeting", None, "default").await?;
///     let data = client.get_file("greeting", "default").await?;
///     client.delete_file("greeting").await?;
///
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct Client<T = HttpTransfer> {
    domain: String,
    ops: Arc<Operations>,
    transfer: T,
}

impl Client<HttpTransfer> {
    /// Creates a new client that talks HTTP to storage nodes
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transfer = HttpTransfer::new(Duration::from_millis(config.http_timeout))?;
        Self::with_transfer(config, transfer)
    }
}

impl<T: Transfer> Client<T> {
    /// Creates a new client with a custom storage transfer
    pub fn with_transfer(config: ClientConfig, transfer: T) -> Result<Self> {
        if config.domain.is_empty() {
            return Err(MogileError::InvalidArgument("Domain is required".to_string()));
        }
        let ops = Operations::new(&config)?;
        Ok(Self {
            domain: config.domain,
            ops,
            transfer,
        })
    }

    /// Domain this client works in
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Admin handle sharing this client's trackers
    pub fn admin(&self) -> Admin {
        Admin::from_ops(self.ops.clone())
    }

    /// Trackers currently skipped because they failed lately
    pub async fn failed_trackers(&self) -> Vec<String> {
        self.ops.pool().recently_failed().await
    }

    /// Returns the storage URLs holding `key`
    pub async fn get_paths(&self, key: &str, options: &GetPathsOptions) -> Result<PathList> {
        let args = Args::new()
            .arg("domain", self.domain.as_str())
            .arg("key", key)
            .arg("noverify", options.noverify)
            .arg("zone", options.zone.as_str())
            .arg("pathcount", options.pathcount);
        self.ops
            .execute(&catalog::GET_PATHS, args)
            .await?
            .into_paths()
    }

    /// Fetches the content of `key`
    ///
    /// Locations are tried in the order the tracker ranked them; the first
    /// one that answers wins.
    pub async fn get_file(&self, key: &str, zone: &str) -> Result<Bytes> {
        let options = GetPathsOptions {
            zone: zone.to_string(),
            ..Default::default()
        };
        let not_found = || MogileError::FileNotFound {
            domain: self.domain.clone(),
            key: key.to_string(),
        };
        let paths = match self.get_paths(key, &options).await {
            Ok(paths) => paths,
            Err(e) if e.tracker_code() == Some(ERR_UNKNOWN_KEY) => return Err(not_found()),
            Err(e) => return Err(e),
        };
        if paths.paths.is_empty() {
            return Err(not_found());
        }

        for (idx, url) in &paths.paths {
            match self.transfer.get(url).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!("Get file from the url in idx {} failed, trying another one: {}", idx, e);
                }
            }
        }

        Err(MogileError::NoUsableLocation {
            key: key.to_string(),
            operation: "get".to_string(),
        })
    }

    /// Stores `data` under `key`
    ///
    /// Asks a tracker for destinations, writes to the first one that accepts
    /// the upload and then reports the location back with `create_close` so
    /// the tracker can replicate it.
    pub async fn store_file(
        &self,
        data: impl Into<Bytes>,
        key: &str,
        class: Option<&str>,
        zone: &str,
    ) -> Result<StoredFile> {
        let data: Bytes = data.into();
        let args = Args::new()
            .arg("domain", self.domain.as_str())
            .arg("key", key)
            .arg("fid", 0u64)
            .arg("multi_dest", 1u32)
            .arg("zone", zone)
            .arg_opt("class", class);
        let open = self
            .ops
            .execute(&catalog::CREATE_OPEN, args)
            .await?
            .into_open()?;
        debug!("Tracker offered {} destinations for fid {}", open.paths.len(), open.fid);

        for (idx, path) in &open.paths {
            let devid = *open
                .devids
                .get(idx)
                .ok_or_else(|| MogileError::malformed(format!("devid_{}", idx), "missing required key"))?;

            if let Err(e) = self.transfer.put(path, data.clone()).await {
                warn!("Put file to the url in idx {} failed, trying another one: {}", idx, e);
                continue;
            }

            let length = data.len() as u64;
            let args = Args::new()
                .arg("fid", open.fid.as_str())
                .arg("domain", self.domain.as_str())
                .arg("key", key)
                .arg("path", path.as_str())
                .arg("devid", devid)
                .arg("size", length)
                .arg("zone", zone)
                .arg_opt("class", class);
            self.ops.execute(&catalog::CREATE_CLOSE, args).await?;

            return Ok(StoredFile {
                path: path.clone(),
                length,
            });
        }

        Err(MogileError::NoUsableLocation {
            key: key.to_string(),
            operation: "put".to_string(),
        })
    }

    /// Stores the content of a local file under `key`
    pub async fn store_path(
        &self,
        local_filename: impl AsRef<Path>,
        key: &str,
        class: Option<&str>,
        zone: &str,
    ) -> Result<StoredFile> {
        let data = tokio::fs::read(local_filename).await?;
        self.store_file(data, key, class, zone).await
    }

    /// Deletes `key`
    pub async fn delete_file(&self, key: &str) -> Result<()> {
        let args = Args::new().arg("domain", self.domain.as_str()).arg("key", key);
        self.ops.execute(&catalog::DELETE, args).await?;
        Ok(())
    }

    /// Renames `from_key` to `to_key`
    pub async fn rename_file(&self, from_key: &str, to_key: &str) -> Result<()> {
        let args = Args::new()
            .arg("domain", self.domain.as_str())
            .arg("from_key", from_key)
            .arg("to_key", to_key);
        self.ops.execute(&catalog::RENAME, args).await?;
        Ok(())
    }

    /// Lists keys, optionally under a prefix and after a cursor
    ///
    /// A listing that matches nothing yields an empty page rather than an
    /// error.
    pub async fn list_keys(&self, prefix: Option<&str>, after: Option<&str>, limit: Option<u32>) -> Result<KeyList> {
        let args = Args::new()
            .arg("domain", self.domain.as_str())
            .arg_opt("prefix", prefix)
            .arg_opt("after", after)
            .arg_opt("limit", limit);

        match self.ops.execute(&catalog::LIST_KEYS, args).await {
            Ok(data) => Ok(data.into_keys()?.unwrap_or_default()),
            Err(e) if e.tracker_code() == Some(ERR_NONE_MATCH) => Ok(KeyList::default()),
            Err(e) => Err(e),
        }
    }

    /// Closes the client and its tracker connections
    ///
    /// After calling close, all operations return `ClientClosed`.
    /// It's safe to call close multiple times.
    pub async fn close(&self) {
        self.ops.close().await;
    }
}
