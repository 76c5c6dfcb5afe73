//! MogileFS Rust Client Library
//!
//! Async Rust client for the MogileFS distributed file system.
//! Talks the tracker's line protocol to locate, store, fetch and delete
//! keyed files, and moves file content to storage nodes over HTTP.
//!
//! # Features
//!
//! - Store, fetch, rename, delete and list keyed files
//! - Host, domain, class and device administration
//! - Tracker pool with random load balancing and time-boxed blacklisting
//! - Async/await support with Tokio
//! - Typed decoding of every tracker response
//!
//! # Example
//!
//! ```no_run
//! use mogilefs::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(
//!         vec!["10.0.0.1:7001".to_string(), "10.0.0.2:7001".to_string()],
//!         "photos",
//!     );
//!     let client = Client::new(config)?;
//!
//!     let stored = client.store_file(&b"Hello, MogileFS!"[..], "hello.txt", None, "default").await?;
//!     println!("stored {} bytes at {}", stored.length, stored.path);
//!
//!     let data = client.get_file("hello.txt", "default").await?;
//!     assert_eq!(&data[..], b"Hello, MogileFS!");
//!
//!     client.delete_file("hello.txt").await?;
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod admin;
pub mod catalog;
mod client;
mod connection;
mod errors;
mod operations;
pub mod pool;
pub mod protocol;
mod transfer;
mod types;

// Re-export public API
pub use admin::Admin;
pub use catalog::{CommandSpec, Request, Response};
pub use client::Client;
pub use connection::TrackerConnection;
pub use errors::{MogileError, Result, ERR_NONE_MATCH, ERR_UNKNOWN_KEY};
pub use pool::TrackerPool;
pub use transfer::{HttpTransfer, Transfer};
pub use types::{
    ArgValue, Args, ClientConfig, DomainEntry, Fields, GetPathsOptions, KeyList, OpenInfo, Pairs,
    PathList, PoolConfig, ResponseData, StoredFile, TrackerEndpoint, DEFAULT_FORGIVENESS_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_SELECT_ATTEMPTS, DEFAULT_TIMEOUT_MS, DEFAULT_ZONE,
    TRACKER_DEFAULT_PORT,
};
