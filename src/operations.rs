//! MogileFS Operations
//!
//! Shared request path for the file client and the admin interface:
//! builds a `Request`, dispatches it through the tracker pool and hands back
//! the decoded result.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{CommandSpec, Request};
use crate::errors::{MogileError, Result};
use crate::pool::TrackerPool;
use crate::types::{Args, ClientConfig, ResponseData};

/// Tracker pool plus the closed flag shared by `Client` and `Admin`
///
/// This struct is used internally.
pub(crate) struct Operations {
    pool: TrackerPool,
    closed: RwLock<bool>,
}

impl Operations {
    /// Validates the configuration and builds the tracker pool
    pub(crate) fn new(config: &ClientConfig) -> Result<Arc<Self>> {
        let endpoints = config.validate()?;
        let pool = TrackerPool::new(endpoints, config.pool_config())?;
        Ok(Arc::new(Self {
            pool,
            closed: RwLock::new(false),
        }))
    }

    pub(crate) fn pool(&self) -> &TrackerPool {
        &self.pool
    }

    async fn check_closed(&self) -> Result<()> {
        if *self.closed.read().await {
            return Err(MogileError::ClientClosed);
        }
        Ok(())
    }

    /// Runs one tracker command
    pub(crate) async fn execute(&self, spec: &'static CommandSpec, args: Args) -> Result<ResponseData> {
        self.check_closed().await?;
        let response = self.pool.dispatch(&Request::new(spec, args)).await?;
        Ok(response.data)
    }

    /// Marks the operations closed and drops every tracker socket
    ///
    /// Safe to call more than once.
    pub(crate) async fn close(&self) {
        let mut closed = self.closed.write().await;
        if *closed {
            return;
        }
        *closed = true;
        drop(closed);

        self.pool.close().await;
    }
}
