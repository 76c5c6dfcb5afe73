//! MogileFS Tracker Administration
//!
//! Host, domain, class and device management over the tracker protocol.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog;
use crate::errors::Result;
use crate::operations::Operations;
use crate::types::{Args, ClientConfig, DomainEntry, Fields};

/// Administrative interface to the trackers
///
/// Obtained from `Client::admin` to share the client's tracker pool, or
/// built on its own with `Admin::new`.
#[derive(Clone)]
pub struct Admin {
    ops: Arc<Operations>,
}

impl Admin {
    /// Creates an admin handle with its own tracker pool
    ///
    /// The configured domain is not used by admin commands.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            ops: Operations::new(&config)?,
        })
    }

    pub(crate) fn from_ops(ops: Arc<Operations>) -> Self {
        Self { ops }
    }

    /// Lists all hosts, keyed by host index
    pub async fn get_hosts(&self) -> Result<BTreeMap<u32, Fields>> {
        self.ops
            .execute(&catalog::GET_HOSTS, Args::new())
            .await?
            .into_hosts()
    }

    /// Registers a storage host
    pub async fn create_host(&self, host: &str, ip: &str, port: u16) -> Result<Fields> {
        let args = Args::new().arg("host", host).arg("ip", ip).arg("port", port);
        self.ops.execute(&catalog::CREATE_HOST, args).await?.into_host()
    }

    /// Changes the address of a storage host
    pub async fn update_host(&self, host: &str, ip: &str, port: u16) -> Result<Fields> {
        let args = Args::new().arg("host", host).arg("ip", ip).arg("port", port);
        self.ops.execute(&catalog::UPDATE_HOST, args).await?.into_host()
    }

    /// Removes a storage host
    pub async fn delete_host(&self, host: &str) -> Result<()> {
        self.ops
            .execute(&catalog::DELETE_HOST, Args::new().arg("host", host))
            .await?;
        Ok(())
    }

    /// Lists domains and their classes
    pub async fn get_domains(&self) -> Result<BTreeMap<u32, DomainEntry>> {
        self.ops
            .execute(&catalog::GET_DOMAINS, Args::new())
            .await?
            .into_domains()
    }

    /// Creates a domain
    pub async fn create_domain(&self, domain: &str) -> Result<()> {
        self.ops
            .execute(&catalog::CREATE_DOMAIN, Args::new().arg("domain", domain))
            .await?;
        Ok(())
    }

    /// Deletes a domain
    pub async fn delete_domain(&self, domain: &str) -> Result<()> {
        self.ops
            .execute(&catalog::DELETE_DOMAIN, Args::new().arg("domain", domain))
            .await?;
        Ok(())
    }

    /// Creates a class in a domain
    pub async fn create_class(&self, domain: &str, class: &str, mindevcount: u32) -> Result<()> {
        let args = Args::new()
            .arg("domain", domain)
            .arg("class", class)
            .arg("mindevcount", mindevcount);
        self.ops.execute(&catalog::CREATE_CLASS, args).await?;
        Ok(())
    }

    /// Changes the replica count of a class
    pub async fn update_class(&self, domain: &str, class: &str, mindevcount: u32) -> Result<()> {
        let args = Args::new()
            .arg("domain", domain)
            .arg("class", class)
            .arg("mindevcount", mindevcount);
        self.ops.execute(&catalog::UPDATE_CLASS, args).await?;
        Ok(())
    }

    /// Deletes a class
    pub async fn delete_class(&self, domain: &str, class: &str) -> Result<()> {
        let args = Args::new().arg("domain", domain).arg("class", class);
        self.ops.execute(&catalog::DELETE_CLASS, args).await?;
        Ok(())
    }

    /// Lists all devices, keyed by device index as sent by the tracker
    pub async fn get_devices(&self) -> Result<BTreeMap<String, Fields>> {
        self.ops
            .execute(&catalog::GET_DEVICES, Args::new())
            .await?
            .into_devices()
    }

    /// Registers a device on a host
    pub async fn create_device(&self, hostname: &str, devid: u32, hostip: &str, state: &str) -> Result<()> {
        let args = Args::new()
            .arg("hostname", hostname)
            .arg("devid", devid)
            .arg("hostip", hostip)
            .arg("state", state);
        self.ops.execute(&catalog::CREATE_DEVICE, args).await?;
        Ok(())
    }

    /// Sets a device state (`alive`, `down`, `dead`, ...)
    pub async fn set_state(&self, host: &str, device: u32, state: &str) -> Result<()> {
        let args = Args::new()
            .arg("host", host)
            .arg("device", device)
            .arg("state", state);
        self.ops.execute(&catalog::SET_STATE, args).await?;
        Ok(())
    }

    /// Sets a device weight
    pub async fn set_weight(&self, host: &str, device: u32, weight: u32) -> Result<()> {
        let args = Args::new()
            .arg("host", host)
            .arg("device", device)
            .arg("weight", weight);
        self.ops.execute(&catalog::SET_WEIGHT, args).await?;
        Ok(())
    }

    /// Closes the shared tracker pool
    pub async fn close(&self) {
        self.ops.close().await;
    }
}
