//! MogileFS Tracker Pool
//!
//! Holds one connection per tracker, each annotated with the time it last
//! proved unusable. Requests go to a randomly chosen tracker that has not
//! failed within the forgiveness window; transport failures blacklist the
//! tracker and the request moves on to another draw.
//!
//! Random sampling is the load-balancing policy. The same tracker can be
//! drawn more than once during one dispatch before others are tried; strict
//! fairness is traded for simplicity.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::catalog::{Request, Response};
use crate::connection::TrackerConnection;
use crate::errors::{MogileError, Result};
use crate::types::{PoolConfig, TrackerEndpoint};

/// Picks the index of a tracker eligible for use
///
/// `failures[i]` is the time tracker `i` last failed, `None` if it never did.
/// A tracker is eligible when it never failed or when at least `window` has
/// passed since its failure. Up to `max_attempts` uniform draws are made
/// before giving up with `PoolExhausted`.
pub fn select_candidate<R>(
    failures: &[Option<Instant>],
    now: Instant,
    window: Duration,
    max_attempts: usize,
    rng: &mut R,
) -> Result<usize>
where
    R: Rng + ?Sized,
{
    if failures.is_empty() {
        return Err(MogileError::PoolExhausted);
    }

    for _ in 0..max_attempts {
        let idx = rng.random_range(0..failures.len());
        match failures[idx] {
            None => return Ok(idx),
            Some(failed_at) if now.saturating_duration_since(failed_at) >= window => return Ok(idx),
            Some(_) => continue,
        }
    }

    Err(MogileError::PoolExhausted)
}

struct TrackerSlot {
    addr: String,
    conn: Mutex<TrackerConnection>,
    last_failed_at: Mutex<Option<Instant>>,
}

/// Pool of tracker connections with failover
///
/// Trackers are never removed; a failure only keeps a tracker out of
/// selection until the forgiveness window has passed. Each connection is
/// locked for the duration of one attempt, so the pool can be shared
/// between tasks.
pub struct TrackerPool {
    slots: Vec<TrackerSlot>,
    config: PoolConfig,
    rng: Mutex<StdRng>,
}

impl TrackerPool {
    /// Creates a pool with one disconnected connection per distinct tracker
    pub fn new(endpoints: Vec<TrackerEndpoint>, config: PoolConfig) -> Result<Self> {
        Self::with_rng(endpoints, config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates a pool drawing trackers from `rng`
    ///
    /// With a seeded generator the order in which trackers are tried is
    /// reproducible.
    pub fn with_rng(endpoints: Vec<TrackerEndpoint>, config: PoolConfig, rng: StdRng) -> Result<Self> {
        let mut slots: Vec<TrackerSlot> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let addr = endpoint.to_string();
            if slots.iter().any(|slot| slot.addr == addr) {
                continue;
            }
            slots.push(TrackerSlot {
                addr,
                conn: Mutex::new(TrackerConnection::new(
                    endpoint,
                    config.connect_timeout,
                    config.network_timeout,
                )),
                last_failed_at: Mutex::new(None),
            });
        }

        if slots.is_empty() {
            return Err(MogileError::InvalidArgument(
                "Tracker addresses are required".to_string(),
            ));
        }

        Ok(Self {
            slots,
            config,
            rng: Mutex::new(rng),
        })
    }

    /// Number of trackers in the pool
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; a pool holds at least one tracker
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Addresses of all trackers, in configuration order
    pub fn addrs(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.addr.clone()).collect()
    }

    /// Addresses of trackers currently excluded from selection
    pub async fn recently_failed(&self) -> Vec<String> {
        let now = Instant::now();
        let mut failed = Vec::new();
        for slot in &self.slots {
            if let Some(failed_at) = *slot.last_failed_at.lock().await {
                if now.saturating_duration_since(failed_at) < self.config.forgiveness_window {
                    failed.push(slot.addr.clone());
                }
            }
        }
        failed
    }

    /// Chooses a tracker not failed lately
    pub async fn select(&self) -> Result<usize> {
        let failures = self.failure_snapshot().await;
        let mut rng = self.rng.lock().await;
        select_candidate(
            &failures,
            Instant::now(),
            self.config.forgiveness_window,
            self.config.max_select_attempts,
            &mut *rng,
        )
    }

    /// Sends a request to a healthy tracker
    ///
    /// Makes up to `min(max_retries, tracker count)` attempts. Connect, probe
    /// and send failures on the transport blacklist the tracker and use up
    /// one attempt. A tracker `ERR` reply or an undecodable response ends the
    /// dispatch at once.
    pub async fn dispatch(&self, request: &Request) -> Result<Response> {
        let max_try = self.config.max_retries.min(self.slots.len());

        for attempt in 0..max_try {
            let idx = self.select().await?;
            let slot = &self.slots[idx];
            debug!(
                "Try #{}/{} of {} using tracker {}",
                attempt + 1,
                max_try,
                request.spec().name,
                slot.addr
            );

            let mut conn = slot.conn.lock().await;

            // A reply to a cancelled request may still be queued on the socket
            if conn.is_interrupted() {
                debug!("Dropping connection to tracker {} left mid-request", slot.addr);
                conn.close();
            }

            if !conn.is_connected() {
                if let Err(e) = conn.connect().await {
                    warn!("Connecting to tracker {} failed: {}", slot.addr, e);
                    self.mark_failed(idx).await;
                    continue;
                }
            }

            if let Err(e) = conn.probe().await {
                warn!("Tracker {} failed noop probe: {}", slot.addr, e);
                self.mark_failed(idx).await;
                conn.close();
                continue;
            }

            match conn.send(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transport() => {
                    warn!("Sending {} to tracker {} failed: {}", request.spec().name, slot.addr, e);
                    self.mark_failed(idx).await;
                    conn.close();
                }
                Err(e) => return Err(e),
            }
        }

        Err(MogileError::NoUsableTracker { attempts: max_try })
    }

    /// Closes every tracker socket
    pub async fn close(&self) {
        for slot in &self.slots {
            slot.conn.lock().await.close();
        }
    }

    async fn failure_snapshot(&self) -> Vec<Option<Instant>> {
        let mut failures = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            failures.push(*slot.last_failed_at.lock().await);
        }
        failures
    }

    async fn mark_failed(&self, idx: usize) {
        *self.slots[idx].last_failed_at.lock().await = Some(Instant::now());
    }
}
