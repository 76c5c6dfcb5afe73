//! In-process fake trackers and storage for the integration tests
//!
//! A `FakeTracker` listens on a loopback port and answers each request line
//! through a handler closure. Returning `None` from the handler hangs up the
//! connection, which the client sees as a transport failure.

#![allow(dead_code)]

use bytes::Bytes;
use mogilefs::{ClientConfig, MogileError, Result, Transfer};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A tracker answering from a closure
pub struct FakeTracker {
    pub addr: String,
    log: Arc<Mutex<Vec<String>>>,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeTracker {
    /// Starts a tracker; the handler sees every line, `noop` included
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self::serve(handler, Duration::ZERO).await
    }

    /// Starts a healthy tracker that holds every command reply for `delay`
    pub async fn slow<F>(delay: Duration, handler: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self::serve(with_noop(handler), delay).await
    }

    async fn serve<F>(handler: F, delay: Duration) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handler = Arc::new(handler);
        let log = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));

        let task = {
            let log = log.clone();
            let accepted = accepted.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let handler = handler.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let (reader, mut writer) = socket.into_split();
                        let mut lines = BufReader::new(reader).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            log.lock().unwrap().push(line.clone());
                            let Some(reply) = handler(&line) else {
                                break;
                            };
                            if line != "noop" && !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            if writer.write_all(reply.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
            })
        };

        Self {
            addr,
            log,
            accepted,
            task,
        }
    }

    /// Starts a tracker that passes `noop` and answers commands with `handler`
    pub async fn healthy<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self::start(with_noop(handler)).await
    }

    /// Every command line received, probes excluded
    pub fn requests(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.as_str() != "noop")
            .cloned()
            .collect()
    }

    /// Number of probes received
    pub fn probes(&self) -> usize {
        self.log.lock().unwrap().iter().filter(|line| line.as_str() == "noop").count()
    }

    /// Number of TCP connections accepted
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for FakeTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn with_noop<F>(handler: F) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    move |line: &str| {
        if line == "noop" {
            Some("OK\r\n".to_string())
        } else {
            handler(line)
        }
    }
}

/// Command name of a request line
pub fn command(line: &str) -> &str {
    line.split(' ').next().unwrap_or("")
}

/// An address nobody listens on
pub async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

/// Client configuration with short timeouts for tests
pub fn test_config(trackers: Vec<String>) -> ClientConfig {
    ClientConfig::new(trackers, "testdomain")
        .with_connect_timeout(1000)
        .with_network_timeout(1000)
}

/// Storage nodes kept in memory
#[derive(Clone, Default)]
pub struct MemoryTransfer {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    broken: Arc<Mutex<HashSet<String>>>,
}

impl MemoryTransfer {
    /// Makes every request to `url` fail
    pub fn break_url(&self, url: &str) {
        self.broken.lock().unwrap().insert(url.to_string());
    }

    /// Places content at `url`
    pub fn insert(&self, url: &str, data: &'static [u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(url.to_string(), Bytes::from_static(data));
    }

    /// Content stored at `url`
    pub fn object(&self, url: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(url).cloned()
    }

    fn check(&self, url: &str) -> Result<()> {
        if self.broken.lock().unwrap().contains(url) {
            return Err(MogileError::Http {
                url: url.to_string(),
                reason: "503 Service Unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl Transfer for MemoryTransfer {
    async fn get(&self, url: &str) -> Result<Bytes> {
        self.check(url)?;
        self.object(url).ok_or_else(|| MogileError::Http {
            url: url.to_string(),
            reason: "404 Not Found".to_string(),
        })
    }

    async fn put(&self, url: &str, body: Bytes) -> Result<()> {
        self.check(url)?;
        self.objects.lock().unwrap().insert(url.to_string(), body);
        Ok(())
    }
}
