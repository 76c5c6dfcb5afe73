//! MogileFS Protocol Types and Constants
//!
//! This module defines protocol-level constants, request arguments, decoded
//! response shapes and the client configuration.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{MogileError, Result};

/// Default port a MogileFS tracker listens on
pub const TRACKER_DEFAULT_PORT: u16 = 7001;

/// Line terminator for requests and responses
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Liveness probe, written without the argument separator
pub const NOOP_REQUEST: &[u8] = b"noop\r\n";

/// Size of a single socket read
pub const READ_CHUNK_SIZE: usize = 4096;

/// Default connect and read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Default time a failed tracker is kept out of selection, in milliseconds
pub const DEFAULT_FORGIVENESS_MS: u64 = 5 * 60 * 1000;

/// Default upper bound of dispatch attempts
pub const DEFAULT_MAX_RETRIES: usize = 5;

/// Default number of random draws before giving up on selection
pub const DEFAULT_MAX_SELECT_ATTEMPTS: usize = 1000;

/// Default zone sent with path and store requests
pub const DEFAULT_ZONE: &str = "default";

/// Flat key/value mapping carried by an `OK` response
pub type Pairs = HashMap<String, String>;

/// Field name to value mapping for one host, device or class
pub type Fields = HashMap<String, String>;

/// Address of one tracker process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerEndpoint {
    host: String,
    port: u16,
}

impl TrackerEndpoint {
    /// Creates an endpoint from its parts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses a `host:port` string; a bare host gets `TRACKER_DEFAULT_PORT`
    pub fn parse(addr: &str) -> Result<Self> {
        let (host, port) = match addr.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    MogileError::InvalidArgument(format!("Invalid tracker port in address: {}", addr))
                })?;
                (host, port)
            }
            None => (addr, TRACKER_DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(MogileError::InvalidArgument(format!(
                "Invalid tracker address: {}",
                addr
            )));
        }
        Ok(Self::new(host, port))
    }

    /// Host name or IP address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for TrackerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for TrackerEndpoint {
    type Err = MogileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A scalar request argument value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Text value
    Str(String),
    /// Integer value
    Int(i64),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Str(s) => f.write_str(s),
            ArgValue::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<&String> for ArgValue {
    fn from(v: &String) -> Self {
        ArgValue::Str(v.clone())
    }
}

macro_rules! int_arg_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ArgValue {
                fn from(v: $t) -> Self {
                    ArgValue::Int(v as i64)
                }
            }
        )*
    };
}

int_arg_value!(i32, i64, u8, u16, u32, u64, usize);

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Int(v as i64)
    }
}

/// Request arguments in insertion order
///
/// Order is kept only so requests serialize deterministically; the tracker
/// does not care about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(Vec<(String, ArgValue)>);

impl Args {
    /// Creates an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument
    pub fn arg(mut self, key: &str, value: impl Into<ArgValue>) -> Self {
        self.0.push((key.to_string(), value.into()));
        self
    }

    /// Appends an argument when a value is present
    pub fn arg_opt<V: Into<ArgValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.arg(key, v),
            None => self,
        }
    }

    /// Iterates over key/value pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the value of an argument
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns true if no argument is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// One domain and its classes as reported by `get_domains`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainEntry {
    /// Class id to class fields
    pub classes: BTreeMap<u32, Fields>,
}

/// Destinations handed out by `create_open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInfo {
    /// Opaque file id assigned by the tracker
    pub fid: String,
    /// Number of destinations offered
    pub dev_count: u32,
    /// Destination index to storage URL
    pub paths: BTreeMap<u32, String>,
    /// Destination index to device id
    pub devids: BTreeMap<u32, u64>,
}

/// One page of keys from `list_keys`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyList {
    /// Number of keys in this page
    pub key_count: u32,
    /// Cursor to pass as `after` for the next page
    pub next_after: Option<String>,
    /// Position to key
    pub keys: BTreeMap<u32, String>,
}

/// Locations of a key from `get_paths`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList {
    /// Total number of paths reported by the tracker
    pub path_count: u32,
    /// Position to storage URL
    pub paths: BTreeMap<u32, String>,
}

/// Structured result of a decoded `OK` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseData {
    /// Success carries no data
    Empty,
    /// `get_hosts`: host index to host fields
    Hosts(BTreeMap<u32, Fields>),
    /// `create_host` / `update_host`: fields with the `host` prefix removed
    Host(Fields),
    /// `get_domains`: domain id to its classes
    Domains(BTreeMap<u32, DomainEntry>),
    /// `get_devices`: device index, kept as sent, to device fields
    Devices(BTreeMap<String, Fields>),
    /// `create_open`
    Open(OpenInfo),
    /// `list_keys`
    Keys(KeyList),
    /// `get_paths`
    Paths(PathList),
}

impl ResponseData {
    fn kind(&self) -> &'static str {
        match self {
            ResponseData::Empty => "empty",
            ResponseData::Hosts(_) => "hosts",
            ResponseData::Host(_) => "host",
            ResponseData::Domains(_) => "domains",
            ResponseData::Devices(_) => "devices",
            ResponseData::Open(_) => "open",
            ResponseData::Keys(_) => "keys",
            ResponseData::Paths(_) => "paths",
        }
    }

    fn unexpected(&self, wanted: &str) -> MogileError {
        MogileError::malformed(wanted, format!("expected {} result, got {}", wanted, self.kind()))
    }

    /// Returns true for the empty result
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseData::Empty)
    }

    /// Extracts the `get_hosts` result
    pub fn into_hosts(self) -> Result<BTreeMap<u32, Fields>> {
        match self {
            ResponseData::Hosts(h) => Ok(h),
            other => Err(other.unexpected("hosts")),
        }
    }

    /// Extracts the `create_host` / `update_host` result
    pub fn into_host(self) -> Result<Fields> {
        match self {
            ResponseData::Host(h) => Ok(h),
            other => Err(other.unexpected("host")),
        }
    }

    /// Extracts the `get_domains` result
    pub fn into_domains(self) -> Result<BTreeMap<u32, DomainEntry>> {
        match self {
            ResponseData::Domains(d) => Ok(d),
            other => Err(other.unexpected("domains")),
        }
    }

    /// Extracts the `get_devices` result
    pub fn into_devices(self) -> Result<BTreeMap<String, Fields>> {
        match self {
            ResponseData::Devices(d) => Ok(d),
            other => Err(other.unexpected("devices")),
        }
    }

    /// Extracts the `create_open` result
    pub fn into_open(self) -> Result<OpenInfo> {
        match self {
            ResponseData::Open(o) => Ok(o),
            other => Err(other.unexpected("open")),
        }
    }

    /// Extracts the `list_keys` result; the empty sentinel becomes `None`
    pub fn into_keys(self) -> Result<Option<KeyList>> {
        match self {
            ResponseData::Keys(k) => Ok(Some(k)),
            ResponseData::Empty => Ok(None),
            other => Err(other.unexpected("keys")),
        }
    }

    /// Extracts the `get_paths` result
    pub fn into_paths(self) -> Result<PathList> {
        match self {
            ResponseData::Paths(p) => Ok(p),
            other => Err(other.unexpected("paths")),
        }
    }
}

/// Result of a successful store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Storage URL the content was written to
    pub path: String,
    /// Number of bytes written
    pub length: u64,
}

/// Options for `get_paths`
#[derive(Debug, Clone)]
pub struct GetPathsOptions {
    /// Skip the tracker's liveness check of the first path
    pub noverify: bool,
    /// Routing zone; `alt` asks for alternate host IPs
    pub zone: String,
    /// Number of paths wanted
    pub pathcount: u32,
}

impl Default for GetPathsOptions {
    fn default() -> Self {
        Self {
            noverify: true,
            zone: DEFAULT_ZONE.to_string(),
            pathcount: 2,
        }
    }
}

/// Tracker pool tuning, derived from `ClientConfig`
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Timeout for establishing connections
    pub connect_timeout: Duration,
    /// Timeout for network I/O
    pub network_timeout: Duration,
    /// How long a failed tracker stays out of selection
    pub forgiveness_window: Duration,
    /// Upper bound of attempts per dispatch
    pub max_retries: usize,
    /// Random draws before selection gives up
    pub max_select_attempts: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            network_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            forgiveness_window: Duration::from_millis(DEFAULT_FORGIVENESS_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            max_select_attempts: DEFAULT_MAX_SELECT_ATTEMPTS,
        }
    }
}

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// List of tracker addresses in format "host:port"
    pub trackers: Vec<String>,
    /// Domain the file operations act on
    pub domain: String,
    /// Timeout for establishing connections in milliseconds
    pub connect_timeout: u64,
    /// Timeout for network I/O operations in milliseconds
    pub network_timeout: u64,
    /// How long a failed tracker is skipped, in milliseconds
    pub forgiveness_window: u64,
    /// Maximum attempts per tracker request
    pub max_retries: usize,
    /// Random draws before tracker selection gives up
    pub max_select_attempts: usize,
    /// Timeout for HTTP transfers against storage nodes in milliseconds
    pub http_timeout: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            trackers: Vec::new(),
            domain: String::new(),
            connect_timeout: DEFAULT_TIMEOUT_MS,
            network_timeout: DEFAULT_TIMEOUT_MS,
            forgiveness_window: DEFAULT_FORGIVENESS_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            max_select_attempts: DEFAULT_MAX_SELECT_ATTEMPTS,
            http_timeout: 30_000,
        }
    }
}

impl ClientConfig {
    /// Creates a new client configuration with tracker addresses and a domain
    pub fn new(trackers: Vec<String>, domain: impl Into<String>) -> Self {
        Self {
            trackers,
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// Sets the connection timeout in milliseconds
    pub fn with_connect_timeout(mut self, timeout: u64) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the network timeout in milliseconds
    pub fn with_network_timeout(mut self, timeout: u64) -> Self {
        self.network_timeout = timeout;
        self
    }

    /// Sets the forgiveness window in milliseconds
    pub fn with_forgiveness_window(mut self, window: u64) -> Self {
        self.forgiveness_window = window;
        self
    }

    /// Sets the maximum attempts per request
    pub fn with_max_retries(mut self, count: usize) -> Self {
        self.max_retries = count;
        self
    }

    /// Sets the number of random draws for tracker selection
    pub fn with_max_select_attempts(mut self, count: usize) -> Self {
        self.max_select_attempts = count;
        self
    }

    /// Sets the HTTP timeout in milliseconds
    pub fn with_http_timeout(mut self, timeout: u64) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Checks the configuration and parses the tracker list
    pub fn validate(&self) -> Result<Vec<TrackerEndpoint>> {
        if self.trackers.is_empty() {
            return Err(MogileError::InvalidArgument(
                "Tracker addresses are required".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(MogileError::InvalidArgument(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.max_select_attempts == 0 {
            return Err(MogileError::InvalidArgument(
                "max_select_attempts must be at least 1".to_string(),
            ));
        }
        self.trackers
            .iter()
            .map(|addr| TrackerEndpoint::parse(addr))
            .collect()
    }

    /// Pool settings for this configuration
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout),
            network_timeout: Duration::from_millis(self.network_timeout),
            forgiveness_window: Duration::from_millis(self.forgiveness_window),
            max_retries: self.max_retries,
            max_select_attempts: self.max_select_attempts,
        }
    }
}
