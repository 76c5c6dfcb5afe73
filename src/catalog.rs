//! Tracker Command Catalog
//!
//! Every tracker command the client speaks is a `CommandSpec`: its wire name
//! and a decoder turning the `OK` payload into a `ResponseData`. The table is
//! static and looked up by name.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;

use crate::errors::{MogileError, Result};
use crate::protocol::{encode_request, parse_pairs, split_response, Status};
use crate::types::*;

/// Decoder from a raw `OK` payload to a structured result
pub type Decoder = fn(&str) -> Result<ResponseData>;

/// Name and response decoder of one tracker command
#[derive(Debug)]
pub struct CommandSpec {
    /// Command name as written on the wire
    pub name: &'static str,
    /// Decoder for the `OK` payload
    pub decode: Decoder,
}

macro_rules! command {
    ($ident:ident, $name:literal, $decode:expr) => {
        #[doc = concat!("The `", $name, "` command")]
        pub static $ident: CommandSpec = CommandSpec {
            name: $name,
            decode: $decode,
        };
    };
}

command!(GET_HOSTS, "get_hosts", decode_get_hosts);
command!(CREATE_HOST, "create_host", decode_host);
command!(UPDATE_HOST, "update_host", decode_host);
command!(DELETE_HOST, "delete_host", decode_ack);
command!(GET_DOMAINS, "get_domains", decode_get_domains);
command!(CREATE_DOMAIN, "create_domain", decode_ack);
command!(DELETE_DOMAIN, "delete_domain", decode_ack);
command!(CREATE_CLASS, "create_class", decode_ack);
command!(UPDATE_CLASS, "update_class", decode_ack);
command!(DELETE_CLASS, "delete_class", decode_ack);
command!(GET_DEVICES, "get_devices", decode_get_devices);
command!(CREATE_DEVICE, "create_device", decode_ack);
command!(SET_STATE, "set_state", decode_ack);
command!(SET_WEIGHT, "set_weight", decode_ack);
command!(CREATE_OPEN, "create_open", decode_create_open);
command!(CREATE_CLOSE, "create_close", decode_ack);
command!(DELETE, "delete", decode_ack);
command!(RENAME, "rename", decode_ack);
command!(LIST_KEYS, "list_keys", decode_list_keys);
command!(GET_PATHS, "get_paths", decode_get_paths);

/// All supported commands
pub static CATALOG: [&CommandSpec; 20] = [
    &GET_HOSTS,
    &CREATE_HOST,
    &UPDATE_HOST,
    &DELETE_HOST,
    &GET_DOMAINS,
    &CREATE_DOMAIN,
    &DELETE_DOMAIN,
    &CREATE_CLASS,
    &UPDATE_CLASS,
    &DELETE_CLASS,
    &GET_DEVICES,
    &CREATE_DEVICE,
    &SET_STATE,
    &SET_WEIGHT,
    &CREATE_OPEN,
    &CREATE_CLOSE,
    &DELETE,
    &RENAME,
    &LIST_KEYS,
    &GET_PATHS,
];

/// Finds a command by its wire name
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    CATALOG.iter().copied().find(|spec| spec.name == name)
}

/// A command together with its arguments
#[derive(Debug, Clone)]
pub struct Request {
    spec: &'static CommandSpec,
    args: Args,
}

impl Request {
    /// Creates a request
    pub fn new(spec: &'static CommandSpec, args: Args) -> Self {
        Self { spec, args }
    }

    /// The command being sent
    pub fn spec(&self) -> &'static CommandSpec {
        self.spec
    }

    /// The request arguments
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Wire form of the request
    pub fn encode(&self) -> Bytes {
        encode_request(self.spec.name, &self.args)
    }

    /// Decodes a response line received for this request
    ///
    /// `ERR` lines become `MogileError::Tracker`.
    pub fn decode_response(&self, line: String) -> Result<Response> {
        let data = match split_response(&line)? {
            Status::Ok(payload) => (self.spec.decode)(payload)?,
            Status::Err { code, message } => {
                return Err(MogileError::Tracker { code, message });
            }
        };
        Ok(Response { raw: line, data })
    }
}

/// A decoded `OK` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The response line as received
    pub raw: String,
    /// Decoded result
    pub data: ResponseData,
}

fn malformed_index(key: &str) -> MogileError {
    MogileError::malformed(key, "non-numeric index")
}

fn parse_index(key: &str, idx: &str) -> Result<u32> {
    idx.parse::<u32>().map_err(|_| malformed_index(key))
}

fn take_int(pairs: &mut Pairs, key: &str) -> Result<u32> {
    let value = pairs
        .remove(key)
        .ok_or_else(|| MogileError::malformed(key, "missing required key"))?;
    value
        .parse::<u32>()
        .map_err(|_| MogileError::malformed(key, format!("expected integer, got {:?}", value)))
}

fn take_str(pairs: &mut Pairs, key: &str) -> Result<String> {
    pairs
        .remove(key)
        .ok_or_else(|| MogileError::malformed(key, "missing required key"))
}

/// Splits `<prefix><idx>_<field>` into index and field
fn split_indexed<'a>(key: &'a str, prefix: &str) -> Result<(&'a str, &'a str)> {
    key.strip_prefix(prefix)
        .and_then(|rest| rest.split_once('_'))
        .ok_or_else(|| MogileError::malformed(key, format!("expected {}<idx>_<field>", prefix)))
}

/// Index of `<name>_<idx>` keys
fn underscore_index(key: &str) -> Result<u32> {
    let idx = key.split('_').nth(1).ok_or_else(|| malformed_index(key))?;
    parse_index(key, idx)
}

fn decode_ack(_payload: &str) -> Result<ResponseData> {
    Ok(ResponseData::Empty)
}

fn decode_get_hosts(payload: &str) -> Result<ResponseData> {
    let mut pairs = parse_pairs(payload)?;
    pairs.remove("hosts");

    let mut hosts: BTreeMap<u32, Fields> = BTreeMap::new();
    for (key, value) in pairs {
        let (idx, field) = split_indexed(&key, "host")?;
        let idx = parse_index(&key, idx)?;
        hosts.entry(idx).or_default().insert(field.to_string(), value);
    }
    Ok(ResponseData::Hosts(hosts))
}

fn decode_host(payload: &str) -> Result<ResponseData> {
    let pairs = parse_pairs(payload)?;

    let mut host = Fields::new();
    for (key, value) in pairs {
        let (_, field) = key
            .split_once("host")
            .ok_or_else(|| MogileError::malformed(&key, "expected host<field>"))?;
        host.insert(field.to_string(), value);
    }
    Ok(ResponseData::Host(host))
}

static DOMAIN_CLASS_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^domain([0-9]+)class([0-9]+)([a-z]+)$").expect("domain class pattern is valid")
});

fn decode_get_domains(payload: &str) -> Result<ResponseData> {
    let mut pairs = parse_pairs(payload)?;
    pairs.remove("domains");

    let mut domains: BTreeMap<u32, DomainEntry> = BTreeMap::new();
    for (key, value) in pairs {
        let caps = DOMAIN_CLASS_KEY
            .captures(&key)
            .ok_or_else(|| MogileError::malformed(&key, "expected domain<d>class<c><field>"))?;
        let domain_id = parse_index(&key, &caps[1])?;
        let class_id = parse_index(&key, &caps[2])?;
        domains
            .entry(domain_id)
            .or_default()
            .classes
            .entry(class_id)
            .or_default()
            .insert(caps[3].to_string(), value);
    }
    Ok(ResponseData::Domains(domains))
}

// Device indices stay strings, unlike every other indexed result.
fn decode_get_devices(payload: &str) -> Result<ResponseData> {
    let mut pairs = parse_pairs(payload)?;
    pairs.remove("devices");

    let mut devices: BTreeMap<String, Fields> = BTreeMap::new();
    for (key, value) in pairs {
        let (idx, field) = split_indexed(&key, "dev")?;
        devices
            .entry(idx.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }
    Ok(ResponseData::Devices(devices))
}

fn decode_create_open(payload: &str) -> Result<ResponseData> {
    let mut pairs = parse_pairs(payload)?;
    let fid = take_str(&mut pairs, "fid")?;
    let dev_count = take_int(&mut pairs, "dev_count")?;

    let mut paths = BTreeMap::new();
    let mut devids = BTreeMap::new();
    for (key, value) in pairs {
        if key.starts_with("path_") {
            paths.insert(underscore_index(&key)?, value);
        } else if key.starts_with("devid_") {
            let devid = value
                .parse::<u64>()
                .map_err(|_| MogileError::malformed(&key, format!("expected integer, got {:?}", value)))?;
            devids.insert(underscore_index(&key)?, devid);
        }
    }

    Ok(ResponseData::Open(OpenInfo {
        fid,
        dev_count,
        paths,
        devids,
    }))
}

fn decode_list_keys(payload: &str) -> Result<ResponseData> {
    // An empty payload means "no results" and is kept apart from a page
    // that happens to report zero keys.
    if payload.is_empty() {
        return Ok(ResponseData::Empty);
    }

    let mut pairs = parse_pairs(payload)?;
    let key_count = take_int(&mut pairs, "key_count")?;
    let next_after = take_str(&mut pairs, "next_after")?;

    let mut keys = BTreeMap::new();
    for (key, value) in pairs {
        keys.insert(underscore_index(&key)?, value);
    }

    Ok(ResponseData::Keys(KeyList {
        key_count,
        next_after: Some(next_after),
        keys,
    }))
}

fn decode_get_paths(payload: &str) -> Result<ResponseData> {
    let mut pairs = parse_pairs(payload)?;
    let path_count = take_int(&mut pairs, "paths")?;

    let mut paths = BTreeMap::new();
    for (key, value) in pairs {
        let Some(idx) = key.strip_prefix("path") else {
            continue;
        };
        if idx.is_empty() || !idx.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        paths.insert(parse_index(&key, idx)?, value);
    }

    Ok(ResponseData::Paths(PathList { path_count, paths }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(entries: &[(&str, &str)]) -> Fields {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("get_paths").unwrap().name, "get_paths");
        assert_eq!(lookup("delete").unwrap().name, "delete");
        assert!(lookup("noop").is_none());
        assert!(lookup("bogus").is_none());
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let mut names: Vec<&str> = CATALOG.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn test_get_hosts() {
        let data = (GET_HOSTS.decode)("host1_hostname=foo&host1_hostip=1.2.3.4&hosts=1").unwrap();
        let mut expected = BTreeMap::new();
        expected.insert(1, fields(&[("hostname", "foo"), ("hostip", "1.2.3.4")]));
        assert_eq!(data, ResponseData::Hosts(expected));
    }

    #[test]
    fn test_get_hosts_groups_by_index() {
        let data = (GET_HOSTS.decode)(
            "hosts=2&host1_hostname=a&host2_hostname=b&host2_status=alive&host1_http_port=7500",
        )
        .unwrap()
        .into_hosts()
        .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[&1]["http_port"], "7500");
        assert_eq!(data[&2]["status"], "alive");
    }

    #[test]
    fn test_get_hosts_non_numeric_index() {
        let err = (GET_HOSTS.decode)("hostX_hostname=foo").unwrap_err();
        match err {
            MogileError::MalformedResponse { key, .. } => assert_eq!(key, "hostX_hostname"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_create_host_strips_prefix() {
        let data = (CREATE_HOST.decode)("hostid=3&hostname=foo").unwrap();
        assert_eq!(data, ResponseData::Host(fields(&[("id", "3"), ("name", "foo")])));
    }

    #[test]
    fn test_ack_commands_ignore_payload() {
        for spec in [&DELETE_HOST, &CREATE_DOMAIN, &SET_WEIGHT, &CREATE_CLOSE, &DELETE, &RENAME] {
            assert_eq!((spec.decode)("").unwrap(), ResponseData::Empty);
            assert_eq!((spec.decode)("domain=foo&junk").unwrap(), ResponseData::Empty);
        }
    }

    #[test]
    fn test_get_domains() {
        let data = (GET_DOMAINS.decode)(
            "domains=1&domain1class1name=default&domain1class1mindevcount=2&domain1class2name=thumbs",
        )
        .unwrap()
        .into_domains()
        .unwrap();

        let classes = &data[&1].classes;
        assert_eq!(classes[&1], fields(&[("name", "default"), ("mindevcount", "2")]));
        assert_eq!(classes[&2], fields(&[("name", "thumbs")]));
    }

    #[test]
    fn test_get_domains_rejects_unmatched_key() {
        let err = (GET_DOMAINS.decode)("domains=1&domain1=photos").unwrap_err();
        assert!(matches!(err, MogileError::MalformedResponse { ref key, .. } if key == "domain1"));
    }

    #[test]
    fn test_get_devices_keeps_string_index() {
        let data = (GET_DEVICES.decode)("devices=2&dev1_devid=1&dev1_status=alive&dev10_devid=10")
            .unwrap()
            .into_devices()
            .unwrap();
        assert_eq!(data["1"]["status"], "alive");
        assert_eq!(data["10"]["devid"], "10");
        assert!(data.keys().all(|k| k.parse::<u32>().is_ok()));
    }

    #[test]
    fn test_create_open() {
        let data = (CREATE_OPEN.decode)(
            "fid=42&dev_count=2&path_1=http://a/dev1/0.fid&devid_1=1&path_2=http://b/dev7/0.fid&devid_2=7",
        )
        .unwrap()
        .into_open()
        .unwrap();

        assert_eq!(data.fid, "42");
        assert_eq!(data.dev_count, 2);
        assert_eq!(data.paths[&2], "http://b/dev7/0.fid");
        assert_eq!(data.devids[&2], 7);
    }

    #[test]
    fn test_create_open_missing_fid() {
        let err = (CREATE_OPEN.decode)("dev_count=1&path_1=http://a").unwrap_err();
        assert!(matches!(err, MogileError::MalformedResponse { ref key, .. } if key == "fid"));
    }

    #[test]
    fn test_list_keys_empty_payload_is_sentinel() {
        assert_eq!((LIST_KEYS.decode)("").unwrap(), ResponseData::Empty);
    }

    #[test]
    fn test_list_keys() {
        let data = (LIST_KEYS.decode)("key_count=2&next_after=b&key_1=a&key_2=b")
            .unwrap()
            .into_keys()
            .unwrap()
            .unwrap();
        assert_eq!(data.key_count, 2);
        assert_eq!(data.next_after.as_deref(), Some("b"));
        assert_eq!(data.keys[&1], "a");
        assert_eq!(data.keys[&2], "b");
    }

    #[test]
    fn test_list_keys_missing_next_after() {
        let err = (LIST_KEYS.decode)("key_count=0").unwrap_err();
        assert!(matches!(err, MogileError::MalformedResponse { ref key, .. } if key == "next_after"));
    }

    #[test]
    fn test_get_paths() {
        let data = (GET_PATHS.decode)("paths=2&path1=http://a&path2=http://b").unwrap();
        let mut paths = BTreeMap::new();
        paths.insert(1, "http://a".to_string());
        paths.insert(2, "http://b".to_string());
        assert_eq!(data, ResponseData::Paths(PathList { path_count: 2, paths }));
    }

    #[test]
    fn test_get_paths_missing_count() {
        let err = (GET_PATHS.decode)("path1=http://a").unwrap_err();
        assert!(matches!(err, MogileError::MalformedResponse { ref key, .. } if key == "paths"));
    }

    #[test]
    fn test_request_decode_err_line() {
        let request = Request::new(&GET_PATHS, Args::new().arg("key", "k"));
        let err = request
            .decode_response("ERR unknown_key unknown_key\r\n".to_string())
            .unwrap_err();
        assert_eq!(err.tracker_code(), Some("unknown_key"));
    }
}
