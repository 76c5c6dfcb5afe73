//! MogileFS Protocol Encoding and Decoding
//!
//! The tracker protocol is line based. A request is
//! `<command> <k1>=<v1>&<k2>=<v2>\r\n` with percent-encoded keys and values,
//! and a response is either `OK <k1>=<v1>&...\r\n` or
//! `ERR <code> <message>\r\n`.

use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;

use crate::errors::{MogileError, Result};
use crate::types::*;

/// Status part of a response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status<'a> {
    /// `OK` with its still-encoded payload
    Ok(&'a str),
    /// `ERR` with decoded code and message
    Err {
        /// Error code
        code: String,
        /// Error message, may be empty
        message: String,
    },
}

/// A fully decoded response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK` with its flat mapping
    Ok(Pairs),
    /// `ERR` with its code and message
    Err {
        /// Error code
        code: String,
        /// Error message, may be empty
        message: String,
    },
}

/// Encodes a request line
///
/// With no arguments the line is `<command> \r\n`; the space before the
/// terminator is part of the wire format and must be kept.
pub fn encode_request(command: &str, args: &Args) -> Bytes {
    let mut buf = BytesMut::with_capacity(command.len() + 3 + args.len() * 16);
    buf.put_slice(command.as_bytes());
    buf.put_u8(b' ');

    for (i, (key, value)) in args.iter().enumerate() {
        if i > 0 {
            buf.put_u8(b'&');
        }
        buf.put_slice(urlencoding::encode(key).as_bytes());
        buf.put_u8(b'=');
        buf.put_slice(urlencoding::encode(&value.to_string()).as_bytes());
    }

    buf.put_slice(LINE_TERMINATOR);
    buf.freeze()
}

/// Splits a response line into its status and payload
///
/// The trailing `\r\n` is optional here; the connection layer has already
/// used it to find the end of the line.
pub fn split_response(line: &str) -> Result<Status<'_>> {
    let body = line.strip_suffix("\r\n").unwrap_or(line);
    let (token, rest) = match body.split_once(' ') {
        Some((token, rest)) => (token, rest),
        None => (body, ""),
    };

    match token {
        "OK" => Ok(Status::Ok(rest)),
        "ERR" => {
            let (code, message) = match rest.split_once(' ') {
                Some((code, message)) => (code, message),
                None => (rest, ""),
            };
            if code.is_empty() {
                return Err(MogileError::Parse(format!(
                    "ERR response without code: {:?}",
                    line
                )));
            }
            Ok(Status::Err {
                code: decode_component(code)?,
                message: decode_component(message)?,
            })
        }
        _ => Err(MogileError::Parse(format!("Unrecognized response: {:?}", line))),
    }
}

/// Decodes a full response line into a flat mapping or a tracker error
pub fn decode_response(line: &str) -> Result<Reply> {
    match split_response(line)? {
        Status::Ok(payload) => Ok(Reply::Ok(parse_pairs(payload)?)),
        Status::Err { code, message } => Ok(Reply::Err { code, message }),
    }
}

/// Parses an `OK` payload of the form `k1=v1&k2=v2`
///
/// An empty payload is an empty mapping. Each pair is split on its first
/// `=`; a pair without one is a parse error.
pub fn parse_pairs(payload: &str) -> Result<Pairs> {
    let mut pairs = Pairs::new();
    if payload.is_empty() {
        return Ok(pairs);
    }

    for pair in payload.split('&') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| MogileError::Parse(format!("Cannot parse response: {}", payload)))?;
        pairs.insert(decode_component(key)?, decode_component(value)?);
    }

    Ok(pairs)
}

/// Percent-decodes one key, value or message; `+` stands for a space
pub fn decode_component(raw: &str) -> Result<String> {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| MogileError::Parse(format!("Invalid percent-encoding in {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_without_args_keeps_trailing_space() {
        let encoded = encode_request("get_hosts", &Args::new());
        assert_eq!(&encoded[..], b"get_hosts \r\n");
    }

    #[test]
    fn test_encode_with_args() {
        let args = Args::new().arg("test", "foo");
        let encoded = encode_request("get_hosts", &args);
        assert_eq!(&encoded[..], b"get_hosts test=foo\r\n");

        let args = Args::new().arg("a", "b").arg("count", 3u32);
        let encoded = encode_request("x", &args);
        assert_eq!(&encoded[..], b"x a=b&count=3\r\n");
    }

    #[test]
    fn test_encode_percent_encodes_values() {
        let args = Args::new().arg("key", "a b&c=d");
        let encoded = encode_request("delete", &args);
        assert_eq!(&encoded[..], b"delete key=a%20b%26c%3Dd\r\n");
    }

    #[test]
    fn test_split_ok() {
        assert_eq!(split_response("OK a=b\r\n").unwrap(), Status::Ok("a=b"));
        assert_eq!(split_response("OK \r\n").unwrap(), Status::Ok(""));
        assert_eq!(split_response("OK\r\n").unwrap(), Status::Ok(""));
    }

    #[test]
    fn test_split_err() {
        let status = split_response("ERR unknown_key unknown+key%21\r\n").unwrap();
        assert_eq!(
            status,
            Status::Err {
                code: "unknown_key".to_string(),
                message: "unknown key!".to_string()
            }
        );
    }

    #[test]
    fn test_split_err_without_code() {
        assert!(matches!(split_response("ERR\r\n"), Err(MogileError::Parse(_))));
        assert!(matches!(split_response("ERR \r\n"), Err(MogileError::Parse(_))));
    }

    #[test]
    fn test_split_unrecognized() {
        assert!(matches!(split_response("HELLO there\r\n"), Err(MogileError::Parse(_))));
        assert!(matches!(split_response("\r\n"), Err(MogileError::Parse(_))));
    }

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs("fid=12&path=http%3A%2F%2Fhost%2Fdev1").unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs["fid"], "12");
        assert_eq!(pairs["path"], "http://host/dev1");
    }

    #[test]
    fn test_parse_pairs_splits_on_first_equals() {
        let pairs = parse_pairs("q=a=b").unwrap();
        assert_eq!(pairs["q"], "a=b");
    }

    #[test]
    fn test_parse_pairs_rejects_missing_equals() {
        assert!(matches!(parse_pairs("a=b&broken"), Err(MogileError::Parse(_))));
    }

    #[test]
    fn test_decode_response_round_trip() {
        let mut expected = Pairs::new();
        expected.insert("hostname".to_string(), "foo".to_string());
        expected.insert("hostip".to_string(), "1.2.3.4".to_string());

        let payload: Vec<String> = expected.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        let line = format!("OK {}\r\n", payload.join("&"));

        assert_eq!(decode_response(&line).unwrap(), Reply::Ok(expected));
    }

    #[test]
    fn test_decode_err_message() {
        let reply = decode_response("ERR none_match No+keys+match\r\n").unwrap();
        assert_eq!(
            reply,
            Reply::Err {
                code: "none_match".to_string(),
                message: "No keys match".to_string(),
            }
        );
    }
}
