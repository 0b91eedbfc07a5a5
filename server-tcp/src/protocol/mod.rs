use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::TtlSecs;
use tokio_util::codec::LengthDelimitedCodec;

// Command type identifiers
pub const CMD_PING: u8 = 0x00;
pub const CMD_GET: u8 = 0x01;
pub const CMD_SET: u8 = 0x02;
pub const CMD_CONTAINS: u8 = 0x03;
pub const CMD_REMOVE: u8 = 0x04;

// Response type identifiers
pub const RESP_PONG: u8 = 0x00;
pub const RESP_OK: u8 = 0x01;
pub const RESP_VALUE: u8 = 0x02;
pub const RESP_NOT_FOUND: u8 = 0x03;
pub const RESP_BOOL: u8 = 0x04;
pub const RESP_ERROR: u8 = 0x05;

pub const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// 4-byte big-endian length prefix, shared by server and client.
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    Get { namespace: String, key: String },
    Set { namespace: String, key: String, ttl: TtlSecs, value: Bytes },
    Contains { namespace: String, key: String },
    Remove { namespace: String, key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Pong,
    Ok,
    Value { value: String },
    NotFound,
    Bool { value: bool },
    Error { msg: String },
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_bytes(buf: &mut Bytes, what: &str) -> Result<Bytes, String> {
    if buf.remaining() < 4 {
        return Err(format!("missing {} length", what));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(format!(
            "{} truncated: expected {} bytes, got {}",
            what,
            len,
            buf.remaining()
        ));
    }
    Ok(buf.copy_to_bytes(len))
}

fn get_str(buf: &mut Bytes, what: &str) -> Result<String, String> {
    let bytes = get_bytes(buf, what)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("Invalid {} UTF-8: {}", what, e))
}

fn get_address(buf: &mut Bytes, cmd: &str) -> Result<(String, String), String> {
    let namespace = get_str(buf, "namespace").map_err(|e| format!("Invalid {}: {}", cmd, e))?;
    let key = get_str(buf, "key").map_err(|e| format!("Invalid {}: {}", cmd, e))?;
    Ok((namespace, key))
}

impl Request {
    /// Encode a Request into Bytes for transmission
    ///
    /// Format:
    /// - PING: [0x00]
    /// - GET / CONTAINS / REMOVE: [cmd][ns_len: u32][ns][key_len: u32][key]
    /// - SET: [0x02][ns_len: u32][ns][key_len: u32][key][ttl_secs: u64][value_len: u32][value]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Request::Ping => {
                buf.put_u8(CMD_PING);
            }
            Request::Get { namespace, key } => {
                buf.put_u8(CMD_GET);
                put_str(&mut buf, namespace);
                put_str(&mut buf, key);
            }
            Request::Set { namespace, key, ttl, value } => {
                buf.put_u8(CMD_SET);
                put_str(&mut buf, namespace);
                put_str(&mut buf, key);
                buf.put_u64(ttl.0);
                buf.put_u32(value.len() as u32);
                buf.put_slice(value);
            }
            Request::Contains { namespace, key } => {
                buf.put_u8(CMD_CONTAINS);
                put_str(&mut buf, namespace);
                put_str(&mut buf, key);
            }
            Request::Remove { namespace, key } => {
                buf.put_u8(CMD_REMOVE);
                put_str(&mut buf, namespace);
                put_str(&mut buf, key);
            }
        }

        buf.freeze()
    }

    /// Decode a Request from a complete frame
    pub fn decode(mut buf: Bytes) -> Result<Self, String> {
        if buf.is_empty() {
            return Err("Empty buffer".to_string());
        }

        let cmd = buf.get_u8();

        match cmd {
            CMD_PING => Ok(Request::Ping),
            CMD_GET => {
                let (namespace, key) = get_address(&mut buf, "GET")?;
                Ok(Request::Get { namespace, key })
            }
            CMD_SET => {
                let (namespace, key) = get_address(&mut buf, "SET")?;
                if buf.remaining() < 8 {
                    return Err("Invalid SET: missing ttl".to_string());
                }
                let ttl = TtlSecs(buf.get_u64());
                // Kept as bytes; the server decides whether they are a valid payload
                let value = get_bytes(&mut buf, "value").map_err(|e| format!("Invalid SET: {}", e))?;
                Ok(Request::Set { namespace, key, ttl, value })
            }
            CMD_CONTAINS => {
                let (namespace, key) = get_address(&mut buf, "CONTAINS")?;
                Ok(Request::Contains { namespace, key })
            }
            CMD_REMOVE => {
                let (namespace, key) = get_address(&mut buf, "REMOVE")?;
                Ok(Request::Remove { namespace, key })
            }
            _ => Err(format!("Unknown command: 0x{:02X}", cmd)),
        }
    }
}

impl Response {
    /// Encode a Response into Bytes for transmission
    ///
    /// Format:
    /// - PONG: [0x00]
    /// - OK: [0x01]
    /// - VALUE: [0x02][value_len: u32][value bytes]
    /// - NOT_FOUND: [0x03]
    /// - BOOL: [0x04][0 | 1]
    /// - ERROR: [0x05][msg_len: u32][msg bytes]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Response::Pong => {
                buf.put_u8(RESP_PONG);
            }
            Response::Ok => {
                buf.put_u8(RESP_OK);
            }
            Response::Value { value } => {
                buf.put_u8(RESP_VALUE);
                put_str(&mut buf, value);
            }
            Response::NotFound => {
                buf.put_u8(RESP_NOT_FOUND);
            }
            Response::Bool { value } => {
                buf.put_u8(RESP_BOOL);
                buf.put_u8(u8::from(*value));
            }
            Response::Error { msg } => {
                buf.put_u8(RESP_ERROR);
                put_str(&mut buf, msg);
            }
        }

        buf.freeze()
    }

    /// Decode a Response from a complete frame
    pub fn decode(mut buf: Bytes) -> Result<Self, String> {
        if buf.is_empty() {
            return Err("Empty buffer".to_string());
        }

        let resp_type = buf.get_u8();

        match resp_type {
            RESP_PONG => Ok(Response::Pong),
            RESP_OK => Ok(Response::Ok),
            RESP_VALUE => {
                let value = get_str(&mut buf, "value").map_err(|e| format!("Invalid VALUE: {}", e))?;
                Ok(Response::Value { value })
            }
            RESP_NOT_FOUND => Ok(Response::NotFound),
            RESP_BOOL => {
                if buf.remaining() < 1 {
                    return Err("Invalid BOOL: missing value".to_string());
                }
                Ok(Response::Bool {
                    value: buf.get_u8() != 0,
                })
            }
            RESP_ERROR => {
                let msg_bytes = get_bytes(&mut buf, "message").map_err(|e| format!("Invalid ERROR: {}", e))?;
                let msg = String::from_utf8_lossy(&msg_bytes).to_string();
                Ok(Response::Error { msg })
            }
            _ => Err(format!("Unknown response type: 0x{:02X}", resp_type)),
        }
    }
}
