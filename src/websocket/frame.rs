//! Binary frame codec.
//!
//! ```text
//! bytes[0:4]  big-endian u32, length of the remaining bytes
//! bytes[4:]   protobuf WsMessage {service, method, payload, error}
//! ```
//!
//! The same layout is used in both directions.

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

pub const HEADER_LEN: usize = 4;

/// Envelope naming the backend operation a payload targets.
#[derive(Clone, PartialEq, Message)]
pub struct WsMessage {
    #[prost(string, tag = "1")]
    pub service: String,
    #[prost(string, tag = "2")]
    pub method: String,
    #[prost(bytes = "bytes", tag = "3")]
    pub payload: Bytes,
    /// Set only on gateway error replies.
    #[prost(string, tag = "4")]
    pub error: String,
}

impl WsMessage {
    pub fn new(service: impl Into<String>, method: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            payload: payload.into(),
            error: String::new(),
        }
    }

    /// Reply to `self` carrying an error and no payload.
    pub fn error_reply(&self, error: impl Into<String>) -> Self {
        Self {
            service: self.service.clone(),
            method: self.method.clone(),
            payload: Bytes::new(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("frame length mismatch: header says {declared}, body has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("frame body of {0} bytes exceeds the length header")]
    TooLarge(usize),

    #[error("invalid envelope: {0}")]
    Envelope(#[from] prost::DecodeError),
}

/// Check the length header and return the body.
pub fn validate(frame: &[u8]) -> Result<&[u8], FrameError> {
    if frame.len() < HEADER_LEN {
        return Err(FrameError::TooShort(frame.len()));
    }

    let (header, body) = frame.split_at(HEADER_LEN);
    let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if declared != body.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }
    Ok(body)
}

/// Validate a frame and parse its envelope.
pub fn decode(frame: &[u8]) -> Result<WsMessage, FrameError> {
    let body = validate(frame)?;
    Ok(WsMessage::decode(body)?)
}

/// Serialize an envelope with a freshly computed length header.
pub fn encode(message: &WsMessage) -> Result<Bytes, FrameError> {
    let body = message.encode_to_vec();
    let declared = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge(body.len()))?;

    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    frame.put_u32(declared);
    frame.put_slice(&body);
    Ok(frame.freeze())
}
