//! Echo transform for the runtime.
//!
//! Received bytes are opaque: no framing, no line reassembly across reads.
//! Each chunk is answered once, as the configured prefix followed by exactly
//! the bytes that were read.

use bytes::{BufMut, Bytes, BytesMut};

/// Prefix-and-echo responder.
#[derive(Debug, Clone)]
pub struct EchoProtocol {
    prefix: Bytes,
}

impl EchoProtocol {
    pub fn new(prefix: impl Into<Bytes>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Build the reply for one received chunk.
    ///
    /// The reply is never truncated: its length is always
    /// `prefix.len() + chunk.len()`, and the chunk itself is bounded by the
    /// read size.
    pub fn respond(&self, chunk: &[u8]) -> BytesMut {
        let mut response = BytesMut::with_capacity(self.prefix.len() + chunk.len());
        response.put_slice(&self.prefix);
        response.put_slice(chunk);
        response
    }
}
