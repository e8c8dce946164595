//! Encoding and decoding entry points
//!
//! `encode`/`decode` work on JSON text; `flatten`/`unflatten` work on the
//! structured table for transports that embed JSON documents. All of them are
//! pure, synchronous functions whose state lives only for the call.

pub mod builtins;
pub mod decoder;
pub mod encoder;


pub use decoder::hydrate;
pub use encoder::flatten;

use crate::core::config::Limits;
use crate::core::error::Result;
use crate::core::types::Value;
use crate::registry::{Decoders, Encoders, TagDecoder, TagEncoder};
use crate::wire::Wire;

/// Encode `value` to wire text with no limits
pub fn encode(value: &Value, encoders: &Encoders) -> Result<String> {
    encode_with(value, encoders, &Limits::default())
}

/// Encode `value` to wire text
pub fn encode_with(value: &Value, encoders: &Encoders, limits: &Limits) -> Result<String> {
    flatten(value, encoders, limits)?.to_json_string()
}

/// Decode wire text with no limits
pub fn decode(text: &str, decoders: &Decoders) -> Result<Value> {
    decode_with(text, decoders, &Limits::default())
}

/// Decode wire text
pub fn decode_with(text: &str, decoders: &Decoders, limits: &Limits) -> Result<Value> {
    let wire = Wire::from_json_str(text)?;
    hydrate(&wire, decoders, limits)
}

/// Decode an already-parsed JSON document
pub fn unflatten(json: serde_json::Value, decoders: &Decoders, limits: &Limits) -> Result<Value> {
    let wire = Wire::from_json_value(json)?;
    hydrate(&wire, decoders, limits)
}

/// A registry pair and limits, bundled for reuse. Shareable across threads.
#[derive(Debug, Default)]
pub struct Codec {
    /// Custom tag encoders, in priority order
    pub encoders: Encoders,
    /// Custom tag decoders, in priority order
    pub decoders: Decoders,
    /// Limits applied to every call
    pub limits: Limits,
}

impl Codec {
    /// Create a codec with empty registries and no limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an encoder
    pub fn with_encoder(mut self, encoder: TagEncoder) -> Self {
        self.encoders.register(encoder);
        self
    }

    /// Register a decoder
    pub fn with_decoder(mut self, decoder: TagDecoder) -> Self {
        self.decoders.register(decoder);
        self
    }

    /// Replace the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Encode to wire text
    pub fn encode(&self, value: &Value) -> Result<String> {
        encode_with(value, &self.encoders, &self.limits)
    }

    /// Decode wire text
    pub fn decode(&self, text: &str) -> Result<Value> {
        decode_with(text, &self.decoders, &self.limits)
    }

    /// Encode to the structured table
    pub fn flatten(&self, value: &Value) -> Result<Wire> {
        flatten(value, &self.encoders, &self.limits)
    }

    /// Decode an already-parsed JSON document
    pub fn unflatten(&self, json: serde_json::Value) -> Result<Value> {
        unflatten(json, &self.decoders, &self.limits)
    }
}
