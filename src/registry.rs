//! Caller-supplied tag encoders and decoders
//!
//! Registries are plain ordered lists passed to each call. Encoders are tried
//! in registration order and the first one that claims a value wins; decoders
//! are looked up by tag, again first match wins. Both are consulted before the
//! built-in tags, so a caller can take over any built-in name.

use crate::core::error::Result;
use crate::core::types::Value;
use std::any::Any;
use std::fmt;

type EncodeFn = dyn Fn(&Value) -> Option<Value> + Send + Sync;
type DecodeFn = dyn Fn(Value) -> Result<Value> + Send + Sync;

/// Turns values of one kind into a tag plus payload
pub struct TagEncoder {
    tag: String,
    encode: Box<EncodeFn>,
}

impl TagEncoder {
    /// Create an encoder. `encode` returns `None` for values it does not claim.
    pub fn new(
        tag: impl Into<String>,
        encode: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tag: tag.into(),
            encode: Box::new(encode),
        }
    }

    /// Create an encoder claiming every host object of type `T`
    pub fn for_host<T: Any>(
        tag: impl Into<String>,
        encode: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::new(tag, move |value| value.downcast_host::<T>().map(|object| encode(object)))
    }

    /// Tag written for claimed values
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Produce the payload for `value`, if claimed
    pub fn encode(&self, value: &Value) -> Option<Value> {
        (self.encode)(value)
    }
}

impl fmt::Debug for TagEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagEncoder").field("tag", &self.tag).finish()
    }
}

/// Rebuilds a value from the payload of one tag
pub struct TagDecoder {
    tag: String,
    decode: Box<DecodeFn>,
}

impl TagDecoder {
    /// Create an infallible decoder
    pub fn new(
        tag: impl Into<String>,
        decode: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::fallible(tag, move |payload| Ok(decode(payload)))
    }

    /// Create a decoder that may reject its payload
    pub fn fallible(
        tag: impl Into<String>,
        decode: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tag: tag.into(),
            decode: Box::new(decode),
        }
    }

    /// Create a decoder that rebuilds the tagged value itself
    pub fn keep_tagged(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let name = tag.clone();
        Self::new(tag, move |payload| Value::tagged(name.clone(), payload))
    }

    /// Tag this decoder handles
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Rebuild a value from its hydrated payload
    pub fn decode(&self, payload: Value) -> Result<Value> {
        (self.decode)(payload)
    }
}

impl fmt::Debug for TagDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDecoder").field("tag", &self.tag).finish()
    }
}

/// Ordered encoder registry
#[derive(Debug, Default)]
pub struct Encoders {
    entries: Vec<TagEncoder>,
}

impl Encoders {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an encoder, builder style
    pub fn with(mut self, encoder: TagEncoder) -> Self {
        self.register(encoder);
        self
    }

    /// Append an encoder
    pub fn register(&mut self, encoder: TagEncoder) {
        self.entries.push(encoder);
    }

    /// Number of registered encoders
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no encoders are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate encoders in priority order
    pub fn iter(&self) -> impl Iterator<Item = &TagEncoder> {
        self.entries.iter()
    }

    /// First encoder claiming `value`, with the payload it produced
    pub fn claim(&self, value: &Value) -> Option<(&str, Value)> {
        self.entries
            .iter()
            .find_map(|encoder| encoder.encode(value).map(|payload| (encoder.tag(), payload)))
    }
}

impl FromIterator<TagEncoder> for Encoders {
    fn from_iter<I: IntoIterator<Item = TagEncoder>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Ordered decoder registry
#[derive(Debug, Default)]
pub struct Decoders {
    entries: Vec<TagDecoder>,
}

impl Decoders {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoder, builder style
    pub fn with(mut self, decoder: TagDecoder) -> Self {
        self.register(decoder);
        self
    }

    /// Append a decoder
    pub fn register(&mut self, decoder: TagDecoder) {
        self.entries.push(decoder);
    }

    /// Number of registered decoders
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no decoders are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First decoder registered for `tag`
    pub fn find(&self, tag: &str) -> Option<&TagDecoder> {
        self.entries.iter().find(|decoder| decoder.tag() == tag)
    }
}

impl FromIterator<TagDecoder> for Decoders {
    fn from_iter<I: IntoIterator<Item = TagDecoder>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
