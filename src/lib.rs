//! Massive Jsonify - Reference-Preserving Structured Serialization
//!
//! Massive Jsonify turns an in-memory value graph into JSON text and back
//! without losing what plain JSON cannot express: shared references, cycles,
//! sparse sequences, `undefined`, the special numbers, and exotic kinds such
//! as big integers, byte arrays, timestamps, patterns, sets and maps.
//!
//! The graph is flattened into a slot table where every entry points at
//! other entries by index, so a node reached twice is written once:
//!
//! ```
//! use massive_jsonify::{decode, encode, Decoders, Encoders, Value};
//!
//! let node = Value::record([("a", Value::from(1))]);
//! node.as_record().unwrap().borrow_mut().insert("self", node.clone());
//!
//! let text = encode(&node, &Encoders::new()).unwrap();
//! assert_eq!(text, r#"[{"a":1,"self":0},1]"#);
//!
//! let back = decode(&text, &Decoders::new()).unwrap();
//! let again = back.as_record().unwrap().borrow().get("self").cloned().unwrap();
//! assert!(again.same_node(&back));
//! ```
//!
//! Application types are carried through caller-supplied tag encoders and
//! decoders, passed per call (see [`registry`]).
#![warn(missing_docs)]

// Core foundational modules
pub mod core;

// Main functional modules
pub mod wire;
pub mod registry;
pub mod codec;

// Re-export commonly used items for convenience
pub use crate::core::{Config, Error, Limits, LoggingConfig, Record, Result, Value};
pub use crate::core::types::{Host, HostObject, Pattern, Tagged};
pub use codec::{decode, decode_with, encode, encode_with, flatten, hydrate, unflatten, Codec};
pub use registry::{Decoders, Encoders, TagDecoder, TagEncoder};
pub use wire::{Entry, Leaf, Reference, Sentinel, Wire};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Install a `tracing` subscriber configured from `config`.
///
/// `RUST_LOG`, when set, takes precedence over `config.level`. Calling this
/// more than once (or after another subscriber was installed) fails with a
/// configuration error and leaves the existing subscriber in place.
pub fn init(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::config(format!("Invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format.as_str() {
        "compact" => builder.compact().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| Error::config(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!("Initializing {} v{}", NAME, VERSION);
    Ok(())
}
