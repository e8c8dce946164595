//! Wire format for flattened value graphs
//!
//! A payload is either a bare sentinel integer (the root was a unit value) or
//! a JSON array of slot entries whose element 0 is the root. Entries never
//! nest values directly; they point at other slots through references.
//!
//! ```text
//! wire      := sentinel | [entry, entry, ...]
//! entry     := number | string | bool | null        leaf
//!            | [ref, ref, ...]                      sequence (holes allowed)
//!            | {"key": ref, ...}                    record
//!            | ["tag", ref]                         tagged value
//! ref       := slot index (>= 0) | sentinel (< 0)
//! ```
//!
//! A sequence can never start with a string (its elements are integers), so a
//! two-element array led by a string is always a tagged entry.

use crate::core::error::{Error, Result};
use crate::core::types::Value;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Largest magnitude at which every integer is exactly representable in f64
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Reserved negative references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// `undefined` (-1)
    Undefined,
    /// `null` (-2)
    Null,
    /// Not-a-number (-3)
    NaN,
    /// Positive infinity (-4)
    PositiveInfinity,
    /// Negative infinity (-5)
    NegativeInfinity,
    /// Negative zero (-6)
    NegativeZero,
    /// Missing sequence position (-7), valid only inside a sequence entry
    Hole,
}

impl Sentinel {
    /// Every sentinel, in wire-code order
    pub const ALL: [Sentinel; 7] = [
        Sentinel::Undefined,
        Sentinel::Null,
        Sentinel::NaN,
        Sentinel::PositiveInfinity,
        Sentinel::NegativeInfinity,
        Sentinel::NegativeZero,
        Sentinel::Hole,
    ];

    /// Integer used on the wire
    pub fn code(self) -> i64 {
        match self {
            Sentinel::Undefined => -1,
            Sentinel::Null => -2,
            Sentinel::NaN => -3,
            Sentinel::PositiveInfinity => -4,
            Sentinel::NegativeInfinity => -5,
            Sentinel::NegativeZero => -6,
            Sentinel::Hole => -7,
        }
    }

    /// Parse a wire integer
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Sentinel standing in for a number JSON cannot carry, if any
    pub fn for_number(n: f64) -> Option<Self> {
        if n.is_nan() {
            Some(Sentinel::NaN)
        } else if n == f64::INFINITY {
            Some(Sentinel::PositiveInfinity)
        } else if n == f64::NEG_INFINITY {
            Some(Sentinel::NegativeInfinity)
        } else if n == 0.0 && n.is_sign_negative() {
            Some(Sentinel::NegativeZero)
        } else {
            None
        }
    }

    /// The unit value this sentinel denotes. Holes denote no value.
    pub fn to_value(self) -> Option<Value> {
        match self {
            Sentinel::Undefined => Some(Value::Undefined),
            Sentinel::Null => Some(Value::Null),
            Sentinel::NaN => Some(Value::Number(f64::NAN)),
            Sentinel::PositiveInfinity => Some(Value::Number(f64::INFINITY)),
            Sentinel::NegativeInfinity => Some(Value::Number(f64::NEG_INFINITY)),
            Sentinel::NegativeZero => Some(Value::Number(-0.0)),
            Sentinel::Hole => None,
        }
    }
}

/// A pointer from one entry to a slot or a sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Index into the slot table
    Slot(usize),
    /// Reserved constant
    Sentinel(Sentinel),
}

impl Reference {
    /// Integer used on the wire
    pub fn to_wire(self) -> i64 {
        match self {
            Reference::Slot(index) => index as i64,
            Reference::Sentinel(s) => s.code(),
        }
    }

    /// Parse a wire integer
    pub fn from_wire(raw: i64) -> Result<Self> {
        if raw >= 0 {
            return usize::try_from(raw)
                .map(Reference::Slot)
                .map_err(|_| Error::malformed(format!("slot index {} out of range", raw)));
        }
        Sentinel::from_code(raw)
            .map(Reference::Sentinel)
            .ok_or_else(|| Error::malformed(format!("unknown sentinel {}", raw)))
    }

    /// Check if this is the hole sentinel
    pub fn is_hole(self) -> bool {
        self == Reference::Sentinel(Sentinel::Hole)
    }

    fn from_json(json: &JsonValue) -> Result<Self> {
        let raw = json
            .as_i64()
            .ok_or_else(|| Error::malformed(format!("expected an integer reference, got {}", json)))?;
        Self::from_wire(raw)
    }

    fn from_json_solid(json: &JsonValue, context: &str) -> Result<Self> {
        let reference = Self::from_json(json)?;
        if reference.is_hole() {
            return Err(Error::malformed(format!("hole sentinel inside {}", context)));
        }
        Ok(reference)
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_wire())
    }
}

/// A scalar stored directly in a slot
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    /// Finite number
    Number(f64),
    /// String
    String(String),
    /// Boolean
    Bool(bool),
    /// JSON null
    Null,
}

impl Leaf {
    /// Convert to a value
    pub fn to_value(&self) -> Value {
        match self {
            Leaf::Number(n) => Value::Number(*n),
            Leaf::String(s) => Value::String(s.clone()),
            Leaf::Bool(b) => Value::Bool(*b),
            Leaf::Null => Value::Null,
        }
    }
}

impl Serialize for Leaf {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            // Integral values are written without a fraction, as JSON.stringify does
            Leaf::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Leaf::Number(n) => serializer.serialize_f64(*n),
            Leaf::String(s) => serializer.serialize_str(s),
            Leaf::Bool(b) => serializer.serialize_bool(*b),
            Leaf::Null => serializer.serialize_unit(),
        }
    }
}

/// One slot of the table
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Scalar payload
    Leaf(Leaf),
    /// Sequence of references; `Sentinel::Hole` marks a missing position
    Sequence(Vec<Reference>),
    /// Record whose field values are references
    Record(Vec<(String, Reference)>),
    /// Tag name and payload reference
    Tagged(String, Reference),
}

impl Entry {
    /// Classify a parsed JSON element as a slot entry
    pub fn from_json(json: JsonValue) -> Result<Self> {
        Ok(match json {
            JsonValue::Null => Entry::Leaf(Leaf::Null),
            JsonValue::Bool(b) => Entry::Leaf(Leaf::Bool(b)),
            JsonValue::String(s) => Entry::Leaf(Leaf::String(s)),
            JsonValue::Number(n) => {
                let n = n
                    .as_f64()
                    .ok_or_else(|| Error::malformed(format!("unrepresentable number {}", n)))?;
                Entry::Leaf(Leaf::Number(n))
            }
            JsonValue::Array(items) => match items.as_slice() {
                [JsonValue::String(tag), payload] => Entry::Tagged(
                    tag.clone(),
                    Reference::from_json_solid(payload, "a tagged entry")?,
                ),
                _ => Entry::Sequence(
                    items
                        .iter()
                        .map(Reference::from_json)
                        .collect::<Result<Vec<_>>>()?,
                ),
            },
            JsonValue::Object(fields) => Entry::Record(
                fields
                    .into_iter()
                    .map(|(key, value)| {
                        Ok((key, Reference::from_json_solid(&value, "a record entry")?))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    /// Every reference held by this entry
    pub fn references(&self) -> Box<dyn Iterator<Item = Reference> + '_> {
        match self {
            Entry::Leaf(_) => Box::new(std::iter::empty()),
            Entry::Sequence(refs) => Box::new(refs.iter().copied()),
            Entry::Record(fields) => Box::new(fields.iter().map(|(_, r)| *r)),
            Entry::Tagged(_, payload) => Box::new(std::iter::once(*payload)),
        }
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Entry::Leaf(leaf) => leaf.serialize(serializer),
            Entry::Sequence(refs) => refs.serialize(serializer),
            Entry::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, reference) in fields {
                    map.serialize_entry(key, reference)?;
                }
                map.end()
            }
            Entry::Tagged(tag, payload) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(tag)?;
                seq.serialize_element(payload)?;
                seq.end()
            }
        }
    }
}

/// A complete flattened payload
#[derive(Debug, Clone, PartialEq)]
pub enum Wire {
    /// Bare sentinel: the root was a unit value
    Sentinel(Sentinel),
    /// Bare leaf. Only produced by foreign encoders; accepted when decoding.
    Leaf(Leaf),
    /// Slot table, root at index 0
    Table(Vec<Entry>),
}

impl Wire {
    /// Parse wire text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: JsonValue = serde_json::from_str(text)?;
        Self::from_json_value(json)
    }

    /// Interpret an already-parsed JSON document
    pub fn from_json_value(json: JsonValue) -> Result<Self> {
        match json {
            JsonValue::Array(entries) => {
                if entries.is_empty() {
                    return Err(Error::malformed("empty slot table"));
                }
                let entries = entries
                    .into_iter()
                    .map(Entry::from_json)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Wire::Table(entries))
            }
            // A bare number is a reference into a table that does not exist
            JsonValue::Number(ref n) => match Reference::from_json(&json)? {
                Reference::Sentinel(Sentinel::Hole) => {
                    Err(Error::malformed("hole sentinel outside a sequence"))
                }
                Reference::Sentinel(s) => Ok(Wire::Sentinel(s)),
                Reference::Slot(_) => Err(Error::DanglingReference {
                    reference: n.as_i64().unwrap_or_default(),
                    table_len: 0,
                }),
            },
            JsonValue::Object(_) => Err(Error::malformed("top level must be an array or a sentinel")),
            leaf => match Entry::from_json(leaf)? {
                Entry::Leaf(leaf) => Ok(Wire::Leaf(leaf)),
                _ => Err(Error::malformed("top level must be an array or a sentinel")),
            },
        }
    }

    /// Render as compact JSON text
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::internal(format!("Failed to render wire: {}", e)))
    }

    /// Render as a JSON document
    pub fn to_json_value(&self) -> Result<JsonValue> {
        serde_json::to_value(self).map_err(|e| Error::internal(format!("Failed to render wire: {}", e)))
    }

    /// Number of slots (0 for bare payloads)
    pub fn table_len(&self) -> usize {
        match self {
            Wire::Table(entries) => entries.len(),
            _ => 0,
        }
    }
}

impl Serialize for Wire {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Wire::Sentinel(s) => serializer.serialize_i64(s.code()),
            Wire::Leaf(leaf) => leaf.serialize(serializer),
            Wire::Table(entries) => entries.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_codes_are_distinct_and_negative() {
        for (i, s) in Sentinel::ALL.iter().enumerate() {
            assert!(s.code() < 0);
            assert_eq!(Sentinel::from_code(s.code()), Some(*s));
            assert_eq!(s.code(), -(i as i64) - 1);
        }
        assert_eq!(Sentinel::from_code(-8), None);
    }

    #[test]
    fn test_special_numbers_map_to_sentinels() {
        assert_eq!(Sentinel::for_number(f64::NAN), Some(Sentinel::NaN));
        assert_eq!(Sentinel::for_number(f64::INFINITY), Some(Sentinel::PositiveInfinity));
        assert_eq!(Sentinel::for_number(f64::NEG_INFINITY), Some(Sentinel::NegativeInfinity));
        assert_eq!(Sentinel::for_number(-0.0), Some(Sentinel::NegativeZero));
        assert_eq!(Sentinel::for_number(0.0), None);
        assert_eq!(Sentinel::for_number(-1.5), None);
    }

    #[test]
    fn test_entry_classification() {
        let entry = Entry::from_json(serde_json::json!(["Point", 1])).unwrap();
        assert_eq!(entry, Entry::Tagged("Point".to_string(), Reference::Slot(1)));

        let entry = Entry::from_json(serde_json::json!([1, -7, -1])).unwrap();
        assert_eq!(
            entry,
            Entry::Sequence(vec![
                Reference::Slot(1),
                Reference::Sentinel(Sentinel::Hole),
                Reference::Sentinel(Sentinel::Undefined),
            ])
        );

        let entry = Entry::from_json(serde_json::json!({"b": 2, "a": -2})).unwrap();
        assert_eq!(
            entry,
            Entry::Record(vec![
                ("b".to_string(), Reference::Slot(2)),
                ("a".to_string(), Reference::Sentinel(Sentinel::Null)),
            ])
        );
    }

    #[test]
    fn test_entry_rejects_bad_references() {
        assert!(Entry::from_json(serde_json::json!([1.5])).is_err());
        assert!(Entry::from_json(serde_json::json!([-99])).is_err());
        assert!(Entry::from_json(serde_json::json!({"a": -7})).is_err());
        assert!(Entry::from_json(serde_json::json!(["Tag", -7])).is_err());
    }

    #[test]
    fn test_numbers_render_like_javascript() {
        let wire = Wire::Table(vec![
            Entry::Leaf(Leaf::Number(30.0)),
            Entry::Leaf(Leaf::Number(0.5)),
            Entry::Leaf(Leaf::Number(-12.0)),
            Entry::Leaf(Leaf::Number(1e300)),
        ]);
        assert_eq!(wire.to_json_string().unwrap(), "[30,0.5,-12,1e+300]");
    }

    #[test]
    fn test_bare_payloads() {
        assert_eq!(Wire::from_json_str("-1").unwrap(), Wire::Sentinel(Sentinel::Undefined));
        assert_eq!(
            Wire::from_json_str("\"hi\"").unwrap(),
            Wire::Leaf(Leaf::String("hi".to_string()))
        );
        assert!(matches!(
            Wire::from_json_str("3"),
            Err(Error::DanglingReference { reference: 3, table_len: 0 })
        ));
        assert!(matches!(Wire::from_json_str("-7"), Err(Error::MalformedWireFormat(_))));
        assert!(matches!(Wire::from_json_str("[]"), Err(Error::MalformedWireFormat(_))));
        assert!(matches!(Wire::from_json_str("{}"), Err(Error::MalformedWireFormat(_))));
        assert!(matches!(Wire::from_json_str("[1,"), Err(Error::MalformedWireFormat(_))));
        assert_eq!(Wire::Sentinel(Sentinel::NaN).to_json_string().unwrap(), "-3");
    }
}
