//! Built-in tags for the exotic value kinds
//!
//! | kind     | tag          | payload                              |
//! |----------|--------------|--------------------------------------|
//! | BigInt   | `BigInt`     | decimal string                       |
//! | Bytes    | `Uint8Array` | standard padded base64 string        |
//! | Temporal | `Date`       | RFC 3339 string in UTC (signed year) |
//! | Pattern  | `RegExp`     | sequence `[source, flags]`           |
//! | Set      | `Set`        | sequence of members                  |
//! | Map      | `Map`        | flat sequence `[k0, v0, k1, v1, ..]` |
//!
//! Set and Map members are full graph references, so they are expanded by
//! the encoder and filled by the decoder rather than revived here.

use crate::core::error::{Error, Result};
use crate::core::types::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, ParseError, SecondsFormat, TimeZone, Utc};
use num_bigint::BigInt;

/// Tag for arbitrary-precision integers
pub const BIGINT_TAG: &str = "BigInt";
/// Tag for byte arrays
pub const BYTES_TAG: &str = "Uint8Array";
/// Tag for points in time
pub const TEMPORAL_TAG: &str = "Date";
/// Tag for text patterns
pub const PATTERN_TAG: &str = "RegExp";
/// Tag for sets
pub const SET_TAG: &str = "Set";
/// Tag for maps
pub const MAP_TAG: &str = "Map";

/// Every reserved built-in tag
pub const BUILTIN_TAGS: [&str; 6] = [BIGINT_TAG, BYTES_TAG, TEMPORAL_TAG, PATTERN_TAG, SET_TAG, MAP_TAG];

/// Check if `tag` names a built-in kind
pub fn is_builtin_tag(tag: &str) -> bool {
    BUILTIN_TAGS.contains(&tag)
}

/// How a built-in kind is laid out in the table
pub(crate) enum Builtin {
    /// Tag plus a single payload value
    Payload { tag: &'static str, payload: Value },
    /// Tag plus a sequence of member references
    Members { tag: &'static str, items: Vec<Value> },
}

/// Lay out a built-in kind, or `None` if `value` is not one
pub(crate) fn encode(value: &Value) -> Option<Builtin> {
    let builtin = match value {
        Value::BigInt(n) => Builtin::Payload {
            tag: BIGINT_TAG,
            payload: Value::String(n.to_string()),
        },
        Value::Bytes(bytes) => Builtin::Payload {
            tag: BYTES_TAG,
            payload: Value::String(STANDARD.encode(bytes)),
        },
        Value::Temporal(at) => Builtin::Payload {
            tag: TEMPORAL_TAG,
            payload: Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        },
        Value::Pattern(pattern) => Builtin::Payload {
            tag: PATTERN_TAG,
            payload: Value::sequence([
                Value::String(pattern.source.clone()),
                Value::String(pattern.flags.clone()),
            ]),
        },
        Value::Set(members) => Builtin::Members {
            tag: SET_TAG,
            items: members.borrow().clone(),
        },
        Value::Map(entries) => Builtin::Members {
            tag: MAP_TAG,
            items: entries
                .borrow()
                .iter()
                .flat_map(|(key, value)| [key.clone(), value.clone()])
                .collect(),
        },
        _ => return None,
    };
    Some(builtin)
}

/// Rebuild a leaf-like built-in from its hydrated payload
pub(crate) fn revive(tag: &str, payload: Value) -> Result<Value> {
    match tag {
        BIGINT_TAG => {
            let digits = payload_str(tag, &payload)?;
            digits
                .parse::<BigInt>()
                .map(Value::BigInt)
                .map_err(|e| Error::invalid_payload(tag, e.to_string()))
        }
        BYTES_TAG => {
            let text = payload_str(tag, &payload)?;
            STANDARD
                .decode(text)
                .map(Value::bytes)
                .map_err(|e| Error::invalid_payload(tag, e.to_string()))
        }
        TEMPORAL_TAG => {
            let text = payload_str(tag, &payload)?;
            parse_temporal(text)
                .map(Value::temporal)
                .map_err(|e| Error::invalid_payload(tag, e.to_string()))
        }
        PATTERN_TAG => {
            let Value::Sequence(parts) = &payload else {
                return Err(Error::invalid_payload(tag, "expected [source, flags]"));
            };
            let parts = parts.borrow();
            match parts.as_slice() {
                [Some(Value::String(source)), Some(Value::String(flags))] => {
                    Ok(Value::pattern(source.as_str(), flags.as_str()))
                }
                _ => Err(Error::invalid_payload(tag, "expected [source, flags]")),
            }
        }
        _ => Err(Error::unknown_tag(tag)),
    }
}

/// Parse an RFC 3339 timestamp. UTC stamps may carry the signed extended
/// year (`+10000-..`, `-0001-..`) that `to_rfc3339_opts` writes outside
/// 0000..=9999, which `parse_from_rfc3339` rejects.
fn parse_temporal(text: &str) -> std::result::Result<DateTime<Utc>, ParseError> {
    match text.strip_suffix('Z') {
        Some(utc) => NaiveDateTime::parse_from_str(utc, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Utc.from_utc_datetime(&naive)),
        None => DateTime::parse_from_rfc3339(text).map(|at| at.with_timezone(&Utc)),
    }
}

fn payload_str<'a>(tag: &str, payload: &'a Value) -> Result<&'a str> {
    payload
        .as_str()
        .ok_or_else(|| Error::invalid_payload(tag, format!("expected a string, got {}", payload.kind_name())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(value: &Value) -> (&'static str, Value) {
        match encode(value) {
            Some(Builtin::Payload { tag, payload }) => (tag, payload),
            _ => panic!("expected a payload builtin for {:?}", value),
        }
    }

    #[test]
    fn test_bigint_payload() {
        let n: BigInt = "-123456789012345678901234567890".parse().unwrap();
        let (tag, payload) = payload_of(&Value::BigInt(n.clone()));
        assert_eq!(tag, "BigInt");
        assert_eq!(payload.as_str(), Some("-123456789012345678901234567890"));
        assert_eq!(revive(tag, payload).unwrap(), Value::BigInt(n));
    }

    #[test]
    fn test_bytes_payload() {
        let (tag, payload) = payload_of(&Value::bytes(vec![0u8, 255, 16]));
        assert_eq!(tag, "Uint8Array");
        assert_eq!(payload.as_str(), Some("AP8Q"));
        assert_eq!(revive(tag, payload).unwrap().as_bytes(), Some(&[0u8, 255, 16][..]));
    }

    #[test]
    fn test_temporal_payload_keeps_precision() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap();
        let (tag, payload) = payload_of(&Value::temporal(at));
        assert_eq!(tag, "Date");
        assert_eq!(payload.as_str(), Some("2023-11-14T22:13:20.123Z"));
        assert_eq!(revive(tag, payload).unwrap().as_temporal(), Some(&at));

        let offset = revive(TEMPORAL_TAG, Value::from("2023-11-14T23:13:20.123+01:00")).unwrap();
        assert_eq!(offset.as_temporal(), Some(&at));
    }

    #[test]
    fn test_temporal_payload_outside_four_digit_years() {
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let (tag, payload) = payload_of(&Value::temporal(far));
        assert_eq!(payload.as_str(), Some("+10000-01-01T00:00:00Z"));
        assert_eq!(revive(tag, payload).unwrap().as_temporal(), Some(&far));

        let bce = Utc.with_ymd_and_hms(-1, 6, 1, 0, 0, 0).unwrap();
        let (tag, payload) = payload_of(&Value::temporal(bce));
        assert_eq!(payload.as_str(), Some("-0001-06-01T00:00:00Z"));
        assert_eq!(revive(tag, payload).unwrap().as_temporal(), Some(&bce));

        let epoch = revive(TEMPORAL_TAG, Value::from("0000-01-01T00:00:00.5Z")).unwrap();
        let year_zero = Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(epoch.as_temporal().map(|at| at.timestamp_millis()), Some(year_zero.timestamp_millis() + 500));
    }

    #[test]
    fn test_pattern_payload() {
        let (tag, payload) = payload_of(&Value::pattern("a+b", "gi"));
        assert_eq!(tag, "RegExp");
        let pattern = revive(tag, payload).unwrap();
        assert_eq!(pattern.as_pattern().map(|p| (p.source.as_str(), p.flags.as_str())), Some(("a+b", "gi")));
    }

    #[test]
    fn test_map_members_are_flattened() {
        let map = Value::map([(Value::from("k"), Value::from(1)), (Value::from(2), Value::Null)]);
        match encode(&map) {
            Some(Builtin::Members { tag, items }) => {
                assert_eq!(tag, "Map");
                assert_eq!(items, vec![Value::from("k"), Value::from(1), Value::from(2), Value::Null]);
            }
            _ => panic!("expected members"),
        }
        assert!(encode(&Value::from(1)).is_none());
        assert!(encode(&Value::sequence([])).is_none());
    }

    #[test]
    fn test_bad_payloads() {
        assert!(matches!(revive(BIGINT_TAG, Value::from("12x")), Err(Error::InvalidPayload { .. })));
        assert!(matches!(revive(BIGINT_TAG, Value::from(12)), Err(Error::InvalidPayload { .. })));
        assert!(matches!(revive(BYTES_TAG, Value::from("***")), Err(Error::InvalidPayload { .. })));
        assert!(matches!(revive(TEMPORAL_TAG, Value::from("yesterday")), Err(Error::InvalidPayload { .. })));
        assert!(matches!(revive(PATTERN_TAG, Value::sequence([Value::from("a")])), Err(Error::InvalidPayload { .. })));
        assert!(matches!(revive("Nope", Value::Null), Err(Error::UnknownTag { .. })));
        assert!(is_builtin_tag("Set"));
        assert!(!is_builtin_tag("Point"));
    }
}
