//! Value graph type definitions for Massive Jsonify
//!
//! `Value` is the closed universe of serializable values. Scalars are stored
//! inline; every other kind lives behind an `Rc` so that a node can be reached
//! from several places (aliasing) or from inside itself (cycles). The address
//! of that `Rc` allocation is the node's identity.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable node storage. Containers need interior mutability so the
/// decoder can publish an empty shell before its children exist.
pub type Shared<T> = Rc<RefCell<T>>;

/// A serializable value
#[derive(Clone)]
pub enum Value {
    /// Absent value (JavaScript `undefined`)
    Undefined,
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Double-precision number. NaN, the infinities and negative zero are
    /// valid here and travel as sentinels on the wire.
    Number(f64),
    /// String value
    String(String),
    /// Arbitrary-precision signed integer
    BigInt(BigInt),
    /// Byte array
    Bytes(Rc<[u8]>),
    /// Ordered list of values; `None` marks a hole
    Sequence(Shared<Vec<Option<Value>>>),
    /// Ordered string-keyed map
    Record(Shared<Record>),
    /// Point in time
    Temporal(Rc<DateTime<Utc>>),
    /// Text pattern plus flags
    Pattern(Rc<Pattern>),
    /// Set of members, kept in insertion order
    Set(Shared<Vec<Value>>),
    /// Ordered list of key/value pairs
    Map(Shared<Vec<(Value, Value)>>),
    /// Value carrying its own tag
    Tagged(Rc<Tagged>),
    /// Application object, encodable only through a tag encoder
    Host(Host),
}

/// Ordered string-keyed fields with unique keys
#[derive(Clone, Default, Debug)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

/// A text pattern (regular expression source) and its flags
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// Pattern source text
    pub source: String,
    /// Flag characters
    pub flags: String,
}

/// An explicitly tagged value
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    /// Tag name
    pub tag: String,
    /// Tagged payload
    pub payload: Value,
}

/// Behaviour required from application objects stored in a `Value`
pub trait HostObject: Any + fmt::Debug {
    /// Upcast for downcasting back to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Concrete type name, used in diagnostics
    fn type_name(&self) -> &'static str;

    /// Structural equality against another host object
    fn host_eq(&self, other: &dyn HostObject) -> bool;
}

impl<T: Any + fmt::Debug + PartialEq> HostObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn host_eq(&self, other: &dyn HostObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }
}

/// Shared handle to an application object
#[derive(Clone)]
pub struct Host(Rc<dyn HostObject>);

impl Host {
    /// Wrap an application object
    pub fn new<T: HostObject>(object: T) -> Self {
        Self(Rc::new(object))
    }

    /// Borrow the object as its concrete type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Concrete type name of the object
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Check if both handles point at the same object
    pub fn ptr_eq(&self, other: &Host) -> bool {
        self.address() == other.address()
    }

    fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

// Record implementations
impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `capacity` fields
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Insert a field, replacing (in place) and returning any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    /// Get a field by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Check if a field exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Remove a field, preserving the order of the others
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

// Value implementations
impl Value {
    /// Create a dense sequence
    pub fn sequence(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Sequence(Rc::new(RefCell::new(items.into_iter().map(Some).collect())))
    }

    /// Create a sequence that may contain holes (`None`)
    pub fn sparse(items: impl IntoIterator<Item = Option<Value>>) -> Self {
        Value::Sequence(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Create a record from key/value pairs
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(Rc::new(RefCell::new(fields.into_iter().collect())))
    }

    /// Create a set
    pub fn set(members: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(Rc::new(RefCell::new(members.into_iter().collect())))
    }

    /// Create a map
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    /// Create a byte array
    pub fn bytes(bytes: impl Into<Rc<[u8]>>) -> Self {
        Value::Bytes(bytes.into())
    }

    /// Create a temporal value
    pub fn temporal(at: DateTime<Utc>) -> Self {
        Value::Temporal(Rc::new(at))
    }

    /// Create a pattern
    pub fn pattern(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Value::Pattern(Rc::new(Pattern {
            source: source.into(),
            flags: flags.into(),
        }))
    }

    /// Create a self-tagged value
    pub fn tagged(tag: impl Into<String>, payload: Value) -> Self {
        Value::Tagged(Rc::new(Tagged {
            tag: tag.into(),
            payload,
        }))
    }

    /// Wrap an application object
    pub fn host<T: HostObject>(object: T) -> Self {
        Value::Host(Host::new(object))
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get value as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get value as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get value as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get value as big integer
    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Value::BigInt(n) => Some(n),
            _ => None,
        }
    }

    /// Get value as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get the sequence node
    pub fn as_sequence(&self) -> Option<&Shared<Vec<Option<Value>>>> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Get the record node
    pub fn as_record(&self) -> Option<&Shared<Record>> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Get the set node
    pub fn as_set(&self) -> Option<&Shared<Vec<Value>>> {
        match self {
            Value::Set(members) => Some(members),
            _ => None,
        }
    }

    /// Get the map node
    pub fn as_map(&self) -> Option<&Shared<Vec<(Value, Value)>>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Get value as a point in time
    pub fn as_temporal(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Temporal(at) => Some(at),
            _ => None,
        }
    }

    /// Get value as a pattern
    pub fn as_pattern(&self) -> Option<&Pattern> {
        match self {
            Value::Pattern(p) => Some(p),
            _ => None,
        }
    }

    /// Get value as a tagged value
    pub fn as_tagged(&self) -> Option<&Tagged> {
        match self {
            Value::Tagged(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow a host object as its concrete type
    pub fn downcast_host<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Host(host) => host.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::BigInt(_) => "bigint",
            Value::Bytes(_) => "bytes",
            Value::Sequence(_) => "sequence",
            Value::Record(_) => "record",
            Value::Temporal(_) => "temporal",
            Value::Pattern(_) => "pattern",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Tagged(_) => "tagged",
            Value::Host(host) => host.type_name(),
        }
    }

    /// Identity of a reference-bearing node (its allocation address).
    /// Scalars and unit values have none.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Undefined
            | Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::BigInt(_) => None,
            Value::Bytes(b) => Some(Rc::as_ptr(b) as *const () as usize),
            Value::Sequence(n) => Some(Rc::as_ptr(n) as *const () as usize),
            Value::Record(n) => Some(Rc::as_ptr(n) as *const () as usize),
            Value::Temporal(n) => Some(Rc::as_ptr(n) as *const () as usize),
            Value::Pattern(n) => Some(Rc::as_ptr(n) as *const () as usize),
            Value::Set(n) => Some(Rc::as_ptr(n) as *const () as usize),
            Value::Map(n) => Some(Rc::as_ptr(n) as *const () as usize),
            Value::Tagged(n) => Some(Rc::as_ptr(n) as *const () as usize),
            Value::Host(host) => Some(host.address()),
        }
    }

    /// Check if both values are the very same node
    pub fn same_node(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Structural equality.
    ///
    /// Numbers compare with SameValue semantics (NaN equals NaN, `-0` differs
    /// from `0`), records compare as unordered maps, and a pair of nodes that
    /// is already being compared further up is assumed equal, so cyclic graphs
    /// terminate.
    pub fn deep_eq(&self, other: &Value) -> bool {
        let mut assumed = HashSet::new();
        deep_eq_inner(self, other, &mut assumed)
    }
}

fn same_number(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

fn deep_eq_inner(a: &Value, b: &Value, assumed: &mut HashSet<(usize, usize)>) -> bool {
    if let (Some(x), Some(y)) = (a.identity(), b.identity()) {
        if x == y || !assumed.insert((x, y)) {
            return true;
        }
    }

    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => same_number(*x, *y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x[..] == y[..],
        (Value::Temporal(x), Value::Temporal(y)) => x == y,
        (Value::Pattern(x), Value::Pattern(y)) => x == y,
        (Value::Sequence(x), Value::Sequence(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|pair| match pair {
                    (None, None) => true,
                    (Some(v), Some(w)) => deep_eq_inner(v, w, assumed),
                    _ => false,
                })
        }
        (Value::Record(x), Value::Record(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(key, v)| {
                    y.get(key)
                        .map_or(false, |w| deep_eq_inner(v, w, assumed))
                })
        }
        (Value::Set(x), Value::Set(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|(v, w)| deep_eq_inner(v, w, assumed))
        }
        (Value::Map(x), Value::Map(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|((k1, v1), (k2, v2))| {
                    deep_eq_inner(k1, k2, assumed) && deep_eq_inner(v1, v2, assumed)
                })
        }
        (Value::Tagged(x), Value::Tagged(y)) => {
            x.tag == y.tag && deep_eq_inner(&x.payload, &y.payload, assumed)
        }
        (Value::Host(x), Value::Host(y)) => x.0.host_eq(y.0.as_ref()),
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = RefCell::new(Vec::new());
        let node = DebugNode {
            value: self,
            active: &active,
        };
        fmt::Debug::fmt(&node, f)
    }
}

/// Debug adapter that prints `<cycle>` instead of re-entering a node that is
/// already being printed.
struct DebugNode<'a> {
    value: &'a Value,
    active: &'a RefCell<Vec<usize>>,
}

enum DebugSlot<'a> {
    Hole,
    Node(DebugNode<'a>),
}

impl fmt::Debug for DebugSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugSlot::Hole => f.write_str("<hole>"),
            DebugSlot::Node(node) => fmt::Debug::fmt(node, f),
        }
    }
}

impl<'a> DebugNode<'a> {
    fn fmt_node(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::Bytes(b) => write!(f, "Bytes({:?})", &b[..]),
            Value::Temporal(at) => write!(f, "Temporal({})", at.to_rfc3339()),
            Value::Pattern(p) => write!(f, "/{}/{}", p.source, p.flags),
            Value::Host(host) => fmt::Debug::fmt(host, f),
            Value::Tagged(t) => f
                .debug_tuple(&t.tag)
                .field(&self.child(&t.payload))
                .finish(),
            Value::Sequence(items) => {
                let items = items.borrow();
                let mut list = f.debug_list();
                for item in items.iter() {
                    match item {
                        Some(value) => list.entry(&DebugSlot::Node(self.child(value))),
                        None => list.entry(&DebugSlot::Hole),
                    };
                }
                list.finish()
            }
            Value::Record(record) => {
                let record = record.borrow();
                let mut map = f.debug_map();
                for (key, value) in record.iter() {
                    map.entry(&key, &self.child(value));
                }
                map.finish()
            }
            Value::Set(members) => {
                let members = members.borrow();
                f.write_str("Set ")?;
                let mut set = f.debug_set();
                for member in members.iter() {
                    set.entry(&self.child(member));
                }
                set.finish()
            }
            Value::Map(entries) => {
                let entries = entries.borrow();
                f.write_str("Map ")?;
                let mut map = f.debug_map();
                for (key, value) in entries.iter() {
                    map.entry(&self.child(key), &self.child(value));
                }
                map.finish()
            }
        }
    }

    // Children of a `RefCell` borrow cannot outlive the borrow guard, so they
    // get a node with a shorter lifetime sharing the same active stack.
    fn child<'b>(&self, value: &'b Value) -> DebugNode<'b>
    where
        'a: 'b,
    {
        DebugNode {
            value,
            active: self.active,
        }
    }
}

impl fmt::Debug for DebugNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(id) = self.value.identity() else {
            return self.fmt_node(f);
        };
        if self.active.borrow().contains(&id) {
            return f.write_str("<cycle>");
        }
        self.active.borrow_mut().push(id);
        let result = self.fmt_node(f);
        self.active.borrow_mut().pop();
        result
    }
}

// Convenient constructors
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInt(n)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::sequence(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(Rc::new(RefCell::new(record)))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(at: DateTime<Utc>) -> Self {
        Value::temporal(at)
    }
}

impl From<Pattern> for Value {
    fn from(p: Pattern) -> Self {
        Value::Pattern(Rc::new(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_number_equality_uses_same_value() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(0.0), Value::Number(-0.0));
        assert_eq!(Value::Number(1.5), Value::Number(1.5));
        assert_ne!(Value::Undefined, Value::Null);
    }

    #[test]
    fn test_record_insert_replaces_in_place() {
        let mut record = Record::new();
        assert!(record.insert("a", 1.into()).is_none());
        record.insert("b", 2.into());
        let old = record.insert("a", 3.into());
        assert_eq!(old, Some(Value::from(1)));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&Value::from(3)));
        assert_eq!(record.remove("a"), Some(Value::from(3)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_wide_records_index_by_key() {
        let record: Record = (0..50_000).map(|i| (format!("f{}", i), Value::from(i))).collect();
        assert_eq!(record.len(), 50_000);
        assert_eq!(record.get("f49999"), Some(&Value::from(49_999)));
        assert_eq!(record.keys().nth(2), Some("f2"));

        let copy = Value::from(record.clone());
        assert_eq!(copy, Value::from(record));
    }

    #[test]
    fn test_records_compare_as_unordered_maps() {
        let a = Value::record([("x", Value::from(1)), ("y", Value::from(2))]);
        let b = Value::record([("y", Value::from(2)), ("x", Value::from(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_holes_differ_from_undefined() {
        let holey = Value::sparse([Some(1.into()), None]);
        let dense = Value::sequence([1.into(), Value::Undefined]);
        assert_ne!(holey, dense);
    }

    #[test]
    fn test_cyclic_values_compare_and_print() {
        let make = || {
            let node = Value::record([("a", Value::from(1))]);
            if let Value::Record(record) = &node {
                record.borrow_mut().insert("self", node.clone());
            }
            node
        };
        let (a, b) = (make(), make());
        assert_eq!(a, b);
        assert!(!a.same_node(&b));
        assert!(format!("{:?}", a).contains("<cycle>"));
    }

    #[test]
    fn test_host_objects() {
        let a = Value::host(Point { x: 1, y: 2 });
        let b = Value::host(Point { x: 1, y: 2 });
        assert_eq!(a, b);
        assert_eq!(a.downcast_host::<Point>(), Some(&Point { x: 1, y: 2 }));
        assert!(a.downcast_host::<String>().is_none());
        assert!(a.kind_name().ends_with("Point"));
        assert!(a.identity().is_some());
        assert!(Value::from("s").identity().is_none());
    }
}
