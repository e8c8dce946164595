//! Flattening a value graph into a slot table
//!
//! Traversal is depth-first with an explicit frame stack, so arbitrarily deep
//! graphs cannot overflow the call stack. A container gets its slot index the
//! moment it is first reached, before any of its children are visited; that
//! index is recorded against the node's identity, so later references to the
//! same node (including ones from inside the node itself) resolve to it. The
//! container's entry is written once its frame pops.

use super::builtins::{self, Builtin};
use crate::core::config::Limits;
use crate::core::error::{Error, Result};
use crate::core::types::Value;
use crate::registry::Encoders;
use crate::wire::{Entry, Leaf, Reference, Sentinel, Wire};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Flatten `root` into its wire form
pub fn flatten(root: &Value, encoders: &Encoders, limits: &Limits) -> Result<Wire> {
    Flattener::new(encoders, limits).run(root)
}

/// One step of the path to the value being visited, for diagnostics
#[derive(Debug, Clone)]
enum Segment {
    Index(usize),
    Key(String),
    Tag(String),
}

impl Segment {
    fn write_to(&self, path: &mut String) {
        let segment = match self {
            Segment::Index(i) => format!("[{}]", i),
            Segment::Key(key) if is_identifier(key) => format!(".{}", key),
            Segment::Key(key) => format!("[{:?}]", key),
            Segment::Tag(tag) => format!("<{}>", tag),
        };
        path.push_str(&segment);
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// How a non-leaf value is laid out
enum Shape {
    Sequence(Vec<Option<Value>>),
    Record(Vec<(String, Value)>),
    Tagged { tag: String, payload: Value },
    Members { tag: &'static str, items: Vec<Value> },
}

/// Children still to visit for an open container
enum Pending {
    Sequence {
        items: std::vec::IntoIter<Option<Value>>,
        refs: Vec<Reference>,
    },
    Record {
        fields: std::vec::IntoIter<(String, Value)>,
        key: Option<String>,
        refs: Vec<(String, Reference)>,
    },
    Tagged {
        tag: String,
        payload: Option<Value>,
        reference: Option<Reference>,
    },
}

struct Frame {
    slot: usize,
    pending: Pending,
    /// Segment printed before this frame's children (set members, map entries)
    via: Option<Segment>,
    /// Segment of the child most recently handed out
    current: Option<Segment>,
}

impl Frame {
    fn new(slot: usize, pending: Pending) -> Self {
        Self {
            slot,
            pending,
            via: None,
            current: None,
        }
    }

    /// Next child to visit. `Some(None)` is a hole.
    fn next_child(&mut self) -> Option<Option<Value>> {
        match &mut self.pending {
            Pending::Sequence { items, refs } => {
                let item = items.next()?;
                self.current = Some(Segment::Index(refs.len()));
                Some(item)
            }
            Pending::Record { fields, key, .. } => {
                let (name, value) = fields.next()?;
                self.current = Some(Segment::Key(name.clone()));
                *key = Some(name);
                Some(Some(value))
            }
            Pending::Tagged { tag, payload, .. } => {
                let value = payload.take()?;
                self.current = Some(Segment::Tag(tag.clone()));
                Some(Some(value))
            }
        }
    }

    /// Record the reference for the child last handed out
    fn accept(&mut self, child: Reference) {
        match &mut self.pending {
            Pending::Sequence { refs, .. } => refs.push(child),
            Pending::Record { key, refs, .. } => {
                if let Some(key) = key.take() {
                    refs.push((key, child));
                }
            }
            Pending::Tagged { reference, .. } => *reference = Some(child),
        }
    }

    fn finish(self) -> Result<Entry> {
        Ok(match self.pending {
            Pending::Sequence { refs, .. } => Entry::Sequence(refs),
            Pending::Record { refs, .. } => Entry::Record(refs),
            Pending::Tagged {
                tag,
                reference: Some(reference),
                ..
            } => Entry::Tagged(tag, reference),
            Pending::Tagged { tag, .. } => {
                return Err(Error::internal(format!("tagged slot `{}` closed without a payload", tag)))
            }
        })
    }
}

struct Flattener<'a> {
    encoders: &'a Encoders,
    limits: &'a Limits,
    table: Vec<Option<Entry>>,
    /// Node identity to slot index
    seen: HashMap<usize, usize>,
    /// Keeps every identified node alive so no address is reused mid-call
    retained: Vec<Value>,
    stack: Vec<Frame>,
}

impl<'a> Flattener<'a> {
    fn new(encoders: &'a Encoders, limits: &'a Limits) -> Self {
        Self {
            encoders,
            limits,
            table: Vec::new(),
            seen: HashMap::new(),
            retained: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn run(mut self, root: &Value) -> Result<Wire> {
        let root_ref = self.visit(root.clone())?;
        if let Reference::Sentinel(sentinel) = root_ref {
            return Ok(Wire::Sentinel(sentinel));
        }

        while let Some(top) = self.stack.len().checked_sub(1) {
            match self.stack[top].next_child() {
                Some(Some(child)) => {
                    let reference = self.visit(child)?;
                    self.stack[top].accept(reference);
                }
                Some(None) => self.stack[top].accept(Reference::Sentinel(Sentinel::Hole)),
                None => {
                    if let Some(frame) = self.stack.pop() {
                        let slot = frame.slot;
                        self.table[slot] = Some(frame.finish()?);
                    }
                }
            }
        }

        let entries = self
            .table
            .into_iter()
            .enumerate()
            .map(|(slot, entry)| {
                entry.ok_or_else(|| Error::internal(format!("slot {} was never written", slot)))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(slots = entries.len(), nodes = self.seen.len(), "Flattened value graph");
        Ok(Wire::Table(entries))
    }

    /// Reference for `value`, reserving a slot (and opening a frame) if new
    fn visit(&mut self, value: Value) -> Result<Reference> {
        let leaf = match &value {
            Value::Undefined => return Ok(Reference::Sentinel(Sentinel::Undefined)),
            Value::Null => return Ok(Reference::Sentinel(Sentinel::Null)),
            Value::Number(n) => match Sentinel::for_number(*n) {
                Some(sentinel) => return Ok(Reference::Sentinel(sentinel)),
                None => Some(Leaf::Number(*n)),
            },
            Value::Bool(b) => Some(Leaf::Bool(*b)),
            Value::String(s) => Some(Leaf::String(s.clone())),
            _ => None,
        };
        if let Some(leaf) = leaf {
            let slot = self.reserve()?;
            self.table[slot] = Some(Entry::Leaf(leaf));
            return Ok(Reference::Slot(slot));
        }

        let identity = value.identity();
        if let Some(slot) = identity.and_then(|id| self.seen.get(&id).copied()) {
            trace!(slot, kind = value.kind_name(), "Shared node");
            return Ok(Reference::Slot(slot));
        }

        let shape = self.classify(&value)?;
        let slot = self.reserve()?;
        if let Some(id) = identity {
            self.seen.insert(id, slot);
            self.retained.push(value);
        }

        match shape {
            Shape::Sequence(items) => {
                let refs = Vec::with_capacity(items.len());
                self.open(Frame::new(
                    slot,
                    Pending::Sequence {
                        items: items.into_iter(),
                        refs,
                    },
                ))?;
            }
            Shape::Record(fields) => {
                let refs = Vec::with_capacity(fields.len());
                self.open(Frame::new(
                    slot,
                    Pending::Record {
                        fields: fields.into_iter(),
                        key: None,
                        refs,
                    },
                ))?;
            }
            Shape::Tagged { tag, payload } => {
                self.open(Frame::new(
                    slot,
                    Pending::Tagged {
                        tag,
                        payload: Some(payload),
                        reference: None,
                    },
                ))?;
            }
            Shape::Members { tag, items } => {
                // The member list is an anonymous sequence in the next slot
                let members = self.reserve()?;
                self.table[slot] = Some(Entry::Tagged(tag.to_string(), Reference::Slot(members)));
                let mut frame = Frame::new(
                    members,
                    Pending::Sequence {
                        refs: Vec::with_capacity(items.len()),
                        items: items.into_iter().map(Some).collect::<Vec<_>>().into_iter(),
                    },
                );
                frame.via = Some(Segment::Tag(tag.to_string()));
                self.open(frame)?;
            }
        }

        Ok(Reference::Slot(slot))
    }

    fn classify(&self, value: &Value) -> Result<Shape> {
        match value {
            Value::Sequence(items) => return Ok(Shape::Sequence(items.borrow().clone())),
            Value::Record(record) => {
                let fields = record
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.clone()))
                    .collect();
                return Ok(Shape::Record(fields));
            }
            _ => {}
        }

        if let Some((tag, payload)) = self.encoders.claim(value) {
            trace!(tag, kind = value.kind_name(), "Custom tag claimed value");
            return Ok(Shape::Tagged {
                tag: tag.to_string(),
                payload,
            });
        }

        if let Value::Tagged(tagged) = value {
            return Ok(Shape::Tagged {
                tag: tagged.tag.clone(),
                payload: tagged.payload.clone(),
            });
        }

        match builtins::encode(value) {
            Some(Builtin::Payload { tag, payload }) => Ok(Shape::Tagged {
                tag: tag.to_string(),
                payload,
            }),
            Some(Builtin::Members { tag, items }) => Ok(Shape::Members { tag, items }),
            None => Err(Error::UnsupportedValueKind {
                kind: value.kind_name().to_string(),
                path: self.path(),
            }),
        }
    }

    fn reserve(&mut self) -> Result<usize> {
        self.limits.check_table_size(self.table.len() + 1)?;
        self.table.push(None);
        Ok(self.table.len() - 1)
    }

    fn open(&mut self, frame: Frame) -> Result<()> {
        self.limits.check_depth(self.stack.len() + 1)?;
        self.stack.push(frame);
        Ok(())
    }

    /// Location of the value currently being visited
    fn path(&self) -> String {
        let mut path = String::from("$");
        for frame in &self.stack {
            for segment in frame.via.iter().chain(frame.current.iter()) {
                segment.write_to(&mut path);
            }
        }
        path
    }
}
