//! Hydrating a slot table back into a value graph
//!
//! Each slot is hydrated at most once. Containers are published as empty
//! shells before their children are filled, which is what lets a child refer
//! back to an ancestor. Tagged slots are different: a tag decoder needs its
//! whole payload up front, so the slot stays pending until the payload subtree
//! is complete, and meeting a pending slot again is an error.
//!
//! Work is driven by an explicit task stack. A task that opens a new container
//! yields so the child is filled first (depth-first order), then resumes.

use super::builtins::{self, MAP_TAG, SET_TAG};
use crate::core::config::Limits;
use crate::core::error::{Error, Result};
use crate::core::types::{Record, Shared, Value};
use crate::registry::{Decoders, TagDecoder};
use crate::wire::{Entry, Reference, Wire};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

/// Rebuild the value graph described by `wire`
pub fn hydrate(wire: &Wire, decoders: &Decoders, limits: &Limits) -> Result<Value> {
    match wire {
        Wire::Sentinel(sentinel) => sentinel
            .to_value()
            .ok_or_else(|| Error::malformed("hole sentinel outside a sequence")),
        Wire::Leaf(leaf) => Ok(leaf.to_value()),
        Wire::Table(entries) => Hydrator::new(entries, decoders, limits)?.run(),
    }
}

enum Slot {
    Vacant,
    Pending,
    Ready(Value),
}

enum Task<'w, 'r> {
    Sequence {
        target: Shared<Vec<Option<Value>>>,
        refs: &'w [Reference],
        next: usize,
    },
    Record {
        target: Shared<Record>,
        fields: &'w [(String, Reference)],
        next: usize,
    },
    Set {
        target: Shared<Vec<Value>>,
        refs: &'w [Reference],
        next: usize,
    },
    Map {
        target: Shared<Vec<(Value, Value)>>,
        refs: &'w [Reference],
        next: usize,
        key: Option<Value>,
    },
    Revive {
        slot: usize,
        tag: &'w str,
        payload: Reference,
        decoder: Option<&'r TagDecoder>,
        value: Option<Value>,
    },
}

struct Hydrator<'w, 'r> {
    entries: &'w [Entry],
    decoders: &'r Decoders,
    limits: &'r Limits,
    slots: Vec<Slot>,
    stack: Vec<Task<'w, 'r>>,
    /// Whether a task has been popped and is being stepped
    stepping: bool,
}

impl<'w, 'r> Hydrator<'w, 'r> {
    fn new(entries: &'w [Entry], decoders: &'r Decoders, limits: &'r Limits) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::malformed("empty slot table"));
        }
        limits.check_table_size(entries.len())?;

        let table_len = entries.len();
        for reference in entries.iter().flat_map(Entry::references) {
            if let Reference::Slot(index) = reference {
                if index >= table_len {
                    return Err(Error::DanglingReference {
                        reference: reference.to_wire(),
                        table_len,
                    });
                }
            }
        }

        Ok(Self {
            entries,
            decoders,
            limits,
            slots: (0..table_len).map(|_| Slot::Vacant).collect(),
            stack: Vec::new(),
            stepping: false,
        })
    }

    fn run(mut self) -> Result<Value> {
        self.resolve(Reference::Slot(0))?;

        while let Some(mut task) = self.stack.pop() {
            let base = self.stack.len();
            self.stepping = true;
            let finished = self.step(&mut task)?;
            self.stepping = false;
            if !finished {
                // Resume after whatever the step pushed
                self.stack.insert(base, task);
            }
        }

        debug!(slots = self.slots.len(), "Hydrated value graph");
        match &self.slots[0] {
            Slot::Ready(value) => Ok(value.clone()),
            _ => Err(Error::internal("root slot left unhydrated")),
        }
    }

    /// Advance `task`. Returns whether it is complete. A task that opened a
    /// child always reports incomplete so it stays below the child.
    fn step(&mut self, task: &mut Task<'w, 'r>) -> Result<bool> {
        let base = self.stack.len();
        match task {
            Task::Sequence { target, refs, next } => {
                while *next < refs.len() {
                    let index = *next;
                    *next += 1;
                    if refs[index].is_hole() {
                        continue;
                    }
                    let Some(value) = self.resolve(refs[index])? else {
                        *next = index;
                        return Ok(false);
                    };
                    target.borrow_mut()[index] = Some(value);
                    if self.stack.len() > base {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Task::Record {
                target,
                fields,
                next,
            } => {
                while *next < fields.len() {
                    let (key, reference) = &fields[*next];
                    let Some(value) = self.resolve(*reference)? else {
                        return Ok(false);
                    };
                    target.borrow_mut().insert(key.as_str(), value);
                    *next += 1;
                    if self.stack.len() > base {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Task::Set { target, refs, next } => {
                while *next < refs.len() {
                    let Some(value) = self.resolve(refs[*next])? else {
                        return Ok(false);
                    };
                    target.borrow_mut().push(value);
                    *next += 1;
                    if self.stack.len() > base {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Task::Map {
                target,
                refs,
                next,
                key,
            } => {
                while *next < refs.len() {
                    let Some(value) = self.resolve(refs[*next])? else {
                        return Ok(false);
                    };
                    match key.take() {
                        Some(k) => target.borrow_mut().push((k, value)),
                        None => *key = Some(value),
                    }
                    *next += 1;
                    if self.stack.len() > base {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Task::Revive {
                slot,
                tag,
                payload,
                decoder,
                value,
            } => {
                let resolved = match value.take() {
                    Some(resolved) => resolved,
                    None => match self.resolve(*payload)? {
                        Some(resolved) => resolved,
                        None => return Ok(false),
                    },
                };
                if self.stack.len() > base {
                    // Payload is a container still being filled
                    *value = Some(resolved);
                    return Ok(false);
                }
                let revived = match decoder {
                    Some(decoder) => decoder.decode(resolved)?,
                    None => builtins::revive(*tag, resolved)?,
                };
                trace!(slot = *slot, tag = *tag, "Revived tagged slot");
                self.slots[*slot] = Slot::Ready(revived);
                Ok(true)
            }
        }
    }

    /// Value behind `reference`, or `None` if a revive task was pushed and
    /// the value is not available yet
    fn resolve(&mut self, reference: Reference) -> Result<Option<Value>> {
        let index = match reference {
            Reference::Slot(index) => index,
            Reference::Sentinel(sentinel) => {
                return sentinel
                    .to_value()
                    .map(Some)
                    .ok_or_else(|| Error::malformed("hole sentinel outside a sequence"));
            }
        };

        match &self.slots[index] {
            Slot::Ready(value) => return Ok(Some(value.clone())),
            Slot::Pending => {
                let tag = match &self.entries[index] {
                    Entry::Tagged(tag, _) => tag.clone(),
                    _ => String::new(),
                };
                return Err(Error::CyclicTaggedValue { tag, slot: index });
            }
            Slot::Vacant => {}
        }

        self.open(index)
    }

    fn open(&mut self, index: usize) -> Result<Option<Value>> {
        let entries = self.entries;
        match &entries[index] {
            Entry::Leaf(leaf) => Ok(Some(self.publish(index, leaf.to_value()))),
            Entry::Sequence(refs) => {
                let target = Rc::new(RefCell::new(vec![None; refs.len()]));
                self.push(Task::Sequence {
                    target: target.clone(),
                    refs,
                    next: 0,
                })?;
                Ok(Some(self.publish(index, Value::Sequence(target))))
            }
            Entry::Record(fields) => {
                let target = Rc::new(RefCell::new(Record::with_capacity(fields.len())));
                self.push(Task::Record {
                    target: target.clone(),
                    fields,
                    next: 0,
                })?;
                Ok(Some(self.publish(index, Value::Record(target))))
            }
            Entry::Tagged(tag, payload) => {
                if let Some(decoder) = self.decoders.find(tag) {
                    return self.defer(index, tag, *payload, Some(decoder));
                }
                match tag.as_str() {
                    SET_TAG => {
                        let refs = self.members(tag, *payload)?;
                        let target = Rc::new(RefCell::new(Vec::with_capacity(refs.len())));
                        self.push(Task::Set {
                            target: target.clone(),
                            refs,
                            next: 0,
                        })?;
                        Ok(Some(self.publish(index, Value::Set(target))))
                    }
                    MAP_TAG => {
                        let refs = self.members(tag, *payload)?;
                        if refs.len() % 2 != 0 {
                            return Err(Error::invalid_payload(tag.as_str(), "odd number of map members"));
                        }
                        let target = Rc::new(RefCell::new(Vec::with_capacity(refs.len() / 2)));
                        self.push(Task::Map {
                            target: target.clone(),
                            refs,
                            next: 0,
                            key: None,
                        })?;
                        Ok(Some(self.publish(index, Value::Map(target))))
                    }
                    other if builtins::is_builtin_tag(other) => {
                        self.defer(index, tag, *payload, None)
                    }
                    other => Err(Error::unknown_tag(other)),
                }
            }
        }
    }

    /// Mark a tagged slot pending and schedule its revival
    fn defer(
        &mut self,
        index: usize,
        tag: &'w str,
        payload: Reference,
        decoder: Option<&'r TagDecoder>,
    ) -> Result<Option<Value>> {
        self.slots[index] = Slot::Pending;
        self.push(Task::Revive {
            slot: index,
            tag,
            payload,
            decoder,
            value: None,
        })?;
        Ok(None)
    }

    /// Member references of a set or map, read straight from the payload slot.
    ///
    /// The payload slot itself is never published: the set or map owns its
    /// members, not a sequence. Any other reference to that slot hydrates it
    /// as an ordinary sequence, memoized like every other slot.
    fn members(&self, tag: &str, payload: Reference) -> Result<&'w [Reference]> {
        let entries = self.entries;
        let refs = match payload {
            Reference::Slot(index) => match &entries[index] {
                Entry::Sequence(refs) => refs.as_slice(),
                _ => return Err(Error::invalid_payload(tag, "members must be a sequence")),
            },
            Reference::Sentinel(_) => {
                return Err(Error::invalid_payload(tag, "members must be a sequence"))
            }
        };
        if refs.iter().any(|r| r.is_hole()) {
            return Err(Error::invalid_payload(tag, "members cannot contain holes"));
        }
        Ok(refs)
    }

    fn publish(&mut self, index: usize, value: Value) -> Value {
        self.slots[index] = Slot::Ready(value.clone());
        value
    }

    fn push(&mut self, task: Task<'w, 'r>) -> Result<()> {
        let depth = self.stack.len() + usize::from(self.stepping) + 1;
        self.limits.check_depth(depth)?;
        self.stack.push(task);
        Ok(())
    }
}
