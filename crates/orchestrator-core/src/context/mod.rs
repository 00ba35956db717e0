//! # ExecutionContext — the dot-path addressable run state
//!
//! The root semantic container threaded through a single workflow run: a
//! mapping from string keys to arbitrary [`PortValue`]s, supporting dot-path
//! access (`a.b.0.c`) that transparently navigates nested mappings and
//! ordered sequences. It is built by the input mapper, enriched by edge
//! bindings and node outputs, and discarded at request end.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ports::PortValue;

/// Shared, mutable, dot-path-addressable run state for one workflow
/// execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    root: BTreeMap<String, PortValue>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self { root: BTreeMap::new() }
    }

    pub fn from_map(root: BTreeMap<String, PortValue>) -> Self {
        Self { root }
    }

    /// `put(path, value)` — parses `path` by `.`; for each non-terminal
    /// segment, looks up or creates the required container (a sequence if
    /// the next segment parses as a non-negative integer, a mapping
    /// otherwise); at the terminal segment, writes the value; extends a
    /// sequence with nulls when setting an out-of-range index.
    pub fn put(&mut self, path: &str, value: PortValue) {
        let segments: Vec<&str> = path.split('.').collect();
        put_into_map(&mut self.root, &segments, value);
    }

    /// `get(path)` — symmetric with `put`; returns `None` (absent) if any
    /// intermediate segment is missing or traverses a non-container.
    pub fn get(&self, path: &str) -> Option<&PortValue> {
        let segments: Vec<&str> = path.split('.').collect();
        get_from_map(&self.root, &segments)
    }

    /// `remove(path)` — removes the terminal key (or element); returns the
    /// removed value.
    pub fn remove(&mut self, path: &str) -> Option<PortValue> {
        let segments: Vec<&str> = path.split('.').collect();
        remove_from_map(&mut self.root, &segments)
    }

    /// `containsKey(path)` — true iff `get(path)` would yield a non-absent
    /// value. A stored `null` is therefore indistinguishable from absence —
    /// preserved deliberately (see design notes on `ExecutionContext`).
    pub fn contains_key(&self, path: &str) -> bool {
        !matches!(self.get(path), None | Some(PortValue::Null))
    }

    /// Recursively copies mappings and sequences; primitive leaves are
    /// owned copies but never aliased containers.
    pub fn deep_copy(&self) -> Self {
        let root = self
            .root
            .iter()
            .map(|(k, v)| (k.clone(), v.deep_copy()))
            .collect();
        Self { root }
    }

    pub fn as_map(&self) -> &BTreeMap<String, PortValue> {
        &self.root
    }

    pub fn into_map(self) -> BTreeMap<String, PortValue> {
        self.root
    }
}

fn is_index(segment: &str) -> Option<usize> {
    segment.parse::<usize>().ok()
}

fn put_into_map(map: &mut BTreeMap<String, PortValue>, segments: &[&str], value: PortValue) {
    let (head, rest) = segments.split_first().expect("path must have at least one segment");
    if rest.is_empty() {
        map.insert(head.to_string(), value);
        return;
    }

    let next_is_index = is_index(rest[0]).is_some();
    let entry = map.entry(head.to_string()).or_insert_with(|| {
        if next_is_index {
            PortValue::Seq(Vec::new())
        } else {
            PortValue::Map(BTreeMap::new())
        }
    });

    put_into_container(entry, rest, value);
}

fn put_into_container(container: &mut PortValue, segments: &[&str], value: PortValue) {
    let (head, rest) = segments.split_first().expect("path must have at least one segment");

    if let Some(index) = is_index(head) {
        if !matches!(container, PortValue::Seq(_)) {
            *container = PortValue::Seq(Vec::new());
        }
        let seq = container.as_seq_mut().expect("just coerced to Seq");
        if index >= seq.len() {
            seq.resize(index + 1, PortValue::Null);
        }
        if rest.is_empty() {
            seq[index] = value;
        } else {
            let next_is_index = is_index(rest[0]).is_some();
            if matches!(seq[index], PortValue::Null) {
                seq[index] = if next_is_index {
                    PortValue::Seq(Vec::new())
                } else {
                    PortValue::Map(BTreeMap::new())
                };
            }
            put_into_container(&mut seq[index], rest, value);
        }
    } else {
        if !matches!(container, PortValue::Map(_)) {
            *container = PortValue::Map(BTreeMap::new());
        }
        let map = container.as_map_mut().expect("just coerced to Map");
        if rest.is_empty() {
            map.insert(head.to_string(), value);
        } else {
            let next_is_index = is_index(rest[0]).is_some();
            let entry = map.entry(head.to_string()).or_insert_with(|| {
                if next_is_index {
                    PortValue::Seq(Vec::new())
                } else {
                    PortValue::Map(BTreeMap::new())
                }
            });
            put_into_container(entry, rest, value);
        }
    }
}

fn get_from_map<'a>(map: &'a BTreeMap<String, PortValue>, segments: &[&str]) -> Option<&'a PortValue> {
    let (head, rest) = segments.split_first()?;
    let value = map.get(*head)?;
    if rest.is_empty() {
        Some(value)
    } else {
        get_from_container(value, rest)
    }
}

fn get_from_container<'a>(container: &'a PortValue, segments: &[&str]) -> Option<&'a PortValue> {
    let (head, rest) = segments.split_first()?;
    let next = if let Some(index) = is_index(head) {
        container.as_seq()?.get(index)?
    } else {
        container.as_map()?.get(*head)?
    };
    if rest.is_empty() {
        Some(next)
    } else {
        get_from_container(next, rest)
    }
}

fn remove_from_map(map: &mut BTreeMap<String, PortValue>, segments: &[&str]) -> Option<PortValue> {
    let (head, rest) = segments.split_first()?;
    if rest.is_empty() {
        return map.remove(*head);
    }
    let child = map.get_mut(*head)?;
    remove_from_container(child, rest)
}

fn remove_from_container(container: &mut PortValue, segments: &[&str]) -> Option<PortValue> {
    let (head, rest) = segments.split_first()?;
    if rest.is_empty() {
        return if let Some(index) = is_index(head) {
            let seq = container.as_seq_mut()?;
            if *index < seq.len() {
                Some(seq.remove(*index))
            } else {
                None
            }
        } else {
            container.as_map_mut()?.remove(*head)
        };
    }
    let child = if let Some(index) = is_index(head) {
        container.as_seq_mut()?.get_mut(index)?
    } else {
        container.as_map_mut()?.get_mut(*head)?
    };
    remove_from_container(child, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips_scalar_path() {
        let mut ctx = ExecutionContext::new();
        ctx.put("inputA_1", PortValue::String("x".to_string()));
        assert_eq!(ctx.get("inputA_1"), Some(&PortValue::String("x".to_string())));
    }

    #[test]
    fn dot_path_creates_nested_sequences_and_maps() {
        let mut ctx = ExecutionContext::new();
        ctx.put("user.addresses.0.city", PortValue::String("Paris".to_string()));
        ctx.put("user.addresses.1.city", PortValue::String("Rome".to_string()));

        assert_eq!(
            ctx.get("user.addresses.0.city"),
            Some(&PortValue::String("Paris".to_string()))
        );
        assert_eq!(
            ctx.get("user.addresses.1.city"),
            Some(&PortValue::String("Rome".to_string()))
        );
        assert_eq!(ctx.get("user.addresses").unwrap().as_seq().unwrap().len(), 2);
    }

    #[test]
    fn remove_shifts_subsequent_sequence_elements() {
        let mut ctx = ExecutionContext::new();
        ctx.put("user.addresses.0.city", PortValue::String("Paris".to_string()));
        ctx.put("user.addresses.1.city", PortValue::String("Rome".to_string()));

        ctx.remove("user.addresses.0");
        assert_eq!(
            ctx.get("user.addresses.0.city"),
            Some(&PortValue::String("Rome".to_string()))
        );
    }

    #[test]
    fn out_of_range_index_extends_with_nulls() {
        let mut ctx = ExecutionContext::new();
        ctx.put("items.2", PortValue::Int(7));
        let seq = ctx.get("items").unwrap().as_seq().unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[0], PortValue::Null);
        assert_eq!(seq[1], PortValue::Null);
        assert_eq!(seq[2], PortValue::Int(7));
    }

    #[test]
    fn missing_intermediate_segment_is_absent_not_null() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.get("a.b.c"), None);
        assert!(!ctx.contains_key("a.b.c"));
    }

    #[test]
    fn contains_key_treats_stored_null_as_absent() {
        let mut ctx = ExecutionContext::new();
        ctx.put("maybe", PortValue::Null);
        assert!(ctx.get("maybe").is_some());
        assert!(!ctx.contains_key("maybe"));
    }

    #[test]
    fn deep_copy_is_independent_of_original() {
        let mut ctx = ExecutionContext::new();
        ctx.put("a.b", PortValue::Int(1));
        let mut copy = ctx.deep_copy();
        copy.put("a.b", PortValue::Int(2));

        assert_eq!(ctx.get("a.b"), Some(&PortValue::Int(1)));
        assert_eq!(copy.get("a.b"), Some(&PortValue::Int(2)));
    }
}
