//! Typed deep merge over JSON state trees.
//!
//! A loaded snapshot is merged onto the default template so that keys the
//! snapshot predates keep their default value. The variant decides the
//! rule: two branches merge key by key, anything else is replaced by the
//! source side. Lists are leaves for merge purposes and are never
//! concatenated.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum StateTree {
    /// null, bool, number or string.
    Leaf(Value),
    /// Replaced wholesale on merge.
    List(Vec<Value>),
    Branch(BTreeMap<String, StateTree>),
}

impl StateTree {
    /// Merge `source` onto `self`. Source wins everywhere except where both
    /// sides are branches.
    pub fn merge(self, source: StateTree) -> StateTree {
        match (self, source) {
            (StateTree::Branch(mut base), StateTree::Branch(incoming)) => {
                for (key, value) in incoming {
                    let merged = match base.remove(&key) {
                        Some(existing) => existing.merge(value),
                        None => value,
                    };
                    base.insert(key, merged);
                }
                StateTree::Branch(base)
            }
            (_, source) => source,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, StateTree::Branch(_))
    }

    /// Child lookup on a branch.
    pub fn get(&self, key: &str) -> Option<&StateTree> {
        match self {
            StateTree::Branch(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<Value> for StateTree {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => StateTree::Branch(
                map.into_iter().map(|(k, v)| (k, StateTree::from(v))).collect(),
            ),
            Value::Array(items) => StateTree::List(items),
            leaf => StateTree::Leaf(leaf),
        }
    }
}

impl From<StateTree> for Value {
    fn from(tree: StateTree) -> Self {
        match tree {
            StateTree::Leaf(v) => v,
            StateTree::List(items) => Value::Array(items),
            StateTree::Branch(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

/// Deep-merge `source` onto `base` and return the merged JSON value.
pub fn deep_merge(base: Value, source: Value) -> Value {
    StateTree::from(base).merge(StateTree::from(source)).into()
}
