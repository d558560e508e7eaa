//! # State Store
//!
//! Holds the last accepted [`Snapshot`] and turns each new one into a
//! [`Delta`]. The delta is always computed against the state held *before*
//! the call, and the replacement happens in the same `&mut self` call, so no
//! caller can observe two current snapshots.

use std::sync::Arc;

use crate::bindings::BindingSet;
use crate::diff::DiffEngine;
use crate::snapshot::{FieldValue, Snapshot};

/// One field transition: (field path, old value, new value) for a binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Index of the binding in its [`BindingSet`].
    pub binding: usize,
    /// Source label of the binding's rule, e.g. `gameplay.hit_100`.
    pub path: String,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// All changes produced by one snapshot transition, in binding order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub changes: Vec<Change>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }
}

pub struct StateStore {
    bindings: Arc<BindingSet>,
    engine: DiffEngine,
    current: Option<Snapshot>,
}

impl StateStore {
    pub fn new(bindings: Arc<BindingSet>) -> Self {
        Self {
            bindings,
            engine: DiffEngine::new(),
            current: None,
        }
    }

    /// Diffs `next` against what the held state shows, then makes `next` current.
    /// A field missing from the previous frame is compared against its last
    /// known value, not against "absent".
    pub fn compare(&mut self, next: Snapshot) -> Delta {
        let changes = self
            .bindings
            .iter()
            .filter_map(|(index, binding)| self.engine.evaluate(index, binding, &next))
            .collect();

        self.current = Some(next);
        Delta { changes }
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Forgets the held snapshot and last values; the next compare behaves
    /// like stream start.
    pub fn clear(&mut self) {
        self.current = None;
        self.engine.forget();
    }

    pub fn bindings(&self) -> &Arc<BindingSet> {
        &self.bindings
    }

    pub fn engine(&self) -> &DiffEngine {
        &self.engine
    }
}
