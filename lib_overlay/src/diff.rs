//! # Diff Engine
//!
//! Decides, per binding, what value a snapshot produces and whether it differs
//! from the last value that binding produced. The comparison rule is part of
//! each binding's configuration, so two overlays can treat the same field
//! differently.
//!
//! ## Rules
//! - **`strict`**: raw value, changed iff `new != old`.
//! - **`zero_gate`**: positive numbers pass through, anything else (empty
//!   string, 0, negative, non-numeric) becomes `0`. A gated field that is
//!   absent from the very first snapshot is emitted as `0`.
//! - **`derived`**: a boolean predicate over other fields, re-evaluated on every
//!   snapshot.
//! - **`resource`**: compared by the string identity of a resource key; the sink
//!   is expected to load the resource.
//! - **`gated`**: raw value, but only taken while it passes a value test
//!   (e.g. play time above one second). Otherwise the last value stays.
//! - **`ratio`**: `numerator / denominator * scale`, e.g. song progress in
//!   percent. No update while either side is missing or the denominator is 0.
//!
//! Fields absent from a later snapshot produce no change, so the last shown
//! value persists. The old side of a change is always the last value the
//! binding produced, even when frames in between lacked the field.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::bindings::{FieldBinding, ValueTest};
use crate::snapshot::{FieldPath, FieldValue, Snapshot};
use crate::state_store::Change;

/// Raised when a bound field cannot be found in the incoming snapshots.
/// Never fatal: the field just stops updating.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindingError {
    #[error("binding '{id}': none of [{paths}] present in snapshot, keeping last value")]
    Unresolved { id: String, paths: String },
}

/// Boolean predicates for derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// True when at least one field is a positive number.
    AnyPositive(Vec<FieldPath>),
    /// True when every field is a positive number.
    AllPositive(Vec<FieldPath>),
    /// True when the field equals the literal.
    Equals { path: FieldPath, value: Value },
}

impl Predicate {
    pub fn evaluate(&self, snapshot: &Snapshot) -> bool {
        let positive = |path: &FieldPath| {
            snapshot
                .get(path)
                .map(FieldValue::from)
                .and_then(|v| v.as_number())
                .is_some_and(|n| n > 0.0)
        };
        match self {
            Predicate::AnyPositive(paths) => paths.iter().any(positive),
            Predicate::AllPositive(paths) => !paths.is_empty() && paths.iter().all(positive),
            Predicate::Equals { path, value } => snapshot
                .get(path)
                .map(FieldValue::from)
                .is_some_and(|v| v.matches_json(value)),
        }
    }

    fn paths(&self) -> Vec<&FieldPath> {
        match self {
            Predicate::AnyPositive(paths) | Predicate::AllPositive(paths) => paths.iter().collect(),
            Predicate::Equals { path, .. } => vec![path],
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

/// Per-binding comparison rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffRule {
    Strict { paths: Vec<FieldPath> },
    ZeroGate { paths: Vec<FieldPath> },
    Derived { predicate: Predicate },
    Resource { paths: Vec<FieldPath> },
    Gated { paths: Vec<FieldPath>, when: ValueTest },
    Ratio {
        numerator: FieldPath,
        denominator: FieldPath,
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

impl DiffRule {
    pub fn kind(&self) -> &'static str {
        match self {
            DiffRule::Strict { .. } => "strict",
            DiffRule::ZeroGate { .. } => "zero_gate",
            DiffRule::Derived { .. } => "derived",
            DiffRule::Resource { .. } => "resource",
            DiffRule::Gated { .. } => "gated",
            DiffRule::Ratio { .. } => "ratio",
        }
    }

    /// Every path the rule reads.
    pub fn paths(&self) -> Vec<&FieldPath> {
        match self {
            DiffRule::Strict { paths }
            | DiffRule::ZeroGate { paths }
            | DiffRule::Resource { paths }
            | DiffRule::Gated { paths, .. } => paths.iter().collect(),
            DiffRule::Derived { predicate } => predicate.paths(),
            DiffRule::Ratio { numerator, denominator, .. } => vec![numerator, denominator],
        }
    }

    /// True for rules that produce numbers an animation can run towards.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DiffRule::Strict { .. } | DiffRule::ZeroGate { .. } | DiffRule::Gated { .. } | DiffRule::Ratio { .. }
        )
    }

    /// Human-readable source label used in deltas and log lines.
    pub fn label(&self) -> String {
        match self {
            DiffRule::Ratio { numerator, denominator, .. } => format!("ratio({}/{})", numerator, denominator),
            _ => {
                let joined = self
                    .paths()
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join("|");
                match self {
                    DiffRule::Derived { .. } => format!("derived({})", joined),
                    _ => joined,
                }
            }
        }
    }

    /// The value this rule produces for `snapshot`, or `None` when there is
    /// nothing to show (field absent, gated out, ratio undefined).
    pub fn resolve(&self, snapshot: &Snapshot) -> Option<FieldValue> {
        match self {
            DiffRule::Strict { paths } => snapshot.lookup(paths).map(|(_, v)| FieldValue::from(v)),
            DiffRule::ZeroGate { paths } => snapshot
                .lookup(paths)
                .map(|(_, v)| zero_gate(&FieldValue::from(v))),
            DiffRule::Derived { predicate } => Some(FieldValue::Bool(predicate.evaluate(snapshot))),
            DiffRule::Resource { paths } => snapshot
                .lookup(paths)
                .map(|(_, v)| FieldValue::Text(FieldValue::from(v).to_string())),
            DiffRule::Gated { paths, when } => snapshot
                .lookup(paths)
                .map(|(_, v)| FieldValue::from(v))
                .filter(|v| when.test(v)),
            DiffRule::Ratio { numerator, denominator, scale } => {
                let number = |path: &FieldPath| snapshot.get(path).and_then(|v| FieldValue::from(v).as_number());
                let (num, den) = (number(numerator)?, number(denominator)?);
                (den != 0.0).then(|| FieldValue::Number(num / den * scale))
            }
        }
    }

    pub fn changed(&self, old: &FieldValue, new: &FieldValue) -> bool {
        match self {
            DiffRule::Resource { .. } => old.to_string() != new.to_string() || old.is_absent(),
            _ => old != new,
        }
    }
}

/// Normalizes a gated numeric value: positive numbers pass, everything else is 0.
pub fn zero_gate(value: &FieldValue) -> FieldValue {
    match value.as_number() {
        Some(n) if n > 0.0 => FieldValue::Number(n),
        _ => FieldValue::Number(0.0),
    }
}

/// Applies binding rules to snapshots, remembering what each binding last produced.
#[derive(Debug, Default)]
pub struct DiffEngine {
    // Binding indices already reported as unresolved, so the log line appears once.
    reported: HashSet<usize>,
    last: HashMap<usize, FieldValue>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the change for one binding, or `None` if nothing should be dispatched.
    pub fn evaluate(&mut self, index: usize, binding: &FieldBinding, next: &Snapshot) -> Option<Change> {
        let rule = &binding.rule;
        let old = self.last.get(&index).cloned().unwrap_or_default();

        let new = match rule.resolve(next) {
            Some(new) => new,
            // Stream start for this binding: a gated counter shows 0.
            None if old.is_absent() && matches!(rule, DiffRule::ZeroGate { .. }) => FieldValue::Number(0.0),
            None => {
                if !rule.paths().iter().any(|p| next.get(p).is_some()) {
                    self.report_unresolved(index, binding);
                }
                return None;
            }
        };

        if !rule.changed(&old, &new) {
            return None;
        }
        self.last.insert(index, new.clone());
        Some(Change {
            binding: index,
            path: rule.label(),
            old,
            new,
        })
    }

    /// Last value produced by a binding.
    pub fn last_value(&self, index: usize) -> Option<&FieldValue> {
        self.last.get(&index)
    }

    /// Forgets every last value; the next snapshot behaves like stream start.
    pub fn forget(&mut self) {
        self.last.clear();
    }

    /// Number of bindings that have been reported as unresolved so far.
    pub fn unresolved_count(&self) -> usize {
        self.reported.len()
    }

    fn report_unresolved(&mut self, index: usize, binding: &FieldBinding) {
        if self.reported.insert(index) {
            let err = BindingError::Unresolved {
                id: binding.id.clone(),
                paths: binding.rule.label(),
            };
            log::warn!("{}", err);
        }
    }
}
