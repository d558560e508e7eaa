//! # Field Bindings
//!
//! The declarative layer that maps snapshot fields onto render sinks. A
//! binding file is plain JSON:
//!
//! ```json
//! {
//!   "endpoint": "ws://127.0.0.1:24050/rws",
//!   "bindings": [
//!     { "id": "pp",
//!       "rule": { "kind": "zero_gate", "paths": ["current_pp"] },
//!       "sink": { "op": "animate_numeric", "duration_ms": 500, "decimals": 2 } },
//!     { "id": "wrapper",
//!       "rule": { "kind": "strict", "paths": ["state", "status"] },
//!       "sink": { "op": "set_visibility", "when": { "equals": 2 },
//!                 "on": "translateX(0)", "off": "translateX(-110%)" } }
//!   ]
//! }
//! ```
//!
//! Schema drift between deployments (`state` vs `status`) is handled here by
//! listing aliases, never by branching inside the pipeline. A loaded
//! [`BindingSet`] is immutable for the life of the process.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::diff::DiffRule;
use crate::render::format::TextFormat;
use crate::snapshot::FieldValue;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid field path: '{0}'")]
    InvalidPath(String),

    #[error("failed to read bindings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bindings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("binding set is empty")]
    Empty,

    #[error("binding '{0}' has no field paths")]
    NoPaths(String),

    #[error("binding '{id}' declares more than one {op} sink")]
    DuplicateBinding { id: String, op: &'static str },

    #[error("binding '{id}': {op} cannot be driven by a {rule} rule")]
    Incompatible {
        id: String,
        op: &'static str,
        rule: &'static str,
    },

    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Easing curve of a numeric animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    /// Fast start, slow settle; the usual count-up feel.
    #[default]
    EaseOutExpo,
}

impl Easing {
    /// Maps linear progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOutExpo if t >= 1.0 => 1.0,
            Easing::EaseOutExpo => 1.0 - 2f64.powf(-10.0 * t),
        }
    }
}

fn default_duration_ms() -> u64 {
    500
}

/// Fixed per-binding animation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationSpec {
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default)]
    pub decimals: u32,
}

impl AnimationSpec {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for AnimationSpec {
    fn default() -> Self {
        Self {
            duration_ms: default_duration_ms(),
            easing: Easing::default(),
            decimals: 0,
        }
    }
}

/// A test on one value: picks the visibility state, or gates a `gated` rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTest {
    #[default]
    Truthy,
    Positive,
    Equals(Value),
    NotEquals(Value),
    /// Numeric and strictly greater than the bound.
    Above(f64),
}

impl ValueTest {
    pub fn test(&self, value: &FieldValue) -> bool {
        match self {
            ValueTest::Truthy => value.is_truthy(),
            ValueTest::Positive => value.as_number().is_some_and(|n| n > 0.0),
            ValueTest::Equals(expected) => value.matches_json(expected),
            ValueTest::NotEquals(expected) => !value.is_absent() && !value.matches_json(expected),
            ValueTest::Above(bound) => value.as_number().is_some_and(|n| n > *bound),
        }
    }
}

fn default_template() -> String {
    "{value}".to_string()
}

/// The render operation a binding drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SinkSpec {
    SetText {
        #[serde(default)]
        format: TextFormat,
    },
    SetAttribute {
        attribute: String,
        #[serde(default = "default_template")]
        template: String,
        /// Applied to the value before it is put into the template.
        #[serde(default)]
        format: TextFormat,
    },
    SetVisibility {
        #[serde(default)]
        when: ValueTest,
        on: String,
        off: String,
    },
    AnimateNumeric(AnimationSpec),
}

impl SinkSpec {
    pub fn op(&self) -> &'static str {
        match self {
            SinkSpec::SetText { .. } => "set_text",
            SinkSpec::SetAttribute { .. } => "set_attribute",
            SinkSpec::SetVisibility { .. } => "set_visibility",
            SinkSpec::AnimateNumeric(_) => "animate_numeric",
        }
    }
}

/// One field-to-sink association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    /// Sink element identifier.
    pub id: String,
    pub rule: DiffRule,
    pub sink: SinkSpec,
}

/// The full, validated binding configuration of one overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSet {
    /// Server URL the preset was written for. The endpoint given on the command
    /// line wins over this one.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub bindings: Vec<FieldBinding>,
}

impl BindingSet {
    pub fn new(bindings: Vec<FieldBinding>) -> Result<Self, ConfigError> {
        let set = Self {
            endpoint: None,
            bindings,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let set: BindingSet = serde_json::from_str(raw)?;
        set.validate()?;
        Ok(set)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::from_json_str(&raw)?;
        log::info!("Loaded {} bindings from {}", set.len(), path.display());
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bindings.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut seen = HashSet::new();
        for binding in &self.bindings {
            if binding.rule.paths().is_empty() {
                return Err(ConfigError::NoPaths(binding.id.clone()));
            }
            let op = binding.sink.op();
            if !seen.insert((binding.id.as_str(), op)) {
                return Err(ConfigError::DuplicateBinding {
                    id: binding.id.clone(),
                    op,
                });
            }
            let compatible = match (&binding.sink, &binding.rule) {
                (SinkSpec::AnimateNumeric(_), rule) => rule.is_numeric(),
                (SinkSpec::SetAttribute { .. }, _) => true,
                (_, DiffRule::Resource { .. }) => false,
                _ => true,
            };
            if !compatible {
                return Err(ConfigError::Incompatible {
                    id: binding.id.clone(),
                    op,
                    rule: binding.rule.kind(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FieldBinding> {
        self.bindings.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &FieldBinding)> {
        self.bindings.iter().enumerate()
    }
}
