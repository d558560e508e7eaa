//! Text formatting for `set_text` sinks and animation frames.

use serde::{Deserialize, Serialize};

use crate::snapshot::FieldValue;

/// How a value is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberStyle {
    /// The value as-is.
    #[default]
    Raw,
    /// Fixed number of decimals, e.g. star rating `5.27`.
    Fixed(u32),
    /// Rounded to an integer, e.g. `305pp`.
    Rounded,
    /// Milliseconds shown as `42s` or `3m 7s`.
    Clock,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextFormat {
    #[serde(default)]
    pub style: NumberStyle,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

impl TextFormat {
    pub fn fixed(decimals: u32) -> Self {
        Self {
            style: NumberStyle::Fixed(decimals),
            ..Self::default()
        }
    }

    pub fn render(&self, value: &FieldValue) -> String {
        let body = match (self.style, value.as_number()) {
            (NumberStyle::Raw, _) | (_, None) => value.to_string(),
            (NumberStyle::Fixed(decimals), Some(n)) => format_fixed(n, decimals),
            (NumberStyle::Rounded, Some(n)) => format!("{}", n.round() as i64),
            (NumberStyle::Clock, Some(n)) => format_clock(n),
        };
        format!("{}{}{}", self.prefix, body, self.suffix)
    }
}

pub fn format_fixed(n: f64, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, n)
}

fn format_clock(millis: f64) -> String {
    let seconds = (millis.max(0.0) / 1000.0).round() as u64;
    if seconds > 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
