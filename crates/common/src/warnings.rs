//! Non-fatal configuration warnings
//!
//! Warnings are advisory: they never abort a compilation, but they are
//! returned alongside the result so operators can clean up their config.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A single advisory message produced while compiling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Directive the warning relates to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            directive: None,
            message: message.into(),
        }
    }

    /// Create a warning attributed to a directive
    pub fn for_directive(directive: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            directive: Some(directive.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.directive {
            Some(directive) => write!(f, "{}: {}", directive, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Accumulator threaded through every compilation stage
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning; it is also emitted as a `warn` event
    pub fn push(&mut self, warning: Warning) {
        warn!(directive = ?warning.directive, "{}", warning.message);
        self.items.push(warning);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}
