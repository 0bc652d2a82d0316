use std::fmt;

use serde::{Deserialize, Serialize};

/// An indexing failure recorded in place of an entry or module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedError {
    pub status: u16,
    pub title: String,
    pub message: String,
    /// Dependency keys whose change should cause a retry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,
}

impl SerializedError {
    pub fn new(status: u16, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { status, title: title.into(), message: message.into(), deps: Vec::new() }
    }

    pub fn with_deps(mut self, deps: impl IntoIterator<Item = String>) -> Self {
        self.deps = deps.into_iter().collect();
        self
    }
}

impl fmt::Display for SerializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.title, self.status, self.message)
    }
}

impl std::error::Error for SerializedError {}
