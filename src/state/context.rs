use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of a page view the code is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// Server-side render, before any browser exists for the view
    Origin,
    /// Browser-side hydration of the same view
    Target,
}

impl ExecutionContext {
    pub fn is_origin(self) -> bool {
        self == ExecutionContext::Origin
    }

    pub fn is_target(self) -> bool {
        self == ExecutionContext::Target
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionContext::Origin => "origin",
            ExecutionContext::Target => "target",
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
