// src/health/status.rs
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    /// Reduce a set of statuses: `Ok` only if every member is `Ok`.
    /// An empty set is `Ok`.
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Status>,
    {
        if statuses.into_iter().all(|s| s == Status::Ok) {
            Status::Ok
        } else {
            Status::Error
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
