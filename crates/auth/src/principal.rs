use serde::{Deserialize, Serialize};

use rendition_core::UserId;

/// Identity a unit of work executes under.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// The non-interactive system identity.
    System,
    /// An interactive user.
    User(UserId),
}

impl Principal {
    pub fn is_system(&self) -> bool {
        matches!(self, Principal::System)
    }
}

impl core::fmt::Display for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Principal::System => f.write_str("system"),
            Principal::User(id) => write!(f, "user:{id}"),
        }
    }
}
