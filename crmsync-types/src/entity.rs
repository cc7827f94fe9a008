//! The entity collections that are mirrored from the CRM.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A remote collection that gets its own pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Leads,
    Users,
    Roles,
}

impl EntityKind {
    /// All kinds, in the order a full sync runs them.
    pub const ALL: [EntityKind; 3] = [EntityKind::Roles, EntityKind::Users, EntityKind::Leads];

    /// Lowercase name, also used as the run-history module label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Leads => "leads",
            EntityKind::Users => "users",
            EntityKind::Roles => "roles",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leads" | "lead" => Ok(EntityKind::Leads),
            "users" | "user" => Ok(EntityKind::Users),
            "roles" | "role" => Ok(EntityKind::Roles),
            other => Err(crate::Error::UnknownEntity(other.to_string())),
        }
    }
}
