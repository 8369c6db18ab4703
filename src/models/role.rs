//! Acting roles and their routing capabilities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Roles known to the platform. Wire names are part of the auth contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Agent,
    Analyst,
    Finance,
    SuperAdmin,
    /// Hidden role: never listed on tenant-facing surfaces.
    NetworkOperator,
}

/// What a role is allowed to do at routing time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Campaign and wallet rules may not block calls made under this role.
    pub privileged_bypass: bool,
    /// The role must not be disclosed to tenants.
    ///
    /// Routing never branches on this. It is read by the embedding service's
    /// tenant-facing role listings and member views, which filter hidden
    /// roles out. Internal [`AuditRecord`](crate::audit::AuditRecord)s keep
    /// the real role.
    pub hidden: bool,
}

impl Role {
    /// All roles in declaration order.
    pub const ALL: [Role; 6] = [
        Self::Owner,
        Self::Agent,
        Self::Analyst,
        Self::Finance,
        Self::SuperAdmin,
        Self::NetworkOperator,
    ];

    /// Returns the wire-format role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Agent => "agent",
            Self::Analyst => "analyst",
            Self::Finance => "finance",
            Self::SuperAdmin => "super_admin",
            Self::NetworkOperator => "network_operator",
        }
    }

    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::SuperAdmin => Capabilities {
                privileged_bypass: true,
                hidden: false,
            },
            Self::NetworkOperator => Capabilities {
                privileged_bypass: true,
                hidden: true,
            },
            Self::Owner | Self::Agent | Self::Analyst | Self::Finance => Capabilities {
                privileged_bypass: false,
                hidden: false,
            },
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == name)
            .ok_or_else(|| UnknownRole(name.to_string()))
    }
}
