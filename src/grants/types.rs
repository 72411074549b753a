//! Core grant data model.
//!
//! Principals, capabilities, the per-key identity of a grant, and the grant
//! record itself.

use super::scheduler::ExpiryHandle;
use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Opaque identifier of the user receiving or losing a capability.
///
/// Serializes as a bare number. Deserializes from a number or from any string
/// [`FromStr`] accepts, so mention forms work in config and request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Principal(pub u64);

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a principal id cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid principal id: {0}")]
pub struct PrincipalParseError(pub String);

impl FromStr for Principal {
    type Err = PrincipalParseError;

    /// Accepts a bare numeric id or a mention (`<@123>`, `<@!123>`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("<@")
            .and_then(|rest| rest.strip_suffix('>'))
            .map(|inner| inner.strip_prefix('!').unwrap_or(inner))
            .unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(Principal)
            .map_err(|_| PrincipalParseError(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PrincipalVisitor;

        impl Visitor<'_> for PrincipalVisitor {
            type Value = Principal;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a user id or mention")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Principal, E> {
                Ok(Principal(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Principal, E> {
                u64::try_from(v)
                    .map(Principal)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Principal, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PrincipalVisitor)
    }
}

/// Identifier of a role in the role-assignment backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription plan backed by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Plan {
    Essential,
    Prime,
}

impl Plan {
    pub fn name(&self) -> &'static str {
        match self {
            Plan::Essential => "essential",
            Plan::Prime => "prime",
        }
    }
}

/// A grantable item.
///
/// Each variant is also the grant kind: a principal holds at most one active
/// grant per capability, and the capabilities are independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Capability {
    /// A plan role (`essential`, `prime`).
    Plan(Plan),
    /// The bare "may invoke commands" permission.
    CommandAccess,
}

impl Capability {
    /// Every capability, in display order.
    pub const ALL: [Capability; 3] = [
        Capability::Plan(Plan::Essential),
        Capability::Plan(Plan::Prime),
        Capability::CommandAccess,
    ];

    /// Static label used in logs, metrics and the status snapshot.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Plan(plan) => plan.name(),
            Capability::CommandAccess => "command-access",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned for an unknown capability name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability '{0}' (expected essential, prime or command-access)")]
pub struct CapabilityParseError(pub String);

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "essential" => Ok(Capability::Plan(Plan::Essential)),
            "prime" => Ok(Capability::Plan(Plan::Prime)),
            "command-access" | "commands" | "permit" => Ok(Capability::CommandAccess),
            _ => Err(CapabilityParseError(s.to_string())),
        }
    }
}

impl From<Capability> for &'static str {
    fn from(capability: Capability) -> Self {
        capability.name()
    }
}

impl TryFrom<String> for Capability {
    type Error = CapabilityParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// What the backend actually assigns for a resolved capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assignment {
    /// A concrete backend role.
    Role(RoleId),
    /// The bare command permission.
    CommandAccess,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignment::Role(id) => write!(f, "role:{}", id),
            Assignment::CommandAccess => f.write_str("command-access"),
        }
    }
}

/// Identity of a grant record: one per (principal, capability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantKey {
    pub principal: Principal,
    pub capability: Capability,
}

impl GrantKey {
    pub fn new(principal: Principal, capability: Capability) -> Self {
        Self {
            principal,
            capability,
        }
    }
}

impl fmt::Display for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.principal, self.capability)
    }
}

/// Process-unique grant id. Expiry callbacks only act on the id they were armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantId(pub u64);

/// When a grant ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    At(DateTime<Utc>),
    Never,
}

/// An active grant.
#[derive(Debug, Clone)]
pub struct Grant {
    pub id: GrantId,
    pub key: GrantKey,
    pub assignment: Assignment,
    pub granted_at: DateTime<Utc>,
    pub expiry: Expiry,
    pub(crate) timer: Option<ExpiryHandle>,
}

impl Grant {
    /// Whether an expiry timer is attached. Never true for infinite grants.
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.expiry {
            Expiry::At(at) => Some(at),
            Expiry::Never => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_accepts_mentions() {
        assert_eq!("42".parse::<Principal>(), Ok(Principal(42)));
        assert_eq!("<@42>".parse::<Principal>(), Ok(Principal(42)));
        assert_eq!("<@!42>".parse::<Principal>(), Ok(Principal(42)));
        assert!("<@abc>".parse::<Principal>().is_err());
        assert!("".parse::<Principal>().is_err());
    }

    #[test]
    fn capability_names_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(cap.name().parse::<Capability>(), Ok(cap));
        }
        assert_eq!("PRIME".parse::<Capability>(), Ok(Capability::Plan(Plan::Prime)));
        assert_eq!("permit".parse::<Capability>(), Ok(Capability::CommandAccess));
        assert!("gold".parse::<Capability>().is_err());
    }

    #[test]
    fn grant_key_display() {
        let key = GrantKey::new(Principal(7), Capability::Plan(Plan::Essential));
        assert_eq!(key.to_string(), "7/essential");
    }

    #[test]
    fn capability_serializes_as_name() {
        let json = serde_json::to_string(&Capability::Plan(Plan::Prime)).unwrap();
        assert_eq!(json, "\"prime\"");
        let cap: Capability = serde_json::from_str("\"command-access\"").unwrap();
        assert_eq!(cap, Capability::CommandAccess);
        assert!(serde_json::from_str::<Capability>("\"gold\"").is_err());
    }

    #[test]
    fn principal_deserializes_from_id_or_mention() {
        let ids: Vec<Principal> = serde_json::from_str(r#"[42, "43", "<@44>", "<@!45>"]"#).unwrap();
        assert_eq!(ids, vec![Principal(42), Principal(43), Principal(44), Principal(45)]);
        assert!(serde_json::from_str::<Principal>(r#""someone""#).is_err());
        assert!(serde_json::from_str::<Principal>("-1").is_err());
        assert_eq!(serde_json::to_string(&Principal(42)).unwrap(), "42");
    }
}
