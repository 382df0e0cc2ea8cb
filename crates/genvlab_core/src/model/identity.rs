//! Kernel and environment identifiers.
//!
//! # Invariants
//! - Identifiers are non-empty, contain no whitespace or commas, and never
//!   start with `-`, so they can be passed as a single registry argument and
//!   never collide with the comma-delimited output format.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s,\-][^\s,]*$").expect("valid identifier regex"));

/// Identifier rejected before reaching the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} `{value}`: must be non-empty without whitespace, commas or a leading `-`")]
pub struct IdentifierError {
    pub kind: &'static str,
    pub value: String,
}

/// Validates one identifier destined for a registry argument.
pub fn validate_identifier(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(())
    } else {
        Err(IdentifierError {
            kind,
            value: value.to_string(),
        })
    }
}

/// Opaque token identifying one kernel instance for its lifetime.
///
/// Supplied by the launch host; this crate never mints one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KernelId(String);

impl KernelId {
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        validate_identifier("kernel id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for KernelId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<KernelId> for String {
    fn from(value: KernelId) -> Self {
        value.0
    }
}

impl AsRef<str> for KernelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for KernelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_identifier, KernelId};

    #[test]
    fn accepts_uuid_style_kernel_ids() {
        let id = KernelId::parse("3f2a9c1e-7b4d-4e8a-9f00-1c2d3e4f5a6b").expect("uuid parse");
        assert_eq!(id.as_str(), "3f2a9c1e-7b4d-4e8a-9f00-1c2d3e4f5a6b");
    }

    #[test]
    fn rejects_ids_that_break_the_protocol() {
        for bad in ["", " ", "k 1", "k,1", "--eid", "-k", "k\t1"] {
            assert!(KernelId::parse(bad).is_err(), "`{bad}` must be rejected");
        }
    }

    #[test]
    fn error_names_the_identifier_kind() {
        let err = validate_identifier("environment id", "a,b").expect_err("comma must fail");
        assert!(err.to_string().contains("environment id"));
    }

    #[test]
    fn deserialization_validates() {
        let ok: KernelId = serde_json::from_str(r#""k1""#).expect("valid id");
        assert_eq!(ok.as_str(), "k1");
        assert!(serde_json::from_str::<KernelId>(r#""k 1""#).is_err());
    }
}
