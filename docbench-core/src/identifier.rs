//! Generation and parsing of the store's 12-byte identifier type.
//!
//! An [`Identifier`] has a canonical textual form of 24 lowercase hex characters.
//! Fresh identifiers are produced by the `bson` object id generator (timestamp,
//! process-unique random bytes and an incrementing counter).

use bson::{Bson, oid::ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{AdapterError, AdapterResult};

/// Number of characters in the textual form of an identifier.
pub const IDENTIFIER_HEX_LEN: usize = 24;

/// The store's native primary-key-capable identifier.
///
/// Identifiers are immutable. Equality and ordering follow the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(ObjectId);

impl Identifier {
    /// Generates a new, collision-resistant identifier.
    pub fn generate() -> Self {
        Identifier(ObjectId::new())
    }

    /// Parses an identifier from exactly 24 lowercase hex characters.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::MalformedIdentifier`] for any other input.
    pub fn parse(hex: &str) -> AdapterResult<Self> {
        if hex.len() != IDENTIFIER_HEX_LEN {
            return Err(AdapterError::malformed_identifier(
                hex,
                format!("expected {IDENTIFIER_HEX_LEN} characters, found {}", hex.len()),
            ));
        }

        if let Some(c) = hex.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(AdapterError::malformed_identifier(
                hex,
                format!("invalid character {c:?}"),
            ));
        }

        ObjectId::parse_str(hex)
            .map(Identifier)
            .map_err(|e| AdapterError::malformed_identifier(hex, e.to_string()))
    }

    /// Builds an identifier from its raw bytes.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Identifier(ObjectId::from_bytes(bytes))
    }

    /// Returns the canonical lowercase hex form.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Returns the raw bytes.
    pub fn bytes(&self) -> [u8; 12] {
        self.0.bytes()
    }

    /// Returns the creation time encoded in the leading four bytes.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0.timestamp().to_chrono()
    }

    /// Returns the wrapped driver value.
    pub fn as_object_id(&self) -> ObjectId {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Identifier {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

impl From<ObjectId> for Identifier {
    fn from(oid: ObjectId) -> Self {
        Identifier(oid)
    }
}

impl From<Identifier> for ObjectId {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl From<Identifier> for Bson {
    fn from(id: Identifier) -> Self {
        Bson::ObjectId(id.0)
    }
}
