//! Opaque 12-byte document identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::{Identity, KeyIdentity};

/// A 12-byte document identifier rendered as 24 lowercase hex digits.
///
/// Equality is byte equality. Instances parsed from differently-cased hex or
/// built from raw bytes compare equal and share one normalized key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

/// Error parsing an [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectIdError {
    #[error("object id must be 24 hex characters, got {len}")]
    InvalidLength { len: usize },

    #[error("invalid hex character '{ch}' in object id")]
    InvalidCharacter { ch: char },
}

impl ObjectId {
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, ObjectIdError> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|err| match err {
            hex::FromHexError::InvalidHexCharacter { c, .. } => {
                ObjectIdError::InvalidCharacter { ch: c }
            }
            hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
                ObjectIdError::InvalidLength { len: s.len() }
            }
        })?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl KeyIdentity for ObjectId {
    fn identity(&self) -> Identity {
        Identity::Canonical(self.to_hex())
    }

    fn same_key(&self, other: &Self) -> bool {
        self == other
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
