//! Object identifiers shared by users, follow edges and feedback.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const ID_LENGTH: usize = 12;

/// Error returned when a string is not a valid [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("identifier must be 24 hexadecimal characters")]
pub struct InvalidId;

/// 12-byte identifier rendered as 24 lowercase hexadecimal characters.
///
/// The first 4 bytes hold the creation second (big-endian), the 8 others
/// come from the OS random generator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ID_LENGTH]);

impl ObjectId {
    /// Generate a new [`ObjectId`].
    pub fn new() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();

        let mut bytes = [0u8; ID_LENGTH];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        rand::rngs::OsRng.fill_bytes(&mut bytes[4..]);

        Self(bytes)
    }

    /// Parse a 24 characters hexadecimal string.
    pub fn parse(id: &str) -> Result<Self, InvalidId> {
        if id.len() != ID_LENGTH * 2 {
            return Err(InvalidId);
        }

        let mut bytes = [0u8; ID_LENGTH];
        hex::decode_to_slice(id, &mut bytes).map_err(|_| InvalidId)?;
        Ok(Self(bytes))
    }

    /// Unix second embedded at creation.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ObjectId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
