use crate::error::{Result, SalvoError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Trait for commitment schemes
pub trait CommitmentScheme {
    type Opening;

    fn commit(opening: &Self::Opening) -> CommitHash;

    fn verify(commitment: &CommitHash, opening: &Self::Opening) -> bool {
        Self::commit(opening) == *commitment
    }
}

/// 32-byte commitment digest. Serialized as hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitHash([u8; 32]);

impl CommitHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| SalvoError::internal(format!("Invalid commitment hex: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SalvoError::internal("Commitment must be 32 bytes"))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for CommitHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CommitHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CommitHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
