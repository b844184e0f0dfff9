use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const HASH_LENGTH: usize = 32;
pub const ADDRESS_LENGTH: usize = 20;

/// Errors produced when parsing hex-encoded chain primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing 0x prefix")]
    MissingPrefix,

    #[error("expected {expected} hex characters, got {got}")]
    BadLength { expected: usize, got: usize },

    #[error("invalid hex character")]
    InvalidHex,

    #[error("EIP-55 checksum mismatch")]
    BadChecksum,
}

// --- NewTypes ---

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; HASH_LENGTH]);

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl FromStr for Hash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").ok_or(ParseError::MissingPrefix)?;
        if digits.len() != HASH_LENGTH * 2 {
            return Err(ParseError::BadLength {
                expected: HASH_LENGTH * 2,
                got: digits.len(),
            });
        }
        let bytes = hex::decode(digits).map_err(|_| ParseError::InvalidHex)?;
        let mut arr = [0u8; HASH_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Hash(arr))
    }
}

impl Hash {
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut arr = [0u8; HASH_LENGTH];
        let len = bytes.len().min(HASH_LENGTH);
        arr[..len].copy_from_slice(&bytes[..len]);
        Hash(arr)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl Address {
    /// Parse a `0x`-prefixed 40-hex-digit address.
    ///
    /// All-lowercase and all-uppercase digits are accepted as-is; mixed-case
    /// input must carry a valid EIP-55 checksum.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let digits = s.strip_prefix("0x").ok_or(ParseError::MissingPrefix)?;
        if digits.len() != ADDRESS_LENGTH * 2 {
            return Err(ParseError::BadLength {
                expected: ADDRESS_LENGTH * 2,
                got: digits.len(),
            });
        }
        let bytes = hex::decode(digits).map_err(|_| ParseError::InvalidHex)?;
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        let address = Address(arr);

        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower && digits != address.checksummed_digits() {
            return Err(ParseError::BadChecksum);
        }

        Ok(address)
    }

    /// EIP-55 checksummed rendering, `0x`-prefixed.
    pub fn to_checksummed(&self) -> String {
        format!("0x{}", self.checksummed_digits())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    fn checksummed_digits(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = keccak_hash::keccak(lower.as_bytes());
        lower
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let nibble = if i % 2 == 0 {
                    digest.0[i / 2] >> 4
                } else {
                    digest.0[i / 2] & 0x0f
                };
                if nibble >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    }
}
