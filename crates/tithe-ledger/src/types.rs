//! Core type definitions for the Tithe ledger
//!
//! Accounts are identified by opaque 32-byte addresses. The ledger never
//! inspects address contents; the zero address is reserved as "no address"
//! and rejected wherever a real account is required.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest-unit token amount
pub type Amount = u128;

/// Address - Unique identifier for ledger accounts
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Address {
    /// 256-bit account identifier
    id: [u8; 32],
}

impl Address {
    /// Create a new Address from raw bytes
    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Derive an Address from arbitrary seed bytes using BLAKE3
    pub fn from_seed(seed: &[u8]) -> Self {
        let hash = blake3::hash(seed);
        Self {
            id: *hash.as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(&bytes);
        Ok(Self { id })
    }

    /// The reserved zero address
    pub const ZERO: Self = Self { id: [0u8; 32] };

    /// Check whether this is the reserved zero address
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
