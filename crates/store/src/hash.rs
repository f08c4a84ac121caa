//! BLAKE3 digests of checkpoint state blobs

use serde::{Deserialize, Serialize};

/// A BLAKE3 digest of a state blob (32 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StateDigest([u8; 32]);

impl StateDigest {
    /// Hash a state blob
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check a blob against this digest
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }

    /// Abbreviated hex form for display
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl std::fmt::Debug for StateDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StateDigest({})", self.to_hex())
    }
}

impl std::fmt::Display for StateDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_forms() {
        let digest = StateDigest::of(b"session state");
        let hex = digest.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(digest.to_string(), hex);
        assert!(hex.starts_with(&digest.short()));
        assert_eq!(digest.short().len(), 12);
    }

    #[test]
    fn test_matches() {
        let digest = StateDigest::of(b"one");
        assert!(digest.matches(b"one"));
        assert!(!digest.matches(b"two"));
    }
}
