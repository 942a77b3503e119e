//! Participant identities.

use crate::Hash;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A participant address.
///
/// Identities are opaque to the ballot: the administrator and voters are
/// compared by equality only. Keys map to addresses with
/// [`Identity::from_public_key`], which keeps the first 20 bytes of the
/// BLAKE3 digest of the key, hex-encoded behind a `0x` prefix.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an already-authenticated address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Derive the address owned by an ed25519 key.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let digest = Hash::of(key.as_bytes());
        let mut address = String::with_capacity(42);
        address.push_str("0x");
        for byte in &digest.as_bytes()[..20] {
            address.push_str(&format!("{:02x}", byte));
        }
        Self(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for feeds, e.g. `0x1234…abcd`.
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 12 {
            return self.0.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn key_addresses_are_deterministic() {
        let key = SigningKey::generate(&mut OsRng).verifying_key();
        let a = Identity::from_public_key(&key);
        let b = Identity::from_public_key(&key);

        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 42);
        assert!(a.as_str().starts_with("0x"));
    }

    #[test]
    fn distinct_keys_get_distinct_addresses() {
        let a = Identity::from_public_key(&SigningKey::generate(&mut OsRng).verifying_key());
        let b = Identity::from_public_key(&SigningKey::generate(&mut OsRng).verifying_key());
        assert_ne!(a, b);
    }

    #[test]
    fn short_form() {
        let id = Identity::new("0x1234567890abcdef1234567890abcdef12345678");
        assert_eq!(id.short(), "0x1234…5678");
        assert_eq!(Identity::new("alice").short(), "alice");
    }
}
