//! The identity keypair ("wallet") and the address derived from it.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::ProtoError;

/// Length of an address in bytes, before hex encoding.
pub const ADDRESS_LEN: usize = 20;

/// Ed25519 keypair used as the identity's wallet.
///
/// The private half is handed to the verifier once at enrollment and is
/// never persisted by the client.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Parse a hex-encoded 32-byte private key, with or without `0x`.
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, ProtoError> {
        let trimmed = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let bytes = Zeroizing::new(hex::decode(trimmed)?);
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            ProtoError::InvalidKeyFormat(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        let seed = Zeroizing::new(seed);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// `0x`-prefixed hex of the private key.
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.signing_key.to_bytes());
        Zeroizing::new(format!("0x{}", hex::encode(*bytes)))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// `0x`-prefixed hex of the public key.
    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.verifying_key().as_bytes()))
    }

    pub fn address(&self) -> String {
        address_from_public_key(&self.verifying_key())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// `"0x" + hex(last 20 bytes of SHA-256(public key))`.
pub fn address_from_public_key(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("0x{}", hex::encode(&digest[digest.len() - ADDRESS_LEN..]))
}

/// Whether `s` has the shape of an address. Says nothing about enrollment.
pub fn is_address(s: &str) -> bool {
    s.strip_prefix("0x").is_some_and(|h| {
        h.len() == ADDRESS_LEN * 2 && h.bytes().all(|b| b.is_ascii_hexdigit())
    })
}
