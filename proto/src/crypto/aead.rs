//! ChaCha20-Poly1305 AEAD encryption/decryption.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::ProtoError;

pub const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypt plaintext using ChaCha20-Poly1305.
///
/// Returns ciphertext with 16-byte auth tag appended.
pub fn encrypt(key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, ProtoError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce = Nonce::from_slice(nonce);
    cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| ProtoError::EncryptionFailed(e.to_string()))
}

/// Decrypt ciphertext using ChaCha20-Poly1305.
///
/// Input includes the 16-byte auth tag.
pub fn decrypt(
    key: &[u8; 32],
    nonce: &[u8; 12],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, ProtoError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce = Nonce::from_slice(nonce);
    cipher
        .decrypt(nonce, ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| ProtoError::DecryptionFailed)
}

/// Encrypt under a fresh random nonce. Output layout: `nonce(12) || ciphertext`.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, ProtoError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = encrypt(key, &nonce, plaintext)?;
    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Reverse of [`seal`].
pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, ProtoError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(ProtoError::SealedTooShort {
            expected: NONCE_LEN + TAG_LEN,
            got: sealed.len(),
        });
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce: [u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| ProtoError::DecryptionFailed)?;
    decrypt(key, &nonce, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    #[test]
    fn seal_then_open() {
        let key = random_key();
        let sealed = seal(&key, b"0x1234abcd").unwrap();
        let opened = open(&key, &sealed).unwrap();
        assert_eq!(&*opened, b"0x1234abcd");
    }

    #[test]
    fn sealing_twice_uses_fresh_nonces() {
        let key = random_key();
        let a = seal(&key, b"same").unwrap();
        let b = seal(&key, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(&random_key(), b"secret").unwrap();
        assert!(open(&random_key(), &sealed).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = random_key();
        let mut sealed = seal(&key, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(matches!(open(&key, &sealed), Err(ProtoError::DecryptionFailed)));
    }

    #[test]
    fn truncated_value_rejected() {
        let err = open(&random_key(), &[0u8; 10]).unwrap_err();
        assert!(matches!(err, ProtoError::SealedTooShort { got: 10, .. }));
    }
}
