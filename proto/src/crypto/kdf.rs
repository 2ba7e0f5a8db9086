//! HKDF-SHA256 key derivation.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Info prefix for keys that seal a credential held by the verifier.
pub const VERIFIER_CREDENTIAL_INFO: &[u8] = b"pentagon-credential-v1";

/// Info prefix for keys that seal values stored on the client device.
pub const LOCAL_CREDENTIAL_INFO: &str = "pentagon-local-credential-v1";

/// Derive a 32-byte key using HKDF-SHA256.
///
/// - `ikm`: input key material
/// - `salt`: optional salt (`None` means the all-zero HKDF salt)
/// - `info`: context/info string
pub fn derive_key(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> Zeroizing<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let mut output = Zeroizing::new([0u8; 32]);
    hkdf.expand(info, output.as_mut())
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    output
}

/// Derive the key that seals one named value in the client's credential file.
///
/// Each stored value gets its own key, so two sealed values never share a
/// key/nonce space.
pub fn derive_local_key(salt: &[u8], name: &str) -> Zeroizing<[u8; 32]> {
    let info = format!("{LOCAL_CREDENTIAL_INFO}:{name}");
    derive_key(salt, None, info.as_bytes())
}
