//! Symmetric primitives used to seal stored credentials.

pub mod aead;
pub mod kdf;
