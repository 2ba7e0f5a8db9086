use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("sealed value too short: expected at least {expected} bytes, got {got}")]
    SealedTooShort { expected: usize, got: usize },

    #[error("malformed round: {0}")]
    MalformedRound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
