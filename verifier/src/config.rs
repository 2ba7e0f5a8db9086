//! Verifier configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Parser, Debug, Clone)]
#[command(name = "pentagon-verifier", about = "Pentagon challenge-response authentication backend")]
pub struct VerifierArgs {
    /// Address to bind (e.g. "0.0.0.0:8443")
    #[arg(long, default_value = "0.0.0.0:8443")]
    pub bind: String,

    /// Path to TLS certificate (PEM). Omit for plaintext WS (test mode only).
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key (PEM). Omit for plaintext WS (test mode only).
    #[arg(long)]
    pub tls_key: Option<PathBuf>,

    /// Authentication session expiry in seconds.
    #[arg(long, default_value = "600")]
    pub session_expiry: u64,

    /// Enrollment and authentication rate limit: max attempts per IP per minute.
    #[arg(long, default_value = "10")]
    pub rate_limit_auth: u32,

    /// Hex-encoded 32-byte key sealing enrolled credentials. A random key is
    /// generated when omitted, so enrollments do not survive a restart.
    #[arg(long, env = "PENTAGON_MASTER_KEY", hide_env_values = true)]
    pub master_key: Option<String>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("master key must be 64 hex characters")]
    InvalidMasterKey,

    #[error("--tls-cert and --tls-key must be given together")]
    IncompleteTls,
}

/// Parsed configuration used throughout the verifier.
#[derive(Clone)]
pub struct VerifierConfig {
    pub bind: String,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub session_expiry: Duration,
    pub rate_limit_auth: u32,
    pub master_key: Zeroizing<[u8; 32]>,
    pub log_level: String,
}

impl VerifierConfig {
    /// Plaintext config on an ephemeral port with a random master key.
    pub fn ephemeral() -> Self {
        Self {
            bind: "127.0.0.1:0".into(),
            tls_cert: None,
            tls_key: None,
            session_expiry: Duration::from_secs(600),
            rate_limit_auth: 1000,
            master_key: random_master_key(),
            log_level: "warn".into(),
        }
    }
}

impl std::fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("bind", &self.bind)
            .field("tls_cert", &self.tls_cert)
            .field("tls_key", &self.tls_key)
            .field("session_expiry", &self.session_expiry)
            .field("rate_limit_auth", &self.rate_limit_auth)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl TryFrom<VerifierArgs> for VerifierConfig {
    type Error = ConfigError;

    fn try_from(args: VerifierArgs) -> Result<Self, Self::Error> {
        if args.tls_cert.is_some() != args.tls_key.is_some() {
            return Err(ConfigError::IncompleteTls);
        }

        let master_key = match args.master_key.as_deref() {
            Some(hex_key) => parse_master_key(hex_key)?,
            None => random_master_key(),
        };

        Ok(Self {
            bind: args.bind,
            tls_cert: args.tls_cert,
            tls_key: args.tls_key,
            session_expiry: Duration::from_secs(args.session_expiry),
            rate_limit_auth: args.rate_limit_auth,
            master_key,
            log_level: args.log_level,
        })
    }
}

fn parse_master_key(hex_key: &str) -> Result<Zeroizing<[u8; 32]>, ConfigError> {
    let bytes = Zeroizing::new(hex::decode(hex_key.trim()).map_err(|_| ConfigError::InvalidMasterKey)?);
    let mut key = Zeroizing::new([0u8; 32]);
    if bytes.len() != key.len() {
        return Err(ConfigError::InvalidMasterKey);
    }
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn random_master_key() -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    rand::thread_rng().fill_bytes(key.as_mut());
    key
}
