//! ~/.pentagon/ config and credential management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use pentagon_proto::crypto::{aead, kdf};

const CONFIG_FILE: &str = "config.toml";
const CREDENTIAL_FILE: &str = "credential.toml";

const SALT_LEN: usize = 16;

/// Local state directory. `open()` resolves ~/.pentagon/; `at()` is used by tests.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn open() -> Result<Self> {
        let home = dirs::home_dir().context("cannot determine home directory")?;
        Ok(Self::at(home.join(".pentagon")))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        Ok(&self.dir)
    }

    // ── config.toml ──

    pub fn load_config(&self) -> Result<Config> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if config.verifier.is_empty() {
            config.verifier = default_verifier();
        } else if !is_ws_url(&config.verifier) {
            anyhow::bail!(
                "invalid verifier URL {:?} in {}: must start with ws:// or wss://\n\
                 Reset it with: pentagon config set verifier {}",
                config.verifier,
                path.display(),
                default_verifier()
            );
        }
        Ok(config)
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let path = self.ensure_dir()?.join(CONFIG_FILE);
        let contents = toml::to_string_pretty(config)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Load the config, generating and persisting a salt on first use.
    pub fn load_or_init_config(&self) -> Result<Config> {
        let mut config = self.load_config()?;
        if config.salt.is_empty() {
            config.salt = generate_salt();
            self.save_config(&config)?;
        }
        Ok(config)
    }

    // ── credential.toml ──

    /// Enrolled when both sealed values are present.
    pub fn has_credential(&self) -> Result<bool> {
        Ok(self
            .read_sealed()?
            .is_some_and(|c| !c.encrypted_address.is_empty() && !c.encrypted_public_key.is_empty()))
    }

    pub fn save_credential(&self, salt: &str, identity: &StoredIdentity) -> Result<()> {
        let seal = |field: &str, value: &str| -> Result<String> {
            let key = kdf::derive_local_key(salt.as_bytes(), field);
            Ok(hex::encode(aead::seal(&key, value.as_bytes())?))
        };
        let sealed = SealedCredential {
            encrypted_address: seal("encrypted_address", &identity.address)?,
            encrypted_public_key: seal("encrypted_public_key", &identity.public_key)?,
        };

        let path = self.ensure_dir()?.join(CREDENTIAL_FILE);
        std::fs::write(&path, toml::to_string_pretty(&sealed)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn load_credential(&self, salt: &str) -> Result<Option<StoredIdentity>> {
        let Some(sealed) = self.read_sealed()? else {
            return Ok(None);
        };
        if sealed.encrypted_address.is_empty() || sealed.encrypted_public_key.is_empty() {
            return Ok(None);
        }

        let unseal = |field: &str, value: &str| -> Result<String> {
            let key = kdf::derive_local_key(salt.as_bytes(), field);
            let bytes = hex::decode(value).with_context(|| format!("{field} is not hex"))?;
            let plain = aead::open(&key, &bytes).with_context(|| {
                format!("cannot decrypt {field}; was the salt in {CONFIG_FILE} changed?")
            })?;
            String::from_utf8(plain.to_vec()).with_context(|| format!("{field} is not UTF-8"))
        };

        Ok(Some(StoredIdentity {
            address: unseal("encrypted_address", &sealed.encrypted_address)?,
            public_key: unseal("encrypted_public_key", &sealed.encrypted_public_key)?,
        }))
    }

    /// Remove the stored credential. Returns whether one existed.
    pub fn clear_credential(&self) -> Result<bool> {
        let path = self.dir.join(CREDENTIAL_FILE);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
        Ok(true)
    }

    fn read_sealed(&self) -> Result<Option<SealedCredential>> {
        let path = self.dir.join(CREDENTIAL_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let sealed = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(sealed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_verifier")]
    pub verifier: String,
    #[serde(default)]
    pub salt: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verifier: default_verifier(),
            salt: String::new(),
        }
    }
}

pub fn default_verifier() -> String {
    "ws://127.0.0.1:8443".into()
}

pub fn is_ws_url(url: &str) -> bool {
    url.starts_with("ws://") || url.starts_with("wss://")
}

fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The enrolled identity as remembered locally. The private key is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredIdentity {
    pub address: String,
    pub public_key: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SealedCredential {
    #[serde(default)]
    encrypted_address: String,
    #[serde(default)]
    encrypted_public_key: String,
}
