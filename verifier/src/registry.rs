//! Enrolled credentials.
//!
//! Each credential's secret and legend are sealed under a key derived from
//! the verifier master key and the salt the client enrolled with. The same
//! salt must be presented to open a session. Private keys are never stored.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use pentagon_proto::crypto::{aead, kdf};
use pentagon_proto::{Keypair, Legend, ProtoError, Secret};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("address {0} is already enrolled")]
    AlreadyEnrolled(String),

    #[error("address {0} is not enrolled")]
    UnknownIdentity(String),

    #[error("credential could not be opened")]
    Unseal(#[source] ProtoError),

    #[error("credential could not be sealed")]
    Seal(#[source] ProtoError),

    #[error("stored credential is corrupt")]
    Corrupt,
}

/// Plaintext of a sealed credential.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct CredentialSecrets {
    password: String,
    legend: String,
}

struct StoredCredential {
    public_key: String,
    sealed: Vec<u8>,
}

/// An opened credential, ready to drive a challenge session.
pub struct OpenedCredential {
    pub address: String,
    pub public_key: String,
    pub secret: Secret,
    pub legend: Legend,
}

pub struct Registry {
    entries: DashMap<String, StoredCredential>,
    master_key: Zeroizing<[u8; 32]>,
}

impl Registry {
    pub fn new(master_key: Zeroizing<[u8; 32]>) -> Self {
        Self {
            entries: DashMap::new(),
            master_key,
        }
    }

    /// Seal and store a new credential. Returns the enrolled address.
    pub fn enroll(
        &self,
        secret: &Secret,
        legend: &Legend,
        keypair: &Keypair,
        salt: &str,
    ) -> Result<String, RegistryError> {
        let address = keypair.address();
        let key = self.credential_key(&address, salt);

        let secrets = CredentialSecrets {
            password: secret.as_str().to_owned(),
            legend: legend.to_wire(),
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&secrets).map_err(|e| RegistryError::Seal(e.into()))?,
        );
        let sealed = aead::seal(&key, &plaintext).map_err(RegistryError::Seal)?;

        match self.entries.entry(address.clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyEnrolled(address)),
            Entry::Vacant(slot) => {
                slot.insert(StoredCredential {
                    public_key: keypair.public_key_hex(),
                    sealed,
                });
                Ok(address)
            }
        }
    }

    /// Open the credential enrolled under `address` with `salt`.
    pub fn open(&self, address: &str, salt: &str) -> Result<OpenedCredential, RegistryError> {
        let stored = self
            .entries
            .get(address)
            .ok_or_else(|| RegistryError::UnknownIdentity(address.to_string()))?;

        let key = self.credential_key(address, salt);
        let plaintext = aead::open(&key, &stored.sealed).map_err(RegistryError::Unseal)?;
        let secrets: CredentialSecrets =
            serde_json::from_slice(&plaintext).map_err(|_| RegistryError::Corrupt)?;

        let secret = Secret::parse(&secrets.password).map_err(|_| RegistryError::Corrupt)?;
        let legend = Legend::parse(&secrets.legend).map_err(|_| RegistryError::Corrupt)?;

        Ok(OpenedCredential {
            address: address.to_string(),
            public_key: stored.public_key.clone(),
            secret,
            legend,
        })
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn credential_key(&self, address: &str, salt: &str) -> Zeroizing<[u8; 32]> {
        let mut info = kdf::VERIFIER_CREDENTIAL_INFO.to_vec();
        info.push(b':');
        info.extend_from_slice(address.as_bytes());
        kdf::derive_key(&self.master_key[..], Some(salt.as_bytes()), &info)
    }
}
