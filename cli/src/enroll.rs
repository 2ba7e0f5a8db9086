//! Identity enrollment.

use tracing::{info, warn};
use zeroize::Zeroizing;

use pentagon_proto::{Keypair, Legend, Secret};

use crate::backend::{AuthBackend, BackendError, EnrollRequest};
use crate::error::EnrollError;

/// A registered identity.
///
/// `private_key` is returned once for the caller to use or display; it must
/// not be kept in long-lived state.
pub struct EnrollmentResult {
    pub success: bool,
    pub address: String,
    pub public_key: String,
    pub private_key: Zeroizing<String>,
}

impl std::fmt::Debug for EnrollmentResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentResult")
            .field("success", &self.success)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Bind `secret` and `legend` to `keypair` and register them with the
/// backend. Calls the backend exactly once.
///
/// Not idempotent: every successful call creates a distinct identity.
pub async fn enroll<B: AuthBackend + ?Sized>(
    backend: &mut B,
    secret: &Secret,
    legend: &Legend,
    keypair: Keypair,
    salt: &str,
) -> Result<EnrollmentResult, EnrollError> {
    if salt.is_empty() {
        return Err(EnrollError::Initialization("salt is not configured".into()));
    }

    let address = keypair.address();
    let request = EnrollRequest {
        password: Zeroizing::new(secret.as_str().to_owned()),
        legend: legend.to_wire(),
        private_key: keypair.private_key_hex(),
        salt: salt.to_string(),
    };

    match backend.new_coin_auth(request).await {
        Ok(ack) if ack.success => {
            if let Some(registered) = ack.address.as_deref() {
                if registered != address {
                    warn!(
                        %registered,
                        expected = %address,
                        "backend registered a different address; that enrollment may persist on the backend"
                    );
                    return Err(EnrollError::Failed(format!(
                        "backend registered {registered}, expected {address}; \
                         the backend may keep an enrollment for {registered}"
                    )));
                }
            }
            info!(%address, "enrolled");
            Ok(EnrollmentResult {
                success: true,
                public_key: keypair.public_key_hex(),
                private_key: keypair.private_key_hex(),
                address,
            })
        }
        Ok(ack) => Err(EnrollError::Failed(
            ack.error.unwrap_or_else(|| "enrollment rejected".into()),
        )),
        Err(BackendError::Cancelled) => Err(EnrollError::Cancelled),
        Err(e) => Err(EnrollError::Failed(e.reason().to_string())),
    }
}
