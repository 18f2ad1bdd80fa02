//! Ed25519 pack signing.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;
use tracing::debug;

use casetrail_contracts::error::{CaseError, CaseResult};
use casetrail_core::traits::PackSigner;

/// A `PackSigner` holding an Ed25519 signing key in memory.
pub struct Ed25519PackSigner {
    key_id: String,
    signing_key: SigningKey,
}

impl Ed25519PackSigner {
    /// Construct a signer with a freshly generated key.
    pub fn generate(key_id: impl Into<String>) -> Self {
        let mut rng = OsRng;
        Self {
            key_id: key_id.into(),
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Construct a signer from a 32-byte seed.
    pub fn from_seed(key_id: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Construct a signer from a seed given as 64 hex characters.
    pub fn from_hex_seed(key_id: impl Into<String>, seed_hex: &str) -> CaseResult<Self> {
        let bytes = hex::decode(seed_hex).map_err(|e| CaseError::ConfigError {
            reason: format!("signing seed is not valid hex: {}", e),
        })?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| CaseError::ConfigError {
            reason: "signing seed must be exactly 32 bytes".to_string(),
        })?;
        Ok(Self::from_seed(key_id, seed))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl PackSigner for Ed25519PackSigner {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn verifying_key_hex(&self) -> String {
        hex::encode(self.verifying_key().to_bytes())
    }

    fn sign(&self, bytes: &[u8]) -> CaseResult<Vec<u8>> {
        let signature = self.signing_key.sign(bytes);
        debug!(key_id = %self.key_id, "manifest signed");
        Ok(signature.to_bytes().to_vec())
    }

    fn verify_signature(&self, bytes: &[u8], signature: &[u8]) -> CaseResult<bool> {
        Ok(verify_with_key(&self.verifying_key(), bytes, signature))
    }
}

fn verify_with_key(key: &VerifyingKey, bytes: &[u8], signature: &[u8]) -> bool {
    match Signature::from_slice(signature) {
        Ok(signature) => key.verify_strict(bytes, &signature).is_ok(),
        Err(_) => false,
    }
}

/// Check a hex signature against a hex-encoded Ed25519 public key, with no
/// access to the signer. This is what an external auditor runs.
pub fn verify_detached(verifying_key_hex: &str, bytes: &[u8], signature_hex: &str) -> CaseResult<bool> {
    let key_bytes = hex::decode(verifying_key_hex).map_err(|e| CaseError::SigningUnavailable {
        reason: format!("verifying key is not valid hex: {}", e),
    })?;
    let key_bytes: [u8; 32] = key_bytes.try_into().map_err(|_| CaseError::SigningUnavailable {
        reason: "verifying key must be exactly 32 bytes".to_string(),
    })?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| CaseError::SigningUnavailable {
        reason: format!("verifying key is not a valid Ed25519 point: {}", e),
    })?;

    let Ok(signature) = hex::decode(signature_hex) else {
        return Ok(false);
    };
    Ok(verify_with_key(&key, bytes, &signature))
}
