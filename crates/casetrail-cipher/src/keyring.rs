//! Keyring-backed `ContentCipher`.
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce). Key size: 32 bytes.
//!
//! Ciphertext wire format:
//!   [ nonce (24 bytes) | ciphertext + tag ]
//!
//! The key id is bound as associated data, so a blob sealed under one key
//! id cannot be opened under another even if the key bytes match.

use std::{collections::HashMap, fmt};

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    XChaCha20Poly1305, XNonce,
};
use tracing::debug;
use zeroize::Zeroizing;

use casetrail_contracts::error::{CaseError, CaseResult};
use casetrail_core::traits::ContentCipher;

const NONCE_LEN: usize = 24;

/// A `ContentCipher` over a fixed set of 32-byte keys.
///
/// How keys get here (KMS, env, config) is the host's concern; the keyring
/// only resolves ids it was given. Key bytes are wiped on drop.
#[derive(Default)]
pub struct KeyringCipher {
    keys: HashMap<String, Zeroizing<[u8; 32]>>,
}

impl fmt::Debug for KeyringCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("KeyringCipher").field("key_ids", &ids).finish_non_exhaustive()
    }
}

impl KeyringCipher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the key for `key_id`.
    pub fn with_key(mut self, key_id: impl Into<String>, key: [u8; 32]) -> Self {
        self.keys.insert(key_id.into(), Zeroizing::new(key));
        self
    }

    /// Register a key given as 64 hex characters.
    pub fn with_hex_key(self, key_id: impl Into<String>, key_hex: &str) -> CaseResult<Self> {
        let key_id = key_id.into();
        let bytes = Zeroizing::new(hex::decode(key_hex).map_err(|e| CaseError::ConfigError {
            reason: format!("key '{}' is not valid hex: {}", key_id, e),
        })?);
        let mut key = Zeroizing::new([0u8; 32]);
        if bytes.len() != key.len() {
            return Err(CaseError::ConfigError {
                reason: format!("key '{}' must be exactly 32 bytes", key_id),
            });
        }
        key.copy_from_slice(&bytes);
        Ok(self.with_key(key_id, *key))
    }

    pub fn has_key(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }

    fn cipher_for(&self, key_id: &str) -> CaseResult<XChaCha20Poly1305> {
        let key = self.keys.get(key_id).ok_or_else(|| CaseError::KeyUnavailable {
            key_id: key_id.to_string(),
        })?;
        XChaCha20Poly1305::new_from_slice(&key[..]).map_err(|_| CaseError::KeyUnavailable {
            key_id: key_id.to_string(),
        })
    }
}

impl ContentCipher for KeyringCipher {
    fn encrypt(&self, plaintext: &[u8], key_id: &str) -> CaseResult<Vec<u8>> {
        let cipher = self.cipher_for(key_id)?;
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: key_id.as_bytes(),
                },
            )
            .map_err(|_| CaseError::PayloadUnreadable {
                reason: format!("encryption under key '{}' failed", key_id),
            })?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        debug!(key_id = %key_id, bytes = out.len(), "payload sealed");
        Ok(out)
    }

    fn decrypt(&self, data: &[u8], key_id: &str) -> CaseResult<Zeroizing<Vec<u8>>> {
        let cipher = self.cipher_for(key_id)?;
        if data.len() < NONCE_LEN {
            return Err(CaseError::PayloadUnreadable {
                reason: format!("ciphertext shorter than the {}-byte nonce", NONCE_LEN),
            });
        }
        let (nonce_bytes, ct) = data.split_at(NONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ct,
                    aad: key_id.as_bytes(),
                },
            )
            .map_err(|_| CaseError::PayloadUnreadable {
                reason: format!("authentication failed under key '{}'", key_id),
            })?;
        Ok(Zeroizing::new(plaintext))
    }
}
