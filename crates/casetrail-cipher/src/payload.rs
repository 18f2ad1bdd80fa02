//! Converting JSON payloads to and from their at-rest `EventData` form.

use zeroize::Zeroizing;

use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::EventData,
};
use casetrail_core::traits::ContentCipher;

/// Encrypt `value` under `key_id` and wrap it as sealed event data.
pub fn seal(cipher: &dyn ContentCipher, key_id: &str, value: &serde_json::Value) -> CaseResult<EventData> {
    let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
    let ciphertext = cipher.encrypt(&plaintext, key_id)?;
    Ok(EventData::Sealed {
        key_id: key_id.to_string(),
        ciphertext: hex::encode(ciphertext),
    })
}

/// Recover the JSON payload of `data`, decrypting if it is sealed.
///
/// Plain data is returned as is. Decryption errors (`KeyUnavailable`,
/// `PayloadUnreadable`) pass through untouched; they say nothing about the
/// chain's integrity. Decrypted bytes are wiped once parsed.
pub fn open(cipher: &dyn ContentCipher, data: &EventData) -> CaseResult<serde_json::Value> {
    match data {
        EventData::Plain(value) => Ok(value.clone()),
        EventData::Sealed { key_id, ciphertext } => {
            let bytes = hex::decode(ciphertext).map_err(|e| CaseError::PayloadUnreadable {
                reason: format!("ciphertext is not valid hex: {}", e),
            })?;
            let plaintext = cipher.decrypt(&bytes, key_id)?;
            serde_json::from_slice(&plaintext).map_err(|e| CaseError::PayloadUnreadable {
                reason: format!("decrypted payload is not JSON: {}", e),
            })
        }
    }
}
