//! Encrypted resources and callback notifications.
//!
//! The platform encrypts downloaded certificates and the payload of callback
//! notifications with AEAD_AES_256_GCM under the merchant's API v3 key. The
//! ciphertext field is base64 of ciphertext followed by the 16-byte tag.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::DecryptError;

/// The only algorithm the platform uses for resources.
pub const AEAD_AES_256_GCM: &str = "AEAD_AES_256_GCM";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// An encrypted resource as it appears in platform JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResource {
    pub algorithm: String,
    pub ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_data: Option<String>,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
}

/// Decrypts [`EncryptedResource`]s with the API v3 key.
///
/// The key is wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ResourceDecryptor {
    key: [u8; KEY_LEN],
}

impl ResourceDecryptor {
    /// `api_v3_key` is the 32-character key set in the merchant console.
    pub fn new(api_v3_key: &[u8]) -> Result<Self, DecryptError> {
        let key: [u8; KEY_LEN] = api_v3_key
            .try_into()
            .map_err(|_| DecryptError::InvalidKeyLength(api_v3_key.len()))?;
        Ok(Self { key })
    }

    /// Decrypt a resource to its UTF-8 plaintext.
    pub fn decrypt(&self, resource: &EncryptedResource) -> Result<String, DecryptError> {
        if resource.algorithm != AEAD_AES_256_GCM {
            return Err(DecryptError::UnsupportedAlgorithm(resource.algorithm.clone()));
        }
        let plaintext = self.decrypt_raw(
            resource.nonce.as_bytes(),
            resource.associated_data.as_deref().unwrap_or("").as_bytes(),
            &resource.ciphertext,
        )?;
        String::from_utf8(plaintext).map_err(|_| DecryptError::Utf8)
    }

    /// Decrypt base64 `ciphertext` with an explicit nonce and associated data.
    pub fn decrypt_raw(
        &self,
        nonce: &[u8],
        associated_data: &[u8],
        ciphertext: &str,
    ) -> Result<Vec<u8>, DecryptError> {
        if nonce.len() != NONCE_LEN {
            return Err(DecryptError::InvalidNonceLength(nonce.len()));
        }
        let sealed = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| DecryptError::Base64(e.to_string()))?;

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| DecryptError::InvalidKeyLength(self.key.len()))?;
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: &sealed,
                    aad: associated_data,
                },
            )
            .map_err(|_| DecryptError::Authentication)
    }
}

impl fmt::Debug for ResourceDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDecryptor")
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Callback notification envelope.
///
/// Its signature is checked like a response, over the raw request body,
/// before the resource is decrypted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub create_time: String,
    pub event_type: String,
    pub resource_type: String,
    #[serde(default)]
    pub summary: String,
    pub resource: EncryptedResource,
}

impl Notification {
    /// Parse the callback body.
    pub fn from_json(body: &[u8]) -> Result<Self, DecryptError> {
        serde_json::from_slice(body)
            .map_err(|e| DecryptError::Malformed(format!("notification: {e}")))
    }

    /// Decrypt the resource, keeping the envelope metadata.
    pub fn decrypt(
        self,
        decryptor: &ResourceDecryptor,
    ) -> Result<DecryptedNotification, DecryptError> {
        let plaintext = decryptor.decrypt(&self.resource)?;
        Ok(DecryptedNotification {
            id: self.id,
            create_time: self.create_time,
            event_type: self.event_type,
            resource_type: self.resource_type,
            summary: self.summary,
            original_type: self.resource.original_type,
            plaintext,
        })
    }
}

/// A notification whose resource has been decrypted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptedNotification {
    pub id: String,
    pub create_time: String,
    pub event_type: String,
    pub resource_type: String,
    pub summary: String,
    pub original_type: Option<String>,
    /// Decrypted resource, usually JSON.
    pub plaintext: String,
}

impl DecryptedNotification {
    /// Deserialize the plaintext.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, DecryptError> {
        serde_json::from_str(&self.plaintext)
            .map_err(|e| DecryptError::Malformed(format!("notification resource: {e}")))
    }
}
