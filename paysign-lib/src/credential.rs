//! Merchant credential store.
//!
//! Holds the merchant's private signing key together with the identifiers the
//! platform needs to select the matching public key. Key material is parsed
//! once, at construction; a bad key fails there and never at request time.

use std::fmt;

use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::engine;
use crate::SignError;

/// Smallest modulus the platform accepts, in bits.
pub const MIN_KEY_BITS: usize = 2048;

/// Immutable merchant credential.
#[derive(Clone)]
pub struct Credential {
    merchant_id: String,
    credential_serial_no: String,
    private_key: RsaPrivateKey,
}

impl Credential {
    /// Merchant identifier (`mchid`).
    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    /// Serial number of the merchant API certificate (`serial_no`).
    pub fn credential_serial_no(&self) -> &str {
        &self.credential_serial_no
    }

    /// Private signing key.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Public half of the signing key.
    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("merchant_id", &self.merchant_id)
            .field("credential_serial_no", &self.credential_serial_no)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Owned, read-only container for the merchant credential.
///
/// Shared freely across threads once built; nothing in it changes.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    credential: Credential,
}

impl CredentialStore {
    /// Build from a PEM-encoded private key (PKCS#8 or PKCS#1).
    ///
    /// # Errors
    ///
    /// [`SignError::Key`] if an identifier is empty, the PEM cannot be parsed,
    /// or the modulus is shorter than [`MIN_KEY_BITS`].
    pub fn new(
        merchant_id: impl Into<String>,
        credential_serial_no: impl Into<String>,
        private_key_pem: &str,
    ) -> crate::Result<Self> {
        let private_key = engine::parse_private_key_pem(private_key_pem)?;
        Self::from_key(merchant_id, credential_serial_no, private_key)
    }

    /// Build from an already-parsed private key.
    pub fn from_key(
        merchant_id: impl Into<String>,
        credential_serial_no: impl Into<String>,
        private_key: RsaPrivateKey,
    ) -> crate::Result<Self> {
        let merchant_id = merchant_id.into();
        let credential_serial_no = credential_serial_no.into();

        if merchant_id.trim().is_empty() {
            return Err(SignError::Key("merchant id cannot be empty".to_string()));
        }
        if credential_serial_no.trim().is_empty() {
            return Err(SignError::Key(
                "credential serial number cannot be empty".to_string(),
            ));
        }
        let bits = private_key.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(SignError::Key(format!(
                "RSA key is {bits} bits, at least {MIN_KEY_BITS} required"
            )));
        }

        tracing::debug!(
            merchant_id = %merchant_id,
            serial_no = %credential_serial_no,
            key_bits = bits,
            "loaded merchant credential"
        );

        Ok(Self {
            credential: Credential {
                merchant_id,
                credential_serial_no,
                private_key,
            },
        })
    }

    /// The stored credential.
    pub fn get_credential(&self) -> &Credential {
        &self.credential
    }
}
