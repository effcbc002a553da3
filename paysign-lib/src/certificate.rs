//! Platform certificates.
//!
//! A [`PlatformCertificate`] is the public half the platform signs its
//! responses with, plus the serial number responses name it by and the window
//! in which it may be used.

use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use serde::Deserialize;
use x509_parser::pem::parse_x509_pem;

use crate::engine;
use crate::resource::{EncryptedResource, ResourceDecryptor};
use crate::{CertificateError, DecryptError};

/// Trusted platform public key with its serial and validity window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformCertificate {
    serial_no: String,
    public_key: RsaPublicKey,
    not_before: i64,
    not_after: i64,
    subject: Option<String>,
}

impl PlatformCertificate {
    /// Build from parts. Validity bounds are epoch seconds, inclusive.
    pub fn new(
        serial_no: impl Into<String>,
        public_key: RsaPublicKey,
        not_before: i64,
        not_after: i64,
    ) -> Self {
        Self {
            serial_no: serial_no.into(),
            public_key,
            not_before,
            not_after,
            subject: None,
        }
    }

    /// Parse a PEM-encoded X.509 certificate.
    ///
    /// The serial becomes upper-case hex without leading zero bytes, which is
    /// how the platform writes it in `Wechatpay-Serial`.
    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        let (_, pem) = parse_x509_pem(pem.trim().as_bytes())
            .map_err(|e| CertificateError::Parse(format!("invalid PEM: {e}")))?;
        if pem.label != "CERTIFICATE" {
            return Err(CertificateError::Parse(format!(
                "expected a CERTIFICATE block, found '{}'",
                pem.label
            )));
        }
        let cert = pem
            .parse_x509()
            .map_err(|e| CertificateError::Parse(format!("invalid X.509 certificate: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let public_key = RsaPublicKey::from_public_key_der(tbs.subject_pki.raw)
            .map_err(|e| CertificateError::PublicKey(format!("not an RSA public key: {e}")))?;

        let serial = tbs.raw_serial();
        let significant = serial
            .iter()
            .position(|b| *b != 0)
            .map_or(&serial[serial.len().saturating_sub(1)..], |i| &serial[i..]);

        Ok(Self {
            serial_no: hex::encode_upper(significant),
            public_key,
            not_before: tbs.validity().not_before.timestamp(),
            not_after: tbs.validity().not_after.timestamp(),
            subject: Some(tbs.subject.to_string()),
        })
    }

    /// Build from a bare public key PEM, for platform public-key mode where
    /// the platform publishes a key id instead of a certificate.
    pub fn from_public_key_pem(
        serial_no: impl Into<String>,
        pem: &str,
        not_before: i64,
        not_after: i64,
    ) -> Result<Self, CertificateError> {
        let public_key = engine::parse_public_key_pem(pem)
            .map_err(|e| CertificateError::PublicKey(e.to_string()))?;
        Ok(Self::new(serial_no, public_key, not_before, not_after))
    }

    /// Serial number the platform names this certificate by.
    pub fn serial_no(&self) -> &str {
        &self.serial_no
    }

    /// RSA public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Start of validity, epoch seconds.
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// End of validity, epoch seconds.
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    /// Subject distinguished name, when parsed from X.509.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// True once `now` is past `not_after`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.not_after
    }

    /// True while `not_before <= now <= not_after`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}

#[derive(Deserialize)]
struct DownloadResponse {
    data: Vec<DownloadedCertificate>,
}

#[derive(Deserialize)]
struct DownloadedCertificate {
    serial_no: String,
    encrypt_certificate: EncryptedResource,
}

/// Decode the certificate-download endpoint's JSON body.
///
/// Each entry's certificate is AEAD-encrypted with the API v3 key; decrypted
/// PEM is parsed and its serial must match the envelope. The download response
/// is itself signed; check it with a [`crate::ResponseVerifier`] over the
/// returned certificates before handing them to the store.
pub fn parse_download_response(
    body: &[u8],
    decryptor: &ResourceDecryptor,
) -> Result<Vec<PlatformCertificate>, CertificateError> {
    let response: DownloadResponse = serde_json::from_slice(body)
        .map_err(|e| DecryptError::Malformed(format!("certificate download response: {e}")))?;

    response
        .data
        .into_iter()
        .map(|entry| {
            let pem = decryptor.decrypt(&entry.encrypt_certificate)?;
            let certificate = PlatformCertificate::from_pem(&pem)?;
            if certificate.serial_no() != entry.serial_no {
                return Err(CertificateError::SerialMismatch {
                    expected: entry.serial_no,
                    actual: certificate.serial_no().to_string(),
                });
            }
            Ok(certificate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[test]
    fn test_from_pem_reads_serial_and_validity() {
        let cert = PlatformCertificate::from_pem(test_utils::PLATFORM_CERT_PEM).unwrap();
        assert_eq!(cert.serial_no(), test_utils::PLATFORM_SERIAL);
        assert_eq!(cert.not_before(), test_utils::PLATFORM_NOT_BEFORE);
        assert_eq!(cert.not_after(), test_utils::PLATFORM_NOT_AFTER);
        assert_eq!(
            cert.public_key(),
            &test_utils::platform_private_key().to_public_key()
        );
        assert!(cert.subject().unwrap().contains("Test Platform Certificate"));
    }

    #[test]
    fn test_validity_window_is_inclusive() {
        let cert = test_utils::platform_certificate();
        assert!(cert.is_valid_at(test_utils::PLATFORM_NOT_BEFORE));
        assert!(cert.is_valid_at(test_utils::PLATFORM_NOT_AFTER));
        assert!(!cert.is_valid_at(test_utils::PLATFORM_NOT_BEFORE - 1));
        assert!(!cert.is_expired_at(test_utils::PLATFORM_NOT_AFTER));
        assert!(cert.is_expired_at(test_utils::PLATFORM_NOT_AFTER + 1));
    }

    #[test]
    fn test_expired_fixture_is_expired_now() {
        let cert = PlatformCertificate::from_pem(test_utils::EXPIRED_PLATFORM_CERT_PEM).unwrap();
        assert_eq!(cert.serial_no(), test_utils::EXPIRED_PLATFORM_SERIAL);
        assert!(cert.is_expired_at(chrono::Utc::now().timestamp()));
    }

    #[test]
    fn test_rejects_non_certificate_pem() {
        let err = PlatformCertificate::from_pem(test_utils::PLATFORM_PUBLIC_KEY_PEM).unwrap_err();
        assert!(matches!(err, CertificateError::Parse(_)));
        assert!(PlatformCertificate::from_pem("garbage").is_err());
    }

    #[test]
    fn test_public_key_mode() {
        let cert = PlatformCertificate::from_public_key_pem(
            "PUB_KEY_ID_0119000000012024101400000000",
            test_utils::PLATFORM_PUBLIC_KEY_PEM,
            0,
            i64::MAX,
        )
        .unwrap();
        assert_eq!(cert.serial_no(), "PUB_KEY_ID_0119000000012024101400000000");
        assert_eq!(cert.subject(), None);
        assert!(cert.is_valid_at(chrono::Utc::now().timestamp()));
    }

    #[test]
    fn test_parse_download_response() {
        let decryptor = ResourceDecryptor::new(test_utils::API_V3_KEY).unwrap();
        let certs = parse_download_response(
            test_utils::CERTIFICATES_RESPONSE_JSON.as_bytes(),
            &decryptor,
        )
        .unwrap();
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0], test_utils::platform_certificate());
    }

    #[test]
    fn test_download_response_serial_mismatch() {
        let tampered = test_utils::CERTIFICATES_RESPONSE_JSON
            .replace(test_utils::PLATFORM_SERIAL, "0000000000000000000000000000000000000001");
        let decryptor = ResourceDecryptor::new(test_utils::API_V3_KEY).unwrap();
        let err = parse_download_response(tampered.as_bytes(), &decryptor).unwrap_err();
        assert!(matches!(err, CertificateError::SerialMismatch { .. }));
    }

    #[test]
    fn test_download_response_wrong_key() {
        let decryptor = ResourceDecryptor::new(&[7u8; 32]).unwrap();
        let err = parse_download_response(
            test_utils::CERTIFICATES_RESPONSE_JSON.as_bytes(),
            &decryptor,
        )
        .unwrap_err();
        assert_eq!(err, CertificateError::Decrypt(DecryptError::Authentication));
    }
}
