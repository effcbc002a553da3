//! Fixture access for unit tests.
//!
//! Keys and certificates are fixed files under `tests/fixtures` so that
//! signatures are reproducible and no test pays for RSA key generation.

use rsa::RsaPrivateKey;

use crate::certificate::PlatformCertificate;
use crate::credential::CredentialStore;
use crate::engine;

pub const MERCHANT_KEY_PEM: &str = include_str!("../tests/fixtures/merchant_key.pem");
pub const MERCHANT_KEY_PKCS1_PEM: &str = include_str!("../tests/fixtures/merchant_key_pkcs1.pem");
pub const PLATFORM_KEY_PEM: &str = include_str!("../tests/fixtures/platform_key.pem");
pub const PLATFORM_PUBLIC_KEY_PEM: &str = include_str!("../tests/fixtures/platform_public_key.pem");
pub const PLATFORM_CERT_PEM: &str = include_str!("../tests/fixtures/platform_cert.pem");
pub const EXPIRED_PLATFORM_CERT_PEM: &str =
    include_str!("../tests/fixtures/expired_platform_cert.pem");
pub const ROTATED_PLATFORM_KEY_PEM: &str =
    include_str!("../tests/fixtures/rotated_platform_key.pem");
pub const REFERENCE_SIGNATURE: &str = include_str!("../tests/fixtures/reference_signature.b64");
pub const CERTIFICATES_RESPONSE_JSON: &str =
    include_str!("../tests/fixtures/certificates_response.json");
pub const NOTIFICATION_JSON: &str = include_str!("../tests/fixtures/notification.json");

/// API v3 key the AEAD fixtures were encrypted with.
pub const API_V3_KEY: &[u8; 32] = b"a8f1c3e5b7d9f0a2c4e6b8d0f2a4c6e8";

pub const MERCHANT_ID: &str = "1900000001";
pub const MERCHANT_SERIAL: &str = "3775B6A45ACD588826D15E583A95F5DD";
pub const PLATFORM_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";
pub const EXPIRED_PLATFORM_SERIAL: &str = "6B3E2F8A1C9D4E7F0A2B3C4D5E6F708192A3B4C5";

/// 2020-01-01T00:00:00Z, start of the platform fixture's validity.
pub const PLATFORM_NOT_BEFORE: i64 = 1_577_836_800;
/// 2045-01-01T00:00:00Z, end of the platform fixture's validity.
pub const PLATFORM_NOT_AFTER: i64 = 2_366_841_600;

pub fn merchant_private_key() -> RsaPrivateKey {
    engine::parse_private_key_pem(MERCHANT_KEY_PEM).expect("merchant fixture key")
}

pub fn platform_private_key() -> RsaPrivateKey {
    engine::parse_private_key_pem(PLATFORM_KEY_PEM).expect("platform fixture key")
}

pub fn rotated_platform_private_key() -> RsaPrivateKey {
    engine::parse_private_key_pem(ROTATED_PLATFORM_KEY_PEM).expect("rotated fixture key")
}

pub fn merchant_credentials() -> CredentialStore {
    CredentialStore::new(MERCHANT_ID, MERCHANT_SERIAL, MERCHANT_KEY_PEM)
        .expect("merchant fixture credentials")
}

pub fn platform_certificate() -> PlatformCertificate {
    PlatformCertificate::from_pem(PLATFORM_CERT_PEM).expect("platform fixture certificate")
}
