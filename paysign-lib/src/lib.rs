//! Paysign library.
//!
//! Request signing and response verification for the payment platform's v3
//! HTTP API. The crate never performs network I/O on its own: transports are
//! injected through the [`Transport`] trait and platform certificates are
//! supplied by the caller's refresh workflow through
//! [`PlatformCertificateStore`].
//!
//! # Components
//!
//! - **Signature engine** ([`engine`]): canonical base strings, RSA sign/verify
//! - **Credential store** ([`credential`]): merchant id, serial, private key
//! - **Platform certificate store** ([`store`]): snapshot-consistent certificate set
//! - **Request signer** ([`signer`]): produces the `Authorization` header
//! - **Response verifier** ([`verifier`]): gates every response on its signature
//!
//! # Example
//!
//! ```ignore
//! use paysign_lib::{Client, ClientConfig, CredentialStore, HttpMethod, PlatformCertificate};
//!
//! let credentials = CredentialStore::new("1900000001", "3775B6A45ACD588826D15E583A95F5DD", &key_pem)?;
//! let client = Client::new(ClientConfig::default(), credentials)?;
//! client.certificates().upsert(PlatformCertificate::from_pem(&cert_pem)?);
//!
//! let auth = client.authorize(HttpMethod::Get, "/v3/merchant/fund/balance/BASIC", b"")?;
//! // send with `Authorization: {auth}`, then:
//! client.verify_response(&sign_info, &body)?;
//! ```

use std::fmt;
use std::str::FromStr;

pub mod certificate;
pub mod client;
pub mod config;
pub mod credential;
pub mod engine;
pub mod errors;
pub mod replay;
pub mod resource;
pub mod signer;
pub mod store;
pub mod transport;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_utils;

pub use certificate::{parse_download_response, PlatformCertificate};
pub use client::{Client, Verified};
pub use config::ClientConfig;
pub use credential::{Credential, CredentialStore};
pub use engine::{SignatureAlgorithm, SignatureBaseString};
pub use errors::{
    CertificateError, ClientError, ConfigError, DecryptError, ErrorCode, SignError,
    TransportError, VerificationError,
};
pub use replay::NonceCache;
pub use resource::{DecryptedNotification, EncryptedResource, Notification, ResourceDecryptor};
pub use signer::{AuthorizationCredential, RequestSigner};
pub use store::{CertificateSet, PlatformCertificateStore};
pub use transport::{HttpRequest, HttpResponse, Transport};
pub use verifier::{ResponseVerifier, SignInfo};

/// Common result alias for signing operations.
pub type Result<T> = std::result::Result<T, SignError>;

/// HTTP methods accepted by the platform's signed API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`; never carries a body.
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Upper-case method name as it appears in the base string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether requests with this method may carry a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = SignError;

    /// Parses an exact upper-case method name. `get` is rejected: the name is
    /// signed verbatim and the platform only accepts upper case.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(SignError::encoding(
                "method",
                format!("unsupported HTTP method '{other}'"),
            )),
        }
    }
}
