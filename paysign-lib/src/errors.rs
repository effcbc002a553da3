//! Error types for signing and verification.
//!
//! Signing failures, verification failures and transport failures are kept in
//! separate enums so that callers can never confuse "the network broke" with
//! "this response is not trustworthy". [`ClientError`] is the tagged union
//! returned by the request helpers in [`crate::client`].

use thiserror::Error;

/// Stable error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// Key material could not be parsed or is unsuitable
    Key = 1000,
    /// The signing primitive failed
    Crypto = 1001,
    /// Request input is not representable on the wire
    Encoding = 1002,
    /// Response timestamp outside the clock-skew window
    StaleSignature = 2000,
    /// No platform certificate with the given serial
    UnknownCertificate = 2001,
    /// Platform certificate past `not_after`
    ExpiredCertificate = 2002,
    /// Platform certificate before `not_before`
    CertificateNotYetValid = 2003,
    /// Signature did not validate
    InvalidSignature = 2004,
    /// Response nonce already seen inside the window
    ReplayedNonce = 2005,
    /// A signature header is absent
    MissingHeader = 2006,
    /// A signature header is present but unusable
    MalformedHeader = 2007,
    /// Certificate document could not be parsed
    Certificate = 3000,
    /// Two certificates share a serial number
    DuplicateSerial = 3001,
    /// AEAD resource decryption failed
    Decrypt = 3100,
    /// Transport/network layer error
    Transport = 4000,
    /// Platform answered with a non-success status
    Status = 4001,
    /// Verified body could not be deserialized
    Decode = 4002,
    /// Invalid configuration
    Config = 5000,
}

/// Errors raised while producing a request signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignError {
    /// Malformed or unsuitable key material. Fatal, never retried.
    #[error("key error: {0}")]
    Key(String),

    /// The underlying signature operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Input cannot be represented the way the platform expects.
    #[error("encoding error in {field}: {reason}")]
    Encoding {
        /// Offending input (`method`, `url`, `body`)
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl SignError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Key(_) => ErrorCode::Key,
            Self::Crypto(_) => ErrorCode::Crypto,
            Self::Encoding { .. } => ErrorCode::Encoding,
        }
    }

    pub(crate) fn encoding(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Encoding {
            field,
            reason: reason.into(),
        }
    }
}

/// Reasons a platform response (or callback) must not be trusted.
///
/// Every variant means "do not act on this payload". None of them is a
/// warning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// The signed timestamp is too far from local time.
    #[error("stale signature: timestamp {timestamp} is more than {tolerance_secs}s from local time {now}")]
    StaleSignature {
        /// Timestamp carried by the response
        timestamp: i64,
        /// Local time at verification
        now: i64,
        /// Configured tolerance
        tolerance_secs: u64,
    },

    /// No trusted certificate has this serial number.
    #[error("unknown platform certificate: {serial_no}")]
    UnknownCertificate {
        /// Serial named by the response
        serial_no: String,
    },

    /// The matching certificate has expired.
    #[error("platform certificate {serial_no} expired at {not_after}")]
    ExpiredCertificate {
        /// Certificate serial
        serial_no: String,
        /// Expiry, epoch seconds
        not_after: i64,
    },

    /// The matching certificate is not valid yet.
    #[error("platform certificate {serial_no} not valid before {not_before}")]
    CertificateNotYetValid {
        /// Certificate serial
        serial_no: String,
        /// Start of validity, epoch seconds
        not_before: i64,
    },

    /// The signature does not match the response.
    #[error("invalid response signature")]
    InvalidSignature,

    /// The nonce was already accepted inside the replay window.
    #[error("replayed response nonce: {nonce}")]
    ReplayedNonce {
        /// Repeated nonce
        nonce: String,
    },

    /// A required signature header is missing.
    #[error("missing response header: {name}")]
    MissingHeader {
        /// Header name
        name: &'static str,
    },

    /// A signature header is present but cannot be used.
    #[error("malformed response header {name}: {reason}")]
    MalformedHeader {
        /// Header name
        name: &'static str,
        /// Parse failure
        reason: String,
    },

    /// Public key material could not be parsed.
    #[error("key error: {0}")]
    Key(String),
}

impl VerificationError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::StaleSignature { .. } => ErrorCode::StaleSignature,
            Self::UnknownCertificate { .. } => ErrorCode::UnknownCertificate,
            Self::ExpiredCertificate { .. } => ErrorCode::ExpiredCertificate,
            Self::CertificateNotYetValid { .. } => ErrorCode::CertificateNotYetValid,
            Self::InvalidSignature => ErrorCode::InvalidSignature,
            Self::ReplayedNonce { .. } => ErrorCode::ReplayedNonce,
            Self::MissingHeader { .. } => ErrorCode::MissingHeader,
            Self::MalformedHeader { .. } => ErrorCode::MalformedHeader,
            Self::Key(_) => ErrorCode::Key,
        }
    }

    /// Returns true when refreshing the certificate store might make a retry
    /// succeed. The core itself never retries.
    pub fn suggests_certificate_refresh(&self) -> bool {
        matches!(
            self,
            Self::UnknownCertificate { .. } | Self::ExpiredCertificate { .. }
        )
    }
}

/// Errors from parsing platform certificates or maintaining the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CertificateError {
    /// PEM/X.509 structure could not be parsed.
    #[error("certificate parse error: {0}")]
    Parse(String),

    /// The certificate does not carry a usable RSA public key.
    #[error("certificate public key error: {0}")]
    PublicKey(String),

    /// The download envelope names a different serial than the certificate.
    #[error("certificate serial mismatch: envelope says {expected}, certificate has {actual}")]
    SerialMismatch {
        /// Serial from the envelope
        expected: String,
        /// Serial inside the certificate
        actual: String,
    },

    /// A certificate set contained the same serial twice.
    #[error("duplicate certificate serial: {0}")]
    DuplicateSerial(String),

    /// The encrypted certificate could not be decrypted.
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}

impl CertificateError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse(_) | Self::PublicKey(_) | Self::SerialMismatch { .. } => {
                ErrorCode::Certificate
            }
            Self::DuplicateSerial(_) => ErrorCode::DuplicateSerial,
            Self::Decrypt(_) => ErrorCode::Decrypt,
        }
    }
}

/// Errors from AEAD_AES_256_GCM resource decryption.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecryptError {
    /// Only `AEAD_AES_256_GCM` is supported.
    #[error("unsupported resource algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The API v3 key must be exactly 32 bytes.
    #[error("api v3 key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// The GCM nonce must be exactly 12 bytes.
    #[error("resource nonce must be 12 bytes, got {0}")]
    InvalidNonceLength(usize),

    /// Ciphertext is not valid base64.
    #[error("resource ciphertext is not base64: {0}")]
    Base64(String),

    /// Authentication tag mismatch (wrong key, nonce, aad or tampered data).
    #[error("resource authentication failed")]
    Authentication,

    /// Plaintext is not UTF-8.
    #[error("resource plaintext is not utf-8")]
    Utf8,

    /// The surrounding JSON document could not be parsed.
    #[error("malformed encrypted document: {0}")]
    Malformed(String),
}

/// Failure reported by a [`crate::transport::Transport`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be completed.
    #[error("transport error: {0}")]
    Failed(String),

    /// The request timed out.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Elapsed budget in milliseconds
        timeout_ms: u64,
    },
}

/// Invalid client configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid config {field}: {reason}")]
pub struct ConfigError {
    /// Configuration field or environment variable
    pub field: String,
    /// Why it was rejected
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Tagged result error for a full signed round trip.
///
/// Keeps HTTP-level failures ([`ClientError::Transport`], [`ClientError::Status`])
/// apart from signature-level failures ([`ClientError::Verification`]).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be signed.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// The response failed verification and must not be trusted.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The platform answered with a non-success status. The body is the
    /// platform's error document and is not signature-checked.
    #[error("platform returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Raw error body
        body: String,
        /// `Request-ID` header, if present
        request_id: Option<String>,
    },

    /// A verified body could not be deserialized.
    #[error("failed to decode verified body: {0}")]
    Decode(String),

    /// A verified notification resource could not be decrypted.
    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    /// The client configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Sign(e) => e.code(),
            Self::Verification(e) => e.code(),
            Self::Transport(_) => ErrorCode::Transport,
            Self::Status { .. } => ErrorCode::Status,
            Self::Decode(_) => ErrorCode::Decode,
            Self::Decrypt(_) => ErrorCode::Decrypt,
            Self::Config(_) => ErrorCode::Config,
        }
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// Verification failures are never retryable as-is; see
    /// [`VerificationError::suggests_certificate_refresh`].
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the failure means the response is untrusted.
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
