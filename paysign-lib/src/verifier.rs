//! Response verifier.
//!
//! Every platform response and callback carries a signature over
//! `timestamp\nnonce\nbody\n`, made with the platform certificate named by
//! `Wechatpay-Serial`. [`ResponseVerifier::verify_response`] is the gate a
//! payload must pass before anything acts on it.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::config::ClientConfig;
use crate::engine::{self, SignatureAlgorithm, SignatureBaseString};
use crate::{NonceCache, PlatformCertificateStore, VerificationError};

pub const TIMESTAMP_HEADER: &str = "Wechatpay-Timestamp";
pub const NONCE_HEADER: &str = "Wechatpay-Nonce";
pub const SIGNATURE_HEADER: &str = "Wechatpay-Signature";
pub const SERIAL_HEADER: &str = "Wechatpay-Serial";
pub const REQUEST_ID_HEADER: &str = "Request-ID";

/// Default clock-skew tolerance, in seconds.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Signature metadata extracted from response headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignInfo {
    pub timestamp: i64,
    pub nonce: String,
    /// Base64 signature, as sent.
    pub signature: String,
    pub platform_serial_no: String,
}

impl SignInfo {
    pub fn new(
        timestamp: i64,
        nonce: impl Into<String>,
        signature: impl Into<String>,
        platform_serial_no: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            nonce: nonce.into(),
            signature: signature.into(),
            platform_serial_no: platform_serial_no.into(),
        }
    }

    /// Extract from `(name, value)` header pairs. Names match
    /// case-insensitively.
    ///
    /// The timestamp must be written canonically (no sign, no leading
    /// zeros): the base string is rebuilt from the parsed integer and must
    /// match the bytes the platform signed.
    pub fn from_headers<'a, I>(headers: I) -> Result<Self, VerificationError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut timestamp = None;
        let mut nonce = None;
        let mut signature = None;
        let mut serial = None;

        for (name, value) in headers {
            let slot = if name.eq_ignore_ascii_case(TIMESTAMP_HEADER) {
                &mut timestamp
            } else if name.eq_ignore_ascii_case(NONCE_HEADER) {
                &mut nonce
            } else if name.eq_ignore_ascii_case(SIGNATURE_HEADER) {
                &mut signature
            } else if name.eq_ignore_ascii_case(SERIAL_HEADER) {
                &mut serial
            } else {
                continue;
            };
            *slot = Some(value.trim());
        }

        let raw_timestamp = required(TIMESTAMP_HEADER, timestamp)?;
        let parsed = raw_timestamp
            .parse::<i64>()
            .map_err(|e| VerificationError::MalformedHeader {
                name: TIMESTAMP_HEADER,
                reason: e.to_string(),
            })?;
        if parsed.to_string() != raw_timestamp {
            return Err(VerificationError::MalformedHeader {
                name: TIMESTAMP_HEADER,
                reason: format!("'{raw_timestamp}' is not a canonical integer"),
            });
        }

        Ok(Self {
            timestamp: parsed,
            nonce: required(NONCE_HEADER, nonce)?.to_string(),
            signature: required(SIGNATURE_HEADER, signature)?.to_string(),
            platform_serial_no: required(SERIAL_HEADER, serial)?.to_string(),
        })
    }
}

fn required<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str, VerificationError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(VerificationError::MissingHeader { name }),
    }
}

/// Checks response signatures against the platform certificate store.
#[derive(Clone, Debug)]
pub struct ResponseVerifier {
    certificates: Arc<PlatformCertificateStore>,
    tolerance_secs: u64,
    algorithm: SignatureAlgorithm,
    replay: Option<Arc<NonceCache>>,
}

impl ResponseVerifier {
    /// Verifier with the default tolerance and algorithm, no replay cache.
    pub fn new(certificates: Arc<PlatformCertificateStore>) -> Self {
        Self {
            certificates,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            algorithm: SignatureAlgorithm::default(),
            replay: None,
        }
    }

    /// Verifier configured from `config`, with a replay cache if enabled.
    pub fn from_config(certificates: Arc<PlatformCertificateStore>, config: &ClientConfig) -> Self {
        let verifier = Self::new(certificates)
            .with_tolerance(config.clock_skew_tolerance_secs)
            .with_algorithm(config.algorithm);
        if config.replay_window_enabled {
            verifier.with_replay_cache(Arc::new(NonceCache::new()))
        } else {
            verifier
        }
    }

    pub fn with_tolerance(mut self, secs: u64) -> Self {
        self.tolerance_secs = secs;
        self
    }

    pub fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Reject nonces already accepted inside the skew window.
    pub fn with_replay_cache(mut self, cache: Arc<NonceCache>) -> Self {
        self.replay = Some(cache);
        self
    }

    pub fn certificates(&self) -> &Arc<PlatformCertificateStore> {
        &self.certificates
    }

    pub fn replay_cache(&self) -> Option<&Arc<NonceCache>> {
        self.replay.as_ref()
    }

    /// Verify against the current time.
    #[tracing::instrument(
        skip(self, sign_info, body),
        fields(serial_no = %sign_info.platform_serial_no, body_len = body.len())
    )]
    pub fn verify_response(&self, sign_info: &SignInfo, body: &[u8]) -> Result<(), VerificationError> {
        self.verify_response_at(sign_info, body, chrono::Utc::now().timestamp())
    }

    /// Verify as if the current time were `now`.
    ///
    /// Checks run in order: clock skew, certificate lookup and validity,
    /// signature, replay. Stops at the first failure.
    pub fn verify_response_at(
        &self,
        sign_info: &SignInfo,
        body: &[u8],
        now: i64,
    ) -> Result<(), VerificationError> {
        let result = self.check(sign_info, body, now);
        match &result {
            Ok(()) => tracing::debug!(
                serial_no = %sign_info.platform_serial_no,
                timestamp = sign_info.timestamp,
                "verified response signature"
            ),
            Err(err) => tracing::warn!(
                serial_no = %sign_info.platform_serial_no,
                code = err.code() as i32,
                error = %err,
                "response verification failed"
            ),
        }
        result
    }

    fn check(&self, sign_info: &SignInfo, body: &[u8], now: i64) -> Result<(), VerificationError> {
        if sign_info.timestamp.abs_diff(now) > self.tolerance_secs {
            return Err(VerificationError::StaleSignature {
                timestamp: sign_info.timestamp,
                now,
                tolerance_secs: self.tolerance_secs,
            });
        }

        let snapshot = self.certificates.snapshot();
        let serial_no = &sign_info.platform_serial_no;
        let certificate =
            snapshot
                .get(serial_no)
                .ok_or_else(|| VerificationError::UnknownCertificate {
                    serial_no: serial_no.clone(),
                })?;
        if certificate.is_expired_at(now) {
            return Err(VerificationError::ExpiredCertificate {
                serial_no: serial_no.clone(),
                not_after: certificate.not_after(),
            });
        }
        if now < certificate.not_before() {
            return Err(VerificationError::CertificateNotYetValid {
                serial_no: serial_no.clone(),
                not_before: certificate.not_before(),
            });
        }

        let signature = STANDARD
            .decode(sign_info.signature.as_bytes())
            .map_err(|_| VerificationError::InvalidSignature)?;
        let base = SignatureBaseString::response(sign_info.timestamp, &sign_info.nonce, body);
        if !engine::verify(
            self.algorithm,
            base.as_bytes(),
            &signature,
            certificate.public_key(),
        ) {
            return Err(VerificationError::InvalidSignature);
        }

        if let Some(cache) = &self.replay {
            let expires_at = sign_info
                .timestamp
                .saturating_add(i64::try_from(self.tolerance_secs).unwrap_or(i64::MAX));
            if !cache.check_and_record(&sign_info.nonce, expires_at, now) {
                return Err(VerificationError::ReplayedNonce {
                    nonce: sign_info.nonce.clone(),
                });
            }
        }

        Ok(())
    }
}
