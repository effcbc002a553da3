//! Request signer.
//!
//! Produces the `Authorization` header for an outgoing API call:
//!
//! ```text
//! WECHATPAY2-SHA256-RSA2048 mchid="1900000001",serial_no="…",nonce_str="…",timestamp="…",signature="…"
//! ```

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::config::{ClientConfig, DEFAULT_SCHEME};
use crate::engine::{self, SignatureAlgorithm, SignatureBaseString};
use crate::{CredentialStore, HttpMethod, SignError};

/// Length of generated request nonces.
pub const NONCE_LEN: usize = 32;

/// Random alphanumeric nonce from the OS generator.
pub fn generate_nonce() -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// The signed, structured value of an `Authorization` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationCredential {
    pub scheme: String,
    pub merchant_id: String,
    pub credential_serial_no: String,
    pub nonce: String,
    pub timestamp: i64,
    /// Base64 signature over the request base string.
    pub signature: String,
}

impl AuthorizationCredential {
    /// Header value, same as `to_string()`.
    pub fn to_header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AuthorizationCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mchid=\"{}\",serial_no=\"{}\",nonce_str=\"{}\",timestamp=\"{}\",signature=\"{}\"",
            self.scheme,
            self.merchant_id,
            self.credential_serial_no,
            self.nonce,
            self.timestamp,
            self.signature
        )
    }
}

impl FromStr for AuthorizationCredential {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| SignError::encoding("authorization", reason);

        let (scheme, params) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| malformed("missing credential scheme"))?;

        let mut merchant_id = None;
        let mut credential_serial_no = None;
        let mut nonce = None;
        let mut timestamp = None;
        let mut signature = None;

        for pair in params.split(',') {
            let (key, value) = pair
                .trim()
                .split_once('=')
                .ok_or_else(|| malformed("parameter without '='"))?;
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| malformed("parameter value is not quoted"))?
                .to_string();
            let slot = match key {
                "mchid" => &mut merchant_id,
                "serial_no" => &mut credential_serial_no,
                "nonce_str" => &mut nonce,
                "timestamp" => &mut timestamp,
                "signature" => &mut signature,
                other => {
                    return Err(SignError::encoding(
                        "authorization",
                        format!("unknown parameter '{other}'"),
                    ))
                }
            };
            if slot.replace(value).is_some() {
                return Err(SignError::encoding(
                    "authorization",
                    format!("repeated parameter '{key}'"),
                ));
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| malformed("missing timestamp"))?
            .parse::<i64>()
            .map_err(|_| malformed("timestamp is not an integer"))?;

        Ok(Self {
            scheme: scheme.to_string(),
            merchant_id: merchant_id.ok_or_else(|| malformed("missing mchid"))?,
            credential_serial_no: credential_serial_no
                .ok_or_else(|| malformed("missing serial_no"))?,
            nonce: nonce.ok_or_else(|| malformed("missing nonce_str"))?,
            timestamp,
            signature: signature.ok_or_else(|| malformed("missing signature"))?,
        })
    }
}

/// Signs outgoing requests with the merchant credential.
#[derive(Clone, Debug)]
pub struct RequestSigner {
    credentials: CredentialStore,
    algorithm: SignatureAlgorithm,
    scheme: String,
}

impl RequestSigner {
    /// Signer with the default algorithm and scheme.
    pub fn new(credentials: CredentialStore) -> Self {
        Self {
            credentials,
            algorithm: SignatureAlgorithm::default(),
            scheme: DEFAULT_SCHEME.to_string(),
        }
    }

    /// Signer using the algorithm and scheme from `config`.
    pub fn from_config(credentials: CredentialStore, config: &ClientConfig) -> Self {
        Self::new(credentials)
            .with_algorithm(config.algorithm)
            .with_scheme(config.scheme.clone())
    }

    pub fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Sign a request with a fresh nonce and the current time.
    ///
    /// `url` may be absolute or a path; `body` is exactly what will be sent.
    #[tracing::instrument(skip(self, body), fields(body_len = body.len()))]
    pub fn authorize(
        &self,
        method: HttpMethod,
        url: &str,
        body: &[u8],
    ) -> crate::Result<AuthorizationCredential> {
        self.authorize_with(
            method,
            url,
            body,
            chrono::Utc::now().timestamp(),
            &generate_nonce(),
        )
    }

    /// Sign a request with a caller-chosen timestamp and nonce.
    pub fn authorize_with(
        &self,
        method: HttpMethod,
        url: &str,
        body: &[u8],
        timestamp: i64,
        nonce: &str,
    ) -> crate::Result<AuthorizationCredential> {
        let path_and_query = canonical_path(url)?;
        let body = std::str::from_utf8(body)
            .map_err(|e| SignError::encoding("body", format!("not valid UTF-8: {e}")))?;
        if !method.allows_body() && !body.is_empty() {
            return Err(SignError::encoding(
                "body",
                format!("{method} requests must not carry a body"),
            ));
        }
        if nonce.is_empty() || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SignError::encoding("nonce", "must be non-empty ASCII alphanumeric"));
        }

        let base = SignatureBaseString::request(method, &path_and_query, timestamp, nonce, body);
        let credential = self.credentials.get_credential();
        let signature = engine::sign(self.algorithm, base.as_bytes(), credential.private_key())?;

        tracing::debug!(
            method = %method,
            path = %path_and_query,
            timestamp,
            "signed request"
        );

        Ok(AuthorizationCredential {
            scheme: self.scheme.clone(),
            merchant_id: credential.merchant_id().to_string(),
            credential_serial_no: credential.credential_serial_no().to_string(),
            nonce: nonce.to_string(),
            timestamp,
            signature: STANDARD.encode(signature),
        })
    }
}

/// Reduce `url` to the path and query that go into the base string.
///
/// Scheme and host are dropped, the query is kept byte for byte and any
/// fragment is dropped since it is never transmitted. The authority ends at
/// the first `/`, `?` or `#`; an absolute URL with an empty path signs as `/`.
pub fn canonical_path(url: &str) -> crate::Result<Cow<'_, str>> {
    let url = url.split_once('#').map_or(url, |(before, _)| before);

    let path = match url.split_once("://") {
        Some((_, rest)) if !url.starts_with('/') => {
            let end = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
            let (authority, tail) = rest.split_at(end);
            if authority.is_empty() {
                return Err(SignError::encoding("url", "absolute URL has no host"));
            }
            if tail.starts_with('/') {
                Cow::Borrowed(tail)
            } else {
                Cow::Owned(format!("/{tail}"))
            }
        }
        _ => Cow::Borrowed(url),
    };

    if !path.starts_with('/') {
        return Err(SignError::encoding("url", "path must start with '/'"));
    }
    if let Some(c) = path.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(SignError::encoding(
            "url",
            format!("path contains forbidden character {c:?}"),
        ));
    }
    Ok(path)
}
