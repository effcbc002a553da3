use async_trait::async_trait;

use crate::verifier::{SignInfo, REQUEST_ID_HEADER};
use crate::{HttpMethod, TransportError, VerificationError};

/// A signed request ready to be sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Exactly the bytes that were signed.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// First header value with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A raw response as received, before any verification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// First header value with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Request-ID` assigned by the platform.
    pub fn request_id(&self) -> Option<&str> {
        self.header(REQUEST_ID_HEADER)
    }

    /// Signature headers of this response.
    pub fn sign_info(&self) -> Result<SignInfo, VerificationError> {
        SignInfo::from_headers(
            self.headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends a signed request and returns the platform's raw response.
///
/// Implementations must not alter the body in either direction: the request
/// body is covered by the `Authorization` signature and the response body by
/// `Wechatpay-Signature`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
