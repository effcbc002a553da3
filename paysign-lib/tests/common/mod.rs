//! Common test utilities for paysign-lib integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use paysign_lib::engine::{self, SignatureAlgorithm, SignatureBaseString};
use paysign_lib::signer::{canonical_path, AuthorizationCredential};
use paysign_lib::transport::{HttpRequest, HttpResponse, Transport};
use paysign_lib::{CredentialStore, PlatformCertificate, SignInfo, TransportError};
use rsa::RsaPrivateKey;

pub const MERCHANT_KEY_PEM: &str = include_str!("../fixtures/merchant_key.pem");
pub const PLATFORM_KEY_PEM: &str = include_str!("../fixtures/platform_key.pem");
pub const PLATFORM_CERT_PEM: &str = include_str!("../fixtures/platform_cert.pem");
pub const EXPIRED_PLATFORM_CERT_PEM: &str = include_str!("../fixtures/expired_platform_cert.pem");
pub const ROTATED_PLATFORM_KEY_PEM: &str = include_str!("../fixtures/rotated_platform_key.pem");
pub const REFERENCE_SIGNATURE: &str = include_str!("../fixtures/reference_signature.b64");
pub const CERTIFICATES_RESPONSE_JSON: &str = include_str!("../fixtures/certificates_response.json");
pub const NOTIFICATION_JSON: &str = include_str!("../fixtures/notification.json");

pub const API_V3_KEY: &[u8] = b"a8f1c3e5b7d9f0a2c4e6b8d0f2a4c6e8";
pub const MERCHANT_ID: &str = "1900000001";
pub const MERCHANT_SERIAL: &str = "3775B6A45ACD588826D15E583A95F5DD";
pub const PLATFORM_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";
pub const EXPIRED_PLATFORM_SERIAL: &str = "6B3E2F8A1C9D4E7F0A2B3C4D5E6F708192A3B4C5";

pub fn merchant_credentials() -> CredentialStore {
    CredentialStore::new(MERCHANT_ID, MERCHANT_SERIAL, MERCHANT_KEY_PEM).unwrap()
}

pub fn platform_key() -> RsaPrivateKey {
    engine::parse_private_key_pem(PLATFORM_KEY_PEM).unwrap()
}

pub fn rotated_platform_key() -> RsaPrivateKey {
    engine::parse_private_key_pem(ROTATED_PLATFORM_KEY_PEM).unwrap()
}

pub fn platform_certificate() -> PlatformCertificate {
    PlatformCertificate::from_pem(PLATFORM_CERT_PEM).unwrap()
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Sign `body` the way the platform signs responses and callbacks.
pub fn sign_as_platform(
    key: &RsaPrivateKey,
    serial_no: &str,
    timestamp: i64,
    nonce: &str,
    body: &[u8],
) -> SignInfo {
    let base = SignatureBaseString::response(timestamp, nonce, body);
    let signature = engine::sign(SignatureAlgorithm::RsaSha256, base.as_bytes(), key).unwrap();
    SignInfo::new(timestamp, nonce, STANDARD.encode(signature), serial_no)
}

/// Response headers carrying `sign_info`.
pub fn signature_headers(sign_info: &SignInfo) -> Vec<(String, String)> {
    vec![
        ("Wechatpay-Timestamp".to_string(), sign_info.timestamp.to_string()),
        ("Wechatpay-Nonce".to_string(), sign_info.nonce.clone()),
        ("Wechatpay-Signature".to_string(), sign_info.signature.clone()),
        ("Wechatpay-Serial".to_string(), sign_info.platform_serial_no.clone()),
    ]
}

/// What the simulator does to a response after signing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tamper {
    None,
    /// Flip a bit in the body after signing.
    Body,
    /// Sign with a timestamp ten minutes old.
    Stale,
    /// Sign with a key the merchant does not trust.
    ForeignKey,
}

#[derive(Clone)]
struct Route {
    status: u16,
    body: Vec<u8>,
}

/// In-process stand-in for the platform API.
///
/// Checks every request's `Authorization` header against the merchant public
/// key and answers with responses signed by the platform fixture key.
pub struct PlatformSimulator {
    merchant_public_key: rsa::RsaPublicKey,
    platform_key: RsaPrivateKey,
    routes: HashMap<String, Route>,
    tamper: Mutex<Tamper>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl PlatformSimulator {
    pub fn new() -> Self {
        Self {
            merchant_public_key: merchant_credentials().get_credential().public_key(),
            platform_key: platform_key(),
            routes: HashMap::new(),
            tamper: Mutex::new(Tamper::None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer `path_and_query` with `status` and `body`.
    pub fn route(mut self, path_and_query: &str, status: u16, body: &str) -> Self {
        self.routes.insert(
            path_and_query.to_string(),
            Route {
                status,
                body: body.as_bytes().to_vec(),
            },
        );
        self
    }

    pub fn set_tamper(&self, tamper: Tamper) {
        *self.tamper.lock().unwrap() = tamper;
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn check_authorization(&self, request: &HttpRequest) -> Result<(), String> {
        let header = request
            .header("Authorization")
            .ok_or("missing Authorization")?;
        let auth = header
            .parse::<AuthorizationCredential>()
            .map_err(|e| e.to_string())?;
        if auth.merchant_id != MERCHANT_ID || auth.credential_serial_no != MERCHANT_SERIAL {
            return Err("unknown merchant".to_string());
        }
        let path = canonical_path(&request.url).map_err(|e| e.to_string())?;
        let body = std::str::from_utf8(&request.body).map_err(|e| e.to_string())?;
        let base = SignatureBaseString::request(request.method, &path, auth.timestamp, &auth.nonce, body);
        let signature = STANDARD.decode(&auth.signature).map_err(|e| e.to_string())?;
        if engine::verify(
            SignatureAlgorithm::RsaSha256,
            base.as_bytes(),
            &signature,
            &self.merchant_public_key,
        ) {
            Ok(())
        } else {
            Err("signature mismatch".to_string())
        }
    }

    fn respond(&self, status: u16, body: Vec<u8>) -> HttpResponse {
        let tamper = *self.tamper.lock().unwrap();
        let timestamp = match tamper {
            Tamper::Stale => now() - 600,
            _ => now(),
        };
        let key = match tamper {
            Tamper::ForeignKey => rotated_platform_key(),
            _ => self.platform_key.clone(),
        };
        let nonce = paysign_lib::signer::generate_nonce();
        let sign_info = sign_as_platform(&key, PLATFORM_SERIAL, timestamp, &nonce, &body);

        let mut body = body;
        if tamper == Tamper::Body && !body.is_empty() {
            body[0] ^= 0x01;
        }

        let mut headers = signature_headers(&sign_info);
        headers.push(("Request-ID".to_string(), format!("REQ-{nonce}")));
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        HttpResponse::new(status, headers, body)
    }
}

#[async_trait]
impl Transport for PlatformSimulator {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Err(reason) = self.check_authorization(&request) {
            let body = format!(r#"{{"code":"SIGN_ERROR","message":"{reason}"}}"#);
            return Ok(self.respond(401, body.into_bytes()));
        }

        let path = canonical_path(&request.url).map_err(|e| TransportError::Failed(e.to_string()))?;
        match self.routes.get(&*path) {
            Some(route) => Ok(self.respond(route.status, route.body.clone())),
            None => Ok(self.respond(
                404,
                br#"{"code":"RESOURCE_NOT_EXISTS","message":"no such route"}"#.to_vec(),
            )),
        }
    }
}

/// Transport that always fails.
pub struct UnreachableTransport;

#[async_trait]
impl Transport for UnreachableTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Timeout { timeout_ms: 30_000 })
    }
}
