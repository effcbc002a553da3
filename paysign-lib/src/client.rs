//! Client glue.
//!
//! A [`Client`] owns one merchant credential, the platform certificate store
//! and the configuration. It signs requests, hands them to a caller-supplied
//! [`Transport`], and returns a response only after its signature checks out.
//! There is no global client; build as many as there are merchants.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::resource::{DecryptedNotification, Notification, ResourceDecryptor};
use crate::signer::{AuthorizationCredential, RequestSigner};
use crate::transport::{HttpRequest, Transport};
use crate::verifier::{ResponseVerifier, SignInfo};
use crate::{
    ClientConfig, ClientError, ConfigError, CredentialStore, DecryptError, HttpMethod,
    PlatformCertificateStore, SignError, VerificationError,
};

const USER_AGENT: &str = concat!("paysign/", env!("CARGO_PKG_VERSION"));

/// A payload whose response signature has been verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verified<T> {
    pub value: T,
    pub sign_info: SignInfo,
    /// `Request-ID` header, useful when reporting issues to the platform.
    pub request_id: Option<String>,
}

impl<T> Verified<T> {
    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Verified<U> {
        Verified {
            value: f(self.value),
            sign_info: self.sign_info,
            request_id: self.request_id,
        }
    }
}

/// Signed API client for one merchant.
#[derive(Clone, Debug)]
pub struct Client {
    config: ClientConfig,
    signer: RequestSigner,
    verifier: ResponseVerifier,
    certificates: Arc<PlatformCertificateStore>,
    decryptor: Option<ResourceDecryptor>,
}

impl Client {
    /// Client with an empty certificate store.
    pub fn new(config: ClientConfig, credentials: CredentialStore) -> Result<Self, ConfigError> {
        Self::with_certificates(config, credentials, Arc::new(PlatformCertificateStore::new()))
    }

    /// Client sharing an existing certificate store.
    pub fn with_certificates(
        config: ClientConfig,
        credentials: CredentialStore,
        certificates: Arc<PlatformCertificateStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let signer = RequestSigner::from_config(credentials, &config);
        let verifier = ResponseVerifier::from_config(Arc::clone(&certificates), &config);

        tracing::info!(
            merchant_id = signer.credentials().get_credential().merchant_id(),
            algorithm = %config.algorithm,
            replay_cache = config.replay_window_enabled,
            "created client"
        );

        Ok(Self {
            config,
            signer,
            verifier,
            certificates,
            decryptor: None,
        })
    }

    /// Enable notification decryption with the API v3 key.
    pub fn with_api_v3_key(mut self, api_v3_key: &[u8]) -> Result<Self, DecryptError> {
        self.decryptor = Some(ResourceDecryptor::new(api_v3_key)?);
        Ok(self)
    }

    /// Store the refresh workflow writes current platform certificates to.
    pub fn certificates(&self) -> &Arc<PlatformCertificateStore> {
        &self.certificates
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    pub fn verifier(&self) -> &ResponseVerifier {
        &self.verifier
    }

    /// Decryptor for resources, when an API v3 key was given.
    pub fn decryptor(&self) -> Option<&ResourceDecryptor> {
        self.decryptor.as_ref()
    }

    /// Sign a request; see [`RequestSigner::authorize`].
    pub fn authorize(
        &self,
        method: HttpMethod,
        url: &str,
        body: &[u8],
    ) -> Result<AuthorizationCredential, SignError> {
        self.signer.authorize(method, url, body)
    }

    /// Verify a response; see [`ResponseVerifier::verify_response`].
    pub fn verify_response(&self, sign_info: &SignInfo, body: &[u8]) -> Result<(), VerificationError> {
        self.verifier.verify_response(sign_info, body)
    }

    /// Absolute URL for `path`. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
        }
    }

    /// Sign and send a request, returning the verified raw body.
    ///
    /// Non-2xx answers come back as [`ClientError::Status`] without signature
    /// checks. Every 2xx answer is verified before it is returned.
    pub async fn execute<T>(
        &self,
        transport: &T,
        method: HttpMethod,
        path: &str,
        body: Vec<u8>,
    ) -> Result<Verified<Vec<u8>>, ClientError>
    where
        T: Transport + ?Sized,
    {
        let url = self.url(path);
        let authorization = self.signer.authorize(method, &url, &body)?;

        let mut headers = vec![
            ("Authorization".to_string(), authorization.to_header_value()),
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if !body.is_empty() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let response = transport
            .send(HttpRequest {
                method,
                url,
                headers,
                body,
            })
            .await?;
        let request_id = response.request_id().map(str::to_string);

        if !response.is_success() {
            tracing::warn!(
                status = response.status,
                request_id = request_id.as_deref().unwrap_or("-"),
                "platform returned error status"
            );
            return Err(ClientError::Status {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
                request_id,
            });
        }

        let sign_info = response.sign_info()?;
        self.verifier.verify_response(&sign_info, &response.body)?;

        Ok(Verified {
            value: response.body,
            sign_info,
            request_id,
        })
    }

    /// `GET` and deserialize a verified JSON body.
    pub async fn get_verified<T, R>(&self, transport: &T, path: &str) -> Result<Verified<R>, ClientError>
    where
        T: Transport + ?Sized,
        R: DeserializeOwned,
    {
        let raw = self.execute(transport, HttpMethod::Get, path, Vec::new()).await?;
        decode(raw)
    }

    /// `POST` a JSON body and deserialize the verified JSON answer.
    pub async fn post_verified<T, B, R>(
        &self,
        transport: &T,
        path: &str,
        body: &B,
    ) -> Result<Verified<R>, ClientError>
    where
        T: Transport + ?Sized,
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        let raw = self.execute(transport, HttpMethod::Post, path, body).await?;
        decode(raw)
    }

    /// Verify a callback notification and decrypt its resource.
    ///
    /// `headers` are the callback request's headers and `body` its raw body.
    pub fn verify_notification<'a, I>(
        &self,
        headers: I,
        body: &[u8],
    ) -> Result<DecryptedNotification, ClientError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let decryptor = self
            .decryptor
            .as_ref()
            .ok_or_else(|| ConfigError::new("api_v3_key", "required to decrypt notifications"))?;

        let sign_info = SignInfo::from_headers(headers)?;
        self.verifier.verify_response(&sign_info, body)?;

        let notification = Notification::from_json(body)?;
        tracing::debug!(
            id = %notification.id,
            event_type = %notification.event_type,
            "verified notification"
        );
        Ok(notification.decrypt(decryptor)?)
    }
}

fn decode<R: DeserializeOwned>(raw: Verified<Vec<u8>>) -> Result<Verified<R>, ClientError> {
    let value = if raw.value.is_empty() {
        serde_json::from_slice(b"null")?
    } else {
        serde_json::from_slice(&raw.value)?
    };
    Ok(Verified {
        value,
        sign_info: raw.sign_info,
        request_id: raw.request_id,
    })
}
