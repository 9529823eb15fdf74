//! BingX HTTP Client
//!
//! HTTP client wrapper for the BingX perpetual-swap REST API.
//! Provides timeout configuration, user-agent headers, and request signing.

use crate::bingx::codec;
use crate::bingx::request::{
    encode_params, ApiRequest, RECV_WINDOW_KEY, SIGNATURE_KEY, TIMESTAMP_KEY,
};
use crate::bingx::types::{ApiError, ApiResponse};
use crate::config::{Credentials, Endpoints};
use crate::error::{BingxError, Result};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const API_KEY_HEADER: &str = "X-BX-APIKEY";
const USER_AGENT: &str = "bingx-connector/0.1.0";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// BingX REST API HTTP client
///
/// Wraps reqwest::Client with the BingX base URL and optional API
/// credentials. Every request goes through [`BingxClient::call_api`], which
/// signs it (when asked to) and maps failures onto [`BingxError`].
#[derive(Clone)]
pub struct BingxClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) credentials: Option<Credentials>,
}

impl std::fmt::Debug for BingxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BingxClient")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &self.credentials.as_ref().map(|c| c.api_key.masked()),
            )
            .finish()
    }
}

/// A request after signing, ready to hand to reqwest
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) body: Option<String>,
}

impl BingxClient {
    /// Creates a client for public endpoints with a 10 second timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BingxError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: Endpoints::default().rest_base_url,
            credentials: None,
        })
    }

    /// Creates a client from `BINGX_BASE_URL`, `BINGX_API_KEY` and
    /// `BINGX_SECRET_KEY`. Missing credentials leave the client public-only.
    pub fn from_env() -> Result<Self> {
        let endpoints = Endpoints::from_env();
        let mut client = Self::new()?.with_base_url(endpoints.rest_base_url);

        match Credentials::from_env() {
            Ok(credentials) => client.credentials = Some(credentials),
            Err(reason) => tracing::debug!("BingX credentials not loaded: {}", reason),
        }

        Ok(client)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Hex HMAC-SHA256 of `payload`, keyed by the API secret
    pub(crate) fn sign_request(&self, payload: &str) -> Result<String> {
        let secret = self
            .credentials
            .as_ref()
            .map(|c| c.secret_key.expose_secret())
            .ok_or_else(|| BingxError::InvalidRequest("API secret not configured".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| BingxError::Internal(format!("Invalid secret key: {}", e)))?;

        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Adds timestamp, recvWindow and signature, then renders URL and body
    pub(crate) fn prepare(&self, mut request: ApiRequest) -> Result<PreparedRequest> {
        let mut query = encode_params(&request.query);
        let mut body = encode_params(&request.form);

        if request.signed {
            let recv_window = request.recv_window;
            let carrier = request.carrier_mut();
            if let Some(window) = recv_window {
                carrier.insert(RECV_WINDOW_KEY.to_string(), window.to_string());
            }
            carrier.insert(TIMESTAMP_KEY.to_string(), Self::timestamp_ms().to_string());

            let payload = encode_params(request.carrier());
            let signature = self.sign_request(&payload)?;
            let signed = format!("{}&{}={}", payload, SIGNATURE_KEY, signature);

            if request.form.is_empty() {
                query = signed;
            } else {
                body = signed;
            }
        }

        let mut url = format!("{}{}", self.base_url, request.endpoint);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        Ok(PreparedRequest {
            method: request.method,
            url,
            body: (!body.is_empty()).then_some(body),
        })
    }

    /// Signs and dispatches a request, returning the raw (decompressed) body
    ///
    /// # Errors
    /// * `InvalidRequest` - signed request without configured secret
    /// * `Api` - HTTP status >= 400 with an exchange error body
    /// * `RateLimit` - HTTP 429
    /// * `Connect` / `Internal` - network failures
    pub async fn call_api(&self, request: ApiRequest) -> Result<Vec<u8>> {
        let endpoint = request.endpoint.clone();
        let prepared = self.prepare(request)?;

        let mut builder = self
            .client
            .request(prepared.method.clone(), &prepared.url);
        if let Some(credentials) = &self.credentials {
            builder = builder.header(API_KEY_HEADER, credentials.api_key.expose_secret());
        }
        if let Some(body) = prepared.body {
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body);
        }

        tracing::debug!(method = %prepared.method, endpoint = %endpoint, "Sending BingX request");

        let response = builder.send().await?;
        let status = response.status();
        let raw = response.bytes().await?;
        let data = if codec::is_gzip(&raw) {
            codec::decode_gzip(&raw)?.into_bytes()
        } else {
            raw.to_vec()
        };

        tracing::debug!(
            endpoint = %endpoint,
            status = status.as_u16(),
            bytes = data.len(),
            "Received BingX response"
        );

        if status.as_u16() == 429 {
            return Err(BingxError::RateLimit(String::from_utf8_lossy(&data).into_owned()));
        }

        if status.as_u16() >= 400 {
            let api_error = serde_json::from_slice::<ApiError>(&data).unwrap_or_else(|e| {
                tracing::debug!("failed to unmarshal error body: {}", e);
                ApiError {
                    code: i64::from(status.as_u16()),
                    message: String::from_utf8_lossy(&data).into_owned(),
                }
            });
            return Err(api_error.into());
        }

        Ok(data)
    }

    /// Dispatches a request whose response uses the `{code, msg, data}`
    /// envelope and returns `data`
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Option<T>> {
        let data = self.call_api(request).await?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&data)?;
        Ok(envelope.into_result()?)
    }

    /// Like [`BingxClient::send`] but treats a missing `data` field as an error
    pub(crate) async fn send_required<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let endpoint = request.endpoint.clone();
        self.send(request)
            .await?
            .ok_or_else(|| BingxError::Parse(format!("empty data in response from {}", endpoint)))
    }
}
