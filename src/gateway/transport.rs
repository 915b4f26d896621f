//! Wire transport for the tutor API

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::{Error, Result};

/// Raw HTTP answer from the tutor endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body text
    pub body: String,
}

impl TransportResponse {
    /// Whether the status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request body to the tutor endpoint
///
/// Implementations report connectivity failures as [`Error::Network`] and
/// return any HTTP answer, successful or not, as a [`TransportResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post a JSON body and return the raw answer
    async fn post(&self, body: &serde_json::Value) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<SecretString>,
}

impl HttpTransport {
    /// Create a transport for an endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(endpoint: Url, api_key: Option<SecretString>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hanzi-deck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: &serde_json::Value) -> Result<TransportResponse> {
        let mut request = self.client.post(self.endpoint.clone()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}
