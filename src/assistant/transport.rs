use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::errors::AskError;
use crate::models::{AskRequest, AskResponse, ErrorBody};

const ASK_PATH: &str = "/api/ai/ask";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One prompt in, one full reply out.
///
/// Implementations classify their own failures into [`AskError`]. Dropping the
/// returned future must abandon the request; that is how the controller aborts.
#[async_trait]
pub trait AskTransport: Send + Sync + 'static {
    async fn ask(&self, prompt: &str) -> Result<String, AskError>;
}

/// [`AskTransport`] backed by the `POST /api/ai/ask` HTTP endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, AskError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AskError::transient(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}{ASK_PATH}", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl AskTransport for HttpTransport {
    async fn ask(&self, prompt: &str) -> Result<String, AskError> {
        let body = AskRequest { prompt: prompt.to_string() };
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AskError::transient(format!("Network error: {e}")))?;

        let status = resp.status();
        debug!("{} answered {status}", self.url);

        if status == StatusCode::NOT_FOUND {
            return Err(AskError::NotFound);
        }

        if status.is_server_error() {
            // A structured message is the backend speaking; anything else is noise.
            return match resp.json::<ErrorBody>().await {
                Ok(ErrorBody { message }) if !message.is_empty() => Err(AskError::Service { message }),
                _ => Err(AskError::transient(format!("Server error: {status}"))),
            };
        }

        if !status.is_success() {
            return Err(AskError::transient(format!("Unexpected status: {status}")));
        }

        let parsed = resp.json::<AskResponse>().await.map_err(|e| {
            warn!("Unparsable reply from {}: {e}", self.url);
            AskError::InvalidResponse
        })?;

        match parsed.response {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(AskError::InvalidResponse),
        }
    }
}
