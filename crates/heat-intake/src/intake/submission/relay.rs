use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::payload::RelayRequest;
use crate::config::RelayConfig;

/// Response contract of the relay: `success` plus an optional failure detail.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayAck {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay client could not be built: {0}")]
    Client(String),
    #[error("relay unreachable: {0}")]
    Transport(String),
    #[error("relay rejected the message: {0}")]
    Rejected(String),
    #[error("relay returned an unreadable response (HTTP {status})")]
    InvalidResponse { status: u16 },
}

/// Outbound boundary to the mail relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, request: &RelayRequest) -> Result<RelayAck, RelayError>;
}

/// JSON-over-HTTPS relay client.
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: Client,
    endpoint: String,
}

impl HttpRelay {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| RelayError::Client(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RelayTransport for HttpRelay {
    async fn send(&self, request: &RelayRequest) -> Result<RelayAck, RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|err| RelayError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| RelayError::Transport(err.to_string()))?;
        debug!(status = status.as_u16(), "relay responded");

        // The relay reports failures in the body, often alongside a 4xx status.
        serde_json::from_str::<RelayAck>(&body).map_err(|_| RelayError::InvalidResponse {
            status: status.as_u16(),
        })
    }
}

/// Turns a relay ack into a hard result: `success: false` becomes `Rejected`.
pub fn accepted(ack: RelayAck) -> Result<RelayAck, RelayError> {
    if ack.success {
        Ok(ack)
    } else {
        Err(RelayError::Rejected(
            ack.message.unwrap_or_else(|| "relay error".to_string()),
        ))
    }
}
