//! HTTP client for a running relay

use crate::carrier::SendReceipt;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::phone::is_e164;
use crate::server::{RECEIVE_PATH, SEND_PATH};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Send endpoint reply, success or failure
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendReply {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

#[derive(Clone)]
pub struct RelayClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Drain the relay. An empty vec means nothing arrived since the last poll.
    pub async fn poll(&self) -> Result<Vec<Message>> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, RECEIVE_PATH))
            .query(&[("poll", "true")])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Send an SMS through the relay's outbound endpoint
    pub async fn send(&self, to: &str, body: &str) -> Result<SendReceipt> {
        if to.trim().is_empty() {
            return Err(Error::Validation("Please enter a phone number".to_string()));
        }
        if body.trim().is_empty() {
            return Err(Error::Validation("Please enter a message".to_string()));
        }
        if !is_e164(to) {
            return Err(Error::Validation(
                "Please enter a valid phone number (E.164 format recommended)".to_string(),
            ));
        }

        let response = self
            .http
            .post(format!("{}{}", self.base_url, SEND_PATH))
            .json(&json!({ "to": to, "body": body }))
            .send()
            .await?;

        let status = response.status();
        let reply: SendReply = response.json().await?;

        if status.is_success() {
            return Ok(SendReceipt {
                sid: reply.message_id.unwrap_or_default(),
                status: reply.status.unwrap_or_default(),
                to: reply.to.unwrap_or_default(),
                from: reply.from.unwrap_or_default(),
            });
        }

        let message = reply
            .error
            .unwrap_or_else(|| "Failed to send message".to_string());
        if status == reqwest::StatusCode::BAD_REQUEST && reply.code.is_none() {
            Err(Error::Validation(message))
        } else {
            Err(Error::Provider {
                status: Some(status.as_u16()),
                code: reply.code,
                message,
            })
        }
    }
}
