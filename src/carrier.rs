//! Outbound SMS dispatch through the carrier's REST API
//!
//! One POST per message, no retry. Carrier failures come back as
//! `Error::Provider` carrying whatever status, code and message the carrier sent.

use crate::config::Config;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Message to hand to the carrier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundSms {
    pub to: String,
    pub body: String,
    pub from: String,
}

/// Carrier acknowledgment for an accepted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub sid: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub from: String,
}

/// Error body returned by the carrier on rejection
#[derive(Debug, Deserialize)]
struct CarrierErrorBody {
    code: Option<i64>,
    message: Option<String>,
    status: Option<u16>,
}

pub struct CarrierClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl CarrierClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            base_url: config.carrier_base_url.trim_end_matches('/').to_string(),
            account_sid: config.carrier_account_sid.clone(),
            auth_token: config.carrier_auth_token.clone(),
            from_number: config.carrier_from_number.clone(),
        })
    }

    /// Number outbound messages are sent from
    pub fn from_number(&self) -> &str {
        &self.from_number
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }

    /// Build an outbound message from this client's sender number
    pub fn compose(&self, to: &str, body: &str) -> OutboundSms {
        OutboundSms {
            to: to.to_string(),
            body: body.to_string(),
            from: self.from_number.clone(),
        }
    }

    pub async fn send(&self, sms: &OutboundSms) -> Result<SendReceipt> {
        let params = [
            ("To", sms.to.as_str()),
            ("From", sms.from.as_str()),
            ("Body", sms.body.as_str()),
        ];

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let receipt: SendReceipt = response.json().await?;
            info!("Carrier accepted {} to {} ({})", receipt.sid, receipt.to, receipt.status);
            return Ok(receipt);
        }

        let text = response.text().await.unwrap_or_default();
        let err = match serde_json::from_str::<CarrierErrorBody>(&text) {
            Ok(body) => Error::Provider {
                status: body.status.or(Some(status.as_u16())),
                code: body.code,
                message: body
                    .message
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
            },
            Err(_) => Error::Provider {
                status: Some(status.as_u16()),
                code: None,
                message: text,
            },
        };
        warn!("Carrier rejected message to {}: {}", sms.to, err);
        Err(err)
    }
}
