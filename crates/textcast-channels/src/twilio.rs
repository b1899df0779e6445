//! Twilio Programmable Messaging gateway.
//!
//! Sends one SMS per call through the REST API:
//! `POST {base}/2010-04-01/Accounts/{sid}/Messages.json` with form fields
//! `To`, `From`, `Body` and HTTP basic auth.

use async_trait::async_trait;
use serde::Deserialize;
use textcast_core::config::TwilioCredentials;
use textcast_core::error::{CampaignError, Result};
use textcast_core::traits::{Gateway, SendReceipt};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status reported for a message the API refused outright.
pub const REJECTED_STATUS: &str = "rejected";

/// Message resource returned by the API.
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
    status: Option<String>,
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: Option<String>,
}

/// Twilio REST gateway.
pub struct TwilioGateway {
    credentials: TwilioCredentials,
    base_url: String,
    client: reqwest::Client,
}

impl TwilioGateway {
    pub fn new(credentials: TwilioCredentials, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        )
    }
}

#[async_trait]
impl Gateway for TwilioGateway {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(&self, to: &str, from: &str, body: &str) -> Result<Option<SendReceipt>> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await
            .map_err(|e| CampaignError::Gateway(format!("Twilio request failed: {e}")))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| CampaignError::Gateway(format!("Twilio response unreadable: {e}")))?;

        interpret_response(status, &text, to)
    }
}

/// Turn an HTTP status + body into the gateway contract.
///
/// 2xx yields the provider status. Client errors tied to this one message
/// (bad number, unknown resource, unprocessable body) become a `rejected`
/// receipt. Auth failures and everything else abort the run.
fn interpret_response(http_status: u16, body: &str, to: &str) -> Result<Option<SendReceipt>> {
    match http_status {
        200..=299 => match serde_json::from_str::<MessageResource>(body) {
            Ok(MessageResource {
                sid,
                status: Some(status),
            }) => Ok(Some(SendReceipt::new(status, sid))),
            Ok(_) => {
                tracing::warn!("Twilio accepted request for {to} but reported no status");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Twilio response for {to} could not be decoded: {e}");
                Ok(None)
            }
        },
        400 | 404 | 422 => {
            tracing::error!("Twilio rejected message to {to}: {}", describe_error(body));
            Ok(Some(SendReceipt::new(REJECTED_STATUS, None)))
        }
        401 | 403 => Err(CampaignError::AuthFailed(format!(
            "Twilio returned {http_status}: {}",
            describe_error(body)
        ))),
        other => Err(CampaignError::Gateway(format!(
            "Twilio returned {other}: {}",
            describe_error(body)
        ))),
    }
}

fn describe_error(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            code,
            message: Some(message),
        }) => match code {
            Some(code) => format!("{message} (code {code})"),
            None => message,
        },
        _ => body.chars().take(200).collect(),
    }
}
