use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use super::{Notifier, NotifyError};

const MAX_MESSAGE_LEN: usize = 1600;
const PHONE_LEN: usize = 10;

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number in E.164 form
    pub from_phone: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// SMS notifier backed by the Twilio Messages API
pub struct TwilioNotifier {
    client: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioNotifier {
    pub fn new(config: TwilioConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    /// Recipients are 10-digit national numbers, sent with a +1 prefix
    fn validate(recipient: &str, message: &str) -> Result<(String, String), NotifyError> {
        let phone = recipient.trim();
        if phone.len() != PHONE_LEN || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(NotifyError::InvalidRecipient(recipient.to_string()));
        }

        let body = message.trim();
        if body.is_empty() {
            return Err(NotifyError::InvalidMessage("message is empty".to_string()));
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(NotifyError::InvalidMessage(format!(
                "message longer than {MAX_MESSAGE_LEN} characters"
            )));
        }

        Ok((format!("+1{phone}"), body.to_string()))
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let (to, body) = Self::validate(recipient, message)?;

        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("From", &self.config.from_phone)
            .append_pair("To", &to)
            .append_pair("Body", &body)
            .finish();

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected { status: status.as_u16(), body })
        }
    }
}
