//! Twilio REST Client
//!
//! Implements the core telephony traits against Twilio's 2010-04-01 API:
//! outbound call placement with conversation and status callbacks, and SMS
//! delivery for outcome notifications. Speech recognition, voice rendering
//! and webhook signing all live on Twilio's side of the boundary.

use async_trait::async_trait;
use loanline_core::gateway::{CallHandle, GatewayError, Notifier, PlaceCallRequest, TelephonyGateway};
use serde::Deserialize;
use tracing::info;

const DEFAULT_API_BASE: &str = "https://api.twilio.com";

pub struct TwilioClient {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

#[derive(Deserialize)]
struct ResourceCreated {
    sid: String,
}

impl TwilioClient {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
        }
    }

    /// Points the client at a different API host, for testing.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, resource: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{}.json",
            self.api_base, self.account_sid, resource
        )
    }
}

#[async_trait]
impl TelephonyGateway for TwilioClient {
    async fn place_call(&self, request: PlaceCallRequest) -> Result<CallHandle, GatewayError> {
        let mut form: Vec<(&str, String)> = vec![
            ("To", request.to.clone()),
            ("From", request.from),
            ("Url", request.callback_url),
            ("Method", "POST".to_string()),
            ("StatusCallback", request.status_callback_url),
            ("StatusCallbackMethod", "POST".to_string()),
        ];
        for event in &request.status_events {
            form.push(("StatusCallbackEvent", event.clone()));
        }

        let response = self
            .http
            .post(self.endpoint("Calls"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{}: {}", status, body)));
        }

        let created: ResourceCreated = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        info!(to = %request.to, call_sid = %created.sid, "Outbound call placed");
        Ok(CallHandle { sid: created.sid })
    }
}

#[async_trait]
impl Notifier for TwilioClient {
    async fn notify(&self, phone_number: &str, message: &str) -> anyhow::Result<()> {
        let form = [
            ("To", phone_number),
            ("From", self.from_number.as_str()),
            ("Body", message),
        ];
        let response = self
            .http
            .post(self.endpoint("Messages"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("SMS send failed with {}: {}", status, body);
        }
        info!(to = %phone_number, "Outcome notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_include_account_and_resource() {
        let client = TwilioClient::new("ACtest", "token", "+15550100000");
        assert_eq!(
            client.endpoint("Calls"),
            "https://api.twilio.com/2010-04-01/Accounts/ACtest/Calls.json"
        );
        assert_eq!(
            client.endpoint("Messages"),
            "https://api.twilio.com/2010-04-01/Accounts/ACtest/Messages.json"
        );
    }

    #[test]
    fn api_base_override_trims_trailing_slash() {
        let client =
            TwilioClient::new("ACtest", "token", "+15550100000").with_api_base("http://localhost:8990/");
        assert_eq!(
            client.endpoint("Calls"),
            "http://localhost:8990/2010-04-01/Accounts/ACtest/Calls.json"
        );
    }
}
