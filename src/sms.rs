//! SMS delivery behind a trait so handlers never talk to the provider directly.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("sms gateway error: {0}")]
    Gateway(String),
    #[error("sms transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// One attempt, no automatic retry. Failure is surfaced to the caller.
    async fn send(&self, phone: &str, message: &str) -> Result<(), SmsError>;
}

/// smsc.ru HTTP adapter.
pub struct SmscClient {
    http: reqwest::Client,
    login: String,
    password: String,
    base_url: String,
}

impl SmscClient {
    pub fn new(login: &str, password: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            login: login.to_string(),
            password: password.to_string(),
            base_url: "https://smsc.ru/sys/send.php".to_string(),
        })
    }
}

#[async_trait]
impl SmsGateway for SmscClient {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SmsError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("login", self.login.as_str()),
                ("psw", self.password.as_str()),
                ("phones", phone),
                ("mes", message),
                ("fmt", "3"),
            ])
            .send()
            .await
            .map_err(|e| SmsError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            error!(status = %response.status(), "smsc http error");
            return Err(SmsError::Gateway(format!(
                "http status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SmsError::Transport(e.to_string()))?;

        if let Some(err) = body.get("error") {
            error!(error = %err, "smsc rejected message");
            return Err(SmsError::Gateway(err.to_string()));
        }
        Ok(())
    }
}

/// Logs instead of sending; used when the provider is not configured.
pub struct ConsoleSms;

#[async_trait]
impl SmsGateway for ConsoleSms {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SmsError> {
        info!(%phone, %message, "sms mock");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_sender_always_succeeds() {
        let gw = ConsoleSms;
        assert!(gw.send("79123456789", "Код подтверждения: 1234").await.is_ok());
    }
}
