//! Notification delivery adapters: an HTTP relay client for real mail and a
//! log-only mailer for development and tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::account::errors::DispatchError;
use crate::domain::account::notifications::EmailMessage;
use crate::domain::account::ports::NotificationDispatcher;

/// Mailer that writes messages to the log instead of delivering them.
///
/// Used in `log` mail mode so the service runs without a relay; the
/// verification and reset links land in the log output.
#[derive(Debug, Clone, Default)]
pub struct TracingMailer;

#[async_trait]
impl NotificationDispatcher for TracingMailer {
    async fn connect(&self) -> Result<(), DispatchError> {
        tracing::debug!("Log mailer ready, messages will not leave the process");
        Ok(())
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), DispatchError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.html_body,
            "Mail (log mode)"
        );
        Ok(())
    }
}

/// Request body the mail relay expects.
#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Mailer that posts rendered messages to an HTTP mail relay.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    from: String,
}

impl HttpMailer {
    /// Create a relay client for the given endpoint.
    ///
    /// # Arguments
    /// * `api_url` - Relay endpoint accepting POSTed messages
    /// * `from` - Sender address stamped on every message
    pub fn new(api_url: String, from: String) -> Result<Self, anyhow::Error> {
        tracing::info!("Initializing HTTP mailer: api_url={}", api_url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_url,
            from,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for HttpMailer {
    async fn connect(&self) -> Result<(), DispatchError> {
        // Any HTTP response proves the relay is reachable; only transport
        // failures count as a broken connection.
        self.client
            .get(&self.api_url)
            .send()
            .await
            .map_err(|e| DispatchError::ConnectionFailed(e.to_string()))?;

        tracing::debug!("Mail relay reachable at {}", self.api_url);
        Ok(())
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), DispatchError> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html_body,
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DispatchError::SendFailed(format!(
                "relay answered {}",
                response.status()
            )));
        }

        tracing::debug!(to = %message.to, subject = %message.subject, "Mail delivered");
        Ok(())
    }
}
