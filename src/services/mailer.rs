use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::core::config::Settings;
use crate::core::security::fingerprint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MailMessage {
    pub(crate) to: String,
    pub(crate) subject: String,
    pub(crate) text: String,
}

/// Outbound email. Callers treat every send as best-effort.
#[async_trait]
pub(crate) trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<()>;
}

pub(crate) fn from_settings(settings: &Settings) -> Result<Arc<dyn Mailer>> {
    if settings.mail().api_key.is_empty() {
        tracing::warn!("MAIL_API_KEY not configured; emails will only be logged");
        return Ok(Arc::new(LogMailer));
    }
    Ok(Arc::new(HttpMailer::from_settings(settings)?))
}

#[derive(Debug, Clone)]
pub(crate) struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.mail().timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: settings.mail().api_url.clone(),
            api_key: settings.mail().api_key.clone(),
            from: settings.mail().from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        let payload = json!({
            "from": self.from,
            "to": [message.to],
            "subject": message.subject,
            "text": message.text,
        });

        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call mail API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mail API error {status}: {body}");
        }

        tracing::debug!(recipient = %fingerprint(&message.to), "Email accepted by provider");
        Ok(())
    }
}

/// Used when no provider key is configured.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        tracing::info!(
            recipient = %fingerprint(&message.to),
            subject = %message.subject,
            "Email delivery disabled; message logged only"
        );
        Ok(())
    }
}

/// Runs a send and logs the failure instead of returning it.
pub(crate) async fn send_best_effort(mailer: &dyn Mailer, message: MailMessage, kind: &str) {
    let recipient = fingerprint(&message.to);
    if let Err(err) = mailer.send(message).await {
        tracing::warn!(error = %err, recipient = %recipient, kind, "Failed to send email");
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::{MailMessage, Mailer};

    /// Keeps every message in memory. Addresses listed in `failing` are rejected.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingMailer {
        sent: Mutex<Vec<MailMessage>>,
        failing: Mutex<Vec<String>>,
    }

    impl RecordingMailer {
        pub(crate) fn sent(&self) -> Vec<MailMessage> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }

        pub(crate) fn sent_to(&self, address: &str) -> usize {
            self.sent().iter().filter(|message| message.to == address).count()
        }

        pub(crate) fn fail_for(&self, address: &str) {
            if let Ok(mut failing) = self.failing.lock() {
                failing.push(address.to_string());
            }
        }

        pub(crate) fn recover(&self) {
            if let Ok(mut failing) = self.failing.lock() {
                failing.clear();
            }
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: MailMessage) -> Result<()> {
            let rejected =
                self.failing.lock().map(|failing| failing.contains(&message.to)).unwrap_or(false);
            if rejected {
                anyhow::bail!("recipient {} rejected", message.to);
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(message);
            }
            Ok(())
        }
    }
}
