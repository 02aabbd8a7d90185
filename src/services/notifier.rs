//! Best-effort delivery of redemption outcomes to operators.
//!
//! Delivery runs on its own task after the outcome is committed. A failed
//! send is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::messages::notification_text;
use super::redemption::RedemptionReport;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notifier rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;
}

/// Upper bound for one `sendMessage` call, so a stalled Bot API cannot keep
/// dispatch tasks alive indefinitely.
const TELEGRAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends messages through the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(
        api_url: impl Into<String>,
        bot_token: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        Self::with_timeout(api_url, bot_token, TELEGRAM_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        api_url: impl Into<String>,
        bot_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(&SendMessage {
                chat_id: recipient,
                text: message,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Writes messages to the log. Used when no bot token is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        info!(recipient = %recipient, message = %message, "Notification");
        Ok(())
    }
}

/// Fans a redemption report out to every configured recipient without
/// blocking the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Option<Arc<dyn Notifier>>,
    recipients: Arc<[String]>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, recipients: Vec<String>) -> Self {
        Self {
            notifier: Some(notifier),
            recipients: recipients.into(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            notifier: None,
            recipients: Arc::from(Vec::new()),
        }
    }

    pub fn dispatch(&self, report: &RedemptionReport) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        if self.recipients.is_empty() {
            return;
        }

        let recipients = Arc::clone(&self.recipients);
        let ticket_id = report.ticket_id;
        let message = notification_text(report);

        tokio::spawn(async move {
            for recipient in recipients.iter() {
                if let Err(e) = notifier.notify(recipient, &message).await {
                    warn!(
                        error = %e,
                        recipient = %recipient,
                        ticket_id = %ticket_id,
                        "Failed to deliver redemption notification"
                    );
                }
            }
        });
    }
}
