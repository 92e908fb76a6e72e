// Outbound mail collaborator
// Delivery is detached from the request: callers hand a message over and move on.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> AppResult<()>;

    /// Address that receives site notifications.
    fn notification_address(&self) -> Option<&str>;
}

/// Spawn delivery in the background. Failures are logged, never surfaced.
pub fn send_detached(mailer: Arc<dyn Mailer>, message: MailMessage) {
    tokio::spawn(async move {
        let subject = message.subject.clone();
        if let Err(e) = mailer.send(message).await {
            warn!(subject = %subject, "Mail delivery failed: {}", e);
        }
    });
}

/// Mailer that records the envelope in the log instead of speaking SMTP.
pub struct LogMailer {
    settings: Option<MailConfig>,
}

impl LogMailer {
    pub fn new(settings: Option<MailConfig>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> AppResult<()> {
        match &self.settings {
            Some(settings) => {
                info!(
                    from = %settings.sender,
                    to = %message.to,
                    reply_to = ?message.reply_to,
                    host = %settings.host,
                    port = settings.port,
                    subject = %message.subject,
                    "Mail dispatched"
                );
            }
            None => {
                debug!(to = %message.to, subject = %message.subject, "Mail disabled, message dropped");
            }
        }
        Ok(())
    }

    fn notification_address(&self) -> Option<&str> {
        self.settings.as_ref().map(|s| s.receiver.as_str())
    }
}
