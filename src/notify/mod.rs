//! Operator notification.
//!
//! The core composes subjects, bodies, and attachments; whether a send
//! ultimately lands is opaque and retrying is the transport's caller's
//! problem, not this module's. `EmailNotifier` rides SMTP via `lettre`;
//! `LogNotifier` stands in when mail is not configured.

use crate::config::EmailConfig;
use crate::models::{Direction, TradeAlert};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("message build failed: {0}")]
    Message(String),
    #[error("smtp transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_report(
        &self,
        subject: &str,
        body: &str,
        attachments: &[PathBuf],
    ) -> Result<(), NotifyError>;

    async fn send_alerts(&self, alerts: &[TradeAlert]) -> Result<(), NotifyError>;
}

/// SMTP notifier with STARTTLS and plain-text bodies plus file attachments.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, NotifyError> {
        let relay = SmtpTransport::starttls_relay(&self.config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(relay
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.sender.clone(),
                self.config.password.clone(),
            ))
            .build())
    }

    fn build_message(
        &self,
        subject: &str,
        body: &str,
        attachments: &[PathBuf],
    ) -> Result<Message, NotifyError> {
        let from = self
            .config
            .sender
            .parse()
            .map_err(|e| NotifyError::Message(format!("bad sender address: {e}")))?;
        let to = self
            .config
            .recipient
            .parse()
            .map_err(|e| NotifyError::Message(format!("bad recipient address: {e}")))?;

        let mut multipart = MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string()),
        );

        for path in attachments {
            if !path.exists() {
                warn!(path = %path.display(), "attachment missing, skipping {}", path.display());
                continue;
            }
            let bytes = std::fs::read(path)
                .map_err(|e| NotifyError::Message(format!("cannot read attachment: {e}")))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            multipart = multipart.singlepart(
                Attachment::new(filename).body(bytes, ContentType::TEXT_PLAIN),
            );
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(multipart)
            .map_err(|e| NotifyError::Message(e.to_string()))
    }

    async fn send(&self, message: Message) -> Result<(), NotifyError> {
        let transport = self.transport()?;
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| NotifyError::Transport(format!("send task failed: {e}")))?
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }

    /// SMTP connectivity probe backing the CLI's test-email mode.
    pub fn test_connection(&self) -> Result<(), NotifyError> {
        let transport = self.transport()?;
        match transport.test_connection() {
            Ok(true) => Ok(()),
            Ok(false) => Err(NotifyError::Transport("connection test failed".to_string())),
            Err(e) => Err(NotifyError::Transport(e.to_string())),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_report(
        &self,
        subject: &str,
        body: &str,
        attachments: &[PathBuf],
    ) -> Result<(), NotifyError> {
        let message = self.build_message(subject, body, attachments)?;
        self.send(message).await?;
        info!(subject = %subject, "report mail sent");
        Ok(())
    }

    async fn send_alerts(&self, alerts: &[TradeAlert]) -> Result<(), NotifyError> {
        if alerts.is_empty() {
            return Ok(());
        }
        let (subject, body) = compose_alert_email(alerts);
        let message = self.build_message(&subject, &body, &[])?;
        self.send(message).await?;
        info!(alerts = alerts.len(), "alert mail sent");
        Ok(())
    }
}

/// Fallback notifier that only logs. Keeps unattended runs alive when mail
/// is not configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_report(
        &self,
        subject: &str,
        _body: &str,
        attachments: &[PathBuf],
    ) -> Result<(), NotifyError> {
        info!(
            subject = %subject,
            attachments = attachments.len(),
            "mail disabled, report not sent: {}",
            subject
        );
        Ok(())
    }

    async fn send_alerts(&self, alerts: &[TradeAlert]) -> Result<(), NotifyError> {
        info!(alerts = alerts.len(), "mail disabled, {} alert(s) not sent", alerts.len());
        Ok(())
    }
}

/// Compose the buy/sell alert mail the way operators read it: buys first,
/// then sells, one block per instrument.
pub fn compose_alert_email(alerts: &[TradeAlert]) -> (String, String) {
    let buys: Vec<&TradeAlert> = alerts.iter().filter(|a| a.side == Direction::Buy).collect();
    let sells: Vec<&TradeAlert> = alerts.iter().filter(|a| a.side == Direction::Sell).collect();

    let mut lines = Vec::new();
    lines.push("=".repeat(50));
    lines.push("  Intraday trade alerts".to_string());
    lines.push("=".repeat(50));
    lines.push(String::new());

    let mut push_section = |title: &str, entries: &[&TradeAlert]| {
        if entries.is_empty() {
            return;
        }
        lines.push(format!("[{title}]"));
        lines.push("-".repeat(40));
        for alert in entries {
            lines.push(format!("  {} {}", alert.instrument_id, alert.display_name));
            lines.push(format!("  price: {}", alert.price));
            lines.push(format!("  reason: {}", alert.reason));
            lines.push(format!(
                "  suggested quantity: {} shares ({})",
                alert.suggested_quantity, alert.quantity_note
            ));
            lines.push(String::new());
        }
    };
    push_section("Buy signals", &buys);
    push_section("Sell signals", &sells);

    lines.push("=".repeat(50));
    lines.push("Automated alert for reference only; not investment advice.".to_string());

    let subject = format!("[Trade alert] buy {} / sell {}", buys.len(), sells.len());
    (subject, lines.join("\n"))
}
