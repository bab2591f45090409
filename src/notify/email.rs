use super::Notifier;
use crate::config::SmtpSettings;
use crate::error::StockWatchError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};
use std::time::Duration;

const PASSWORD_SECRET: &str = "STOCKWATCH_SMTP_PASSWORD";

/// Sends each alert as a plain-text e-mail over SMTP with STARTTLS.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    settings: SmtpSettings,
    timeout: Duration,
}

impl EmailNotifier {
    pub fn new(settings: SmtpSettings, timeout: Duration) -> Self {
        Self { settings, timeout }
    }

    fn message(&self, subject: &str, body: &str) -> Result<Message, StockWatchError> {
        let from: Mailbox = self.settings.username.parse()?;
        let to: Mailbox = self.settings.recipient.parse()?;
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        Ok(message)
    }

    async fn deliver(&self, subject: &str, body: &str) -> Result<(), StockWatchError> {
        let password = self
            .settings
            .password
            .clone()
            .ok_or_else(|| StockWatchError::MissingSecret(PASSWORD_SECRET.to_string()))?;
        let message = self.message(subject, body)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)?
            .port(self.settings.port)
            .credentials(Credentials::new(self.settings.username.clone(), password))
            .timeout(Some(self.timeout))
            .build();
        mailer.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, subject: &str, body: &str) {
        match self.deliver(subject, body).await {
            Ok(()) => info!("Alert e-mailed to {}", self.settings.recipient),
            Err(StockWatchError::MissingSecret(name)) => {
                error!("Secret '{}' is not configured, alert '{}' not e-mailed", name, subject)
            }
            Err(e) => error!("Failed to e-mail alert '{}': {}", subject, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(password: Option<&str>) -> SmtpSettings {
        SmtpSettings {
            // Nothing listens on the discard port, so a connection attempt would fail.
            host: "127.0.0.1".to_string(),
            port: 9,
            username: "alerts@example.com".to_string(),
            password: password.map(str::to_string),
            recipient: "me@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_password_skips_delivery() {
        let _ = env_logger::builder().is_test(true).try_init();
        let notifier = EmailNotifier::new(settings(None), Duration::from_millis(200));

        let result = notifier.deliver("Sell alert - PETR4.SA", "body").await;

        assert!(matches!(result, Err(StockWatchError::MissingSecret(name)) if name == PASSWORD_SECRET));
        notifier.send("Sell alert - PETR4.SA", "body").await;
    }

    #[test]
    fn message_carries_subject_and_recipient() {
        let notifier = EmailNotifier::new(settings(Some("secret")), Duration::from_secs(1));

        let message = notifier
            .message(
                "Sell alert - PETR4.SA",
                "PETR4.SA rose to 31.00, above your sell target of 30.00.",
            )
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Sell alert - PETR4.SA"));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("From: alerts@example.com"));
    }

    #[test]
    fn invalid_sender_is_an_address_error() {
        let mut bad = settings(Some("secret"));
        bad.username = "not an address".to_string();
        let notifier = EmailNotifier::new(bad, Duration::from_secs(1));

        assert!(matches!(
            notifier.message("subject", "body"),
            Err(StockWatchError::AddressError(_))
        ));
    }
}
