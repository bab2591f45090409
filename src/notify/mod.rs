mod email;
mod webhook;

pub use email::EmailNotifier;
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use log::warn;

/// Outbound alert channel. Delivery is fire-and-forget: implementations log
/// their own failures and never hand them back to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str);
}

/// Writes alerts to the log only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) {
        warn!("{}: {}", subject, body);
    }
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Box<N> {
    async fn send(&self, subject: &str, body: &str) {
        (**self).send(subject, body).await
    }
}

/// Fans an alert out to every channel in turn.
#[async_trait]
impl<N: Notifier> Notifier for Vec<N> {
    async fn send(&self, subject: &str, body: &str) {
        for notifier in self {
            notifier.send(subject, body).await;
        }
    }
}
