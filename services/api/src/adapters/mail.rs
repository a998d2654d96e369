//! services/api/src/adapters/mail.rs
//!
//! `MailService` implementations. The SMTP adapter delivers over a STARTTLS
//! relay; the console adapter logs messages instead of sending them, which is
//! the default for local development; the memory adapter records messages so
//! tests can assert on them.

use async_trait::async_trait;
use critique_core::ports::{MailService, PortError, PortResult};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Delivers mail through an SMTP relay using STARTTLS.
pub struct SmtpMailAdapter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailAdapter {
    pub fn new(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(port);
        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                password.to_string(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            from: from.parse::<Mailbox>()?,
        })
    }
}

#[async_trait]
impl MailService for SmtpMailAdapter {
    async fn send(&self, subject: &str, body: &str, to: &str) -> PortResult<()> {
        let recipient = to.parse::<Mailbox>().map_err(|e| {
            PortError::Unexpected(format!("Invalid recipient address '{}': {}", to, e))
        })?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| PortError::Unexpected(format!("Failed to build message: {}", e)))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| PortError::Unexpected(format!("SMTP delivery failed: {}", e)))?;
        Ok(())
    }
}

/// Logs outgoing mail instead of delivering it.
pub struct ConsoleMailAdapter;

#[async_trait]
impl MailService for ConsoleMailAdapter {
    async fn send(&self, subject: &str, body: &str, to: &str) -> PortResult<()> {
        info!("Mail to {} [{}]: {}", to, subject, body);
        Ok(())
    }
}

/// A delivered message as recorded by `MemoryMailAdapter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records outgoing mail in memory. `set_failing(true)` makes every send
/// fail, which lets tests exercise delivery-failure paths.
#[derive(Clone, Default)]
pub struct MemoryMailAdapter {
    sent: Arc<Mutex<Vec<SentMail>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryMailAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|mails| mails.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailService for MemoryMailAdapter {
    async fn send(&self, subject: &str, body: &str, to: &str) -> PortResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected(
                "simulated delivery failure".to_string(),
            ));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| PortError::Unexpected("mail log mutex poisoned".to_string()))?;
        sent.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_adapter_records_deliveries_in_order() {
        let mail = MemoryMailAdapter::new();
        mail.send("First", "body one", "a@example.com").await.unwrap();
        mail.send("Second", "body two", "b@example.com").await.unwrap();

        let sent = mail.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "First");
        assert_eq!(sent[1].to, "b@example.com");
    }

    #[tokio::test]
    async fn memory_adapter_can_simulate_failures() {
        let mail = MemoryMailAdapter::new();
        mail.set_failing(true);
        assert!(mail.send("Oops", "body", "a@example.com").await.is_err());
        assert!(mail.sent().is_empty());

        mail.set_failing(false);
        mail.send("Works", "body", "a@example.com").await.unwrap();
        assert_eq!(mail.sent().len(), 1);
    }
}
