//! SMTP email delivery via STARTTLS.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

use super::{NotificationMessage, NotificationProvider, ProviderError};

/// Delivers to a single recipient over one SMTP connection pool.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: String,
}

impl SmtpProvider {
    /// Build a provider from the process SMTP configuration and a recipient address.
    pub fn new(config: &SmtpConfig, to: impl Into<String>) -> Result<Self, String> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| e.to_string())?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from: config.from.clone(),
            to: to.into(),
        })
    }
}

#[async_trait::async_trait]
impl NotificationProvider for SmtpProvider {
    async fn send(&self, message: &NotificationMessage) -> Result<(), ProviderError> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e: lettre::address::AddressError| {
                ProviderError::Permanent(format!("invalid from address: {e}"))
            })?)
            .to(self.to.parse().map_err(|e: lettre::address::AddressError| {
                ProviderError::Permanent(format!("invalid recipient address: {e}"))
            })?)
            .subject(&message.subject)
            .body(message.body.clone())
            .map_err(|e| ProviderError::Permanent(format!("could not build message: {e}")))?;

        self.transport.send(email).await.map_err(|e| {
            if e.is_permanent() {
                ProviderError::Permanent(e.to_string())
            } else {
                ProviderError::Transient(e.to_string())
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_host_is_rejected_at_construction() {
        let config = SmtpConfig {
            host: String::new(),
            port: 587,
            username: "user".into(),
            password: "pass".into(),
            from: "alerts@example.test".into(),
        };
        assert!(SmtpProvider::new(&config, "ops@example.test").is_err());
    }
}
