use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{DeliveryError, MailTransport, OutboundMessage};

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    Tls,
    /// Plain connection upgraded with STARTTLS, usually port 587.
    #[default]
    Starttls,
    /// Unencrypted. Local relays only.
    None,
}

pub struct SmtpMailTransport {
    transport: Arc<SmtpTransport>,
    host: String,
}

impl SmtpMailTransport {
    pub fn new(
        host: &str,
        port: u16,
        security: SmtpSecurity,
        credentials: Option<(String, SecretString)>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let builder = match security {
            SmtpSecurity::Tls => SmtpTransport::relay(host)
                .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?,
            SmtpSecurity::Starttls => SmtpTransport::starttls_relay(host)
                .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?,
            SmtpSecurity::None => SmtpTransport::builder_dangerous(host),
        };

        let mut builder = builder.port(port).timeout(Some(timeout));
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(
                username,
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: Arc::new(builder.build()),
            host: host.to_string(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let email = message.to_mime()?;
        let transport = Arc::clone(&self.transport);

        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| DeliveryError::Transport(format!("SMTP task failed: {e}")))?
            .map_err(|e| DeliveryError::Transport(format!("SMTP send failed: {e}")))?;

        info!("Email sent to {} via {}", message.to, self.host);
        Ok(())
    }
}
