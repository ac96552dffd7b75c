//! services/notifier/src/adapters/mailer.rs
//!
//! This module contains the SMTP adapter. It implements the `MailTransport`
//! port with `lettre`, using implicit TLS on port 465 and STARTTLS otherwise.

use async_trait::async_trait;
use compliance_core::domain::OutgoingMail;
use compliance_core::ports::{MailSession, MailTransport, PortError, PortResult};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use crate::config::SmtpConfig;

type TokioSmtpTransport = AsyncSmtpTransport<Tokio1Executor>;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `MailTransport` over SMTP.
#[derive(Clone)]
pub struct SmtpMailTransport {
    config: SmtpConfig,
}

impl SmtpMailTransport {
    /// Creates a new `SmtpMailTransport`.
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn mode(&self) -> &'static str {
        if self.config.implicit_tls() {
            "SSL"
        } else {
            "STARTTLS"
        }
    }

    fn build(&self) -> Result<TokioSmtpTransport, lettre::transport::smtp::Error> {
        let builder = if self.config.implicit_tls() {
            TokioSmtpTransport::relay(&self.config.server)?
        } else {
            TokioSmtpTransport::starttls_relay(&self.config.server)?
        };
        let credentials =
            Credentials::new(self.config.username.clone(), self.config.password.clone());
        Ok(builder
            .port(self.config.port)
            .credentials(credentials)
            .timeout(Some(self.config.timeout))
            .build())
    }
}

/// Builds the MIME message. Address problems are delivery errors: they
/// concern this message only.
pub fn build_message(mail: &OutgoingMail) -> PortResult<Message> {
    let from = mail
        .from
        .parse::<Mailbox>()
        .map_err(|e| PortError::Delivery(format!("Invalid from '{}': {}", mail.from, e)))?;
    let to = mail
        .to
        .parse::<Mailbox>()
        .map_err(|e| PortError::Delivery(format!("Invalid to '{}': {}", mail.to, e)))?;
    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|e| PortError::Delivery(format!("Build email: {}", e)))
}

//=========================================================================================
// `MailTransport` Trait Implementation
//=========================================================================================

#[async_trait]
impl MailTransport for SmtpMailTransport {
    /// Connects, upgrades to TLS and authenticates, all within the configured timeout.
    async fn open_session(&self) -> PortResult<Box<dyn MailSession>> {
        info!(
            "Connecting to SMTP server {}:{} using {}...",
            self.config.server,
            self.config.port,
            self.mode()
        );
        let transport = self
            .build()
            .map_err(|e| PortError::Transport(format!("SMTP relay: {}", e)))?;

        match tokio::time::timeout(self.config.timeout, transport.test_connection()).await {
            Ok(Ok(true)) => {
                info!("SMTP login successful");
                Ok(Box::new(SmtpSession {
                    transport: Some(transport),
                }))
            }
            Ok(Ok(false)) => Err(PortError::Transport(
                "the server did not answer the connection check".to_string(),
            )),
            Ok(Err(e)) if e.is_permanent() => Err(PortError::Transport(format!(
                "authentication rejected by the server: {}",
                e
            ))),
            Ok(Err(e)) => Err(PortError::Transport(format!("SMTP connection failed: {}", e))),
            Err(_) => Err(PortError::Transport(format!(
                "no answer from {}:{} within {}s",
                self.config.server,
                self.config.port,
                self.config.timeout.as_secs()
            ))),
        }
    }
}

/// One authenticated SMTP session; closed by dropping the transport.
struct SmtpSession {
    transport: Option<TokioSmtpTransport>,
}

#[async_trait]
impl MailSession for SmtpSession {
    async fn send(&mut self, mail: &OutgoingMail) -> PortResult<()> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| PortError::Transport("SMTP session already closed".to_string()))?;
        let message = build_message(mail)?;

        transport.send(message).await.map(|_| ()).map_err(|e| {
            // A reply code from the server concerns this message; anything
            // else means the connection itself is gone.
            if e.is_permanent() || e.is_transient() {
                PortError::Delivery(format!("SMTP send: {}", e))
            } else {
                PortError::Transport(format!("SMTP send: {}", e))
            }
        })
    }

    async fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("SMTP session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            from: "alertes@example.com".into(),
            to: to.into(),
            subject: "URGENT - Rappel - Dupont".into(),
            body: "Bonjour,\nVisite médicale à renouveler dans 2 jours".into(),
        }
    }

    #[test]
    fn builds_a_plain_text_message() {
        let message = build_message(&mail("rh@example.com")).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("To: rh@example.com"));
        assert!(formatted.contains("Content-Type: text/plain"));
    }

    #[test]
    fn invalid_recipient_is_a_delivery_error() {
        assert!(matches!(
            build_message(&mail("pas une adresse")),
            Err(PortError::Delivery(_))
        ));
    }

    #[test]
    fn port_selects_tls_mode() {
        let config = |port| SmtpConfig {
            server: "smtp.example.com".into(),
            port,
            username: "alertes@example.com".into(),
            password: "secret".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(SmtpMailTransport::new(config(465)).mode(), "SSL");
        assert_eq!(SmtpMailTransport::new(config(587)).mode(), "STARTTLS");
    }
}
