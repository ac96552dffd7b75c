//! crates/compliance_core/src/dispatch.rs
//!
//! The dispatch controller: renders each batch, delivers it to the primary
//! recipient, escalates urgent items to the secondary recipient and isolates
//! failures so that one entity never blocks the others.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{NotificationBatch, OutgoingMail};
use crate::ports::{ContentRenderer, MailSession, MailTransport, PortError, PortResult};

const BODY_PREVIEW_CHARS: usize = 200;
const URGENT_PREFIX: &str = "URGENT - ";

/// Who receives what, and whether anything is actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySettings {
    pub from: String,
    pub primary: String,
    /// Receives an extra "URGENT -" message with the urgent items only.
    pub secondary: Option<String>,
    pub dry_run: bool,
}

/// Outcome counters of one dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub batches: usize,
    pub sent: usize,
    /// Messages written to the log instead of being sent.
    pub logged: usize,
    /// Entities whose rendering or delivery failed.
    pub failed: usize,
    pub dry_run: bool,
    /// The mail server became unavailable and the run fell back to logging.
    pub degraded: bool,
}

enum Channel {
    Live(Box<dyn MailSession>),
    DryRun,
    Degraded,
}

/// Drives outbound delivery for the batches of one pass.
#[derive(Clone)]
pub struct Dispatcher {
    renderer: Arc<dyn ContentRenderer>,
    transport: Arc<dyn MailTransport>,
    settings: DeliverySettings,
}

impl Dispatcher {
    pub fn new(
        renderer: Arc<dyn ContentRenderer>,
        transport: Arc<dyn MailTransport>,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            renderer,
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Delivers every batch. Never fails: transport problems degrade to
    /// logging and per-entity problems are logged and skipped.
    pub async fn dispatch(&self, batches: &[NotificationBatch]) -> DispatchReport {
        let mut report = DispatchReport {
            batches: batches.len(),
            dry_run: self.settings.dry_run,
            ..DispatchReport::default()
        };
        if batches.is_empty() {
            return report;
        }

        let mut channel = self.open_channel(&mut report).await;

        for batch in batches {
            if let Err(e) = self.dispatch_batch(&mut channel, batch, &mut report).await {
                report.failed += 1;
                error!(
                    table = %batch.snapshot.table,
                    entity_id = batch.snapshot.id,
                    entity = %batch.snapshot.display_name(),
                    error = %e,
                    "Failed to notify entity; continuing with the next one"
                );
            }
        }

        if let Channel::Live(session) = &mut channel {
            session.close().await;
        }
        report
    }

    async fn open_channel(&self, report: &mut DispatchReport) -> Channel {
        if self.settings.dry_run {
            info!("Dry-run mode: notifications will be logged, not sent");
            return Channel::DryRun;
        }
        match self.transport.open_session().await {
            Ok(session) => {
                info!("Mail session opened");
                Channel::Live(session)
            }
            Err(e) => {
                report.degraded = true;
                log_transport_diagnostics(&e);
                warn!("Continuing without sending emails; notifications will be logged instead");
                Channel::Degraded
            }
        }
    }

    async fn dispatch_batch(
        &self,
        channel: &mut Channel,
        batch: &NotificationBatch,
        report: &mut DispatchReport,
    ) -> PortResult<()> {
        let rendered = self.renderer.render(&batch.snapshot, &batch.items).await?;
        let mail = OutgoingMail {
            from: self.settings.from.clone(),
            to: self.settings.primary.clone(),
            subject: rendered.subject,
            body: rendered.body,
        };
        self.deliver(channel, &mail, report).await?;

        let Some(secondary) = &self.settings.secondary else {
            return Ok(());
        };
        let urgent = batch.urgent_items();
        if urgent.is_empty() {
            return Ok(());
        }

        let rendered = self.renderer.render(&batch.snapshot, &urgent).await?;
        let mail = OutgoingMail {
            from: self.settings.from.clone(),
            to: secondary.clone(),
            subject: urgent_subject(&rendered.subject),
            body: rendered.body,
        };
        self.deliver(channel, &mail, report).await?;
        info!(
            recipient = %secondary,
            entity = %batch.snapshot.display_name(),
            urgent_items = urgent.len(),
            "Urgent escalation handled"
        );
        Ok(())
    }

    async fn deliver(
        &self,
        channel: &mut Channel,
        mail: &OutgoingMail,
        report: &mut DispatchReport,
    ) -> PortResult<()> {
        match channel {
            Channel::Live(session) => match session.send(mail).await {
                Ok(()) => {
                    report.sent += 1;
                    info!(recipient = %mail.to, subject = %mail.subject, "Notification email sent");
                    Ok(())
                }
                Err(PortError::Transport(reason)) => {
                    error!(
                        reason = %reason,
                        "Mail server connection lost; the rest of this run will only be logged"
                    );
                    session.close().await;
                    *channel = Channel::Degraded;
                    report.degraded = true;
                    log_unsent(mail, "WOULD SEND (mail server unavailable)");
                    report.logged += 1;
                    Ok(())
                }
                Err(e) => {
                    error!(
                        recipient = %mail.to,
                        subject = %mail.subject,
                        body = %preview(&mail.body),
                        error = %e,
                        "Failed to send notification email"
                    );
                    Err(e)
                }
            },
            Channel::DryRun => {
                log_unsent(mail, "DRY RUN: would send notification email");
                report.logged += 1;
                Ok(())
            }
            Channel::Degraded => {
                log_unsent(mail, "WOULD SEND (mail server unavailable)");
                report.logged += 1;
                Ok(())
            }
        }
    }
}

/// Marks the escalation subject without stacking the prefix.
fn urgent_subject(subject: &str) -> String {
    if subject.starts_with(URGENT_PREFIX) {
        subject.to_string()
    } else {
        format!("{URGENT_PREFIX}{subject}")
    }
}

fn log_unsent(mail: &OutgoingMail, what: &str) {
    info!(
        recipient = %mail.to,
        subject = %mail.subject,
        body = %preview(&mail.body),
        "{what}"
    );
}

fn log_transport_diagnostics(error: &PortError) {
    error!(error = %error, "Cannot open a session with the mail server");
    let reason = error.to_string().to_lowercase();
    if reason.contains("auth") || reason.contains("credential") {
        error!("Troubleshooting: verify SENDER_EMAIL and SENDER_PASSWORD in the .env file");
        error!(
            "Troubleshooting: with Gmail, enable 2-factor authentication and use an app password"
        );
        error!("Troubleshooting: check that the account allows SMTP access");
    } else {
        error!(
            "Troubleshooting: check SMTP_SERVER and SMTP_PORT (465 = implicit TLS, 587 = STARTTLS)"
        );
        error!("Troubleshooting: check that this host can reach the mail server (firewall, DNS)");
    }
}

fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(BODY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
