//! crates/compliance_core/src/ports.rs
//!
//! Defines the collaborator contracts (traits) of the notification engine.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! engine independent of the database, the mail server and the e-mail writer.

use async_trait::async_trait;

use crate::domain::{ColumnInfo, EntitySnapshot, NotificationItem, OutgoingMail, RenderedEmail, Row};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    /// The mail server cannot be reached, refuses the TLS handshake, rejects
    /// the credentials or drops the connection.
    #[error("Mail transport unavailable: {0}")]
    Transport(String),
    /// One specific message could not be delivered.
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Rendering failed: {0}")]
    Render(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Collaborator Ports (Traits)
//=========================================================================================

/// Read-only access to the named tables of the persistence collaborator.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Column names and declared types of a table.
    async fn describe_table(&self, table: &str) -> PortResult<Vec<ColumnInfo>>;

    /// Every row of a table.
    async fn fetch_rows(&self, table: &str) -> PortResult<Vec<Row>>;
}

/// Produces the subject and body of a reminder e-mail.
#[async_trait]
pub trait ContentRenderer: Send + Sync {
    async fn render(
        &self,
        snapshot: &EntitySnapshot,
        items: &[NotificationItem],
    ) -> PortResult<RenderedEmail>;
}

/// Factory for mail sessions. Every pass opens, uses and closes its own session.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Connects and authenticates. Fails with `PortError::Transport` when the
    /// server is unreachable or refuses the credentials.
    async fn open_session(&self) -> PortResult<Box<dyn MailSession>>;
}

/// An open, authenticated connection to the mail server.
#[async_trait]
pub trait MailSession: Send {
    async fn send(&mut self, mail: &OutgoingMail) -> PortResult<()>;

    /// Releases the connection. Errors are not interesting at this point.
    async fn close(&mut self);
}
