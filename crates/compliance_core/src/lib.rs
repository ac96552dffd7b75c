pub mod aggregate;
pub mod dates;
pub mod dispatch;
pub mod domain;
pub mod pipeline;
pub mod ports;
pub mod schema;
pub mod window;

pub use dispatch::{DeliverySettings, DispatchReport, Dispatcher};
pub use domain::{
    ColumnInfo, EntitySnapshot, FieldValue, NotificationBatch, NotificationItem, OutgoingMail,
    RenderedEmail, Row, TrackedField,
};
pub use pipeline::{NotificationPipeline, PassReport, TableReport, TableStatus};
pub use ports::{ContentRenderer, MailSession, MailTransport, PortError, PortResult, RowStore};
pub use schema::{builtin_catalog, EntityType, FieldSelection};
pub use window::{EvaluationWindow, FieldState};
