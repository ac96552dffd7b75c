//! crates/compliance_core/src/domain.rs
//!
//! Defines the pure, core data structures for the notification engine.
//! These structs are independent of any database, transport or renderer.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;

/// Forward-looking window, in days, inside which a deadline is "due".
pub const WINDOW_DAYS: i64 = 14;

/// An item due in this many days or fewer is urgent.
pub const URGENT_THRESHOLD_DAYS: i64 = 4;

/// Deadlines further ahead than this are rejected as implausible input.
pub const MAX_FUTURE_DAYS: i64 = 365 * 2;

//=========================================================================================
// Rows as exposed by the persistence collaborator
//=========================================================================================

/// A single scalar value read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// True for `Null` and for text that is empty once trimmed.
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the value for display, `None` when it is null.
    pub fn display(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) if s.trim().is_empty() => None,
            FieldValue::Text(s) => Some(s.trim().to_string()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Real(r) => Some(r.to_string()),
            FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

/// One record of a tracked subject (vehicle or person).
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: i64,
    pub fields: HashMap<String, FieldValue>,
}

impl Row {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: HashMap::new(),
        }
    }

    /// Builder-style setter, mostly useful in tests and fakes.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// A field's display text, `None` when absent or null.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(FieldValue::display)
    }
}

/// Column metadata of a table, as reported by the row store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

impl ColumnInfo {
    pub fn new(name: &str, declared_type: &str) -> Self {
        Self {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
        }
    }
}

//=========================================================================================
// Scan results
//=========================================================================================

/// A column whose value is a compliance deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedField {
    pub name: String,
    pub label: String,
    /// Companion column; when non-null the deadline is considered resolved.
    pub completion_field: Option<String>,
}

impl TrackedField {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            completion_field: None,
        }
    }

    pub fn completed_by(mut self, completion_field: &str) -> Self {
        self.completion_field = Some(completion_field.to_string());
        self
    }
}

/// Plain snapshot of an entity handed to the content renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub table: String,
    pub id: i64,
    /// Name-like fields in declaration order; `None` when the row has no value.
    pub display: Vec<(String, Option<String>)>,
    pub comment: Option<String>,
}

impl EntitySnapshot {
    /// Display values joined with spaces, falling back to `<table> #<id>`.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = self
            .display
            .iter()
            .filter_map(|(_, value)| value.as_deref())
            .collect();
        if parts.is_empty() {
            format!("{} #{}", self.table, self.id)
        } else {
            parts.join(" ")
        }
    }
}

/// A deadline that currently falls inside the notification window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationItem {
    pub field: String,
    pub label: String,
    pub due_date: NaiveDate,
    pub days_until: i64,
    pub comment: Option<String>,
    pub message: String,
}

impl NotificationItem {
    pub fn new(
        field: &TrackedField,
        due_date: NaiveDate,
        days_until: i64,
        comment: Option<String>,
    ) -> Self {
        Self {
            field: field.name.clone(),
            label: field.label.clone(),
            due_date,
            days_until,
            comment,
            message: format!("{} à renouveler dans {} jours", field.label, days_until),
        }
    }

    pub fn is_urgent(&self) -> bool {
        self.days_until <= URGENT_THRESHOLD_DAYS
    }
}

/// All due items of one entity in one scan pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationBatch {
    pub snapshot: EntitySnapshot,
    pub items: Vec<NotificationItem>,
}

impl NotificationBatch {
    pub fn has_urgent(&self) -> bool {
        self.items.iter().any(NotificationItem::is_urgent)
    }

    pub fn urgent_items(&self) -> Vec<NotificationItem> {
        self.items.iter().filter(|i| i.is_urgent()).cloned().collect()
    }
}

//=========================================================================================
// Outbound mail
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(days_until: i64) -> NotificationItem {
        let field = TrackedField::new("visite_med", "Visite médicale");
        let today = NaiveDate::from_ymd_opt(2025, 7, 10).unwrap();
        let due = today + chrono::Duration::days(days_until);
        NotificationItem::new(&field, due, days_until, None)
    }

    #[test]
    fn urgency_threshold_is_four_days() {
        assert!(item(0).is_urgent());
        assert!(item(4).is_urgent());
        assert!(!item(5).is_urgent());
    }

    #[test]
    fn item_message_mentions_label_and_days() {
        assert_eq!(item(10).message, "Visite médicale à renouveler dans 10 jours");
    }

    #[test]
    fn blank_text_counts_as_null() {
        assert!(FieldValue::Text("   ".into()).is_null());
        assert!(FieldValue::Null.is_null());
        assert!(!FieldValue::Text("x".into()).is_null());
        assert_eq!(FieldValue::Text("  Dupont ".into()).display().as_deref(), Some("Dupont"));
    }

    #[test]
    fn display_name_falls_back_to_table_and_id() {
        let snapshot = EntitySnapshot {
            table: "collaborateurs".into(),
            id: 7,
            display: vec![("nom".into(), None), ("prenom".into(), None)],
            comment: None,
        };
        assert_eq!(snapshot.display_name(), "collaborateurs #7");

        let named = EntitySnapshot {
            display: vec![
                ("nom".into(), Some("Dupont".into())),
                ("prenom".into(), Some("Jean".into())),
            ],
            ..snapshot
        };
        assert_eq!(named.display_name(), "Dupont Jean");
    }

    #[test]
    fn batch_urgent_subset_keeps_order() {
        let batch = NotificationBatch {
            snapshot: EntitySnapshot {
                table: "t".into(),
                id: 1,
                display: vec![],
                comment: None,
            },
            items: vec![item(9), item(2), item(4)],
        };
        assert!(batch.has_urgent());
        let urgent: Vec<i64> = batch.urgent_items().iter().map(|i| i.days_until).collect();
        assert_eq!(urgent, vec![2, 4]);
    }
}
