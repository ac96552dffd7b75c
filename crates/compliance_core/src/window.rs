//! crates/compliance_core/src/window.rs
//!
//! The window evaluator: decides, for one (entity, tracked field) pair,
//! whether a reminder is due on the evaluation date.

use chrono::{Duration, NaiveDate};

use crate::dates;
use crate::domain::{FieldValue, NotificationItem, Row, TrackedField, MAX_FUTURE_DAYS, WINDOW_DAYS};

/// Terminal state of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState {
    /// No value, or a "not applicable" placeholder.
    NoValue,
    /// A value is present but is not a readable date.
    Unparseable(String),
    /// Implausibly far ahead; a data-quality problem, not a future reminder.
    TooFarFuture(NaiveDate),
    /// The paired completion field is set.
    AlreadyCompleted(NaiveDate),
    InWindow(NotificationItem),
    OutOfWindow(NaiveDate),
}

/// The inclusive `[today, today + 14 days]` window of one scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationWindow {
    today: NaiveDate,
}

impl EvaluationWindow {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn end(&self) -> NaiveDate {
        self.today + Duration::days(WINDOW_DAYS)
    }

    /// Latest date accepted as plausible input.
    pub fn plausibility_limit(&self) -> NaiveDate {
        self.today + Duration::days(MAX_FUTURE_DAYS)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.today <= date && date <= self.end()
    }

    /// Evaluates one tracked field of one row. `comment` is the snapshot of
    /// the entity's free-text comment copied into an emitted item.
    pub fn evaluate(&self, row: &Row, field: &TrackedField, comment: Option<String>) -> FieldState {
        let raw = row.get(&field.name).unwrap_or(&FieldValue::Null);
        if raw.is_null() {
            return FieldState::NoValue;
        }
        let Some(due_date) = dates::parse(raw) else {
            return match raw {
                FieldValue::Text(s) if dates::is_placeholder(s) => FieldState::NoValue,
                other => FieldState::Unparseable(other.display().unwrap_or_default()),
            };
        };

        if due_date > self.plausibility_limit() {
            return FieldState::TooFarFuture(due_date);
        }

        let completed = field
            .completion_field
            .as_deref()
            .and_then(|name| row.get(name))
            .is_some_and(|value| !value.is_null());
        if completed {
            return FieldState::AlreadyCompleted(due_date);
        }

        if self.contains(due_date) {
            let days_until = (due_date - self.today).num_days();
            FieldState::InWindow(NotificationItem::new(field, due_date, days_until, comment))
        } else {
            FieldState::OutOfWindow(due_date)
        }
    }
}
