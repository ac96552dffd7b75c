//! crates/compliance_core/src/aggregate.rs
//!
//! Groups due items per entity into notification batches.

use serde::Serialize;

use crate::domain::{EntitySnapshot, NotificationBatch, Row, TrackedField};
use crate::schema::EntityType;
use crate::window::{EvaluationWindow, FieldState};

/// What one table produced during a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableScan {
    pub entities_scanned: usize,
    /// Values skipped as unreadable or implausible.
    pub rejected_values: usize,
    pub batches: Vec<NotificationBatch>,
}

/// Builds the renderer-facing snapshot of a row.
pub fn snapshot(entity: &EntityType, row: &Row) -> EntitySnapshot {
    EntitySnapshot {
        table: entity.table.clone(),
        id: row.id,
        display: entity
            .display_fields
            .iter()
            .map(|name| (name.clone(), row.text(name)))
            .collect(),
        comment: entity.comment_field.as_deref().and_then(|name| row.text(name)),
    }
}

/// Evaluates every tracked field of every row. Items keep the order of
/// `fields`; entities without due items produce no batch.
pub fn aggregate(
    entity: &EntityType,
    fields: &[TrackedField],
    rows: &[Row],
    window: &EvaluationWindow,
) -> TableScan {
    let mut scan = TableScan {
        entities_scanned: rows.len(),
        ..TableScan::default()
    };

    for row in rows {
        let snapshot = snapshot(entity, row);
        let mut items = Vec::new();

        for field in fields {
            match window.evaluate(row, field, snapshot.comment.clone()) {
                FieldState::InWindow(item) => items.push(item),
                FieldState::TooFarFuture(date) => {
                    scan.rejected_values += 1;
                    tracing::warn!(
                        table = %entity.table,
                        entity_id = row.id,
                        field = %field.name,
                        %date,
                        "Date is more than two years ahead; treating it as invalid input"
                    );
                }
                FieldState::Unparseable(raw) => {
                    scan.rejected_values += 1;
                    tracing::warn!(
                        table = %entity.table,
                        entity_id = row.id,
                        field = %field.name,
                        raw = %raw,
                        "Unparseable date value"
                    );
                }
                FieldState::AlreadyCompleted(date) => {
                    tracing::debug!(
                        table = %entity.table,
                        entity_id = row.id,
                        field = %field.name,
                        %date,
                        "Deadline already completed"
                    );
                }
                FieldState::NoValue | FieldState::OutOfWindow(_) => {}
            }
        }

        if !items.is_empty() {
            scan.batches.push(NotificationBatch { snapshot, items });
        }
    }

    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin_catalog;
    use chrono::NaiveDate;

    fn collaborateurs() -> (EntityType, Vec<TrackedField>) {
        let entity = builtin_catalog().remove(0);
        let fields = vec![
            TrackedField::new("caces", "CACES"),
            TrackedField::new("visite_med", "Visite médicale"),
        ];
        (entity, fields)
    }

    fn window() -> EvaluationWindow {
        EvaluationWindow::new(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap())
    }

    #[test]
    fn dupont_scenario_yields_one_non_urgent_item() {
        let (entity, fields) = collaborateurs();
        let rows = vec![Row::new(1).with("nom", "Dupont").with("visite_med", "2025-07-20")];

        let scan = aggregate(&entity, &fields, &rows, &window());

        assert_eq!(scan.entities_scanned, 1);
        assert_eq!(scan.batches.len(), 1);
        let batch = &scan.batches[0];
        assert_eq!(batch.snapshot.id, 1);
        assert_eq!(batch.snapshot.display_name(), "Dupont");
        assert_eq!(batch.items.len(), 1);
        let item = &batch.items[0];
        assert_eq!(item.field, "visite_med");
        assert_eq!(item.due_date, NaiveDate::from_ymd_opt(2025, 7, 20).unwrap());
        assert_eq!(item.days_until, 10);
        assert!(!batch.has_urgent());
    }

    #[test]
    fn items_follow_field_order_not_date_order() {
        let (entity, fields) = collaborateurs();
        let rows = vec![Row::new(3)
            .with("nom", "Martin")
            .with("caces", "2025-07-22")
            .with("visite_med", "11/07/2025")
            .with("commentaire", "Relancer l'agence")];

        let scan = aggregate(&entity, &fields, &rows, &window());

        let batch = &scan.batches[0];
        let order: Vec<&str> = batch.items.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(order, vec!["caces", "visite_med"]);
        assert_eq!(batch.snapshot.comment.as_deref(), Some("Relancer l'agence"));
        assert!(batch.items.iter().all(|i| i.comment.as_deref() == Some("Relancer l'agence")));
    }

    #[test]
    fn entities_without_due_items_produce_no_batch() {
        let (entity, fields) = collaborateurs();
        let rows = vec![
            Row::new(1).with("nom", "A").with("caces", "2026-01-01"),
            Row::new(2).with("nom", "B"),
            Row::new(3).with("nom", "C").with("visite_med", "2031-01-01"),
            Row::new(4).with("nom", "D").with("visite_med", "demain"),
        ];

        let scan = aggregate(&entity, &fields, &rows, &window());

        assert_eq!(scan.entities_scanned, 4);
        assert!(scan.batches.is_empty());
        assert_eq!(scan.rejected_values, 2);
    }
}
