//! crates/compliance_core/src/pipeline.rs
//!
//! One scan-and-dispatch pass over every configured entity type.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregate::{aggregate, TableScan};
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::domain::{NotificationBatch, TrackedField};
use crate::ports::{PortResult, RowStore};
use crate::schema::{scan, EntityType};
use crate::window::EvaluationWindow;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Scanned {
        tracked_fields: usize,
        entities: usize,
        batches: usize,
        rejected_values: usize,
    },
    /// The table has no column that qualifies as a deadline.
    NoTrackedFields,
    /// Introspection or reading failed; the table was left out of this pass.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: String,
    #[serde(flatten)]
    pub status: TableStatus,
}

/// Everything one pass did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub today: NaiveDate,
    pub window_end: NaiveDate,
    pub tables: Vec<TableReport>,
    pub dispatch: DispatchReport,
}

impl PassReport {
    /// One human-readable line describing the pass.
    pub fn summary(&self) -> String {
        let skipped = self
            .tables
            .iter()
            .filter(|t| matches!(t.status, TableStatus::Skipped { .. }))
            .count();
        let entities: usize = self
            .tables
            .iter()
            .map(|t| match t.status {
                TableStatus::Scanned { entities, .. } => entities,
                _ => 0,
            })
            .sum();
        let d = &self.dispatch;
        let mut summary = format!(
            "Pass for {} (window until {}): {} table(s), {} skipped, {} entities scanned, \
             {} to notify, {} sent, {} logged, {} failed",
            self.today,
            self.window_end,
            self.tables.len(),
            skipped,
            entities,
            d.batches,
            d.sent,
            d.logged,
            d.failed
        );
        if d.dry_run {
            summary.push_str(" (dry run)");
        }
        if d.degraded {
            summary.push_str(" (mail server unavailable, notifications logged only)");
        }
        summary
    }
}

/// The generic notification pipeline, parameterized by entity type descriptors.
pub struct NotificationPipeline {
    store: Arc<dyn RowStore>,
    entity_types: Vec<EntityType>,
    dispatcher: Dispatcher,
}

impl NotificationPipeline {
    pub fn new(
        store: Arc<dyn RowStore>,
        entity_types: Vec<EntityType>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            store,
            entity_types,
            dispatcher,
        }
    }

    pub fn entity_types(&self) -> &[EntityType] {
        &self.entity_types
    }

    /// Resolves the tracked fields of one entity type and evaluates its rows.
    pub async fn scan_entity_type(
        &self,
        entity: &EntityType,
        window: &EvaluationWindow,
    ) -> PortResult<(Vec<TrackedField>, TableScan)> {
        let columns = self.store.describe_table(&entity.table).await?;
        let fields = scan(entity, &columns);
        if fields.is_empty() {
            return Ok((fields, TableScan::default()));
        }
        let rows = self.store.fetch_rows(&entity.table).await?;
        let table_scan = aggregate(entity, &fields, &rows, window);
        Ok((fields, table_scan))
    }

    /// Runs one full pass with `today` as the evaluation date.
    pub async fn run_pass(&self, today: NaiveDate) -> PassReport {
        let window = EvaluationWindow::new(today);
        info!(
            "Checking deadlines between {} and {}",
            window.today(),
            window.end()
        );

        let mut batches: Vec<NotificationBatch> = Vec::new();
        let mut tables = Vec::with_capacity(self.entity_types.len());

        for entity in &self.entity_types {
            let status = match self.scan_entity_type(entity, &window).await {
                Ok((fields, _)) if fields.is_empty() => {
                    info!(table = %entity.table, "No tracked date fields; skipping table");
                    TableStatus::NoTrackedFields
                }
                Ok((fields, table_scan)) => {
                    info!(
                        table = %entity.table,
                        entities = table_scan.entities_scanned,
                        due = table_scan.batches.len(),
                        "Table scanned"
                    );
                    let status = TableStatus::Scanned {
                        tracked_fields: fields.len(),
                        entities: table_scan.entities_scanned,
                        batches: table_scan.batches.len(),
                        rejected_values: table_scan.rejected_values,
                    };
                    batches.extend(table_scan.batches);
                    status
                }
                Err(e) => {
                    warn!(table = %entity.table, error = %e, "Cannot read table; skipping it");
                    TableStatus::Skipped {
                        reason: e.to_string(),
                    }
                }
            };
            tables.push(TableReport {
                table: entity.table.clone(),
                status,
            });
        }

        if batches.is_empty() {
            info!("No notifications needed for {}", today);
        } else {
            info!("Found {} entities requiring notifications", batches.len());
        }

        let dispatch = self.dispatcher.dispatch(&batches).await;
        PassReport {
            today,
            window_end: window.end(),
            tables,
            dispatch,
        }
    }
}
