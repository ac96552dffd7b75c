//! services/notifier/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RowStore` port from the `core` crate. It reads the SQLite tables
//! maintained by the CRUD apps using `sqlx` and never writes to them.

use async_trait::async_trait;
use compliance_core::domain::{ColumnInfo, FieldValue, Row};
use compliance_core::ports::{PortError, PortResult, RowStore};
use regex::Regex;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RowStore` port.
#[derive(Clone)]
pub struct SqliteRowStore {
    pool: SqlitePool,
}

impl SqliteRowStore {
    /// Creates a new `SqliteRowStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn checked_identifier(table: &str) -> PortResult<&str> {
    let pattern = IDENTIFIER
        .as_ref()
        .ok_or_else(|| PortError::Unexpected("identifier pattern failed to compile".to_string()))?;
    if pattern.is_match(table) {
        Ok(table)
    } else {
        Err(PortError::Unexpected(format!("'{}' is not a valid table name", table)))
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Row Decoding
//=========================================================================================

/// Decodes one column by its SQLite storage class. Blobs carry nothing useful
/// for deadlines and are read as null.
fn decode_value(row: &SqliteRow, index: usize) -> Result<FieldValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => FieldValue::Integer(row.try_get::<i64, _>(index)?),
        "REAL" => FieldValue::Real(row.try_get::<f64, _>(index)?),
        "TEXT" => FieldValue::Text(row.try_get::<String, _>(index)?),
        _ => FieldValue::Null,
    };
    Ok(value)
}

fn decode_row(table: &str, row: &SqliteRow) -> Result<Option<Row>, sqlx::Error> {
    let mut fields = HashMap::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        fields.insert(column.name().to_string(), decode_value(row, index)?);
    }
    match fields.get("id") {
        Some(FieldValue::Integer(id)) => Ok(Some(Row { id: *id, fields })),
        _ => {
            tracing::warn!(table = %table, "Row without an integer id; skipping it");
            Ok(None)
        }
    }
}

//=========================================================================================
// `RowStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn describe_table(&self, table: &str) -> PortResult<Vec<ColumnInfo>> {
        let table = checked_identifier(table)?;
        let records = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        if records.is_empty() {
            return Err(PortError::NotFound(format!("Table {} not found", table)));
        }

        records
            .iter()
            .map(|r| -> Result<ColumnInfo, sqlx::Error> {
                let name: String = r.try_get("name")?;
                let declared_type: String = r.try_get("type")?;
                Ok(ColumnInfo {
                    name,
                    declared_type,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(unexpected)
    }

    async fn fetch_rows(&self, table: &str) -> PortResult<Vec<Row>> {
        let table = checked_identifier(table)?;
        let records = sqlx::query(&format!("SELECT * FROM {} ORDER BY id ASC", table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Table {} not found", table))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;

        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(row) = decode_row(table, record).map_err(unexpected)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteRowStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE collaborateurs (
                id INTEGER PRIMARY KEY,
                nom VARCHAR NOT NULL,
                prenom VARCHAR,
                visite_med DATE,
                heures REAL,
                commentaire TEXT
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO collaborateurs (id, nom, prenom, visite_med, heures, commentaire) VALUES
                (1, 'Dupont', 'Jean', '2025-07-20', 7.5, NULL),
                (2, 'Martin', NULL, NULL, NULL, 'A PASSER')",
        )
        .execute(&pool)
        .await
        .unwrap();
        SqliteRowStore::new(pool)
    }

    #[tokio::test]
    async fn describes_columns_with_declared_types() {
        let store = store().await;
        let columns = store.describe_table("collaborateurs").await.unwrap();
        assert_eq!(columns.len(), 6);
        assert_eq!(columns[3], ColumnInfo::new("visite_med", "DATE"));
    }

    #[tokio::test]
    async fn fetches_rows_as_scalar_values() {
        let store = store().await;
        let rows = store.fetch_rows("collaborateurs").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].get("visite_med"), Some(&FieldValue::Text("2025-07-20".into())));
        assert_eq!(rows[0].get("heures"), Some(&FieldValue::Real(7.5)));
        assert_eq!(rows[0].get("commentaire"), Some(&FieldValue::Null));
        assert_eq!(rows[1].text("nom").as_deref(), Some("Martin"));
        assert_eq!(rows[1].get("visite_med"), Some(&FieldValue::Null));
    }

    #[tokio::test]
    async fn unknown_table_is_not_found() {
        let store = store().await;
        assert!(matches!(
            store.describe_table("vehicles").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_non_identifier_table_names() {
        let store = store().await;
        assert!(matches!(
            store.fetch_rows("collaborateurs; DROP TABLE collaborateurs").await,
            Err(PortError::Unexpected(_))
        ));
        assert_eq!(store.fetch_rows("collaborateurs").await.unwrap().len(), 2);
    }

    #[test]
    fn identifier_check() {
        assert!(IDENTIFIER.is_some());
        for table in ["collaborateurs", "vehicles_1", "_tmp"] {
            assert_eq!(checked_identifier(table).unwrap(), table);
        }
        for table in ["1table", "vehicles-1", "x y", ""] {
            assert!(checked_identifier(table).is_err(), "{table}");
        }
    }
}
