//! Table listing and row extraction

use railyard_common::models::Row;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, SqlitePool, TypeInfo, ValueRef};

use crate::error::{MigrateError, Result};

/// Table metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// Number of rows in table
    pub row_count: i64,
}

/// Names of all user tables, alphabetical, excluding SQLite internal tables
pub async fn table_names(pool: &SqlitePool) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        r#"
        SELECT name
        FROM sqlite_master
        WHERE type = 'table'
          AND name NOT LIKE 'sqlite_%'
        ORDER BY name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(names)
}

/// List all tables with row counts
pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<TableInfo>> {
    let mut table_infos = Vec::new();

    for table_name in table_names(pool).await? {
        let row_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM \"{}\"",
            table_name.replace('"', "\"\"")
        ))
        .fetch_one(pool)
        .await?;

        table_infos.push(TableInfo {
            name: table_name,
            row_count,
        });
    }

    Ok(table_infos)
}

pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Read every row of `table` as a column-name → JSON map, in primary key order
pub async fn fetch_rows(pool: &SqlitePool, table: &str) -> Result<Vec<Row>> {
    if !is_valid_table_name(table) {
        return Err(MigrateError::Snapshot(format!("Invalid table name: {}", table)));
    }

    let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY rowid", table))
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            let mut map = Row::new();
            for (i, column) in row.columns().iter().enumerate() {
                map.insert(column.name().to_string(), column_value(row, i)?);
            }
            Ok(map)
        })
        .collect()
}

/// Convert one SQLite value to JSON by its storage class
fn column_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => json!(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => json!(row.try_get_unchecked::<f64, _>(index)?),
        "TEXT" => Value::String(row.try_get_unchecked::<String, _>(index)?),
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        // Try common types
        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .or_else(|_| row.try_get::<i64, _>(index).map(|v| json!(v)))
            .or_else(|_| row.try_get::<f64, _>(index).map(|v| json!(v)))
            .unwrap_or(Value::Null),
    };
    Ok(value)
}

/// Validate table name to prevent SQL injection
fn is_valid_table_name(name: &str) -> bool {
    // Only allow alphanumeric and underscore
    name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !name.is_empty()
        && name.len() < 100
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scratch_db() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("snapshot.db");
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
            .await
            .unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_rows_keep_sqlite_storage_types() {
        let (_dir, pool) = scratch_db().await;
        sqlx::query(
            "CREATE TABLE car_classes (id INTEGER PRIMARY KEY, code TEXT, is_locomotive BOOLEAN, ratio REAL, notes TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO car_classes VALUES (7, 'K4s', 1, 0.5, NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let rows = fetch_rows(&pool, "car_classes").await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(7));
        assert_eq!(rows[0]["code"], json!("K4s"));
        assert_eq!(rows[0]["is_locomotive"], json!(1));
        assert_eq!(rows[0]["ratio"], json!(0.5));
        assert_eq!(rows[0]["notes"], Value::Null);
    }

    #[tokio::test]
    async fn test_table_exists_and_listing() {
        let (_dir, pool) = scratch_db().await;
        sqlx::query("CREATE TABLE railroads (id INTEGER PRIMARY KEY, name TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO railroads (name) VALUES ('Reading'), ('Lehigh Valley')")
            .execute(&pool)
            .await
            .unwrap();

        assert!(table_exists(&pool, "railroads").await.unwrap());
        assert!(!table_exists(&pool, "cars").await.unwrap());

        let tables = list_tables(&pool).await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "railroads");
        assert_eq!(tables[0].row_count, 2);
    }

    #[tokio::test]
    async fn test_rejects_suspicious_table_name() {
        let (_dir, pool) = scratch_db().await;
        let err = fetch_rows(&pool, "cars; DROP TABLE cars").await.unwrap_err();
        assert!(matches!(err, MigrateError::Snapshot(_)));
    }

    #[tokio::test]
    async fn test_table_with_quote_in_name() {
        let (_dir, pool) = scratch_db().await;
        sqlx::query("CREATE TABLE \"odd\"\"name\" (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(table_names(&pool).await.unwrap(), vec!["odd\"name".to_string()]);
        let tables = list_tables(&pool).await.unwrap();
        assert_eq!(tables[0].row_count, 0);
    }
}
