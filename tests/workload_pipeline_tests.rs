use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use qforge::db::{CatalogSource, ColumnRow, ForeignKeyRow, IndexRow};
use qforge::errors::{AnalysisError, DbError};
use qforge::generator::{Dialect, GeneratedQuery};
use qforge::lifecycle::{run_generation, CancellationFlag};
use qforge::models::params::GenerationParameters;
use qforge::models::request::{GenerationRequest, RunStatus};
use qforge::{CatalogSnapshot, SchemaRegistry};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MemoryTable {
    columns: Vec<(&'static str, &'static str)>,
    primary_key: Vec<&'static str>,
    foreign_keys: Vec<(&'static str, &'static str, &'static str)>,
    indexes: Vec<(&'static str, &'static str, bool)>,
}

/// Catalog served from memory. `offline` makes every call fail like a
/// dropped connection; `pool_closed` lets the table listing succeed and
/// fails every per-table call afterwards.
#[derive(Default)]
struct MemoryCatalog {
    tables: Mutex<BTreeMap<&'static str, MemoryTable>>,
    offline: Mutex<bool>,
    pool_closed: Mutex<bool>,
}

impl MemoryCatalog {
    fn shop() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(
            "users",
            MemoryTable {
                columns: vec![("id", "integer"), ("name", "character varying"), ("joined", "date")],
                primary_key: vec!["id"],
                indexes: vec![("users_name_key", "name", true)],
                ..Default::default()
            },
        );
        tables.insert(
            "orders",
            MemoryTable {
                columns: vec![("id", "integer"), ("user_id", "integer"), ("total", "numeric")],
                primary_key: vec!["id"],
                foreign_keys: vec![("user_id", "users", "id")],
                indexes: vec![("orders_user_id_idx", "user_id", false)],
            },
        );
        Self {
            tables: Mutex::new(tables),
            ..Default::default()
        }
    }

    async fn table(&self, name: &str) -> Result<MemoryTable, DbError> {
        if *self.offline.lock().await {
            return Err(DbError::Connection("connection reset".to_string()));
        }
        if *self.pool_closed.lock().await {
            return Err(DbError::Sqlx(sqlx::Error::PoolClosed));
        }
        self.tables
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::General(format!("no table {}", name)))
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    fn namespace(&self) -> String {
        "public".to_string()
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        if *self.offline.lock().await {
            return Err(DbError::Connection("connection reset".to_string()));
        }
        Ok(self.tables.lock().await.keys().map(|k| k.to_string()).collect())
    }

    async fn table_columns(&self, table_name: &str) -> Result<Vec<ColumnRow>, DbError> {
        let table = self.table(table_name).await?;
        Ok(table
            .columns
            .iter()
            .enumerate()
            .map(|(i, (name, data_type))| ColumnRow {
                name: name.to_string(),
                data_type: data_type.to_string(),
                is_nullable: *name != "id",
                ordinal_position: i as i64 + 1,
                max_length: None,
                is_auto_increment: *name == "id",
            })
            .collect())
    }

    async fn primary_key(&self, table_name: &str) -> Result<Vec<String>, DbError> {
        let table = self.table(table_name).await?;
        Ok(table.primary_key.iter().map(|c| c.to_string()).collect())
    }

    async fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyRow>, DbError> {
        let table = self.table(table_name).await?;
        Ok(table
            .foreign_keys
            .iter()
            .map(|(column, ref_table, ref_column)| ForeignKeyRow {
                column: column.to_string(),
                referenced_table: ref_table.to_string(),
                referenced_column: ref_column.to_string(),
            })
            .collect())
    }

    async fn indexes(&self, table_name: &str) -> Result<Vec<IndexRow>, DbError> {
        let table = self.table(table_name).await?;
        Ok(table
            .indexes
            .iter()
            .map(|(name, column, is_unique)| IndexRow {
                name: name.to_string(),
                column: column.to_string(),
                is_unique: *is_unique,
            })
            .collect())
    }

    async fn row_estimate(&self, _table_name: &str) -> Result<Option<i64>, DbError> {
        Ok(Some(1_000))
    }
}

fn run(snapshot: &CatalogSnapshot, params: GenerationParameters, dialect: Dialect) -> Vec<String> {
    let mut request = GenerationRequest::new("it", params, snapshot.schema.source.as_str());
    let mut sink: Vec<GeneratedQuery> = Vec::new();
    let status = run_generation(
        &mut request,
        &snapshot.schema,
        &snapshot.graph,
        dialect,
        &mut sink,
        &CancellationFlag::new(),
    )
    .unwrap();
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(request.generation().status(), RunStatus::Completed);
    assert!(request.generation().finished_at().is_some());
    assert_eq!(request.generated_count, sink.len());
    sink.into_iter().map(|g| g.sql).collect()
}

#[tokio::test]
async fn test_analyze_and_generate() {
    let registry = SchemaRegistry::new();
    let catalog = MemoryCatalog::shop();
    let snapshot = registry.analyze_source("memory:shop", &catalog).await.unwrap();

    assert_eq!(snapshot.schema.len(), 2);
    assert!(snapshot.schema.is_analyzed);
    assert_eq!(snapshot.graph.edge_count(), 1);
    let user_id = snapshot
        .schema
        .table("orders")
        .and_then(|t| t.column("user_id"))
        .unwrap();
    assert!(user_id.is_foreign_key());
    assert!(user_id.has_index);

    let sql = run(&snapshot, GenerationParameters::plain(200, 42), Dialect::Postgres);
    assert_eq!(sql.len(), 200);
    assert!(sql
        .iter()
        .filter(|s| s.contains(" JOIN "))
        .all(|s| s.contains("ON \"orders\".\"user_id\" = \"users\".\"id\"")));
}

#[tokio::test]
async fn test_rendered_workload_is_reproducible() {
    let registry = SchemaRegistry::new();
    let snapshot = registry
        .analyze_source("memory:shop", &MemoryCatalog::shop())
        .await
        .unwrap();
    let params = GenerationParameters {
        num_queries: 300,
        seed: 9,
        ..GenerationParameters::default()
    };

    for dialect in [Dialect::Ansi, Dialect::Postgres, Dialect::MySql] {
        assert_eq!(
            run(&snapshot, params.clone(), dialect),
            run(&snapshot, params.clone(), dialect)
        );
    }
}

#[tokio::test]
async fn test_single_table_workload_without_joins() {
    let registry = SchemaRegistry::new();
    let snapshot = registry
        .analyze_source("memory:shop", &MemoryCatalog::shop())
        .await
        .unwrap();
    let params = GenerationParameters {
        max_joins: 0,
        ..GenerationParameters::plain(100, 42)
    };

    for sql in run(&snapshot, params, Dialect::Ansi) {
        assert!(!sql.contains(" JOIN "));
    }
}

#[tokio::test]
async fn test_failed_reanalysis_keeps_previous_snapshot() {
    let registry = SchemaRegistry::new();
    let catalog = MemoryCatalog::shop();
    let first = registry.analyze_source("memory:shop", &catalog).await.unwrap();

    *catalog.offline.lock().await = true;
    let err = registry
        .analyze_source("memory:shop", &catalog)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::ConnectionFailed(_)));

    let current = registry.snapshot("memory:shop").await.unwrap();
    assert!(Arc::ptr_eq(&first, &current));
    assert_eq!(registry.sources().await, vec!["memory:shop".to_string()]);
}

#[tokio::test]
async fn test_connection_lost_mid_analysis_keeps_previous_snapshot() {
    let registry = SchemaRegistry::new();
    let catalog = MemoryCatalog::shop();
    let first = registry.analyze_source("memory:shop", &catalog).await.unwrap();

    *catalog.pool_closed.lock().await = true;
    let err = registry
        .analyze_source("memory:shop", &catalog)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::ConnectionFailed(_)));

    let current = registry.snapshot("memory:shop").await.unwrap();
    assert!(Arc::ptr_eq(&first, &current));
    assert_eq!(current.schema.table("users").unwrap().columns.len(), 3);
}

#[tokio::test]
async fn test_reanalysis_after_dropped_column() {
    let registry = SchemaRegistry::new();
    let catalog = MemoryCatalog::shop();
    let before = registry.analyze_source("memory:shop", &catalog).await.unwrap();

    {
        let mut tables = catalog.tables.lock().await;
        let orders = tables.get_mut("orders").unwrap();
        orders.columns.retain(|(name, _)| *name != "user_id");
        orders.foreign_keys.clear();
        orders.indexes.clear();
    }
    let after = registry.analyze_source("memory:shop", &catalog).await.unwrap();

    assert!(after.schema.table("orders").unwrap().column("user_id").is_none());
    assert_eq!(after.graph.edge_count(), 0);
    // Holders of the earlier snapshot keep the schema they started with.
    assert_eq!(before.graph.edge_count(), 1);
    assert!(before.schema.table("orders").unwrap().column("user_id").is_some());

    let sql = run(&after, GenerationParameters::plain(50, 3), Dialect::Postgres);
    assert!(sql.iter().all(|s| !s.contains("user_id")));
}
