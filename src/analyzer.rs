use chrono::Utc;
use log::{debug, info, warn};

use crate::{
    db::{CatalogSource, ColumnRow},
    errors::{AnalysisError, DbError},
    models::catalog::{Column, Schema, Table},
};

/// Builds a [`Schema`] from an engine catalog.
///
/// Each call produces a fresh schema; nothing is merged with earlier results.
/// The table listing and a lost connection are fatal. Other failures on a
/// single table degrade that table (no columns, or missing key/index
/// markings) and the run continues.
pub struct SchemaAnalyzer {
    source_name: String,
}

impl SchemaAnalyzer {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
        }
    }

    pub async fn analyze(&self, source: &dyn CatalogSource) -> Result<Schema, AnalysisError> {
        let namespace = source.namespace();
        info!(
            "Analyzing schema of {} (namespace {})",
            self.source_name, namespace
        );

        let mut table_names = source.list_tables().await?;
        table_names.sort();
        table_names.dedup();

        let mut tables = Vec::with_capacity(table_names.len());
        for table_name in &table_names {
            tables.push(self.analyze_table(source, table_name, &namespace).await?);
        }

        let schema = Schema::analyzed(self.source_name.clone(), tables, Utc::now());
        info!(
            "Analyzed {} tables with {} foreign key edges",
            schema.len(),
            schema.foreign_key_edges().len()
        );
        Ok(schema)
    }

    async fn analyze_table(
        &self,
        source: &dyn CatalogSource,
        table_name: &str,
        namespace: &str,
    ) -> Result<Table, AnalysisError> {
        debug!("Analyzing table: {}", table_name);
        let mut table = Table::new(table_name, namespace);

        let Some(rows) = tolerate(source.table_columns(table_name).await, "columns", table_name)?
        else {
            return Ok(table);
        };
        for column in columns_from_rows(rows) {
            table.push_column(column);
        }

        if let Some(pk) = tolerate(source.primary_key(table_name).await, "primary key", table_name)? {
            debug!("Primary keys found: {}", pk.join(", "));
            for name in pk {
                if let Some(column) = table.column_mut(&name) {
                    column.is_primary_key = true;
                }
            }
        }

        if let Some(fks) = tolerate(source.foreign_keys(table_name).await, "foreign keys", table_name)? {
            for fk in fks {
                debug!(
                    "Found foreign key: {} -> {}.{}",
                    fk.column, fk.referenced_table, fk.referenced_column
                );
                if let Some(column) = table.column_mut(&fk.column) {
                    column.set_reference(&fk.referenced_table, &fk.referenced_column);
                }
            }
        }

        if let Some(indexes) = tolerate(source.indexes(table_name).await, "indexes", table_name)? {
            debug!("Found {} indexes for table {}", indexes.len(), table_name);
            for index in indexes {
                if let Some(column) = table.column_mut(&index.column) {
                    column.add_index(&index.name, index.is_unique);
                }
            }
        }

        table.row_estimate =
            tolerate(source.row_estimate(table_name).await, "row estimate", table_name)?.flatten();

        Ok(table)
    }
}

/// Per-table catalog failures degrade the table and are logged. A lost
/// connection is not a per-table problem and aborts the whole analysis.
fn tolerate<T>(
    result: Result<T, DbError>,
    what: &str,
    table_name: &str,
) -> Result<Option<T>, AnalysisError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => match AnalysisError::from(e) {
            err @ AnalysisError::ConnectionFailed(_) => Err(err),
            err => {
                warn!("Failed to read {} of {}: {}", what, table_name, err);
                Ok(None)
            }
        },
    }
}

/// Orders catalog rows by ordinal and drops duplicate names. Ordinals are
/// reassigned by [`Table::push_column`], closing gaps left by dropped columns.
fn columns_from_rows(mut rows: Vec<ColumnRow>) -> Vec<Column> {
    rows.sort_by_key(|r| r.ordinal_position);
    let mut columns: Vec<Column> = Vec::with_capacity(rows.len());
    for row in rows {
        if columns.iter().any(|c| c.name == row.name) {
            continue;
        }
        debug!(
            "Found column: {} ({}) nullable: {} position: {}",
            row.name, row.data_type, row.is_nullable, row.ordinal_position
        );
        let mut column = Column::new(row.name, row.data_type, 0);
        column.is_nullable = row.is_nullable;
        column.max_length = row.max_length.and_then(|l| i32::try_from(l).ok());
        column.is_auto_increment = row.is_auto_increment;
        columns.push(column);
    }
    columns
}
