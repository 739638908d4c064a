use std::{collections::HashMap, sync::Arc};

use analyzer::SchemaAnalyzer;
use db::CatalogSource;
use errors::AnalysisError;
use graph::JoinGraph;
use log::info;
use models::{catalog::Schema, connections::ConnectionConfig};
use tokio::sync::Mutex;

pub mod analyzer;
pub mod config;
pub mod db;
pub mod errors;
pub mod generator;
pub mod graph;
pub mod lifecycle;
pub mod models;

/// An analyzed schema and the join graph built from it. Never mutated once
/// published; re-analysis publishes a new snapshot.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub schema: Schema,
    pub graph: JoinGraph,
}

impl CatalogSnapshot {
    pub fn new(schema: Schema) -> Self {
        let graph = JoinGraph::build(&schema);
        Self { schema, graph }
    }
}

/// Latest catalog snapshot per analyzed source.
#[derive(Default)]
pub struct SchemaRegistry {
    snapshots: Arc<Mutex<HashMap<String, Arc<CatalogSnapshot>>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry {
            snapshots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Connects with `config` and analyzes its catalog.
    pub async fn analyze(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<CatalogSnapshot>, AnalysisError> {
        let source = db::connect(config).await?;
        self.analyze_source(&config.source_key(), source.as_ref())
            .await
    }

    /// Analyzes `source` and publishes the result under `key`. On failure the
    /// previously published snapshot, if any, stays in place.
    pub async fn analyze_source(
        &self,
        key: &str,
        source: &dyn CatalogSource,
    ) -> Result<Arc<CatalogSnapshot>, AnalysisError> {
        let schema = SchemaAnalyzer::new(key).analyze(source).await?;
        let snapshot = Arc::new(CatalogSnapshot::new(schema));
        info!(
            "Published snapshot for {}: {} tables, {} join edges",
            key,
            snapshot.schema.len(),
            snapshot.graph.edge_count()
        );
        self.snapshots
            .lock()
            .await
            .insert(key.to_string(), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub async fn snapshot(&self, key: &str) -> Option<Arc<CatalogSnapshot>> {
        self.snapshots.lock().await.get(key).cloned()
    }

    pub async fn sources(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.snapshots.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
