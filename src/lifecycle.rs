use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use csv::Writer;
use log::{error, info, warn};
use serde::Serialize;

use crate::{
    errors::{DbError, GenerationError, LifecycleError},
    generator::{generate, Dialect, GeneratedQuery},
    graph::JoinGraph,
    models::{
        catalog::Schema,
        request::{GenerationRequest, RunStatus},
    },
};

/// Cooperative cancellation signal shared between a running generation and
/// whoever wants to stop it. Checked before each query is produced.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Consumer of generated queries.
pub trait QuerySink {
    fn accept(&mut self, generated: &GeneratedQuery) -> Result<(), GenerationError>;

    /// Called once when a running generation stops without a sink error,
    /// either completed or cancelled. Not called for runs that never started.
    fn finish(&mut self) -> Result<(), GenerationError> {
        Ok(())
    }
}

impl QuerySink for Vec<GeneratedQuery> {
    fn accept(&mut self, generated: &GeneratedQuery) -> Result<(), GenerationError> {
        self.push(generated.clone());
        Ok(())
    }
}

#[derive(Serialize)]
struct ManifestRecord<'a> {
    index: usize,
    tables: String,
    joins: usize,
    predicates: usize,
    aggregates: usize,
    hints: usize,
    sql: &'a str,
}

/// Writes a workload as `<name>.sql` (one statement per line) and a CSV
/// manifest `<name>.csv` describing each statement.
pub struct WorkloadFileSink {
    sql_path: PathBuf,
    csv_path: PathBuf,
    sql: BufWriter<File>,
    manifest: Writer<File>,
}

impl WorkloadFileSink {
    pub fn create(dir: &Path, name: &str) -> Result<Self, DbError> {
        let sql_path = dir.join(format!("{}.sql", name));
        let csv_path = dir.join(format!("{}.csv", name));
        let sql = BufWriter::new(File::create(&sql_path)?);
        let manifest = Writer::from_path(&csv_path)?;

        Ok(Self {
            sql_path,
            csv_path,
            sql,
            manifest,
        })
    }

    pub fn sql_path(&self) -> &Path {
        &self.sql_path
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Points the request's result paths at this sink's files.
    pub fn attach(&self, request: &mut GenerationRequest) {
        request.result_file_path = Some(self.sql_path.clone());
        request.result_csv_path = Some(self.csv_path.clone());
    }

    fn write(&mut self, generated: &GeneratedQuery) -> Result<(), DbError> {
        writeln!(self.sql, "{}", generated.sql)?;
        let query = &generated.query;
        self.manifest.serialize(ManifestRecord {
            index: generated.index,
            tables: query.tables().join(" "),
            joins: query.joins.len(),
            predicates: query.predicates.len(),
            aggregates: query.aggregates.len(),
            hints: query.hints.len(),
            sql: &generated.sql,
        })?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DbError> {
        self.sql.flush()?;
        self.manifest.flush()?;
        Ok(())
    }
}

impl QuerySink for WorkloadFileSink {
    fn accept(&mut self, generated: &GeneratedQuery) -> Result<(), GenerationError> {
        Ok(self.write(generated)?)
    }

    fn finish(&mut self) -> Result<(), GenerationError> {
        Ok(self.flush()?)
    }
}

/// Drives the generation phase of `request` to a terminal state.
///
/// Failures of the engine or the sink end the run as `Failed` with the error
/// text in `error_message`; they are not returned. Queries handed to the sink
/// before the failure or a cancellation stay counted in `generated_count`.
/// Only a request whose generation phase already left `NotStarted`/`Pending`
/// is rejected.
pub fn run_generation(
    request: &mut GenerationRequest,
    schema: &Schema,
    graph: &JoinGraph,
    dialect: Dialect,
    sink: &mut dyn QuerySink,
    cancel: &CancellationFlag,
) -> Result<RunStatus, LifecycleError> {
    if request.generation.status == RunStatus::NotStarted {
        request.generation.transition(RunStatus::Pending)?;
    }
    if request.generation.status != RunStatus::Pending {
        return Err(LifecycleError::InvalidTransition {
            from: request.generation.status,
            to: RunStatus::Running,
        });
    }
    if cancel.is_cancelled() {
        return cancelled(request);
    }
    if schema.is_empty() {
        return failed(request, GenerationError::EmptySchema(schema.source.clone()));
    }

    let generator = match generate(schema, graph, request.parameters.clone()) {
        Ok(generator) => generator,
        Err(err) => return failed(request, err),
    };

    request.generation.transition(RunStatus::Running)?;
    info!(
        "Generating workload '{}' ({}) with {} queries against {}",
        request.name,
        request.id,
        generator.len(),
        schema.source
    );

    for (i, query) in generator.enumerate() {
        if cancel.is_cancelled() {
            if let Err(err) = sink.finish() {
                return failed(request, err);
            }
            return cancelled(request);
        }
        let generated = GeneratedQuery::new(i + 1, query, dialect);
        if let Err(err) = sink.accept(&generated) {
            return failed(request, err);
        }
        request.generated_count += 1;
    }

    if let Err(err) = sink.finish() {
        return failed(request, err);
    }

    request.generation.transition(RunStatus::Completed)?;
    info!(
        "Workload '{}' completed with {} queries",
        request.name, request.generated_count
    );
    Ok(RunStatus::Completed)
}

fn failed(
    request: &mut GenerationRequest,
    err: GenerationError,
) -> Result<RunStatus, LifecycleError> {
    error!(
        "Workload '{}' failed after {} queries: {}",
        request.name, request.generated_count, err
    );
    request.error_message = Some(err.to_string());
    request.generation.transition(RunStatus::Failed)?;
    Ok(RunStatus::Failed)
}

fn cancelled(request: &mut GenerationRequest) -> Result<RunStatus, LifecycleError> {
    warn!(
        "Workload '{}' cancelled after {} queries",
        request.name, request.generated_count
    );
    request.generation.transition(RunStatus::Cancelled)?;
    Ok(RunStatus::Cancelled)
}
