use std::fs;

use log::info;
use qforge::config::AppConfig;
use qforge::generator::Dialect;
use qforge::lifecycle::{run_generation, CancellationFlag, WorkloadFileSink};
use qforge::models::request::{GenerationRequest, RunStatus};
use qforge::SchemaRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env()?;
    let params = config.load_parameters()?;

    let registry = SchemaRegistry::new();
    let snapshot = registry.analyze(&config.connection).await?;

    fs::create_dir_all(&config.output_dir)?;
    let mut request = GenerationRequest::new(
        config.workload_name.as_str(),
        params,
        snapshot.schema.source.as_str(),
    );
    let mut sink = WorkloadFileSink::create(&config.output_dir, &config.workload_name)?;
    sink.attach(&mut request);

    let status = run_generation(
        &mut request,
        &snapshot.schema,
        &snapshot.graph,
        Dialect::from(config.connection.db_type),
        &mut sink,
        &CancellationFlag::new(),
    )?;

    info!(
        "{} queries written to {} and {}",
        request.generated_count,
        sink.sql_path().display(),
        sink.csv_path().display()
    );
    if status != RunStatus::Completed {
        let reason = request
            .error_message
            .unwrap_or_else(|| format!("generation ended as {:?}", status));
        return Err(reason.into());
    }

    Ok(())
}
