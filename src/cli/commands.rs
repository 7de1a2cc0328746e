//! CLI command implementations
//!
//! `build` loads entities into an in-memory store, registers one population
//! per `--index`, runs a population job over them and reports the outcome
//! of every index as JSON.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::observability::{LogTarget, Logger};
use crate::population::memory::{InMemoryIndexBuilder, InMemoryStoreView};
use crate::population::{
    EntityUpdates, FailedIndexProxyFactory, FlippableProxy, IndexDescriptor, IndexFlipper, IndexId, IndexSample,
    InMemoryIndexStatistics, PopulationConfig, PopulationCoordinator, PopulationJob, SchemaDescriptor,
    SchemaStateCounter,
};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Arguments of one `build` invocation
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub entities: PathBuf,
    pub indexes: Vec<String>,
    pub unique: Vec<u64>,
    pub config: Option<PathBuf>,
    pub verify: bool,
}

/// Final state of one index after the job
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub id: IndexId,
    pub name: String,
    pub schema: String,
    pub unique: bool,
    pub state: &'static str,
    pub failure: Option<String>,
    pub entries: usize,
    pub sample: Option<IndexSample>,
}

/// Parse and run the command line
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Build {
            entities,
            indexes,
            unique,
            config,
            verify,
        } => {
            // keep stdout for the report
            Logger::set_target(LogTarget::Stderr);
            let report = build(&BuildRequest {
                entities,
                indexes,
                unique,
                config,
                verify,
            })?;
            write_response(report)
        }
    }
}

/// Parse `id:name:token:property[,property...]`
pub fn parse_index_spec(spec: &str) -> CliResult<IndexDescriptor> {
    let parts: Vec<&str> = spec.split(':').collect();
    let [id, name, token, properties] = parts.as_slice() else {
        return Err(CliError::invalid_index_spec(
            spec,
            "expected id:name:token:property[,property...]",
        ));
    };

    let id: IndexId = id
        .parse()
        .map_err(|e| CliError::invalid_index_spec(spec, format!("bad id: {}", e)))?;
    if name.is_empty() {
        return Err(CliError::invalid_index_spec(spec, "empty name"));
    }
    let token: u32 = token
        .parse()
        .map_err(|e| CliError::invalid_index_spec(spec, format!("bad token: {}", e)))?;
    let properties = properties
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CliError::invalid_index_spec(spec, format!("bad property: {}", e)))?;

    Ok(IndexDescriptor::new(id, *name, SchemaDescriptor::new(token, &properties)))
}

fn load_entities(path: &Path) -> CliResult<Vec<EntityUpdates>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::invalid_entities(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::invalid_entities(format!("invalid entities in {}: {}", path.display(), e)))
}

/// Index descriptors for the request, uniqueness applied
fn descriptors(request: &BuildRequest) -> CliResult<Vec<IndexDescriptor>> {
    let mut seen = BTreeSet::new();
    let mut descriptors = Vec::with_capacity(request.indexes.len());
    for spec in &request.indexes {
        let descriptor = parse_index_spec(spec)?;
        if !seen.insert(descriptor.id) {
            return Err(CliError::invalid_index_spec(spec, "duplicate index id"));
        }
        descriptors.push(descriptor);
    }

    for id in &request.unique {
        let descriptor = descriptors
            .iter_mut()
            .find(|d| d.id == *id)
            .ok_or_else(|| CliError::invalid_index_spec(&id.to_string(), "--unique names no --index"))?;
        descriptor.unique = true;
    }
    Ok(descriptors)
}

/// Run a population job for `request` and build the JSON report
pub fn build(request: &BuildRequest) -> CliResult<Value> {
    let config = match &request.config {
        Some(path) => PopulationConfig::load(path)?,
        None => PopulationConfig::default(),
    };
    let verify = request.verify || config.verify_constraints_before_flip;
    let descriptors = descriptors(request)?;
    let entities = load_entities(&request.entities)?;

    let statistics = Arc::new(InMemoryIndexStatistics::new());
    let coordinator = Arc::new(PopulationCoordinator::new(
        config.clone(),
        Arc::new(InMemoryStoreView::with_entity_type(config.entity_type, entities)),
        statistics.clone(),
        Arc::new(SchemaStateCounter::new()),
    )?);

    let mut built = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let builder = InMemoryIndexBuilder::new(descriptor.clone());
        let proxy = Arc::new(FlippableProxy::with_online_target(descriptor.clone()));
        coordinator.add_populator(
            Box::new(builder.clone()),
            descriptor.clone(),
            proxy.clone(),
            Arc::new(FailedIndexProxyFactory::new(descriptor.clone())),
            descriptor.to_string(),
        );
        built.push((descriptor, builder, proxy));
    }

    let job = PopulationJob::with_verification(coordinator, verify);
    let report = job.run();

    let indexes: Vec<IndexReport> = built
        .into_iter()
        .map(|(descriptor, builder, proxy)| IndexReport {
            id: descriptor.id,
            name: descriptor.name.clone(),
            schema: descriptor.schema.to_string(),
            unique: descriptor.unique,
            state: proxy.state().as_str(),
            failure: proxy.failure().or_else(|| builder.failure()),
            entries: builder.entry_count(),
            sample: statistics.get(descriptor.id),
        })
        .collect();

    Ok(json!({
        "job": report,
        "indexes": indexes,
    }))
}
