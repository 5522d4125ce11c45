//! Subcommand runners.

use std::{
    fs, io::{self, Read, Write}, path::Path, sync::{
        Arc, atomic::{AtomicU64, Ordering}
    }
};

use graphtune::{
    AutotuneOptions, BufferLayoutKey, CacheStatistics, CandidateResult, ComputeCapability, ContextId, DeviceContext, DriverError, GraphCacheRegistry, GraphExecHandle, VersionInfo, autotune::{
        DeviceIdentity, MetricsSink, OperationDescriptor, log_autotune_results, select_plan_with_options, select_with_options
    }, caching::BufferSlice
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use super::{
    CliError, config::{CacheSimArgs, Command, OutputFormat, SelectArgs}
};

/// Accepted input: a bare result list, or a record shaped like the autotune log.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ReplayInput {
    Record {
        #[serde(default)]
        instr: Option<OperationDescriptor>,
        #[serde(default)]
        device: Option<DeviceIdentity>,
        results: Vec<CandidateResult>,
    },
    Bare(Vec<CandidateResult>),
}

impl ReplayInput {
    pub fn results(&self) -> &[CandidateResult] {
        match self {
            Self::Record { results, .. } => results,
            Self::Bare(results) => results,
        }
    }
}

/// Device context answering identity queries from a recorded device.
struct ReplayDevice {
    identity: DeviceIdentity,
}

impl DeviceContext for ReplayDevice {
    fn context_id(&self) -> ContextId {
        ContextId(0)
    }

    fn dnn_version(&self) -> Result<VersionInfo, DriverError> {
        Ok(self.identity.dnn_version)
    }

    fn compute_capability(&self) -> ComputeCapability {
        self.identity.compute_capability
    }

    fn pci_bus_id(&self) -> String {
        self.identity.pci_bus_id.clone()
    }

    fn blas_version(&self) -> Option<String> {
        self.identity.blas_version.clone()
    }

    fn destroy_graph(&self, _graph: GraphExecHandle) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("destroy_graph"))
    }
}

/// In-memory context for cache simulation; counts destroyed graphs.
struct SimulatedContext {
    id: ContextId,
    destroyed: AtomicU64,
}

impl DeviceContext for SimulatedContext {
    fn context_id(&self) -> ContextId {
        self.id
    }

    fn dnn_version(&self) -> Result<VersionInfo, DriverError> {
        Ok(VersionInfo::default())
    }

    fn compute_capability(&self) -> ComputeCapability {
        ComputeCapability::default()
    }

    fn pci_bus_id(&self) -> String {
        format!("sim:{:02x}", self.id.0)
    }

    fn destroy_graph(&self, _graph: GraphExecHandle) -> Result<(), DriverError> {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ContextReport {
    pub context: u64,
    pub destroyed: u64,
    pub statistics: CacheStatistics,
}

#[derive(Debug, Serialize)]
pub struct CacheSimReport {
    pub capacity: usize,
    pub launches: usize,
    pub builds: u64,
    pub contexts: Vec<ContextReport>,
    /// Graphs destroyed when the caches were torn down at the end of the run.
    pub released: usize,
}

pub fn run(command: &Command, format: OutputFormat) -> Result<(), CliError> {
    match command {
        Command::Select(args) => {
            let input = read_input(&args.input)?;
            let options = options_for(args);
            log_replay(&input, args);
            let choice = select_with_options(input.results(), &options)?;
            info!(algo_id = choice.algorithm.algo_id, "selected algorithm");
            write_json(&choice, format)
        }
        Command::Plan(args) => {
            let input = read_input(&args.input)?;
            let options = options_for(args);
            log_replay(&input, args);
            let plan = select_plan_with_options(input.results(), &options)?;
            info!(index = ?plan.index, index_no_scratch = ?plan.index_no_scratch, "selected execution plan");
            write_json(&plan, format)
        }
        Command::CacheSim(args) => {
            args.validate()?;
            let report = simulate_cache(args);
            write_json(&report, format)
        }
    }
}

fn options_for(args: &SelectArgs) -> AutotuneOptions {
    let options = AutotuneOptions::from_env();
    if args.deterministic { options.deterministic(true) } else { options }
}

pub fn read_input(path: &Path) -> Result<ReplayInput, CliError> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(|e| CliError::io(path, e))?;
        buf
    } else {
        fs::read_to_string(path).map_err(|e| CliError::io(path, e))?
    };
    let input: ReplayInput = serde_json::from_str(&raw)?;
    debug!(candidates = input.results().len(), path = %path.display(), "loaded candidate results");
    Ok(input)
}

fn log_replay(input: &ReplayInput, args: &SelectArgs) {
    if args.no_log {
        return;
    }
    if let ReplayInput::Record {
        instr: Some(instr),
        device,
        results,
    } = input
    {
        let device = ReplayDevice {
            identity: device.clone().unwrap_or_else(|| DeviceIdentity {
                dnn_version: VersionInfo::default(),
                compute_capability: ComputeCapability::default(),
                pci_bus_id: String::new(),
                blas_version: None,
            }),
        };
        log_autotune_results(instr, &device, results, &MetricsSink);
    }
}

/// Replay `args.keys` against one graph cache per simulated context.
pub fn simulate_cache(args: &CacheSimArgs) -> CacheSimReport {
    let config = args.cache_config();
    let span = info_span!("cache_sim", capacity = config.capacity, contexts = args.contexts);
    let _enter = span.enter();

    let contexts: Vec<Arc<SimulatedContext>> = (0..args.contexts.max(1))
        .map(|id| {
            Arc::new(SimulatedContext {
                id: ContextId(id),
                destroyed: AtomicU64::new(0),
            })
        })
        .collect();
    let registry = GraphCacheRegistry::new(config);
    let mut builds = 0u64;

    for (launch, &layout_id) in args.keys.iter().enumerate() {
        let context: Arc<dyn DeviceContext> = contexts[launch % contexts.len()].clone();
        let key = BufferLayoutKey::from_slices([BufferSlice {
            allocation_index: 0,
            address: layout_id,
            size: 0x1_0000,
        }]);
        if registry.lookup(&context, &key).is_none() {
            builds += 1;
            registry.insert(&context, key, GraphExecHandle::from_raw(builds));
        }
    }

    let statistics = registry.statistics();
    let mut reports: Vec<ContextReport> = contexts
        .iter()
        .filter_map(|context| {
            statistics.get(&context.id).map(|stats| ContextReport {
                context: context.id.0,
                destroyed: context.destroyed.load(Ordering::Relaxed),
                statistics: stats.clone(),
            })
        })
        .collect();
    reports.sort_by_key(|report| report.context);

    let released = registry.release_all();
    CacheSimReport {
        capacity: config.capacity,
        launches: args.keys.len(),
        builds,
        contexts: reports,
        released,
    }
}

fn write_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), CliError> {
    let rendered = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Json => serde_json::to_string(value)?,
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(|e| CliError::io("<stdout>", e))
}

#[path = "commands.test.rs"]
mod tests;
