use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::error::SessfitError;
use crate::job::JobDescriptor;
use crate::logcap::JobLog;
use crate::types::JobResult;

/// The analyses this pipeline knows how to dispatch.
///
/// Job files carry the human-readable wire name (`"MLE fitting"`); parsing
/// happens at dispatch time so a batch with one unknown name still runs the
/// rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisName {
    MleFitting,
}

impl AnalysisName {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "mle fitting" | "mle_fitting" => Some(AnalysisName::MleFitting),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisName::MleFitting => "MLE fitting",
        }
    }
}

/// Everything an analysis is allowed to touch while it runs.
///
/// `inner_workers` is the optimizer thread budget decided by the scheduler
/// for this run mode. Analyses must honor it rather than sizing their own
/// pools, otherwise a pooled batch oversubscribes the machine.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub inner_workers: usize,
    pub data_root: PathBuf,
    pub results_root: PathBuf,
    pub skip_existing: bool,
    pub log: JobLog,
}

/// One runnable analysis. Implementations are synchronous and CPU-bound;
/// the scheduler runs them on blocking threads.
pub trait Analysis: Send + Sync {
    fn name(&self) -> AnalysisName;

    /// `Err` here means an unhandled failure (missing input, corrupt data,
    /// optimizer blowup). Expected negative outcomes are returned as an
    /// `Ok` result with a failed or skipped status instead.
    fn run(&self, job: &JobDescriptor, ctx: &AnalysisContext) -> Result<JobResult>;
}

impl std::fmt::Debug for dyn Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Analysis").field(&self.name()).finish()
    }
}

/// Maps wire names from job files to registered implementations.
#[derive(Default)]
pub struct AnalysisRegistry {
    by_name: HashMap<AnalysisName, Arc<dyn Analysis>>,
}

impl AnalysisRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, analysis: Arc<dyn Analysis>) {
        self.by_name.insert(analysis.name(), analysis);
    }

    pub fn get(&self, wire_name: &str) -> Result<Arc<dyn Analysis>> {
        let name = AnalysisName::parse(wire_name)
            .ok_or_else(|| SessfitError::UnknownAnalysis(wire_name.to_string()))?;
        self.by_name
            .get(&name)
            .cloned()
            .ok_or_else(|| anyhow!("no implementation registered for {}", name.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
