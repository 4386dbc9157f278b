use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Map, Value};

use sessfit_core::analysis::{Analysis, AnalysisContext, AnalysisName};
use sessfit_core::job::JobDescriptor;
use sessfit_core::types::{Artifact, JobResult};
use sessfit_core::uploader::local_record_exists;

use crate::agents::AgentSpec;
use crate::engine::{FitEngine, FitOptions, GridSearchEngine};
use crate::figure::render_fitted_session;
use crate::session::SessionData;

/// Maximum-likelihood fitting of a foraging model to one recorded session.
///
/// Produces two artifacts (the fitted-session figure and the serialized
/// model) plus the record body with timing, library versions, and the
/// fitting results.
pub struct MleFitting {
    engine: Arc<dyn FitEngine>,
}

impl MleFitting {
    pub fn new(engine: Arc<dyn FitEngine>) -> Self {
        Self { engine }
    }
}

impl Default for MleFitting {
    fn default() -> Self {
        Self::new(Arc::new(GridSearchEngine))
    }
}

#[derive(Debug)]
struct MleArgs {
    agent: AgentSpec,
    fit: FitOptions,
}

fn parse_args(args: &Value) -> Result<MleArgs> {
    let agent_class = args
        .get("agent_class")
        .and_then(Value::as_str)
        .context("analysis_args.agent_class is required")?;
    let agent_kwargs = args.get("agent_kwargs").unwrap_or(&Value::Null);
    let agent = AgentSpec::parse(agent_class, agent_kwargs)?;

    let mut fit = FitOptions::default();
    if let Some(fit_kwargs) = args.get("fit_kwargs") {
        if let Some(k) = fit_kwargs.get("k_fold_cross_validation").and_then(Value::as_u64) {
            fit.k_fold_cross_validation = k as usize;
        }
        if let Some(g) = fit_kwargs.get("grid_points").and_then(Value::as_u64) {
            fit.grid_points = (g as usize).max(1);
        }
        // Any worker count inside fit_kwargs is ignored on purpose; the
        // scheduler's per-job budget is authoritative.
    }
    Ok(MleArgs { agent, fit })
}

impl Analysis for MleFitting {
    fn name(&self) -> AnalysisName {
        AnalysisName::MleFitting
    }

    fn run(&self, job: &JobDescriptor, ctx: &AnalysisContext) -> Result<JobResult> {
        let started = Instant::now();
        let args = parse_args(&job.analysis_spec.analysis_args)?;
        ctx.log.info(format!(
            "MLE fitting for {} with {}",
            job.input_ref, args.agent.agent_class
        ));

        if ctx.skip_existing && local_record_exists(&ctx.results_root, &job.job_hash) {
            ctx.log.info(format!(
                "results for job {} already exist locally; skipping",
                job.job_hash
            ));
            return Ok(JobResult::skipped(
                "results already present under the local results root",
            ));
        }

        let session = SessionData::load(&ctx.data_root, &job.input_ref)?;
        let trials = session.filtered();
        let ignored = session.n_trials() - trials.len();
        if ignored > 0 {
            ctx.log.info(format!(
                "removed {ignored} ignored trial(s), {} remain",
                trials.len()
            ));
        }
        if trials.is_empty() {
            ctx.log.warn("no valid trials after filtering; nothing to fit");
            return Ok(JobResult::failed("no valid trials after filtering"));
        }

        let mut opts = args.fit;
        opts.workers = ctx.inner_workers.max(1);
        ctx.log.info(format!(
            "fitting {} trial(s) with {} optimizer worker(s)",
            trials.len(),
            opts.workers
        ));

        let model = self.engine.fit(&args.agent, &trials, &opts)?;
        ctx.log.info(format!(
            "best log likelihood {:.3}, prediction accuracy {:.3}",
            model.log_likelihood, model.prediction_accuracy
        ));

        let figure = render_fitted_session(&session.session_id, &trials, &model);
        let forager = serde_json::to_value(&model).context("serialize fitted model")?;

        let mut record = Map::new();
        record.insert("job_hash".to_string(), Value::String(job.job_hash.clone()));
        record.insert("input_ref".to_string(), Value::String(job.input_ref.clone()));
        record.insert(
            "analysis_spec".to_string(),
            serde_json::to_value(&job.analysis_spec).context("serialize analysis spec")?,
        );
        record.insert(
            "analysis_datetime".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        record.insert(
            "analysis_time_spent_in_sec".to_string(),
            serde_json::json!(started.elapsed().as_secs_f64()),
        );
        record.insert(
            "analysis_libs".to_string(),
            lib_versions(&job.analysis_spec.analysis_libs_to_track_ver),
        );
        record.insert("analysis_results".to_string(), model.fitting_result_dict());

        let mut result = JobResult::success()
            .with_artifact("fitted.svg", Artifact::Figure(figure))
            .with_artifact("forager.json", Artifact::Model(forager));
        result.record = record;
        Ok(result)
    }
}

fn lib_versions(names: &[String]) -> Value {
    let mut versions = Map::new();
    for name in names {
        let version = match name.as_str() {
            "sessfit" | "sessfit-core" | "sessfit_core" | "sessfit-analyses"
            | "sessfit_analyses" => env!("CARGO_PKG_VERSION"),
            _ => "unknown",
        };
        versions.insert(name.clone(), Value::String(version.to_string()));
    }
    Value::Object(versions)
}
