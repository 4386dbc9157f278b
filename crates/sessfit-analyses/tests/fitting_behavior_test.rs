use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use uuid::Uuid;

use sessfit_analyses::job_specs::stock_analysis_specs;
use sessfit_analyses::MleFitting;
use sessfit_core::analysis::{Analysis, AnalysisContext};
use sessfit_core::job::JobDescriptor;
use sessfit_core::logcap::JobLog;
use sessfit_core::types::JobStatus;

fn scratch() -> PathBuf {
    std::env::temp_dir().join(format!("sessfit-fitting-{}", Uuid::new_v4()))
}

fn ctx(root: &PathBuf, inner_workers: usize, skip_existing: bool) -> AnalysisContext {
    AnalysisContext {
        inner_workers,
        data_root: root.join("data"),
        results_root: root.join("results"),
        skip_existing,
        log: JobLog::new(),
    }
}

fn write_session(root: &PathBuf, name: &str, choices: &[u8], rewards: &[bool]) {
    let dir = root.join("data");
    std::fs::create_dir_all(&dir).expect("mkdir");
    let session = json!({"choices": choices, "rewards": rewards});
    std::fs::write(dir.join(name), serde_json::to_vec(&session).expect("encode")).expect("write");
}

/// A win-stay-lose-switch forager with a small lapse rate, on an 85/15
/// schedule whose high side reverses every 30 trials.
fn synthetic_session(seed: u64, n_trials: usize, lapse: f64) -> (Vec<u8>, Vec<bool>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut choices = Vec::with_capacity(n_trials);
    let mut rewards = Vec::with_capacity(n_trials);
    let mut choice = 0u8;
    for t in 0..n_trials {
        if rng.random::<f64>() < lapse {
            choice = if rng.random::<f64>() < 0.5 { 0 } else { 1 };
        }
        let high_side = ((t / 30) % 2) as u8;
        let p_reward = if choice == high_side { 0.85 } else { 0.15 };
        let rewarded = rng.random::<f64>() < p_reward;
        choices.push(choice);
        rewards.push(rewarded);
        if !rewarded {
            choice = 1 - choice;
        }
    }
    (choices, rewards)
}

fn stock_job(agent_class: &str, input_ref: &str, grid_points: u64) -> JobDescriptor {
    let spec = stock_analysis_specs()
        .into_iter()
        .find(|s| s.analysis_args["agent_class"] == agent_class)
        .expect("stock spec");
    let mut job = JobDescriptor::new(input_ref, spec);
    job.analysis_spec.analysis_args["fit_kwargs"]["grid_points"] = json!(grid_points);
    job.reconcile_hash();
    job
}

fn results(record: &serde_json::Map<String, Value>) -> &Value {
    record.get("analysis_results").expect("analysis_results")
}

#[test]
fn test_q_learning_fit_beats_chance_on_a_structured_session() {
    let root = scratch();
    let (choices, rewards) = synthetic_session(7, 120, 0.1);
    write_session(&root, "synthetic.json", &choices, &rewards);

    let job = stock_job("ForagerQLearning", "synthetic.json", 5);
    let result = MleFitting::default()
        .run(&job, &ctx(&root, 2, false))
        .expect("run");
    assert_eq!(result.status, JobStatus::Success);

    let fit = results(&result.record);
    assert_eq!(fit["agent_class"], "ForagerQLearning");
    assert_eq!(fit["n_trials"], 120);
    let chance_ll = 120.0 * (0.5f64).ln();
    let ll = fit["log_likelihood"].as_f64().expect("ll");
    assert!(ll > chance_ll, "fit should beat chance: {ll} vs {chance_ll}");
    let accuracy = fit["prediction_accuracy"].as_f64().expect("accuracy");
    assert!(accuracy > 0.55, "accuracy was {accuracy}");
    assert!(
        fit["cross_validation"].is_object(),
        "stock specs request two-fold cross validation"
    );

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn test_loss_counting_fit_recovers_win_stay_lose_switch_behavior() {
    let root = scratch();
    let (choices, rewards) = synthetic_session(11, 100, 0.0);
    write_session(&root, "wsls.json", &choices, &rewards);

    let job = stock_job("ForagerLossCounting", "wsls.json", 9);
    let result = MleFitting::default()
        .run(&job, &ctx(&root, 1, false))
        .expect("run");
    assert_eq!(result.status, JobStatus::Success);

    let fit = results(&result.record);
    let accuracy = fit["prediction_accuracy"].as_f64().expect("accuracy");
    assert!(
        accuracy > 0.8,
        "a lapse-free switcher should be predicted well, got {accuracy}"
    );
    assert_eq!(fit["fitted_params"]["loss_count_threshold"], 1.0);

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn test_fit_results_are_identical_across_worker_counts() {
    let root = scratch();
    let (choices, rewards) = synthetic_session(3, 80, 0.15);
    write_session(&root, "workers.json", &choices, &rewards);

    let job = stock_job("ForagerQLearning", "workers.json", 3);
    let single = MleFitting::default()
        .run(&job, &ctx(&root, 1, false))
        .expect("single worker run");
    let pooled = MleFitting::default()
        .run(&job, &ctx(&root, 3, false))
        .expect("pooled run");

    assert_eq!(
        results(&single.record),
        results(&pooled.record),
        "the worker count must not change the fitted model"
    );

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn test_second_run_is_skipped_once_results_exist() {
    let root = scratch();
    let (choices, rewards) = synthetic_session(5, 60, 0.1);
    write_session(&root, "skip.json", &choices, &rewards);

    let job = stock_job("ForagerLossCounting", "skip.json", 5);
    let first = MleFitting::default()
        .run(&job, &ctx(&root, 1, true))
        .expect("first run");
    assert_eq!(first.status, JobStatus::Success);

    // Drop what the uploader would have written for this job.
    let job_dir = root.join("results").join(&job.job_hash);
    std::fs::create_dir_all(&job_dir).expect("mkdir");
    std::fs::write(job_dir.join("record.json"), b"{}").expect("write record");

    let second = MleFitting::default()
        .run(&job, &ctx(&root, 1, true))
        .expect("second run");
    assert_eq!(second.status, JobStatus::Skipped);
    assert!(second.artifacts_to_upload.is_empty());

    std::fs::remove_dir_all(&root).ok();
}
