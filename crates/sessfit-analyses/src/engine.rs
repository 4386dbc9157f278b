use anyhow::{ensure, Result};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::agents::{negative_log_likelihood, AgentSpec, ParamAxis};
use crate::session::FilteredTrials;

/// Fit tuning knobs parsed from a job's `fit_kwargs`. `workers` is always
/// overwritten by the scheduler's per-job budget before fitting starts.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub workers: usize,
    pub grid_points: usize,
    pub k_fold_cross_validation: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            grid_points: 9,
            k_fold_cross_validation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CrossValidation {
    pub k: usize,
    /// Mean held-out negative log likelihood per trial.
    pub test_nll_per_trial: f64,
    pub test_accuracy: f64,
}

/// A fitted model: best-fit parameters plus the goodness-of-fit numbers
/// that get pushed into the job record.
#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    pub agent_class: String,
    pub params: IndexMap<String, f64>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Likelihood per trial, `exp(log_likelihood / n_trials)`.
    pub lpt: f64,
    pub prediction_accuracy: f64,
    pub n_trials: usize,
    pub n_params: usize,
    /// Model probability of choosing side 1 on each (non-ignored) trial.
    pub predicted_choice_prob: Vec<f64>,
    pub cross_validation: Option<CrossValidation>,
}

impl FittedModel {
    /// The `analysis_results` body of the job record. Keeps the same key
    /// casing the downstream consumers expect.
    pub fn fitting_result_dict(&self) -> Value {
        serde_json::json!({
            "agent_class": self.agent_class,
            "fitted_params": self.params,
            "log_likelihood": self.log_likelihood,
            "AIC": self.aic,
            "BIC": self.bic,
            "LPT": self.lpt,
            "prediction_accuracy": self.prediction_accuracy,
            "n_trials": self.n_trials,
            "n_params": self.n_params,
            "cross_validation": self.cross_validation,
        })
    }
}

/// Maximum-likelihood fitting strategy. Implementations must be
/// deterministic for a given spec, trial history, and options, including
/// across worker counts.
pub trait FitEngine: Send + Sync {
    fn fit(
        &self,
        spec: &AgentSpec,
        trials: &FilteredTrials,
        opts: &FitOptions,
    ) -> Result<FittedModel>;
}

/// Exhaustive search over a parameter grid, sharded across plain threads.
///
/// Candidates are scored independently, so the search splits into equal
/// index ranges and reduces with a (score, index) minimum. The index
/// tie-break makes the winner independent of how many shards ran.
pub struct GridSearchEngine;

impl FitEngine for GridSearchEngine {
    fn fit(
        &self,
        spec: &AgentSpec,
        trials: &FilteredTrials,
        opts: &FitOptions,
    ) -> Result<FittedModel> {
        ensure!(!trials.is_empty(), "cannot fit an empty trial history");

        let axes = spec.param_axes(opts.grid_points);
        let candidates = cartesian(&axes);
        ensure!(!candidates.is_empty(), "agent {} has no parameter grid", spec.agent_class);
        let (best_idx, best_nll) =
            best_candidate(spec, trials, &candidates, opts.workers, None);

        let best = &candidates[best_idx];
        let params: IndexMap<String, f64> = axes
            .iter()
            .zip(best)
            .map(|(axis, &value)| (axis.name.to_string(), value))
            .collect();

        let probs = spec.predict_choice_probs(trials, best);
        let n = trials.len();
        let k = axes.len();
        let log_likelihood = -best_nll;
        let prediction_accuracy = accuracy(&probs, &trials.choices, None);

        let cross_validation = if opts.k_fold_cross_validation >= 2 {
            Some(cross_validate(
                spec,
                trials,
                &candidates,
                opts.workers,
                opts.k_fold_cross_validation,
            ))
        } else {
            None
        };

        Ok(FittedModel {
            agent_class: spec.agent_class.clone(),
            params,
            log_likelihood,
            aic: 2.0 * k as f64 + 2.0 * best_nll,
            bic: (n as f64).ln() * k as f64 + 2.0 * best_nll,
            lpt: (log_likelihood / n as f64).exp(),
            prediction_accuracy,
            n_trials: n,
            n_params: k,
            predicted_choice_prob: probs,
            cross_validation,
        })
    }
}

fn cartesian(axes: &[ParamAxis]) -> Vec<Vec<f64>> {
    let mut out: Vec<Vec<f64>> = vec![Vec::new()];
    for axis in axes {
        out = out
            .iter()
            .flat_map(|prefix| {
                axis.values.iter().map(move |&value| {
                    let mut candidate = prefix.clone();
                    candidate.push(value);
                    candidate
                })
            })
            .collect();
    }
    out
}

/// Scores every candidate and returns the (index, nll) of the best one.
/// NaN scores lose to everything.
fn best_candidate(
    spec: &AgentSpec,
    trials: &FilteredTrials,
    candidates: &[Vec<f64>],
    workers: usize,
    scored: Option<&[bool]>,
) -> (usize, f64) {
    let score = |idx: usize| -> f64 {
        let probs = spec.predict_choice_probs(trials, &candidates[idx]);
        let nll = negative_log_likelihood(&probs, &trials.choices, scored);
        if nll.is_nan() {
            f64::INFINITY
        } else {
            nll
        }
    };

    let scan = |range: std::ops::Range<usize>| -> (usize, f64) {
        let mut best = (usize::MAX, f64::INFINITY);
        for idx in range {
            let nll = score(idx);
            if nll < best.1 {
                best = (idx, nll);
            }
        }
        best
    };

    let workers = workers.clamp(1, candidates.len().max(1));
    if workers <= 1 {
        return scan(0..candidates.len());
    }

    let chunk = candidates.len().div_ceil(workers);
    let mut shard_results: Vec<(usize, f64)> = Vec::with_capacity(workers);
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for w in 0..workers {
            let lo = w * chunk;
            let hi = ((w + 1) * chunk).min(candidates.len());
            if lo >= hi {
                break;
            }
            let scan = &scan;
            handles.push(scope.spawn(move || scan(lo..hi)));
        }
        for handle in handles {
            // A panicked shard forfeits its range; the reduce still picks
            // a winner from surviving shards.
            if let Ok(result) = handle.join() {
                shard_results.push(result);
            }
        }
    });

    let reduced = shard_results
        .into_iter()
        .fold((usize::MAX, f64::INFINITY), |best, candidate| {
            if candidate.1 < best.1 || (candidate.1 == best.1 && candidate.0 < best.0) {
                candidate
            } else {
                best
            }
        });
    if reduced.0 == usize::MAX {
        // Every shard died; rescan serially so a deterministic panic
        // surfaces on this thread instead of silently picking nothing.
        return scan(0..candidates.len());
    }
    reduced
}

fn accuracy(probs: &[f64], choices: &[u8], scored: Option<&[bool]>) -> f64 {
    let mut hits = 0usize;
    let mut total = 0usize;
    for (t, (&p, &choice)) in probs.iter().zip(choices).enumerate() {
        if let Some(mask) = scored {
            if !mask[t] {
                continue;
            }
        }
        total += 1;
        if (p > 0.5) == (choice == 1) {
            hits += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Blocked k-fold: fit on the trials outside each contiguous block, score
/// the held-out block. The state trajectory always replays the full history;
/// only the scored subset changes.
fn cross_validate(
    spec: &AgentSpec,
    trials: &FilteredTrials,
    candidates: &[Vec<f64>],
    workers: usize,
    k: usize,
) -> CrossValidation {
    let n = trials.len();
    let k = k.min(n).max(2);
    let mut nll_sum = 0.0;
    let mut held_out = 0usize;
    let mut acc_sum = 0.0;

    for fold in 0..k {
        let lo = fold * n / k;
        let hi = (fold + 1) * n / k;
        let train: Vec<bool> = (0..n).map(|i| !(lo..hi).contains(&i)).collect();
        let test: Vec<bool> = (0..n).map(|i| (lo..hi).contains(&i)).collect();

        let (best_idx, _) = best_candidate(spec, trials, candidates, workers, Some(&train));
        let probs = spec.predict_choice_probs(trials, &candidates[best_idx]);
        nll_sum += negative_log_likelihood(&probs, &trials.choices, Some(&test));
        acc_sum += accuracy(&probs, &trials.choices, Some(&test));
        held_out += hi - lo;
    }

    CrossValidation {
        k,
        test_nll_per_trial: nll_sum / held_out.max(1) as f64,
        test_accuracy: acc_sum / k as f64,
    }
}
