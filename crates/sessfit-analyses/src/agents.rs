use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::session::FilteredTrials;

/// Model families the fitting engine knows how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentFamily {
    QLearning,
    LossCounting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKernel {
    None,
    OneStep,
}

/// A fully resolved agent configuration, parsed from `agent_class` and
/// `agent_kwargs` in a job's analysis args.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub agent_class: String,
    pub family: AgentFamily,
    pub learning_rates: usize,
    pub forget_rates: usize,
    pub choice_kernel: ChoiceKernel,
    pub win_stay_lose_switch: bool,
}

/// One free parameter and the grid of values the engine will try for it.
#[derive(Debug, Clone)]
pub struct ParamAxis {
    pub name: &'static str,
    pub values: Vec<f64>,
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![(start + end) / 2.0];
    }
    (0..n)
        .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
        .collect()
}

impl AgentSpec {
    pub fn parse(agent_class: &str, agent_kwargs: &Value) -> Result<Self> {
        let family = match agent_class {
            "ForagerQLearning" | "ForagerSimpleQ" => AgentFamily::QLearning,
            "ForagerLossCounting" => AgentFamily::LossCounting,
            other => bail!("unsupported agent_class: {other}"),
        };

        let empty = Value::Object(serde_json::Map::new());
        let kwargs = match agent_kwargs {
            Value::Null => &empty,
            Value::Object(_) => agent_kwargs,
            other => bail!("agent_kwargs must be an object, got {other}"),
        };

        let learning_rates = usize_kwarg(kwargs, "number_of_learning_rate", 1)?;
        if !(1..=2).contains(&learning_rates) {
            bail!("number_of_learning_rate must be 1 or 2, got {learning_rates}");
        }
        let forget_rates = usize_kwarg(kwargs, "number_of_forget_rate", 0)?;
        if forget_rates > 1 {
            bail!("number_of_forget_rate must be 0 or 1, got {forget_rates}");
        }

        let choice_kernel = match kwargs.get("choice_kernel").and_then(Value::as_str) {
            None | Some("none") => ChoiceKernel::None,
            Some("one_step") => ChoiceKernel::OneStep,
            Some(other) => bail!("unsupported choice_kernel: {other}"),
        };

        if let Some(selection) = kwargs.get("action_selection").and_then(Value::as_str) {
            if selection != "softmax" {
                bail!("unsupported action_selection: {selection}");
            }
        }

        let win_stay_lose_switch = kwargs
            .get("win_stay_lose_switch")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if family == AgentFamily::LossCounting && choice_kernel != ChoiceKernel::None {
            bail!("ForagerLossCounting does not support a choice kernel");
        }

        Ok(Self {
            agent_class: agent_class.to_string(),
            family,
            learning_rates,
            forget_rates,
            choice_kernel,
            win_stay_lose_switch,
        })
    }

    /// Free parameters in a fixed order; the engine's candidate vectors are
    /// indexed against this.
    pub fn param_axes(&self, grid_points: usize) -> Vec<ParamAxis> {
        let g = grid_points.max(1);
        let mut axes = Vec::new();
        match self.family {
            AgentFamily::QLearning => {
                if self.learning_rates == 2 {
                    axes.push(ParamAxis {
                        name: "learn_rate_rew",
                        values: linspace(0.05, 0.95, g),
                    });
                    axes.push(ParamAxis {
                        name: "learn_rate_unrew",
                        values: linspace(0.05, 0.95, g),
                    });
                } else {
                    axes.push(ParamAxis {
                        name: "learn_rate",
                        values: linspace(0.05, 0.95, g),
                    });
                }
                if self.forget_rates == 1 {
                    axes.push(ParamAxis {
                        name: "forget_rate",
                        values: linspace(0.0, 0.6, g),
                    });
                }
                axes.push(ParamAxis {
                    name: "softmax_inverse_temp",
                    values: linspace(0.25, 8.0, g),
                });
                if self.choice_kernel == ChoiceKernel::OneStep {
                    axes.push(ParamAxis {
                        name: "choice_kernel_weight",
                        values: linspace(0.0, 2.0, g),
                    });
                }
            }
            AgentFamily::LossCounting => {
                axes.push(ParamAxis {
                    name: "loss_count_threshold",
                    values: if self.win_stay_lose_switch {
                        vec![1.0]
                    } else {
                        vec![1.0, 2.0, 3.0, 4.0, 5.0]
                    },
                });
                axes.push(ParamAxis {
                    name: "epsilon",
                    values: linspace(0.02, 0.5, g),
                });
            }
        }
        axes
    }

    pub fn n_params(&self) -> usize {
        self.param_axes(1).len()
    }

    /// Per-trial probability of choosing side 1, given the observed history
    /// up to each trial. This is the model's one-step-ahead prediction; the
    /// state trajectory is driven by the animal's actual choices.
    pub fn predict_choice_probs(&self, trials: &FilteredTrials, params: &[f64]) -> Vec<f64> {
        match self.family {
            AgentFamily::QLearning => self.q_learning_probs(trials, params),
            AgentFamily::LossCounting => self.loss_counting_probs(trials, params),
        }
    }

    fn q_learning_probs(&self, trials: &FilteredTrials, params: &[f64]) -> Vec<f64> {
        let mut idx = 0;
        let mut next = || {
            let v = params.get(idx).copied().unwrap_or(0.0);
            idx += 1;
            v
        };
        let (lr_rew, lr_unrew) = if self.learning_rates == 2 {
            (next(), next())
        } else {
            let lr = next();
            (lr, lr)
        };
        let forget = if self.forget_rates == 1 { next() } else { 0.0 };
        let beta = next();
        let ck_weight = if self.choice_kernel == ChoiceKernel::OneStep {
            next()
        } else {
            0.0
        };

        let mut q = [0.0f64; 2];
        let mut ck = [0.0f64; 2];
        let mut probs = Vec::with_capacity(trials.len());
        for (choice, &rewarded) in trials.choices.iter().zip(&trials.rewards) {
            let logit = beta * (q[1] - q[0]) + ck_weight * (ck[1] - ck[0]);
            probs.push(1.0 / (1.0 + (-logit).exp()));

            let chosen = *choice as usize;
            let other = 1 - chosen;
            let reward = if rewarded { 1.0 } else { 0.0 };
            let lr = if rewarded { lr_rew } else { lr_unrew };
            q[chosen] += lr * (reward - q[chosen]);
            q[other] *= 1.0 - forget;
            if self.choice_kernel == ChoiceKernel::OneStep {
                ck[chosen] = 1.0;
                ck[other] = 0.0;
            }
        }
        probs
    }

    fn loss_counting_probs(&self, trials: &FilteredTrials, params: &[f64]) -> Vec<f64> {
        let threshold = params.first().copied().unwrap_or(1.0);
        let epsilon = params.get(1).copied().unwrap_or(0.1);

        let mut last: Option<usize> = None;
        let mut loss_count = 0usize;
        let mut probs = Vec::with_capacity(trials.len());
        for (choice, &rewarded) in trials.choices.iter().zip(&trials.rewards) {
            let p_right = match last {
                None => 0.5,
                Some(l) => {
                    let predicted = if loss_count as f64 >= threshold { 1 - l } else { l };
                    if predicted == 1 {
                        1.0 - epsilon / 2.0
                    } else {
                        epsilon / 2.0
                    }
                }
            };
            probs.push(p_right);

            let chosen = *choice as usize;
            if rewarded {
                loss_count = 0;
            } else if last == Some(chosen) {
                loss_count += 1;
            } else {
                loss_count = 1;
            }
            last = Some(chosen);
        }
        probs
    }
}

/// Summed negative log likelihood of the observed choices under the model's
/// predictions. `scored` restricts the sum to a subset of trials, which is
/// how cross-validation holds out blocks without breaking the state
/// trajectory.
pub fn negative_log_likelihood(
    probs: &[f64],
    choices: &[u8],
    scored: Option<&[bool]>,
) -> f64 {
    let mut nll = 0.0;
    for (t, (&p_right, &choice)) in probs.iter().zip(choices).enumerate() {
        if let Some(mask) = scored {
            if !mask[t] {
                continue;
            }
        }
        let p_right = p_right.clamp(1e-10, 1.0 - 1e-10);
        let p_choice = if choice == 1 { p_right } else { 1.0 - p_right };
        nll -= p_choice.ln();
    }
    nll
}

fn usize_kwarg(kwargs: &Value, key: &str, default: usize) -> Result<usize> {
    match kwargs.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|v| v as usize)
            .with_context(|| format!("{key} must be a non-negative integer, got {value}")),
    }
}
