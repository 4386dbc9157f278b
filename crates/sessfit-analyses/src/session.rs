use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// One recorded two-choice foraging session.
///
/// `choices` uses `null` for ignored trials (the animal did not respond) and
/// 0/1 for left/right. `rewards` is aligned trial for trial with `choices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub session_id: String,
    pub choices: Vec<Option<u8>>,
    pub rewards: Vec<bool>,
    #[serde(default)]
    pub p_reward: Vec<[f64; 2]>,
    #[serde(default)]
    pub baiting: bool,
}

/// Choice/reward history with ignored trials removed, which is what the
/// fitting kernels consume.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredTrials {
    pub choices: Vec<u8>,
    pub rewards: Vec<bool>,
}

impl FilteredTrials {
    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

impl SessionData {
    /// Loads and validates the session file named by `input_ref`.
    /// Synchronous, like everything else running on the blocking pool.
    pub fn load(data_root: &Path, input_ref: &str) -> Result<Self> {
        let path = data_root.join(input_ref);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read session file {}", path.display()))?;
        let mut session: SessionData = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse session file {}", path.display()))?;
        if session.session_id.is_empty() {
            session.session_id = Path::new(input_ref)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(input_ref)
                .to_string();
        }
        session.validate()?;
        Ok(session)
    }

    fn validate(&self) -> Result<()> {
        if self.choices.len() != self.rewards.len() {
            bail!(
                "session {}: {} choices but {} rewards",
                self.session_id,
                self.choices.len(),
                self.rewards.len()
            );
        }
        if !self.p_reward.is_empty() && self.p_reward.len() != self.choices.len() {
            bail!(
                "session {}: p_reward length {} does not match {} trials",
                self.session_id,
                self.p_reward.len(),
                self.choices.len()
            );
        }
        if let Some(bad) = self.choices.iter().flatten().find(|&&c| c > 1) {
            bail!("session {}: choice value {bad} out of range", self.session_id);
        }
        Ok(())
    }

    pub fn n_trials(&self) -> usize {
        self.choices.len()
    }

    /// Drops ignored trials, keeping choices and rewards aligned.
    pub fn filtered(&self) -> FilteredTrials {
        let mut choices = Vec::with_capacity(self.choices.len());
        let mut rewards = Vec::with_capacity(self.rewards.len());
        for (choice, &reward) in self.choices.iter().zip(&self.rewards) {
            if let Some(c) = choice {
                choices.push(*c);
                rewards.push(reward);
            }
        }
        FilteredTrials { choices, rewards }
    }
}
