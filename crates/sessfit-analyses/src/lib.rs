//! Model-fitting analyses for recorded foraging sessions.
//!
//! The crate supplies the [`sessfit_core::Analysis`] implementations the
//! scheduler dispatches, the agent likelihood models behind them, and the
//! stock specs used to seed job batches.

pub mod agents;
pub mod engine;
pub mod figure;
pub mod job_specs;
pub mod mle_fitting;
pub mod session;

use std::sync::Arc;

use sessfit_core::analysis::AnalysisRegistry;

pub use agents::AgentSpec;
pub use engine::{FitEngine, FitOptions, FittedModel, GridSearchEngine};
pub use mle_fitting::MleFitting;
pub use session::SessionData;

/// Registry with every analysis this crate ships.
pub fn default_registry() -> AnalysisRegistry {
    let mut registry = AnalysisRegistry::new();
    registry.register(Arc::new(MleFitting::default()));
    registry
}
