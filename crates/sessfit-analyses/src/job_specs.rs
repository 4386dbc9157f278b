use serde_json::json;

use sessfit_core::job::AnalysisSpec;

/// The stock analysis specs seeded by `generate-jobs`: one Q-learning
/// forager and one loss-counting forager, both cross-validated with two
/// folds. Every session in a batch gets one job per spec.
pub fn stock_analysis_specs() -> Vec<AnalysisSpec> {
    let analysis_ver = format!("first version @ {}", env!("CARGO_PKG_VERSION"));
    vec![
        AnalysisSpec {
            analysis_name: "MLE fitting".to_string(),
            analysis_ver: Some(analysis_ver.clone()),
            analysis_libs_to_track_ver: vec!["sessfit-analyses".to_string()],
            analysis_args: json!({
                "agent_class": "ForagerQLearning",
                "agent_kwargs": {
                    "number_of_learning_rate": 1,
                    "number_of_forget_rate": 1,
                    "choice_kernel": "one_step",
                    "action_selection": "softmax",
                },
                "fit_kwargs": {
                    "k_fold_cross_validation": 2,
                },
            }),
        },
        AnalysisSpec {
            analysis_name: "MLE fitting".to_string(),
            analysis_ver: Some(analysis_ver),
            analysis_libs_to_track_ver: vec!["sessfit-analyses".to_string()],
            analysis_args: json!({
                "agent_class": "ForagerLossCounting",
                "agent_kwargs": {
                    "win_stay_lose_switch": true,
                    "choice_kernel": "none",
                },
                "fit_kwargs": {
                    "k_fold_cross_validation": 2,
                },
            }),
        },
    ]
}
