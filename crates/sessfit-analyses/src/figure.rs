use crate::engine::FittedModel;
use crate::session::FilteredTrials;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 320.0;
const MARGIN: f64 = 40.0;

/// Renders the fitted-session figure as a standalone SVG: the animal's
/// smoothed choice trace against the model's predicted choice probability.
pub fn render_fitted_session(
    session_id: &str,
    trials: &FilteredTrials,
    model: &FittedModel,
) -> Vec<u8> {
    let n = trials.len();
    let smoothed = moving_average(&trials.choices, 10);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    ));
    svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);

    svg.push_str(&format!(
        r#"<text x="{MARGIN}" y="22" font-family="sans-serif" font-size="14">{} | {} | LL = {:.2} | accuracy = {:.1}%</text>"#,
        xml_escape(session_id),
        xml_escape(&model.agent_class),
        model.log_likelihood,
        model.prediction_accuracy * 100.0
    ));

    // Axis frame and the p = 0.5 guide line.
    svg.push_str(&format!(
        r##"<rect x="{MARGIN}" y="{MARGIN}" width="{}" height="{}" fill="none" stroke="#999"/>"##,
        WIDTH - 2.0 * MARGIN,
        HEIGHT - 2.0 * MARGIN
    ));
    let mid_y = y_for(0.5);
    svg.push_str(&format!(
        r##"<line x1="{MARGIN}" y1="{mid_y}" x2="{}" y2="{mid_y}" stroke="#ccc" stroke-dasharray="4 4"/>"##,
        WIDTH - MARGIN
    ));

    svg.push_str(&polyline(&smoothed, n, "#4682b4", 1.5));
    svg.push_str(&polyline(&model.predicted_choice_prob, n, "#ff8c00", 1.5));

    svg.push_str(&format!(
        r##"<text x="{}" y="22" font-family="sans-serif" font-size="12" fill="#4682b4">choice (smoothed)</text>"##,
        WIDTH - 320.0
    ));
    svg.push_str(&format!(
        r##"<text x="{}" y="22" font-family="sans-serif" font-size="12" fill="#ff8c00">model p(right)</text>"##,
        WIDTH - 160.0
    ));
    svg.push_str("</svg>");
    svg.into_bytes()
}

fn y_for(p: f64) -> f64 {
    MARGIN + (1.0 - p.clamp(0.0, 1.0)) * (HEIGHT - 2.0 * MARGIN)
}

fn x_for(i: usize, n: usize) -> f64 {
    let span = (n.saturating_sub(1)).max(1) as f64;
    MARGIN + i as f64 / span * (WIDTH - 2.0 * MARGIN)
}

fn polyline(values: &[f64], n: usize, color: &str, width: f64) -> String {
    let points: Vec<String> = values
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, &p)| format!("{:.1},{:.1}", x_for(i, n), y_for(p)))
        .collect();
    format!(
        r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="{width}"/>"#,
        points.join(" ")
    )
}

fn moving_average(choices: &[u8], window: usize) -> Vec<f64> {
    let window = window.max(1);
    choices
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let lo = i.saturating_sub(window - 1);
            let slice = &choices[lo..=i];
            slice.iter().map(|&c| c as f64).sum::<f64>() / slice.len() as f64
        })
        .collect()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;

    fn tiny_model(n: usize) -> FittedModel {
        FittedModel {
            agent_class: "ForagerQLearning".to_string(),
            params: IndexMap::new(),
            log_likelihood: -12.3,
            aic: 28.6,
            bic: 30.1,
            lpt: 0.6,
            prediction_accuracy: 0.75,
            n_trials: n,
            n_params: 2,
            predicted_choice_prob: vec![0.5; n],
            cross_validation: None,
        }
    }

    #[test]
    fn test_svg_contains_both_traces_and_title() {
        let trials = FilteredTrials {
            choices: vec![0, 1, 1, 0, 1],
            rewards: vec![false, true, true, false, true],
        };
        let svg = String::from_utf8(render_fitted_session("713377_2024-07-30", &trials, &tiny_model(5)))
            .expect("utf8");
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains("713377_2024-07-30"));
        assert!(svg.contains("ForagerQLearning"));
    }

    #[test]
    fn test_single_trial_does_not_divide_by_zero() {
        let trials = FilteredTrials { choices: vec![1], rewards: vec![true] };
        let svg = String::from_utf8(render_fitted_session("s", &trials, &tiny_model(1))).expect("utf8");
        assert!(!svg.contains("NaN"));
        assert!(!svg.contains("inf"));
    }

    #[test]
    fn test_moving_average_tracks_recent_choices() {
        let avg = moving_average(&[0, 0, 1, 1], 2);
        assert_eq!(avg, vec![0.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_escapes_markup_in_session_ids() {
        let trials = FilteredTrials { choices: vec![1], rewards: vec![true] };
        let svg = String::from_utf8(render_fitted_session("a<b&c", &trials, &tiny_model(1))).expect("utf8");
        assert!(svg.contains("a&lt;b&amp;c"));
    }
}
