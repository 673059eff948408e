use std::collections::HashSet;

use crate::aggregate::mean;
use crate::filter::WeekRange;
use crate::models::{
    ActivityByWeekRecord, Kpis, ModuleOutcomeRecord, Percentiles, StudentActivityRecord,
};

pub fn compute_kpis(
    cohort: &[StudentActivityRecord],
    weekly_activity: &[ActivityByWeekRecord],
    module_outcomes: &[ModuleOutcomeRecord],
) -> Kpis {
    compute_kpis_with(
        cohort,
        weekly_activity,
        module_outcomes,
        &WeekRange::EARLY_ENGAGEMENT,
    )
}

/// Top-line scalars for the dashboard header.
///
/// The average score includes withdrawn students; the engagement figure is
/// the mean weekly click sum inside `engagement_window`, independent of any
/// week filter the cohort was selected with.
pub fn compute_kpis_with(
    cohort: &[StudentActivityRecord],
    weekly_activity: &[ActivityByWeekRecord],
    module_outcomes: &[ModuleOutcomeRecord],
    engagement_window: &WeekRange,
) -> Kpis {
    let student_count = cohort
        .iter()
        .map(|s| s.id_student.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    let module_count = module_outcomes
        .iter()
        .map(|m| (m.code_module.as_str(), m.code_presentation.as_str()))
        .collect::<HashSet<_>>()
        .len() as u64;

    let (score_sum, scored) = cohort
        .iter()
        .filter_map(|s| s.score())
        .fold((0.0, 0u64), |(sum, n), score| (sum + score, n + 1));

    let early: Vec<&ActivityByWeekRecord> = weekly_activity
        .iter()
        .filter(|row| engagement_window.contains(row.week))
        .collect();
    let early_clicks: u64 = early.iter().map(|row| row.sum_clicks).sum();

    Kpis {
        student_count,
        module_count,
        average_score: mean(score_sum, scored),
        weekly_engagement: mean(early_clicks as f64, early.len() as u64),
    }
}

pub fn compute_percentiles(cohort: &[StudentActivityRecord]) -> Percentiles {
    let clicks: Vec<f64> = cohort.iter().map(|s| s.clicks_from_weeks() as f64).collect();
    let scores: Vec<f64> = cohort.iter().filter_map(|s| s.score()).collect();

    Percentiles {
        clicks_p90: quantile(clicks, 0.9),
        scores_p90: quantile(scores, 0.9),
    }
}

/// Linear-interpolation quantile; 0 for an empty sample.
pub fn quantile(mut values: Vec<f64>, p: f64) -> f64 {
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let p = p.clamp(0.0, 1.0);
    let position = (values.len() - 1) as f64 * p;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(values.len() - 1);
    let fraction = position - lower as f64;
    values[lower] + (values[upper] - values[lower]) * fraction
}
