//! Short narrative summaries for each aggregate.
//!
//! Every function is deterministic and total: empty input yields a fixed
//! fallback sentence, and numbers go through [`crate::format`] so no `NaN`
//! or `inf` can reach the text.

use serde::Serialize;

use crate::format::{format_count, format_number, format_percent, ratio};
use crate::models::{
    ActivityByWeekRecord, GradeDistributionRecord, Kpis, ModuleOutcomeRecord,
    OutcomeByDemographicRecord, RegionChoroplethRecord, StudentActivityRecord,
};
use crate::risk::{find_at_risk, AT_RISK_SCORE};

pub const EMPTY_MODULE_INSIGHT: &str =
    "No module results match the current filters. Widen the module or presentation selection to compare pass rates.";
pub const EMPTY_ACTIVITY_INSIGHT: &str =
    "No click activity matches the current filters. Widen the week range or module selection to see engagement trends.";
pub const EMPTY_GRADE_INSIGHT: &str =
    "No scored students match the current filters, so the grade distribution cannot be drawn.";
pub const EMPTY_DEMOGRAPHIC_INSIGHT: &str =
    "No demographic outcomes match the current filters. Re-enable some dimensions to see demographic patterns.";
pub const EMPTY_REGION_INSIGHT: &str =
    "No regions match the current filters. Try another module or presentation to see the geographic spread.";
pub const EMPTY_ENGAGEMENT_INSIGHT: &str = "No students match the current filters.";

/// Share of recognized outcomes that ended in a pass or distinction.
fn success_rate(pass: u64, distinction: u64, total: u64) -> f64 {
    ratio(pass + distinction, total)
}

pub fn craft_module_insight(rows: &[ModuleOutcomeRecord]) -> String {
    let mut best: Option<(&ModuleOutcomeRecord, f64)> = None;
    for row in rows {
        let rate = success_rate(row.pass, row.distinction, row.total());
        if best.map_or(true, |(_, top)| rate > top) {
            best = Some((row, rate));
        }
    }

    let Some((top, rate)) = best else {
        return EMPTY_MODULE_INSIGHT.to_string();
    };

    let students: u64 = rows.iter().map(ModuleOutcomeRecord::total).sum();
    format!(
        "Across {} module presentations and {} graded enrollments, {} {} has the highest pass rate at {} ({} of {} passed or earned a distinction).",
        format_count(rows.len() as u64),
        format_count(students),
        top.code_module,
        top.code_presentation,
        format_percent(rate),
        format_count(top.pass + top.distinction),
        format_count(top.total()),
    )
}

pub fn craft_activity_insight(rows: &[ActivityByWeekRecord]) -> String {
    let Some(first) = rows.first() else {
        return EMPTY_ACTIVITY_INSIGHT.to_string();
    };

    let mut busiest = first;
    for row in rows {
        if row.sum_clicks > busiest.sum_clicks {
            busiest = row;
        }
    }
    let total: u64 = rows.iter().map(|row| row.sum_clicks).sum();

    format!(
        "{} clicks were logged across {} active weeks. Week {} was the busiest with {} clicks from {} students ({} of all activity).",
        format_count(total),
        format_count(rows.len() as u64),
        busiest.week,
        format_count(busiest.sum_clicks),
        format_count(busiest.students_count),
        format_percent(ratio(busiest.sum_clicks, total)),
    )
}

pub fn craft_grade_insight(rows: &[GradeDistributionRecord]) -> String {
    let Some(first) = rows.first() else {
        return EMPTY_GRADE_INSIGHT.to_string();
    };

    let mut dominant = first;
    for row in rows {
        if row.students > dominant.students {
            dominant = row;
        }
    }
    let total: u64 = rows.iter().map(|row| row.students).sum();

    format!(
        "Most scored students fall in the band starting at {}: {} of {} students ({}).",
        dominant.band,
        format_count(dominant.students),
        format_count(total),
        format_percent(ratio(dominant.students, total)),
    )
}

pub fn craft_demographic_insight(rows: &[OutcomeByDemographicRecord]) -> String {
    let mut strongest: Option<(&OutcomeByDemographicRecord, f64)> = None;
    let mut weakest: Option<(&OutcomeByDemographicRecord, f64)> = None;

    for row in rows.iter().filter(|row| row.total() > 0) {
        let rate = success_rate(row.pass, row.distinction, row.total());
        if strongest.map_or(true, |(_, top)| rate > top) {
            strongest = Some((row, rate));
        }
        if weakest.map_or(true, |(_, low)| rate < low) {
            weakest = Some((row, rate));
        }
    }

    match (strongest, weakest) {
        (Some((best, best_rate)), Some((worst, worst_rate))) => format!(
            "{} ({}) has the strongest pass rate at {}, while {} ({}) has the weakest at {} and may benefit from targeted support.",
            best.category,
            best.demographic,
            format_percent(best_rate),
            worst.category,
            worst.demographic,
            format_percent(worst_rate),
        ),
        _ => EMPTY_DEMOGRAPHIC_INSIGHT.to_string(),
    }
}

pub fn craft_region_insight(rows: &[RegionChoroplethRecord]) -> String {
    let Some(first) = rows.first() else {
        return EMPTY_REGION_INSIGHT.to_string();
    };

    let top = rows.iter().fold(first, |prev, row| {
        if row.average_score > prev.average_score {
            row
        } else {
            prev
        }
    });
    let students: u64 = rows.iter().map(|row| row.students).sum();

    format!(
        "{} has the highest average score at {} across {} students. The map covers {} regions and {} students in total.",
        top.region,
        format_number(top.average_score),
        format_count(top.students),
        format_count(rows.len() as u64),
        format_count(students),
    )
}

pub fn craft_engagement_insight(cohort: &[StudentActivityRecord]) -> String {
    if cohort.is_empty() {
        return EMPTY_ENGAGEMENT_INSIGHT.to_string();
    }

    let clicks: u64 = cohort.iter().map(|s| s.clicks_from_weeks()).sum();
    let (score_sum, scored) = cohort
        .iter()
        .filter_map(|s| s.score())
        .fold((0.0, 0u64), |(sum, n), score| (sum + score, n + 1));
    let avg_score = if scored == 0 { 0.0 } else { score_sum / scored as f64 };
    let at_risk = find_at_risk(cohort).len() as u64;

    format!(
        "Students average {} clicks and a final score of {}. {} students score below {} with below-average activity and are candidates for early intervention.",
        format_number(ratio(clicks, cohort.len() as u64)),
        format_number(avg_score),
        format_count(at_risk),
        format_number(AT_RISK_SCORE),
    )
}

pub fn build_kpi_narrative(kpis: &Kpis) -> Vec<String> {
    vec![
        format!(
            "The current selection covers {} students across {} module presentations.",
            format_count(kpis.student_count),
            format_count(kpis.module_count),
        ),
        format!(
            "The average final score is {}.",
            format_number(kpis.average_score)
        ),
        format!(
            "Students logged {} clicks per week over the first weeks of the course.",
            format_number(kpis.weekly_engagement)
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub overview: Vec<String>,
    pub modules: String,
    pub activity: String,
    pub grades: String,
    pub demographics: String,
    pub regions: String,
    pub engagement: String,
}

impl Insights {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.overview.iter().map(String::as_str).chain([
            self.modules.as_str(),
            self.activity.as_str(),
            self.grades.as_str(),
            self.demographics.as_str(),
            self.regions.as_str(),
            self.engagement.as_str(),
        ])
    }
}
