//! Chart-ready reducers over an already selected cohort.
//!
//! Each function is a pure, single pass over the cohort. None of them filters
//! records; that is the cohort selector's job.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::AnalyticsConfig;
use crate::models::{
    ActivityByWeekRecord, Demographic, GradeDistributionRecord, ModuleOutcomeRecord, Outcome,
    OutcomeByDemographicRecord, RegionChoroplethRecord, StudentActivityRecord, ALL_SCOPE,
};

#[derive(Debug, Default, Clone, Copy)]
struct OutcomeTally {
    pass: u64,
    fail: u64,
    withdrawn: u64,
    distinction: u64,
}

impl OutcomeTally {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pass => self.pass += 1,
            Outcome::Fail => self.fail += 1,
            Outcome::Withdrawn => self.withdrawn += 1,
            Outcome::Distinction => self.distinction += 1,
            Outcome::Unknown => {}
        }
    }
}

#[derive(Debug, Default)]
struct WeekTally<'a> {
    clicks: u64,
    score_sum: f64,
    scored: u64,
    students: HashSet<&'a str>,
}

impl<'a> WeekTally<'a> {
    fn add(&mut self, student: &'a StudentActivityRecord, clicks: u64) {
        self.clicks += clicks;
        // A student's score counts once per week no matter how many entries they logged.
        if self.students.insert(student.id_student.as_str()) {
            if let Some(score) = student.score() {
                self.score_sum += score;
                self.scored += 1;
            }
        }
    }

    fn into_record(
        self,
        code_module: &str,
        code_presentation: &str,
        week: i32,
    ) -> ActivityByWeekRecord {
        ActivityByWeekRecord {
            code_module: code_module.to_string(),
            code_presentation: code_presentation.to_string(),
            week,
            sum_clicks: self.clicks,
            students_count: self.students.len() as u64,
            avg_final_score: mean(self.score_sum, self.scored),
        }
    }
}

pub(crate) fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let value = sum / count as f64;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn aggregate_module_outcome(cohort: &[StudentActivityRecord]) -> Vec<ModuleOutcomeRecord> {
    let mut map: HashMap<(&str, &str), OutcomeTally> = HashMap::new();

    for student in cohort {
        let module = student.code_module.as_str();
        let presentation = student.code_presentation.as_str();
        map.entry((module, presentation))
            .or_default()
            .record(student.outcome);
    }

    let mut rows: Vec<ModuleOutcomeRecord> = map
        .into_iter()
        .map(|((code_module, code_presentation), tally)| ModuleOutcomeRecord {
            code_module: code_module.to_string(),
            code_presentation: code_presentation.to_string(),
            pass: tally.pass,
            fail: tally.fail,
            withdrawn: tally.withdrawn,
            distinction: tally.distinction,
        })
        .collect();

    rows.sort_by(|a, b| {
        a.code_module
            .cmp(&b.code_module)
            .then_with(|| a.code_presentation.cmp(&b.code_presentation))
    });
    rows
}

/// Weekly click totals across the whole cohort, one row per week, ascending.
///
/// Rows carry [`ALL_SCOPE`] as their module and presentation.
pub fn aggregate_activity_by_week(cohort: &[StudentActivityRecord]) -> Vec<ActivityByWeekRecord> {
    let mut weeks: BTreeMap<i32, WeekTally<'_>> = BTreeMap::new();

    for student in cohort {
        for entry in &student.weeks {
            weeks
                .entry(entry.week)
                .or_default()
                .add(student, entry.clicks);
        }
    }

    weeks
        .into_iter()
        .map(|(week, tally)| tally.into_record(ALL_SCOPE, ALL_SCOPE, week))
        .collect()
}

/// Weekly click totals per module presentation, sorted by module, presentation, week.
pub fn aggregate_activity_by_module_week(
    cohort: &[StudentActivityRecord],
) -> Vec<ActivityByWeekRecord> {
    let mut weeks: BTreeMap<(&str, &str, i32), WeekTally<'_>> = BTreeMap::new();

    for student in cohort {
        for entry in &student.weeks {
            weeks
                .entry((
                    student.code_module.as_str(),
                    student.code_presentation.as_str(),
                    entry.week,
                ))
                .or_default()
                .add(student, entry.clicks);
        }
    }

    weeks
        .into_iter()
        .map(|((code_module, code_presentation, week), tally)| {
            tally.into_record(code_module, code_presentation, week)
        })
        .collect()
}

pub fn aggregate_grade_distribution(
    cohort: &[StudentActivityRecord],
) -> Vec<GradeDistributionRecord> {
    aggregate_grade_distribution_with(cohort, &AnalyticsConfig::default())
}

pub fn aggregate_grade_distribution_with(
    cohort: &[StudentActivityRecord],
    config: &AnalyticsConfig,
) -> Vec<GradeDistributionRecord> {
    let mut bands: BTreeMap<u32, u64> = BTreeMap::new();

    for student in cohort {
        if student.is_withdrawn() && !config.include_withdrawn_in_grades {
            continue;
        }
        let Some(score) = student.score() else {
            continue;
        };
        *bands.entry(config.band_width.band_of(score)).or_insert(0) += 1;
    }

    bands
        .into_iter()
        .map(|(band, students)| GradeDistributionRecord {
            code_module: ALL_SCOPE.to_string(),
            code_presentation: ALL_SCOPE.to_string(),
            band,
            students,
        })
        .collect()
}

/// Per-region headcount and average score.
///
/// `students` counts every member; `average_score` only averages members who
/// did not withdraw.
pub fn aggregate_region(cohort: &[StudentActivityRecord]) -> Vec<RegionChoroplethRecord> {
    let mut map: HashMap<&str, (u64, f64, u64)> = HashMap::new();

    for student in cohort {
        let entry = map
            .entry(student.category(Demographic::Region))
            .or_insert((0, 0.0, 0));
        entry.0 += 1;
        if student.is_withdrawn() {
            continue;
        }
        if let Some(score) = student.score() {
            entry.1 += score;
            entry.2 += 1;
        }
    }

    let mut rows: Vec<RegionChoroplethRecord> = map
        .into_iter()
        .map(|(region, (students, score_sum, scored))| RegionChoroplethRecord {
            region: region.to_string(),
            students,
            average_score: mean(score_sum, scored),
        })
        .collect();

    rows.sort_by(|a, b| a.region.cmp(&b.region));
    rows
}

pub fn aggregate_outcome_by_demographic(
    cohort: &[StudentActivityRecord],
) -> Vec<OutcomeByDemographicRecord> {
    let mut rows = Vec::new();

    for dimension in Demographic::ALL {
        let mut categories: BTreeMap<&str, OutcomeTally> = BTreeMap::new();
        for student in cohort {
            categories
                .entry(student.category(dimension))
                .or_default()
                .record(student.outcome);
        }

        rows.extend(
            categories
                .into_iter()
                .map(|(category, tally)| OutcomeByDemographicRecord {
                    demographic: dimension.as_str().to_string(),
                    category: category.to_string(),
                    pass: tally.pass,
                    fail: tally.fail,
                    withdrawn: tally.withdrawn,
                    distinction: tally.distinction,
                }),
        );
    }

    rows
}
