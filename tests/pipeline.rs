use cohort_analytics::aggregate::{
    aggregate_activity_by_week, aggregate_grade_distribution, aggregate_module_outcome,
    aggregate_outcome_by_demographic, aggregate_region,
};
use cohort_analytics::cohort::select_cohort;
use cohort_analytics::kpi::{compute_kpis, compute_percentiles};
use cohort_analytics::models::{Demographic, ModuleOutcomeRecord};
use cohort_analytics::{
    AnalyticsConfig, DashboardSnapshot, FilterDimension, FilterState, Outcome,
    StudentActivityRecord, WeekActivity, WeekRange,
};

fn student(
    id: &str,
    module: &str,
    outcome: Outcome,
    final_score: f64,
    region: &str,
    weeks: &[(i32, u64)],
) -> StudentActivityRecord {
    let weeks: Vec<WeekActivity> = weeks
        .iter()
        .map(|&(week, clicks)| WeekActivity { week, clicks })
        .collect();
    StudentActivityRecord {
        id_student: id.to_string(),
        code_module: module.to_string(),
        code_presentation: "P1".to_string(),
        outcome,
        total_clicks: weeks.iter().map(|w| w.clicks).sum(),
        final_score,
        gender: "F".to_string(),
        region: region.to_string(),
        age_band: "0-35".to_string(),
        highest_education: "A Level or Equivalent".to_string(),
        disability: "N".to_string(),
        weeks,
    }
}

fn three_students() -> Vec<StudentActivityRecord> {
    vec![
        student("A", "M1", Outcome::Pass, 82.0, "X", &[(0, 10), (1, 20)]),
        student("B", "M1", Outcome::Fail, 30.0, "X", &[(0, 5)]),
        student("C", "M1", Outcome::Withdrawn, 0.0, "Y", &[]),
    ]
}

fn mixed_population() -> Vec<StudentActivityRecord> {
    let mut students = three_students();
    let mut d = student(
        "D",
        "M2",
        Outcome::Distinction,
        95.0,
        "Z",
        &[(3, 40), (3, 2)],
    );
    d.gender = "M".to_string();
    d.disability = String::new();
    let mut e = student("A", "M2", Outcome::Unknown, 55.0, "", &[(-1, 7)]);
    e.age_band = "35-55".to_string();
    students.push(d);
    students.push(e);
    students
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn scenario_module_outcome() {
    let rows = aggregate_module_outcome(&three_students());
    assert_eq!(
        rows,
        vec![ModuleOutcomeRecord {
            code_module: "M1".to_string(),
            code_presentation: "P1".to_string(),
            pass: 1,
            fail: 1,
            withdrawn: 1,
            distinction: 0,
        }]
    );
}

#[test]
fn scenario_weekly_activity() {
    let rows = aggregate_activity_by_week(&three_students());
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].week, 0);
    assert_eq!(rows[0].sum_clicks, 15);
    assert_eq!(rows[0].students_count, 2);
    assert_close(rows[0].avg_final_score, 56.0);

    assert_eq!(rows[1].week, 1);
    assert_eq!(rows[1].sum_clicks, 20);
    assert_eq!(rows[1].students_count, 1);
    assert_close(rows[1].avg_final_score, 82.0);
}

#[test]
fn scenario_regions() {
    let rows = aggregate_region(&three_students());
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].region, "X");
    assert_eq!(rows[0].students, 2);
    assert_close(rows[0].average_score, 56.0);

    assert_eq!(rows[1].region, "Y");
    assert_eq!(rows[1].students, 1);
    assert_close(rows[1].average_score, 0.0);
}

#[test]
fn scenario_kpis() {
    let cohort = three_students();
    let weekly = aggregate_activity_by_week(&cohort);
    let modules = aggregate_module_outcome(&cohort);
    let kpis = compute_kpis(&cohort, &weekly, &modules);

    assert_eq!(kpis.student_count, 3);
    assert_eq!(kpis.module_count, 1);
    assert_close(kpis.average_score, 112.0 / 3.0);
    assert_close(kpis.weekly_engagement, 17.5);
}

#[test]
fn week_range_keeps_students_active_in_range() {
    let filters = FilterState::default().with_week_range(WeekRange::new(1, 1).unwrap());
    let cohort = select_cohort(&three_students(), &filters);
    let ids: Vec<&str> = cohort.iter().map(|s| s.id_student.as_str()).collect();
    assert_eq!(ids, vec!["A"]);
}

#[test]
fn empty_filter_is_identity() {
    let all = mixed_population();
    assert_eq!(select_cohort(&all, &FilterState::default()), all);
}

#[test]
fn filters_only_narrow() {
    let all = mixed_population();
    let unfiltered = select_cohort(&all, &FilterState::default()).len();

    for dimension in FilterDimension::ALL {
        let one = FilterState::default().with(dimension, ["X"]);
        let narrowed = select_cohort(&all, &one).len();
        assert!(narrowed <= unfiltered);
    }

    let base = FilterState::default().with(FilterDimension::Region, ["X"]);
    let narrowed = FilterState::default()
        .with(FilterDimension::Region, ["X"])
        .with(FilterDimension::Module, ["M2"]);
    let both = select_cohort(&all, &narrowed).len();
    assert!(both <= select_cohort(&all, &base).len());
}

#[test]
fn outcome_counts_never_exceed_cohort() {
    let three = three_students();
    let total: u64 = aggregate_module_outcome(&three)
        .iter()
        .map(ModuleOutcomeRecord::total)
        .sum();
    assert_eq!(total, three.len() as u64);

    let mixed = mixed_population();
    let total: u64 = aggregate_module_outcome(&mixed)
        .iter()
        .map(ModuleOutcomeRecord::total)
        .sum();
    assert_eq!(total, mixed.len() as u64 - 1);
}

#[test]
fn empty_cohort_is_finite_everywhere() {
    let snapshot = DashboardSnapshot::compute(
        &mixed_population(),
        &FilterState::default().with(FilterDimension::Module, ["nope"]),
        &AnalyticsConfig::default(),
    );

    assert!(snapshot.cohort.is_empty());
    assert!(snapshot.module_outcome.is_empty());
    assert!(snapshot.activity_by_week.is_empty());
    assert!(snapshot.grade_distribution.is_empty());
    assert!(snapshot.region_choropleth.is_empty());
    assert!(snapshot.outcome_by_demographic.is_empty());
    assert_eq!(snapshot.kpis.student_count, 0);
    assert_eq!(snapshot.kpis.average_score, 0.0);
    assert_eq!(snapshot.kpis.weekly_engagement, 0.0);

    for text in snapshot.insights.iter() {
        assert!(!text.is_empty());
        assert!(!text.contains("NaN"), "{text}");
        let infinite = text.split_whitespace().any(|word| {
            word.starts_with("inf") && !word.chars().nth(3).is_some_and(char::is_alphabetic)
        });
        assert!(!infinite, "{text}");
        assert!(!text.contains("undefined"), "{text}");
    }
}

#[test]
fn populated_cohort_is_finite_everywhere() {
    let cohort = mixed_population();
    for row in aggregate_activity_by_week(&cohort) {
        assert!(row.avg_final_score.is_finite());
    }
    for row in aggregate_region(&cohort) {
        assert!(row.average_score.is_finite());
    }
    let percentiles = compute_percentiles(&cohort);
    assert!(percentiles.clicks_p90.is_finite());
    assert!(percentiles.scores_p90.is_finite());
}

#[test]
fn every_observed_dimension_is_reported() {
    let rows = aggregate_outcome_by_demographic(&mixed_population());
    for dimension in Demographic::ALL {
        assert!(
            rows.iter().any(|row| row.demographic == dimension.as_str()),
            "missing {dimension}"
        );
    }
    assert!(rows
        .iter()
        .any(|row| row.demographic == "disability" && row.category == "Unknown"));
}

#[test]
fn unknown_outcomes_add_nothing_to_demographic_counts() {
    let rows = aggregate_outcome_by_demographic(&mixed_population());
    let row = |demographic: &str, category: &str| {
        rows.iter()
            .find(|row| row.demographic == demographic && row.category == category)
            .unwrap_or_else(|| panic!("missing {demographic}/{category}"))
    };

    // Only student E (outcome Unknown) sits in these categories.
    for (demographic, category) in [("age_band", "35-55"), ("region", "Unknown")] {
        let only_unknown = row(demographic, category);
        assert_eq!(only_unknown.pass, 0);
        assert_eq!(only_unknown.fail, 0);
        assert_eq!(only_unknown.withdrawn, 0);
        assert_eq!(only_unknown.distinction, 0);
    }

    let younger = row("age_band", "0-35");
    assert_eq!(younger.pass + younger.distinction, 2);
    assert_eq!(younger.fail + younger.withdrawn, 2);
    for dimension in Demographic::ALL {
        let counted: u64 = rows
            .iter()
            .filter(|row| row.demographic == dimension.as_str())
            .map(|row| row.pass + row.fail + row.withdrawn + row.distinction)
            .sum();
        assert_eq!(counted, 4, "{dimension}");
    }
}

#[test]
fn student_in_two_modules_counts_once_in_kpis() {
    let cohort = vec![
        student("S", "M1", Outcome::Pass, 70.0, "X", &[(0, 1)]),
        student("S", "M2", Outcome::Fail, 20.0, "X", &[(0, 1)]),
    ];
    let weekly = aggregate_activity_by_week(&cohort);
    let modules = aggregate_module_outcome(&cohort);
    let kpis = compute_kpis(&cohort, &weekly, &modules);

    assert_eq!(kpis.student_count, 1);
    assert_eq!(kpis.module_count, 2);
    assert_eq!(modules[0].pass, 1);
    assert_eq!(modules[1].fail, 1);
    assert_eq!(weekly[0].students_count, 1);
}

#[test]
fn grade_distribution_ignores_withdrawn_zeroes() {
    let rows = aggregate_grade_distribution(&three_students());
    let bands: Vec<(u32, u64)> = rows.iter().map(|row| (row.band, row.students)).collect();
    assert_eq!(bands, vec![(30, 1), (80, 1)]);
}
