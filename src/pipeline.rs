//! The one canonical pipeline: select the cohort, then derive everything from it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::aggregate::{
    aggregate_activity_by_week, aggregate_grade_distribution_with, aggregate_module_outcome,
    aggregate_outcome_by_demographic, aggregate_region,
};
use crate::cohort::select_cohort;
use crate::config::AnalyticsConfig;
use crate::filter::FilterState;
use crate::insight::{
    build_kpi_narrative, craft_activity_insight, craft_demographic_insight,
    craft_engagement_insight, craft_grade_insight, craft_module_insight, craft_region_insight,
    Insights,
};
use crate::kpi::{compute_kpis_with, compute_percentiles};
use crate::models::{
    ActivityByWeekRecord, AtRiskStudent, GradeDistributionRecord, Kpis, ModuleOutcomeRecord,
    OutcomeByDemographicRecord, Percentiles, RegionChoroplethRecord, StudentActivityRecord,
};
use crate::risk::find_at_risk;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub filters: FilterState,
    #[serde(skip)]
    pub cohort: Vec<StudentActivityRecord>,
    pub module_outcome: Vec<ModuleOutcomeRecord>,
    pub activity_by_week: Vec<ActivityByWeekRecord>,
    pub grade_distribution: Vec<GradeDistributionRecord>,
    pub region_choropleth: Vec<RegionChoroplethRecord>,
    pub outcome_by_demographic: Vec<OutcomeByDemographicRecord>,
    pub kpis: Kpis,
    pub percentiles: Percentiles,
    pub at_risk: Vec<AtRiskStudent>,
    pub insights: Insights,
}

impl DashboardSnapshot {
    pub fn compute(
        students: &[StudentActivityRecord],
        filters: &FilterState,
        config: &AnalyticsConfig,
    ) -> Self {
        let cohort = select_cohort(students, filters);

        let module_outcome = aggregate_module_outcome(&cohort);
        let activity_by_week = aggregate_activity_by_week(&cohort);
        let grade_distribution = aggregate_grade_distribution_with(&cohort, config);
        let region_choropleth = aggregate_region(&cohort);
        let outcome_by_demographic = aggregate_outcome_by_demographic(&cohort);

        let kpis = compute_kpis_with(
            &cohort,
            &activity_by_week,
            &module_outcome,
            &config.engagement_window,
        );
        let percentiles = compute_percentiles(&cohort);
        let at_risk = find_at_risk(&cohort);

        let insights = Insights {
            overview: build_kpi_narrative(&kpis),
            modules: craft_module_insight(&module_outcome),
            activity: craft_activity_insight(&activity_by_week),
            grades: craft_grade_insight(&grade_distribution),
            demographics: craft_demographic_insight(&outcome_by_demographic),
            regions: craft_region_insight(&region_choropleth),
            engagement: craft_engagement_insight(&cohort),
        };

        Self {
            filters: filters.clone(),
            cohort,
            module_outcome,
            activity_by_week,
            grade_distribution,
            region_choropleth,
            outcome_by_demographic,
            kpis,
            percentiles,
            at_risk,
            insights,
        }
    }
}

/// Holds the session's immutable record set and memoizes the last snapshot.
pub struct Dashboard {
    records: Arc<[StudentActivityRecord]>,
    version: u64,
    config: AnalyticsConfig,
    last: Option<(u64, Arc<DashboardSnapshot>)>,
}

impl Dashboard {
    pub fn new(records: Vec<StudentActivityRecord>, config: AnalyticsConfig) -> Self {
        Self {
            records: records.into(),
            version: 1,
            config,
            last: None,
        }
    }

    pub fn records(&self) -> &[StudentActivityRecord] {
        &self.records
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn replace_records(&mut self, records: Vec<StudentActivityRecord>) {
        self.records = records.into();
        self.version += 1;
        self.last = None;
    }

    fn cache_key(&self, filters: &FilterState) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.version.hash(&mut hasher);
        self.config.hash(&mut hasher);
        filters.hash(&mut hasher);
        hasher.finish()
    }

    pub fn snapshot(&mut self, filters: &FilterState) -> Arc<DashboardSnapshot> {
        let key = self.cache_key(filters);
        if let Some((cached_key, snapshot)) = &self.last {
            if *cached_key == key && snapshot.filters == *filters {
                tracing::debug!(version = self.version, "reusing cached dashboard snapshot");
                return Arc::clone(snapshot);
            }
        }

        let started = Instant::now();
        let snapshot = Arc::new(DashboardSnapshot::compute(
            &self.records,
            filters,
            &self.config,
        ));
        tracing::debug!(
            version = self.version,
            records = self.records.len(),
            cohort = snapshot.cohort.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "computed dashboard snapshot"
        );

        self.last = Some((key, Arc::clone(&snapshot)));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterDimension;
    use crate::models::{Outcome, WeekActivity};

    fn records() -> Vec<StudentActivityRecord> {
        ["AAA", "BBB"]
            .iter()
            .enumerate()
            .map(|(i, module)| StudentActivityRecord {
                id_student: format!("{}", 100 + i),
                code_module: module.to_string(),
                code_presentation: "2013J".to_string(),
                outcome: Outcome::Pass,
                total_clicks: 12,
                final_score: 65.0,
                gender: "F".to_string(),
                region: "Wales".to_string(),
                age_band: "0-35".to_string(),
                highest_education: "HE Qualification".to_string(),
                disability: "N".to_string(),
                weeks: vec![WeekActivity {
                    week: 2,
                    clicks: 12,
                }],
            })
            .collect()
    }

    #[test]
    fn equal_filters_reuse_the_snapshot() {
        let mut dashboard = Dashboard::new(records(), AnalyticsConfig::default());
        let filters = FilterState::default().with(FilterDimension::Module, ["AAA"]);
        let first = dashboard.snapshot(&filters);
        let second = dashboard.snapshot(&filters.clone());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.cohort.len(), 1);
    }

    #[test]
    fn replacing_records_invalidates_the_cache() {
        let mut dashboard = Dashboard::new(records(), AnalyticsConfig::default());
        let filters = FilterState::default();
        let first = dashboard.snapshot(&filters);
        assert_eq!(first.kpis.student_count, 2);

        dashboard.replace_records(records().into_iter().take(1).collect());
        let second = dashboard.snapshot(&filters);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(dashboard.version(), 2);
        assert_eq!(second.kpis.student_count, 1);
    }

    #[test]
    fn snapshot_aggregates_share_the_cohort() {
        let mut dashboard = Dashboard::new(records(), AnalyticsConfig::default());
        let filters = FilterState::default().with(FilterDimension::Module, ["BBB"]);
        let snapshot = dashboard.snapshot(&filters);
        assert_eq!(snapshot.module_outcome.len(), 1);
        assert_eq!(snapshot.module_outcome[0].code_module, "BBB");
        assert_eq!(snapshot.region_choropleth[0].students, 1);
        assert_eq!(snapshot.activity_by_week[0].sum_clicks, 12);
        assert_eq!(snapshot.kpis.module_count, 1);
    }
}
