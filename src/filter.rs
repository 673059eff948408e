//! Filter predicate engine.
//!
//! Categorical dimensions combine as OR within a dimension and AND across
//! dimensions. An empty set places no restriction on its dimension. The week
//! range is a separate, existential check on a record's weekly activity.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::models::StudentActivityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(i32, i32)", into = "(i32, i32)")]
pub struct WeekRange {
    start: i32,
    end: i32,
}

impl WeekRange {
    /// The dashboard's default window. A filter covering it is treated as
    /// "no week filtering" by [`FilterState::normalize_week_range`].
    pub const DEFAULT: WeekRange = WeekRange { start: 0, end: 52 };

    /// Early-engagement window used by the KPI calculator.
    pub const EARLY_ENGAGEMENT: WeekRange = WeekRange { start: 0, end: 4 };

    pub fn new(start: i32, end: i32) -> Result<Self, AnalyticsError> {
        if start > end {
            return Err(AnalyticsError::InvalidWeekRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn contains(&self, week: i32) -> bool {
        week >= self.start && week <= self.end
    }

    pub fn covers(&self, other: &WeekRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }
}

impl TryFrom<(i32, i32)> for WeekRange {
    type Error = AnalyticsError;

    fn try_from((start, end): (i32, i32)) -> Result<Self, Self::Error> {
        WeekRange::new(start, end)
    }
}

impl From<WeekRange> for (i32, i32) {
    fn from(range: WeekRange) -> Self {
        (range.start, range.end)
    }
}

impl FromStr for WeekRange {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (start, end) = trimmed
            .split_once("..=")
            .or_else(|| trimmed.split_once(".."))
            .or_else(|| trimmed.split_once(','))
            .ok_or_else(|| AnalyticsError::WeekRangeSyntax(s.to_string()))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|_| AnalyticsError::WeekRangeSyntax(s.to_string()))
        };

        WeekRange::new(parse(start)?, parse(end)?)
    }
}

impl fmt::Display for WeekRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterDimension {
    Module,
    Presentation,
    Region,
    AgeBand,
    Education,
    Gender,
    Disability,
}

impl FilterDimension {
    pub const ALL: [FilterDimension; 7] = [
        FilterDimension::Module,
        FilterDimension::Presentation,
        FilterDimension::Region,
        FilterDimension::AgeBand,
        FilterDimension::Education,
        FilterDimension::Gender,
        FilterDimension::Disability,
    ];

    /// The record's value for this dimension, trimmed the way the aggregators
    /// see it. A blank value comes back as `""`.
    fn value_of<'a>(&self, record: &'a StudentActivityRecord) -> &'a str {
        let value: &str = match self {
            FilterDimension::Module => &record.code_module,
            FilterDimension::Presentation => &record.code_presentation,
            FilterDimension::Region => &record.region,
            FilterDimension::AgeBand => &record.age_band,
            FilterDimension::Education => &record.highest_education,
            FilterDimension::Gender => &record.gender,
            FilterDimension::Disability => &record.disability,
        };
        value.trim()
    }
}

/// A read-only snapshot of the user's filter selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterState {
    pub modules: BTreeSet<String>,
    pub presentations: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub age_bands: BTreeSet<String>,
    pub education_levels: BTreeSet<String>,
    pub genders: BTreeSet<String>,
    pub disabilities: BTreeSet<String>,
    pub week_range: Option<WeekRange>,
}

impl FilterState {
    pub fn values(&self, dimension: FilterDimension) -> &BTreeSet<String> {
        match dimension {
            FilterDimension::Module => &self.modules,
            FilterDimension::Presentation => &self.presentations,
            FilterDimension::Region => &self.regions,
            FilterDimension::AgeBand => &self.age_bands,
            FilterDimension::Education => &self.education_levels,
            FilterDimension::Gender => &self.genders,
            FilterDimension::Disability => &self.disabilities,
        }
    }

    pub fn values_mut(&mut self, dimension: FilterDimension) -> &mut BTreeSet<String> {
        match dimension {
            FilterDimension::Module => &mut self.modules,
            FilterDimension::Presentation => &mut self.presentations,
            FilterDimension::Region => &mut self.regions,
            FilterDimension::AgeBand => &mut self.age_bands,
            FilterDimension::Education => &mut self.education_levels,
            FilterDimension::Gender => &mut self.genders,
            FilterDimension::Disability => &mut self.disabilities,
        }
    }

    pub fn with<I, S>(mut self, dimension: FilterDimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values_mut(dimension)
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_week_range(mut self, range: WeekRange) -> Self {
        self.week_range = Some(range);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.week_range.is_none()
            && FilterDimension::ALL
                .iter()
                .all(|dimension| self.values(*dimension).is_empty())
    }

    /// Drops a week range that covers the default window.
    ///
    /// Applied at the call site that turns user input into a filter; the
    /// predicate itself never treats a range as match-all.
    pub fn normalize_week_range(&mut self) {
        if let Some(range) = self.week_range {
            if range.covers(&WeekRange::DEFAULT) {
                self.week_range = None;
            }
        }
    }

    /// Unions every dimension of `other` into `self`; `other`'s week range wins when set.
    pub fn merge(&mut self, other: FilterState) {
        let FilterState {
            modules,
            presentations,
            regions,
            age_bands,
            education_levels,
            genders,
            disabilities,
            week_range,
        } = other;

        self.modules.extend(modules);
        self.presentations.extend(presentations);
        self.regions.extend(regions);
        self.age_bands.extend(age_bands);
        self.education_levels.extend(education_levels);
        self.genders.extend(genders);
        self.disabilities.extend(disabilities);
        if week_range.is_some() {
            self.week_range = week_range;
        }
    }
}

fn allows(values: &BTreeSet<String>, target: &str) -> bool {
    values.is_empty() || values.contains(target)
}

/// Categorical check across all seven dimensions.
///
/// A missing value is compared as `""`, so it fails every non-empty filter.
pub fn matches(record: &StudentActivityRecord, filters: &FilterState) -> bool {
    FilterDimension::ALL
        .iter()
        .all(|dimension| allows(filters.values(*dimension), dimension.value_of(record)))
}

/// True when at least one weekly entry falls inside `range`.
pub fn in_week_range(record: &StudentActivityRecord, range: &WeekRange) -> bool {
    record.weeks.iter().any(|w| range.contains(w.week))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, WeekActivity};

    fn student(
        module: &str,
        region: &str,
        disability: &str,
        weeks: &[i32],
    ) -> StudentActivityRecord {
        StudentActivityRecord {
            id_student: "11391".to_string(),
            code_module: module.to_string(),
            code_presentation: "2013J".to_string(),
            outcome: Outcome::Pass,
            total_clicks: weeks.len() as u64,
            final_score: 70.0,
            gender: "M".to_string(),
            region: region.to_string(),
            age_band: "35-55".to_string(),
            highest_education: "HE Qualification".to_string(),
            disability: disability.to_string(),
            weeks: weeks
                .iter()
                .map(|&week| WeekActivity { week, clicks: 1 })
                .collect(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let record = student("AAA", "East Anglian Region", "", &[]);
        assert!(matches(&record, &FilterState::default()));
    }

    #[test]
    fn values_within_a_dimension_are_ored() {
        let record = student("BBB", "Scotland", "N", &[1]);
        let filters = FilterState::default().with(FilterDimension::Module, ["AAA", "BBB"]);
        assert!(matches(&record, &filters));

        let filters = FilterState::default().with(FilterDimension::Module, ["AAA"]);
        assert!(!matches(&record, &filters));
    }

    #[test]
    fn dimensions_are_anded() {
        let record = student("AAA", "Scotland", "N", &[1]);
        let filters = FilterState::default()
            .with(FilterDimension::Module, ["AAA"])
            .with(FilterDimension::Region, ["Wales"]);
        assert!(!matches(&record, &filters));
    }

    #[test]
    fn missing_value_fails_a_non_empty_filter() {
        let record = student("AAA", "Scotland", "", &[1]);
        let filters = FilterState::default().with(FilterDimension::Disability, ["N", "Y"]);
        assert!(!matches(&record, &filters));
    }

    #[test]
    fn padded_values_match_their_trimmed_form() {
        let record = student("AAA", " Wales ", "  ", &[1]);
        let wales = FilterState::default().with(FilterDimension::Region, ["Wales"]);
        assert!(matches(&record, &wales));

        let disability = FilterState::default().with(FilterDimension::Disability, ["N"]);
        assert!(!matches(&record, &disability));
    }

    #[test]
    fn week_range_is_existential() {
        let record = student("AAA", "Scotland", "N", &[-2, 3, 30]);
        assert!(in_week_range(&record, &WeekRange::new(2, 5).unwrap()));
        assert!(in_week_range(&record, &WeekRange::new(30, 30).unwrap()));
        assert!(!in_week_range(&record, &WeekRange::new(4, 29).unwrap()));
    }

    #[test]
    fn empty_weeks_never_match_a_range() {
        let record = student("AAA", "Scotland", "N", &[]);
        assert!(!in_week_range(&record, &WeekRange::new(-100, 100).unwrap()));
    }

    #[test]
    fn week_range_parses_common_forms() {
        assert_eq!(
            "0..4".parse::<WeekRange>().unwrap(),
            WeekRange::new(0, 4).unwrap()
        );
        assert_eq!(
            "-3..=10".parse::<WeekRange>().unwrap(),
            WeekRange::new(-3, 10).unwrap()
        );
        assert_eq!(
            "2, 8".parse::<WeekRange>().unwrap(),
            WeekRange::new(2, 8).unwrap()
        );
        assert!("8..2".parse::<WeekRange>().is_err());
        assert!("week four".parse::<WeekRange>().is_err());
    }

    #[test]
    fn default_window_normalizes_away() {
        let mut filters = FilterState::default().with_week_range(WeekRange::new(-5, 60).unwrap());
        filters.normalize_week_range();
        assert_eq!(filters.week_range, None);

        let mut filters = FilterState::default().with_week_range(WeekRange::new(0, 10).unwrap());
        filters.normalize_week_range();
        assert_eq!(filters.week_range, WeekRange::new(0, 10).ok());
    }

    #[test]
    fn filter_state_reads_camel_case_json() {
        let json = r#"{"modules":["AAA"],"ageBands":["0-35"],"weekRange":[0,4]}"#;
        let filters: FilterState = serde_json::from_str(json).unwrap();
        assert!(filters.modules.contains("AAA"));
        assert!(filters.age_bands.contains("0-35"));
        assert_eq!(filters.week_range, WeekRange::new(0, 4).ok());
        assert!(filters.regions.is_empty());

        let bad = r#"{"weekRange":[9,1]}"#;
        assert!(serde_json::from_str::<FilterState>(bad).is_err());
    }

    #[test]
    fn merge_unions_sets_and_prefers_incoming_range() {
        let mut base = FilterState::default()
            .with(FilterDimension::Gender, ["F"])
            .with_week_range(WeekRange::new(0, 4).unwrap());
        base.merge(
            FilterState::default()
                .with(FilterDimension::Gender, ["M"])
                .with_week_range(WeekRange::new(5, 9).unwrap()),
        );
        assert_eq!(base.genders.len(), 2);
        assert_eq!(base.week_range, WeekRange::new(5, 9).ok());
        assert!(!base.is_empty());
    }
}
