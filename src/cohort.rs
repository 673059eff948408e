use crate::filter::{in_week_range, matches, FilterState};
use crate::models::StudentActivityRecord;

/// Returns the records passing both the categorical and week-range checks, in input order.
///
/// Every aggregate is computed from this cohort; aggregators never filter on their own.
pub fn select_cohort(
    students: &[StudentActivityRecord],
    filters: &FilterState,
) -> Vec<StudentActivityRecord> {
    students
        .iter()
        .filter(|record| matches(record, filters))
        .filter(|record| match &filters.week_range {
            Some(range) => in_week_range(record, range),
            None => true,
        })
        .cloned()
        .collect()
}
