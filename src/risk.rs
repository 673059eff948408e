use crate::models::{AtRiskStudent, StudentActivityRecord};

pub const AT_RISK_SCORE: f64 = 40.0;

/// Cohort members scoring under [`AT_RISK_SCORE`] with below-average activity,
/// lowest score first.
///
/// Activity is recomputed from the weekly entries rather than `total_clicks`.
pub fn find_at_risk(cohort: &[StudentActivityRecord]) -> Vec<AtRiskStudent> {
    if cohort.is_empty() {
        return Vec::new();
    }

    let total: u64 = cohort.iter().map(|s| s.clicks_from_weeks()).sum();
    let avg_clicks = total as f64 / cohort.len() as f64;

    let mut values: Vec<AtRiskStudent> = cohort
        .iter()
        .filter_map(|student| {
            let score = student.score()?;
            let clicks = student.clicks_from_weeks();
            (score < AT_RISK_SCORE && (clicks as f64) < avg_clicks).then(|| AtRiskStudent {
                id_student: student.id_student.clone(),
                code_module: student.code_module.clone(),
                code_presentation: student.code_presentation.clone(),
                total_clicks: clicks,
                final_score: score,
            })
        })
        .collect();

    values.sort_by(|a, b| {
        a.final_score
            .partial_cmp(&b.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.total_clicks.cmp(&b.total_clicks))
    });
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Outcome, WeekActivity};

    fn sample_student(id: &str, score: f64, clicks: u64) -> StudentActivityRecord {
        StudentActivityRecord {
            id_student: id.to_string(),
            code_module: "DDD".to_string(),
            code_presentation: "2013B".to_string(),
            outcome: Outcome::Fail,
            // out of sync with weeks; risk reads the weekly entries
            total_clicks: 9999,
            final_score: score,
            gender: "F".to_string(),
            region: "North Region".to_string(),
            age_band: "35-55".to_string(),
            highest_education: "Lower Than A Level".to_string(),
            disability: "Y".to_string(),
            weeks: vec![WeekActivity { week: 1, clicks }],
        }
    }

    #[test]
    fn flags_low_score_and_low_activity() {
        let cohort = vec![
            sample_student("1", 35.0, 10),
            sample_student("2", 80.0, 10),
            sample_student("3", 20.0, 500),
            sample_student("4", 12.0, 40),
        ];
        let flagged = find_at_risk(&cohort);
        let ids: Vec<&str> = flagged.iter().map(|s| s.id_student.as_str()).collect();
        assert_eq!(ids, vec!["4", "1"]);
        assert_eq!(flagged[0].total_clicks, 40);
    }

    #[test]
    fn empty_cohort_has_nobody_at_risk() {
        assert!(find_at_risk(&[]).is_empty());
    }
}
