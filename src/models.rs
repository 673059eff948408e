use std::fmt;

use serde::{Deserialize, Serialize};

/// Label used wherever a categorical value is missing.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Module/presentation label carried by rows that are not scoped to one offering.
pub const ALL_SCOPE: &str = "ALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Pass,
    Fail,
    Withdrawn,
    Distinction,
    Unknown,
}

impl Outcome {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pass" => Outcome::Pass,
            "fail" => Outcome::Fail,
            "withdrawn" => Outcome::Withdrawn,
            "distinction" => Outcome::Distinction,
            _ => Outcome::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "Pass",
            Outcome::Fail => "Fail",
            Outcome::Withdrawn => "Withdrawn",
            Outcome::Distinction => "Distinction",
            Outcome::Unknown => "Unknown",
        }
    }
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        Outcome::parse(&value)
    }
}

impl From<Outcome> for String {
    fn from(value: Outcome) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The demographic dimensions rolled up by the outcome-by-demographic aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Demographic {
    Gender,
    Region,
    AgeBand,
    HighestEducation,
    Disability,
}

impl Demographic {
    pub const ALL: [Demographic; 5] = [
        Demographic::Gender,
        Demographic::Region,
        Demographic::AgeBand,
        Demographic::HighestEducation,
        Demographic::Disability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Demographic::Gender => "gender",
            Demographic::Region => "region",
            Demographic::AgeBand => "age_band",
            Demographic::HighestEducation => "highest_education",
            Demographic::Disability => "disability",
        }
    }
}

impl fmt::Display for Demographic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekActivity {
    pub week: i32,
    pub clicks: u64,
}

/// One enrollment: a student in one module presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentActivityRecord {
    pub id_student: String,
    pub code_module: String,
    pub code_presentation: String,
    pub outcome: Outcome,
    pub total_clicks: u64,
    pub final_score: f64,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub age_band: String,
    #[serde(default)]
    pub highest_education: String,
    #[serde(default)]
    pub disability: String,
    #[serde(default)]
    pub weeks: Vec<WeekActivity>,
}

impl StudentActivityRecord {
    /// Final score clamped to `[0, 100]`, or `None` when it is not a finite number.
    pub fn score(&self) -> Option<f64> {
        self.final_score
            .is_finite()
            .then(|| self.final_score.clamp(0.0, 100.0))
    }

    pub fn is_withdrawn(&self) -> bool {
        self.outcome == Outcome::Withdrawn
    }

    pub fn demographic(&self, dimension: Demographic) -> &str {
        match dimension {
            Demographic::Gender => &self.gender,
            Demographic::Region => &self.region,
            Demographic::AgeBand => &self.age_band,
            Demographic::HighestEducation => &self.highest_education,
            Demographic::Disability => &self.disability,
        }
    }

    /// Demographic value with blanks folded into [`UNKNOWN_CATEGORY`].
    pub fn category(&self, dimension: Demographic) -> &str {
        normalize_category(self.demographic(dimension))
    }

    pub fn clicks_from_weeks(&self) -> u64 {
        self.weeks.iter().map(|w| w.clicks).sum()
    }
}

pub fn normalize_category(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN_CATEGORY
    } else {
        trimmed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOutcomeRecord {
    pub code_module: String,
    pub code_presentation: String,
    pub pass: u64,
    pub fail: u64,
    pub withdrawn: u64,
    pub distinction: u64,
}

impl ModuleOutcomeRecord {
    pub fn total(&self) -> u64 {
        self.pass + self.fail + self.withdrawn + self.distinction
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityByWeekRecord {
    pub code_module: String,
    pub code_presentation: String,
    pub week: i32,
    pub sum_clicks: u64,
    pub students_count: u64,
    pub avg_final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeDistributionRecord {
    pub code_module: String,
    pub code_presentation: String,
    pub band: u32,
    pub students: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionChoroplethRecord {
    pub region: String,
    pub students: u64,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeByDemographicRecord {
    pub demographic: String,
    pub category: String,
    pub pass: u64,
    pub fail: u64,
    pub withdrawn: u64,
    pub distinction: u64,
}

impl OutcomeByDemographicRecord {
    pub fn total(&self) -> u64 {
        self.pass + self.fail + self.withdrawn + self.distinction
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub student_count: u64,
    pub module_count: u64,
    pub average_score: f64,
    pub weekly_engagement: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Percentiles {
    pub clicks_p90: f64,
    pub scores_p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtRiskStudent {
    pub id_student: String,
    pub code_module: String,
    pub code_presentation: String,
    pub total_clicks: u64,
    pub final_score: f64,
}
