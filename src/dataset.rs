//! CSV boundary for the session record set and exported aggregates.
//!
//! The student file stores weekly activity as a JSON array in its `weeks`
//! column. Aggregate files use fixed column layouts so they can be read back
//! without loss.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AnalyticsResult;
use crate::models::{
    ActivityByWeekRecord, GradeDistributionRecord, ModuleOutcomeRecord, Outcome,
    OutcomeByDemographicRecord, RegionChoroplethRecord, StudentActivityRecord, WeekActivity,
};
use crate::pipeline::DashboardSnapshot;

pub const MODULE_OUTCOME_FILE: &str = "module_outcome.csv";
pub const ACTIVITY_BY_WEEK_FILE: &str = "activity_by_week.csv";
pub const GRADE_DISTRIBUTION_FILE: &str = "grade_distribution.csv";
pub const REGION_CHOROPLETH_FILE: &str = "region_choropleth.csv";
pub const OUTCOME_BY_DEMOGRAPHIC_FILE: &str = "outcome_by_demographic.csv";
pub const STUDENT_ACTIVITY_FILE: &str = "student_activity.csv";

/// Column order of a persisted row type.
pub trait CsvLayout {
    const COLUMNS: &'static [&'static str];
}

impl CsvLayout for ModuleOutcomeRecord {
    const COLUMNS: &'static [&'static str] = &[
        "code_module",
        "code_presentation",
        "pass",
        "fail",
        "withdrawn",
        "distinction",
    ];
}

impl CsvLayout for ActivityByWeekRecord {
    const COLUMNS: &'static [&'static str] = &[
        "code_module",
        "code_presentation",
        "week",
        "sum_clicks",
        "students_count",
        "avg_final_score",
    ];
}

impl CsvLayout for GradeDistributionRecord {
    const COLUMNS: &'static [&'static str] =
        &["code_module", "code_presentation", "band", "students"];
}

impl CsvLayout for RegionChoroplethRecord {
    const COLUMNS: &'static [&'static str] = &["region", "students", "average_score"];
}

impl CsvLayout for OutcomeByDemographicRecord {
    const COLUMNS: &'static [&'static str] = &[
        "demographic",
        "category",
        "pass",
        "fail",
        "withdrawn",
        "distinction",
    ];
}

/// A `student_activity.csv` row as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct StudentActivityRow {
    pub id_student: String,
    pub code_module: String,
    pub code_presentation: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_clicks: u64,
    #[serde(default, deserialize_with = "lenient_number")]
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
    pub weeks: String,
}

impl CsvLayout for StudentActivityRow {
    const COLUMNS: &'static [&'static str] = &[
        "id_student",
        "code_module",
        "code_presentation",
        "outcome",
        "total_clicks",
        "final_score",
        "gender",
        "region",
        "age_band",
        "highest_education",
        "disability",
        "weeks",
    ];
}

/// Reads a numeric cell the lenient way: surrounding whitespace is ignored,
/// an empty cell is 0 and so is anything that is not a finite number.
pub fn to_number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

fn json_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => to_number(text),
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        _ => 0.0,
    }
}

// Float-to-int `as` casts saturate, so negatives become 0 clicks.
fn count_from(value: f64) -> u64 {
    value.trunc() as u64
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(to_number(&raw))
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    lenient_number(deserializer).map(count_from)
}

/// Decodes the JSON `weeks` column.
///
/// Each entry's `week` and `clicks` are coerced like any other numeric cell,
/// so `10.0` and `"10"` both read as 10. Text that is not a JSON array
/// degrades to no activity.
pub fn decode_weeks(id_student: &str, raw: &str) -> Vec<WeekActivity> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let entries = match serde_json::from_str::<Vec<Value>>(trimmed) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(id_student, error = %err, "ignoring malformed weeks column");
            return Vec::new();
        }
    };
    entries
        .iter()
        .map(|entry| WeekActivity {
            week: json_number(entry.get("week")).trunc() as i32,
            clicks: count_from(json_number(entry.get("clicks"))),
        })
        .collect()
}

impl From<StudentActivityRow> for StudentActivityRecord {
    fn from(row: StudentActivityRow) -> Self {
        let weeks = decode_weeks(&row.id_student, &row.weeks);
        StudentActivityRecord {
            outcome: Outcome::parse(&row.outcome),
            total_clicks: row.total_clicks,
            final_score: row.final_score,
            id_student: row.id_student,
            code_module: row.code_module,
            code_presentation: row.code_presentation,
            gender: row.gender,
            region: row.region,
            age_band: row.age_band,
            highest_education: row.highest_education,
            disability: row.disability,
            weeks,
        }
    }
}

impl TryFrom<&StudentActivityRecord> for StudentActivityRow {
    type Error = serde_json::Error;

    fn try_from(record: &StudentActivityRecord) -> Result<Self, Self::Error> {
        Ok(StudentActivityRow {
            id_student: record.id_student.clone(),
            code_module: record.code_module.clone(),
            code_presentation: record.code_presentation.clone(),
            outcome: record.outcome.to_string(),
            total_clicks: record.total_clicks,
            final_score: record.final_score,
            gender: record.gender.clone(),
            region: record.region.clone(),
            age_band: record.age_band.clone(),
            highest_education: record.highest_education.clone(),
            disability: record.disability.clone(),
            weeks: serde_json::to_string(&record.weeks)?,
        })
    }
}

pub fn read_students<R: io::Read>(reader: R) -> AnalyticsResult<Vec<StudentActivityRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let mut students = Vec::new();

    for result in reader.deserialize::<StudentActivityRow>() {
        students.push(result?.into());
    }

    Ok(students)
}

pub fn load_students(path: &Path) -> AnalyticsResult<Vec<StudentActivityRecord>> {
    let file = fs::File::open(path)?;
    let students = read_students(file)?;
    tracing::info!(
        path = %path.display(),
        records = students.len(),
        "loaded student activity"
    );
    Ok(students)
}

pub fn write_students<W: io::Write>(
    writer: W,
    students: &[StudentActivityRecord],
) -> AnalyticsResult<()> {
    let rows = students
        .iter()
        .map(StudentActivityRow::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    write_rows(writer, &rows)
}

/// Writes `rows` under their fixed header, including when there are no rows.
pub fn write_rows<W, T>(writer: W, rows: &[T]) -> AnalyticsResult<()>
where
    W: io::Write,
    T: CsvLayout + Serialize,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_rows<R, T>(reader: R) -> AnalyticsResult<Vec<T>>
where
    R: io::Read,
    T: DeserializeOwned,
{
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        rows.push(result?);
    }
    Ok(rows)
}

fn write_file<T: CsvLayout + Serialize>(
    dir: &Path,
    name: &str,
    rows: &[T],
) -> AnalyticsResult<PathBuf> {
    let path = dir.join(name);
    write_rows(fs::File::create(&path)?, rows)?;
    Ok(path)
}

/// Writes every aggregate of `snapshot` plus its cohort into `dir`.
pub fn export_snapshot(
    dir: &Path,
    snapshot: &DashboardSnapshot,
) -> AnalyticsResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let students_path = dir.join(STUDENT_ACTIVITY_FILE);
    write_students(fs::File::create(&students_path)?, &snapshot.cohort)?;

    let written = vec![
        write_file(dir, MODULE_OUTCOME_FILE, &snapshot.module_outcome)?,
        write_file(dir, ACTIVITY_BY_WEEK_FILE, &snapshot.activity_by_week)?,
        write_file(dir, GRADE_DISTRIBUTION_FILE, &snapshot.grade_distribution)?,
        write_file(dir, REGION_CHOROPLETH_FILE, &snapshot.region_choropleth)?,
        write_file(
            dir,
            OUTCOME_BY_DEMOGRAPHIC_FILE,
            &snapshot.outcome_by_demographic,
        )?,
        students_path,
    ];

    tracing::info!(dir = %dir.display(), files = written.len(), "exported aggregates");
    Ok(written)
}
