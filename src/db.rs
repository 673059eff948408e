use std::collections::HashMap;

use anyhow::Context;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::dataset;
use crate::models::{Outcome, StudentActivityRecord, WeekActivity};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_enrollment(
    conn: &mut PgConnection,
    record: &StudentActivityRecord,
) -> anyhow::Result<Uuid> {
    let enrollment_id: Uuid = sqlx::query(
        r#"
        INSERT INTO learning_analytics.enrollments
        (id, id_student, code_module, code_presentation, outcome, total_clicks, final_score,
         gender, region, age_band, highest_education, disability)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id_student, code_module, code_presentation) DO UPDATE
        SET outcome = EXCLUDED.outcome,
            total_clicks = EXCLUDED.total_clicks,
            final_score = EXCLUDED.final_score,
            gender = EXCLUDED.gender,
            region = EXCLUDED.region,
            age_band = EXCLUDED.age_band,
            highest_education = EXCLUDED.highest_education,
            disability = EXCLUDED.disability
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&record.id_student)
    .bind(&record.code_module)
    .bind(&record.code_presentation)
    .bind(record.outcome.as_str())
    .bind(i64::try_from(record.total_clicks).unwrap_or(i64::MAX))
    .bind(record.final_score)
    .bind(&record.gender)
    .bind(&record.region)
    .bind(&record.age_band)
    .bind(&record.highest_education)
    .bind(&record.disability)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    sqlx::query("DELETE FROM learning_analytics.weekly_clicks WHERE enrollment_id = $1")
        .bind(enrollment_id)
        .execute(&mut *conn)
        .await?;

    for entry in &record.weeks {
        sqlx::query(
            r#"
            INSERT INTO learning_analytics.weekly_clicks (enrollment_id, week, clicks)
            VALUES ($1, $2, $3)
            ON CONFLICT (enrollment_id, week) DO UPDATE
            SET clicks = learning_analytics.weekly_clicks.clicks + EXCLUDED.clicks
            "#,
        )
        .bind(enrollment_id)
        .bind(entry.week)
        .bind(i64::try_from(entry.clicks).unwrap_or(i64::MAX))
        .execute(&mut *conn)
        .await?;
    }

    Ok(enrollment_id)
}

async fn store_records(pool: &PgPool, records: &[StudentActivityRecord]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    for record in records {
        upsert_enrollment(&mut *tx, record).await.with_context(|| {
            format!(
                "failed to store enrollment {} {} {}",
                record.id_student, record.code_module, record.code_presentation
            )
        })?;
    }
    tx.commit().await?;
    Ok(records.len())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let enrollments = vec![
        (
            "11391",
            "AAA",
            "2013J",
            Outcome::Pass,
            82.0,
            ["M", "East Anglian Region", "55<=", "HE Qualification", "N"],
            vec![(0, 10), (1, 20)],
        ),
        (
            "28400",
            "AAA",
            "2013J",
            Outcome::Fail,
            30.0,
            ["F", "East Anglian Region", "0-35", "HE Qualification", "N"],
            vec![(0, 5)],
        ),
        (
            "30268",
            "AAA",
            "2013J",
            Outcome::Withdrawn,
            0.0,
            ["F", "North Region", "35-55", "A Level or Equivalent", "Y"],
            vec![],
        ),
        (
            "31604",
            "BBB",
            "2014B",
            Outcome::Distinction,
            91.0,
            ["F", "South Region", "35-55", "A Level or Equivalent", "N"],
            vec![(-2, 12), (0, 44), (3, 67), (6, 21)],
        ),
    ];

    let records: Vec<StudentActivityRecord> = enrollments
        .into_iter()
        .map(|(id, module, presentation, outcome, score, demographics, weeks)| {
            let [gender, region, age_band, education, disability] = demographics;
            let weeks: Vec<WeekActivity> = weeks
                .into_iter()
                .map(|(week, clicks)| WeekActivity { week, clicks })
                .collect();
            StudentActivityRecord {
                id_student: id.to_string(),
                code_module: module.to_string(),
                code_presentation: presentation.to_string(),
                outcome,
                total_clicks: weeks.iter().map(|w| w.clicks).sum(),
                final_score: score,
                gender: gender.to_string(),
                region: region.to_string(),
                age_band: age_band.to_string(),
                highest_education: education.to_string(),
                disability: disability.to_string(),
                weeks,
            }
        })
        .collect();

    store_records(pool, &records).await?;
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let records = dataset::load_students(csv_path)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;
    store_records(pool, &records).await
}

/// Loads the full enrollment set; filtering happens in the cohort selector, not in SQL.
pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<StudentActivityRecord>> {
    let week_rows = sqlx::query(
        "SELECT enrollment_id, week, clicks FROM learning_analytics.weekly_clicks \
         ORDER BY enrollment_id, week",
    )
    .fetch_all(pool)
    .await?;

    let mut weeks: HashMap<Uuid, Vec<WeekActivity>> = HashMap::new();
    for row in week_rows {
        let clicks: i64 = row.get("clicks");
        weeks
            .entry(row.get("enrollment_id"))
            .or_default()
            .push(WeekActivity {
                week: row.get("week"),
                clicks: u64::try_from(clicks).unwrap_or(0),
            });
    }

    let rows = sqlx::query(
        "SELECT id, id_student, code_module, code_presentation, outcome, total_clicks, \
         final_score, gender, region, age_band, highest_education, disability \
         FROM learning_analytics.enrollments \
         ORDER BY code_module, code_presentation, id_student",
    )
    .fetch_all(pool)
    .await?;

    let mut students = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.get("id");
        let outcome: String = row.get("outcome");
        let total_clicks: i64 = row.get("total_clicks");
        students.push(StudentActivityRecord {
            id_student: row.get("id_student"),
            code_module: row.get("code_module"),
            code_presentation: row.get("code_presentation"),
            outcome: Outcome::parse(&outcome),
            total_clicks: u64::try_from(total_clicks).unwrap_or(0),
            final_score: row.get("final_score"),
            gender: row.get("gender"),
            region: row.get("region"),
            age_band: row.get("age_band"),
            highest_education: row.get("highest_education"),
            disability: row.get("disability"),
            weeks: weeks.remove(&id).unwrap_or_default(),
        });
    }

    tracing::info!(records = students.len(), "loaded enrollments from postgres");
    Ok(students)
}
