use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("invalid week range: start {start} is after end {end}")]
    InvalidWeekRange { start: i32, end: i32 },

    #[error("could not parse week range {0:?}, expected START..END")]
    WeekRangeSyntax(String),

    #[error("unsupported grade band width {0}, expected 10 or 20")]
    InvalidBandWidth(u32),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
