//! Cohort filtering and chart aggregates for a learning-analytics dashboard.
//!
//! Raw enrollment records go through [`cohort::select_cohort`] once; every
//! aggregate, KPI and insight is then derived from that single cohort.

pub mod aggregate;
pub mod cohort;
pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod filter;
pub mod format;
pub mod insight;
pub mod kpi;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod risk;

pub use config::{AnalyticsConfig, BandWidth};
pub use error::{AnalyticsError, AnalyticsResult};
pub use filter::{FilterDimension, FilterState, WeekRange};
pub use models::{Outcome, StudentActivityRecord, WeekActivity};
pub use pipeline::{Dashboard, DashboardSnapshot};
