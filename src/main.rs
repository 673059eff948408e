use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use cohort_analytics::format::{format_count, format_number};
use cohort_analytics::{
    dataset, db, report, AnalyticsConfig, BandWidth, Dashboard, FilterDimension, FilterState,
    StudentActivityRecord, WeekRange,
};

#[derive(Parser)]
#[command(name = "cohort-analytics")]
#[command(
    about = "Cohort filtering and engagement analytics for student activity data",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["csv", "database"])
        .required(true)
        .multiple(false)
))]
struct SourceArgs {
    /// Read enrollments from a student_activity.csv file
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Read enrollments from the Postgres instance at DATABASE_URL
    #[arg(long)]
    database: bool,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long = "module", value_name = "CODE")]
    modules: Vec<String>,
    #[arg(long = "presentation", value_name = "CODE")]
    presentations: Vec<String>,
    #[arg(long = "region")]
    regions: Vec<String>,
    #[arg(long = "age-band")]
    age_bands: Vec<String>,
    #[arg(long = "education")]
    education_levels: Vec<String>,
    #[arg(long = "gender")]
    genders: Vec<String>,
    #[arg(long = "disability")]
    disabilities: Vec<String>,
    /// Keep students active at least once in this range, e.g. 0..4
    #[arg(long, value_name = "START..END", allow_hyphen_values = true)]
    weeks: Option<WeekRange>,
    /// JSON file holding a saved filter state, merged with the flags above
    #[arg(long, value_name = "FILE")]
    filters: Option<PathBuf>,
}

impl FilterArgs {
    fn into_filter_state(self) -> anyhow::Result<FilterState> {
        let mut filters = match &self.filters {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<FilterState>(&text)
                    .with_context(|| format!("invalid filter state in {}", path.display()))?
            }
            None => FilterState::default(),
        };

        let mut flags = FilterState::default()
            .with(FilterDimension::Module, self.modules)
            .with(FilterDimension::Presentation, self.presentations)
            .with(FilterDimension::Region, self.regions)
            .with(FilterDimension::AgeBand, self.age_bands)
            .with(FilterDimension::Education, self.education_levels)
            .with(FilterDimension::Gender, self.genders)
            .with(FilterDimension::Disability, self.disabilities);
        flags.week_range = self.weeks;

        filters.merge(flags);
        filters.normalize_week_range();
        Ok(filters)
    }
}

#[derive(Args)]
struct ConfigArgs {
    /// Grade band width, 10 or 20
    #[arg(long, default_value_t = BandWidth::Ten)]
    band_width: BandWidth,
    /// Count withdrawn students in the grade distribution
    #[arg(long)]
    include_withdrawn_grades: bool,
}

impl From<ConfigArgs> for AnalyticsConfig {
    fn from(args: ConfigArgs) -> Self {
        AnalyticsConfig {
            band_width: args.band_width,
            include_withdrawn_in_grades: args.include_withdrawn_grades,
            ..AnalyticsConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample enrollments
    Seed,
    /// Import enrollments from a student_activity.csv file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print KPIs and insights for the filtered cohort
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write every aggregate of the filtered cohort as CSV
    Export {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long, default_value = "aggregates")]
        out_dir: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_records(source: &SourceArgs) -> anyhow::Result<Vec<StudentActivityRecord>> {
    match &source.csv {
        Some(path) => dataset::load_students(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            let pool = connect().await?;
            db::fetch_students(&pool).await
        }
    }
}

async fn build_dashboard(
    source: SourceArgs,
    filters: FilterArgs,
    config: ConfigArgs,
) -> anyhow::Result<(Dashboard, FilterState)> {
    let records = load_records(&source).await?;
    let filters = filters.into_filter_state()?;
    Ok((Dashboard::new(records, config.into()), filters))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let stored = db::import_csv(&pool, &csv).await?;
            println!("Stored {stored} enrollments from {}.", csv.display());
        }
        Commands::Summary {
            source,
            filters,
            config,
        } => {
            let (mut dashboard, filters) = build_dashboard(source, filters, config).await?;
            let snapshot = dashboard.snapshot(&filters);

            if snapshot.cohort.is_empty() {
                println!("No students match these filters.");
                return Ok(());
            }

            println!("Cohort: {}", report::describe_filters(&filters));
            println!(
                "- {} students, {} module presentations, average score {}, {} early-week clicks per week",
                format_count(snapshot.kpis.student_count),
                format_count(snapshot.kpis.module_count),
                format_number(snapshot.kpis.average_score),
                format_number(snapshot.kpis.weekly_engagement)
            );
            println!();
            for insight in snapshot.insights.iter() {
                println!("- {insight}");
            }
        }
        Commands::Report {
            source,
            filters,
            config,
            out,
        } => {
            let (mut dashboard, filters) = build_dashboard(source, filters, config).await?;
            let snapshot = dashboard.snapshot(&filters);
            let report = report::build_report(chrono::Utc::now(), &snapshot);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            source,
            filters,
            config,
            out_dir,
        } => {
            let (mut dashboard, filters) = build_dashboard(source, filters, config).await?;
            let snapshot = dashboard.snapshot(&filters);
            let written = dataset::export_snapshot(&out_dir, &snapshot)
                .with_context(|| format!("failed to export to {}", out_dir.display()))?;
            println!("Wrote {} files to {}.", written.len(), out_dir.display());
        }
    }

    Ok(())
}
