use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use hopedeeds_core::{occurrence_dates, RecurrenceRuleInput};
use hopedeeds_shifts::ServiceConfig;
use hopedeeds_storage::Database;
use hopedeeds_web::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hopedeeds")]
#[command(about = "HopeDeeds volunteer shift service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve {
        /// Keep everything in process memory instead of Postgres.
        #[arg(long)]
        in_memory: bool,
    },
    /// Apply database migrations.
    Migrate,
    /// Print the instance dates a recurrence rule would generate.
    Expand {
        #[arg(long)]
        start_date: NaiveDate,
        /// daily, weekly or monthly
        #[arg(long = "type")]
        kind: String,
        /// Weekday abbreviations for weekly rules, e.g. mon,wed
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
        #[arg(long)]
        count: Option<u32>,
        /// Bound by today + N months instead of a count.
        #[arg(long)]
        horizon_months: Option<u32>,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { in_memory: false }) {
        Commands::Serve { in_memory: false } => hopedeeds_web::serve_from_env().await?,
        Commands::Serve { in_memory: true } => {
            let config = ServiceConfig::load().await?;
            info!("serving from an in-memory store; data is lost on exit");
            hopedeeds_web::serve(config.port, AppState::in_memory(&config)).await?;
        }
        Commands::Migrate => {
            let config = ServiceConfig::load().await?;
            let database = Database::connect(&config.database)
                .await
                .context("connecting to postgres")?;
            let migrated = database.migrate().await;
            database.close().await;
            migrated.context("running migrations")?;
            println!("migrations applied");
        }
        Commands::Expand {
            start_date,
            kind,
            days,
            count,
            horizon_months,
            today,
        } => {
            let input = RecurrenceRuleInput {
                kind,
                days: (!days.is_empty()).then_some(days),
                count,
                bound_by: horizon_months.map(|_| "horizon".to_string()),
                horizon_months,
            };
            let config = ServiceConfig::load().await?;
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let dates = preview_dates(input, start_date, today, config.max_scan_days)?;
            println!("{}", serde_json::to_string_pretty(&dates)?);
        }
    }

    Ok(())
}

/// Dates `input` would generate, refusing rules the service would reject as too long.
fn preview_dates(
    input: RecurrenceRuleInput,
    start_date: NaiveDate,
    today: NaiveDate,
    max_scan_days: u64,
) -> Result<Vec<NaiveDate>> {
    let kind = input.kind.clone();
    let Some(spec) = input.into_spec() else {
        bail!("unsupported recurrence type {kind:?}; expected daily, weekly or monthly");
    };
    let scan_days = spec.scan_days(start_date, today);
    if scan_days > max_scan_days {
        bail!("recurrence would scan {scan_days} days; the limit is {max_scan_days}");
    }
    Ok(occurrence_dates(start_date, &spec, today))
}
