//! Meadery inventory command-line front end
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! meadery migrate
//!
//! # Create the first administrator (password from MEADERY_PASSWORD)
//! meadery bootstrap-admin --login admin
//!
//! # Print today's notification feed
//! meadery notifications --login owner
//!
//! # Export the sales report for March as CSV
//! meadery report orders --from 2024-03-01 --to 2024-03-31 --login owner
//! ```

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meadery_backend::services::{ReportingService, Session};
use meadery_backend::{db, AppError, AppState, Config};
use shared::{DateRange, OrderStatus};

#[derive(Parser)]
#[command(name = "meadery")]
#[command(author, version, about = "Meadery inventory and order management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Create the first administrator account
    BootstrapAdmin {
        #[arg(short, long)]
        login: String,

        #[arg(long, env = "MEADERY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print the notification feed for today
    Notifications {
        #[arg(short, long)]
        login: String,

        #[arg(long, env = "MEADERY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Export a report for a date range
    Report {
        #[arg(value_enum)]
        kind: ReportKind,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Only orders with this status (orders report)
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,

        #[arg(short, long)]
        login: String,

        #[arg(long, env = "MEADERY_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    Materials,
    Batches,
    Orders,
    Income,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Completed,
    Finished,
}

impl From<StatusArg> for OrderStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => OrderStatus::Pending,
            StatusArg::Completed => OrderStatus::Completed,
            StatusArg::Finished => OrderStatus::Finished,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meadery=info,meadery_backend=info,sqlx=warn".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!("Environment: {}", config.environment);

    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;
    let state = AppState::new(pool, config);

    if let Err(err) = run(cli.command, &state).await {
        let detail = err.detail();
        eprintln!("{} / {}", detail.message_ru, detail.message_en);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands, state: &AppState) -> Result<(), AppError> {
    match command {
        // Migrations already ran on startup
        Commands::Migrate => {
            println!("Database is up to date");
        }
        Commands::BootstrapAdmin { login, password } => {
            let user = state.users.bootstrap_admin(&login, &password).await?;
            println!("Created administrator {}", user.login);
        }
        Commands::Notifications { login, password } => {
            let session = state.auth.login(&login, &password).await?;
            let today = Local::now().date_naive();
            for notification in state.notifications.feed(&session, today).await? {
                println!("{}", notification.message_ru());
            }
        }
        Commands::Report {
            kind,
            from,
            to,
            status,
            format,
            login,
            password,
        } => {
            let session = state.auth.login(&login, &password).await?;
            let range = DateRange::new(from, to);
            let output = render_report(state, &session, kind, range, status, format).await?;
            print!("{}", output);
        }
    }
    Ok(())
}

async fn render_report(
    state: &AppState,
    session: &Session,
    kind: ReportKind,
    range: DateRange,
    status: Option<StatusArg>,
    format: OutputFormat,
) -> Result<String, AppError> {
    let reports = &state.reports;
    match kind {
        ReportKind::Materials => render(&reports.materials_report(session, range).await?, format),
        ReportKind::Batches => render(&reports.batches_report(session, range).await?, format),
        ReportKind::Orders => render(
            &reports
                .orders_report(session, range, status.map(OrderStatus::from))
                .await?,
            format,
        ),
        ReportKind::Income => render(&reports.income_by_date(session, range).await?, format),
    }
}

fn render<T: Serialize>(rows: &[T], format: OutputFormat) -> Result<String, AppError> {
    match format {
        OutputFormat::Csv => ReportingService::export_csv(rows),
        OutputFormat::Json => serde_json::to_string_pretty(rows)
            .map(|json| json + "\n")
            .map_err(|e| AppError::Internal(format!("JSON serialization error: {}", e))),
    }
}
