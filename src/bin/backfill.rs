use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::Database;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entsoe_backend::config::AppConfig;
use entsoe_backend::models::backfill::TimeRange;
use entsoe_backend::services::backfill::BackfillService;
use entsoe_backend::services::backfill_progress::SeaOrmProgressStore;
use entsoe_backend::services::data_points::SeaOrmDataPointStore;
use entsoe_backend::services::entsoe::{DataTarget, EntsoeClient, Endpoint};

const USAGE: &str = "Usage:
  cargo run --bin backfill <area> <endpoint> <start> <end>
  cargo run --bin backfill gaps <area> <endpoint> <start> <end>
  cargo run --bin backfill resume <backfill_id>
  cargo run --bin backfill cancel <backfill_id>

Dates are YYYY-MM-DD (UTC midnight) or RFC 3339.
Flows use FROM->TO as area, e.g. CZ->SK.
Example: cargo run --bin backfill CZ actual_load 2024-01-01 2024-04-01";

enum Command {
    Run(DataTarget, TimeRange),
    Gaps(DataTarget, TimeRange),
    Resume(i64),
    Cancel(i64),
}

fn usage_error(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    eprintln!();
    eprintln!("{}", USAGE);
    std::process::exit(1);
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("Invalid date '{}'", raw))
}

fn parse_target(args: &[String]) -> Result<(DataTarget, TimeRange), String> {
    let [area, endpoint, start, end] = args else {
        return Err("Expected <area> <endpoint> <start> <end>".to_string());
    };

    let endpoint: Endpoint = endpoint.parse().map_err(|e| format!("{}", e))?;
    let target = DataTarget::new(endpoint, area).map_err(|e| format!("{}", e))?;
    let range = TimeRange::new(parse_date(start)?, parse_date(end)?);

    if range.is_empty() {
        return Err(format!("Start {} must be before end {}", start, end));
    }
    Ok((target, range))
}

fn parse_id(args: &[String]) -> Result<i64, String> {
    match args {
        [id] => id
            .parse()
            .map_err(|_| format!("Invalid backfill_id '{}'. Must be a number.", id)),
        _ => Err("Expected <backfill_id>".to_string()),
    }
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    match args.first().map(String::as_str) {
        Some("resume") => parse_id(&args[1..]).map(Command::Resume),
        Some("cancel") => parse_id(&args[1..]).map(Command::Cancel),
        Some("gaps") => parse_target(&args[1..]).map(|(t, r)| Command::Gaps(t, r)),
        Some(_) => parse_target(args).map(|(t, r)| Command::Run(t, r)),
        None => Err("Missing arguments".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,entsoe_backend=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = parse_command(&args).unwrap_or_else(|e| usage_error(e));

    let config = AppConfig::from_env()?;

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    let service = BackfillService::new(
        EntsoeClient::from_config(config.transport.clone())?,
        Arc::new(SeaOrmDataPointStore::new(db.clone())),
        Arc::new(SeaOrmProgressStore::new(db)),
        config.backfill.clone(),
    );

    let summary = match command {
        Command::Gaps(target, range) => {
            let gap = service.analyze_gaps(&target, range).await?;
            println!("{}", serde_json::to_string_pretty(&gap)?);
            return Ok(());
        }
        Command::Cancel(id) => {
            let progress = service.cancel_backfill(id).await?;
            tracing::info!(backfill_id = id, status = %progress.status(), "Backfill cancelled");
            return Ok(());
        }
        Command::Resume(id) => {
            tracing::info!(backfill_id = id, "Resuming backfill");
            service.resume_backfill(id).await?
        }
        Command::Run(target, range) => {
            tracing::info!(data_target = %target, period = %range, "Starting backfill");
            service.start_backfill(&target, range).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.success {
        tracing::info!(
            backfill_id = summary.backfill_id,
            points = summary.total_data_points,
            "Backfill completed"
        );
        Ok(())
    } else {
        tracing::error!(
            backfill_id = summary.backfill_id,
            status = %summary.status,
            failed_chunks = summary.failed_chunks,
            "Backfill did not complete, resume with: backfill resume {}",
            summary.backfill_id
        );
        std::process::exit(2);
    }
}
