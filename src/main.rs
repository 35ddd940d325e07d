use std::env;
use std::fs;
use std::net::SocketAddr;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use vctsdb_ql::metrics;
use vctsdb_ql::query::ast::SelectStatement;
use vctsdb_ql::query::{PlannerConfig, PlanningError, QueryPlanner};

#[derive(Debug, Error)]
enum CliError {
    #[error("usage: vctsdb-ql plan <statement.json>")]
    Usage,
    #[error("Failed to read {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid VCTSDB_QL_NOW: {0}")]
    Now(#[from] chrono::ParseError),
    #[error(transparent)]
    Planning(#[from] PlanningError),
}

fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    match run(env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), CliError> {
    let [command, path] = args.as_slice() else {
        return Err(CliError::Usage);
    };
    if command != "plan" {
        return Err(CliError::Usage);
    }

    if let Ok(addr) = env::var("VCTSDB_QL_METRICS_ADDR") {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => match metrics::init_metrics(addr) {
                Ok(()) => info!("Metrics server listening on {}", addr),
                Err(e) => error!("Failed to initialize metrics: {}", e),
            },
            Err(e) => error!("Invalid VCTSDB_QL_METRICS_ADDR {}: {}", addr, e),
        }
    }

    let config = PlannerConfig {
        now: now_from_env()?,
        ..PlannerConfig::default()
    };

    let input = fs::read_to_string(path).map_err(|e| CliError::Io(path.clone(), e))?;
    let stmt: SelectStatement = serde_json::from_str(&input)?;
    info!("Planning {}", stmt);

    let plan = QueryPlanner::with_config(config).plan_query(&stmt)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn now_from_env() -> Result<Option<DateTime<Utc>>, CliError> {
    match env::var("VCTSDB_QL_NOW") {
        Ok(value) => Ok(Some(DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc))),
        Err(_) => Ok(None),
    }
}
