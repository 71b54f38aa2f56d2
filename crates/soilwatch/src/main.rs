use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use soilwatch::{create_app, AppState};
use soilwatch_core::config::Settings;
use soilwatch_core::outputs::{MoistureSummary, TemperatureSummary};
use soilwatch_core::{Outcome, TemperatureUnit};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Soil moisture and temperature summaries for field probes", long_about = None)]
struct Cli {
    /// TOML settings file; SOILWATCH_* environment variables override it
    #[arg(long, env = "SOILWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the /moisture and /temperature endpoints
    Serve,
    /// Fetch one summary and print it as a table
    #[command(subcommand)]
    Query(QueryCommand),
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    Moisture(MoistureArgs),
    Temperature(TemperatureArgs),
}

#[derive(Args, Debug)]
struct MoistureArgs {
    #[arg(long)]
    sensor: String,
    /// IANA zone the logger clock is set to
    #[arg(long)]
    tz: Option<String>,
    /// Depths in inches, comma separated
    #[arg(long, value_delimiter = ',')]
    depths: Vec<f64>,
    #[arg(long)]
    days: Option<u32>,
}

#[derive(Args, Debug)]
struct TemperatureArgs {
    #[arg(long)]
    sensor: String,
    #[arg(long)]
    tz: Option<String>,
    /// Depth in inches
    #[arg(long)]
    depth: Option<f64>,
    /// `c` or `f`
    #[arg(long)]
    unit: Option<TemperatureUnit>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.command {
        Command::Serve => serve(settings).await,
        Command::Query(query) => run_query(settings, query).await,
    }
}

async fn serve(settings: Settings) -> Result<()> {
    let state = AppState::from_settings(&settings).context("failed to configure pipeline")?;
    let app = create_app(state, &settings.server.cors_origins);

    let listener = TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("failed to listen for shutdown signal");
            }
        })
        .await?;
    Ok(())
}

async fn run_query(settings: Settings, query: QueryCommand) -> Result<()> {
    let state = AppState::from_settings(&settings).context("failed to configure pipeline")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    match query {
        QueryCommand::Moisture(args) => {
            let depths = (!args.depths.is_empty()).then_some(args.depths);
            let request =
                state.moisture_request(Some(args.sensor), args.tz.as_deref(), depths, args.days)?;
            match state
                .pipeline()
                .moisture(&request, Utc::now(), Some(&cancel))
                .await?
            {
                Outcome::Data(summary) => print_moisture(&summary),
                Outcome::NoData(reason) => println!("No data: {reason}"),
            }
        }
        QueryCommand::Temperature(args) => {
            let request = state.temperature_request(
                Some(args.sensor),
                args.tz.as_deref(),
                args.depth,
                args.unit,
            )?;
            match state
                .pipeline()
                .temperature(&request, Utc::now(), Some(&cancel))
                .await?
            {
                Outcome::Data(summary) => print_temperature(&summary),
                Outcome::NoData(reason) => println!("No data: {reason}"),
            }
        }
    }

    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string())
}

fn print_moisture(summary: &MoistureSummary) {
    println!(
        "{} ({}), {}-day window",
        summary.sensor, summary.timezone, summary.window_days
    );
    let mut table = Table::new();
    table.set_header(vec![
        "Requested (in)",
        "Mapped (in)",
        "Column",
        "Latest (%)",
        "Window avg (%)",
        "Samples",
    ]);
    for depth in &summary.depths {
        table.add_row(vec![
            format!("{:.1}", depth.depth_requested),
            format!("{:.1}", depth.mapped_depth),
            depth.column.clone(),
            fmt_opt(depth.latest_value),
            fmt_opt(depth.window_average),
            depth.window_count.to_string(),
        ]);
    }
    println!("{table}");
}

fn print_temperature(summary: &TemperatureSummary) {
    let unit = summary.unit.symbol();
    println!(
        "{} ({}), {:.1} in requested, column {} at {:.1} in",
        summary.sensor,
        summary.timezone,
        summary.requested_depth,
        summary.column,
        summary.mapped_depth
    );

    let today = &summary.today;
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value", "Local time"]);
    table.add_row(vec![
        "Current".to_string(),
        format!("{} {unit}", fmt_opt(today.current)),
        String::new(),
    ]);
    for (label, extreme) in [("High", &today.high), ("Low", &today.low)] {
        table.add_row(vec![
            label.to_string(),
            format!("{} {unit}", fmt_opt(extreme.as_ref().map(|e| e.value))),
            extreme
                .as_ref()
                .map(|e| e.local_time.clone())
                .unwrap_or_default(),
        ]);
    }
    table.add_row(vec![
        "Average".to_string(),
        format!("{} {unit} ({} samples)", fmt_opt(today.average), today.count),
        String::new(),
    ]);
    for (label, trend) in [("7-day", &summary.trend_7d), ("30-day", &summary.trend_30d)] {
        table.add_row(vec![
            format!("{label} average / delta"),
            match trend {
                Some(trend) => format!("{:.1} / {:+.1} {unit}", trend.average, trend.delta),
                None => "-".to_string(),
            },
            String::new(),
        ]);
    }
    println!("{table}");
}
