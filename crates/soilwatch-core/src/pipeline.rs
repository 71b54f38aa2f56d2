use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use soilwatch_parser::{
    identify_columns, parse_table, ChannelDepthTable, ChannelKind, ColumnDescriptor, ParserError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::aggregate::{self, TREND_WINDOWS_DAYS};
use crate::config::{ConfigError, Settings};
use crate::depth::select_nearest;
use crate::error::{PipelineError, Result};
use crate::outputs::{
    round1, DepthReading, MoistureSummary, TemperatureSummary, TodaySummary, TrendSummary,
};
use crate::readings::{build_readings, ReadingSet};
use crate::upstream::{IrrimaxClient, ReadingSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    #[default]
    Fahrenheit,
}

impl TemperatureUnit {
    /// Converts from the probe's native Celsius.
    pub fn convert_celsius(&self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(format!("unknown temperature unit '{other}'")),
        }
    }
}

/// Why a request that reached the upstream produced no figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    EmptyResponse,
    NoRecognizedColumns,
    NoParseableReadings,
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoDataReason::EmptyResponse => "upstream returned no rows",
            NoDataReason::NoRecognizedColumns => "no sensor columns matched the requested kind",
            NoDataReason::NoParseableReadings => "no rows had a usable timestamp and value",
        })
    }
}

/// Sparse field data is routine, so an empty result is a success rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Data(T),
    NoData(NoDataReason),
}

impl<T> Outcome<T> {
    pub fn data(self) -> Option<T> {
        match self {
            Outcome::Data(value) => Some(value),
            Outcome::NoData(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoistureRequest {
    pub sensor: String,
    pub timezone: Tz,
    /// Inches, in the order they should be reported.
    pub depths: Vec<f64>,
    pub window_days: u32,
}

impl MoistureRequest {
    pub fn validate(&self) -> Result<()> {
        validate_sensor(&self.sensor)?;
        if self.depths.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "at least one depth is required".to_string(),
            ));
        }
        for depth in &self.depths {
            validate_depth(*depth)?;
        }
        if self.window_days < 1 {
            return Err(PipelineError::InvalidRequest(
                "window must be at least 1 day".to_string(),
            ));
        }
        Ok(())
    }

    fn lookback_days(&self) -> u32 {
        self.window_days
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureRequest {
    pub sensor: String,
    pub timezone: Tz,
    pub depth: f64,
    pub unit: TemperatureUnit,
}

impl TemperatureRequest {
    pub fn validate(&self) -> Result<()> {
        validate_sensor(&self.sensor)?;
        validate_depth(self.depth)
    }

    fn lookback_days(&self) -> u32 {
        TREND_WINDOWS_DAYS.iter().copied().max().unwrap_or(1)
    }
}

fn validate_sensor(sensor: &str) -> Result<()> {
    if sensor.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(
            "sensor identifier is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_depth(depth: f64) -> Result<()> {
    if !depth.is_finite() || depth <= 0.0 {
        return Err(PipelineError::InvalidRequest(format!(
            "depth must be a positive number of inches, got {depth}"
        )));
    }
    Ok(())
}

pub fn parse_timezone(raw: &str) -> Result<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| PipelineError::InvalidRequest(format!("unknown time zone '{}'", raw.trim())))
}

/// Parses a comma separated list of positive depths in inches.
pub fn parse_depth_list(raw: &str) -> std::result::Result<Vec<f64>, String> {
    let depths = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let depth = part
                .parse::<f64>()
                .map_err(|err| format!("invalid depth '{part}': {err}"))?;
            if !depth.is_finite() || depth <= 0.0 {
                return Err(format!("depth must be positive, got '{part}'"));
            }
            Ok(depth)
        })
        .collect::<std::result::Result<Vec<f64>, String>>()?;

    if depths.is_empty() {
        return Err("no depths given".to_string());
    }
    Ok(depths)
}

/// Columns and readings of one export, ready for depth selection.
#[derive(Debug, Clone)]
pub struct PreparedExport {
    pub columns: Vec<ColumnDescriptor>,
    pub readings: ReadingSet,
}

/// Runs the text-to-readings half of the pipeline for one channel kind.
pub fn prepare_export(
    csv: &str,
    kind: ChannelKind,
    tz: Tz,
    channel_depths: &ChannelDepthTable,
) -> Result<Outcome<PreparedExport>> {
    if csv.trim().is_empty() {
        return Ok(Outcome::NoData(NoDataReason::EmptyResponse));
    }

    let table = parse_table(csv)?;
    let Some(header) = table.header() else {
        return Ok(Outcome::NoData(NoDataReason::EmptyResponse));
    };
    if table.data_rows().is_empty() {
        return Ok(Outcome::NoData(NoDataReason::EmptyResponse));
    }

    let fallback = (!channel_depths.is_empty()).then_some(channel_depths);
    let columns = match identify_columns(header, kind, fallback) {
        Ok(columns) => columns,
        Err(ParserError::NoRecognizedColumns { .. }) => {
            debug!(%kind, header = ?header, "no columns recognized");
            return Ok(Outcome::NoData(NoDataReason::NoRecognizedColumns));
        }
        Err(err) => return Err(err.into()),
    };

    let readings = build_readings(&table, &columns, tz, kind.detects_fractional_units());
    if readings.is_empty() {
        return Ok(Outcome::NoData(NoDataReason::NoParseableReadings));
    }

    Ok(Outcome::Data(PreparedExport { columns, readings }))
}

/// Latest value and rolling average for each requested depth.
pub fn summarize_moisture(
    csv: &str,
    request: &MoistureRequest,
    now: DateTime<Utc>,
    channel_depths: &ChannelDepthTable,
) -> Result<Outcome<MoistureSummary>> {
    request.validate()?;
    let prepared = match prepare_export(
        csv,
        ChannelKind::Moisture,
        request.timezone,
        channel_depths,
    )? {
        Outcome::Data(prepared) => prepared,
        Outcome::NoData(reason) => return Ok(Outcome::NoData(reason)),
    };

    let mut depths = Vec::with_capacity(request.depths.len());
    for &requested in &request.depths {
        let Some(column) = select_nearest(&prepared.columns, requested) else {
            return Ok(Outcome::NoData(NoDataReason::NoRecognizedColumns));
        };
        let series = prepared.readings.series(column.column_index);
        let latest = aggregate::latest(&series);
        let window = aggregate::rolling_mean(&series, now, request.window_days);

        depths.push(DepthReading {
            depth_requested: requested,
            mapped_depth: round1(column.physical_depth),
            column: column.label.clone(),
            latest_value: latest.map(|sample| round1(sample.value)),
            latest_at: latest.map(|sample| sample.timestamp),
            window_average: window.map(|(average, _)| round1(average)),
            window_count: window.map(|(_, count)| count).unwrap_or(0),
        });
    }

    Ok(Outcome::Data(MoistureSummary {
        sensor: request.sensor.clone(),
        timezone: request.timezone.name().to_string(),
        window_days: request.window_days,
        depths,
    }))
}

/// Today's current/high/low/average at the nearest depth plus 7- and 30-day trends.
pub fn summarize_temperature(
    csv: &str,
    request: &TemperatureRequest,
    now: DateTime<Utc>,
    channel_depths: &ChannelDepthTable,
) -> Result<Outcome<TemperatureSummary>> {
    request.validate()?;
    let prepared = match prepare_export(
        csv,
        ChannelKind::Temperature,
        request.timezone,
        channel_depths,
    )? {
        Outcome::Data(prepared) => prepared,
        Outcome::NoData(reason) => return Ok(Outcome::NoData(reason)),
    };

    let Some(column) = select_nearest(&prepared.columns, request.depth) else {
        return Ok(Outcome::NoData(NoDataReason::NoRecognizedColumns));
    };
    let unit = request.unit;
    let series = prepared
        .readings
        .series(column.column_index)
        .map_values(|celsius| unit.convert_celsius(celsius));
    let aggregate = aggregate::aggregate(&series, now, request.timezone, &TREND_WINDOWS_DAYS);

    Ok(Outcome::Data(TemperatureSummary {
        sensor: request.sensor.clone(),
        timezone: request.timezone.name().to_string(),
        unit,
        requested_depth: request.depth,
        mapped_depth: round1(column.physical_depth),
        column: column.label.clone(),
        today: TodaySummary::from_aggregate(&aggregate, request.timezone),
        trend_7d: aggregate.trend(7).map(TrendSummary::from),
        trend_30d: aggregate.trend(30).map(TrendSummary::from),
    }))
}

/// Fetches one export per request and summarizes it. Holds no per-request state.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn ReadingSource>,
    channel_depths: ChannelDepthTable,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("channel_depths", &self.channel_depths)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(source: Arc<dyn ReadingSource>, channel_depths: ChannelDepthTable) -> Self {
        Self {
            source,
            channel_depths,
        }
    }

    pub fn from_settings(settings: &Settings) -> std::result::Result<Self, ConfigError> {
        let client = IrrimaxClient::new(&settings.upstream)?;
        Ok(Self::new(Arc::new(client), settings.channel_depth_table()?))
    }

    #[instrument(
        skip(self, request, cancel),
        fields(sensor = %request.sensor, request_id = %Uuid::new_v4())
    )]
    pub async fn moisture(
        &self,
        request: &MoistureRequest,
        now: DateTime<Utc>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Outcome<MoistureSummary>> {
        request.validate()?;
        let from = aggregate::window_start(now, request.lookback_days());
        let csv = self.fetch(&request.sensor, from, cancel).await?;
        let outcome = summarize_moisture(&csv, request, now, &self.channel_depths)?;
        log_outcome(&outcome);
        Ok(outcome)
    }

    #[instrument(
        skip(self, request, cancel),
        fields(sensor = %request.sensor, request_id = %Uuid::new_v4())
    )]
    pub async fn temperature(
        &self,
        request: &TemperatureRequest,
        now: DateTime<Utc>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Outcome<TemperatureSummary>> {
        request.validate()?;
        let from = aggregate::window_start(now, request.lookback_days());
        let csv = self.fetch(&request.sensor, from, cancel).await?;
        let outcome = summarize_temperature(&csv, request, now, &self.channel_depths)?;
        log_outcome(&outcome);
        Ok(outcome)
    }

    async fn fetch(
        &self,
        sensor: &str,
        from: DateTime<Utc>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let fetch = self.source.fetch_csv(sensor, from);
        let csv = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(PipelineError::Cancelled),
                result = fetch => result?,
            },
            None => fetch.await?,
        };
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(PipelineError::Cancelled);
        }
        debug!(bytes = csv.len(), "fetched export");
        Ok(csv)
    }
}

fn log_outcome<T>(outcome: &Outcome<T>) {
    match outcome {
        Outcome::Data(_) => info!("summary computed"),
        Outcome::NoData(reason) => info!(%reason, "no data for request"),
    }
}
