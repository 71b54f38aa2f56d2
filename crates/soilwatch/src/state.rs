use chrono_tz::Tz;
use soilwatch_core::config::{ConfigError, RequestDefaults, Settings};
use soilwatch_core::pipeline::parse_timezone;
use soilwatch_core::{MoistureRequest, Pipeline, PipelineError, TemperatureRequest, TemperatureUnit};

/// Shared by every handler; the pipeline itself keeps no per-request state.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: Pipeline,
    defaults: RequestDefaults,
    default_timezone: Tz,
}

impl AppState {
    pub fn new(pipeline: Pipeline, defaults: RequestDefaults) -> Result<Self, ConfigError> {
        let default_timezone = defaults.timezone()?;
        Ok(Self {
            pipeline,
            defaults,
            default_timezone,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::new(Pipeline::from_settings(settings)?, settings.defaults.clone())
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Fills unset parameters from the configured defaults.
    pub fn moisture_request(
        &self,
        sensor: Option<String>,
        timezone: Option<&str>,
        depths: Option<Vec<f64>>,
        window_days: Option<u32>,
    ) -> Result<MoistureRequest, PipelineError> {
        let request = MoistureRequest {
            sensor: required_sensor(sensor)?,
            timezone: self.timezone(timezone)?,
            depths: depths.unwrap_or_else(|| self.defaults.moisture_depths.clone()),
            window_days: window_days.unwrap_or(self.defaults.window_days),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn temperature_request(
        &self,
        sensor: Option<String>,
        timezone: Option<&str>,
        depth: Option<f64>,
        unit: Option<TemperatureUnit>,
    ) -> Result<TemperatureRequest, PipelineError> {
        let request = TemperatureRequest {
            sensor: required_sensor(sensor)?,
            timezone: self.timezone(timezone)?,
            depth: depth.unwrap_or(self.defaults.temperature_depth),
            unit: unit.unwrap_or(self.defaults.temperature_unit),
        };
        request.validate()?;
        Ok(request)
    }

    fn timezone(&self, raw: Option<&str>) -> Result<Tz, PipelineError> {
        match raw.map(str::trim).filter(|tz| !tz.is_empty()) {
            Some(tz) => parse_timezone(tz),
            None => Ok(self.default_timezone),
        }
    }
}

fn required_sensor(sensor: Option<String>) -> Result<String, PipelineError> {
    sensor
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PipelineError::InvalidRequest("missing required parameter 'sensor'".to_string()))
}
