use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::planner::PlanRequest;
use crate::predict::{GroundStation, TimeWindow};
use crate::scheduler::SelectOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid station coordinates: {0}")]
    Coordinates(String),
    #[error("Invalid reserved interval {start} - {end}")]
    Reserved {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub station: StationConfig,
    pub predict: PredictConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub name: Option<String>,
    pub coordinates: String,
    #[serde(default)]
    pub altitude_m: f64,
    /// Rise/set threshold; culmination is checked against `min_elevation_deg`.
    #[serde(default)]
    pub horizon_deg: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictConfig {
    pub tle_folder: PathBuf,
    pub transmitters_file: Option<PathBuf>,
    /// Transmitters below this success rate (0.0 - 1.0) are not planned.
    #[serde(default)]
    pub min_success_rate: f64,
    #[serde(default = "default_min_elevation")]
    pub min_elevation_deg: f64,
    #[serde(
        default = "default_min_pass_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub min_pass_duration: Duration,
    #[serde(default = "default_max_age", deserialize_with = "deserialize_duration")]
    pub max_age: Duration,
    pub workers: Option<usize>,
}

fn default_min_elevation() -> f64 {
    10.0
}

fn default_min_pass_duration() -> Duration {
    Duration::minutes(3)
}

fn default_max_age() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub buffer: Duration,
    pub fill_gaps: bool,
    pub allow_repeat: bool,
    pub min_priority: Option<f64>,
    pub only_priority: bool,
    pub priorities_file: Option<PathBuf>,
    pub reserved: Vec<ReservedWindow>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            duration: Duration::hours(24),
            buffer: Duration::zero(),
            fill_gaps: false,
            allow_repeat: false,
            min_priority: None,
            only_priority: false,
            priorities_file: None,
            reserved: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReservedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Human-readable duration such as `90s`, `3m` or `24h`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim())
        .map_err(|e| e.to_string())
        .and_then(|d| Duration::from_std(d).map_err(|e| e.to_string()))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn ground_station(&self) -> Result<GroundStation, ConfigError> {
        let station = GroundStation::from_coordinates(
            &self.station.coordinates,
            Some(self.station.altitude_m),
        )
        .ok_or_else(|| ConfigError::Coordinates(self.station.coordinates.clone()))?;
        Ok(station.with_horizon(self.station.horizon_deg))
    }

    pub fn select_options(&self) -> Result<SelectOptions, ConfigError> {
        let reserved = self
            .schedule
            .reserved
            .iter()
            .map(|r| {
                let window = TimeWindow::new(r.start, r.end);
                if window.is_valid() {
                    Ok(window)
                } else {
                    Err(ConfigError::Reserved {
                        start: r.start,
                        end: r.end,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SelectOptions {
            buffer: self.schedule.buffer,
            fill_gaps: self.schedule.fill_gaps,
            min_elevation_deg: self.predict.min_elevation_deg,
            allow_repeat: self.schedule.allow_repeat,
            min_priority: self.schedule.min_priority,
            only_priority: self.schedule.only_priority,
            reserved,
        })
    }

    /// Request covering `[start, start + schedule.duration)`.
    pub fn plan_request(&self, start: DateTime<Utc>) -> Result<PlanRequest, ConfigError> {
        Ok(PlanRequest {
            station_name: self.station.name.clone(),
            station: self.ground_station()?,
            window: TimeWindow::new(start, start + self.schedule.duration),
            min_pass_duration: self.predict.min_pass_duration,
            select: self.select_options()?,
            workers: self.predict.workers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
station:
  coordinates: "48.1351, 11.5820"
predict:
  tle_folder: /var/lib/tle
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_str(MINIMAL).unwrap();
        assert_eq!(config.predict.min_elevation_deg, 10.0);
        assert_eq!(config.predict.min_pass_duration, Duration::minutes(3));
        assert_eq!(config.predict.max_age, Duration::hours(24));
        assert_eq!(config.schedule.duration, Duration::hours(24));
        assert_eq!(config.schedule.buffer, Duration::zero());
        assert!(!config.schedule.fill_gaps);
        assert!(config.predict.workers.is_none());
    }

    #[test]
    fn parses_full_config() {
        let yaml = r#"
station:
  name: Garching
  coordinates: "48.2649, 11.6713"
  altitude_m: 480
  horizon_deg: 5
predict:
  tle_folder: ./tle
  transmitters_file: ./transmitters.txt
  min_success_rate: 0.8
  min_elevation_deg: 20
  min_pass_duration: 5m
  max_age: 12h
  workers: 4
schedule:
  duration: 12h
  buffer: 90s
  fill_gaps: true
  min_priority: 0.5
  priorities_file: ./priorities.txt
  reserved:
    - start: 2024-03-01T10:00:00Z
      end: 2024-03-01T10:30:00Z
"#;
        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.station.name.as_deref(), Some("Garching"));
        assert_eq!(config.predict.min_pass_duration, Duration::minutes(5));
        assert_eq!(config.schedule.buffer, Duration::seconds(90));
        assert_eq!(config.predict.workers, Some(4));
        assert_eq!(config.predict.min_success_rate, 0.8);

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let request = config.plan_request(start).unwrap();
        assert_eq!(request.window.end, start + Duration::hours(12));
        assert_eq!(request.station.horizon_deg, 5.0);
        assert_eq!(request.select.min_elevation_deg, 20.0);
        assert_eq!(request.station_name.as_deref(), Some("Garching"));
        assert_eq!(request.select.min_priority, Some(0.5));
        assert_eq!(request.select.reserved.len(), 1);
        assert!(request.select.fill_gaps);
    }

    #[test]
    fn rejects_bad_duration() {
        let yaml = format!("{}schedule:\n  buffer: soon\n", MINIMAL);
        assert!(matches!(Config::from_str(&yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn rejects_bad_coordinates() {
        let yaml = MINIMAL.replace("48.1351, 11.5820", "north pole");
        let config = Config::from_str(&yaml).unwrap();
        assert!(matches!(
            config.ground_station(),
            Err(ConfigError::Coordinates(_))
        ));
    }

    #[test]
    fn rejects_inverted_reserved_interval() {
        let yaml = format!(
            "{}schedule:\n  reserved:\n    - start: 2024-03-01T11:00:00Z\n      end: 2024-03-01T10:00:00Z\n",
            MINIMAL
        );
        let config = Config::from_str(&yaml).unwrap();
        assert!(matches!(
            config.select_options(),
            Err(ConfigError::Reserved { .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.predict.tle_folder, PathBuf::from("/var/lib/tle"));
    }

    #[test]
    fn example_config_is_valid() {
        let config = Config::from_str(include_str!("../config.example.yaml")).unwrap();
        assert_eq!(config.schedule.buffer, Duration::seconds(60));
        assert!(config.ground_station().is_ok());
        assert!(config.select_options().unwrap().reserved.is_empty());
    }

    #[test]
    fn parse_duration_accepts_humantime() {
        assert_eq!(parse_duration(" 24h ").unwrap(), Duration::hours(24));
        assert!(parse_duration("tomorrow").is_err());
    }
}
