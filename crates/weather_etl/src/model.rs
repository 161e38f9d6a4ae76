//! Records flowing through one pipeline run.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A city the pipeline forecasts for.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl City {
    pub fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
        }
    }
}

/// The static city list, in processing order.
pub fn default_cities() -> Vec<City> {
    vec![
        City::new("Moscow", 55.7558, 37.6173),
        City::new("Samara", 53.1959, 50.1002),
    ]
}

/// Next-day forecast for one city, as archived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecast {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub hourly: HourlySeries,
}

/// Parallel per-hour sequences, ascending by `time`.
///
/// Field names on the wire follow the Open-Meteo variable names. A `None`
/// value is an hour the upstream reported as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    #[serde(with = "minute_timestamps")]
    pub time: Vec<NaiveDateTime>,
    #[serde(rename = "temperature_2m")]
    pub temperature: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    #[serde(rename = "wind_speed_10m")]
    pub wind_speed: Vec<Option<f64>>,
    #[serde(rename = "wind_direction_10m")]
    pub wind_direction: Vec<Option<f64>>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// One row of `weather_hourly`. Missing readings load as `NULL`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRow {
    pub city: String,
    pub date: NaiveDate,
    pub hour: u8,
    pub temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
}

/// One row of `weather_daily`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRow {
    pub city: String,
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_avg: f64,
    pub precipitation_total: f64,
}

/// Daily rows of every city that produced one, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDigest {
    pub date: NaiveDate,
    pub entries: Vec<DailyRow>,
}

impl NotificationDigest {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `YYYY-MM-DDTHH:MM`, the local timestamp format Open-Meteo returns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Serde adapter for `Vec<NaiveDateTime>` in [`TIMESTAMP_FORMAT`].
mod minute_timestamps {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        times: &[NaiveDateTime],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(times.iter().map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<NaiveDateTime>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(de::Error::custom))
            .collect()
    }
}
