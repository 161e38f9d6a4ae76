//! Raw forecast to hourly rows, hourly rows to daily aggregates.

use chrono::{NaiveDate, Timelike};

use crate::error::TransformError;
use crate::model::{DailyRow, HourlyRow, RawForecast};

/// Reshape the parallel series into one row per timestamp, in input order.
pub fn to_hourly(forecast: &RawForecast) -> Result<Vec<HourlyRow>, TransformError> {
    let hourly = &forecast.hourly;
    if hourly.is_empty() {
        log::warn!(
            "[Transform] {}: no hourly data, producing no rows",
            forecast.city
        );
        return Ok(Vec::new());
    }

    let expected = hourly.len();
    for (series, actual) in [
        ("temperature", hourly.temperature.len()),
        ("precipitation", hourly.precipitation.len()),
        ("wind_speed", hourly.wind_speed.len()),
        ("wind_direction", hourly.wind_direction.len()),
    ] {
        if actual != expected {
            return Err(TransformError::RaggedSeries {
                series,
                expected,
                actual,
            });
        }
    }

    Ok(hourly
        .time
        .iter()
        .enumerate()
        .map(|(i, ts)| HourlyRow {
            city: forecast.city.clone(),
            date: ts.date(),
            hour: ts.hour() as u8,
            temperature: hourly.temperature[i],
            precipitation: hourly.precipitation[i],
            wind_speed: hourly.wind_speed[i],
            wind_direction: hourly.wind_direction[i],
        })
        .collect())
}

/// One row per `(city, date)` group with temperature stats and rainfall sum.
///
/// Groups are emitted in order of first appearance. Missing readings are
/// left out of the stats; a group with no temperature at all produces no row.
pub fn to_daily(rows: &[HourlyRow]) -> Vec<DailyRow> {
    if rows.is_empty() {
        log::warn!("[Transform] no hourly rows to aggregate");
        return Vec::new();
    }

    let mut groups: Vec<((&str, NaiveDate), Vec<&HourlyRow>)> = Vec::new();
    for row in rows {
        let key = (row.city.as_str(), row.date);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    groups
        .into_iter()
        .filter_map(|((city, date), members)| {
            let temps: Vec<f64> = members.iter().filter_map(|r| r.temperature).collect();
            if temps.is_empty() {
                log::warn!("[Transform] {}: no temperature readings for {}", city, date);
                return None;
            }
            let temp_min = temps.iter().copied().fold(f64::INFINITY, f64::min);
            let temp_max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let temp_avg = temps.iter().sum::<f64>() / temps.len() as f64;
            let precipitation_total = members
                .iter()
                .filter_map(|r| r.precipitation)
                .sum::<f64>();
            Some(DailyRow {
                city: city.to_string(),
                date,
                temp_min,
                temp_max,
                temp_avg: round2(temp_avg),
                precipitation_total: round2(precipitation_total),
            })
        })
        .collect()
}

/// Round to 2 decimals, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HourlySeries;
    use chrono::NaiveDateTime;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
    }

    fn at(hour: u32) -> NaiveDateTime {
        date().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn forecast(temps: &[f64], precip: &[f64]) -> RawForecast {
        let temps: Vec<Option<f64>> = temps.iter().copied().map(Some).collect();
        let precip: Vec<Option<f64>> = precip.iter().copied().map(Some).collect();
        with_gaps(&temps, &precip)
    }

    fn with_gaps(temps: &[Option<f64>], precip: &[Option<f64>]) -> RawForecast {
        let n = temps.len();
        RawForecast {
            city: "Moscow".to_string(),
            latitude: 55.75,
            longitude: 37.625,
            hourly: HourlySeries {
                time: (0..n as u32).map(at).collect(),
                temperature: temps.to_vec(),
                precipitation: precip.to_vec(),
                wind_speed: vec![Some(4.0); n],
                wind_direction: vec![Some(200.0); n],
            },
        }
    }

    #[test]
    fn one_row_per_timestamp() {
        let temps: Vec<f64> = (0..24).map(|h| h as f64 * 0.5).collect();
        let raw = forecast(&temps, &[0.0; 24]);
        let rows = to_hourly(&raw).unwrap();

        assert_eq!(rows.len(), 24);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.hour as usize, i);
            assert_eq!(row.date, date());
            assert_eq!(row.city, "Moscow");
            assert_eq!(row.temperature, Some(temps[i]));
        }
    }

    #[test]
    fn hourly_preserves_input_order() {
        let mut raw = forecast(&[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0]);
        raw.hourly.time = vec![at(5), at(3), at(9)];
        let hours: Vec<u8> = to_hourly(&raw).unwrap().iter().map(|r| r.hour).collect();
        assert_eq!(hours, vec![5, 3, 9]);
    }

    #[test]
    fn empty_forecast_gives_no_rows() {
        let raw = forecast(&[], &[]);
        assert!(to_hourly(&raw).unwrap().is_empty());
    }

    #[test]
    fn ragged_series_is_rejected() {
        let mut raw = forecast(&[1.0, 2.0], &[0.0, 0.0]);
        raw.hourly.wind_speed.pop();
        let err = to_hourly(&raw).unwrap_err();
        assert!(matches!(
            err,
            TransformError::RaggedSeries {
                series: "wind_speed",
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn daily_stats() {
        let rows = to_hourly(&forecast(&[10.0, 15.0, 20.0], &[1.0, 2.0, 3.0])).unwrap();
        let daily = to_daily(&rows);

        assert_eq!(daily.len(), 1);
        let day = &daily[0];
        assert_eq!(day.city, "Moscow");
        assert_eq!(day.date, date());
        assert_eq!(day.temp_min, 10.0);
        assert_eq!(day.temp_max, 20.0);
        assert_eq!(day.temp_avg, 15.0);
        assert_eq!(day.precipitation_total, 6.0);
    }

    #[test]
    fn daily_rounds_mean_and_total() {
        let rows = to_hourly(&forecast(&[1.0, 2.0, 2.0], &[0.1, 0.2, 0.004])).unwrap();
        let day = &to_daily(&rows)[0];
        assert_eq!(day.temp_avg, 1.67);
        assert_eq!(day.precipitation_total, 0.3);
    }

    #[test]
    fn negative_temperatures() {
        let rows = to_hourly(&forecast(&[-15.5, -8.0, -3.25], &[0.0, 0.0, 0.0])).unwrap();
        let day = &to_daily(&rows)[0];
        assert_eq!(day.temp_min, -15.5);
        assert_eq!(day.temp_max, -3.25);
        assert_eq!(day.temp_avg, -8.92);
    }

    #[test]
    fn empty_hourly_gives_no_daily_row() {
        assert!(to_daily(&[]).is_empty());
    }

    #[test]
    fn groups_by_city_and_date() {
        let mut rows = to_hourly(&forecast(&[1.0, 3.0], &[0.0, 0.0])).unwrap();
        let mut other = to_hourly(&forecast(&[5.0], &[2.0])).unwrap();
        other[0].date = date().succ_opt().unwrap();
        rows.append(&mut other);

        let daily = to_daily(&rows);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].temp_avg, 2.0);
        assert_eq!(daily[1].temp_max, 5.0);
        assert_eq!(daily[1].precipitation_total, 2.0);
    }

    #[test]
    fn null_readings_are_left_out_of_daily_stats() {
        let raw = with_gaps(
            &[Some(10.0), None, Some(20.0)],
            &[Some(1.5), Some(2.0), None],
        );
        let rows = to_hourly(&raw).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].temperature, None);
        assert_eq!(rows[2].precipitation, None);

        let day = &to_daily(&rows)[0];
        assert_eq!(day.temp_min, 10.0);
        assert_eq!(day.temp_max, 20.0);
        assert_eq!(day.temp_avg, 15.0);
        assert_eq!(day.precipitation_total, 3.5);
    }

    #[test]
    fn day_without_any_temperature_is_dropped() {
        let rows = to_hourly(&with_gaps(&[None, None], &[Some(1.0), None])).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(to_daily(&rows).is_empty());
    }

    #[test]
    fn hourly_row_serializes_missing_reading_as_null() {
        let rows = to_hourly(&with_gaps(&[None], &[Some(0.5)])).unwrap();
        let value = serde_json::to_value(&rows[0]).unwrap();
        assert!(value["temperature"].is_null());
        assert_eq!(value["precipitation"], 0.5);
    }

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(2.125), 2.13);
        assert_eq!(round2(-2.125), -2.13);
        assert_eq!(round2(15.0), 15.0);
    }
}
