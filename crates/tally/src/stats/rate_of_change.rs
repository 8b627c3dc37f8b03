// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use super::forecast::fit_line;
use super::Analysis;
use crate::charts::{ChartDocument, ChartEmitter, ChartPoint, ChartSeries};
use crate::error::Result;
use crate::{table, temporal};
use chrono::{Datelike, Duration, NaiveDate};
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const EXPORT_FILENAME: &str = "sales_roc.json";
const ROC_FORECAST_HORIZON: usize = 14;
const ROC_FIT_WINDOW: usize = 60;
const MIN_RATES_FOR_FORECAST: usize = 5;
const BUCKET_MONTHS: i32 = 2;

/// Consecutive percentage change. The first element is always undefined, as
/// is any element whose predecessor is missing or zero.
pub fn percentage_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut rates = vec![None; values.len()];
    for i in 1..values.len() {
        if let (Some(prev), Some(current)) = (values[i - 1], values[i]) {
            if prev != 0.0 {
                rates[i] = Some((current - prev) / prev * 100.0);
            }
        }
    }
    rates
}

fn interpolate_both_directions(values: &mut [Option<f64>]) {
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();
    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return;
    };
    for i in 0..first {
        values[i] = values[first];
    }
    for i in last + 1..values.len() {
        values[i] = values[last];
    }
    for window in known.windows(2) {
        let (a, b) = (window[0], window[1]);
        if b <= a + 1 {
            continue;
        }
        let (Some(va), Some(vb)) = (values[a], values[b]) else {
            continue;
        };
        let span = (b - a) as f64;
        for i in a + 1..b {
            values[i] = Some(va + (vb - va) * ((i - a) as f64 / span));
        }
    }
}

// Daily grid from the first to the last observed date; duplicate dates keep
// the last observation, gaps are interpolated in both directions.
fn resample_daily(rows: &[(NaiveDate, Option<f64>)]) -> (Vec<NaiveDate>, Vec<Option<f64>>) {
    let first = rows[0].0;
    let last = rows[rows.len() - 1].0;
    let mut by_day: HashMap<NaiveDate, f64> = HashMap::new();
    for (date, value) in rows {
        if let Some(v) = value {
            by_day.insert(*date, *v);
        }
    }
    let span_days = (last - first).num_days();
    let days: Vec<NaiveDate> = (0..=span_days).map(|i| first + Duration::days(i)).collect();
    let mut values: Vec<Option<f64>> = days.iter().map(|day| by_day.get(day).copied()).collect();
    interpolate_both_directions(&mut values);
    (days, values)
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn two_month_means(days: &[NaiveDate], rates: &[Option<f64>]) -> Vec<ChartPoint> {
    let Some(&first_day) = days.first() else {
        return Vec::new();
    };
    let base = month_index(first_day);
    let mut buckets: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for (day, rate) in days.iter().zip(rates.iter()) {
        let Some(rate) = rate else { continue };
        let bucket = (month_index(*day) - base) / BUCKET_MONTHS;
        let entry = buckets.entry(bucket).or_insert((0.0, 0));
        entry.0 += rate;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .filter_map(|(bucket, (sum, count))| {
            let start = base + bucket * BUCKET_MONTHS;
            let year = start.div_euclid(12);
            let month = start.rem_euclid(12) as u32 + 1;
            let label = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(ChartPoint::new(
                label.format("%Y-%m-%d").to_string(),
                sum / count as f64,
            ))
        })
        .collect()
}

fn roc_forecast_document(days: &[NaiveDate], rates: &[Option<f64>]) -> Option<ChartDocument> {
    let clean: Vec<(NaiveDate, f64)> = days
        .iter()
        .zip(rates.iter())
        .filter_map(|(day, rate)| rate.filter(|r| r.is_finite()).map(|r| (*day, r)))
        .collect();
    if clean.len() < MIN_RATES_FOR_FORECAST {
        return None;
    }
    let values: Vec<f64> = clean.iter().map(|(_, v)| *v).collect();
    let window = ROC_FIT_WINDOW.min(values.len());
    let recent = &values[values.len() - window..];
    let (slope, intercept) = fit_line(recent);
    let last_date = clean[clean.len() - 1].0;
    let forecast_points: Vec<ChartPoint> = (0..ROC_FORECAST_HORIZON)
        .map(|i| {
            let date = last_date + Duration::days(i as i64 + 1);
            ChartPoint::new(
                date.format("%Y-%m-%d").to_string(),
                slope * (window + i) as f64 + intercept,
            )
        })
        .collect();
    let historical_points = clean
        .iter()
        .map(|(day, value)| ChartPoint::new(day.format("%Y-%m-%d").to_string(), *value))
        .collect();
    Some(ChartDocument::single(
        "Rate-of-Change Forecast (%)",
        "Date",
        "Percentage Change (%)",
        vec![
            ChartSeries::line("ROC (historical)", historical_points),
            ChartSeries::line("ROC forecast", forecast_points).dashed(),
        ],
    ))
}

pub fn rate_of_change(
    df: &DataFrame,
    date_col: Option<&str>,
    value_col: Option<&str>,
    two_month_window: bool,
    emitter: &ChartEmitter,
) -> Result<Analysis> {
    let Some(value_col) = value_col else {
        return Ok(Analysis::insufficient(
            "Could not identify a numeric column for rate-of-change.",
        ));
    };
    let values = table::column_f64(df, value_col)?;

    let dated_rows: Option<Vec<(NaiveDate, Option<f64>)>> = date_col
        .and_then(|name| table::column_strings(df, name).ok())
        .map(|dates| {
            let mut rows: Vec<(NaiveDate, Option<f64>)> = dates
                .iter()
                .zip(values.iter())
                .filter_map(|(date, value)| {
                    let date = date.as_deref().and_then(temporal::parse_datetime)?;
                    Some((date.date(), *value))
                })
                .collect();
            rows.sort_by_key(|(date, _)| *date);
            rows
        })
        .filter(|rows| !rows.is_empty());

    let mut series = Vec::new();
    let mut secondary_document = None;
    let dated = dated_rows.is_some();

    if let Some(rows) = dated_rows {
        let (days, daily) = resample_daily(&rows);
        let rates = percentage_change(&daily);
        let points: Vec<ChartPoint> = days
            .iter()
            .zip(rates.iter())
            .filter_map(|(day, rate)| {
                rate.map(|r| ChartPoint::new(day.format("%Y-%m-%d").to_string(), r))
            })
            .collect();
        series.push(ChartSeries::line("Rate of change", points));
        if two_month_window {
            series.push(ChartSeries::line("2-month avg", two_month_means(&days, &rates)));
        }
        secondary_document = roc_forecast_document(&days, &rates);
    } else {
        let rates = percentage_change(&values);
        let points: Vec<ChartPoint> = rates
            .iter()
            .enumerate()
            .filter_map(|(i, rate)| rate.map(|r| ChartPoint::new(i.to_string(), r)))
            .collect();
        series.push(ChartSeries::line("Rate of change", points));
    }

    let document = ChartDocument::single(
        format!("Daily Rate of Change in {value_col} (%)"),
        if dated { "Date" } else { "Index" },
        "Percentage Change (%)",
        series,
    );
    let primary_url = emitter.emit(&document, "roc_plot")?;
    emitter.export_copy("roc_plot", Path::new(EXPORT_FILENAME));

    let secondary_url = match secondary_document {
        Some(doc) => Some(emitter.emit(&doc, "roc_forecast_plot")?),
        None => None,
    };

    let summary = format!(
        "Computed daily percentage rate of change and generated the plot. A 2-month average line is included for smoother trends. An export copy was saved as '{EXPORT_FILENAME}'."
    );
    Ok(Analysis::ready(summary, Some(primary_url), secondary_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::AnalysisResult;
    use polars::prelude::*;

    fn run(df: &DataFrame, date: Option<&str>, value: Option<&str>) -> Analysis {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ChartEmitter::new(dir.path());
        rate_of_change(df, date, value, true, &emitter).unwrap()
    }

    #[test]
    fn constant_series_yields_zero_rates_after_the_first() {
        let rates = percentage_change(&[Some(5.0), Some(5.0), Some(5.0), Some(5.0)]);
        assert_eq!(rates[0], None);
        assert!(rates[1..].iter().all(|r| *r == Some(0.0)));
    }

    #[test]
    fn zero_predecessor_leaves_the_rate_undefined() {
        let rates = percentage_change(&[Some(0.0), Some(10.0)]);
        assert_eq!(rates, vec![None, None]);
    }

    #[test]
    fn interpolation_fills_interior_and_edge_gaps() {
        let mut values = vec![None, Some(1.0), None, Some(3.0), None];
        interpolate_both_directions(&mut values);
        assert_eq!(
            values,
            vec![Some(1.0), Some(1.0), Some(2.0), Some(3.0), Some(3.0)]
        );
    }

    #[test]
    fn dated_series_produces_primary_and_secondary_charts() {
        let dates: Vec<String> = (1..=10).map(|d| format!("2024-01-{d:02}")).collect();
        let values: Vec<f64> = (1..=10).map(|v| f64::from(v) * 10.0).collect();
        let df = df!["date" => dates, "total" => values].unwrap();
        let Analysis::Ready(AnalysisResult {
            primary_image,
            secondary_image,
            ..
        }) = run(&df, Some("date"), Some("total"))
        else {
            panic!("expected a ready analysis");
        };
        assert!(primary_image.is_some());
        assert!(secondary_image.is_some());
    }

    #[test]
    fn undated_series_has_no_secondary_chart() {
        let df = df!["total" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]].unwrap();
        let Analysis::Ready(result) = run(&df, None, Some("total")) else {
            panic!("expected a ready analysis");
        };
        assert!(result.primary_image.is_some());
        assert!(result.secondary_image.is_none());
    }

    #[test]
    fn missing_value_column_degrades() {
        let df = df!["a" => &[1.0]].unwrap();
        assert!(matches!(run(&df, None, None), Analysis::Insufficient(_)));
    }

    #[test]
    fn two_month_buckets_anchor_to_the_first_month() {
        let days = vec![
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        ];
        let rates = vec![Some(10.0), Some(20.0), Some(40.0)];
        let means = two_month_means(&days, &rates);
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].x, "2024-01-01");
        assert!((means[0].y - 15.0).abs() < 1e-9);
        assert_eq!(means[1].x, "2024-03-01");
        assert!((means[1].y - 40.0).abs() < 1e-9);
    }
}
