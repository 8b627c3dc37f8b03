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

use super::Analysis;
use crate::charts::{ChartDocument, ChartEmitter, ChartPoint, ChartSeries};
use crate::error::Result;
use crate::{table, temporal};
use chrono::NaiveDateTime;
use linregress::{FormulaRegressionBuilder, RegressionDataBuilder};
use polars::prelude::DataFrame;

pub const DEFAULT_HORIZON: usize = 12;
const MIN_FIT_WINDOW: usize = 10;
const MIN_SUMMARY_WINDOW: usize = 6;

/// Least-squares degree-1 fit over positions `0..n`. Returns
/// `(slope, intercept)`; degenerate inputs fall back to a flat line at the
/// last observed value.
pub(crate) fn fit_line(values: &[f64]) -> (f64, f64) {
    let fallback = (0.0, values.last().copied().unwrap_or(0.0));
    if values.len() < 2 {
        return fallback;
    }
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let data = vec![
        ("Y".to_string(), values.to_vec()),
        ("X".to_string(), xs),
    ];
    let Ok(regression_data) = RegressionDataBuilder::new().build_from(data) else {
        return fallback;
    };
    let Ok(model) = FormulaRegressionBuilder::new()
        .data(&regression_data)
        .formula("Y ~ X")
        .fit()
    else {
        return fallback;
    };
    let params = model.parameters();
    // parameters() returns [intercept, slope]
    (params[1], params[0])
}

struct SeriesView {
    values: Vec<f64>,
    labels: Vec<String>,
    dates: Option<Vec<NaiveDateTime>>,
}

fn observed_series(df: &DataFrame, date_col: &str, value_col: &str) -> Result<SeriesView> {
    let values = table::column_f64(df, value_col)?;
    let date_strings = match table::column_strings(df, date_col) {
        Ok(strings) => strings,
        Err(_) => vec![None; values.len()],
    };

    let mut dated: Vec<(NaiveDateTime, f64)> = date_strings
        .iter()
        .zip(values.iter())
        .filter_map(|(date, value)| {
            let date = date.as_deref().and_then(temporal::parse_datetime)?;
            Some((date, (*value)?))
        })
        .collect();

    if dated.is_empty() {
        // No parseable dates at all: fall back to the positional index.
        let values: Vec<f64> = values.into_iter().flatten().collect();
        let labels = (0..values.len()).map(|i| i.to_string()).collect();
        return Ok(SeriesView {
            values,
            labels,
            dates: None,
        });
    }

    dated.sort_by_key(|(date, _)| *date);
    let (dates, values): (Vec<_>, Vec<_>) = dated.into_iter().unzip();
    let labels = dates.iter().map(temporal::format_datetime).collect();
    Ok(SeriesView {
        values,
        labels,
        dates: Some(dates),
    })
}

pub fn predict_timeseries(
    df: &DataFrame,
    date_col: Option<&str>,
    value_col: Option<&str>,
    horizon: usize,
    emitter: &ChartEmitter,
) -> Result<Analysis> {
    let (Some(date_col), Some(value_col)) = (date_col, value_col) else {
        return Ok(Analysis::insufficient(
            "Could not identify suitable date and value columns for forecasting.",
        ));
    };
    if table::series_by_name(df, value_col).is_err() {
        return Ok(Analysis::insufficient(format!(
            "Column '{value_col}' not found."
        )));
    }

    let series = observed_series(df, date_col, value_col)?;
    let n = series.values.len();
    if n == 0 {
        return Ok(Analysis::insufficient(format!(
            "Column '{value_col}' has no numeric values to forecast."
        )));
    }

    let window = MIN_FIT_WINDOW.max(2 * horizon).min(n);
    let recent = &series.values[n - window..];
    let (slope, intercept) = fit_line(recent);
    let predictions: Vec<f64> = (0..horizon)
        .map(|i| slope * (window + i) as f64 + intercept)
        .collect();

    let future_labels: Vec<String> = match &series.dates {
        Some(dates) => {
            let step = temporal::infer_frequency(dates);
            let last = *dates.last().expect("non-empty dated series");
            (1..=horizon)
                .map(|i| temporal::format_datetime(&(last + step * i as i32)))
                .collect()
        }
        None => (n..n + horizon).map(|i| i.to_string()).collect(),
    };

    let historical_points = series
        .labels
        .iter()
        .zip(series.values.iter())
        .map(|(label, value)| ChartPoint::new(label.clone(), *value))
        .collect();
    let forecast_points = future_labels
        .iter()
        .zip(predictions.iter())
        .map(|(label, value)| ChartPoint::new(label.clone(), *value))
        .collect();
    let document = ChartDocument::single(
        format!("Forecast for {value_col}"),
        if series.dates.is_some() {
            date_col
        } else {
            "Index"
        },
        value_col,
        vec![
            ChartSeries::line("Historical Data", historical_points),
            ChartSeries::line("Forecast", forecast_points).dashed(),
        ],
    );
    let url = emitter.emit(&document, "forecast_plot")?;

    let summary_window = n.min(MIN_SUMMARY_WINDOW.max(horizon));
    let recent_slice = &series.values[n - summary_window..];
    let recent_pct = if summary_window > 1 && recent_slice[0] != 0.0 {
        (recent_slice[summary_window - 1] - recent_slice[0]) / recent_slice[0] * 100.0
    } else {
        0.0
    };
    let last_historical = *series.values.last().expect("non-empty series");
    let forecast_change = predictions.last().copied().unwrap_or(last_historical) - last_historical;
    let direction = if forecast_change > 0.0 {
        "increase"
    } else if forecast_change < 0.0 {
        "decrease"
    } else {
        "remain roughly flat"
    };

    let summary = format!(
        "Forecast generated for the next {horizon} periods. Recent trend: {recent_pct:.1}% change over the last {summary_window} observations. The projection suggests a {direction} toward the horizon. See the chart for details."
    );
    Ok(Analysis::ready(summary, Some(url), None))
}
