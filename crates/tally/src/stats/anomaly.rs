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

use super::{axis_labels, Analysis};
use crate::charts::{ChartDocument, ChartEmitter, ChartPoint, ChartSeries};
use crate::error::Result;
use crate::table;
use polars::prelude::*;

const IQR_FENCE: f64 = 1.5;

pub fn detect_anomalies(
    df: &DataFrame,
    date_col: Option<&str>,
    value_col: Option<&str>,
    emitter: &ChartEmitter,
) -> Result<Analysis> {
    let Some(value_col) = value_col else {
        return Ok(Analysis::insufficient(
            "Could not identify a primary numeric column for anomaly detection.",
        ));
    };
    if table::series_by_name(df, value_col).is_err() {
        return Ok(Analysis::insufficient(format!(
            "Column '{value_col}' not found."
        )));
    }

    let values = table::column_f64(df, value_col)?;
    let series = Series::new(
        "values".into(),
        values.iter().copied().collect::<Vec<Option<f64>>>(),
    );
    let ca = series.f64().map_err(crate::error::DataError::from)?;
    let q1 = ca.quantile(0.25, QuantileMethod::Linear).ok().flatten();
    let q3 = ca.quantile(0.75, QuantileMethod::Linear).ok().flatten();
    let (Some(q1), Some(q3)) = (q1, q3) else {
        return Ok(Analysis::insufficient(format!(
            "Column '{value_col}' has no numeric values to analyse."
        )));
    };

    let iqr = q3 - q1;
    let lower_bound = q1 - IQR_FENCE * iqr;
    let upper_bound = q3 + IQR_FENCE * iqr;

    let labels = axis_labels(df, date_col);
    let mut data_points = Vec::new();
    let mut anomaly_points = Vec::new();
    for (i, value) in values.iter().enumerate() {
        let Some(v) = value else { continue };
        let point = ChartPoint::new(labels[i].clone(), *v);
        if *v < lower_bound || *v > upper_bound {
            anomaly_points.push(point.clone());
        }
        data_points.push(point);
    }

    if anomaly_points.is_empty() {
        return Ok(Analysis::ready(
            "No significant anomalies detected in the data.",
            None,
            None,
        ));
    }

    let count = anomaly_points.len();
    let document = ChartDocument::single(
        format!("Anomaly Detection for {value_col}"),
        date_col.unwrap_or("Index"),
        value_col,
        vec![
            ChartSeries::line("Data", data_points),
            ChartSeries::scatter("Anomalies", anomaly_points),
        ],
    );
    let url = emitter.emit(&document, "anomaly_plot")?;

    let summary = format!(
        "Detected {count} potential anomalies in '{value_col}'. These are values significantly lower than {lower_bound:.2} or higher than {upper_bound:.2}."
    );
    Ok(Analysis::ready(summary, Some(url), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::AnalysisResult;

    fn run(df: &DataFrame, value_col: Option<&str>) -> Analysis {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ChartEmitter::new(dir.path());
        detect_anomalies(df, None, value_col, &emitter).unwrap()
    }

    #[test]
    fn single_spike_is_flagged_with_iqr_bounds() {
        let df = df!["amount" => &[10.0, 10.0, 10.0, 10.0, 100.0]].unwrap();
        let Analysis::Ready(AnalysisResult {
            summary,
            primary_image,
            ..
        }) = run(&df, Some("amount"))
        else {
            panic!("expected a ready analysis");
        };
        assert!(summary.starts_with("Detected 1 potential anomalies in 'amount'"));
        assert!(summary.contains("10.00"));
        assert!(primary_image.is_some());
    }

    #[test]
    fn uniform_data_reports_no_anomalies_without_image() {
        let df = df!["amount" => &[5.0, 5.0, 5.0, 5.0]].unwrap();
        let Analysis::Ready(result) = run(&df, Some("amount")) else {
            panic!("expected a ready analysis");
        };
        assert_eq!(result.summary, "No significant anomalies detected in the data.");
        assert!(result.primary_image.is_none());
    }

    #[test]
    fn missing_value_column_degrades() {
        let df = df!["amount" => &[1.0, 2.0]].unwrap();
        assert!(matches!(run(&df, None), Analysis::Insufficient(_)));
        assert!(matches!(run(&df, Some("other")), Analysis::Insufficient(_)));
    }
}
