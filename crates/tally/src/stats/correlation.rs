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
use crate::charts::{ChartDocument, ChartEmitter, ChartPanel, ChartPoint, ChartSeries};
use crate::error::Result;
use crate::table;
use itertools::Itertools;
use polars::prelude::DataFrame;

const MAX_PAIRS: usize = 6;

/// Pearson correlation over pairwise-complete observations. `NaN` when fewer
/// than two complete pairs exist or either side has zero variance.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let paired: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect();
    if paired.len() < 2 {
        return f64::NAN;
    }
    let n = paired.len() as f64;
    let mean_x = paired.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = paired.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &paired {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    covariance / denominator
}

pub fn linear_relationships(df: &DataFrame, emitter: &ChartEmitter) -> Result<Analysis> {
    let numeric_names = table::numeric_column_names(df);
    if numeric_names.len() < 2 {
        return Ok(Analysis::insufficient(
            "Not enough numeric columns to assess linear relations.",
        ));
    }

    let mut columns = Vec::with_capacity(numeric_names.len());
    for name in &numeric_names {
        columns.push((name.clone(), table::column_f64(df, name)?));
    }

    let mut pairs: Vec<(usize, usize, f64)> = (0..columns.len())
        .tuple_combinations()
        .filter_map(|(i, j)| {
            let r = pearson(&columns[i].1, &columns[j].1).abs();
            r.is_finite().then_some((i, j, r))
        })
        .collect();
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    pairs.truncate(MAX_PAIRS);
    if pairs.is_empty() {
        return Ok(Analysis::insufficient(
            "No clear linear relations found between numeric columns.",
        ));
    }

    let panels: Vec<ChartPanel> = pairs
        .iter()
        .map(|&(i, j, r)| {
            let (name_a, values_a) = &columns[i];
            let (name_b, values_b) = &columns[j];
            ChartPanel {
                title: Some(format!("{name_a} vs {name_b} (|r|={r:.2})")),
                series: vec![
                    ChartSeries::line(name_a.clone(), indexed_points(values_a)),
                    ChartSeries::line(name_b.clone(), indexed_points(values_b)),
                ],
            }
        })
        .collect();

    let document = ChartDocument {
        title: "Top linear relations".to_string(),
        x_label: "Index".to_string(),
        y_label: "Value".to_string(),
        panels,
    };
    let url = emitter.emit(&document, "linear_relations")?;
    Ok(Analysis::ready(
        "Plotted top linear relations across numeric columns.",
        Some(url),
        None,
    ))
}

fn indexed_points(values: &[Option<f64>]) -> Vec<ChartPoint> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, value)| value.map(|v| ChartPoint::new(i.to_string(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn run(df: &DataFrame) -> Analysis {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ChartEmitter::new(dir.path());
        linear_relationships(df, &emitter).unwrap()
    }

    #[test]
    fn perfectly_correlated_columns_score_one() {
        let a: Vec<Option<f64>> = vec![Some(1.0), Some(2.0), Some(3.0)];
        let b: Vec<Option<f64>> = vec![Some(2.0), Some(4.0), Some(6.0)];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_columns_produce_nan() {
        let a: Vec<Option<f64>> = vec![Some(1.0), Some(1.0), Some(1.0)];
        let b: Vec<Option<f64>> = vec![Some(2.0), Some(4.0), Some(6.0)];
        assert!(pearson(&a, &b).is_nan());
    }

    #[test]
    fn incomplete_rows_are_skipped_pairwise() {
        let a: Vec<Option<f64>> = vec![Some(1.0), None, Some(3.0), Some(4.0)];
        let b: Vec<Option<f64>> = vec![Some(2.0), Some(9.0), Some(6.0), Some(8.0)];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fewer_than_two_numeric_columns_is_insufficient() {
        let df = df!["label" => &["a", "b"], "v" => &[1.0, 2.0]].unwrap();
        assert!(matches!(run(&df), Analysis::Insufficient(_)));
    }

    #[test]
    fn strong_pairs_are_ranked_into_panels() {
        let df = df![
            "a" => &[1.0, 2.0, 3.0, 4.0],
            "b" => &[2.0, 4.0, 6.0, 8.0],
            "c" => &[4.0, 3.0, 2.0, 1.0],
        ]
        .unwrap();
        let Analysis::Ready(result) = run(&df) else {
            panic!("expected a ready analysis");
        };
        assert_eq!(
            result.summary,
            "Plotted top linear relations across numeric columns."
        );
        assert!(result.primary_image.is_some());
    }
}
