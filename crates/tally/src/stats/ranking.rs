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
use crate::charts::{ChartDocument, ChartEmitter, ChartPoint, ChartSeries, Mark};
use crate::error::Result;
use crate::table;
use polars::prelude::DataFrame;
use std::collections::{HashMap, HashSet};

const MIN_CARDINALITY: usize = 2;
const MAX_CARDINALITY: usize = 20;
const TOP_N: usize = 5;

fn unique_non_null(values: &[Option<String>]) -> usize {
    values
        .iter()
        .filter_map(|v| v.as_deref())
        .collect::<HashSet<_>>()
        .len()
}

// A "channel"-named column short-circuits the cardinality comparison: the
// first such column in column order wins regardless of its cardinality.
fn pick_categorical(df: &DataFrame) -> Option<String> {
    let mut best: Option<(String, usize)> = None;
    for column in df.get_columns() {
        let Some(series) = column.as_series() else {
            continue;
        };
        if table::is_numeric(series) {
            continue;
        }
        let name = series.name().to_string();
        let Ok(values) = table::column_strings(df, &name) else {
            continue;
        };
        let unique = unique_non_null(&values);
        if (MIN_CARDINALITY..=MAX_CARDINALITY).contains(&unique)
            && best.as_ref().map_or(true, |(_, card)| unique < *card)
        {
            best = Some((name.clone(), unique));
        }
        if name.to_lowercase().contains("channel") {
            return Some(name);
        }
    }
    best.map(|(name, _)| name)
}

pub fn top_categories(
    df: &DataFrame,
    value_col: Option<&str>,
    emitter: &ChartEmitter,
) -> Result<Analysis> {
    let Some(value_col) = value_col else {
        return Ok(Analysis::insufficient(
            "Could not identify a numeric value column for sales.",
        ));
    };
    if table::series_by_name(df, value_col).is_err() {
        return Ok(Analysis::insufficient(
            "Could not identify a numeric value column for sales.",
        ));
    }
    let Some(category_col) = pick_categorical(df) else {
        return Ok(Analysis::insufficient(
            "No suitable categorical column found for channels.",
        ));
    };

    let categories = table::column_strings(df, &category_col)?;
    let values = table::column_f64(df, value_col)?;
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (category, value) in categories.iter().zip(values.iter()) {
        if let (Some(category), Some(value)) = (category, value) {
            *totals.entry(category.clone()).or_insert(0.0) += value;
        }
    }

    let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(TOP_N);

    let points = ranked
        .into_iter()
        .map(|(category, total)| ChartPoint::new(category, total))
        .collect();
    let document = ChartDocument::single(
        "Top 5 Sales Channels",
        value_col,
        category_col.as_str(),
        vec![ChartSeries::new("Total", Mark::Bar, points)],
    );
    let url = emitter.emit(&document, "top_channels")?;

    Ok(Analysis::ready(
        format!("Top 5 '{category_col}' by total {value_col}."),
        Some(url),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn run(df: &DataFrame, value_col: Option<&str>) -> Analysis {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ChartEmitter::new(dir.path());
        top_categories(df, value_col, &emitter).unwrap()
    }

    #[test]
    fn channel_named_column_wins_over_lower_cardinality() {
        let df = df![
            "region" => &["n", "s", "n", "s"],
            "sales_channel" => &["web", "store", "app", "web"],
            "amount" => &[1.0, 2.0, 3.0, 4.0],
        ]
        .unwrap();
        assert_eq!(pick_categorical(&df), Some("sales_channel".to_string()));
    }

    #[test]
    fn lowest_cardinality_in_range_is_preferred_otherwise() {
        let df = df![
            "sku" => &["a", "b", "c", "d"],
            "region" => &["n", "s", "n", "s"],
            "amount" => &[1.0, 2.0, 3.0, 4.0],
        ]
        .unwrap();
        // "sku" is all-unique and matches the range [2, 20] too, but region's
        // cardinality of 2 is lower.
        assert_eq!(pick_categorical(&df), Some("region".to_string()));
    }

    #[test]
    fn aggregates_and_ranks_by_total() {
        let df = df![
            "channel" => &["web", "store", "web", "store", "app"],
            "amount" => &[10.0, 5.0, 30.0, 5.0, 1.0],
        ]
        .unwrap();
        let Analysis::Ready(result) = run(&df, Some("amount")) else {
            panic!("expected a ready analysis");
        };
        assert_eq!(result.summary, "Top 5 'channel' by total amount.");
        assert!(result.primary_image.is_some());
    }

    #[test]
    fn no_categorical_candidate_degrades() {
        let df = df![
            "a" => &[1.0, 2.0],
            "b" => &[3.0, 4.0],
        ]
        .unwrap();
        assert!(matches!(
            run(&df, Some("a")),
            Analysis::Insufficient(reason) if reason.contains("categorical")
        ));
    }

    #[test]
    fn missing_value_column_degrades() {
        let df = df!["channel" => &["a", "b"]].unwrap();
        assert!(matches!(run(&df, None), Analysis::Insufficient(_)));
    }
}
