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

use crate::charts::{
    chart_file_stem, ChartDocument, ChartEmitter, ChartPoint, ChartSeries, Mark,
};
use crate::intent::ChartKind;
use crate::stats::correlation::pearson;
use crate::{table, temporal};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use tracing::warn;

const UNSUPPORTED: &str = "Unsupported chart or missing columns.";

const REVENUE_TERMS: &[&str] = &["revenue", "sales", "gross_sales", "total_revenue", "net_cash_in"];
const COGS_TERMS: &[&str] = &["cogs", "cost_of_goods", "cost of goods", "cost"];
const OPEX_TERMS: &[&str] = &["opex", "operating_exp", "operating expenses", "total_opex", "expenses"];
const INCOME_TERMS: &[&str] = &["operating_income", "ebit", "net_income", "profit"];

/// Renders one of the generic chart kinds for the dispatcher. Implementations
/// must tolerate absent date and value columns by positional indexing and
/// must report failure as a message rather than an error.
pub trait ChartRenderer: Send + Sync {
    fn render(
        &self,
        kind: ChartKind,
        df: &DataFrame,
        date_col: Option<&str>,
        value_col: Option<&str>,
    ) -> (String, Option<String>);
}

pub struct SpecRenderer {
    emitter: ChartEmitter,
}

impl SpecRenderer {
    pub fn new(emitter: ChartEmitter) -> Self {
        Self { emitter }
    }
}

impl ChartRenderer for SpecRenderer {
    fn render(
        &self,
        kind: ChartKind,
        df: &DataFrame,
        date_col: Option<&str>,
        value_col: Option<&str>,
    ) -> (String, Option<String>) {
        let (message, document) = build_chart(kind, df, date_col, value_col);
        let Some(document) = document else {
            return (message, None);
        };
        match self.emitter.emit(&document, chart_file_stem(kind)) {
            Ok(url) => (message, Some(url)),
            Err(err) => {
                warn!(kind = kind.as_str(), error = %err, "chart document emission failed");
                (message, None)
            }
        }
    }
}

fn build_chart(
    kind: ChartKind,
    df: &DataFrame,
    date_col: Option<&str>,
    value_col: Option<&str>,
) -> (String, Option<ChartDocument>) {
    match kind {
        ChartKind::Line | ChartKind::Area => timeline_chart(kind, df, date_col, value_col),
        ChartKind::Bar => bar_chart(df, value_col),
        ChartKind::Pie => pie_chart(df, value_col),
        ChartKind::Scatter => scatter_chart(df),
        ChartKind::Box => box_chart(df),
        ChartKind::Heatmap => heatmap_chart(df),
        ChartKind::Waterfall => waterfall_chart(df),
    }
}

fn timeline_chart(
    kind: ChartKind,
    df: &DataFrame,
    date_col: Option<&str>,
    value_col: Option<&str>,
) -> (String, Option<ChartDocument>) {
    let Some(value_col) = value_col else {
        return (UNSUPPORTED.to_string(), None);
    };
    let Ok(values) = table::column_f64(df, value_col) else {
        return (UNSUPPORTED.to_string(), None);
    };
    let points = time_ordered_points(df, date_col, &values);
    let (title, mark, message) = match kind {
        ChartKind::Area => (
            format!("Area chart for {value_col}"),
            Mark::Area,
            "Area chart generated.".to_string(),
        ),
        _ => (
            format!("{value_col} over time"),
            Mark::Line,
            format!("Line chart for {value_col} generated."),
        ),
    };
    let document = ChartDocument::single(
        title,
        date_col.unwrap_or("Index"),
        value_col,
        vec![ChartSeries::new(value_col, mark, points)],
    );
    (message, Some(document))
}

fn bar_chart(df: &DataFrame, value_col: Option<&str>) -> (String, Option<ChartDocument>) {
    let Some(value_col) = value_col else {
        return (UNSUPPORTED.to_string(), None);
    };
    let Some(category) = first_categorical(df) else {
        return ("No categorical column found for bar chart.".to_string(), None);
    };
    let totals = grouped_totals(df, &category, value_col, 10);
    let points = totals
        .into_iter()
        .map(|(label, total)| ChartPoint::new(label, total))
        .collect();
    let document = ChartDocument::single(
        format!("{value_col} by {category}"),
        category.as_str(),
        value_col,
        vec![ChartSeries::bar(value_col, points)],
    );
    (format!("Bar chart by {category} generated."), Some(document))
}

fn pie_chart(df: &DataFrame, value_col: Option<&str>) -> (String, Option<ChartDocument>) {
    let Some(value_col) = value_col else {
        return (UNSUPPORTED.to_string(), None);
    };
    let Some(category) = first_categorical(df) else {
        return ("No categorical column found for pie chart.".to_string(), None);
    };
    let totals = grouped_totals(df, &category, value_col, 6);
    let points = totals
        .into_iter()
        .map(|(label, total)| ChartPoint::new(label, total))
        .collect();
    let document = ChartDocument::single(
        format!("{value_col} composition by {category}"),
        category.as_str(),
        value_col,
        vec![ChartSeries::new(value_col, Mark::Pie, points)],
    );
    ("Pie chart generated.".to_string(), Some(document))
}

fn scatter_chart(df: &DataFrame) -> (String, Option<ChartDocument>) {
    let numeric = table::numeric_column_names(df);
    if numeric.len() < 2 {
        return ("Not enough numeric columns for scatter plot.".to_string(), None);
    }
    let (x_col, y_col) = (&numeric[0], &numeric[1]);
    let (Ok(xs), Ok(ys)) = (table::column_f64(df, x_col), table::column_f64(df, y_col)) else {
        return (UNSUPPORTED.to_string(), None);
    };
    let points = xs
        .iter()
        .zip(ys.iter())
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(ChartPoint::new(x.to_string(), *y)),
            _ => None,
        })
        .collect();
    let document = ChartDocument::single(
        format!("Scatter: {y_col} vs {x_col}"),
        x_col.as_str(),
        y_col.as_str(),
        vec![ChartSeries::scatter(y_col.as_str(), points)],
    );
    ("Scatter plot generated.".to_string(), Some(document))
}

fn box_chart(df: &DataFrame) -> (String, Option<ChartDocument>) {
    let numeric = table::numeric_column_names(df);
    if numeric.is_empty() {
        return ("No numeric columns for box plot.".to_string(), None);
    }
    let mut series = Vec::new();
    for name in &numeric {
        let Ok(values) = table::column_f64(df, name) else {
            continue;
        };
        let Some(summary) = five_number_summary(&values) else {
            continue;
        };
        let labels = ["min", "q1", "median", "q3", "max"];
        let points = labels
            .iter()
            .zip(summary.iter())
            .map(|(label, value)| ChartPoint::new(*label, *value))
            .collect();
        series.push(ChartSeries::new(name.as_str(), Mark::Box, points));
    }
    let document = ChartDocument::single("Box plot of numeric columns", "Statistic", "Value", series);
    ("Box plot generated.".to_string(), Some(document))
}

fn heatmap_chart(df: &DataFrame) -> (String, Option<ChartDocument>) {
    let numeric = table::numeric_column_names(df);
    if numeric.len() < 2 {
        return ("Not enough numeric columns for heatmap.".to_string(), None);
    }
    let mut columns = Vec::with_capacity(numeric.len());
    for name in &numeric {
        let Ok(values) = table::column_f64(df, name) else {
            return (UNSUPPORTED.to_string(), None);
        };
        columns.push((name.clone(), values));
    }
    let series = columns
        .iter()
        .map(|(name, values)| {
            let points = columns
                .iter()
                .map(|(other, other_values)| {
                    ChartPoint::new(other.clone(), pearson(values, other_values))
                })
                .collect();
            ChartSeries::new(name.clone(), Mark::Heatmap, points)
        })
        .collect();
    let document = ChartDocument {
        title: "Correlation Heatmap".to_string(),
        x_label: "Column".to_string(),
        y_label: "Column".to_string(),
        panels: vec![crate::charts::ChartPanel {
            title: None,
            series,
        }],
    };
    ("Heatmap generated.".to_string(), Some(document))
}

fn waterfall_chart(df: &DataFrame) -> (String, Option<ChartDocument>) {
    let revenue_col = find_numeric_by_terms(df, REVENUE_TERMS);
    let cogs_col = find_numeric_by_terms(df, COGS_TERMS);
    let opex_col = find_numeric_by_terms(df, OPEX_TERMS);
    let income_col = find_numeric_by_terms(df, INCOME_TERMS);

    let Some(revenue_col) = revenue_col else {
        return (waterfall_failure_message(), None);
    };
    if cogs_col.is_none() && opex_col.is_none() {
        return (waterfall_failure_message(), None);
    }

    let revenue_total = column_sum(df, &revenue_col);
    let cogs_total = cogs_col.as_deref().map_or(0.0, |c| column_sum(df, c));
    let opex_total = opex_col.as_deref().map_or(0.0, |c| column_sum(df, c));
    let final_total = match income_col.as_deref() {
        Some(c) => column_sum(df, c),
        None => revenue_total - cogs_total - opex_total,
    };

    let cogs_label = cogs_col.unwrap_or_else(|| "COGS".to_string());
    let opex_label = opex_col.unwrap_or_else(|| "OpEx".to_string());
    let final_label = income_col.unwrap_or_else(|| "Operating_Income".to_string());

    let points = vec![
        ChartPoint::new(revenue_col.clone(), revenue_total),
        ChartPoint::new(cogs_label.clone(), -cogs_total),
        ChartPoint::new(opex_label.clone(), -opex_total),
        ChartPoint::new(final_label, final_total),
    ];
    let document = ChartDocument::single(
        "Waterfall Chart",
        "Step",
        "Amount",
        vec![ChartSeries::bar("Waterfall", points)],
    );
    let message = format!(
        "Waterfall: {revenue_col}={revenue_total:.0}, {cogs_label}={:.0}, {opex_label}={:.0}, Final={final_total:.0}.",
        -cogs_total, -opex_total
    );
    (message, Some(document))
}

fn waterfall_failure_message() -> String {
    "Cannot build a waterfall chart: required columns like Revenue and COGS/OpEx not found in the dataset."
        .to_string()
}

fn find_numeric_by_terms(df: &DataFrame, terms: &[&str]) -> Option<String> {
    df.get_columns()
        .iter()
        .filter_map(|column| column.as_series())
        .find(|series| {
            let lower = series.name().to_lowercase();
            table::is_numeric(series) && terms.iter().any(|term| lower.contains(term))
        })
        .map(|series| series.name().to_string())
}

fn column_sum(df: &DataFrame, name: &str) -> f64 {
    table::column_f64(df, name)
        .map(|values| values.into_iter().flatten().sum())
        .unwrap_or(0.0)
}

fn first_categorical(df: &DataFrame) -> Option<String> {
    df.get_columns()
        .iter()
        .filter_map(|column| column.as_series())
        .find(|series| !table::is_numeric(series))
        .map(|series| series.name().to_string())
}

fn grouped_totals(df: &DataFrame, category: &str, value_col: &str, top: usize) -> Vec<(String, f64)> {
    let (Ok(categories), Ok(values)) = (
        table::column_strings(df, category),
        table::column_f64(df, value_col),
    ) else {
        return Vec::new();
    };
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (label, value) in categories.iter().zip(values.iter()) {
        if let (Some(label), Some(value)) = (label, value) {
            *totals.entry(label.clone()).or_insert(0.0) += value;
        }
    }
    let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(top);
    ranked
}

fn time_ordered_points(
    df: &DataFrame,
    date_col: Option<&str>,
    values: &[Option<f64>],
) -> Vec<ChartPoint> {
    if let Some(name) = date_col {
        if let Ok(dates) = table::column_strings(df, name) {
            let mut rows: Vec<(chrono::NaiveDateTime, &str, f64)> = dates
                .iter()
                .zip(values.iter())
                .filter_map(|(date, value)| {
                    let raw = date.as_deref()?;
                    let parsed = temporal::parse_datetime(raw)?;
                    Some((parsed, raw, (*value)?))
                })
                .collect();
            if !rows.is_empty() {
                rows.sort_by_key(|(parsed, _, _)| *parsed);
                return rows
                    .into_iter()
                    .map(|(_, label, value)| ChartPoint::new(label, value))
                    .collect();
            }
        }
    }
    values
        .iter()
        .enumerate()
        .filter_map(|(i, value)| value.map(|v| ChartPoint::new(i.to_string(), v)))
        .collect()
}

fn five_number_summary(values: &[Option<f64>]) -> Option<[f64; 5]> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some([
        sorted[0],
        quantile_linear(&sorted, 0.25),
        quantile_linear(&sorted, 0.5),
        quantile_linear(&sorted, 0.75),
        sorted[sorted.len() - 1],
    ])
}

fn quantile_linear(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
