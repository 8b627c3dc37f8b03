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

pub mod anomaly;
pub mod correlation;
pub mod forecast;
pub mod ranking;
pub mod rate_of_change;

use crate::charts::ChartEmitter;
use crate::error::Result;
use crate::table;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub primary_image: Option<String>,
    pub secondary_image: Option<String>,
}

/// Outcome of a statistics routine. Expected "could not identify a suitable
/// column" conditions degrade to `Insufficient`; hard errors are reserved for
/// I/O-level faults.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Ready(AnalysisResult),
    Insufficient(String),
}

impl Analysis {
    pub fn ready(
        summary: impl Into<String>,
        primary_image: Option<String>,
        secondary_image: Option<String>,
    ) -> Self {
        Analysis::Ready(AnalysisResult {
            summary: summary.into(),
            primary_image,
            secondary_image,
        })
    }

    pub fn insufficient(reason: impl Into<String>) -> Self {
        Analysis::Insufficient(reason.into())
    }

    pub fn into_result(self) -> AnalysisResult {
        match self {
            Analysis::Ready(result) => result,
            Analysis::Insufficient(reason) => AnalysisResult {
                summary: reason,
                primary_image: None,
                secondary_image: None,
            },
        }
    }
}

pub struct StatsEngine {
    emitter: ChartEmitter,
}

impl StatsEngine {
    pub fn new(emitter: ChartEmitter) -> Self {
        Self { emitter }
    }

    pub fn detect_anomalies(
        &self,
        df: &DataFrame,
        date_col: Option<&str>,
        value_col: Option<&str>,
    ) -> Result<Analysis> {
        anomaly::detect_anomalies(df, date_col, value_col, &self.emitter)
    }

    pub fn predict_timeseries(
        &self,
        df: &DataFrame,
        date_col: Option<&str>,
        value_col: Option<&str>,
        horizon: usize,
    ) -> Result<Analysis> {
        forecast::predict_timeseries(df, date_col, value_col, horizon, &self.emitter)
    }

    pub fn rate_of_change(
        &self,
        df: &DataFrame,
        date_col: Option<&str>,
        value_col: Option<&str>,
        two_month_window: bool,
    ) -> Result<Analysis> {
        rate_of_change::rate_of_change(df, date_col, value_col, two_month_window, &self.emitter)
    }

    pub fn linear_relationships(&self, df: &DataFrame) -> Result<Analysis> {
        correlation::linear_relationships(df, &self.emitter)
    }

    pub fn top_categories(&self, df: &DataFrame, value_col: Option<&str>) -> Result<Analysis> {
        ranking::top_categories(df, value_col, &self.emitter)
    }
}

/// Row labels for charts: the date column values when present, otherwise the
/// positional index.
pub(crate) fn axis_labels(df: &DataFrame, date_col: Option<&str>) -> Vec<String> {
    if let Some(name) = date_col {
        if let Ok(values) = table::column_strings(df, name) {
            return values
                .into_iter()
                .enumerate()
                .map(|(i, v)| v.unwrap_or_else(|| i.to_string()))
                .collect();
        }
    }
    (0..df.height()).map(|i| i.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_collapses_to_text_only_result() {
        let result = Analysis::insufficient("no suitable column").into_result();
        assert_eq!(result.summary, "no suitable column");
        assert!(result.primary_image.is_none());
        assert!(result.secondary_image.is_none());
    }
}
