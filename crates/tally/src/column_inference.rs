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

use crate::error::{ConfigError, DataResult};
use crate::{table, temporal};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub sample_rows: usize,
    pub name_bonus: f64,
    pub score_threshold: f64,
    pub date_name_hints: Vec<String>,
    pub excluded_value_hints: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            sample_rows: 500,
            name_bonus: 0.3,
            score_threshold: 0.6,
            date_name_hints: vec![
                "date".to_string(),
                "time".to_string(),
                "day".to_string(),
                "month".to_string(),
            ],
            excluded_value_hints: vec!["id".to_string(), "year".to_string(), "month".to_string()],
        }
    }
}

impl InferenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rows == 0 {
            return Err(ConfigError::InvalidInferenceConfig {
                field: "sample_rows".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(ConfigError::InvalidInferenceConfig {
                field: "score_threshold".to_string(),
            });
        }
        if self.name_bonus < 0.0 {
            return Err(ConfigError::InvalidInferenceConfig {
                field: "name_bonus".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInference {
    pub date_column: Option<String>,
    pub value_column: Option<String>,
}

impl ColumnInference {
    pub fn date(&self) -> Option<&str> {
        self.date_column.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value_column.as_deref()
    }
}

pub struct ColumnInferrer {
    config: InferenceConfig,
}

impl ColumnInferrer {
    pub fn new() -> Self {
        Self {
            config: InferenceConfig::default(),
        }
    }

    pub fn with_config(config: InferenceConfig) -> Self {
        Self { config }
    }

    pub fn infer(&self, df: &DataFrame) -> ColumnInference {
        let sample = df.head(Some(self.config.sample_rows));
        ColumnInference {
            date_column: self.best_date_column(&sample),
            value_column: self.last_metric_column(&sample),
        }
    }

    fn best_date_column(&self, sample: &DataFrame) -> Option<String> {
        let mut best: Option<String> = None;
        let mut best_score = 0.0;
        for column in sample.get_columns() {
            let Some(series) = column.as_series() else {
                continue;
            };
            // Numeric columns are never date candidates; small integers would
            // otherwise parse as compact date forms.
            if table::is_numeric(series) {
                continue;
            }
            let name = series.name().to_string();
            let lower = name.to_lowercase();
            let bonus = if self
                .config
                .date_name_hints
                .iter()
                .any(|hint| lower.contains(hint.as_str()))
            {
                self.config.name_bonus
            } else {
                0.0
            };
            let score = Self::date_parse_rate(series).unwrap_or(0.0) + bonus;
            if score > best_score {
                best_score = score;
                best = Some(name);
            }
        }
        if best_score >= self.config.score_threshold {
            best
        } else {
            None
        }
    }

    // Nulls count against the rate: the denominator is the full sample.
    fn date_parse_rate(series: &Series) -> DataResult<f64> {
        let total = series.len();
        if total == 0 {
            return Ok(0.0);
        }
        let casted = series.cast(&polars::prelude::DataType::String)?;
        let ca = casted.str()?;
        let values: Vec<Option<&str>> = ca.into_iter().collect();
        let parsed = values
            .par_iter()
            .filter(|value| value.is_some_and(|v| temporal::parse_datetime(v).is_some()))
            .count();
        Ok(parsed as f64 / total as f64)
    }

    fn last_metric_column(&self, sample: &DataFrame) -> Option<String> {
        sample
            .get_columns()
            .iter()
            .filter_map(|column| column.as_series())
            .filter(|series| table::is_numeric(series))
            .map(|series| series.name().to_string())
            .filter(|name| {
                let lower = name.to_lowercase();
                !self
                    .config
                    .excluded_value_hints
                    .iter()
                    .any(|hint| lower.contains(hint.as_str()))
            })
            .last()
    }
}

impl Default for ColumnInferrer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_frame() -> DataFrame {
        df![
            "transaction_date" => &["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"],
            "region" => &["north", "south", "north", "east"],
            "order_id" => &[101i64, 102, 103, 104],
            "total_amount" => &[120.5, 98.0, 310.2, 45.9],
        ]
        .unwrap()
    }

    #[test]
    fn infers_date_and_trailing_metric() {
        let inference = ColumnInferrer::new().infer(&sales_frame());
        assert_eq!(inference.date(), Some("transaction_date"));
        assert_eq!(inference.value(), Some("total_amount"));
    }

    #[test]
    fn year_column_is_never_the_metric() {
        let df = df![
            "label" => &["a", "b", "c"],
            "year" => &[2021i64, 2022, 2023],
        ]
        .unwrap();
        let inference = ColumnInferrer::new().infer(&df);
        assert_eq!(inference.value(), None);
    }

    #[test]
    fn id_fragments_are_excluded_anywhere_in_the_name() {
        let df = df![
            "holiday_flag" => &[0i64, 1, 0],
            "revenue" => &[10.0, 20.0, 30.0],
        ]
        .unwrap();
        // "holiday" contains "id" and is skipped, leaving revenue.
        let inference = ColumnInferrer::new().infer(&df);
        assert_eq!(inference.value(), Some("revenue"));
    }

    #[test]
    fn low_parse_rate_without_name_bonus_is_rejected() {
        let df = df![
            "code" => &["2024-01-01", "n/a", "n/a", "n/a", "n/a"],
            "amount" => &[1.0, 2.0, 3.0, 4.0, 5.0],
        ]
        .unwrap();
        let inference = ColumnInferrer::new().infer(&df);
        assert_eq!(inference.date(), None);
    }

    #[test]
    fn name_bonus_lifts_partially_parseable_columns() {
        // 0.4 parse rate alone misses the threshold; the name bonus clears it.
        let df = df![
            "order_date" => &["2024-01-01", "2024-01-02", "pending", "pending", "pending"],
            "amount" => &[1.0, 2.0, 3.0, 4.0, 5.0],
        ]
        .unwrap();
        let inference = ColumnInferrer::new().infer(&df);
        assert_eq!(inference.date(), Some("order_date"));
    }

    #[test]
    fn inference_is_idempotent() {
        let df = sales_frame();
        let inferrer = ColumnInferrer::new();
        assert_eq!(inferrer.infer(&df), inferrer.infer(&df));
    }

    #[test]
    fn config_validation_rejects_bad_threshold() {
        let config = InferenceConfig {
            score_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
