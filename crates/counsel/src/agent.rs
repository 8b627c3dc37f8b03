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

use crate::llm::{LlmClient, LlmError};
use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tally::dispatcher::ANSWER_MARKER;
use tally::{table, TabularAgent};
use thiserror::Error;
use tracing::warn;

const MAX_ITERATIONS: u32 = 20;
const EXECUTION_CAP: Duration = Duration::from_secs(90);
const HEAD_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Data error: {0}")]
    Data(#[from] tally::DataError),
    #[error("Model error: {0}")]
    Llm(#[from] LlmError),
    #[error("iteration limit reached without a final answer")]
    IterationLimit,
}

/// Question answering over a CSV dataset, bounded by an iteration cap and a
/// wall-clock execution cap. Failures surface as text through the
/// `TabularAgent` contract.
pub struct CsvAgent {
    llm: Arc<dyn LlmClient>,
    max_iterations: u32,
    execution_cap: Duration,
}

impl CsvAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            max_iterations: MAX_ITERATIONS,
            execution_cap: EXECUTION_CAP,
        }
    }

    pub fn with_limits(
        llm: Arc<dyn LlmClient>,
        max_iterations: u32,
        execution_cap: Duration,
    ) -> Self {
        Self {
            llm,
            max_iterations,
            execution_cap,
        }
    }

    async fn run(&self, instruction: &str, dataset_path: &Path) -> Result<String, AgentError> {
        let df = table::load_csv(dataset_path)?;
        let digest = data_digest(&df);
        let mut prompt = format!("{instruction}\n\nExtracted data from the dataset:\n{digest}");
        for attempt in 0..self.max_iterations {
            let response = self.llm.generate(&prompt).await?;
            if response.contains(ANSWER_MARKER) {
                return Ok(response);
            }
            warn!(attempt, "agent response missed the answer marker, retrying");
            prompt = format!(
                "{instruction}\n\nExtracted data from the dataset:\n{digest}\n\nYour previous response did not contain \"{ANSWER_MARKER}\". Respond again and begin your answer with \"{ANSWER_MARKER}\"."
            );
        }
        Err(AgentError::IterationLimit)
    }
}

#[async_trait]
impl TabularAgent for CsvAgent {
    async fn ask(&self, instruction: &str, dataset_path: &Path) -> String {
        match tokio::time::timeout(self.execution_cap, self.run(instruction, dataset_path)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => format!("Unable to analyze dataset: {err}"),
            Err(_) => "Unable to analyze dataset: execution time limit exceeded.".to_string(),
        }
    }
}

/// Deterministic extraction the model is asked to anchor its answer in:
/// shape, a head sample, and per-column numeric aggregates.
fn data_digest(df: &DataFrame) -> String {
    let names = table::column_names(df);
    let mut digest = format!("Rows: {}\nColumns: {}\n", df.height(), names.join(", "));

    digest.push_str("\nFirst rows:\n");
    digest.push_str(&names.join(" | "));
    digest.push('\n');
    let sample_size = HEAD_ROWS.min(df.height());
    let rendered: Vec<Vec<String>> = names
        .iter()
        .map(|name| {
            table::column_strings(df, name)
                .map(|values| {
                    values
                        .into_iter()
                        .take(sample_size)
                        .map(|v| v.unwrap_or_else(|| "NULL".to_string()))
                        .collect()
                })
                .unwrap_or_else(|_| vec!["NULL".to_string(); sample_size])
        })
        .collect();
    for row in 0..sample_size {
        let cells: Vec<&str> = rendered.iter().map(|col| col[row].as_str()).collect();
        digest.push_str(&cells.join(" | "));
        digest.push('\n');
    }

    let numeric = table::numeric_column_names(df);
    if !numeric.is_empty() {
        digest.push_str("\nNumeric summary:\n");
        for name in numeric {
            let Ok(values) = table::column_f64(df, &name) else {
                continue;
            };
            let finite: Vec<f64> = values.into_iter().flatten().collect();
            if finite.is_empty() {
                continue;
            }
            let sum: f64 = finite.iter().sum();
            let mean = sum / finite.len() as f64;
            let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
            let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            digest.push_str(&format!(
                "{name}: sum={sum:.2}, mean={mean:.2}, min={min:.2}, max={max:.2}\n"
            ));
        }
    }
    digest
}
