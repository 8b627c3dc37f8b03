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

use crate::column_inference::{ColumnInference, ColumnInferrer};
use crate::error::{DispatchError, DispatchResult};
use crate::intent::{classify, ChartKind, Intent};
use crate::render::ChartRenderer;
use crate::stats::{forecast, AnalysisResult, StatsEngine};
use crate::{format, table};
use async_trait::async_trait;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Marker the tabular agent is instructed to anchor its answer behind.
pub const ANSWER_MARKER: &str = "Final Answer:";
const CONTEXT_EXCERPT_LIMIT: usize = 500;
const ACTION_PLAN_EXCERPT_LIMIT: usize = 200;

#[async_trait]
pub trait TabularAgent: Send + Sync {
    /// Answers a data question against the dataset at `dataset_path`.
    /// Failures and timeouts surface as text, never as a panic.
    async fn ask(&self, instruction: &str, dataset_path: &Path) -> String;
}

#[async_trait]
pub trait DocumentAdvisor: Send + Sync {
    fn is_available(&self) -> bool;

    /// `None` means no answer could be produced; implementations must not
    /// raise out of this call.
    async fn query(&self, question: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub text: String,
    pub image_urls: Vec<String>,
}

pub struct Dispatcher {
    inferrer: ColumnInferrer,
    stats: StatsEngine,
    renderer: Arc<dyn ChartRenderer>,
    agent: Arc<dyn TabularAgent>,
    advisor: Option<Arc<dyn DocumentAdvisor>>,
}

impl Dispatcher {
    pub fn new(
        stats: StatsEngine,
        renderer: Arc<dyn ChartRenderer>,
        agent: Arc<dyn TabularAgent>,
        advisor: Option<Arc<dyn DocumentAdvisor>>,
    ) -> Self {
        Self {
            inferrer: ColumnInferrer::new(),
            stats,
            renderer,
            agent,
            advisor,
        }
    }

    pub fn with_inferrer(mut self, inferrer: ColumnInferrer) -> Self {
        self.inferrer = inferrer;
        self
    }

    pub async fn handle(
        &self,
        request_text: &str,
        dataset_path: &Path,
    ) -> DispatchResult<ResponsePayload> {
        if !dataset_path.exists() {
            return Err(DispatchError::DatasetMissing {
                path: dataset_path.display().to_string(),
            });
        }
        let df = table::load_csv(dataset_path)?;
        // Inference runs once per request and is shared by whichever routine
        // is selected.
        let inference = self.inferrer.infer(&df);
        let intent = classify(request_text);
        info!(
            ?intent,
            date_column = inference.date().unwrap_or("-"),
            value_column = inference.value().unwrap_or("-"),
            "request routed"
        );

        let result = match intent {
            Intent::RateOfChange => self
                .stats
                .rate_of_change(&df, inference.date(), inference.value(), true)?
                .into_result(),
            Intent::LinearRelationships => self.stats.linear_relationships(&df)?.into_result(),
            Intent::TopCategories => self
                .stats
                .top_categories(&df, inference.value())?
                .into_result(),
            Intent::GenericChart(kind) => self.generic_chart(kind, &df, &inference).await,
            Intent::Forecast => self
                .stats
                .predict_timeseries(
                    &df,
                    inference.date(),
                    inference.value(),
                    forecast::DEFAULT_HORIZON,
                )?
                .into_result(),
            Intent::Anomaly => self
                .stats
                .detect_anomalies(&df, inference.date(), inference.value())?
                .into_result(),
            Intent::FallbackQa => self.fallback_qa(request_text, dataset_path).await,
        };

        let mut image_urls = Vec::new();
        if let Some(url) = result.primary_image {
            image_urls.push(url);
        }
        if let Some(url) = result.secondary_image {
            image_urls.push(url);
        }
        Ok(ResponsePayload {
            text: format::emphasise(&result.summary),
            image_urls,
        })
    }

    async fn generic_chart(
        &self,
        kind: ChartKind,
        df: &DataFrame,
        inference: &ColumnInference,
    ) -> AnalysisResult {
        let (message, image_url) =
            self.renderer
                .render(kind, df, inference.date(), inference.value());
        let mut text = message;
        if let Some(advisor) = &self.advisor {
            if advisor.is_available() {
                let focus = inference.value().unwrap_or("key metrics");
                let question = format!(
                    "Explain the insights from a {} chart derived from the uploaded dataset focusing on {focus}. Provide CFO-level guidance.",
                    kind.as_str()
                );
                // Explanation failures are swallowed; the chart message alone
                // is still a valid response.
                match advisor.query(&question).await {
                    Some(explanation) if !explanation.is_empty() => {
                        text = format!("{text}\n\n{explanation}");
                    }
                    _ => {}
                }
            }
        }
        AnalysisResult {
            summary: text.trim().to_string(),
            primary_image: image_url,
            secondary_image: None,
        }
    }

    async fn fallback_qa(&self, request_text: &str, dataset_path: &Path) -> AnalysisResult {
        let instruction = agent_instruction(request_text);
        let raw = self.agent.ask(&instruction, dataset_path).await;
        let data_insights = match raw.rfind(ANSWER_MARKER) {
            Some(position) => raw[position + ANSWER_MARKER.len()..].trim().to_string(),
            None => raw.trim().to_string(),
        };

        let strategic_advice = match &self.advisor {
            Some(advisor) if advisor.is_available() => {
                let mut question = request_text.to_string();
                if !data_insights.is_empty() {
                    let excerpt: String =
                        data_insights.chars().take(CONTEXT_EXCERPT_LIMIT).collect();
                    question.push_str(&format!("\n\nBased on this data context: {excerpt}..."));
                }
                match advisor.query(&question).await {
                    Some(answer) => answer,
                    None => {
                        warn!("advisor query produced no answer");
                        "Unable to retrieve strategic advice from knowledge base.".to_string()
                    }
                }
            }
            _ => "Knowledge base unavailable - strategic advice not available.".to_string(),
        };

        AnalysisResult {
            summary: merge_fallback(&data_insights, &strategic_advice),
            primary_image: None,
            secondary_image: None,
        }
    }
}

pub(crate) fn agent_instruction(user_prompt: &str) -> String {
    format!(
        r#"Analyze the financial dataset to answer: '{user_prompt}'

INSTRUCTIONS:
1. Extract relevant data points related to the user's question
2. Calculate key metrics (totals, averages, trends, etc.)
3. Provide specific numbers and insights from the dataset
4. For sales questions, include exact values and comparisons
5. For improvement questions, identify current performance metrics
6. Your response MUST start with "{ANSWER_MARKER}"
7. Be specific with numbers, dates, and amounts
8. Always base your answer on the actual data in the CSV file

User's question: {user_prompt}"#
    )
}

pub(crate) fn merge_fallback(data_insights: &str, strategic_advice: &str) -> String {
    match (data_insights.is_empty(), strategic_advice.is_empty()) {
        (false, false) => {
            let excerpt: String = data_insights.chars().take(ACTION_PLAN_EXCERPT_LIMIT).collect();
            format!(
                "<b>Data Analysis:</b>\n{data_insights}\n\n<b>Strategic Recommendations:</b>\n{strategic_advice}\n\n<b>Action Plan:</b>\nBased on your data showing {excerpt}..., I recommend focusing on the strategic insights above to drive improvement."
            )
        }
        (false, true) => format!("<b>Analysis Results:</b>\n{data_insights}"),
        (true, false) => format!("<b>Strategic Advice:</b>\n{strategic_advice}"),
        (true, true) => {
            "I need more context to provide a helpful analysis. Could you please be more specific about what you'd like to know?".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_produces_three_sections_in_fixed_order() {
        let merged = merge_fallback("sales rose 10%", "diversify channels");
        let analysis = merged.find("<b>Data Analysis:</b>").unwrap();
        let recommendations = merged.find("<b>Strategic Recommendations:</b>").unwrap();
        let plan = merged.find("<b>Action Plan:</b>").unwrap();
        assert!(analysis < recommendations && recommendations < plan);
        assert!(merged.contains("Based on your data showing sales rose 10%..."));
    }

    #[test]
    fn single_sided_merges_return_one_section() {
        assert!(merge_fallback("numbers", "").starts_with("<b>Analysis Results:</b>"));
        assert!(merge_fallback("", "advice").starts_with("<b>Strategic Advice:</b>"));
    }

    #[test]
    fn empty_merge_asks_for_more_context() {
        assert!(merge_fallback("", "").starts_with("I need more context"));
    }

    #[test]
    fn instruction_template_carries_the_marker() {
        let instruction = agent_instruction("how are sales");
        assert!(instruction.contains("Final Answer:"));
        assert!(instruction.contains("how are sales"));
    }
}
