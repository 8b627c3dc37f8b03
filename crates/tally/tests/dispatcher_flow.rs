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

use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally::{
    ChartEmitter, ChartKind, ChartRenderer, Dispatcher, DispatchError, DocumentAdvisor,
    StatsEngine, TabularAgent,
};

struct StubAgent {
    reply: String,
}

#[async_trait]
impl TabularAgent for StubAgent {
    async fn ask(&self, _instruction: &str, _dataset_path: &Path) -> String {
        self.reply.clone()
    }
}

struct StubAdvisor {
    answer: Option<String>,
}

#[async_trait]
impl DocumentAdvisor for StubAdvisor {
    fn is_available(&self) -> bool {
        true
    }

    async fn query(&self, _question: &str) -> Option<String> {
        self.answer.clone()
    }
}

struct StubRenderer;

impl ChartRenderer for StubRenderer {
    fn render(
        &self,
        kind: ChartKind,
        _df: &DataFrame,
        _date_col: Option<&str>,
        _value_col: Option<&str>,
    ) -> (String, Option<String>) {
        (
            format!("{} chart generated.", kind.as_str()),
            Some(format!("/static/{}.json", kind.as_str())),
        )
    }
}

struct Fixture {
    dispatcher: Dispatcher,
    dataset: PathBuf,
    _dir: tempfile::TempDir,
}

fn fixture(agent_reply: &str, advisor_answer: Option<&str>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("sales.csv");
    std::fs::write(
        &dataset,
        "transaction_date,channel,total_amount\n\
         2024-01-01,web,100\n\
         2024-01-02,store,110\n\
         2024-01-03,web,120\n\
         2024-01-04,app,130\n\
         2024-01-05,web,140\n\
         2024-01-06,store,150\n",
    )
    .unwrap();
    let stats = StatsEngine::new(ChartEmitter::new(dir.path().join("static")));
    let advisor: Option<Arc<dyn DocumentAdvisor>> = advisor_answer.map(|answer| {
        Arc::new(StubAdvisor {
            answer: Some(answer.to_string()),
        }) as Arc<dyn DocumentAdvisor>
    });
    let dispatcher = Dispatcher::new(
        stats,
        Arc::new(StubRenderer),
        Arc::new(StubAgent {
            reply: agent_reply.to_string(),
        }),
        advisor,
    );
    Fixture {
        dispatcher,
        dataset,
        _dir: dir,
    }
}

#[tokio::test]
async fn fallback_merges_both_collaborators_into_three_sections() {
    let fx = fixture(
        "Thought: inspecting the data. Final Answer: Sales grew steadily across the period.",
        Some("Diversify the channel mix."),
    );
    let payload = fx
        .dispatcher
        .handle("how can we improve margins", &fx.dataset)
        .await
        .unwrap();
    let analysis = payload.text.find("<b>Data Analysis:</b>").unwrap();
    let recommendations = payload.text.find("<b>Strategic Recommendations:</b>").unwrap();
    let plan = payload.text.find("<b>Action Plan:</b>").unwrap();
    assert!(analysis < recommendations && recommendations < plan);
    assert!(payload.text.contains("Sales grew steadily"));
    assert!(!payload.text.contains("Thought:"));
    assert!(payload.text.contains("Diversify the channel mix."));
    assert!(payload.image_urls.is_empty());
}

#[tokio::test]
async fn fallback_without_advisor_uses_the_placeholder() {
    let fx = fixture("Final Answer: Totals look stable.", None);
    let payload = fx
        .dispatcher
        .handle("tell me something about the business", &fx.dataset)
        .await
        .unwrap();
    assert!(payload
        .text
        .contains("Knowledge base unavailable - strategic advice not available."));
}

#[tokio::test]
async fn rate_of_change_rule_beats_the_chart_rule() {
    let fx = fixture("unused", None);
    let payload = fx
        .dispatcher
        .handle("show me the rate of change and also a bar chart", &fx.dataset)
        .await
        .unwrap();
    assert!(payload
        .text
        .starts_with("Computed daily percentage rate of change"));
    assert!(!payload.image_urls.is_empty());
}

#[tokio::test]
async fn generic_chart_appends_the_advisor_explanation() {
    let fx = fixture("unused", Some("Lines trend upward; protect the margin."));
    let payload = fx
        .dispatcher
        .handle("please draw a line chart", &fx.dataset)
        .await
        .unwrap();
    assert!(payload.text.starts_with("line chart generated."));
    assert!(payload.text.contains("protect the margin."));
    assert_eq!(payload.image_urls, vec!["/static/line.json".to_string()]);
}

#[tokio::test]
async fn anomaly_prompt_reaches_the_anomaly_routine() {
    let fx = fixture("unused", None);
    let payload = fx
        .dispatcher
        .handle("any anomaly in the data?", &fx.dataset)
        .await
        .unwrap();
    assert!(
        payload.text.contains("anomalies"),
        "unexpected text: {}",
        payload.text
    );
}

#[tokio::test]
async fn missing_dataset_is_a_hard_error() {
    let fx = fixture("unused", None);
    let err = fx
        .dispatcher
        .handle("forecast", Path::new("/nonexistent/sales.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::DatasetMissing { .. }));
}
