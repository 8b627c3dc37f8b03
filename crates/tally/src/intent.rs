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

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Area,
    Scatter,
    Box,
    Heatmap,
    Waterfall,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Area => "area",
            ChartKind::Scatter => "scatter",
            ChartKind::Box => "box",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Waterfall => "waterfall",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    RateOfChange,
    LinearRelationships,
    TopCategories,
    GenericChart(ChartKind),
    Forecast,
    Anomaly,
    FallbackQa,
}

enum RuleTarget {
    Fixed(Intent),
    Chart,
}

struct Rule {
    keywords: &'static [&'static str],
    target: RuleTarget,
}

// Evaluated top to bottom, first match wins. The forecast rule carries broad
// catch-all words ("chart", "plot"), so it must stay below the more specific
// chart and relationship rules.
const RULES: &[Rule] = &[
    Rule {
        keywords: &["rate of change", "roc", "growth rate", "percentage change"],
        target: RuleTarget::Fixed(Intent::RateOfChange),
    },
    Rule {
        keywords: &[
            "linear relation",
            "linear relationship",
            "correlation",
            "sub plots",
            "subplots",
        ],
        target: RuleTarget::Fixed(Intent::LinearRelationships),
    },
    Rule {
        keywords: &[
            "top 5",
            "top five",
            "best sales channel",
            "top sales channel",
            "top channels",
        ],
        target: RuleTarget::Fixed(Intent::TopCategories),
    },
    Rule {
        keywords: &[
            "line chart",
            "bar chart",
            "pie chart",
            "area chart",
            "scatter plot",
            "box plot",
            "heat map",
            "heatmap",
            "waterfall chart",
        ],
        target: RuleTarget::Chart,
    },
    Rule {
        keywords: &["forecast", "predict", "graph", "chart", "plot", "compare"],
        target: RuleTarget::Fixed(Intent::Forecast),
    },
    Rule {
        keywords: &["anomaly", "outlier"],
        target: RuleTarget::Fixed(Intent::Anomaly),
    },
];

pub fn classify(request: &str) -> Intent {
    let lower = request.to_lowercase();
    for rule in RULES {
        if rule.keywords.iter().any(|keyword| lower.contains(keyword)) {
            return match rule.target {
                RuleTarget::Fixed(intent) => intent,
                RuleTarget::Chart => Intent::GenericChart(resolve_chart_kind(&lower)),
            };
        }
    }
    Intent::FallbackQa
}

fn resolve_chart_kind(prompt: &str) -> ChartKind {
    if prompt.contains("line") {
        ChartKind::Line
    } else if prompt.contains("bar") && !prompt.contains("stacked") {
        ChartKind::Bar
    } else if prompt.contains("pie") {
        ChartKind::Pie
    } else if prompt.contains("area") {
        ChartKind::Area
    } else if prompt.contains("scatter") {
        ChartKind::Scatter
    } else if prompt.contains("box") {
        ChartKind::Box
    } else if prompt.contains("waterfall") {
        ChartKind::Waterfall
    } else {
        ChartKind::Heatmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_rules_win_over_later_ones() {
        assert_eq!(
            classify("show me the rate of change and also a bar chart"),
            Intent::RateOfChange
        );
        assert_eq!(
            classify("correlation heatmap please"),
            Intent::LinearRelationships
        );
    }

    #[test]
    fn unmatched_prompts_fall_back() {
        assert_eq!(
            classify("how did we perform last quarter"),
            Intent::FallbackQa
        );
        assert_eq!(classify(""), Intent::FallbackQa);
    }

    #[test]
    fn chart_requests_resolve_their_kind() {
        assert_eq!(
            classify("draw a pie chart of revenue"),
            Intent::GenericChart(ChartKind::Pie)
        );
        assert_eq!(
            classify("waterfall chart for the quarter"),
            Intent::GenericChart(ChartKind::Waterfall)
        );
        assert_eq!(
            classify("show a heat map"),
            Intent::GenericChart(ChartKind::Heatmap)
        );
    }

    #[test]
    fn stacked_bar_falls_through_to_heatmap_default() {
        assert_eq!(
            classify("stacked bar chart"),
            Intent::GenericChart(ChartKind::Heatmap)
        );
    }

    #[test]
    fn broad_words_route_to_forecast() {
        assert_eq!(classify("plot my sales"), Intent::Forecast);
        assert_eq!(classify("compare this month to last"), Intent::Forecast);
    }

    #[test]
    fn anomaly_loses_to_the_broad_forecast_rule_when_both_match() {
        // "plot" matches the forecast rule before the anomaly rule is reached.
        assert_eq!(classify("plot the outliers"), Intent::Forecast);
        assert_eq!(classify("find outliers"), Intent::Anomaly);
    }

    #[test]
    fn keyword_matching_ignores_case() {
        assert_eq!(classify("Growth Rate please"), Intent::RateOfChange);
    }
}
