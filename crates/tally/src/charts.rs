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

use crate::error::{ChartError, ChartResult};
use crate::intent::ChartKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Line,
    Scatter,
    Bar,
    Area,
    Pie,
    Box,
    Heatmap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: String,
    pub y: f64,
}

impl ChartPoint {
    pub fn new(x: impl Into<String>, y: f64) -> Self {
        Self { x: x.into(), y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub mark: Mark,
    pub dashed: bool,
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn new(name: impl Into<String>, mark: Mark, points: Vec<ChartPoint>) -> Self {
        Self {
            name: name.into(),
            mark,
            dashed: false,
            points,
        }
    }

    pub fn line(name: impl Into<String>, points: Vec<ChartPoint>) -> Self {
        Self::new(name, Mark::Line, points)
    }

    pub fn scatter(name: impl Into<String>, points: Vec<ChartPoint>) -> Self {
        Self::new(name, Mark::Scatter, points)
    }

    pub fn bar(name: impl Into<String>, points: Vec<ChartPoint>) -> Self {
        Self::new(name, Mark::Bar, points)
    }

    pub fn dashed(mut self) -> Self {
        self.dashed = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPanel {
    pub title: Option<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDocument {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub panels: Vec<ChartPanel>,
}

impl ChartDocument {
    pub fn single(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
        series: Vec<ChartSeries>,
    ) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            panels: vec![ChartPanel {
                title: None,
                series,
            }],
        }
    }
}

pub fn chart_file_stem(kind: ChartKind) -> &'static str {
    match kind {
        ChartKind::Line => "line_chart",
        ChartKind::Bar => "bar_chart",
        ChartKind::Pie => "pie_chart",
        ChartKind::Area => "area_chart",
        ChartKind::Scatter => "scatter_plot",
        ChartKind::Box => "box_plot",
        ChartKind::Heatmap => "heatmap",
        ChartKind::Waterfall => "waterfall_chart",
    }
}

/// Writes chart documents into the shared static directory under well-known
/// per-kind filenames. Concurrent requests racing on the same filename are
/// accepted; the last writer wins.
#[derive(Debug, Clone)]
pub struct ChartEmitter {
    output_dir: PathBuf,
}

impl ChartEmitter {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn emit(&self, document: &ChartDocument, file_stem: &str) -> ChartResult<String> {
        std::fs::create_dir_all(&self.output_dir)?;
        let file_name = format!("{file_stem}.json");
        let path = self.output_dir.join(&file_name);
        let payload = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, payload).map_err(|source| ChartError::WriteFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(format!("/static/{file_name}"))
    }

    /// Best-effort duplicate of an emitted document outside the output
    /// directory. Failure is logged and ignored.
    pub fn export_copy(&self, file_stem: &str, destination: &Path) {
        let source = self.output_dir.join(format!("{file_stem}.json"));
        if let Err(err) = std::fs::copy(&source, destination) {
            warn!(
                source = %source.display(),
                destination = %destination.display(),
                error = %err,
                "chart export copy failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_writes_document_and_returns_static_url() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ChartEmitter::new(dir.path());
        let doc = ChartDocument::single(
            "t",
            "x",
            "y",
            vec![ChartSeries::line("data", vec![ChartPoint::new("0", 1.0)])],
        );
        let url = emitter.emit(&doc, "roc_plot").unwrap();
        assert_eq!(url, "/static/roc_plot.json");
        let written = std::fs::read_to_string(dir.path().join("roc_plot.json")).unwrap();
        let parsed: ChartDocument = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn export_copy_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ChartEmitter::new(dir.path());
        emitter.export_copy("missing", &dir.path().join("copy.json"));
    }

    #[test]
    fn file_stems_are_per_kind() {
        assert_eq!(chart_file_stem(ChartKind::Line), "line_chart");
        assert_eq!(chart_file_stem(ChartKind::Waterfall), "waterfall_chart");
    }
}
