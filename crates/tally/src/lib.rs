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

pub mod charts;
pub mod column_inference;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod intent;
pub mod render;
pub mod stats;
pub mod table;
pub mod temporal;

pub use charts::{ChartDocument, ChartEmitter, ChartPanel, ChartPoint, ChartSeries, Mark};
pub use column_inference::{ColumnInference, ColumnInferrer, InferenceConfig};
pub use dispatcher::{Dispatcher, DocumentAdvisor, ResponsePayload, TabularAgent, ANSWER_MARKER};
pub use error::{
    ChartError, ConfigError, DataError, DispatchError, DispatchResult, Result, TallyError,
};
pub use intent::{classify, ChartKind, Intent};
pub use render::{ChartRenderer, SpecRenderer};
pub use stats::{Analysis, AnalysisResult, StatsEngine};
