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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read data file '{path}': {source}")]
    DataFileError {
        path: String,
        #[source]
        source: polars::error::PolarsError,
    },
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },
    #[error("Empty dataset provided")]
    EmptyDataset,
}

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write chart document '{path}': {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid inference configuration: {field} is out of range")]
    InvalidInferenceConfig { field: String },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No dataset available at '{path}'")]
    DatasetMissing { path: String },
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),
    #[error("Analysis error: {0}")]
    Analysis(#[from] Box<TallyError>),
}

impl From<TallyError> for DispatchError {
    fn from(err: TallyError) -> Self {
        DispatchError::Analysis(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
pub type DataResult<T> = std::result::Result<T, DataError>;
pub type ChartResult<T> = std::result::Result<T, ChartError>;
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
