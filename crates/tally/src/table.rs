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

use crate::error::{DataError, DataResult};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

pub fn load_csv<P: AsRef<Path>>(path: P) -> DataResult<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path)?;
    CsvReader::new(file)
        .finish()
        .map_err(|source| DataError::DataFileError {
            path: path.display().to_string(),
            source,
        })
}

pub fn is_numeric(series: &Series) -> bool {
    matches!(
        series.dtype(),
        polars::prelude::DataType::Float64
            | polars::prelude::DataType::Int64
            | polars::prelude::DataType::Float32
            | polars::prelude::DataType::Int32
    )
}

pub fn series_by_name<'a>(df: &'a DataFrame, name: &str) -> DataResult<&'a Series> {
    df.get_columns()
        .iter()
        .find(|column| column.name().as_str() == name)
        .and_then(|column| column.as_series())
        .ok_or_else(|| DataError::ColumnNotFound {
            column: name.to_string(),
        })
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter_map(|column| column.as_series())
        .filter(|series| is_numeric(series))
        .map(|series| series.name().to_string())
        .collect()
}

pub fn column_f64(df: &DataFrame, name: &str) -> DataResult<Vec<Option<f64>>> {
    let series = series_by_name(df, name)?;
    let casted = series.cast(&polars::prelude::DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().collect())
}

pub fn column_strings(df: &DataFrame, name: &str) -> DataResult<Vec<Option<String>>> {
    let series = series_by_name(df, name)?;
    let casted = series.cast(&polars::prelude::DataType::String)?;
    let ca = casted.str()?;
    Ok(ca.into_iter().map(|v| v.map(String::from)).collect())
}
