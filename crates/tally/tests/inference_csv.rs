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

use std::io::Write;
use tally::{table, ColumnInferrer};

fn write_csv(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn financial_export_maps_to_date_and_trailing_amount() {
    let file = write_csv(
        "transaction_date,region,order_id,quantity,total_amount\n\
         2024-01-01,north,1001,3,120.50\n\
         2024-01-02,south,1002,1,45.00\n\
         2024-01-03,north,1003,7,310.25\n\
         2024-01-04,east,1004,2,89.99\n",
    );
    let df = table::load_csv(file.path()).unwrap();
    let inference = ColumnInferrer::new().infer(&df);
    assert_eq!(inference.date(), Some("transaction_date"));
    assert_eq!(inference.value(), Some("total_amount"));
}

#[test]
fn lone_year_column_leaves_the_value_absent() {
    let file = write_csv(
        "label,year\n\
         alpha,2021\n\
         beta,2022\n\
         gamma,2023\n",
    );
    let df = table::load_csv(file.path()).unwrap();
    let inference = ColumnInferrer::new().infer(&df);
    assert_eq!(inference.value(), None);
}

#[test]
fn inference_is_stable_across_repeated_calls() {
    let file = write_csv(
        "day,total\n\
         2024-02-01,10\n\
         2024-02-02,20\n\
         2024-02-03,30\n",
    );
    let df = table::load_csv(file.path()).unwrap();
    let inferrer = ColumnInferrer::new();
    let first = inferrer.infer(&df);
    let second = inferrer.infer(&df);
    assert_eq!(first, second);
    assert_eq!(first.date(), Some("day"));
    assert_eq!(first.value(), Some("total"));
}

#[test]
fn weakly_date_like_text_is_not_promoted() {
    let file = write_csv(
        "note,amount\n\
         2024-01-01,1\n\
         pending,2\n\
         pending,3\n\
         pending,4\n\
         pending,5\n",
    );
    let df = table::load_csv(file.path()).unwrap();
    let inference = ColumnInferrer::new().infer(&df);
    assert_eq!(inference.date(), None);
    assert_eq!(inference.value(), Some("amount"));
}
