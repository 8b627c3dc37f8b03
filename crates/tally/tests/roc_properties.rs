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

use proptest::prelude::*;
use tally::stats::rate_of_change::percentage_change;

proptest! {
    #[test]
    fn constant_series_rates_are_all_zero(value in 0.1f64..1e6, len in 2usize..64) {
        let values: Vec<Option<f64>> = vec![Some(value); len];
        let rates = percentage_change(&values);
        prop_assert_eq!(rates[0], None);
        for rate in &rates[1..] {
            prop_assert_eq!(*rate, Some(0.0));
        }
    }

    #[test]
    fn rates_length_matches_input(len in 0usize..64) {
        let values: Vec<Option<f64>> = (0..len).map(|i| Some(i as f64 + 1.0)).collect();
        let rates = percentage_change(&values);
        prop_assert_eq!(rates.len(), len);
    }

    #[test]
    fn missing_predecessors_leave_rates_undefined(len in 2usize..32) {
        let mut values: Vec<Option<f64>> = vec![Some(10.0); len];
        values[0] = None;
        let rates = percentage_change(&values);
        prop_assert_eq!(rates[1], None);
    }
}
