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

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashMap;

// Month-first formats precede day-first ones; ambiguous values such as
// 03/04/2024 resolve to the month-first reading.
pub const TEMPORAL_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y%m%d",
];

pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in TEMPORAL_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// The most common positive gap between consecutive observations, falling
/// back to one day when the series is too short to tell.
pub fn infer_frequency(dates: &[NaiveDateTime]) -> Duration {
    if dates.len() < 2 {
        return Duration::days(1);
    }
    let mut delta_counts: HashMap<i64, usize> = HashMap::new();
    for window in dates.windows(2) {
        let delta = window[1].signed_duration_since(window[0]).num_seconds();
        if delta > 0 {
            *delta_counts.entry(delta).or_insert(0) += 1;
        }
    }
    delta_counts
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .map_or_else(|| Duration::days(1), |(delta, _)| Duration::seconds(delta))
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        assert!(parse_datetime("2024-03-01").is_some());
        assert!(parse_datetime("2024-03-01 12:30:00").is_some());
    }

    #[test]
    fn ambiguous_slash_dates_resolve_month_first() {
        let dt = parse_datetime("03/04/2024").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn rejects_plain_numbers() {
        assert!(parse_datetime("123").is_none());
        assert!(parse_datetime("42.5").is_none());
    }

    #[test]
    fn frequency_picks_dominant_delta() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let dates: Vec<_> = (0..10).map(|i| base + Duration::days(i)).collect();
        assert_eq!(infer_frequency(&dates), Duration::days(1));
    }

    #[test]
    fn frequency_defaults_to_daily() {
        assert_eq!(infer_frequency(&[]), Duration::days(1));
    }
}
