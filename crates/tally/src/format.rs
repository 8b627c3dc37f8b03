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

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static CURRENCY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([₹$][\d,]+\.?\d*)").unwrap());
static PERCENTAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d,]+\.?\d*%)").unwrap());
static UNIT_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}(?:,\d{3})*(?:\.\d{2})?)(\s*(?:rows|entries|points|days|months|years))")
        .unwrap()
});

/// Converts `**bold**` markup to presentation tags and emphasises currency
/// amounts, percentages, and counts followed by unit words.
pub fn emphasise(text: &str) -> String {
    let text = BOLD_MARKUP.replace_all(text, "<b>$1</b>");
    let text = CURRENCY.replace_all(&text, "<b>$1</b>");
    let text = PERCENTAGE.replace_all(&text, "<b>$1</b>");
    let text = UNIT_COUNT.replace_all(&text, "<b>$1</b>$2");
    text.into_owned()
}
