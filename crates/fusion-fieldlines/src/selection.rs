// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Selection Expressions
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Surface / line / toroidal-range selection expressions.
//!
//! Accepted inputs:
//! - a single integer: `5` → `[5]`
//! - the all-token `":"` (or `"all"`): every index the axis turns out to have
//! - `"start:stop(:step)"`: arithmetic range, `stop` exclusive
//! - comma separated segments, each an integer or a range: `"1,4:8,12"`
//! - a list of integers, order preserved
//!
//! Negative indices count from the end of the axis, resolved by
//! [`Selection::resolve`] once the axis length is known.

use fusion_types::error::{FusionError, FusionResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Tokens meaning "every available index".
pub const ALL_TOKENS: [&str; 2] = [":", "all"];

/// Longest index list a comma-separated selection may expand to.
const MAX_LIST_LEN: usize = 1 << 24;

/// Raw user-facing selection, before parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionExpr {
    Index(i64),
    Text(String),
    Items(Vec<serde_json::Value>),
    Other(serde_json::Value),
}

impl From<i64> for SelectionExpr {
    fn from(value: i64) -> Self {
        SelectionExpr::Index(value)
    }
}

impl From<i32> for SelectionExpr {
    fn from(value: i32) -> Self {
        SelectionExpr::Index(i64::from(value))
    }
}

impl From<usize> for SelectionExpr {
    fn from(value: usize) -> Self {
        match i64::try_from(value) {
            Ok(index) => SelectionExpr::Index(index),
            Err(_) => SelectionExpr::Other(serde_json::Value::from(value)),
        }
    }
}

impl From<&str> for SelectionExpr {
    fn from(value: &str) -> Self {
        SelectionExpr::Text(value.to_string())
    }
}

impl From<String> for SelectionExpr {
    fn from(value: String) -> Self {
        SelectionExpr::Text(value)
    }
}

impl From<&[i64]> for SelectionExpr {
    fn from(values: &[i64]) -> Self {
        SelectionExpr::Items(values.iter().map(|&v| v.into()).collect())
    }
}

impl From<Vec<i64>> for SelectionExpr {
    fn from(values: Vec<i64>) -> Self {
        values.as_slice().into()
    }
}

impl<const N: usize> From<[i64; N]> for SelectionExpr {
    fn from(values: [i64; N]) -> Self {
        values.as_slice().into()
    }
}

impl From<Range<i64>> for SelectionExpr {
    fn from(range: Range<i64>) -> Self {
        SelectionExpr::Items(range.map(serde_json::Value::from).collect())
    }
}

impl From<serde_json::Value> for SelectionExpr {
    fn from(value: serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(SelectionExpr::Other(value))
    }
}

/// Arithmetic progression `start, start+step, ...` stopping before `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeSpec {
    /// The progression, stopping early where the next value would overflow `i64`.
    pub fn iter(&self) -> impl Iterator<Item = i64> {
        let RangeSpec { start, stop, step } = *self;
        std::iter::successors(Some(start), move |v| v.checked_add(step))
            .take_while(move |&v| if step > 0 { v < stop } else { v > stop })
    }

    /// Values of the progression, before any axis wrap-around.
    pub fn values(&self) -> Vec<i64> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        let (span, step) = if self.step > 0 {
            (
                i128::from(self.stop) - i128::from(self.start),
                i128::from(self.step),
            )
        } else {
            (
                i128::from(self.start) - i128::from(self.stop),
                -i128::from(self.step),
            )
        };
        if span <= 0 {
            0
        } else {
            usize::try_from((span + step - 1) / step).unwrap_or(usize::MAX)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parsed selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    List(Vec<i64>),
    Range(RangeSpec),
}

impl Selection {
    /// Concrete indices into an axis of length `len`, in selection order.
    pub fn resolve(&self, len: usize) -> FusionResult<Vec<usize>> {
        match self {
            Selection::All => Ok((0..len).collect()),
            Selection::List(items) => items.iter().map(|&i| wrap_index(i, len)).collect(),
            Selection::Range(range) => {
                if range.len() > len.saturating_mul(2) {
                    let bad = range.iter().find(|&i| i < -(len as i64) || i >= len as i64);
                    return Err(FusionError::SelectionOutOfRange {
                        index: bad.unwrap_or(range.start),
                        len,
                    });
                }
                range.iter().map(|i| wrap_index(i, len)).collect()
            }
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

fn wrap_index(index: i64, len: usize) -> FusionResult<usize> {
    let n = len as i64;
    let wrapped = if index < 0 { index + n } else { index };
    if wrapped < 0 || wrapped >= n {
        return Err(FusionError::SelectionOutOfRange { index, len });
    }
    Ok(wrapped as usize)
}

/// Parse a selection expression.
pub fn parse_selection(expr: impl Into<SelectionExpr>) -> FusionResult<Selection> {
    match expr.into() {
        SelectionExpr::Index(i) => Ok(Selection::List(vec![i])),
        SelectionExpr::Text(text) => parse_text(&text),
        SelectionExpr::Items(items) => items
            .iter()
            .map(|item| {
                item.as_i64().ok_or_else(|| {
                    FusionError::SelectionType(format!(
                        "selection should only contain integers, got {item}"
                    ))
                })
            })
            .collect::<FusionResult<Vec<_>>>()
            .map(Selection::List),
        SelectionExpr::Other(value) => Err(FusionError::SelectionType(format!(
            "unsupported selection input {value}"
        ))),
    }
}

fn parse_text(text: &str) -> FusionResult<Selection> {
    let trimmed = text.trim();
    if ALL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t)) {
        return Ok(Selection::All);
    }
    let segments: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    if segments.len() == 1 && segments[0].contains(':') {
        return parse_range(segments[0]).map(Selection::Range);
    }
    let mut items = Vec::new();
    for segment in segments {
        if segment.contains(':') {
            let range = parse_range(segment)?;
            if items.len().saturating_add(range.len()) > MAX_LIST_LEN {
                return Err(FusionError::SelectionFormat(format!(
                    "'{segment}' expands to more than {MAX_LIST_LEN} indices"
                )));
            }
            items.extend(range.iter());
        } else {
            items.push(parse_int(segment, text)?);
        }
    }
    Ok(Selection::List(items))
}

fn parse_range(segment: &str) -> FusionResult<RangeSpec> {
    let parts: Vec<&str> = segment.split(':').map(str::trim).collect();
    if parts.len() > 3 {
        return Err(FusionError::SelectionFormat(format!(
            "'{segment}' should be of format from:to(:by)"
        )));
    }
    let start = parse_int(parts[0], segment)?;
    let stop = parse_int(parts[1], segment)?;
    let step = match parts.get(2) {
        Some(step) => parse_int(step, segment)?,
        None => 1,
    };
    if step == 0 {
        return Err(FusionError::SelectionFormat(format!(
            "'{segment}' has a zero step"
        )));
    }
    Ok(RangeSpec { start, stop, step })
}

fn parse_int(token: &str, context: &str) -> FusionResult<i64> {
    token.parse::<i64>().map_err(|_| {
        FusionError::SelectionFormat(format!(
            "'{token}' in '{context}' is not an integer; expected from:to(:by) or integers"
        ))
    })
}
