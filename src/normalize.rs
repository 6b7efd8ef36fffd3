//! Field normalization: turns raw catalog cells into atomic entity names.
//!
//! Everything here is pure. Malformed values degrade to [`FieldValue::Absent`]
//! and never abort a load.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::constants::{
    DATE_ADDED_FORMAT, DIRECTOR_LIST_THRESHOLD, ISO_DATE_FORMAT, LIST_DELIMITER, MISSING_MARKER,
};
use crate::domain::RawRecord;
use crate::error::{LoaderError, Result};

static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-]?\d+)(?:\.\d*)?$").expect("numeric pattern is valid"));

/// How a raw cell should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single value, never split (format, rating).
    Scalar,
    /// Delimiter-separated list (cast, country, listed_in).
    List,
    /// Delimiter-separated list with the long free-text exception.
    Director,
    /// "Month Day, Year" date, stored as ISO.
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    #[default]
    Absent,
    Token(String),
    Tokens(Vec<String>),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Names in source order, regardless of shape.
    pub fn names(&self) -> Vec<&str> {
        match self {
            FieldValue::Absent => Vec::new(),
            FieldValue::Token(name) => vec![name.as_str()],
            FieldValue::Tokens(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// True for cells the catalog marks as absent: the sentinel or blank.
pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == MISSING_MARKER
}

pub fn normalize(raw: &str, kind: FieldKind) -> FieldValue {
    if is_missing(raw) {
        return FieldValue::Absent;
    }
    match kind {
        FieldKind::Scalar => FieldValue::Token(raw.trim().to_string()),
        FieldKind::List => split_list(raw),
        FieldKind::Director => normalize_director(raw),
        FieldKind::Date => match parse_date_added(raw) {
            Some(iso) => FieldValue::Token(iso),
            None => FieldValue::Absent,
        },
    }
}

fn split_list(raw: &str) -> FieldValue {
    if !raw.contains(LIST_DELIMITER) {
        return FieldValue::Token(raw.trim().to_string());
    }
    tokens(raw)
}

/// Directors without a delimiter go through the list path (one-element list)
/// unless the value is longer than the threshold, in which case it is kept
/// as a single free-text token.
fn normalize_director(raw: &str) -> FieldValue {
    if !raw.contains(LIST_DELIMITER) && raw.chars().count() > DIRECTOR_LIST_THRESHOLD {
        return FieldValue::Token(raw.trim().to_string());
    }
    tokens(raw)
}

fn tokens(raw: &str) -> FieldValue {
    let parts: Vec<String> = raw
        .split(LIST_DELIMITER)
        .map(str::trim)
        .filter(|part| !part.is_empty() && *part != MISSING_MARKER)
        .map(str::to_string)
        .collect();
    if parts.is_empty() {
        FieldValue::Absent
    } else {
        FieldValue::Tokens(parts)
    }
}

/// Parse "January 1, 2020" into "2020-01-01".
pub fn parse_date_added(raw: &str) -> Option<String> {
    if is_missing(raw) {
        return None;
    }
    match NaiveDate::parse_from_str(raw.trim(), DATE_ADDED_FORMAT) {
        Ok(date) => Some(date.format(ISO_DATE_FORMAT).to_string()),
        Err(e) => {
            warn!(value = raw, error = %e, "unparseable date_added, treating as absent");
            None
        }
    }
}

/// Integer prefix of a numeric-looking cell: "2020.0" -> 2020, "90 min" -> None.
pub fn integer_prefix(raw: &str) -> Option<i64> {
    if is_missing(raw) {
        return None;
    }
    let caps = NUMERIC.captures(raw.trim())?;
    caps.get(1)?.as_str().parse().ok()
}

/// Natural content id: "s5" -> 5. One leading non-digit prefix character is stripped.
pub fn natural_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let digits = match trimmed.chars().next() {
        Some(c) if !c.is_ascii_digit() && c != '-' && c != '+' => &trimmed[c.len_utf8()..],
        _ => trimmed,
    };
    integer_prefix(digits)
}

/// Trimmed free text, or None when absent.
pub fn text(raw: &str) -> Option<String> {
    if is_missing(raw) {
        None
    } else {
        Some(raw.trim().to_string())
    }
}

/// A raw record with every column cleaned and typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub content_id: i64,
    pub format: FieldValue,
    pub title: Option<String>,
    pub directors: FieldValue,
    pub cast: FieldValue,
    pub countries: FieldValue,
    pub date_added: FieldValue,
    pub release_year: Option<i64>,
    pub rating: FieldValue,
    pub duration: Option<String>,
    pub tags: FieldValue,
    pub description: Option<String>,
}

impl NormalizedRecord {
    /// Fails only when the natural id is missing or not numeric; every other
    /// malformed cell becomes absent.
    pub fn from_raw(raw: &RawRecord) -> Result<Self> {
        let content_id = natural_id(&raw.show_id).ok_or_else(|| {
            LoaderError::MissingField(format!("show_id (got {:?})", raw.show_id))
        })?;

        let release_year = integer_prefix(&raw.release_year);
        if release_year.is_none() && !is_missing(&raw.release_year) {
            warn!(content_id, value = %raw.release_year, "non-numeric release_year, treating as absent");
        }

        Ok(Self {
            content_id,
            format: normalize(&raw.format, FieldKind::Scalar),
            title: text(&raw.title),
            directors: normalize(&raw.director, FieldKind::Director),
            cast: normalize(&raw.cast, FieldKind::List),
            countries: normalize(&raw.country, FieldKind::List),
            date_added: normalize(&raw.date_added, FieldKind::Date),
            release_year,
            rating: normalize(&raw.rating, FieldKind::Scalar),
            duration: text(&raw.duration),
            tags: normalize(&raw.listed_in, FieldKind::List),
            description: text(&raw.description),
        })
    }
}
