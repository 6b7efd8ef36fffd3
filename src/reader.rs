//! Catalog file reading.

use crate::domain::RawRecord;
use crate::error::{LoaderError, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

pub const EXPECTED_HEADERS: [&str; 12] = [
    "show_id",
    "type",
    "title",
    "director",
    "cast",
    "country",
    "date_added",
    "release_year",
    "rating",
    "duration",
    "listed_in",
    "description",
];

/// A row the CSV layer could not decode (wrong field count, bad UTF-8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRow {
    /// 1-based line in the file, when the parser knows it.
    pub line: Option<u64>,
    pub reason: String,
}

/// Rows read from one catalog file, in file order.
#[derive(Debug, Clone, Default)]
pub struct CatalogBatch {
    pub records: Vec<RawRecord>,
    pub unreadable: Vec<UnreadableRow>,
}

pub fn read_catalog(path: &Path) -> Result<CatalogBatch> {
    let file = File::open(path).map_err(|e| {
        LoaderError::Config(format!(
            "Failed to open catalog file '{}': {}",
            path.display(),
            e
        ))
    })?;
    let batch = read_catalog_from(BufReader::new(file))?;
    info!(
        path = %path.display(),
        records = batch.records.len(),
        unreadable = batch.unreadable.len(),
        "Read catalog file"
    );
    Ok(batch)
}

/// Read a headed catalog from any reader. Columns are matched by header name,
/// so their order does not matter; a missing column fails the whole read.
pub fn read_catalog_from<R: Read>(reader: R) -> Result<CatalogBatch> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<&str> = EXPECTED_HEADERS
        .iter()
        .copied()
        .filter(|expected| !headers.iter().any(|h| h == *expected))
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingField(format!(
            "catalog header lacks column(s): {}",
            missing.join(", ")
        )));
    }

    let mut batch = CatalogBatch::default();
    for (index, row) in rdr.deserialize::<RawRecord>().enumerate() {
        match row {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                warn!(row = index + 1, "Skipping unreadable catalog row: {}", e);
                batch.unreadable.push(UnreadableRow {
                    line: e.position().map(|pos| pos.line()),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(batch)
}
