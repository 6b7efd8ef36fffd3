/// Marker the source catalog uses for an absent cell.
pub const MISSING_MARKER: &str = "NULL";

/// Separator for multi-valued columns (director, cast, country, listed_in).
pub const LIST_DELIMITER: char = ',';

/// A delimiter-free director value longer than this is kept as one free-text token.
pub const DIRECTOR_LIST_THRESHOLD: usize = 100;

/// Input format of the `date_added` column, e.g. "September 25, 2021".
pub const DATE_ADDED_FORMAT: &str = "%B %d, %Y";

/// Storage format of release dates.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Number of derived genre buckets; bucket = (content_id mod GENRE_BUCKETS) + 1.
pub const GENRE_BUCKETS: i64 = 9;

/// Pre-seeded director row standing in for "several directors, see content_directors".
pub const MULTIPLE_DIRECTORS_ID: i64 = 1;
pub const MULTIPLE_DIRECTORS_NAME: &str = "Multiple Directors";

/// Pre-seeded rating row used when the catalog has no rating.
pub const NEEDS_REVISION_RATING_ID: i64 = 1;
pub const NEEDS_REVISION_RATING_NAME: &str = "Needs Revision";

/// Value written to content_availability for freshly loaded titles.
pub const AVAILABLE: i64 = 1;

// Environment overrides
pub const ENV_INPUT: &str = "CATALOG_INPUT";
pub const ENV_DB_PATH: &str = "CATALOG_DB_PATH";
pub const ENV_STORAGE: &str = "CATALOG_STORAGE";
pub const ENV_METRICS_ADDR: &str = "CATALOG_METRICS_ADDR";
pub const ENV_LIBSQL_URL: &str = "LIBSQL_URL";
pub const ENV_LIBSQL_AUTH_TOKEN: &str = "LIBSQL_AUTH_TOKEN";

pub const DEFAULT_CONFIG_PATH: &str = "catalog_loader.toml";
pub const DEFAULT_INPUT_PATH: &str = "Data.csv";
pub const DEFAULT_SQLITE_PATH: &str = "catalog.db";
