//! File name parsing
//!
//! Report files arrive with structured names of the form
//! `<base>[_v<major>(-<minor>)*][_<period>].csv[.gz|.zip]`, for example
//! `channel_summary_v1-1_202401.csv.gz`. The base name identifies the
//! dataset and is stable across versions and periods; it later becomes
//! the target table name. Parsing is pure and deterministic, and an
//! unrecognized name is a skip-candidate for the caller, never a reason
//! to abort a run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

fn version_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v\d+(-\d+)*$").expect("static regex"))
}

/// Errors from file name parsing. The offending raw name is always
/// carried so callers can report skipped files.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unrecognized file name '{0}': expected .csv, .csv.gz or .csv.zip")]
    UnrecognizedExtension(String),

    #[error("file name '{0}' has no dataset name before its version/period tokens")]
    MissingBaseName(String),

    #[error("file name '{0}' has an out-of-range period token")]
    InvalidPeriod(String),
}

/// Compression wrapper around the CSV payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Zip,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zip => write!(f, "zip"),
        }
    }
}

/// Recognized payload format. Only CSV today; the enum keeps the
/// extension explicit in the identity rather than implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    Csv,
}

/// A dash-separated version token such as `v1-0` or `v2`.
///
/// Segments compare numerically, left to right, so `v1-2 < v1-10 < v2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileVersion(Vec<u32>);

impl FileVersion {
    pub fn new(segments: Vec<u32>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("-");
        write!(f, "v{}", joined)
    }
}

/// Typed identity of one report file.
///
/// Two identities describe the same logical file (a duplicate) when
/// every field except `raw_name` is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    /// The file name exactly as it arrived; stored as the provenance tag.
    pub raw_name: String,
    /// Dataset identifier, stable across versions and periods.
    pub base_name: String,
    /// Optional version token; absent versions sort lowest.
    pub version: Option<FileVersion>,
    /// Optional reporting period (YYYYMM or YYYYMMDD).
    pub period: Option<u32>,
    pub compression: Compression,
    pub extension: Extension,
}

impl FileIdentity {
    /// Parse a raw file name into its typed identity.
    ///
    /// Pure and total over the recognized grammar; re-parsing the
    /// `raw_name` of a parsed identity yields the identical identity.
    pub fn parse(raw_name: &str) -> Result<FileIdentity, ParseError> {
        let lower = raw_name.to_lowercase();

        let (stem, compression) = if let Some(stem) = lower.strip_suffix(".csv.gz") {
            (stem, Compression::Gzip)
        } else if let Some(stem) = lower.strip_suffix(".csv.zip") {
            (stem, Compression::Zip)
        } else if let Some(stem) = lower.strip_suffix(".csv") {
            (stem, Compression::None)
        } else {
            return Err(ParseError::UnrecognizedExtension(raw_name.to_string()));
        };

        let mut tokens: Vec<&str> = stem.split('_').collect();

        let period = match tokens.last() {
            Some(last) if is_period_token(last) => {
                let token = tokens.pop().unwrap_or_default();
                Some(
                    token
                        .parse::<u32>()
                        .map_err(|_| ParseError::InvalidPeriod(raw_name.to_string()))?,
                )
            },
            _ => None,
        };

        let version = match tokens.last() {
            Some(last) if version_token_re().is_match(last) => {
                let token = tokens.pop().unwrap_or_default();
                Some(parse_version_token(token))
            },
            _ => None,
        };

        let base_name = tokens.join("_");
        if base_name.trim_matches('_').is_empty() {
            return Err(ParseError::MissingBaseName(raw_name.to_string()));
        }

        Ok(FileIdentity {
            raw_name: raw_name.to_string(),
            base_name,
            version,
            period,
            compression,
            extension: Extension::Csv,
        })
    }

    /// Key identifying "the same logical file": everything but the raw name.
    pub fn dedup_key(&self) -> (&str, Option<&FileVersion>, Option<u32>) {
        (&self.base_name, self.version.as_ref(), self.period)
    }
}

fn is_period_token(token: &str) -> bool {
    (token.len() == 6 || token.len() == 8) && token.chars().all(|c| c.is_ascii_digit())
}

fn parse_version_token(token: &str) -> FileVersion {
    // Token already matched ^v\d+(-\d+)*$; segments can still overflow
    // u32 on absurd input, which saturates rather than failing parse.
    let segments = token[1..]
        .split('-')
        .map(|s| s.parse::<u32>().unwrap_or(u32::MAX))
        .collect();
    FileVersion::new(segments)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_csv() {
        let id = FileIdentity::parse("adj_summary_v1-1_202401.csv").unwrap();
        assert_eq!(id.raw_name, "adj_summary_v1-1_202401.csv");
        assert_eq!(id.base_name, "adj_summary");
        assert_eq!(id.version, Some(FileVersion::new(vec![1, 1])));
        assert_eq!(id.period, Some(202401));
        assert_eq!(id.compression, Compression::None);
    }

    #[test]
    fn test_parse_gzip_and_zip() {
        let gz = FileIdentity::parse("sales_v1-0.csv.gz").unwrap();
        assert_eq!(gz.compression, Compression::Gzip);
        assert_eq!(gz.base_name, "sales");
        assert_eq!(gz.period, None);

        let zip = FileIdentity::parse("sales_v1-0.csv.zip").unwrap();
        assert_eq!(zip.compression, Compression::Zip);
    }

    #[test]
    fn test_parse_without_version_or_period() {
        let id = FileIdentity::parse("inventory.csv").unwrap();
        assert_eq!(id.base_name, "inventory");
        assert_eq!(id.version, None);
        assert_eq!(id.period, None);
    }

    #[test]
    fn test_parse_daily_period() {
        let id = FileIdentity::parse("clicks_20240115.csv").unwrap();
        assert_eq!(id.base_name, "clicks");
        assert_eq!(id.period, Some(20240115));
    }

    #[test]
    fn test_base_name_may_contain_digits() {
        // A trailing numeric token only counts as a period at 6 or 8 digits.
        let id = FileIdentity::parse("region_42_v2.csv").unwrap();
        assert_eq!(id.base_name, "region_42");
        assert_eq!(id.version, Some(FileVersion::new(vec![2])));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = FileIdentity::parse("adj_summary_v1-1_202401.csv.gz").unwrap();
        let again = FileIdentity::parse(&first.raw_name).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_unrecognized_extension() {
        assert!(matches!(
            FileIdentity::parse("notes.txt"),
            Err(ParseError::UnrecognizedExtension(n)) if n == "notes.txt"
        ));
        assert!(FileIdentity::parse("archive.csv.bz2").is_err());
    }

    #[test]
    fn test_missing_base_name() {
        assert!(matches!(
            FileIdentity::parse("v1-0_202401.csv"),
            Err(ParseError::MissingBaseName(_))
        ));
        assert!(FileIdentity::parse(".csv").is_err());
    }

    #[test]
    fn test_version_ordering() {
        let v1_2 = FileVersion::new(vec![1, 2]);
        let v1_10 = FileVersion::new(vec![1, 10]);
        let v2 = FileVersion::new(vec![2]);
        assert!(v1_2 < v1_10);
        assert!(v1_10 < v2);
        assert_eq!(v1_2.to_string(), "v1-2");
    }

    #[test]
    fn test_dedup_key_ignores_raw_name() {
        let a = FileIdentity::parse("sales_v1-0_202401.csv").unwrap();
        let b = FileIdentity::parse("sales_v1-0_202401.csv.gz").unwrap();
        // Same export compressed differently still counts as one logical file.
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.raw_name, b.raw_name);
    }
}
