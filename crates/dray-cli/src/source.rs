//! Local source files
//!
//! Scans the source directory for report files and decodes them into
//! the engine's tabular form. Decompression lives here, outside the
//! engine; the engine only ever sees decoded columns and rows plus the
//! opaque raw file name.

use crate::error::{CliError, Result};
use dray_core::{Compression, DecodedTable, FileIdentity, ParseError};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One recognized file on disk.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub identity: FileIdentity,
    pub path: PathBuf,
}

/// Outcome of scanning the source directory. Unrecognized names are
/// kept for reporting; they never fail the scan.
#[derive(Debug, Clone, Default)]
pub struct ScannedFiles {
    pub files: Vec<LocalFile>,
    pub skipped: Vec<(String, ParseError)>,
}

impl ScannedFiles {
    pub fn identities(&self) -> Vec<FileIdentity> {
        self.files.iter().map(|f| f.identity.clone()).collect()
    }
}

/// Recursively scan a directory for `.csv`, `.csv.gz` and `.csv.zip`
/// files, parsing each name into its identity.
pub fn scan_source_dir(dir: &Path) -> Result<ScannedFiles> {
    let mut scanned = ScannedFiles::default();

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CliError::config(format!("cannot read source directory '{}': {e}", dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        // Only consider files that at least look like CSVs; other
        // files (readmes, checksums) are silently ignored.
        let lower = name.to_lowercase();
        if !lower.contains(".csv") {
            continue;
        }

        match FileIdentity::parse(&name) {
            Ok(identity) => {
                debug!(file = %name, base = %identity.base_name, "Recognized source file");
                scanned.files.push(LocalFile {
                    identity,
                    path: entry.path().to_path_buf(),
                });
            },
            Err(err) => scanned.skipped.push((name, err)),
        }
    }

    Ok(scanned)
}

/// Decode one source file into columns and rows.
///
/// Gzip is decoded inline; zip archives are recognized but not
/// unpacked here — the operator converts them to gzip first.
pub fn decode_file(file: &LocalFile) -> Result<DecodedTable> {
    let raw_name = &file.identity.raw_name;

    let reader: Box<dyn Read> = match file.identity.compression {
        Compression::None => Box::new(File::open(&file.path)?),
        Compression::Gzip => Box::new(GzDecoder::new(File::open(&file.path)?)),
        Compression::Zip => {
            return Err(CliError::decode(
                raw_name.clone(),
                "zip archives are not decoded; convert the file to .csv.gz first",
            ));
        },
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| CliError::decode(raw_name.clone(), e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() {
        return Err(CliError::decode(raw_name.clone(), "file has no header row"));
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| CliError::decode(raw_name.clone(), e.to_string()))?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }

    DecodedTable::new(&headers, rows).map_err(CliError::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use dray_core::ColumnType;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SAMPLE_CSV: &str = "Video ID,Views,Revenue\nabc,10,1.25\ndef,20,\n";

    fn write_plain(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn write_gzip(dir: &Path, name: &str, content: &str) {
        let file = File::create(dir.join(name)).unwrap();
        let mut encoder = GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_scan_recognizes_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        write_plain(dir.path(), "sales_v1-0_202401.csv", SAMPLE_CSV);
        write_plain(dir.path(), "v1-0.csv", "a\n1\n");
        write_plain(dir.path(), "notes.txt", "hello");

        let scanned = scan_source_dir(dir.path()).unwrap();
        assert_eq!(scanned.files.len(), 1);
        assert_eq!(scanned.files[0].identity.base_name, "sales");
        assert_eq!(scanned.skipped.len(), 1);
        assert_eq!(scanned.skipped[0].0, "v1-0.csv");
    }

    #[test]
    fn test_decode_plain_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_plain(dir.path(), "sales_v1-0.csv", SAMPLE_CSV);
        let scanned = scan_source_dir(dir.path()).unwrap();

        let table = decode_file(&scanned.files[0]).unwrap();
        assert_eq!(table.columns[0].name, "video_id");
        assert_eq!(table.columns[1].ty, ColumnType::Integer);
        assert_eq!(table.columns[2].ty, ColumnType::Decimal);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_decode_gzip_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_gzip(dir.path(), "sales_v1-0.csv.gz", SAMPLE_CSV);
        let scanned = scan_source_dir(dir.path()).unwrap();

        let table = decode_file(&scanned.files[0]).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_zip_reports_conversion_needed() {
        let dir = tempfile::tempdir().unwrap();
        write_plain(dir.path(), "sales_v1-0.csv.zip", "not a real zip");
        let scanned = scan_source_dir(dir.path()).unwrap();

        let err = decode_file(&scanned.files[0]).unwrap_err();
        assert!(matches!(err, CliError::Decode { .. }));
    }

    #[test]
    fn test_provenance_collision_detected_at_decode() {
        let dir = tempfile::tempdir().unwrap();
        write_plain(dir.path(), "sales_v1-0.csv", "_source_file,x\na,b\n");
        let scanned = scan_source_dir(dir.path()).unwrap();

        let err = decode_file(&scanned.files[0]).unwrap_err();
        assert!(matches!(
            err,
            CliError::Db(dray_core::DbError::ProvenanceCollision(_))
        ));
    }
}
