//! Dataset consolidation: merge, dedupe, canonicalize, renumber
//!
//! Input tables arrive in arbitrary text encodings. Each file is decoded
//! independently (undecodable bytes replaced, never fatal), the header is
//! kept from the first non-empty file, rows are deduplicated first-wins on
//! the key column, and column 0 of every surviving row is renumbered densely
//! from 1. The master dataset is written as UTF-8 without a byte-order mark.

use crate::{utils, CaptureError};
use chardetng::EncodingDetector;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Options for one merge run
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Dedup-key column; `None` disables deduplication (pass-through merge)
    pub key_column: Option<usize>,

    /// Rewrite the key column to the canonical `https://www.<domain>` form,
    /// producing the domain-oriented dataset variant
    pub canonicalize: bool,
}

impl MergeOptions {
    /// Translate the configured signed index (`-1` disables dedup)
    pub fn from_key_index(key_column: i64, canonicalize: bool) -> Self {
        Self {
            key_column: usize::try_from(key_column).ok(),
            canonicalize,
        }
    }
}

/// One row of the consolidated master dataset, as consumed by capture passes
#[derive(Debug, Clone)]
pub struct MasterRecord {
    /// Dense display sequence number, never identity
    pub sequence_id: u32,
    pub url: String,
    /// Display field used in output filenames, distinct from the dedup key
    pub domain: String,
}

/// Column positions resolved once per file, before any row is read
///
/// Header names win over the configured positional defaults when present, so
/// tables with reordered columns still map correctly.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    url: usize,
    domain: usize,
}

impl ColumnMap {
    fn from_header(header: &csv::StringRecord, url_default: usize, domain_default: usize) -> Self {
        let find = |name: &str| {
            header
                .iter()
                .position(|field| field.trim().eq_ignore_ascii_case(name))
        };
        Self {
            url: find("url").unwrap_or(url_default),
            domain: find("domain").unwrap_or(domain_default),
        }
    }
}

/// Read one input table, detecting its encoding and replacing malformed bytes
fn decode_table(path: &Path) -> Result<String, CaptureError> {
    let bytes = std::fs::read(path)?;

    let mut detector = EncodingDetector::new();
    detector.feed(&bytes, true);
    let encoding = detector.guess(None, true);

    let (decoded, actual, _had_replacements) = encoding.decode(&bytes);
    debug!(
        "Decoded {} as {}",
        path.display(),
        actual.name()
    );
    Ok(decoded.into_owned())
}

/// List the `.csv` files of the input directory in stable name-sorted order
fn list_input_tables(input_dir: &Path) -> Result<Vec<std::path::PathBuf>, CaptureError> {
    if !input_dir.is_dir() {
        return Err(CaptureError::ConfigurationError(format!(
            "Input directory not found: {}",
            input_dir.display()
        )));
    }

    let mut files: Vec<_> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(CaptureError::ConfigurationError(format!(
            "No table files in {}",
            input_dir.display()
        )));
    }

    Ok(files)
}

/// Merge every input table into one master dataset
///
/// Returns the number of surviving data rows. Fails with a configuration
/// error when the input directory is missing or empty, and with
/// [`CaptureError::EmptyDataset`] when no data row survives the merge. A
/// single unreadable input file is logged and skipped; the merge continues.
pub fn merge_tables(
    input_dir: &Path,
    output_file: &Path,
    options: &MergeOptions,
) -> Result<usize, CaptureError> {
    let files = list_input_tables(input_dir)?;

    let mut header: Option<csv::StringRecord> = None;
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for path in &files {
        let decoded = match decode_table(path) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Skipping unreadable input file {}: {}", path.display(), e);
                continue;
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(decoded.as_bytes());

        let mut records = reader.records();

        // First row is this file's header; only the first non-empty one is kept
        let file_header = match records.next() {
            Some(Ok(record)) if record.len() > 0 => record,
            _ => continue,
        };
        if header.is_none() {
            header = Some(file_header);
        }

        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed row in {}: {}", path.display(), e);
                    continue;
                }
            };

            let mut row: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            if row.is_empty() {
                continue;
            }

            if options.canonicalize {
                if let Some(key) = options.key_column {
                    if let Some(field) = row.get_mut(key) {
                        // Emptied rather than left stale when extraction fails
                        *field = utils::canonical_domain_url(field).unwrap_or_default();
                    }
                }
            }

            if let Some(key) = options.key_column {
                // Short rows cannot carry the key; skipped, not fatal
                let Some(field) = row.get(key) else {
                    continue;
                };
                // First row with a given key wins; later duplicates are
                // expected high-volume behavior, dropped without logging.
                // A blank key (including a failed canonicalization) cannot
                // say two rows are the same underlying URL, so such rows
                // never collide with each other and are all kept.
                let key_value = field.trim();
                if !key_value.is_empty() && !seen_keys.insert(key_value.to_string()) {
                    continue;
                }
            }

            rows.push(row);
        }
    }

    if rows.is_empty() {
        return Err(CaptureError::EmptyDataset);
    }

    // Column 0 is purely a display sequence number, reassigned densely
    for (index, row) in rows.iter_mut().enumerate() {
        row[0] = (index + 1).to_string();
    }

    if let Some(parent) = output_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(output_file)?;
    if let Some(header) = &header {
        writer.write_record(header)?;
    }
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    info!(
        "Merged {} rows from {} file(s) into {}",
        rows.len(),
        files.len(),
        output_file.display()
    );
    Ok(rows.len())
}

/// Read the master dataset back for a capture pass
///
/// The master dataset is read-only input: passes never mutate it. Rows too
/// short to carry the URL and domain columns are skipped.
pub fn read_master(
    path: &Path,
    url_column: usize,
    domain_column: usize,
) -> Result<Vec<MasterRecord>, CaptureError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut records = reader.records();
    let columns = match records.next() {
        Some(Ok(header)) => ColumnMap::from_header(&header, url_column, domain_column),
        Some(Err(e)) => return Err(e.into()),
        None => {
            return Err(CaptureError::ConfigurationError(format!(
                "Master dataset is empty: {}",
                path.display()
            )))
        }
    };

    let needed = columns.url.max(columns.domain) + 1;
    let mut rows = Vec::new();

    for (index, record) in records.enumerate() {
        let record = record?;
        if record.len() < needed {
            continue;
        }

        let url = record[columns.url].trim().to_string();
        let domain = record[columns.domain].trim().to_string();
        let sequence_id = record
            .get(0)
            .and_then(|f| f.trim().parse::<u32>().ok())
            .unwrap_or(index as u32 + 1);

        rows.push(MasterRecord {
            sequence_id,
            url,
            domain,
        });
    }

    Ok(rows)
}
