//! Database validation for untrusted `.dat` files
//!
//! Loading a database only checks what the loader itself touches: the
//! header, the prefix table and the rows each bucket names at its ends.
//! This module walks everything else a query can reach:
//!
//! - header and prefix table bounds
//! - every bucket: bounds order, rows inside the file
//! - every index row: `start_ip <= end_ip`, ascending `end_ip` per bucket,
//!   first octet consistent with the bucket key
//! - every location text: inside the file, UTF-8, exactly 11 fields
//!
//! # Usage
//!
//! ```rust,no_run
//! use iplocation::validation::{validate_database, ValidationLevel};
//! use std::path::Path;
//!
//! let report = validate_database(Path::new("ip.dat"), ValidationLevel::Strict)?;
//!
//! if report.is_valid() {
//!     println!("✓ {}", report.stats.summary());
//! } else {
//!     for error in &report.errors {
//!         println!("  - {}", error);
//!     }
//! }
//! # Ok::<(), iplocation::DatabaseError>(())
//! ```

use crate::error::DatabaseError;
use crate::format::{
    read_index_entry, read_location_text, DatHeader, PrefixRow, FIELD_SEPARATOR,
    LOCATION_FIELD_COUNT, PREFIX_ROW_SIZE,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Validation strictness level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationLevel {
    /// Header, prefix table and bucket bounds only
    Standard,
    /// Also every index row and every location text (default)
    #[default]
    Strict,
}

/// Validation report with detailed findings
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Problems that make lookups wrong or impossible
    pub errors: Vec<String>,
    /// Oddities queries tolerate
    pub warnings: Vec<String>,
    /// Informational messages about database properties
    pub info: Vec<String>,
    /// Database statistics
    pub stats: DatabaseStats,
}

/// Database statistics gathered during validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    /// File size in bytes
    pub file_size: usize,
    /// Rows in the prefix table, including repeated keys
    pub prefix_rows: u32,
    /// Distinct first octets with a bucket
    pub buckets: u32,
    /// Prefix rows overridden by a later row with the same key
    pub repeated_keys: u32,
    /// Index rows reachable through buckets
    pub entries: u64,
    /// Total bytes of location text referenced by those rows
    pub text_bytes: u64,
    /// Lowest and highest address covered, if any row was read
    pub address_span: Option<(u32, u32)>,
}

impl ValidationReport {
    /// Check if database passed all validations (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors split into file-level messages and per-bucket messages
    ///
    /// Bucket messages are keyed by first octet with their `bucket N: `
    /// prefix removed.
    pub fn errors_by_bucket(&self) -> (Vec<&str>, BTreeMap<u8, Vec<&str>>) {
        let mut general = Vec::new();
        let mut by_bucket: BTreeMap<u8, Vec<&str>> = BTreeMap::new();
        for error in &self.errors {
            match split_bucket_prefix(error) {
                Some((key, rest)) => by_bucket.entry(key).or_default().push(rest),
                None => general.push(error.as_str()),
            }
        }
        (general, by_bucket)
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }
}

impl DatabaseStats {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Prefix rows: {}, Buckets: {}, Entries: {}, Text: {} KB, Size: {} KB",
            self.prefix_rows,
            self.buckets,
            self.entries,
            self.text_bytes / 1024,
            self.file_size / 1024
        )
    }
}

/// `"bucket 218: row 4: ..."` -> `(218, "row 4: ...")`
fn split_bucket_prefix(message: &str) -> Option<(u8, &str)> {
    let rest = message.strip_prefix("bucket ")?;
    let (key, rest) = rest.split_once(": ")?;
    Some((key.parse().ok()?, rest))
}

/// Validate a database file
///
/// Fails only if the file cannot be read; format problems are reported in
/// the returned [`ValidationReport`].
pub fn validate_database(path: &Path, level: ValidationLevel) -> Result<ValidationReport, DatabaseError> {
    let buffer = std::fs::read(path)
        .map_err(|e| DatabaseError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(validate_buffer(&buffer, level))
}

/// Validate an in-memory database image
pub fn validate_buffer(buffer: &[u8], level: ValidationLevel) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.stats.file_size = buffer.len();

    let header = match DatHeader::parse(buffer) {
        Ok(h) => h,
        Err(e) => {
            report.error(e.to_string());
            return report;
        }
    };

    let buckets = match collect_buckets(buffer, &header, &mut report) {
        Some(b) => b,
        None => return report,
    };

    for &(key, start, end) in &buckets {
        validate_bucket_bounds(buffer, &header, key, start, end, &mut report);
    }

    if level == ValidationLevel::Strict && report.is_valid() {
        for &(key, start, end) in &buckets {
            validate_bucket_entries(buffer, &header, key, start, end, &mut report);
        }
    }

    report.info(format!(
        "{} bucket(s) across {} prefix row(s)",
        report.stats.buckets, report.stats.prefix_rows
    ));
    if let Some((low, high)) = report.stats.address_span {
        report.info(format!(
            "covers {} - {}",
            std::net::Ipv4Addr::from(low),
            std::net::Ipv4Addr::from(high)
        ));
    }
    report
}

/// Read the prefix table, resolving repeated keys the way the loader does
fn collect_buckets(
    buffer: &[u8],
    header: &DatHeader,
    report: &mut ValidationReport,
) -> Option<Vec<(u8, u32, u32)>> {
    let (count, range) = match (header.prefix_count(), header.prefix_table_range()) {
        (Ok(c), Ok(r)) => (c, r),
        (Err(e), _) | (_, Err(e)) => {
            report.error(e.to_string());
            return None;
        }
    };
    report.stats.prefix_rows = count;

    let table = match buffer.get(range.clone()) {
        Some(t) => t,
        None => {
            report.error(format!(
                "prefix table {}..{} exceeds file size {}",
                range.start,
                range.end,
                buffer.len()
            ));
            return None;
        }
    };

    if (header.prefix_end() - header.prefix_start()) % PREFIX_ROW_SIZE as u32 != 0 {
        report.warning(format!(
            "prefix table span {} is not a multiple of {} bytes",
            header.prefix_end() - header.prefix_start(),
            PREFIX_ROW_SIZE
        ));
    }

    let mut slots: [Option<(u32, u32)>; 256] = [None; 256];
    for bytes in table.chunks_exact(PREFIX_ROW_SIZE).take(count as usize) {
        let Some(row) = PrefixRow::parse(bytes) else {
            continue;
        };
        let bounds = (row.start_index.get(), row.end_index.get());
        if slots[row.key as usize].replace(bounds).is_some() {
            report.stats.repeated_keys += 1;
            report.warning(format!(
                "prefix key {} appears more than once; the last row wins",
                row.key
            ));
        }
    }

    let buckets: Vec<_> = slots
        .iter()
        .enumerate()
        .filter_map(|(key, slot)| slot.map(|(s, e)| (key as u8, s, e)))
        .collect();
    report.stats.buckets = buckets.len() as u32;
    if buckets.is_empty() {
        report.warning("prefix table has no rows");
    }
    Some(buckets)
}

fn validate_bucket_bounds(
    buffer: &[u8],
    header: &DatHeader,
    key: u8,
    start: u32,
    end: u32,
    report: &mut ValidationReport,
) {
    if start > end {
        report.error(format!(
            "bucket {}: start row {} is after end row {}",
            key, start, end
        ));
    }
    for row in [start, end] {
        if read_index_entry(buffer, header.first_index_offset(), row).is_none() {
            report.error(format!(
                "bucket {}: row {} lies outside the file",
                key, row
            ));
        }
    }
}

fn validate_bucket_entries(
    buffer: &[u8],
    header: &DatHeader,
    key: u8,
    start: u32,
    end: u32,
    report: &mut ValidationReport,
) {
    let mut previous_end: Option<u32> = None;

    for row in start..=end {
        let Some(entry) = read_index_entry(buffer, header.first_index_offset(), row) else {
            report.error(format!("bucket {}: row {} lies outside the file", key, row));
            return;
        };
        let (lo, hi) = (entry.start_ip(), entry.end_ip());
        report.stats.entries += 1;
        report.stats.text_bytes += u64::from(entry.local_length());
        report.stats.address_span = Some(match report.stats.address_span {
            Some((a, b)) => (a.min(lo), b.max(hi)),
            None => (lo, hi),
        });

        if lo > hi {
            report.error(format!(
                "bucket {}: row {}: start {} is after end {}",
                key,
                row,
                std::net::Ipv4Addr::from(lo),
                std::net::Ipv4Addr::from(hi)
            ));
        }
        if (lo >> 24) as u8 != key && (hi >> 24) as u8 != key {
            report.warning(format!(
                "bucket {}: row {}: block {} - {} does not start or end in it",
                key,
                row,
                std::net::Ipv4Addr::from(lo),
                std::net::Ipv4Addr::from(hi)
            ));
        }
        if let Some(prev) = previous_end {
            if hi < prev {
                report.error(format!(
                    "bucket {}: row {} end {} sorts before previous end {}",
                    key,
                    row,
                    std::net::Ipv4Addr::from(hi),
                    std::net::Ipv4Addr::from(prev)
                ));
            } else if lo <= prev {
                report.warning(format!(
                    "bucket {}: row {} overlaps the previous block",
                    key, row
                ));
            }
        }
        previous_end = Some(hi);

        validate_location_text(buffer, key, row, &entry, report);
    }
}

fn validate_location_text(
    buffer: &[u8],
    key: u8,
    row: u32,
    entry: &crate::format::IndexEntry,
    report: &mut ValidationReport,
) {
    let Some(bytes) = read_location_text(buffer, entry) else {
        report.error(format!(
            "bucket {}: row {}: location text {}..{} exceeds file size {}",
            key,
            row,
            entry.text_range().start,
            entry.text_range().end,
            buffer.len()
        ));
        return;
    };

    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            report.warning(format!(
                "bucket {}: row {}: location text is not UTF-8 ({})",
                key, row, e
            ));
            return;
        }
    };

    let fields = text.split(FIELD_SEPARATOR).count();
    if fields != LOCATION_FIELD_COUNT {
        report.error(format!(
            "bucket {}: row {}: location text has {} field(s), expected {}",
            key, row, fields, LOCATION_FIELD_COUNT
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::DatFixture;

    const SHENZHEN: &str =
        "Asia|China|Guangdong|Shenzhen||China Telecom|440300|Shenzhen|SZ|114.05|22.55";

    #[test]
    fn test_valid_database() {
        let bytes = DatFixture::new()
            .range("1.0.0.0", "1.0.0.255", SHENZHEN)
            .range("1.0.1.0", "1.0.1.255", SHENZHEN)
            .range("218.88.127.0", "218.88.127.255", SHENZHEN)
            .build();
        let report = validate_buffer(&bytes, ValidationLevel::Strict);
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
        assert_eq!(report.stats.prefix_rows, 2);
        assert_eq!(report.stats.buckets, 2);
        assert_eq!(report.stats.entries, 3);
        assert_eq!(report.stats.text_bytes, 3 * SHENZHEN.len() as u64);
        assert_eq!(
            report.stats.address_span,
            Some((0x0100_0000, crate::fixture::ip("218.88.127.255")))
        );
        assert!(report.stats.summary().contains("Entries: 3"));
    }

    #[test]
    fn test_truncated_header() {
        let report = validate_buffer(&[0u8; 4], ValidationLevel::Strict);
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("too small"));
    }

    #[test]
    fn test_unsorted_bucket() {
        let bytes = DatFixture::new()
            .range("2.0.1.0", "2.0.1.255", SHENZHEN)
            .range("2.0.0.0", "2.0.0.255", SHENZHEN)
            .build();
        let report = validate_buffer(&bytes, ValidationLevel::Strict);
        assert!(report.errors.iter().any(|e| e.contains("sorts before")));

        // Standard level does not walk rows
        assert!(validate_buffer(&bytes, ValidationLevel::Standard).is_valid());
    }

    #[test]
    fn test_bad_field_count_and_inverted_range() {
        let bytes = DatFixture::new()
            .range("3.0.0.9", "3.0.0.1", "only|three|fields")
            .build();
        let report = validate_buffer(&bytes, ValidationLevel::Strict);
        assert!(report.errors.iter().any(|e| e.contains("3 field(s)")));
        assert!(report.errors.iter().any(|e| e.contains("is after end")));
    }

    #[test]
    fn test_repeated_key_warns() {
        let bytes = DatFixture::new()
            .range("4.0.0.0", "4.0.0.255", SHENZHEN)
            .prefix_rows(&[(4, 0, 0), (4, 0, 0)])
            .build();
        let report = validate_buffer(&bytes, ValidationLevel::Strict);
        assert!(report.is_valid());
        assert_eq!(report.stats.repeated_keys, 1);
        assert!(report.warnings.iter().any(|w| w.contains("last row wins")));
    }

    #[test]
    fn test_bucket_outside_file() {
        let bytes = DatFixture::new()
            .range("5.0.0.0", "5.0.0.255", SHENZHEN)
            .prefix_rows(&[(5, 0, 99)])
            .build();
        let report = validate_buffer(&bytes, ValidationLevel::Standard);
        assert!(report.errors.iter().any(|e| e.contains("outside the file")));
    }

    #[test]
    fn test_non_utf8_text_warns() {
        let text = "Asia|\u{00e9}|||||||||";
        let mut bytes = DatFixture::new().range("6.0.0.0", "6.0.0.255", text).build();
        let pos = bytes.windows(2).position(|w| w == [0xC3, 0xA9]).unwrap();
        bytes[pos] = 0xFF;
        let report = validate_buffer(&bytes, ValidationLevel::Strict);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("not UTF-8")));
    }

    #[test]
    fn test_validate_missing_file() {
        let result = validate_database(Path::new("/nonexistent/ip.dat"), ValidationLevel::Strict);
        assert!(matches!(result, Err(DatabaseError::Io(_))));
    }

    #[test]
    fn test_errors_grouped_by_bucket() {
        let bytes = DatFixture::new()
            .range("7.0.0.0", "7.0.0.255", "a|b|c")
            .range("9.0.0.0", "9.0.0.255", SHENZHEN)
            .range("9.0.1.0", "9.0.0.9", SHENZHEN)
            .build();
        let report = validate_buffer(&bytes, ValidationLevel::Strict);
        let (general, by_bucket) = report.errors_by_bucket();

        assert!(general.is_empty());
        assert_eq!(by_bucket.keys().copied().collect::<Vec<_>>(), vec![7, 9]);
        assert!(by_bucket[&7][0].starts_with("row 0: location text has 3 field(s)"));
        assert!(by_bucket[&9].iter().any(|e| e.contains("is after end")));

        let truncated = validate_buffer(&[0u8; 4], ValidationLevel::Strict);
        let (general, by_bucket) = truncated.errors_by_bucket();
        assert_eq!(general.len(), 1);
        assert!(by_bucket.is_empty());
    }
}
