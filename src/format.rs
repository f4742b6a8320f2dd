//! On-disk layout of `.dat` geolocation databases
//!
//! The file is a single read-only blob. Every multi-byte integer is stored
//! least-significant byte first, so all structures below are declared with
//! unaligned little-endian fields and read straight out of the buffer with
//! `zerocopy`.
//!
//! # Layout
//!
//! ```text
//! [Header: DatHeader (16 bytes)]
//!   0..4    first_index_offset   byte offset of index row 0
//!   4..8    reserved             not read
//!   8..12   prefix_start_offset  first prefix row
//!   12..16  prefix_end_offset    last prefix row
//! [Location text pool: pipe-delimited UTF-8, referenced by (offset, length)]
//! [IP range index: IndexEntry array (12 bytes each), row N at first_index_offset + N*12]
//! [Prefix table: PrefixRow array (9 bytes each), prefix_start_offset..=prefix_end_offset]
//! ```
//!
//! The relative order of the pool, index and prefix table is not fixed; only
//! the header position is. Readers here never trust an offset: every access
//! is bounds-checked and returns `None` or a [`FormatError`] instead of
//! slicing past the end of the buffer.

use std::fmt;
use std::ops::Range;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of the fixed file header in bytes
pub const HEADER_SIZE: usize = 16;

/// Size of one IP range index entry in bytes
pub const INDEX_ENTRY_SIZE: usize = 12;

/// Size of one prefix table row in bytes
pub const PREFIX_ROW_SIZE: usize = 9;

/// Number of `|`-separated fields in a location text
pub const LOCATION_FIELD_COUNT: usize = 11;

/// Separator between location fields
pub const FIELD_SEPARATOR: char = '|';

/// Errors raised while decoding the fixed parts of the layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Buffer is too small to hold a header
    FileTooSmall {
        /// Actual buffer size in bytes
        size: usize,
        /// Minimum required size in bytes
        required: usize,
    },
    /// Prefix table bounds in the header are inconsistent
    InvalidPrefixTable(String),
    /// A region referenced by the header or prefix table lies outside the buffer
    OutOfBounds {
        /// Which region was being read
        region: &'static str,
        /// Start offset of the region
        offset: usize,
        /// Length of the region in bytes
        len: usize,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::FileTooSmall { size, required } => write!(
                f,
                "File too small: {} bytes (need at least {})",
                size, required
            ),
            FormatError::InvalidPrefixTable(msg) => write!(f, "Invalid prefix table: {}", msg),
            FormatError::OutOfBounds {
                region,
                offset,
                len,
            } => write!(
                f,
                "{} out of bounds (offset {}, {} bytes)",
                region, offset, len
            ),
        }
    }
}

impl std::error::Error for FormatError {}

/// File header (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct DatHeader {
    /// Byte offset of index row 0
    pub first_index_offset: U32<LittleEndian>,
    /// Unused
    pub reserved: U32<LittleEndian>,
    /// Byte offset of the first prefix row
    pub prefix_start_offset: U32<LittleEndian>,
    /// Byte offset of the last prefix row
    pub prefix_end_offset: U32<LittleEndian>,
}

impl DatHeader {
    /// Decode the header at the start of `buffer`
    pub fn parse(buffer: &[u8]) -> Result<Self, FormatError> {
        let (header, _) = Self::read_from_prefix(buffer).map_err(|_| FormatError::FileTooSmall {
            size: buffer.len(),
            required: HEADER_SIZE,
        })?;
        Ok(header)
    }

    /// Byte offset of index row 0
    #[inline]
    pub fn first_index_offset(&self) -> u32 {
        self.first_index_offset.get()
    }

    /// Byte offset of the first prefix row
    #[inline]
    pub fn prefix_start(&self) -> u32 {
        self.prefix_start_offset.get()
    }

    /// Byte offset of the last prefix row
    #[inline]
    pub fn prefix_end(&self) -> u32 {
        self.prefix_end_offset.get()
    }

    /// Number of prefix rows: `(end - start) / 9 + 1`
    ///
    /// Fails when the end offset precedes the start offset, which would
    /// make the row count negative.
    pub fn prefix_count(&self) -> Result<u32, FormatError> {
        let (start, end) = (self.prefix_start(), self.prefix_end());
        if end < start {
            return Err(FormatError::InvalidPrefixTable(format!(
                "end offset {} precedes start offset {}",
                end, start
            )));
        }
        Ok((end - start) / PREFIX_ROW_SIZE as u32 + 1)
    }

    /// Byte range covered by the prefix table, `start..end + 9`
    pub fn prefix_table_range(&self) -> Result<Range<usize>, FormatError> {
        self.prefix_count()?;
        let start = self.prefix_start() as usize;
        let end = (self.prefix_end() as usize)
            .checked_add(PREFIX_ROW_SIZE)
            .ok_or_else(|| FormatError::InvalidPrefixTable("end offset overflows".to_string()))?;
        Ok(start..end)
    }
}

/// IP range index entry (12 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct IndexEntry {
    /// First address of the block (inclusive)
    pub start_ip: U32<LittleEndian>,
    /// Last address of the block (inclusive)
    pub end_ip: U32<LittleEndian>,
    /// 24-bit offset of the location text
    pub local_offset: [u8; 3],
    /// Length of the location text in bytes
    pub local_length: u8,
}

impl IndexEntry {
    /// First address of the block
    #[inline]
    pub fn start_ip(&self) -> u32 {
        self.start_ip.get()
    }

    /// Last address of the block
    #[inline]
    pub fn end_ip(&self) -> u32 {
        self.end_ip.get()
    }

    /// Offset of the location text within the file
    #[inline]
    pub fn local_offset(&self) -> u32 {
        read_u24_le(self.local_offset)
    }

    /// Length of the location text
    #[inline]
    pub fn local_length(&self) -> u8 {
        self.local_length
    }

    /// True if `ip` lies within `start_ip..=end_ip`
    #[inline]
    pub fn contains(&self, ip: u32) -> bool {
        self.start_ip() <= ip && ip <= self.end_ip()
    }

    /// Byte range of the location text
    pub fn text_range(&self) -> Range<usize> {
        let start = self.local_offset() as usize;
        start..start + self.local_length as usize
    }
}

/// Prefix table row (9 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PrefixRow {
    /// First octet this row covers
    pub key: u8,
    /// First index row of the bucket (inclusive)
    pub start_index: U32<LittleEndian>,
    /// Last index row of the bucket (inclusive)
    pub end_index: U32<LittleEndian>,
}

impl PrefixRow {
    /// Decode a row from exactly [`PREFIX_ROW_SIZE`] bytes
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Self::read_from_bytes(bytes).ok()
    }
}

/// Reassemble a 24-bit little-endian integer
#[inline]
pub fn read_u24_le(bytes: [u8; 3]) -> u32 {
    u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16)
}

/// Byte range of index row `row`, or `None` if the arithmetic overflows
#[inline]
pub fn index_entry_range(first_index_offset: u32, row: u32) -> Option<Range<usize>> {
    let start = (row as usize)
        .checked_mul(INDEX_ENTRY_SIZE)?
        .checked_add(first_index_offset as usize)?;
    Some(start..start.checked_add(INDEX_ENTRY_SIZE)?)
}

/// Read index row `row`, or `None` if it lies outside `buffer`
#[inline]
pub fn read_index_entry(buffer: &[u8], first_index_offset: u32, row: u32) -> Option<IndexEntry> {
    let range = index_entry_range(first_index_offset, row)?;
    IndexEntry::read_from_bytes(buffer.get(range)?).ok()
}

/// Read the location text an entry points at, or `None` if it lies outside `buffer`
#[inline]
pub fn read_location_text<'a>(buffer: &'a [u8], entry: &IndexEntry) -> Option<&'a [u8]> {
    buffer.get(entry.text_range())
}
