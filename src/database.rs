//! Database loading and IPv4 resolution
//!
//! A [`Database`] owns the whole file as one buffer and, at load time,
//! builds a 256-slot map from first octet to the inclusive range of index
//! rows holding that octet's blocks. A query then runs:
//!
//! ```text
//! validate -> encode -> prefix bucket -> binary search on end_ip
//!          -> range check -> read (offset, length) -> split on '|'
//! ```
//!
//! Every step that cannot produce a confident match yields "not found";
//! nothing on the query path reads outside the buffer or panics.
//!
//! The loaded database is immutable, so it is `Send + Sync` and can be
//! shared across threads by reference. [`shared`] offers a lazily
//! initialised process-wide instance for call sites that cannot thread a
//! `Database` through.

use crate::error::DatabaseError;
use crate::format::{
    read_index_entry, DatHeader, FormatError, IndexEntry, PrefixRow, INDEX_ENTRY_SIZE,
    PREFIX_ROW_SIZE,
};
use crate::ipv4;
use crate::location::Location;
use crate::validation::{validate_buffer, ValidationLevel};
use memmap2::Mmap;
use std::fs::File;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Storage for database data - either owned or memory-mapped
enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// Inclusive range of index rows sharing one first octet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixBucket {
    /// First row (inclusive)
    pub start_index: u32,
    /// Last row (inclusive)
    pub end_index: u32,
}

impl PrefixBucket {
    /// Number of rows, zero if the bounds are inverted
    pub fn len(&self) -> u32 {
        if self.end_index < self.start_index {
            0
        } else {
            self.end_index - self.start_index + 1
        }
    }

    /// True if the bounds are inverted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An index row whose block contains a queried address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    /// Row number in the index table
    pub row: u32,
    /// First address of the block
    pub start_ip: u32,
    /// Last address of the block
    pub end_ip: u32,
    /// Offset of the location text
    pub local_offset: u32,
    /// Length of the location text
    pub local_length: u8,
}

impl IpRange {
    fn from_entry(row: u32, entry: &IndexEntry) -> Self {
        Self {
            row,
            start_ip: entry.start_ip(),
            end_ip: entry.end_ip(),
            local_offset: entry.local_offset(),
            local_length: entry.local_length(),
        }
    }

    /// First address as an [`Ipv4Addr`]
    pub fn start_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start_ip)
    }

    /// Last address as an [`Ipv4Addr`]
    pub fn end_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end_ip)
    }

    /// True if `ip` lies inside the block
    pub fn contains(&self, ip: u32) -> bool {
        self.start_ip <= ip && ip <= self.end_ip
    }
}

/// Loaded geolocation database
///
/// # Examples
///
/// ```no_run
/// use iplocation::Database;
///
/// let db = Database::open("qqzeng-ip-china-utf8.dat")?;
///
/// let location = db.resolve("218.88.127.69");
/// println!("{}", location);          // Asia|China|...
/// println!("{}", location.to_json());
///
/// // Private ranges carry no data and resolve to an empty record
/// if db.resolve("10.0.0.1").is_empty() {
///     println!("no location");
/// }
/// # Ok::<(), iplocation::DatabaseError>(())
/// ```
pub struct Database {
    data: DatabaseStorage,
    header: DatHeader,
    prefix_count: u32,
    prefix_map: [Option<PrefixBucket>; 256],
}

impl Database {
    /// Read a database file into memory
    ///
    /// Equivalent to `Database::from(path).open()`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        Self::from(path).open()
    }

    /// Start configuring how a database file is opened
    ///
    /// ```no_run
    /// use iplocation::Database;
    ///
    /// let db = Database::from("ip.dat").mmap(true).validate(true).open()?;
    /// # Ok::<(), iplocation::DatabaseError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from<P: AsRef<Path>>(path: P) -> DatabaseOpener {
        DatabaseOpener::new(path)
    }

    /// Create database from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DatabaseError> {
        Self::from_storage(DatabaseStorage::Owned(data))
    }

    /// Internal: parse the header and build the prefix map
    fn from_storage(storage: DatabaseStorage) -> Result<Self, DatabaseError> {
        let data = storage.as_slice();
        let _span = tracing::info_span!("Database::load", bytes = data.len()).entered();

        let header = DatHeader::parse(data)?;
        let prefix_count = header.prefix_count()?;
        let table_range = header.prefix_table_range()?;
        let table = data
            .get(table_range.clone())
            .ok_or(FormatError::OutOfBounds {
                region: "prefix table",
                offset: table_range.start,
                len: table_range.len(),
            })?;

        let mut prefix_map = [None; 256];
        for (row, bytes) in table
            .chunks_exact(PREFIX_ROW_SIZE)
            .take(prefix_count as usize)
            .enumerate()
        {
            let prefix = PrefixRow::parse(bytes).ok_or_else(|| {
                FormatError::InvalidPrefixTable(format!("row {} is truncated", row))
            })?;
            let bucket = PrefixBucket {
                start_index: prefix.start_index.get(),
                end_index: prefix.end_index.get(),
            };

            if bucket.is_empty() {
                tracing::warn!(
                    key = prefix.key,
                    start_index = bucket.start_index,
                    end_index = bucket.end_index,
                    "prefix bucket has inverted bounds"
                );
            }

            // Repeated keys: the later row wins
            if prefix_map[prefix.key as usize].replace(bucket).is_some() {
                tracing::debug!(key = prefix.key, row, "prefix key repeated, replacing bucket");
            }
        }

        // Only surviving buckets are ever searched
        for (key, bucket) in prefix_map.iter().enumerate() {
            if let Some(bucket) = bucket {
                Self::check_bucket_rows(data, &header, key as u8, bucket)?;
            }
        }

        let db = Self {
            data: storage,
            header,
            prefix_count,
            prefix_map,
        };
        tracing::info!(
            bytes = db.size(),
            prefix_rows = prefix_count,
            buckets = db.buckets().count(),
            "loaded ip location database"
        );
        Ok(db)
    }

    /// Both ends of a bucket must name rows that fit in the buffer
    fn check_bucket_rows(
        data: &[u8],
        header: &DatHeader,
        key: u8,
        bucket: &PrefixBucket,
    ) -> Result<(), FormatError> {
        for row in [bucket.start_index, bucket.end_index] {
            if read_index_entry(data, header.first_index_offset(), row).is_some() {
                continue;
            }
            tracing::warn!(key, row, "prefix bucket points past end of file");
            let offset = (row as usize)
                .saturating_mul(INDEX_ENTRY_SIZE)
                .saturating_add(header.first_index_offset() as usize);
            return Err(FormatError::OutOfBounds {
                region: "index row",
                offset,
                len: INDEX_ENTRY_SIZE,
            });
        }
        Ok(())
    }

    /// Resolve an IPv4 address given as text
    ///
    /// Never fails. Returns an empty [`Location`] when the text does not
    /// contain exactly three dots, the first octet has no bucket, no block
    /// contains the address, or the stored text does not have 11 fields.
    /// Parts that are not decimal integers count as `0`; see
    /// [`ipv4::parse_best_effort`].
    pub fn resolve(&self, ip: &str) -> Location {
        self.resolve_text(ip)
            .and_then(|text| Location::from_delimited(&text))
            .unwrap_or_default()
    }

    /// Resolve and return the stored pipe-delimited text unparsed
    pub fn resolve_text(&self, ip: &str) -> Option<String> {
        self.location_text(&self.locate(ip)?)
    }

    /// Best-effort parse of `ip` and search for the block containing it
    ///
    /// Same input handling as [`resolve`](Self::resolve); the bucket key
    /// is the first part as written, not the top byte of the encoded value.
    pub fn locate(&self, ip: &str) -> Option<IpRange> {
        let encoded = ipv4::parse_best_effort(ip)?;
        let key = u8::try_from(encoded.prefix).ok()?;
        self.find_range_in_bucket(key, encoded.value)
    }

    /// Strictly parse `ip` and resolve it
    ///
    /// Unlike [`resolve`](Self::resolve), malformed input is an error and
    /// absence of data is `Ok(None)`.
    pub fn lookup(&self, ip: &str) -> Result<Option<Location>, DatabaseError> {
        let addr = ipv4::parse_strict(ip)
            .map_err(|e| DatabaseError::InvalidAddress(format!("{:?}: {}", ip, e)))?;
        Ok(self.lookup_addr(addr))
    }

    /// Resolve a typed address
    pub fn lookup_addr(&self, addr: Ipv4Addr) -> Option<Location> {
        let range = self.find_range(u32::from(addr))?;
        Location::from_delimited(&self.location_text(&range)?)
    }

    /// Find the block containing `ip`, using its top octet as the bucket key
    pub fn find_range(&self, ip: u32) -> Option<IpRange> {
        self.find_range_in_bucket(ipv4::decompose(ip)[0], ip)
    }

    fn find_range_in_bucket(&self, key: u8, ip: u32) -> Option<IpRange> {
        let bucket = self.prefix_map[key as usize]?;
        let row = self.search(&bucket, ip)?;
        let entry = read_index_entry(self.data.as_slice(), self.header.first_index_offset(), row)?;
        entry.contains(ip).then(|| IpRange::from_entry(row, &entry))
    }

    /// First row in the bucket whose `end_ip` reaches `target`
    fn search(&self, bucket: &PrefixBucket, target: u32) -> Option<u32> {
        if bucket.start_index == bucket.end_index {
            return Some(bucket.start_index);
        }

        let mut low = bucket.start_index;
        let mut high = bucket.end_index;
        let mut found = None;
        while low <= high {
            let mid = low + (high - low) / 2;
            if self.end_ip(mid)? >= target {
                found = Some(mid);
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            } else {
                low = match mid.checked_add(1) {
                    Some(next) => next,
                    None => break,
                };
            }
        }
        found
    }

    #[inline]
    fn end_ip(&self, row: u32) -> Option<u32> {
        read_index_entry(self.data.as_slice(), self.header.first_index_offset(), row)
            .map(|entry| entry.end_ip())
    }

    /// Raw bytes of a block's location text, `None` if out of bounds
    pub fn location_bytes(&self, range: &IpRange) -> Option<&[u8]> {
        let start = range.local_offset as usize;
        self.data
            .as_slice()
            .get(start..start + range.local_length as usize)
    }

    /// A block's location text; invalid UTF-8 is replaced, not rejected
    pub fn location_text(&self, range: &IpRange) -> Option<String> {
        self.location_bytes(range)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Bucket for a first octet, if the prefix table has one
    pub fn bucket(&self, octet: u8) -> Option<PrefixBucket> {
        self.prefix_map[octet as usize]
    }

    /// All populated buckets in octet order
    pub fn buckets(&self) -> impl Iterator<Item = (u8, PrefixBucket)> + '_ {
        self.prefix_map
            .iter()
            .enumerate()
            .filter_map(|(octet, bucket)| bucket.map(|b| (octet as u8, b)))
    }

    /// Number of rows in the prefix table, including repeated keys
    pub fn prefix_count(&self) -> u32 {
        self.prefix_count
    }

    /// One past the highest index row any bucket refers to
    pub fn entry_count(&self) -> u64 {
        self.buckets()
            .map(|(_, b)| u64::from(b.start_index.max(b.end_index)) + 1)
            .max()
            .unwrap_or(0)
    }

    /// Read an index row directly
    pub fn entry(&self, row: u32) -> Option<IpRange> {
        read_index_entry(self.data.as_slice(), self.header.first_index_offset(), row)
            .map(|entry| IpRange::from_entry(row, &entry))
    }

    /// Parsed file header
    pub fn header(&self) -> &DatHeader {
        &self.header
    }

    /// Size of the database in bytes
    pub fn size(&self) -> usize {
        self.data.as_slice().len()
    }

    /// True if the file is memory-mapped rather than read into memory
    pub fn is_mmap(&self) -> bool {
        matches!(self.data, DatabaseStorage::Mmap(_))
    }

    /// The whole file
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("size", &self.size())
            .field("mmap", &self.is_mmap())
            .field("prefix_count", &self.prefix_count)
            .field("buckets", &self.buckets().count())
            .finish()
    }
}

/// Options for opening a database file
#[derive(Debug, Clone)]
pub struct DatabaseOpener {
    path: PathBuf,
    mmap: bool,
    validate: bool,
}

impl DatabaseOpener {
    fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mmap: false,
            validate: false,
        }
    }

    /// Memory-map the file instead of reading it (default: read)
    pub fn mmap(mut self, enabled: bool) -> Self {
        self.mmap = enabled;
        self
    }

    /// Run a strict validation pass before accepting the file (default: off)
    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Open the database
    pub fn open(self) -> Result<Database, DatabaseError> {
        let path = self.path.as_path();
        if path.as_os_str().is_empty() {
            return Err(DatabaseError::Io("need ip data filepath".to_string()));
        }

        let storage = if self.mmap {
            let file = File::open(path)
                .map_err(|e| DatabaseError::Io(format!("Failed to open {}: {}", path.display(), e)))?;
            // SAFETY: the mapping is read-only and owned by the Database
            let mmap = unsafe { Mmap::map(&file) }
                .map_err(|e| DatabaseError::Io(format!("Failed to mmap {}: {}", path.display(), e)))?;
            DatabaseStorage::Mmap(mmap)
        } else {
            let bytes = std::fs::read(path)
                .map_err(|e| DatabaseError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
            DatabaseStorage::Owned(bytes)
        };

        if self.validate {
            let report = validate_buffer(storage.as_slice(), ValidationLevel::Strict);
            if !report.is_valid() {
                return Err(DatabaseError::Validation(report.errors));
            }
        }

        Database::from_storage(storage)
    }
}

static SHARED: OnceLock<Database> = OnceLock::new();
static SHARED_INIT: Mutex<()> = Mutex::new(());

/// Process-wide database, loaded from `path` on first use
///
/// The first successful call loads the file; later calls return the same
/// instance and ignore `path`. Concurrent first calls load the file once.
/// A failed load is not cached, so a later call may retry.
pub fn shared<P: AsRef<Path>>(path: P) -> Result<&'static Database, DatabaseError> {
    if path.as_ref().as_os_str().is_empty() {
        return Err(DatabaseError::Io("need ip data filepath".to_string()));
    }
    if let Some(db) = SHARED.get() {
        return Ok(db);
    }

    let _guard = SHARED_INIT.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(db) = SHARED.get() {
        return Ok(db);
    }
    let db = Database::open(path)?;
    Ok(SHARED.get_or_init(|| db))
}
