//! iplocation - IPv4 geolocation from prefix-indexed `.dat` databases
//!
//! Resolves an IPv4 address to continent, country, province, city, zone,
//! ISP, administrative code, English names and coordinates using a
//! pre-built, read-only binary database.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use iplocation::Database;
//!
//! let db = Database::open("qqzeng-ip-china-utf8.dat")?;
//!
//! let location = db.resolve("218.88.127.69");
//! println!("{} / {}", location.country, location.city);
//! println!("{}", location.to_delimited_string());
//! println!("{}", location.to_json());
//! # Ok::<(), iplocation::DatabaseError>(())
//! ```
//!
//! [`Database::resolve`] never fails: malformed input and addresses without
//! data both give an empty [`Location`]. Use [`Database::lookup`] to tell
//! the two apart.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  .dat file                           │
//! ├──────────────────────────────────────┤
//! │  Header (16 bytes)                   │
//! │  Location text pool ('|' separated)  │
//! │  IP range index (12-byte rows)       │
//! │  Prefix table (9-byte rows)          │
//! └──────────────────────────────────────┘
//!          ↓ read once at load
//! ┌──────────────────────────────────────┐
//! │  first octet -> bucket of rows       │
//! │  binary search on end_ip in bucket   │
//! │  range check, read text, split       │
//! └──────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Database loading and resolution
pub mod database;
/// Error types
pub mod error;
pub mod file_reader;
pub mod format;
pub mod ipv4;
pub mod location;
pub mod validation;

#[cfg(test)]
mod fixture;

// Re-exports for Rust consumers

pub use crate::database::{shared, Database, DatabaseOpener, IpRange, PrefixBucket};
pub use crate::error::DatabaseError;
pub use crate::format::FormatError;
pub use crate::location::Location;
pub use crate::validation::{ValidationLevel, ValidationReport};

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
