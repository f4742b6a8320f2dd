//! Resolved geolocation record
//!
//! A [`Location`] mirrors one pipe-delimited text stored in the database:
//!
//! ```text
//! continents|country|province|city|zone|isp|code|en_name|short_name|lng|lat
//! Asia|China|Guangdong|Shenzhen||China Telecom|440300|Shenzhen|SZ|114.05|22.55
//! ```
//!
//! Every field stays text. Coordinates in particular are not parsed, since
//! the data uses empty strings and placeholders for unknown values.

use crate::format::{FIELD_SEPARATOR, LOCATION_FIELD_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field names in storage order, as used by the JSON form
pub const FIELD_NAMES: [&str; LOCATION_FIELD_COUNT] = [
    "continents",
    "country",
    "province",
    "city",
    "zone",
    "isp",
    "code",
    "en_name",
    "short_name",
    "lng",
    "lat",
];

/// Geolocation of an IPv4 address
///
/// The all-empty value (see [`Location::is_empty`]) means "no data".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Continent
    pub continents: String,
    /// Country
    pub country: String,
    /// Province or state
    pub province: String,
    /// City
    pub city: String,
    /// District or county
    pub zone: String,
    /// Network operator
    pub isp: String,
    /// Administrative division code
    pub code: String,
    /// English name
    pub en_name: String,
    /// Short English name
    pub short_name: String,
    /// Longitude, as stored
    pub lng: String,
    /// Latitude, as stored
    pub lat: String,
}

impl Location {
    /// Parse a stored location text
    ///
    /// Returns `None` unless splitting on `|` yields exactly 11 fields.
    pub fn from_delimited(text: &str) -> Option<Self> {
        let mut parts = text.split(FIELD_SEPARATOR);
        let mut next = || parts.next().map(str::to_string);

        let location = Location {
            continents: next()?,
            country: next()?,
            province: next()?,
            city: next()?,
            zone: next()?,
            isp: next()?,
            code: next()?,
            en_name: next()?,
            short_name: next()?,
            lng: next()?,
            lat: next()?,
        };

        if parts.next().is_some() {
            return None;
        }
        Some(location)
    }

    /// Fields in storage order
    pub fn fields(&self) -> [&str; LOCATION_FIELD_COUNT] {
        [
            &self.continents,
            &self.country,
            &self.province,
            &self.city,
            &self.zone,
            &self.isp,
            &self.code,
            &self.en_name,
            &self.short_name,
            &self.lng,
            &self.lat,
        ]
    }

    /// True if every field is empty
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_empty())
    }

    /// Fields joined with `|` in storage order
    pub fn to_delimited_string(&self) -> String {
        self.fields().join("|")
    }

    /// JSON object with the fields named as in [`FIELD_NAMES`]
    pub fn to_json(&self) -> String {
        // A struct of plain strings always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_delimited_string())
    }
}
