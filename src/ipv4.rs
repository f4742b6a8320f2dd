//! IPv4 text handling
//!
//! Two parsing modes are offered:
//!
//! - **Best effort** ([`parse_best_effort`]): the only syntax check is that
//!   the text contains exactly three `.` separators. Each part is converted
//!   like a C `atoi`, with anything unparsable counting as `0`. Octets are
//!   not range-checked, so `"999.1.1.1"` produces prefix `999` (which no
//!   prefix bucket holds) and an address computed with wrapping arithmetic.
//!   [`Database::resolve`](crate::Database::resolve) uses this mode.
//! - **Strict** ([`parse_strict`]): a real dotted quad via
//!   [`std::net::Ipv4Addr`], used by [`Database::lookup`](crate::Database::lookup).

use std::net::{AddrParseError, Ipv4Addr};
use std::num::IntErrorKind;

/// A best-effort parse: the first-octet key and the 32-bit address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedIp {
    /// First part as written, used as the prefix bucket key
    pub prefix: u32,
    /// `o3 + (o2 << 8) + (o1 << 16) + (o0 << 24)`, wrapping
    pub value: u32,
}

/// True if `ip` contains exactly three `.` separators
#[inline]
pub fn has_quad_shape(ip: &str) -> bool {
    memchr::memchr_iter(b'.', ip.as_bytes()).count() == 3
}

/// Convert one part of a dotted quad, yielding `0` when it is not a decimal integer
///
/// Signs are accepted and negative values wrap, so `"-1"` becomes
/// `u32::MAX`. Values outside the `i64` range saturate to `i64::MAX` or
/// `i64::MIN` before truncation, so a huge part becomes `u32::MAX` and never
/// lands in a real prefix bucket.
#[inline]
pub fn best_effort_octet(part: &str) -> u32 {
    let value = match part.parse::<i64>() {
        Ok(v) => v,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => 0,
        },
    };
    value as u32
}

/// Combine four parts, most significant first, into a 32-bit address
#[inline]
pub fn encode(octets: [u32; 4]) -> u32 {
    octets[3]
        .wrapping_add(octets[2].wrapping_shl(8))
        .wrapping_add(octets[1].wrapping_shl(16))
        .wrapping_add(octets[0].wrapping_shl(24))
}

/// Split a 32-bit address into its four octets, most significant first
#[inline]
pub fn decompose(ip: u32) -> [u8; 4] {
    ip.to_be_bytes()
}

/// Best-effort parse of a dotted quad
///
/// Surrounding whitespace is trimmed. Returns `None` only when the text is
/// empty or does not contain exactly three dots.
pub fn parse_best_effort(ip: &str) -> Option<EncodedIp> {
    let ip = ip.trim();
    if ip.is_empty() || !has_quad_shape(ip) {
        return None;
    }

    let mut octets = [0u32; 4];
    for (slot, part) in octets.iter_mut().zip(ip.split('.')) {
        *slot = best_effort_octet(part);
    }

    Some(EncodedIp {
        prefix: octets[0],
        value: encode(octets),
    })
}

/// Strict parse of a dotted quad (surrounding whitespace is trimmed)
pub fn parse_strict(ip: &str) -> Result<Ipv4Addr, AddrParseError> {
    ip.trim().parse()
}
