//! Property tests for address parsing and block search.
//!
//! Block search is checked against a linear scan over the same ranges.
//! Junk inputs must never panic, whether they are address text or
//! database bytes.

mod support;

use iplocation::ipv4;
use iplocation::validation::{validate_buffer, ValidationLevel};
use iplocation::{Database, Location};
use proptest::prelude::*;
use std::net::Ipv4Addr;
use support::DatFixture;

/// Sorted, non-overlapping blocks under one first octet, with gaps between them
fn blocks_strategy() -> impl Strategy<Value = (u8, Vec<(u32, u32)>)> {
    (
        1u8..=223,
        prop::collection::btree_set(0u32..(1 << 24), 2..40),
    )
        .prop_map(|(octet, cuts)| {
            let base = u32::from(octet) << 24;
            let cuts: Vec<u32> = cuts.into_iter().collect();
            let blocks = cuts
                .chunks_exact(2)
                .map(|pair| (base + pair[0], base + pair[1]))
                .collect();
            (octet, blocks)
        })
}

fn text_for(i: usize) -> String {
    format!("亚洲|中国|省{0}|市{0}||电信|{0}|China|CN|1.0|2.0", i)
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: None,
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn encode_matches_std_for_valid_quads(a in any::<u8>(), b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
        let text = format!("{}.{}.{}.{}", a, b, c, d);
        let encoded = ipv4::parse_best_effort(&text).unwrap();
        prop_assert_eq!(encoded.value, u32::from(Ipv4Addr::new(a, b, c, d)));
        prop_assert_eq!(encoded.prefix, u32::from(a));
        prop_assert_eq!(ipv4::decompose(encoded.value), [a, b, c, d]);
    }

    #[test]
    fn resolve_agrees_with_linear_scan((octet, blocks) in blocks_strategy(), low_bits in 0u32..(1 << 24)) {
        let mut builder = DatFixture::new();
        for (i, (start, end)) in blocks.iter().enumerate() {
            builder = builder.range_u32(*start, *end, text_for(i).as_bytes());
        }
        let db = Database::from_bytes(builder.build()).unwrap();

        let target = (u32::from(octet) << 24) + low_bits;
        let expected = blocks
            .iter()
            .position(|(start, end)| (*start..=*end).contains(&target))
            .map(|i| Location::from_delimited(&text_for(i)).unwrap())
            .unwrap_or_default();

        let text = Ipv4Addr::from(target).to_string();
        prop_assert_eq!(db.resolve(&text), expected.clone());
        prop_assert_eq!(db.lookup_addr(Ipv4Addr::from(target)).unwrap_or_default(), expected);
    }

    #[test]
    fn block_endpoints_always_resolve((_octet, blocks) in blocks_strategy()) {
        let mut builder = DatFixture::new();
        for (i, (start, end)) in blocks.iter().enumerate() {
            builder = builder.range_u32(*start, *end, text_for(i).as_bytes());
        }
        let db = Database::from_bytes(builder.build()).unwrap();

        for (i, (start, end)) in blocks.iter().enumerate() {
            for addr in [*start, *end] {
                let range = db.find_range(addr).unwrap();
                prop_assert_eq!(range.row, i as u32);
            }
        }
    }

    #[test]
    fn text_without_three_dots_is_empty(s in "[0-9a-z ]{0,12}(\\.[0-9a-z ]{0,4}){0,2}") {
        let db = Database::from_bytes(support::sample().build()).unwrap();
        prop_assert!(db.resolve(&s).is_empty());
    }

    #[test]
    fn resolve_never_panics_on_arbitrary_text(s in ".{0,40}") {
        let db = Database::from_bytes(support::sample().build()).unwrap();
        let _ = db.resolve(&s);
        let _ = db.lookup(&s);
    }

    #[test]
    fn delimited_text_round_trips(fields in prop::collection::vec("[^|]{0,8}", 11)) {
        let text = fields.join("|");
        let loc = Location::from_delimited(&text).unwrap();
        prop_assert_eq!(loc.to_delimited_string(), text);
    }

    #[test]
    fn load_never_panics_on_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = validate_buffer(&bytes, ValidationLevel::Strict);
        if let Ok(db) = Database::from_bytes(bytes) {
            for addr in ["0.0.0.0", "1.2.3.4", "128.0.0.1", "255.255.255.255"] {
                let _ = db.resolve(addr);
            }
            let _ = db.entry_count();
        }
    }
}
