//! Shared `.dat` builder for integration tests and benches

#![allow(dead_code)]

#[path = "../../src/fixture.rs"]
mod fixture;

pub use fixture::{ip, DatFixture};

pub const SHENZHEN: &str =
    "亚洲|中国|广东|深圳|南山|电信|440305|China|CN|113.93|22.53";
pub const CHENGDU: &str =
    "亚洲|中国|四川|成都|武侯|电信|510107|China|CN|104.04|30.64";
pub const BEIJING: &str =
    "亚洲|中国|北京|北京||联通|110000|China|CN|116.40|39.90";

/// A small database spanning three first octets
pub fn sample() -> DatFixture {
    DatFixture::new()
        .range("1.0.0.0", "1.0.0.255", "大洋洲|澳大利亚|||||AU|Australia|AU|133.78|-25.27")
        .range("1.0.1.0", "1.0.3.255", "亚洲|中国|福建|福州||电信|350100|China|CN|119.30|26.08")
        .range("1.0.8.0", "1.0.15.255", "亚洲|中国|广东|广州||电信|440100|China|CN|113.28|23.13")
        .range("123.112.0.0", "123.127.255.255", BEIJING)
        .range("218.88.0.0", "218.89.255.255", CHENGDU)
        .range("218.90.0.0", "218.90.255.255", SHENZHEN)
}

/// Dense synthetic database: `per_octet` equal blocks under each of 1..=223
pub fn synthetic(per_octet: u32) -> Vec<u8> {
    let mut builder = DatFixture::new();
    let step = (1u32 << 24) / per_octet;
    for octet in 1u32..=223 {
        for i in 0..per_octet {
            let start = (octet << 24) + i * step;
            let end = start + step - 1;
            let text = format!(
                "亚洲|国家{}|省{}|市{}||电信|{}|Country|C{}|{}.0|{}.0",
                octet, i, i, octet * 1000 + i, octet, octet, i
            );
            builder = builder.range_u32(start, end, text.as_bytes());
        }
    }
    builder.build()
}
