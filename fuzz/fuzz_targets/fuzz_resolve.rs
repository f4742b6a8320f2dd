#![no_main]
use iplocation::Database;
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

/// Two buckets with a gap; enough to exercise every search branch
fn database() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let text = b"Asia|China|Sichuan|Chengdu||Telecom|510100|Chengdu|CD|104.06|30.67";
        let entries: [(u32, u32); 3] = [
            (0x0100_0000, 0x0100_00ff),
            (0x0100_0200, 0x0100_ffff),
            (0xda58_0000, 0xda59_ffff),
        ];

        let mut out = Vec::new();
        let first_index = 16 + text.len() as u32;
        let prefix_start = first_index + 12 * entries.len() as u32;
        out.extend_from_slice(&first_index.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&prefix_start.to_le_bytes());
        out.extend_from_slice(&(prefix_start + 9).to_le_bytes());
        out.extend_from_slice(text);
        for (start, end) in entries {
            out.extend_from_slice(&start.to_le_bytes());
            out.extend_from_slice(&end.to_le_bytes());
            out.extend_from_slice(&16u32.to_le_bytes()[..3]);
            out.push(text.len() as u8);
        }
        for (key, lo, hi) in [(1u8, 0u32, 1u32), (218, 2, 2)] {
            out.push(key);
            out.extend_from_slice(&lo.to_le_bytes());
            out.extend_from_slice(&hi.to_le_bytes());
        }
        Database::from_bytes(out).expect("fuzz fixture is well formed")
    })
}

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let db = database();
    let _ = db.resolve(&text);
    let _ = db.lookup(&text);
});
