#![no_main]
use iplocation::validation::{validate_buffer, ValidationLevel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = validate_buffer(data, ValidationLevel::Strict);

    if let Ok(db) = iplocation::Database::from_bytes(data.to_vec()) {
        for addr in ["0.0.0.0", "1.0.1.1", "127.0.0.1", "218.88.127.69", "255.255.255.255"] {
            let _ = db.resolve(addr);
        }
        let _ = db.entry_count();
    }
});
