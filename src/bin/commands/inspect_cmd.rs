use anyhow::{Context, Result};
use iplocation::Database;
use serde_json::json;
use std::net::Ipv4Addr;
use std::path::PathBuf;

pub fn cmd_inspect(database: PathBuf, json_output: bool, verbose: bool) -> Result<()> {
    let db = Database::from(&database)
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let header = db.header();
    let buckets: Vec<_> = db.buckets().collect();
    let empty_buckets = buckets.iter().filter(|(_, b)| b.is_empty()).count();

    if json_output {
        let mut output = json!({
            "file": database.display().to_string(),
            "size": db.size(),
            "mmap": db.is_mmap(),
            "header": {
                "first_index_offset": header.first_index_offset(),
                "prefix_start": header.prefix_start(),
                "prefix_end": header.prefix_end(),
            },
            "prefix_rows": db.prefix_count(),
            "buckets": buckets.len(),
            "empty_buckets": empty_buckets,
            "entry_count": db.entry_count(),
        });

        if verbose {
            output["bucket_list"] = buckets
                .iter()
                .map(|(key, b)| {
                    json!({
                        "key": key,
                        "start_index": b.start_index,
                        "end_index": b.end_index,
                        "entries": b.len(),
                    })
                })
                .collect();
        }

        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database: {}", database.display());
    println!("Size:     {} bytes", db.size());
    println!();
    println!("Header:");
    println!("  First index offset: {}", header.first_index_offset());
    println!("  Prefix table:       {} - {}", header.prefix_start(), header.prefix_end());
    println!();
    println!("Index:");
    println!("  Prefix rows:   {}", db.prefix_count());
    println!("  Buckets:       {}", buckets.len());
    if empty_buckets > 0 {
        println!("  Empty buckets: {}", empty_buckets);
    }
    println!("  Entries:       {}", db.entry_count());

    if verbose && !buckets.is_empty() {
        println!();
        println!("Buckets:");
        for (key, bucket) in &buckets {
            let span = match (db.entry(bucket.start_index), db.entry(bucket.end_index)) {
                (Some(first), Some(last)) if !bucket.is_empty() => format!(
                    "{} - {}",
                    Ipv4Addr::from(first.start_ip),
                    Ipv4Addr::from(last.end_ip)
                ),
                _ => "(empty)".to_string(),
            };
            println!(
                "  {:>3}  rows {:>8} - {:<8} {:>6} entries  {}",
                key,
                bucket.start_index,
                bucket.end_index,
                bucket.len(),
                span
            );
        }
    }

    Ok(())
}
