use anyhow::{Context, Result};
use iplocation::validation::{validate_database, ValidationLevel, ValidationReport};
use serde_json::{json, Map, Value};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Messages shown per bucket without `--verbose`
const BUCKET_PREVIEW: usize = 3;

pub fn cmd_validate(
    database: PathBuf,
    level_str: String,
    json_output: bool,
    verbose: bool,
) -> Result<()> {
    let level = match level_str.to_lowercase().as_str() {
        "standard" => ValidationLevel::Standard,
        "strict" => ValidationLevel::Strict,
        _ => anyhow::bail!(
            "Invalid validation level: '{}'. Must be: standard or strict",
            level_str
        ),
    };

    let start = Instant::now();
    let report = validate_database(&database, level)
        .with_context(|| format!("Validation failed: {}", database.display()))?;
    let elapsed = start.elapsed();

    if json_output {
        print_json(&database, &level_str, &report, elapsed)?;
    } else {
        print_report(&database, &level_str, &report, elapsed, verbose);
    }

    if !report.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

/// `218` -> `218.0.0.0/8`
fn bucket_block(key: u8) -> String {
    format!("{}/8", Ipv4Addr::new(key, 0, 0, 0))
}

fn print_json(
    database: &Path,
    level: &str,
    report: &ValidationReport,
    elapsed: Duration,
) -> Result<()> {
    let stats = &report.stats;
    let (file_errors, bucket_errors) = report.errors_by_bucket();

    let buckets: Map<String, Value> = bucket_errors
        .iter()
        .map(|(key, errors)| (key.to_string(), json!(errors)))
        .collect();

    let output = json!({
        "database": database.display().to_string(),
        "validation_level": level,
        "is_valid": report.is_valid(),
        "duration_ms": elapsed.as_millis(),
        "file_errors": file_errors,
        "bucket_errors": buckets,
        "errors": report.errors,
        "warnings": report.warnings,
        "stats": {
            "file_size": stats.file_size,
            "prefix_rows": stats.prefix_rows,
            "buckets": stats.buckets,
            "repeated_keys": stats.repeated_keys,
            "entries": stats.entries,
            "text_bytes": stats.text_bytes,
            "address_span": stats.address_span.map(|(lo, hi)| json!({
                "start": Ipv4Addr::from(lo).to_string(),
                "end": Ipv4Addr::from(hi).to_string(),
            })),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_report(
    database: &Path,
    level: &str,
    report: &ValidationReport,
    elapsed: Duration,
    verbose: bool,
) {
    let stats = &report.stats;

    println!("Validating: {} ({} level)", database.display(), level);
    println!();
    println!("Layout:");
    println!("  File size:     {} bytes", stats.file_size);
    println!("  Prefix rows:   {}", stats.prefix_rows);
    println!("  Buckets:       {}", stats.buckets);
    if stats.repeated_keys > 0 {
        println!("  Overridden:    {} prefix row(s)", stats.repeated_keys);
    }

    if stats.entries > 0 {
        println!();
        println!("Coverage:");
        println!("  Index rows:    {}", stats.entries);
        if let Some((lo, hi)) = stats.address_span {
            println!("  Span:          {} - {}", Ipv4Addr::from(lo), Ipv4Addr::from(hi));
        }
        println!(
            "  Location text: {} bytes ({:.1} per row)",
            stats.text_bytes,
            stats.text_bytes as f64 / stats.entries as f64
        );
    }
    println!("  Checked in {:.2}ms", elapsed.as_secs_f64() * 1000.0);

    let (file_errors, bucket_errors) = report.errors_by_bucket();
    if !file_errors.is_empty() {
        println!();
        println!("File errors:");
        for error in &file_errors {
            println!("  {}", error);
        }
    }
    if !bucket_errors.is_empty() {
        println!();
        println!("Bucket errors ({} bucket(s)):", bucket_errors.len());
        for (key, errors) in &bucket_errors {
            println!("  {} ({} error(s))", bucket_block(*key), errors.len());
            let shown = if verbose { errors.len() } else { BUCKET_PREVIEW };
            for error in errors.iter().take(shown) {
                println!("    {}", error);
            }
            if errors.len() > shown {
                println!("    ... {} more (use --verbose)", errors.len() - shown);
            }
        }
    }

    if !report.warnings.is_empty() {
        println!();
        if verbose {
            println!("Warnings:");
            for warning in &report.warnings {
                println!("  {}", warning);
            }
        } else {
            println!("{} warning(s) (use --verbose to show)", report.warnings.len());
        }
    }

    println!();
    if report.is_valid() {
        println!("✅ VALIDATION PASSED");
    } else {
        println!("❌ VALIDATION FAILED: {} error(s)", report.errors.len());
    }
}
