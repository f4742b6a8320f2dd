use anyhow::{Context, Result};
use iplocation::{Database, IpRange, Location};
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{location_to_json, location_to_text, OutputFormat};

pub fn cmd_query(
    database: PathBuf,
    queries: Vec<String>,
    format: String,
    strict: bool,
    quiet: bool,
) -> Result<()> {
    let format = OutputFormat::parse(
        &format,
        &[OutputFormat::Text, OutputFormat::Json, OutputFormat::Pipe],
    )?;

    let db = Database::from(&database)
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let mut all_found = true;
    let mut results: Vec<(String, Location, Option<IpRange>)> = Vec::with_capacity(queries.len());

    for query in queries {
        let (location, range) = if strict {
            match db.lookup(&query) {
                Ok(Some(location)) => (location, db.locate(&query)),
                Ok(None) => (Location::default(), None),
                Err(e) => {
                    if !quiet {
                        eprintln!("Error: {}", e);
                    }
                    (Location::default(), None)
                }
            }
        } else {
            let range = db.locate(&query);
            (db.resolve(&query), range)
        };

        all_found &= !location.is_empty();
        results.push((query, location, range));
    }

    if quiet {
        // Quiet mode: no output, just exit code
        std::process::exit(if all_found { 0 } else { 1 });
    }

    match format {
        OutputFormat::Json => {
            let values: Vec<_> = results
                .iter()
                .map(|(ip, loc, range)| location_to_json(ip, loc, range.as_ref()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!(values))?);
        }
        OutputFormat::Pipe => {
            for (_, location, _) in &results {
                println!("{}", location.to_delimited_string());
            }
        }
        _ => {
            for (i, (ip, location, range)) in results.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("{}", location_to_text(ip, location, range.as_ref()));
            }
        }
    }

    std::process::exit(if all_found { 0 } else { 1 });
}
