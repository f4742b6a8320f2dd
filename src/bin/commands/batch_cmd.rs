use anyhow::{Context, Result};
use iplocation::location::FIELD_NAMES;
use iplocation::{file_reader, Database, Location};
use rayon::prelude::*;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use crate::cli_utils::{location_to_json, parse_threads, OutputFormat};

/// Addresses resolved per parallel batch
const CHUNK_SIZE: usize = 8192;

#[derive(Default)]
struct BatchStats {
    lines: u64,
    found: u64,
}

pub fn cmd_batch(
    database: PathBuf,
    inputs: Vec<PathBuf>,
    format: String,
    threads: Option<String>,
    mmap: bool,
    show_stats: bool,
) -> Result<()> {
    let format = OutputFormat::parse(
        &format,
        &[OutputFormat::Json, OutputFormat::Csv, OutputFormat::Pipe],
    )?;
    let num_threads = parse_threads(threads.as_deref())?;

    let load_start = Instant::now();
    let db = Database::from(&database)
        .mmap(mmap)
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let load_time = load_start.elapsed();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .context("Failed to start worker threads")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if format == OutputFormat::Csv {
        let mut header = vec!["ip"];
        header.extend_from_slice(&FIELD_NAMES);
        out.write_all(&csv_bytes(std::iter::once(header))?)?;
    }

    let mut stats = BatchStats::default();
    let start = Instant::now();

    for input in &inputs {
        let reader = file_reader::open(input)
            .with_context(|| format!("Failed to open input: {}", input.display()))?;
        let mut chunk = Vec::with_capacity(CHUNK_SIZE);

        for line in file_reader::addresses(reader) {
            chunk.push(line.with_context(|| format!("Failed to read {}", input.display()))?);
            if chunk.len() == CHUNK_SIZE {
                let resolved = resolve_chunk(&db, &pool, &chunk, num_threads);
                write_chunk(&mut out, format, &chunk, &resolved, &mut stats)?;
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            let resolved = resolve_chunk(&db, &pool, &chunk, num_threads);
            write_chunk(&mut out, format, &chunk, &resolved, &mut stats)?;
        }
    }
    out.flush()?;

    if show_stats {
        let elapsed = start.elapsed();
        let rate = stats.lines as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
        eprintln!();
        eprintln!("[INFO] Batch statistics:");
        eprintln!("  Database load:  {:.2}ms", load_time.as_secs_f64() * 1000.0);
        eprintln!("  Addresses:      {}", stats.lines);
        eprintln!("  Resolved:       {}", stats.found);
        eprintln!("  Not found:      {}", stats.lines - stats.found);
        eprintln!("  Threads:        {}", num_threads.max(1));
        eprintln!("  Elapsed:        {:.2}ms", elapsed.as_secs_f64() * 1000.0);
        eprintln!("  Throughput:     {:.0} lookups/sec", rate);
    }

    Ok(())
}

fn resolve_chunk(
    db: &Database,
    pool: &rayon::ThreadPool,
    chunk: &[String],
    num_threads: usize,
) -> Vec<Location> {
    if num_threads > 1 {
        pool.install(|| chunk.par_iter().map(|ip| db.resolve(ip)).collect())
    } else {
        chunk.iter().map(|ip| db.resolve(ip)).collect()
    }
}

fn write_chunk<W: Write>(
    out: &mut W,
    format: OutputFormat,
    ips: &[String],
    locations: &[Location],
    stats: &mut BatchStats,
) -> Result<()> {
    stats.lines += locations.len() as u64;
    stats.found += locations.iter().filter(|l| !l.is_empty()).count() as u64;

    match format {
        OutputFormat::Csv => {
            let records = ips.iter().zip(locations).map(|(ip, location)| {
                let mut record = vec![ip.as_str()];
                record.extend_from_slice(&location.fields());
                record
            });
            out.write_all(&csv_bytes(records)?)?;
        }
        OutputFormat::Pipe => {
            for (ip, location) in ips.iter().zip(locations) {
                writeln!(out, "{}|{}", ip, location.to_delimited_string())?;
            }
        }
        _ => {
            for (ip, location) in ips.iter().zip(locations) {
                let value = location_to_json(ip, location, None);
                writeln!(out, "{}", serde_json::to_string(&value)?)?;
            }
        }
    }
    Ok(())
}

/// Encode records with csv quoting rules
fn csv_bytes<'a, I>(records: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = Vec<&'a str>>,
{
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for record in records {
        w.write_record(&record)?;
    }
    w.into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to encode CSV: {}", e.error()))
}
