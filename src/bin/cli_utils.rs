use anyhow::{bail, Result};
use iplocation::{IpRange, Location};
use serde_json::{json, Value};

/// How resolved locations are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
    Pipe,
}

impl OutputFormat {
    /// Parse a `--format` value, restricted to the formats a command supports
    pub fn parse(value: &str, allowed: &[OutputFormat]) -> Result<Self> {
        let format = match value.to_lowercase().as_str() {
            "text" => OutputFormat::Text,
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            "pipe" => OutputFormat::Pipe,
            _ => bail!("Invalid format: '{}'", value),
        };
        if !allowed.contains(&format) {
            let names: Vec<_> = allowed.iter().map(|f| f.name()).collect();
            bail!(
                "Invalid format: '{}'. Must be one of: {}",
                value,
                names.join(", ")
            );
        }
        Ok(format)
    }

    fn name(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Pipe => "pipe",
        }
    }
}

/// Parse `-j`: None = 1, "auto"/"0" = all cores, "N" = N
pub fn parse_threads(threads: Option<&str>) -> Result<usize> {
    match threads {
        None => Ok(1),
        Some("auto") | Some("0") => Ok(std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)),
        Some(s) => match s.parse::<usize>() {
            Ok(n) => Ok(n),
            Err(_) => bail!("Invalid thread count '{}', expected a number or 'auto'", s),
        },
    }
}

/// Location fields plus the queried address and, when known, the matched block
pub fn location_to_json(ip: &str, location: &Location, range: Option<&IpRange>) -> Value {
    let mut value = serde_json::to_value(location).unwrap_or_else(|_| json!({}));
    if let Value::Object(ref mut map) = value {
        map.insert("ip".to_string(), json!(ip));
        map.insert("found".to_string(), json!(!location.is_empty()));
        if let Some(range) = range {
            map.insert(
                "range".to_string(),
                json!(format!("{} - {}", range.start_addr(), range.end_addr())),
            );
        }
    }
    value
}

/// Multi-line human-readable description
pub fn location_to_text(ip: &str, location: &Location, range: Option<&IpRange>) -> String {
    if location.is_empty() {
        return format!("{}\n  (no location data)", ip);
    }

    let mut out = String::from(ip);
    if let Some(range) = range {
        out.push_str(&format!(
            "\n  Range:       {} - {}",
            range.start_addr(),
            range.end_addr()
        ));
    }
    let rows = [
        ("Continent", &location.continents),
        ("Country", &location.country),
        ("Province", &location.province),
        ("City", &location.city),
        ("Zone", &location.zone),
        ("ISP", &location.isp),
        ("Code", &location.code),
        ("English", &location.en_name),
        ("Short name", &location.short_name),
        ("Longitude", &location.lng),
        ("Latitude", &location.lat),
    ];
    for (label, value) in rows {
        if !value.is_empty() {
            out.push_str(&format!("\n  {:<12} {}", format!("{}:", label), value));
        }
    }
    out
}
