//! Test-only `.dat` assembler
//!
//! Lays out `[header][text pool][index rows][prefix rows]`. Prefix rows are
//! derived from the first octet of each entry's start address unless set
//! explicitly. Shared with the integration tests and benches through
//! `#[path]`, so it only depends on `std`.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

const HEADER_SIZE: usize = 16;
const INDEX_ENTRY_SIZE: usize = 12;
const PREFIX_ROW_SIZE: usize = 9;

pub fn ip(text: &str) -> u32 {
    u32::from(text.parse::<Ipv4Addr>().unwrap())
}

#[derive(Default)]
pub struct DatFixture {
    entries: Vec<(u32, u32, Vec<u8>)>,
    prefix_rows: Option<Vec<(u8, u32, u32)>>,
}

impl DatFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(self, start: &str, end: &str, text: &str) -> Self {
        self.range_u32(ip(start), ip(end), text.as_bytes())
    }

    pub fn range_u32(mut self, start: u32, end: u32, text: &[u8]) -> Self {
        self.entries.push((start, end, text.to_vec()));
        self
    }

    pub fn prefix_rows(mut self, rows: &[(u8, u32, u32)]) -> Self {
        self.prefix_rows = Some(rows.to_vec());
        self
    }

    fn derived_rows(&self) -> Vec<(u8, u32, u32)> {
        let mut rows: Vec<(u8, u32, u32)> = Vec::new();
        for (row, (start, _, _)) in self.entries.iter().enumerate() {
            let key = (start >> 24) as u8;
            match rows.last_mut() {
                Some(last) if last.0 == key => last.2 = row as u32,
                _ => rows.push((key, row as u32, row as u32)),
            }
        }
        rows
    }

    pub fn build(&self) -> Vec<u8> {
        let rows = self
            .prefix_rows
            .clone()
            .unwrap_or_else(|| self.derived_rows());
        assert!(!rows.is_empty(), "a .dat file holds at least one prefix row");

        let mut pool = Vec::new();
        let mut locals = Vec::new();
        for (_, _, text) in &self.entries {
            locals.push((HEADER_SIZE + pool.len(), text.len()));
            pool.extend_from_slice(text);
        }

        let first_index = HEADER_SIZE + pool.len();
        let prefix_start = first_index + self.entries.len() * INDEX_ENTRY_SIZE;
        let prefix_end = prefix_start + (rows.len() - 1) * PREFIX_ROW_SIZE;

        let mut out = Vec::new();
        out.extend_from_slice(&(first_index as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(prefix_start as u32).to_le_bytes());
        out.extend_from_slice(&(prefix_end as u32).to_le_bytes());
        out.extend_from_slice(&pool);

        for ((start, end, _), (offset, len)) in self.entries.iter().zip(&locals) {
            out.extend_from_slice(&start.to_le_bytes());
            out.extend_from_slice(&end.to_le_bytes());
            out.extend_from_slice(&(*offset as u32).to_le_bytes()[..3]);
            out.push(*len as u8);
        }

        for (key, start_index, end_index) in rows {
            out.push(key);
            out.extend_from_slice(&start_index.to_le_bytes());
            out.extend_from_slice(&end_index.to_le_bytes());
        }
        out
    }

    /// Write to `dir/name` and return the path
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}
