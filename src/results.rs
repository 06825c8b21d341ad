//! Persisted Results
//!
//! Trial counts keyed by lattice size and physical error rate, stored as CSV with the header
//! `L,p,N,success,invalid`. Running more trials of an existing configuration adds to its counts.
//!

use super::error::*;
use super::util::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

pub const RESULT_TABLE_HEADER: &str = "L,p,N,success,invalid";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// lattice size
    pub size: usize,
    /// physical error rate
    pub p: f64,
    pub result: BatchResult,
}

impl ResultRow {
    pub fn success_rate(&self) -> f64 {
        self.result.success_rate()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    /// keyed by size and the bits of `p`, which sort like the values themselves for non-negative rates
    rows: BTreeMap<(usize, u64), ResultRow>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// load a table; a missing file is an empty table
    pub fn load(filename: impl AsRef<Path>) -> Result<Self> {
        let file = match File::open(filename) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(error) => return Err(error.into()),
        };
        let mut table = Self::new();
        for (line_index, line) in io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line_index == 0 {
                if line != RESULT_TABLE_HEADER {
                    return Err(SimulatorError::Format(format!("unexpected result header: {}", line)));
                }
                continue;
            }
            if line.is_empty() {
                continue;
            }
            let row = Self::parse_row(line).ok_or_else(|| SimulatorError::Format(format!("invalid result row {}: {}", line_index, line)))?;
            table.merge(row.size, row.p, &row.result);
        }
        Ok(table)
    }

    fn parse_row(line: &str) -> Option<ResultRow> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 5 {
            return None;
        }
        let size = fields[0].parse().ok()?;
        let p: f64 = fields[1].parse().ok()?;
        let trials: usize = fields[2].parse().ok()?;
        let successes: usize = fields[3].parse().ok()?;
        let invalid = fields[4].parse().ok()?;
        if successes > trials || !(0. ..=1.).contains(&p) {
            return None;
        }
        Some(ResultRow {
            size,
            p,
            result: BatchResult {
                trials,
                successes,
                invalid,
            },
        })
    }

    /// add the counts of a batch to the row of `(size, p)`
    pub fn merge(&mut self, size: usize, p: f64, result: &BatchResult) {
        self.rows
            .entry((size, p.to_bits()))
            .or_insert(ResultRow {
                size,
                p,
                result: BatchResult::new(),
            })
            .result
            .merge(result);
    }

    pub fn get(&self, size: usize, p: f64) -> Option<&ResultRow> {
        self.rows.get(&(size, p.to_bits()))
    }

    pub fn rows(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn save(&self, filename: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(filename)?;
        writeln!(file, "{}", RESULT_TABLE_HEADER)?;
        for row in self.rows() {
            writeln!(
                file,
                "{},{},{},{},{}",
                row.size, row.p, row.result.trials, row.result.successes, row.result.invalid
            )?;
        }
        Ok(())
    }
}
