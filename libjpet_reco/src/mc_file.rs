use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::error::McFileError;
use super::mc_hit::{McEventPack, RawMcInteraction};

const ENTRIES_PER_LINE: usize = 9;

/// Parse one row of the interaction CSV
fn parse_row(line: &str, row: usize) -> Result<RawMcInteraction, McFileError> {
    let entries: Vec<&str> = line.split_terminator(',').map(str::trim).collect();
    if entries.len() != ENTRIES_PER_LINE {
        return Err(McFileError::BadRow(
            row,
            format!("expected {ENTRIES_PER_LINE} columns, found {}", entries.len()),
        ));
    }
    let bad = |e: &dyn std::fmt::Display| McFileError::BadRow(row, e.to_string());
    let float = |s: &str| s.parse::<f64>().map_err(|e| bad(&e));
    let int = |s: &str| s.parse::<i32>().map_err(|e| bad(&e));

    Ok(RawMcInteraction::from_gate_units(
        entries[0].parse::<u64>().map_err(|e| bad(&e))?,
        float(entries[1])?,
        float(entries[2])?,
        float(entries[3])?,
        float(entries[4])?,
        float(entries[5])?,
        int(entries[6])?,
        int(entries[7])?,
        int(entries[8])?,
    ))
}

/// McFile reads simulated interactions from a GATE-style CSV export.
///
/// Columns: `event_id,time_s,energy_mev,x_mm,y_mm,z_mm,module_id,sector_id,crystal_id`.
/// The first line is a header and is skipped.
#[derive(Debug)]
pub struct McFile {
    reader: BufReader<File>,
    file_path: PathBuf,
    size_bytes: u64,
    bytes_read: u64,
    row: usize,
    line: String,
    pending: Option<RawMcInteraction>,
    is_ended: bool,
}

impl McFile {
    pub fn new(path: &Path) -> Result<Self, McFileError> {
        if !path.exists() {
            return Err(McFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line)? as u64; // Skip the header
        log::info!(
            "Opened MC file {:?} ({})",
            path,
            human_bytes::human_bytes(size_bytes as f64)
        );
        Ok(Self {
            reader,
            file_path: path.to_path_buf(),
            size_bytes,
            bytes_read,
            row: 1,
            line,
            pending: None,
            is_ended: bytes_read == 0,
        })
    }

    /// Read the next interaction, None at end of file
    pub fn get_next_interaction(&mut self) -> Result<Option<RawMcInteraction>, McFileError> {
        if let Some(interaction) = self.pending.take() {
            return Ok(Some(interaction));
        }
        loop {
            if self.is_ended {
                return Ok(None);
            }
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            self.row += 1;
            self.bytes_read += n as u64;
            if n == 0 {
                self.is_ended = true;
                return Ok(None);
            }
            if self.line.trim().is_empty() {
                continue;
            }
            return parse_row(&self.line, self.row).map(Some);
        }
    }

    /// Read all consecutive interactions sharing an event id
    pub fn get_next_event_pack(&mut self) -> Result<Option<McEventPack>, McFileError> {
        let first = match self.get_next_interaction()? {
            Some(interaction) => interaction,
            None => return Ok(None),
        };
        let mut pack = McEventPack {
            event_id: first.event_id,
            interactions: vec![first],
        };
        while let Some(interaction) = self.get_next_interaction()? {
            if interaction.event_id != pack.event_id {
                self.pending = Some(interaction);
                break;
            }
            pack.interactions.push(interaction);
        }
        Ok(Some(pack))
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn get_filename(&self) -> &Path {
        &self.file_path
    }
}
