// Each TRB endpoint (TDC) reports its hits with local channel numbers 0..N.
// The global channel number used by the calibrations and the rest of the
// framework is local channel + the endpoint's channel offset. The map file
// lists, for every endpoint network address, its channel offset:
// address,channel_offset
// 0xa110,0
// 0xa111,65
use std::fs::File;
use std::io::Read;
use std::path::Path;

use fxhash::FxHashMap;

use super::error::TdcMapError;

const ENTRIES_PER_LINE: usize = 2;

/// Parse an address written either as hex (`0xa110`, `a110`) or decimal
fn parse_address(entry: &str) -> Result<u32, TdcMapError> {
    let entry = entry.trim();
    if let Some(hex) = entry
        .strip_prefix("0x")
        .or_else(|| entry.strip_prefix("0X"))
    {
        return Ok(u32::from_str_radix(hex, 16)?);
    }
    if entry.chars().any(|c| c.is_ascii_alphabetic()) {
        return Ok(u32::from_str_radix(entry, 16)?);
    }
    Ok(entry.parse()?)
}

/// TdcMap contains the mapping of TDC network addresses to global channel offsets.
#[derive(Debug, Clone, Default)]
pub struct TdcMap {
    map: FxHashMap<u32, u32>,
}

impl TdcMap {
    /// Read a TdcMap from a CSV file. The first line is a header and is skipped.
    pub fn new(path: &Path) -> Result<Self, TdcMapError> {
        let mut contents = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
        Self::from_csv(&contents)
    }

    pub fn from_csv(contents: &str) -> Result<Self, TdcMapError> {
        let mut tm = TdcMap::default();
        let mut lines = contents.lines().enumerate();
        lines.next(); // Skip the header
        for (row, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split_terminator(',').collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(TdcMapError::BadFileFormat(row + 1));
            }
            let address = parse_address(entries[0])?;
            let offset: u32 = entries[1].trim().parse()?;
            tm.map.insert(address, offset);
        }
        Ok(tm)
    }

    /// Build a map directly from (address, offset) pairs
    pub fn from_pairs(pairs: &[(u32, u32)]) -> Self {
        Self {
            map: pairs.iter().copied().collect(),
        }
    }

    /// Get the channel offset for a TDC address.
    ///
    /// If returns None the address is not part of the configured setup
    pub fn get_channel_offset(&self, address: u32) -> Option<u32> {
        self.map.get(&address).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
