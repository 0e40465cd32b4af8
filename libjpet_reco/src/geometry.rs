use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::error::GeometryError;

const BANK_ENTRIES_PER_LINE: usize = 7;

/// Map a GATE (sector, crystal) pair onto a J-PET scintillator ID
/// using the standard big-barrel layout.
pub fn map_scintillator_from_gate(sector_id: i32, crystal_id: i32) -> i32 {
    GateMapping::default().map_unchecked(sector_id, crystal_id)
}

/// Constants of the simulation geometry to detector mapping.
///
/// `id = base + crystal - stride*sector`, plus `upper_shift` for sectors at or
/// above `split_sector`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateMapping {
    pub base: i32,
    pub stride: i32,
    pub split_sector: i32,
    pub upper_shift: i32,
    pub n_sectors: i32,
    pub n_crystals: i32,
}

impl Default for GateMapping {
    fn default() -> Self {
        Self {
            base: 266,
            stride: 13,
            split_sector: 6,
            upper_shift: 312,
            n_sectors: 24,
            n_crystals: 13,
        }
    }
}

impl GateMapping {
    /// Map a (sector, crystal) pair, rejecting indices outside of the detector
    pub fn map(&self, sector_id: i32, crystal_id: i32) -> Result<i32, GeometryError> {
        if !(0..self.n_sectors).contains(&sector_id) {
            return Err(GeometryError::SectorOutOfBounds(sector_id, self.n_sectors));
        }
        if !(0..self.n_crystals).contains(&crystal_id) {
            return Err(GeometryError::CrystalOutOfBounds(
                crystal_id,
                self.n_crystals,
            ));
        }
        Ok(self.map_unchecked(sector_id, crystal_id))
    }

    pub fn map_unchecked(&self, sector_id: i32, crystal_id: i32) -> i32 {
        let id = self.base + crystal_id - self.stride * sector_id;
        if sector_id < self.split_sector {
            id
        } else {
            id + self.upper_shift
        }
    }
}

/// Physical description of one scintillator strip, in cm
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scintillator {
    pub id: i32,
    pub center_x: f64,
    pub center_y: f64,
    pub center_z: f64,
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// ScintillatorBank is a read-only lookup of scintillator geometry by ID.
///
/// The CSV file has a header line followed by
/// `id,center_x,center_y,center_z,length,width,height` rows.
#[derive(Debug, Clone, Default)]
pub struct ScintillatorBank {
    map: FxHashMap<i32, Scintillator>,
}

impl ScintillatorBank {
    pub fn new(path: &Path) -> Result<Self, GeometryError> {
        let mut contents = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
        let bank = Self::from_csv(&contents)?;
        log::info!(
            "Loaded {} scintillators from {}",
            bank.len(),
            path.display()
        );
        Ok(bank)
    }

    pub fn from_csv(contents: &str) -> Result<Self, GeometryError> {
        let mut bank = Self::default();
        let mut lines = contents.lines().enumerate();
        lines.next(); // Skip the header
        for (row, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split_terminator(',').map(str::trim).collect();
            if entries.len() != BANK_ENTRIES_PER_LINE {
                return Err(GeometryError::BadFileFormat(row + 1));
            }
            let scin = Scintillator {
                id: entries[0].parse()?,
                center_x: entries[1].parse()?,
                center_y: entries[2].parse()?,
                center_z: entries[3].parse()?,
                length: entries[4].parse()?,
                width: entries[5].parse()?,
                height: entries[6].parse()?,
            };
            bank.insert(scin);
        }
        Ok(bank)
    }

    pub fn insert(&mut self, scin: Scintillator) {
        self.map.insert(scin.id, scin);
    }

    pub fn get(&self, id: i32) -> Option<&Scintillator> {
        self.map.get(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
