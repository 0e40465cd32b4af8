use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::constants::{TDC_CALIBRATION_PREFIX, TOT_CALIBRATION_NAME, UNCORRECTED_FINE_SCALE};
use super::error::CalibrationError;

/// A container of named one dimensional profiles.
///
/// Stored as YAML:
///
/// ```yml
/// channels: 2100
/// histograms:
///   stretcher_offsets: [0.0, 1.2, ...]
///   correction5: [0.0, 0.012, ...]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistogramFile {
    pub channels: usize,
    pub histograms: BTreeMap<String, Vec<f64>>,
}

impl HistogramFile {
    pub fn read(path: &Path) -> Result<Self, CalibrationError> {
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.histograms.get(name).map(|h| h.as_slice())
    }

    /// Declared channels past the last bin of a per-channel histogram
    pub fn uncovered_channels(&self, name: &str) -> std::ops::Range<usize> {
        let filled = self.get(name).map_or(0, |h| h.len());
        filled.min(self.channels)..self.channels
    }
}

/// Read a calibration file, downgrading any failure to a warning
fn read_optional(path: Option<&Path>, kind: &str) -> Option<HistogramFile> {
    let path = match path {
        Some(p) => p,
        None => {
            log::warn!("Path to the {kind} calibration file was not set, {kind} calibration will not be used");
            return None;
        }
    };
    match HistogramFile::read(path) {
        Ok(file) => Some(file),
        Err(e) => {
            log::warn!(
                "Unable to read {kind} calibration file {path:?}: {e}. Unpacker will proceed without {kind} calibration"
            );
            None
        }
    }
}

/// Per-run calibration of the TDC electronics, keyed by global channel.
///
/// Channels without an entry are passed through uncorrected: the fine counter
/// is scaled by 10 and no TOT stretcher offset is subtracted.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    tdc_nonlinearity: FxHashMap<u32, Vec<u32>>,
    tot_offsets: FxHashMap<u32, f64>,
}

impl CalibrationTable {
    /// Load the TOT stretcher offsets and TDC nonlinearity corrections.
    ///
    /// Never fails: an unreadable file or a missing channel leaves that part of
    /// the table empty and is reported as a warning.
    pub fn load(
        tot_path: Option<&Path>,
        tdc_path: Option<&Path>,
        tot_scale: f64,
        tdc_scale: f64,
    ) -> Self {
        let mut table = Self::default();

        if let Some(tot_file) = read_optional(tot_path, "TOT") {
            match tot_file.get(TOT_CALIBRATION_NAME) {
                Some(offsets) => {
                    for (channel, offset) in offsets.iter().enumerate() {
                        table.insert_tot_offset(channel as u32, offset * tot_scale);
                    }
                    log::info!("Loaded TOT stretcher offsets for {} channels", offsets.len());
                    for channel in tot_file.uncovered_channels(TOT_CALIBRATION_NAME) {
                        log::warn!("Missing TOT stretcher offset for channel {channel}");
                    }
                }
                None => log::warn!(
                    "TOT calibration file has no {TOT_CALIBRATION_NAME} histogram, TOT calibration will not be used"
                ),
            }
        }

        if let Some(tdc_file) = read_optional(tdc_path, "TDC") {
            let mut loaded = 0;
            for channel in 0..tdc_file.channels as u32 {
                let name = format!("{TDC_CALIBRATION_PREFIX}{channel}");
                match tdc_file.get(&name) {
                    Some(bins) => {
                        // truncation to integer time units is intended
                        let corrections = bins.iter().map(|b| (b * tdc_scale) as u32).collect();
                        table.insert_nonlinearity(channel, corrections);
                        loaded += 1;
                    }
                    None => log::warn!("Missing TDC correction for channel {channel}"),
                }
            }
            log::info!("Loaded TDC nonlinearity corrections for {loaded} channels");
        }

        table
    }

    pub fn insert_nonlinearity(&mut self, global_channel: u32, corrections: Vec<u32>) {
        self.tdc_nonlinearity.insert(global_channel, corrections);
    }

    pub fn insert_tot_offset(&mut self, global_channel: u32, offset: f64) {
        self.tot_offsets.insert(global_channel, offset);
    }

    /// Corrected fine time of a channel, falling back to `fine * 10`
    pub fn correct_fine(&self, global_channel: u32, fine: u32) -> u32 {
        self.tdc_nonlinearity
            .get(&global_channel)
            .and_then(|corrections| corrections.get(fine as usize))
            .copied()
            .unwrap_or(fine * UNCORRECTED_FINE_SCALE)
    }

    /// TOT stretcher offset of a channel, zero when not calibrated
    pub fn tot_offset(&self, global_channel: u32) -> f64 {
        self.tot_offsets
            .get(&global_channel)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn has_tot_offset(&self, global_channel: u32) -> bool {
        self.tot_offsets.contains_key(&global_channel)
    }

    pub fn has_nonlinearity(&self, global_channel: u32) -> bool {
        self.tdc_nonlinearity.contains_key(&global_channel)
    }

    pub fn is_empty(&self) -> bool {
        self.tdc_nonlinearity.is_empty() && self.tot_offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fallback_without_calibration() {
        let table = CalibrationTable::default();
        assert!(table.is_empty());
        assert_eq!(table.correct_fine(7, 100), 1000);
        assert_eq!(table.tot_offset(7), 0.0);
    }

    #[test]
    fn test_missing_files_do_not_fail() {
        let missing = Path::new("/definitely/not/here.yml");
        let table = CalibrationTable::load(Some(missing), None, 1.0, 1000.0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_from_files() {
        let mut tot = tempfile::NamedTempFile::new().unwrap();
        write!(
            tot,
            "channels: 3\nhistograms:\n  stretcher_offsets: [0.0, 1.5, 2.5]\n"
        )
        .unwrap();
        let mut tdc = tempfile::NamedTempFile::new().unwrap();
        write!(
            tdc,
            "channels: 3\nhistograms:\n  correction1: [0.0, 0.0125, 0.5]\n"
        )
        .unwrap();

        let table = CalibrationTable::load(Some(tot.path()), Some(tdc.path()), 1.0, 1000.0);
        assert_eq!(table.tot_offset(2), 2.5);
        assert!(table.has_nonlinearity(1));
        assert!(!table.has_nonlinearity(0));
        assert_eq!(table.correct_fine(1, 1), 12);
        assert_eq!(table.correct_fine(1, 2), 500);
        // past the end of the correction vector
        assert_eq!(table.correct_fine(1, 3), 30);
        assert_eq!(table.correct_fine(0, 3), 30);
    }

    #[test]
    fn test_tot_offsets_shorter_than_capacity() {
        let mut tot = tempfile::NamedTempFile::new().unwrap();
        write!(
            tot,
            "channels: 5\nhistograms:\n  stretcher_offsets: [0.0, 1.5, 2.5]\n"
        )
        .unwrap();
        let file = HistogramFile::read(tot.path()).unwrap();
        assert_eq!(file.uncovered_channels(TOT_CALIBRATION_NAME), 3..5);
        assert_eq!(file.uncovered_channels("absent"), 0..5);

        let table = CalibrationTable::load(Some(tot.path()), None, 1.0, 1000.0);
        assert!(table.has_tot_offset(2));
        assert!(!table.has_tot_offset(4));
        assert_eq!(table.tot_offset(4), 0.0);
    }
}
