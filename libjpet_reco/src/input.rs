use std::path::Path;

use super::calibration::CalibrationTable;
use super::config::Config;
use super::error::{ConfigError, ProcessorError};
use super::hld_file::HldFile;
use super::mc_builder::McBuilder;
use super::mc_file::McFile;
use super::tdc_map::TdcMap;
use super::unpacker::{TdcDecoder, Unpacker};

/// The two kinds of input this crate reconstructs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// TRB3 electronics data (.hld)
    Hld,
    /// Monte-Carlo interactions (.csv, .mc)
    Mc,
}

impl InputKind {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());
        match extension.as_deref() {
            Some("hld") => Ok(Self::Hld),
            Some("csv") | Some("mc") => Ok(Self::Mc),
            _ => Err(ConfigError::UnknownInputKind(path.to_path_buf())),
        }
    }
}

/// An opened input together with the pipeline that consumes it.
///
/// Decided once when the file is opened; each variant is processed by its own
/// loop.
#[derive(Debug)]
pub enum InputSource {
    Hld(Unpacker),
    Mc { file: McFile, builder: McBuilder },
}

impl InputSource {
    pub fn open(config: &Config, path: &Path) -> Result<Self, ProcessorError> {
        match InputKind::from_path(path)? {
            InputKind::Hld => {
                let unpacker_config = &config.unpacker;
                let map_path = unpacker_config
                    .tdc_map_path
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingTdcMap(path.to_path_buf()))?;
                let tdc_map = TdcMap::new(map_path)?;
                let calibration = CalibrationTable::load(
                    unpacker_config.tot_calibration_path.as_deref(),
                    unpacker_config.tdc_calibration_path.as_deref(),
                    unpacker_config.tot_offset_scale,
                    unpacker_config.tdc_correction_scale,
                );
                let file = HldFile::new(path)?.with_max_entries(config.max_entries);
                Ok(Self::Hld(Unpacker::new(
                    file,
                    TdcDecoder::new(tdc_map, calibration),
                )))
            }
            InputKind::Mc => Ok(Self::Mc {
                file: McFile::new(path)?,
                builder: McBuilder::from_config(&config.mc)?,
            }),
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            Self::Hld(_) => InputKind::Hld,
            Self::Mc { .. } => InputKind::Mc,
        }
    }
}
