use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum HldFrameError {
    #[error("Failed to parse buffer into HLD frame: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Corrupted HLD record: declared size {declared} exceeds the {remaining} bytes left in the {context}")]
    CorruptedSize {
        declared: usize,
        remaining: usize,
        context: &'static str,
    },
    #[error("Corrupted HLD record: subheader size {0} is smaller than the subheader itself")]
    SubheaderTooSmall(u32),
    #[error("Corrupted HLD record: TDC block of {declared} words overruns the {remaining} words left in the sub-record")]
    BlockOverrun { declared: usize, remaining: usize },
}

#[derive(Debug, Error)]
pub enum HldFileError {
    #[error("Error when parsing HLD frame from HldFile: {0}")]
    BadFrame(#[from] HldFrameError),
    #[error("Could not open HldFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("HldFile {0:?} is too short to contain a record")]
    FileTooShort(PathBuf),
    #[error("Reached end of HldFile")]
    EndOfFile,
    #[error("HldFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration loading failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration file failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum TdcMapError {
    #[error("TdcMap failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("TdcMap failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("TdcMap was given a file with the incorrect format; expected address,channel_offset on line {0}")]
    BadFileFormat(usize),
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Geometry failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Geometry failed to parse an integer: {0}")]
    IntParsingError(#[from] std::num::ParseIntError),
    #[error("Geometry failed to parse a float: {0}")]
    FloatParsingError(#[from] std::num::ParseFloatError),
    #[error("ScintillatorBank was given a file with the incorrect format on line {0}")]
    BadFileFormat(usize),
    #[error("Simulation sector {0} is outside of the configured detector ({1} sectors)")]
    SectorOutOfBounds(i32, i32),
    #[error("Simulation crystal {0} is outside of the configured detector ({1} crystals per sector)")]
    CrystalOutOfBounds(i32, i32),
}

#[derive(Debug, Error)]
pub enum McFileError {
    #[error("Could not open McFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("McFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("McFile has a malformed row at line {0}: {1}")]
    BadRow(usize, String),
}

#[derive(Debug, Error)]
pub enum SmearingError {
    #[error("Smearing formula `{0}` could not be built: {1}")]
    BadFormula(String, evalexpr::EvalexprError),
    #[error("Smearing formula evaluation failed: {0}")]
    Evaluation(#[from] evalexpr::EvalexprError),
}

#[derive(Debug, Error)]
pub enum UnpackerError {
    #[error("Unpacker failed due to HldFile error: {0}")]
    FileError(#[from] HldFileError),
    #[error("Unpacker failed due to frame error: {0}")]
    FrameError(#[from] HldFrameError),
}

#[derive(Debug, Error)]
pub enum McBuilderError {
    #[error("McBuilder failed due to geometry error: {0}")]
    GeometryError(#[from] GeometryError),
    #[error("McBuilder failed due to smearing error: {0}")]
    SmearingError(#[from] SmearingError),
    #[error("McBuilder failed due to McFile error: {0}")]
    FileError(#[from] McFileError),
    #[error("McBuilder failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Writer failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[cfg(feature = "hdf5")]
    #[error("HDFWriter failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("HLD input {0:?} requires a TDC address map, but none was configured")]
    MissingTdcMap(PathBuf),
    #[error("Could not determine the input kind of {0:?}; expected .hld, .csv or .mc")]
    UnknownInputKind(PathBuf),
    #[error("Output format {0} is not available in this build")]
    UnsupportedOutput(String),
    #[error("Window width must be a positive finite number of ps, found {0}")]
    InvalidWindowWidth(f64),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Unpacker error: {0}")]
    UnpackerError(#[from] UnpackerError),
    #[error("Processor failed due to HldFile error: {0}")]
    HldFileError(#[from] HldFileError),
    #[error("Processor failed due to McBuilder error: {0}")]
    McBuilderError(#[from] McBuilderError),
    #[error("Processor failed due to McFile error: {0}")]
    McFileError(#[from] McFileError),
    #[error("Processor failed due to Calibration error: {0}")]
    CalibrationError(#[from] CalibrationError),
    #[error("Processor failed due to TdcMap error: {0}")]
    MapError(#[from] TdcMapError),
    #[error("Processor failed due to Geometry error: {0}")]
    GeometryError(#[from] GeometryError),
    #[error("Processor failed due to Smearing error: {0}")]
    SmearingError(#[from] SmearingError),
    #[error("Processor failed due to Writer error: {0}")]
    WriterError(#[from] WriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
