use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::geometry::GateMapping;
use super::smearing::SmearingConfig;
use super::time_window::FlushPolicy;

/// Format of the reconstructed output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Hdf5,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yml",
            Self::Hdf5 => "h5",
        }
    }
}

/// How MC interactions are grouped into time windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Window index from the absolute simulated time
    #[default]
    Boundary,
    /// Events shifted randomly into a window, flushed by the simulated activity
    Activity,
}

/// Settings of the TRB3 unpacker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpackerConfig {
    pub tdc_map_path: Option<PathBuf>,
    pub tot_calibration_path: Option<PathBuf>,
    pub tdc_calibration_path: Option<PathBuf>,
    /// Multiplies TDC nonlinearity corrections (ns to ps)
    pub tdc_correction_scale: f64,
    pub tot_offset_scale: f64,
}

impl Default for UnpackerConfig {
    fn default() -> Self {
        Self {
            tdc_map_path: None,
            tot_calibration_path: None,
            tdc_calibration_path: None,
            tdc_correction_scale: 1000.0,
            tot_offset_scale: 1.0,
        }
    }
}

/// Settings of the Monte-Carlo reconstruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McConfig {
    pub window_mode: WindowMode,
    /// ps
    pub window_width: f64,
    /// MBq
    pub activity: f64,
    pub activity_scale: f64,
    pub single_event_per_window: bool,
    /// keV
    pub energy_threshold: f64,
    pub scintillator_bank_path: Option<PathBuf>,
    pub gate_mapping: GateMapping,
    pub smearing: SmearingConfig,
}

impl Default for McConfig {
    fn default() -> Self {
        Self {
            window_mode: WindowMode::Boundary,
            window_width: 20_000_000.0,
            activity: 4.7,
            activity_scale: 1e-6,
            single_event_per_window: false,
            energy_threshold: 10.0,
            scintillator_bank_path: None,
            gate_mapping: GateMapping::default(),
            smearing: SmearingConfig::default(),
        }
    }
}

impl McConfig {
    pub fn is_window_width_valid(&self) -> bool {
        self.window_width.is_finite() && self.window_width > 0.0
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        if self.single_event_per_window {
            return FlushPolicy::SingleEvent;
        }
        match self.window_mode {
            WindowMode::Boundary => FlushPolicy::Boundary,
            WindowMode::Activity => {
                FlushPolicy::activity(self.window_width, self.activity, self.activity_scale)
            }
        }
    }
}

/// Structure representing the application configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_files: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub max_entries: Option<u64>,
    pub make_histograms: bool,
    pub n_threads: i32,
    pub unpacker: UnpackerConfig,
    pub mc: McConfig,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            output_path: PathBuf::from("None"),
            output_format: OutputFormat::Yaml,
            max_entries: None,
            make_histograms: false,
            n_threads: 1,
            unpacker: UnpackerConfig::default(),
            mc: McConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Get the path to the output file of an input file
    pub fn get_output_file_name(&self, input_path: &Path) -> Result<PathBuf, ConfigError> {
        self.output_file_with_suffix(input_path, self.output_format.extension())
    }

    /// Get the path to the statistics file of an input file
    pub fn get_statistics_file_name(&self, input_path: &Path) -> Result<PathBuf, ConfigError> {
        self.output_file_with_suffix(input_path, "stats.yml")
    }

    fn output_file_with_suffix(
        &self,
        input_path: &Path,
        suffix: &str,
    ) -> Result<PathBuf, ConfigError> {
        if !self.output_path.exists() {
            return Err(ConfigError::BadFilePath(self.output_path.clone()));
        }
        let stem = input_path
            .file_stem()
            .ok_or_else(|| ConfigError::BadFilePath(input_path.to_path_buf()))?;
        Ok(self
            .output_path
            .join(format!("{}.{suffix}", stem.to_string_lossy())))
    }

    /// Check that the requested output can be produced by this build
    pub fn check_output_format(&self) -> Result<(), ConfigError> {
        if self.output_format == OutputFormat::Hdf5 && !cfg!(feature = "hdf5") {
            return Err(ConfigError::UnsupportedOutput(String::from("hdf5")));
        }
        Ok(())
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let config = Config::default();
        let yaml_str = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml_str = "input_files: [run.hld]\nmc:\n  window_mode: activity\n  single_event_per_window: false\n";
        let config: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.input_files, vec![PathBuf::from("run.hld")]);
        assert_eq!(config.unpacker.tdc_correction_scale, 1000.0);
        assert_eq!(config.mc.smearing.time_sigma, 220.0);
        assert!(matches!(
            config.mc.flush_policy(),
            FlushPolicy::Activity { .. }
        ));
    }

    #[test]
    fn test_window_width_validation() {
        let mut config = McConfig::default();
        assert!(config.is_window_width_valid());
        for width in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            config.window_width = width;
            assert!(!config.is_window_width_valid());
        }
    }

    #[test]
    fn test_single_event_overrides_mode() {
        let config = McConfig {
            single_event_per_window: true,
            ..Default::default()
        };
        assert_eq!(config.flush_policy(), FlushPolicy::SingleEvent);
    }

    #[test]
    fn test_output_names() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        let out = config
            .get_output_file_name(Path::new("/data/dabc_001.hld"))
            .unwrap();
        assert_eq!(out, dir.path().join("dabc_001.yml"));
        let stats = config
            .get_statistics_file_name(Path::new("/data/dabc_001.hld"))
            .unwrap();
        assert_eq!(stats, dir.path().join("dabc_001.stats.yml"));
    }

    #[test]
    fn test_missing_config_file() {
        assert!(matches!(
            Config::read_config_file(Path::new("/no/such/config.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
