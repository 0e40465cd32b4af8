//! # jpet_reco
//!
//! jpet_reco is a reconstruction front end for the J-PET scanner, written in Rust. It
//! takes either raw TRB3 electronics data in the form of .hld files, or Monte-Carlo
//! interactions exported from GATE as .csv files, and turns them into time ordered
//! windows of calibrated TDC edges or smeared detector hits.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, see the
//! [Rust docs](https://www.rust-lang.org/tools/install) for toolchain installation
//! instructions.
//!
//! To build and install the CLI use `cargo install --path ./jpet_reco_cli` from the top
//! level repository. HDF5 output is optional and enabled with
//! `cargo install --path ./jpet_reco_cli --features hdf5`; it requires an HDF5
//! installation that the `hdf5-metno` crate can find (set `HDF5_DIR` otherwise).
//!
//! ## Configuration
//!
//! A template configuration can be generated with `jpet_reco_cli -p config.yml new`.
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! input_files:
//! - /data/dabc_21001.hld
//! output_path: /data/reco
//! output_format: yaml
//! max_entries: null
//! make_histograms: true
//! n_threads: 1
//! unpacker:
//!   tdc_map_path: /data/setup/tdc_map.csv
//!   tot_calibration_path: /data/setup/tot_offsets.yml
//!   tdc_calibration_path: /data/setup/tdc_calib.yml
//!   tdc_correction_scale: 1000.0
//!   tot_offset_scale: 1.0
//! mc:
//!   window_mode: boundary
//!   window_width: 20000000.0
//!   activity: 4.7
//!   activity_scale: 1.0e-6
//!   single_event_per_window: false
//!   energy_threshold: 10.0
//!   scintillator_bank_path: null
//!   gate_mapping: { base: 266, stride: 13, split_sector: 6, upper_shift: 312, n_sectors: 24, n_crystals: 13 }
//!   smearing:
//!     seed: 0
//!     use_default_z: true
//!     use_default_time: true
//!     use_default_energy: true
//!     z_sigma: 3.0
//!     time_sigma: 220.0
//!     time_threshold_energy: 200.0
//!     time_reference_energy: 270.0
//!     energy_fraction: 0.044
//!     z_formula: null
//!     time_formula: null
//!     energy_formula: null
//! ```
//!
//! Every field is optional and falls back to the value shown above. The input kind is
//! decided from the file extension (`.hld`, or `.csv`/`.mc`). HLD input requires
//! `tdc_map_path`; missing calibration files only produce warnings.
//!
//! Custom smearing formulas are expressions over `scin_id`, `z`, `energy`, `time`, the
//! parameters `p0..pN`, and the random draws `gauss` and `uniform`:
//!
//! ```yml
//! time_formula:
//!   expression: "time + p0 * gauss"
//!   parameters: [150.0]
//!   limits: [-1.0, -1.0]
//! ```
//!
//! ### TDC Map Format
//!
//! ```csv
//! address,channel_offset
//! 0xa110,0
//! 0xa111,65
//! ```
//!
//! ### Calibration Format
//!
//! ```yml
//! channels: 2100
//! histograms:
//!   stretcher_offsets: [0.0, 1.2, ...]
//!   correction65: [0.0, 0.012, ...]
//! ```
//!
//! ## Output
//!
//! For every input file an output file named after the input stem is written to
//! `output_path` (`.yml` with one YAML document per window, or `.h5`), plus a
//! `.stats.yml` histogram file when `make_histograms` is set.
//!
//! ### HDF5 Data Format
//!
//! ```text
//! dabc_21001.h5
//! windows - min_window, max_window, version
//! |---- window_# - index
//! |    |---- edges(dset)
//! |    |---- raw_hits(dset)
//! |    |---- reco_hits(dset)
//! ```
pub mod calibration;
pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod hld_file;
pub mod hld_frame;
#[cfg(feature = "hdf5")]
pub mod hdf_writer;
pub mod input;
pub mod mc_builder;
pub mod mc_file;
pub mod mc_hit;
pub mod process;
pub mod sink;
pub mod smearing;
pub mod statistics;
pub mod tdc_edge;
pub mod tdc_map;
pub mod time_window;
pub mod unpacker;
pub mod worker_status;
