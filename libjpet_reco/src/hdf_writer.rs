use hdf5::types::VarLenUnicode;
use hdf5::File;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::WriterError;
use super::mc_hit::McHitPair;
use super::sink::WindowSink;
use super::tdc_edge::{group_channels, Edge, TdcEdgeEvent};
use super::time_window::TimeWindow;

const WINDOWS_NAME: &str = "windows";
const EDGES_NAME: &str = "edges";
const CHANNELS_NAME: &str = "channels";
const RAW_HITS_NAME: &str = "raw_hits";
const RECO_HITS_NAME: &str = "reco_hits";

/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

const EDGE_COLUMNS: usize = 8;
const CHANNEL_COLUMNS: usize = 4;
const RAW_HIT_COLUMNS: usize = 6;
const RECO_HIT_COLUMNS: usize = 7;

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file for writing flushed time windows.
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
    file_path: PathBuf,
    windows_group: hdf5::Group,
    windows_written: u64,
}
// Structure
// windows - min_window, max_window, version
// |---- window_# - index
// |    |---- edges(dset)     tdc_address, global_channel, rising, coarse, fine, epoch, full_time, relative_time
// |    |---- channels(dset)  channel group, global_channel, lead, relative_time
// |    |---- raw_hits(dset)  scin_id, time, energy, x, y, z
// |    |---- reco_hits(dset) raw row, scin_id, time, energy, x, y, z

impl HDFWriter {
    /// Create the writer, opening a file at path and creating the data groups
    pub fn new(path: &Path) -> Result<Self, WriterError> {
        let file_handle = File::create(path)?;
        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);

        let windows_group = file_handle.create_group(WINDOWS_NAME)?;
        windows_group.new_attr::<u64>().create("min_window")?;
        windows_group.new_attr::<u64>().create("max_window")?;
        windows_group
            .new_attr::<VarLenUnicode>()
            .create("version")?
            .write_scalar(
                &VarLenUnicode::from_str(&version)
                    .map_err(|e| hdf5::Error::from(e.to_string()))?,
            )?;

        Ok(Self {
            file_handle,
            file_path: path.to_path_buf(),
            windows_group,
            windows_written: 0,
        })
    }

    fn create_window_group(&mut self, index: i64) -> Result<hdf5::Group, WriterError> {
        let group = self
            .windows_group
            .create_group(&format!("window_{}", self.windows_written))?;
        group
            .new_attr::<i64>()
            .create("index")?
            .write_scalar(&index)?;
        self.windows_written += 1;
        Ok(group)
    }
}

impl WindowSink for HDFWriter {
    fn write_tdc_window(&mut self, window: &TimeWindow<TdcEdgeEvent>) -> Result<(), WriterError> {
        let mut matrix = Array2::<f64>::zeros([window.len(), EDGE_COLUMNS]);
        for (row, edge) in window.hits.iter().enumerate() {
            matrix[[row, 0]] = edge.tdc_address as f64;
            matrix[[row, 1]] = edge.global_channel as f64;
            matrix[[row, 2]] = if edge.edge == Edge::Rising { 1.0 } else { 0.0 };
            matrix[[row, 3]] = edge.coarse as f64;
            matrix[[row, 4]] = edge.fine as f64;
            matrix[[row, 5]] = edge.epoch as f64;
            matrix[[row, 6]] = edge.full_time;
            matrix[[row, 7]] = edge.relative_time;
        }
        let channels = group_channels(&window.hits);
        let mut channel_matrix = Array2::<f64>::zeros([window.len(), CHANNEL_COLUMNS]);
        let mut row = 0;
        for (group_idx, channel) in channels.iter().enumerate() {
            let leads = channel.leads.iter().map(|t| (1.0, *t));
            let trails = channel.trails.iter().map(|t| (0.0, *t));
            for (is_lead, time) in leads.chain(trails) {
                channel_matrix[[row, 0]] = group_idx as f64;
                channel_matrix[[row, 1]] = channel.global_channel as f64;
                channel_matrix[[row, 2]] = is_lead;
                channel_matrix[[row, 3]] = time;
                row += 1;
            }
        }
        let group = self.create_window_group(window.index)?;
        group
            .new_dataset_builder()
            .with_data(&matrix)
            .create(EDGES_NAME)?;
        group
            .new_dataset_builder()
            .with_data(&channel_matrix)
            .create(CHANNELS_NAME)?;
        Ok(())
    }

    fn write_mc_window(&mut self, window: &TimeWindow<McHitPair>) -> Result<(), WriterError> {
        let mut raw = Array2::<f64>::zeros([window.len(), RAW_HIT_COLUMNS]);
        let n_reco = window.hits.iter().filter(|p| p.reco.is_some()).count();
        let mut reco = Array2::<f64>::zeros([n_reco, RECO_HIT_COLUMNS]);
        let mut reco_row = 0;
        for (row, pair) in window.hits.iter().enumerate() {
            let hit = &pair.raw;
            for (col, value) in [hit.scin_id as f64, hit.time, hit.energy, hit.x, hit.y, hit.z]
                .into_iter()
                .enumerate()
            {
                raw[[row, col]] = value;
            }
            if let Some(r) = &pair.reco {
                for (col, value) in [row as f64, r.scin_id as f64, r.time, r.energy, r.x, r.y, r.z]
                    .into_iter()
                    .enumerate()
                {
                    reco[[reco_row, col]] = value;
                }
                reco_row += 1;
            }
        }
        let group = self.create_window_group(window.index)?;
        group
            .new_dataset_builder()
            .with_data(&raw)
            .create(RAW_HITS_NAME)?;
        group
            .new_dataset_builder()
            .with_data(&reco)
            .create(RECO_HITS_NAME)?;
        Ok(())
    }

    /// Write meta information on first and last windows
    fn close(&mut self) -> Result<(), WriterError> {
        self.windows_group.attr("min_window")?.write_scalar(&0u64)?;
        self.windows_group
            .attr("max_window")?
            .write_scalar(&self.windows_written.saturating_sub(1))?;
        self.file_handle.flush()?;
        log::info!(
            "{} windows written to {}",
            self.windows_written,
            self.file_path.display()
        );
        Ok(())
    }
}
