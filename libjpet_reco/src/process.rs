use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::config::{Config, OutputFormat};
use super::constants::PROGRESS_FRACTION;
use super::error::ProcessorError;
#[cfg(feature = "hdf5")]
use super::hdf_writer::HDFWriter;
use super::input::InputSource;
use super::mc_builder::McBuilder;
use super::mc_file::McFile;
use super::mc_hit::McHitPair;
use super::sink::{WindowSink, YamlWriter};
use super::statistics::Statistics;
use super::tdc_edge::TdcEdgeEvent;
use super::time_window::{FlushPolicy, TimeWindow, WindowAccumulator};
use super::unpacker::Unpacker;
use super::worker_status::{BarColor, WorkerStatus};

/// Sends a WorkerStatus every time another PROGRESS_FRACTION of the input is read
struct ProgressReporter<'a> {
    tx: &'a Sender<WorkerStatus>,
    file_name: String,
    worker_id: usize,
    color: BarColor,
    flush_val: u64,
    count: u64,
    last_position: u64,
    progress: f32,
}

impl<'a> ProgressReporter<'a> {
    fn new(
        tx: &'a Sender<WorkerStatus>,
        path: &Path,
        worker_id: usize,
        color: BarColor,
        total_bytes: u64,
    ) -> Self {
        Self {
            tx,
            file_name: path.to_string_lossy().to_string(),
            worker_id,
            color,
            flush_val: (total_bytes as f64 * PROGRESS_FRACTION as f64) as u64,
            count: 0,
            last_position: 0,
            progress: 0.0,
        }
    }

    fn send(&self, progress: f32) -> Result<(), ProcessorError> {
        self.tx.send(WorkerStatus::new(
            progress,
            &self.file_name,
            self.worker_id,
            self.color.clone(),
        ))?;
        Ok(())
    }

    fn update(&mut self, position: u64) -> Result<(), ProcessorError> {
        self.count += position.saturating_sub(self.last_position);
        self.last_position = position;
        if self.count > self.flush_val {
            self.count = 0;
            self.progress += PROGRESS_FRACTION;
            self.send(self.progress.min(1.0))?;
        }
        Ok(())
    }
}

/// Open the sink for the configured output format
fn create_sink(config: &Config, output_path: &Path) -> Result<Box<dyn WindowSink>, ProcessorError> {
    match config.output_format {
        OutputFormat::Yaml => Ok(Box::new(YamlWriter::new(output_path)?)),
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => Ok(Box::new(HDFWriter::new(output_path)?)),
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => {
            Err(super::error::ConfigError::UnsupportedOutput(String::from("hdf5")).into())
        }
    }
}

fn emit_tdc_window(
    window: &TimeWindow<TdcEdgeEvent>,
    sink: &mut dyn WindowSink,
    stats: &mut Option<Statistics>,
) -> Result<(), ProcessorError> {
    sink.write_tdc_window(window)?;
    if let Some(stats) = stats.as_mut() {
        stats.fill_tdc_window(window);
    }
    Ok(())
}

fn emit_mc_window(
    window: &TimeWindow<McHitPair>,
    sink: &mut dyn WindowSink,
    stats: &mut Option<Statistics>,
) -> Result<(), ProcessorError> {
    sink.write_mc_window(window)?;
    if let Some(stats) = stats.as_mut() {
        stats.fill_mc_window(window);
    }
    Ok(())
}

/// Decode every record of an HLD file; one record is one time window
fn process_hld(
    mut unpacker: Unpacker,
    sink: &mut dyn WindowSink,
    stats: &mut Option<Statistics>,
    progress: &mut ProgressReporter,
) -> Result<(), ProcessorError> {
    let mut accumulator = WindowAccumulator::<TdcEdgeEvent>::new(FlushPolicy::Boundary);
    let mut record_index: i64 = 0;
    while let Some(record) = unpacker.get_next_record()? {
        progress.update(unpacker.get_file().get_position())?;
        for edge in record.edges {
            if let Some(window) = accumulator.append_hit(record_index, edge) {
                emit_tdc_window(&window, sink, stats)?;
            }
        }
        record_index += 1;
    }
    if let Some(window) = accumulator.flush_final() {
        emit_tdc_window(&window, sink, stats)?;
    }
    log::info!(
        "Decoded {} records ({} empty) into {} windows",
        unpacker.get_file().entries_read(),
        unpacker.empty_records(),
        accumulator.windows_flushed()
    );
    Ok(())
}

/// Reconstruct every simulated event of an MC file
fn process_mc(
    mut file: McFile,
    mut builder: McBuilder,
    max_entries: Option<u64>,
    sink: &mut dyn WindowSink,
    stats: &mut Option<Statistics>,
    progress: &mut ProgressReporter,
) -> Result<(), ProcessorError> {
    let mut n_events: u64 = 0;
    let mut n_windows: u64 = 0;
    while max_entries.map_or(true, |max| n_events < max) {
        let pack = match file.get_next_event_pack()? {
            Some(pack) => pack,
            None => break,
        };
        n_events += 1;
        for window in builder.process_event_pack(&pack)? {
            emit_mc_window(&window, sink, stats)?;
            n_windows += 1;
        }
        progress.update(file.get_bytes_read())?;
    }
    if let Some(window) = builder.flush_final() {
        emit_mc_window(&window, sink, stats)?;
        n_windows += 1;
    }
    log::info!("Reconstructed {n_events} simulated events into {n_windows} windows");
    Ok(())
}

/// The main loop of jpet_reco.
///
/// Opens a single input file, decides its pipeline once, and writes the
/// reconstructed windows next to the other outputs.
pub fn process_file(
    config: &Config,
    path: &Path,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    config.check_output_format()?;
    let source = InputSource::open(config, path)?;
    let color = BarColor::from(source.kind());
    let total_bytes = path.metadata()?.len();
    log::info!(
        "Total file size: {}",
        human_bytes::human_bytes(total_bytes as f64)
    );

    let output_path = config.get_output_file_name(path)?;
    let mut sink = create_sink(config, &output_path)?;
    let mut stats = if config.make_histograms {
        let mut stats = Statistics::default();
        match &source {
            InputSource::Hld(_) => stats.book_hld_histograms(),
            InputSource::Mc { .. } => stats.book_mc_histograms(config.mc.window_width),
        }
        Some(stats)
    } else {
        None
    };

    let mut progress = ProgressReporter::new(tx, path, *worker_id, color, total_bytes);
    progress.send(0.0)?;
    match source {
        InputSource::Hld(unpacker) => {
            process_hld(unpacker, sink.as_mut(), &mut stats, &mut progress)?
        }
        InputSource::Mc { file, builder } => process_mc(
            file,
            builder,
            config.max_entries,
            sink.as_mut(),
            &mut stats,
            &mut progress,
        )?,
    }
    sink.close()?;

    if let Some(stats) = stats {
        stats.write_yaml(&config.get_statistics_file_name(path)?)?;
    }
    progress.send(1.0)?;
    Ok(())
}

/// Process a subset of the input files.
///
/// A file that fails is reported and ends the subset with its error.
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<PathBuf>,
) -> Result<(), ProcessorError> {
    for path in subset {
        if !path.exists() {
            log::info!("File {} does not exist, skipping...", path.display());
            continue;
        }
        log::info!("Processing file {}...", path.display());
        if let Err(e) = process_file(&config, &path, &tx, &worker_id) {
            log::error!("Processing {} failed: {e}", path.display());
            tx.send(WorkerStatus::new(
                1.0,
                &path.to_string_lossy(),
                worker_id,
                BarColor::RED,
            ))?;
            return Err(e);
        }
        log::info!("Finished processing file {}.", path.display());
    }
    Ok(())
}

/// Divide the input files in to a set of subsets (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<PathBuf>> {
    let n_subsets = config.n_threads.max(1) as usize;
    let mut subsets: Vec<Vec<PathBuf>> = vec![Vec::new(); n_subsets];

    for (idx, path) in config.input_files.iter().enumerate() {
        subsets[idx % n_subsets].push(path.clone())
    }

    subsets
}
