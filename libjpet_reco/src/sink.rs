use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::error::WriterError;
use super::mc_hit::McHitPair;
use super::tdc_edge::{group_channels, TdcChannel, TdcEdgeEvent};
use super::time_window::TimeWindow;

/// Destination of flushed time windows.
///
/// Windows are written in the order they are flushed; `close` is called once
/// after the final flush.
pub trait WindowSink {
    fn write_tdc_window(&mut self, window: &TimeWindow<TdcEdgeEvent>) -> Result<(), WriterError>;
    fn write_mc_window(&mut self, window: &TimeWindow<McHitPair>) -> Result<(), WriterError>;
    fn close(&mut self) -> Result<(), WriterError>;
}

/// Keeps every window in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub tdc_windows: Vec<TimeWindow<TdcEdgeEvent>>,
    pub mc_windows: Vec<TimeWindow<McHitPair>>,
    pub is_closed: bool,
}

impl WindowSink for MemorySink {
    fn write_tdc_window(&mut self, window: &TimeWindow<TdcEdgeEvent>) -> Result<(), WriterError> {
        self.tdc_windows.push(window.clone());
        Ok(())
    }

    fn write_mc_window(&mut self, window: &TimeWindow<McHitPair>) -> Result<(), WriterError> {
        self.mc_windows.push(window.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriterError> {
        self.is_closed = true;
        Ok(())
    }
}

/// One document of the YAML output
#[derive(Debug, Serialize)]
struct WindowDocument<'a, H> {
    window: u64,
    index: i64,
    hits: &'a [H],
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<Vec<TdcChannel>>,
}

/// Writes each window as its own YAML document (`---` separated).
#[derive(Debug)]
pub struct YamlWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    windows_written: u64,
}

impl YamlWriter {
    pub fn new(path: &Path) -> Result<Self, WriterError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            windows_written: 0,
        })
    }

    fn write_window<H: Serialize>(
        &mut self,
        window: &TimeWindow<H>,
        channels: Option<Vec<TdcChannel>>,
    ) -> Result<(), WriterError> {
        let document = WindowDocument {
            window: self.windows_written,
            index: window.index,
            hits: &window.hits,
            channels,
        };
        self.writer.write_all(b"---\n")?;
        self.writer
            .write_all(serde_yaml::to_string(&document)?.as_bytes())?;
        self.windows_written += 1;
        Ok(())
    }

    pub fn windows_written(&self) -> u64 {
        self.windows_written
    }
}

impl WindowSink for YamlWriter {
    /// TDC windows also carry their edges grouped into lead/trail channels
    fn write_tdc_window(&mut self, window: &TimeWindow<TdcEdgeEvent>) -> Result<(), WriterError> {
        self.write_window(window, Some(group_channels(&window.hits)))
    }

    fn write_mc_window(&mut self, window: &TimeWindow<McHitPair>) -> Result<(), WriterError> {
        self.write_window(window, None)
    }

    fn close(&mut self) -> Result<(), WriterError> {
        self.writer.flush()?;
        log::info!(
            "{} windows written to {}",
            self.windows_written,
            self.path.display()
        );
        Ok(())
    }
}
