use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use time::PrimitiveDateTime;

use super::constants::{END_OF_FILE_MARGIN, FILE_HEADER_SIZE, HEADER_SIZE, SUBHEADER_SIZE};
use super::error::{HldFileError, HldFrameError};
use super::hld_frame::{detect_byte_order, HldFrame, HldHeader, WordOrder};

/// What was found at the current position of an HLD file
#[derive(Debug, Clone)]
pub enum HldRecord {
    /// A record with a payload
    Data(HldFrame),
    /// A record consisting only of its header; skip it and continue
    Empty(HldHeader),
}

/// HldFile is a sequential reader over the records of a single HLD file.
///
/// The byte order is detected once when the file is opened. Reading stops when
/// fewer than `END_OF_FILE_MARGIN` bytes are left, at end of file, or after
/// `max_entries` data records. A record whose declared size runs past the end
/// of the file is reported as corruption and the file is abandoned.
#[derive(Debug)]
pub struct HldFile {
    file_handle: BufReader<File>,
    file_path: PathBuf,
    size_bytes: u64,
    position: u64,
    word_order: WordOrder,
    max_entries: Option<u64>,
    end_margin: u64,
    entries_read: u64,
    first_timestamp: Option<PrimitiveDateTime>,
    is_ended: bool,
}

impl HldFile {
    /// Open an HLD file, skip its file header and detect the byte order
    pub fn new(path: &Path) -> Result<Self, HldFileError> {
        if !path.exists() {
            return Err(HldFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        let mut file_handle = BufReader::new(file);

        let minimum = (FILE_HEADER_SIZE + HEADER_SIZE + SUBHEADER_SIZE) as u64;
        if size_bytes < FILE_HEADER_SIZE as u64 {
            return Err(HldFileError::FileTooShort(path.to_path_buf()));
        }
        file_handle.seek(SeekFrom::Start(FILE_HEADER_SIZE as u64))?;

        let (word_order, is_ended) = if size_bytes >= minimum {
            (WordOrder::new(detect_byte_order(&mut file_handle)?), false)
        } else {
            log::warn!("HLD file {path:?} contains no records");
            (WordOrder::default(), true)
        };
        log::info!(
            "Opened HLD file {:?} ({}), byte swapping {}",
            path,
            human_bytes::human_bytes(size_bytes as f64),
            if word_order.invert { "on" } else { "off" }
        );

        Ok(Self {
            file_handle,
            file_path: path.to_path_buf(),
            size_bytes,
            position: FILE_HEADER_SIZE as u64,
            word_order,
            max_entries: None,
            end_margin: END_OF_FILE_MARGIN,
            entries_read: 0,
            first_timestamp: None,
            is_ended,
        })
    }

    /// Limit the number of data records read from the file
    pub fn with_max_entries(mut self, max_entries: Option<u64>) -> Self {
        self.max_entries = max_entries;
        if max_entries == Some(0) {
            self.is_ended = true;
        }
        self
    }

    /// Override the number of trailing bytes below which reading stops
    pub fn with_end_margin(mut self, end_margin: u64) -> Self {
        self.end_margin = end_margin;
        self
    }

    /// Read the next record.
    ///
    /// Returns `HldFileError::EndOfFile` once any of the stop conditions is met.
    pub fn get_next_record(&mut self) -> Result<HldRecord, HldFileError> {
        if self.is_ended {
            return Err(HldFileError::EndOfFile);
        }

        let remaining = self.size_bytes.saturating_sub(self.position);
        if remaining < HEADER_SIZE as u64 {
            self.is_ended = true;
            return Err(HldFileError::EndOfFile);
        }

        let header = HldHeader::read_from(&mut self.file_handle)?;
        self.position += HEADER_SIZE as u64;

        let full_size = header.full_size as usize;
        if full_size < HEADER_SIZE || (full_size - HEADER_SIZE) as u64 > remaining - HEADER_SIZE as u64
        {
            log::error!(
                "Incorrect entry size {} in {:?} at byte {}, the input file is likely corrupted",
                full_size,
                self.file_path,
                self.position - HEADER_SIZE as u64
            );
            self.is_ended = true;
            return Err(HldFileError::BadFrame(HldFrameError::CorruptedSize {
                declared: full_size,
                remaining: remaining as usize,
                context: "file",
            }));
        }

        if header.is_empty() {
            self.check_end_conditions();
            return Ok(HldRecord::Empty(header));
        }

        let mut body = vec![0u8; header.data_size()];
        self.file_handle.read_exact(&mut body)?;
        self.position += body.len() as u64;
        self.skip_padding(header.padded_full_size() - full_size)?;

        if self.entries_read == 0 {
            self.first_timestamp = header.timestamp();
            match self.first_timestamp {
                Some(ts) => log::info!("Run {} first record written at {ts}", header.run_nr),
                None => log::warn!("First record of run {} has no valid date", header.run_nr),
            }
        }
        self.entries_read += 1;
        self.check_end_conditions();
        Ok(HldRecord::Data(HldFrame { header, body }))
    }

    fn skip_padding(&mut self, padding: usize) -> Result<(), HldFileError> {
        let padding = (padding as u64).min(self.size_bytes.saturating_sub(self.position));
        if padding > 0 {
            self.file_handle.seek_relative(padding as i64)?;
            self.position += padding;
        }
        Ok(())
    }

    fn check_end_conditions(&mut self) {
        let remaining = self.size_bytes.saturating_sub(self.position);
        if remaining < self.end_margin || remaining == 0 {
            self.is_ended = true;
        }
        if let Some(max) = self.max_entries {
            if self.entries_read >= max {
                self.is_ended = true;
            }
        }
    }

    /// Stop reading after a record was found to be corrupted
    pub fn abort(&mut self) {
        self.is_ended = true;
    }

    pub fn word_order(&self) -> WordOrder {
        self.word_order
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn get_position(&self) -> u64 {
        self.position
    }

    pub fn get_filename(&self) -> &Path {
        &self.file_path
    }

    /// DAQ time of the first data record, if it carried a valid date
    pub fn first_timestamp(&self) -> Option<PrimitiveDateTime> {
        self.first_timestamp
    }

    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    pub fn is_eof(&self) -> bool {
        self.is_ended
    }
}
