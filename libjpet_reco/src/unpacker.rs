use fxhash::FxHashSet;
use std::io::Cursor;

use super::calibration::CalibrationTable;
use super::constants::*;
use super::error::{HldFileError, HldFrameError, UnpackerError};
use super::hld_file::{HldFile, HldRecord};
use super::hld_frame::{HldFrame, HldSubHeader, WordOrder};
use super::tdc_edge::{Edge, TdcEdgeEvent};
use super::tdc_map::TdcMap;

/// Absolute time in ns of a TDC hit
pub fn full_time(epoch: u32, coarse: u32, fine: u32) -> f64 {
    epoch as f64 * COARSE_COUNTS_PER_EPOCH * COARSE_PERIOD_NS
        + (coarse as f64 * COARSE_PERIOD_NS * 1000.0 - fine as f64) / 1000.0
}

/// The edges decoded from one HLD record (one electronics time window)
#[derive(Debug, Clone, Default)]
pub struct DecodedRecord {
    pub seq_nr: u32,
    pub run_nr: u32,
    pub trigger_nr: u32,
    pub edges: Vec<TdcEdgeEvent>,
}

/// TdcDecoder turns the payload of HLD records into TdcEdgeEvents.
///
/// Each sub-record holds blocks of TDC words, one block per endpoint, each
/// prefixed by a `[size:16|address:16]` word. Blocks from endpoints missing in
/// the TdcMap are skipped, still honouring their declared size.
#[derive(Debug)]
pub struct TdcDecoder {
    tdc_map: TdcMap,
    calibration: CalibrationTable,
    warned_addresses: FxHashSet<u32>,
}

impl TdcDecoder {
    pub fn new(tdc_map: TdcMap, calibration: CalibrationTable) -> Self {
        Self {
            tdc_map,
            calibration,
            warned_addresses: FxHashSet::default(),
        }
    }

    /// Decode every sub-record of a record
    pub fn decode_record(
        &mut self,
        frame: &HldFrame,
        order: &WordOrder,
    ) -> Result<DecodedRecord, HldFrameError> {
        let mut record = DecodedRecord {
            seq_nr: frame.header.seq_nr,
            run_nr: frame.header.run_nr,
            ..Default::default()
        };
        let body = frame.body.as_slice();
        let mut cursor = Cursor::new(body);
        let mut remaining = body.len();

        while remaining >= SUBHEADER_SIZE {
            let subheader = HldSubHeader::read_from(&mut cursor, order)?;
            remaining -= SUBHEADER_SIZE;
            let data_size = subheader.data_size()?;
            if data_size > remaining {
                log::error!(
                    "Incorrect sub-record size {} with {} bytes left in record {}, the input file is likely corrupted",
                    data_size,
                    remaining,
                    frame.header.seq_nr
                );
                return Err(HldFrameError::CorruptedSize {
                    declared: data_size,
                    remaining,
                    context: "record",
                });
            }
            record.trigger_nr = subheader.trg_nr;

            let start = cursor.position() as usize;
            let words: Vec<u32> = body[start..start + data_size]
                .chunks_exact(WORD_SIZE)
                .map(|chunk| order.apply(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
                .collect();

            match words.first() {
                Some(0) | None => log::warn!(
                    "First data word empty, skipping sub-record of hub {} in entry {}",
                    subheader.hub_address_string(),
                    frame.header.seq_nr
                ),
                Some(_) => self.decode_subrecord(&words, &mut record.edges)?,
            }

            // Skip the data and its padding
            let consumed = subheader.padded_data_size()?.min(remaining);
            cursor.set_position((start + consumed) as u64);
            remaining -= consumed;
        }

        Ok(record)
    }

    /// Walk the TDC blocks of one sub-record
    fn decode_subrecord(
        &mut self,
        words: &[u32],
        edges: &mut Vec<TdcEdgeEvent>,
    ) -> Result<(), HldFrameError> {
        let mut index = 0;
        while index < words.len() {
            let block_header = words[index];
            let internal_size = (block_header >> BLOCK_SIZE_SHIFT) as usize;
            let address = block_header & BLOCK_ADDRESS_MASK;
            let block_end = index + internal_size + 1;
            if block_end > words.len() {
                return Err(HldFrameError::BlockOverrun {
                    declared: internal_size + 1,
                    remaining: words.len() - index,
                });
            }

            match self.tdc_map.get_channel_offset(address) {
                Some(offset) => {
                    self.decode_tdc_block(address, offset, &words[index + 1..block_end], edges)
                }
                None => {
                    if self.warned_addresses.insert(address) {
                        log::warn!(
                            "TDC with net address {address:#06x} not found in the TDC map, skipping its data"
                        );
                    }
                }
            }
            index = block_end;
        }
        Ok(())
    }

    /// Decode the words of a single TDC.
    ///
    /// The reference channel (0) must appear before any other channel in the
    /// block; earlier hits have no reference and are dropped.
    fn decode_tdc_block(
        &self,
        address: u32,
        channel_offset: u32,
        words: &[u32],
        edges: &mut Vec<TdcEdgeEvent>,
    ) {
        let mut epoch: u32 = 0;
        let mut ref_time: Option<f64> = None;

        for &word in words {
            match word >> WORD_HEADER_SHIFT {
                WORD_HEADER_EPOCH => epoch = word & EPOCH_MASK,
                WORD_HEADER_TIME_DATA => {
                    let channel = ((word >> CHANNEL_SHIFT) & CHANNEL_MASK) as u8;
                    let raw_fine = (word >> FINE_SHIFT) & FINE_MASK;
                    let coarse = word & COARSE_MASK;
                    let edge = if (word >> EDGE_SHIFT) & 0x1 == 1 {
                        Edge::Rising
                    } else {
                        Edge::Falling
                    };

                    if raw_fine == INVALID_FINE {
                        continue;
                    }

                    let global_channel = channel as u32 + channel_offset;
                    let fine = self.calibration.correct_fine(global_channel, raw_fine);
                    let time = full_time(epoch, coarse, fine);

                    if channel == REFERENCE_CHANNEL {
                        ref_time = Some(time);
                        continue;
                    }
                    let Some(reference) = ref_time else {
                        continue;
                    };

                    let mut relative_time = time - reference;
                    if edge == Edge::Falling {
                        relative_time -= self.calibration.tot_offset(global_channel);
                    }
                    edges.push(TdcEdgeEvent {
                        tdc_address: address,
                        channel,
                        global_channel,
                        edge,
                        coarse: coarse as u16,
                        fine,
                        epoch,
                        full_time: time,
                        relative_time,
                    });
                }
                _ => (),
            }
        }
    }
}

/// Unpacker reads an HLD file record by record and decodes each one.
#[derive(Debug)]
pub struct Unpacker {
    file: HldFile,
    decoder: TdcDecoder,
    empty_records: u64,
}

impl Unpacker {
    pub fn new(file: HldFile, decoder: TdcDecoder) -> Self {
        Self {
            file,
            decoder,
            empty_records: 0,
        }
    }

    /// Get the next decoded record.
    ///
    /// Returns None once the file is exhausted. Corruption is returned as an
    /// error and no further records are read.
    pub fn get_next_record(&mut self) -> Result<Option<DecodedRecord>, UnpackerError> {
        loop {
            match self.file.get_next_record() {
                Ok(HldRecord::Data(frame)) => {
                    let order = self.file.word_order();
                    return match self.decoder.decode_record(&frame, &order) {
                        Ok(record) => Ok(Some(record)),
                        Err(e) => {
                            self.file.abort();
                            Err(UnpackerError::FrameError(e))
                        }
                    };
                }
                Ok(HldRecord::Empty(_)) => {
                    self.empty_records += 1;
                    continue;
                }
                Err(HldFileError::EndOfFile) => return Ok(None),
                Err(e) => return Err(UnpackerError::FileError(e)),
            }
        }
    }

    pub fn get_file(&self) -> &HldFile {
        &self.file
    }

    pub fn empty_records(&self) -> u64 {
        self.empty_records
    }
}
