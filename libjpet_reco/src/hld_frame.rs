use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};
use time::{Date, Month, PrimitiveDateTime, Time};

use super::constants::*;
use super::error::HldFrameError;

/// Round a size up to the next multiple of 8 bytes.
///
/// Every HLD record and sub-record is padded this way on disk.
pub fn align8(size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    ALIGNMENT * ((size - 1) / ALIGNMENT + 1)
}

/// Swap the byte order of a 32-bit word
pub fn reverse_hex(word: u32) -> u32 {
    word.swap_bytes()
}

/// Check a raw subheader decoding word against the known inverted pattern
pub fn is_inverted_decoding(decoding: u32) -> bool {
    decoding == INVERTED_DECODING
}

/// Byte order of everything following the event header in an HLD file.
///
/// Detected once per file from the first subheader and then applied to every
/// subheader field and payload word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WordOrder {
    pub invert: bool,
}

impl WordOrder {
    pub fn new(invert: bool) -> Self {
        Self { invert }
    }

    /// Read one 32-bit word, swapping if needed
    pub fn read_word<R: Read>(&self, reader: &mut R) -> Result<u32, std::io::Error> {
        let raw = reader.read_u32::<LittleEndian>()?;
        Ok(self.apply(raw))
    }

    pub fn apply(&self, raw: u32) -> u32 {
        if self.invert {
            reverse_hex(raw)
        } else {
            raw
        }
    }
}

/// Determine whether the stream needs byte swapping.
///
/// The reader must be positioned at the first event header (i.e. just past the
/// file header). The first header and subheader are peeked and the stream
/// position is restored before returning.
pub fn detect_byte_order<R: Read + Seek>(reader: &mut R) -> Result<bool, HldFrameError> {
    let start = reader.stream_position()?;
    let mut buffer = [0u8; HEADER_SIZE + SUBHEADER_SIZE];
    let result = reader.read_exact(&mut buffer);
    reader.seek(SeekFrom::Start(start))?;
    result?;
    // decoding is the second word of the subheader
    let offset = HEADER_SIZE + WORD_SIZE;
    let decoding = (&buffer[offset..offset + WORD_SIZE]).read_u32::<LittleEndian>()?;
    Ok(is_inverted_decoding(decoding))
}

/// The 32 byte header at the start of every HLD record.
///
/// Header fields are always stored in the DAQ host order (little endian).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HldHeader {
    pub full_size: u32,
    pub decoding: u32,
    pub id: u32,
    pub seq_nr: u32,
    pub date: u32,
    pub time: u32,
    pub run_nr: u32,
    pub pad: u32,
}

impl HldHeader {
    /// Read a header field by field
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, HldFrameError> {
        Ok(Self {
            full_size: reader.read_u32::<LittleEndian>()?,
            decoding: reader.read_u32::<LittleEndian>()?,
            id: reader.read_u32::<LittleEndian>()?,
            seq_nr: reader.read_u32::<LittleEndian>()?,
            date: reader.read_u32::<LittleEndian>()?,
            time: reader.read_u32::<LittleEndian>()?,
            run_nr: reader.read_u32::<LittleEndian>()?,
            pad: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// A record holding only its own header carries no data
    pub fn is_empty(&self) -> bool {
        self.full_size as usize == HEADER_SIZE
    }

    /// Number of bytes following the header, excluding padding
    pub fn data_size(&self) -> usize {
        (self.full_size as usize).saturating_sub(HEADER_SIZE)
    }

    pub fn padded_full_size(&self) -> usize {
        align8(self.full_size as usize)
    }

    /// Wall clock time at which the DAQ wrote the record, if the date and
    /// time words are valid.
    pub fn timestamp(&self) -> Option<PrimitiveDateTime> {
        let year = ((self.date >> 16) & 0xffff) as i32 + 1900;
        let month = Month::try_from(((self.date >> 8) & 0xff) as u8 + 1).ok()?;
        let day = (self.date & 0xff) as u8;
        let date = Date::from_calendar_date(year, month, day).ok()?;
        let hour = ((self.time >> 16) & 0xff) as u8;
        let minute = ((self.time >> 8) & 0xff) as u8;
        let second = (self.time & 0xff) as u8;
        let time = Time::from_hms(hour, minute, second).ok()?;
        Some(PrimitiveDateTime::new(date, time))
    }
}

/// The 16 byte header in front of each hub's payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HldSubHeader {
    pub size: u32,
    pub decoding: u32,
    pub hub_address: u32,
    pub trg_nr: u32,
}

impl HldSubHeader {
    pub fn read_from<R: Read>(reader: &mut R, order: &WordOrder) -> Result<Self, HldFrameError> {
        Ok(Self {
            size: order.read_word(reader)?,
            decoding: order.read_word(reader)?,
            hub_address: order.read_word(reader)?,
            trg_nr: order.read_word(reader)?,
        })
    }

    /// Payload size in bytes (subheader excluded, padding excluded)
    pub fn data_size(&self) -> Result<usize, HldFrameError> {
        (self.size as usize)
            .checked_sub(SUBHEADER_SIZE)
            .ok_or(HldFrameError::SubheaderTooSmall(self.size))
    }

    pub fn padded_data_size(&self) -> Result<usize, HldFrameError> {
        Ok(align8(self.data_size()?))
    }

    /// Hub address as four lower-case hex digits
    pub fn hub_address_string(&self) -> String {
        format!("{:04x}", self.hub_address)
    }
}

/// One full HLD record: the header plus the raw bytes of its sub-records.
#[derive(Debug, Clone, Default)]
pub struct HldFrame {
    pub header: HldHeader,
    pub body: Vec<u8>,
}
