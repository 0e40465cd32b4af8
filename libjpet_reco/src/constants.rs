// HLD data sizes (bytes)
pub const FILE_HEADER_SIZE: usize = 32;
pub const HEADER_SIZE: usize = 32;
pub const SUBHEADER_SIZE: usize = 16;
pub const WORD_SIZE: usize = 4;
pub const ALIGNMENT: usize = 8;

// Subheader decoding word as it appears when the file needs byte swapping
// (0x00020001 read in the opposite order)
pub const INVERTED_DECODING: u32 = 16_777_728;

// Stop reading a file when fewer than this many bytes remain
pub const END_OF_FILE_MARGIN: u64 = 500;

// TDC data word layout
pub const WORD_HEADER_SHIFT: u32 = 29;
pub const WORD_HEADER_EPOCH: u32 = 3;
pub const WORD_HEADER_TIME_DATA: u32 = 4;
pub const EPOCH_MASK: u32 = 0x0fff_ffff;
pub const CHANNEL_SHIFT: u32 = 22;
pub const CHANNEL_MASK: u32 = 0x7f;
pub const FINE_SHIFT: u32 = 12;
pub const FINE_MASK: u32 = 0x3ff;
pub const EDGE_SHIFT: u32 = 11;
pub const COARSE_MASK: u32 = 0x7ff;
pub const BLOCK_SIZE_SHIFT: u32 = 16;
pub const BLOCK_ADDRESS_MASK: u32 = 0xffff;

// Fine counter value flagging an invalid sample
pub const INVALID_FINE: u32 = 0x3ff;
pub const REFERENCE_CHANNEL: u8 = 0;

// TDC clock: 5 ns coarse period, 2048 coarse counts per epoch
pub const COARSE_PERIOD_NS: f64 = 5.0;
pub const COARSE_COUNTS_PER_EPOCH: f64 = 2048.0;
pub const UNCORRECTED_FINE_SCALE: u32 = 10;

// MC unit conversions (GATE native units -> framework units)
pub const SECONDS_TO_PICOSECONDS: f64 = 1.0e12;
pub const MEV_TO_KEV: f64 = 1.0e3;
pub const MM_TO_CM: f64 = 0.1;

// Calibration histogram names
pub const TOT_CALIBRATION_NAME: &str = "stretcher_offsets";
pub const TDC_CALIBRATION_PREFIX: &str = "correction";

// Progress is reported every PROGRESS_FRACTION of the input size
pub const PROGRESS_FRACTION: f32 = 0.01;
