use packed_struct::prelude::*;

use crate::MagicValue;

/// Encoded ROP-frame header length.
pub const SIZE_BYTES: usize = 24;

pub const START_OF_FRAME: u32 = 0x1234_5678;

pub type StartOfFrame = MagicValue<START_OF_FRAME>;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PackedStruct, serde::Serialize, serde::Deserialize,
)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "24", endian = "lsb")]
pub struct FrameHeader {
    #[packed_field(size_bytes = "4")]
    pub startofframe:   StartOfFrame,
    /// Length of the ROP region in bytes.
    pub ropssizeof:     u16,
    pub ropsnumberof:   u16,
    /// Sender timestamp in microseconds.
    pub ageofframe:     u64,
    pub sequencenumber: u64,
}

impl FrameHeader {
    #[inline]
    pub fn new(ropssizeof: u16, ropsnumberof: u16, ageofframe: u64, sequencenumber: u64) -> Self {
        Self {
            startofframe: StartOfFrame::INSTANCE,
            ropssizeof,
            ropsnumberof,
            ageofframe,
            sequencenumber,
        }
    }
}
