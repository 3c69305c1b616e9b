use packed_struct::prelude::*;

use crate::Id32;

/// Encoded ROP header length.
pub const SIZE_BYTES: usize = 8;

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PackedStruct, serde::Serialize, serde::Deserialize,
)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "8", endian = "lsb")]
pub struct RopHeader {
    #[packed_field(size_bytes = "1")]
    pub ctrl: RopCtrl,
    #[packed_field(size_bytes = "1", ty = "enum")]
    pub ropc: RopCode,
    pub dsiz: u16,
    #[packed_field(size_bytes = "4")]
    pub id32: Id32,
}

/// Control byte. On the wire, from the least significant bit: confinfo (2 bits), plustime,
/// plussign, rqsttime, rqstconf, userdefn, version.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PackedStruct, serde::Serialize, serde::Deserialize,
)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "1")]
pub struct RopCtrl {
    /// Must be clear; a set bit denotes a protocol revision this codec does not speak.
    #[packed_field(bits = "0")]
    pub version: bool,

    #[packed_field(bits = "1")]
    pub userdefn: bool,

    #[packed_field(bits = "2")]
    pub rqstconf: bool,

    #[packed_field(bits = "3")]
    pub rqsttime: bool,

    #[packed_field(bits = "4")]
    pub plussign: bool,

    #[packed_field(bits = "5")]
    pub plustime: bool,

    #[packed_field(bits = "6..=7", ty = "enum")]
    pub confinfo: ConfInfo,
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PrimitiveEnum_u8,
    serde::Serialize,
    serde::Deserialize,
    derive_more::Display,
)]
#[repr(u8)]
pub enum RopCode {
    #[display(fmt = "ask")]
    Ask = 1,
    #[display(fmt = "say")]
    Say = 2,
    #[display(fmt = "set")]
    Set = 3,
    #[display(fmt = "sig")]
    Sig = 4,
    #[display(fmt = "rst")]
    Rst = 5,
}

impl RopCode {
    /// Whether a ROP with this code carries the variable's value.
    #[inline]
    pub const fn carries_data(self) -> bool {
        matches!(self, RopCode::Say | RopCode::Set | RopCode::Sig)
    }
}

impl Default for RopCode {
    #[inline]
    fn default() -> Self {
        RopCode::Ask
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PrimitiveEnum_u8,
    serde::Serialize,
    serde::Deserialize,
    derive_more::Display,
)]
#[repr(u8)]
pub enum ConfInfo {
    #[display(fmt = "none")]
    None = 0,
    #[display(fmt = "nak")]
    Nak  = 1,
    #[display(fmt = "ack")]
    Ack  = 2,
}

impl Default for ConfInfo {
    #[inline]
    fn default() -> Self {
        ConfInfo::None
    }
}
