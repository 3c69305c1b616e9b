use std::fmt::{
    Display,
    Formatter,
};

use packed_struct::{
    prelude::*,
    PackedStructInfo,
    PackingResult,
};

/// Network-variable identifier: `endpoint | entity | index | tag`, one byte each with the
/// endpoint in the most significant byte.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Id32 {
    val: u32,
}

impl Id32 {
    pub const DUMMY: Id32 = Id32::from_raw(0xffff_ffff);

    #[inline]
    pub const fn new(endpoint: u8, entity: u8, index: u8, tag: u8) -> Self {
        Self::from_raw(u32::from_be_bytes([endpoint, entity, index, tag]))
    }

    #[inline]
    pub const fn from_raw(val: u32) -> Self {
        Self {
            val,
        }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.val
    }

    #[inline]
    pub const fn endpoint(self) -> u8 {
        (self.val >> 24) as u8
    }

    #[inline]
    pub const fn entity(self) -> u8 {
        (self.val >> 16) as u8
    }

    #[inline]
    pub const fn index(self) -> u8 {
        (self.val >> 8) as u8
    }

    #[inline]
    pub const fn tag(self) -> u8 {
        self.val as u8
    }
}

impl From<Id32> for u32 {
    #[inline]
    fn from(id: Id32) -> Self {
        id.val
    }
}

impl From<u32> for Id32 {
    #[inline]
    fn from(val: u32) -> Self {
        Self::from_raw(val)
    }
}

impl PackedStruct for Id32 {
    type ByteArray = [u8; 4];

    #[inline]
    fn pack(&self) -> PackingResult<Self::ByteArray> {
        Ok(self.val.to_le_bytes())
    }

    #[inline]
    fn unpack(src: &Self::ByteArray) -> PackingResult<Self> {
        Ok(Self::from_raw(u32::from_le_bytes(*src)))
    }
}

impl PackedStructInfo for Id32 {
    #[inline]
    fn packed_bits() -> usize {
        std::mem::size_of::<u32>() * 8
    }
}

impl Display for Id32 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.val)
    }
}
