use std::{
    cmp::Ordering,
    hash::Hasher,
};

use packed_struct::{
    prelude::*,
    PackedStructInfo,
    PackingResult,
};
use serde::{
    de::Error,
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};

/// A constant 32-bit word that must appear verbatim (little-endian) on the wire.
#[derive(Copy, Clone, Debug, Eq, Ord, Default)]
pub struct MagicValue<const C: u32>;

impl<const C: u32> MagicValue<C> {
    pub const INSTANCE: Self = Self;
    pub const VALUE: u32 = C;
}

impl<const C: u32> PackedStruct for MagicValue<C> {
    type ByteArray = [u8; 4];

    #[inline]
    fn pack(&self) -> PackingResult<Self::ByteArray> {
        Ok(C.to_le_bytes())
    }

    #[tracing::instrument(err(Display))]
    fn unpack(src: &Self::ByteArray) -> PackingResult<Self> {
        let got = u32::from_le_bytes(*src);

        if got == C {
            Ok(Self)
        } else {
            tracing::error!(expected = %format_args!("{C:#010x}"), got = %format_args!("{got:#010x}"), "invalid magic value");
            Err(PackingError::InvalidValue)
        }
    }
}

impl<const C: u32> PackedStructInfo for MagicValue<C> {
    #[inline]
    fn packed_bits() -> usize {
        std::mem::size_of::<u32>() * 8
    }
}

impl<const C: u32, const D: u32> PartialEq<MagicValue<D>> for MagicValue<C> {
    #[inline]
    fn eq(&self, _other: &MagicValue<D>) -> bool {
        C == D
    }
}

impl<const C: u32, const D: u32> PartialOrd<MagicValue<D>> for MagicValue<C> {
    fn partial_cmp(&self, _other: &MagicValue<D>) -> Option<Ordering> {
        C.partial_cmp(&D)
    }
}

impl<const C: u32> std::hash::Hash for MagicValue<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        C.hash(state)
    }
}

impl<const C: u32> Serialize for MagicValue<C> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(C)
    }
}

impl<'de, const C: u32> Deserialize<'de> for MagicValue<C> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let val = u32::deserialize(deserializer)?;

        if val != C {
            return Err(Error::custom(format!(
                "magic value mismatch (expected: {C:#x}, got: {val:#x})"
            )));
        }

        Ok(MagicValue)
    }
}
