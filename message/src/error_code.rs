//! Numeric error codes reported by transport components.
//!
//! A code packs a category in the top byte and a category-specific value in the low 24 bits.
//! Only the system category carries named values here; other categories round-trip as raw
//! numbers.

use std::fmt::{
    Display,
    Formatter,
};

use packed_struct::{
    prelude::*,
    PrimitiveEnum,
};

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
pub enum Category {
    #[display(fmt = "SYS")]
    System        = 0,
    #[display(fmt = "HW")]
    HardWare      = 1,
    #[display(fmt = "MC")]
    MotionControl = 2,
    #[display(fmt = "SK")]
    Skin          = 3,
    #[display(fmt = "DEB")]
    Debug         = 4,
    #[display(fmt = "CFG")]
    Config        = 5,
    #[display(fmt = "ETHMON")]
    EthMonitor    = 6,
}

macro_rules! system_values {
    ($( $name:ident = $val:literal => $desc:literal, )*) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[repr(u32)]
        pub enum System {
            $( $name = $val, )*
        }

        impl System {
            pub fn from_value(val: u32) -> Option<Self> {
                match val {
                    $( $val => Some(System::$name), )*
                    _ => None,
                }
            }

            pub const fn description(self) -> &'static str {
                match self {
                    $( System::$name => $desc, )*
                }
            }
        }
    };
}

system_values! {
    Unspecified                  = 0  => "unspecified",
    MemoryMissing                = 4  => "memory missing",
    MutexTimeout                 = 5  => "mutex timeout",
    WrongParam                   = 6  => "wrong parameter",
    WrongUsage                   = 7  => "wrong usage",
    RuntimeError                 = 8  => "runtime error",
    UdpTxFailure                 = 14 => "udp transmission failure",
    RopParsingError              = 15 => "rop parsing error",
    HalError                     = 16 => "hal error",
    ProxyForwardOk               = 39 => "proxy forward ok",
    ProxyForwardFails            = 40 => "proxy forward fails",
    ProxyForwardCallbackFails    = 41 => "proxy forward callback fails",
    ProxyReplyOk                 = 42 => "proxy reply ok",
    ProxyReplyFails              = 43 => "proxy reply fails",
    ProxyRopDescriptorNotFound   = 44 => "proxy rop descriptor not found",
    ConfirmationRequestDropped   = 45 => "confirmation request dropped",
    TransceiverRxSeqnumberError  = 48 => "rx sequence number error",
    TransceiverRxSeqnumberRestarted = 52 => "rx sequence number restarted",
    TransceiverRxInvalidFrame    = 56 => "rx invalid frame",
    TransceiverReplyLost         = 57 => "reply rop lost",
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ErrorCode(u32);

impl ErrorCode {
    const VALUE_MASK: u32 = 0x00ff_ffff;

    #[inline]
    pub const fn new(category: Category, value: u32) -> Self {
        Self(((category as u32) << 24) | (value & Self::VALUE_MASK))
    }

    #[inline]
    pub const fn system(value: System) -> Self {
        Self::new(Category::System, value as u32)
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn category(self) -> Option<Category> {
        Category::from_primitive((self.0 >> 24) as u8)
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.0 & Self::VALUE_MASK
    }

    pub fn description(self) -> Option<&'static str> {
        match self.category()? {
            Category::System => System::from_value(self.value()).map(System::description),
            _ => None,
        }
    }
}

impl From<System> for ErrorCode {
    #[inline]
    fn from(value: System) -> Self {
        ErrorCode::system(value)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.category(), self.description()) {
            (Some(cat), Some(desc)) => write!(f, "{cat}: {desc}"),
            (Some(cat), None) => write!(f, "{cat}: value {}", self.value()),
            (None, _) => write!(f, "unknown error code {:#010x}", self.0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn packing() {
        let code = ErrorCode::system(System::TransceiverRxSeqnumberError);

        assert_eq!(code.raw(), 48);
        assert_eq!(code.category(), Some(Category::System));
        assert_eq!(code.to_string(), "SYS: rx sequence number error");

        let code = ErrorCode::new(Category::Config, 0x0100_0003);
        assert_eq!(code.raw(), 0x0500_0003);
        assert_eq!(code.value(), 3);
        assert_eq!(code.to_string(), "CFG: value 3");
    }

    #[test]
    fn unknown_category() {
        let code = ErrorCode::from_raw(0xff00_0001);

        assert_eq!(code.category(), None);
        assert_eq!(code.description(), None);
        assert!(code.to_string().starts_with("unknown"));
    }
}
