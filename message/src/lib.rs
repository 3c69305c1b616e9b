pub mod error_code;
pub mod frame_header;
pub mod header;
mod id32;
mod magic_value;
mod rop;

pub use error_code::ErrorCode;
pub use frame_header::FrameHeader;
pub use header::{
    ConfInfo,
    RopCode,
    RopCtrl,
    RopHeader,
};
pub use id32::Id32;
pub use magic_value::MagicValue;
pub use rop::Rop;

/// Round `n` up to the next multiple of four.
#[inline]
pub const fn align4(n: usize) -> usize {
    (n + 3) & !3
}
