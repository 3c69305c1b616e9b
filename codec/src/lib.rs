pub use ::tokio_util::codec as tokio_codec;

mod codec;
pub mod compose;
pub mod frame;
pub mod rop;

pub use self::{
    codec::RopFrameCodec,
    compose::{
        Category,
        FrameComposer,
        FrameSizes,
        Rejected,
    },
    frame::{
        Frame,
        RopFrame,
        Rops,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    PackingError(#[from] packed_struct::PackingError),

    #[error("need {needed} bytes, {available} available")]
    NoSpace { needed: usize, available: usize },

    #[error("rop needs {needed} bytes, {remaining} remain in frame")]
    Truncated { needed: usize, remaining: usize },

    #[error("packet of {0} bytes is shorter than a frame header")]
    ShortFrame(usize),

    #[error("invalid start of frame {0:#010x}")]
    InvalidStartOfFrame(u32),

    #[error("frame declares {declared} bytes of rops, carries {available}")]
    BadRopsSize { declared: usize, available: usize },

    #[error("rop data of {0} bytes does not fit the size field")]
    DataTooLarge(usize),

    #[error("rop uses an unsupported protocol version")]
    UnsupportedVersion,

    #[error("rop of {size} bytes exceeds the per-rop capacity of {capacity}")]
    RopTooLarge { size: usize, capacity: usize },

    #[error("no more than {0} regular rops per frame")]
    TooManyRegulars(usize),

    #[error("invalid frame sizes: {0}")]
    InvalidSizes(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

