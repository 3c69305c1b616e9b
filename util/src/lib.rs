mod array;
mod build;
mod deque;
mod fifo;
pub mod lock;
mod macros;

pub use array::Array;
pub use build::*;
pub use deque::Deque;
pub use fifo::{
    Fifo,
    FifoWord,
};
pub use lock::{
    LockTimeout,
    Policy,
    Protect,
    Protected,
    Shared,
    Single,
    Timeout,
    Unprotected,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    #[error("container is full")]
    Full,

    #[error("container holds no data")]
    NoData,

    #[error("position {pos} out of bounds (limit {limit})")]
    OutOfBounds { pos: usize, limit: usize },

    #[error("lock not acquired before timeout")]
    Timeout,
}

impl From<LockTimeout> for Error {
    #[inline]
    fn from(_: LockTimeout) -> Self {
        Error::Timeout
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
