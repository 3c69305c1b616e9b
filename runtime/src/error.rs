use std::net::Ipv4Addr;

use message::{
    error_code::System,
    ErrorCode,
    Id32,
    RopCode,
};
use util::LockTimeout;

/// Coarse classification used by callers deciding whether to retry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Capacity exhausted; retry later.
    Busy,
    Timeout,
    NoData,
    /// Policy violation or malformed input. Retrying the same operation will not help.
    Generic,
    /// Misconfiguration detected before any traffic flows.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("capacity exhausted")]
    Full,

    #[error("lock not acquired before timeout")]
    Timeout,

    #[error("no data available")]
    NoData,

    #[error("network variable {0} is not writable")]
    ReadOnly(Id32),

    #[error("{got} bytes offered to network variable {id32} of capacity {capacity}")]
    SizeMismatch { id32: Id32, capacity: usize, got: usize },

    #[error("no network variable {id32} bound for {ip}")]
    UnknownNv { ip: Ipv4Addr, id32: Id32 },

    #[error("network variable {id32} already bound for {ip}")]
    AlreadyBound { ip: Ipv4Addr, id32: Id32 },

    #[error("confirmation request for {0} dropped: queue full")]
    ConfirmationDropped(Id32),

    #[error("network variable {0} is not proxied")]
    NotProxied(Id32),

    #[error("{0} rops cannot be forwarded")]
    NotForwardable(RopCode),

    #[error("no pending proxy request for {0}")]
    Unmatched(Id32),

    #[error("invalid frame")]
    InvalidFrame(#[source] codec::Error),

    #[error("malformed rop after {processed} processed")]
    Malformed {
        processed: usize,
        #[source]
        source:    codec::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Rejected(#[from] codec::Rejected),

    #[error(transparent)]
    Codec(#[from] codec::Error),
}

impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        match e {
            util::Error::Full | util::Error::OutOfBounds { .. } => Error::Full,
            util::Error::NoData => Error::NoData,
            util::Error::Timeout => Error::Timeout,
        }
    }
}

impl From<LockTimeout> for Error {
    #[inline]
    fn from(_: LockTimeout) -> Self {
        Error::Timeout
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Full | Error::Rejected(_) => ErrorKind::Busy,
            Error::Timeout => ErrorKind::Timeout,
            Error::NoData => ErrorKind::NoData,
            Error::Config(_) => ErrorKind::Fatal,
            _ => ErrorKind::Generic,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        let value = match self {
            Error::Timeout => System::MutexTimeout,
            Error::ReadOnly(_) => System::WrongUsage,
            Error::SizeMismatch { .. } => System::WrongParam,
            Error::ConfirmationDropped(_) => System::ConfirmationRequestDropped,
            Error::NotProxied(_) | Error::NotForwardable(_) => System::ProxyForwardFails,
            Error::Unmatched(_) => System::ProxyRopDescriptorNotFound,
            Error::InvalidFrame(_) => System::TransceiverRxInvalidFrame,
            Error::Malformed { .. } => System::RopParsingError,
            Error::Config(_) => System::WrongParam,
            _ => return None,
        };

        Some(ErrorCode::system(value))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
