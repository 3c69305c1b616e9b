pub mod agent;
pub mod clock;
pub mod confman;
mod error;
pub mod node;
pub mod nv;
pub mod nvset;
pub mod proxy;
pub mod receiver;
pub mod seqnum;
pub mod transceiver;
pub mod transmitter;

pub use clock::{
    Clock,
    ManualClock,
    SystemClock,
};
pub use error::{
    Error,
    ErrorKind,
    Result,
};
pub use node::Node;
pub use nv::{
    Nv,
    NvRom,
    RwMode,
    Storage,
    UpdatePolicy,
    LOCALHOST,
};
pub use nvset::{
    BoardConfig,
    EndpointConfig,
    NvDescriptor,
    NvSet,
};
pub use transceiver::{
    Transceiver,
    TransceiverConfig,
};
