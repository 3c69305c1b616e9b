pub use datagram::{
    channel,
    Channel,
    DatagramOps,
    DatagramReceiver,
    DatagramSender,
};

mod datagram;
