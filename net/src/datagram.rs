use std::{
    io,
    net::SocketAddr,
};

use tokio::{
    net::UdpSocket,
    sync::{
        mpsc,
        Mutex,
    },
};

#[async_trait::async_trait]
pub trait DatagramOps: Sized {
    type Address;

    /// Open a socket that only exchanges datagrams with `remote`.
    async fn connect(local: &Self::Address, remote: &Self::Address) -> io::Result<Self>;
    async fn bind(address: &Self::Address) -> io::Result<Self>;
    fn display_addr(addr: &Self::Address) -> String;
}

#[async_trait::async_trait]
pub trait DatagramReceiver {
    /// Receive one datagram into the front of `packet`. Datagrams longer than `packet` are an
    /// error.
    async fn recv(&self, packet: &mut [u8]) -> io::Result<usize>;
}

#[async_trait::async_trait]
pub trait DatagramSender {
    async fn send(&self, packet: &[u8]) -> io::Result<usize>;
}

#[async_trait::async_trait]
impl DatagramOps for UdpSocket {
    type Address = SocketAddr;

    #[tracing::instrument(err, fields(local = Self::display_addr(local).as_str(), remote = Self::display_addr(remote).as_str()))]
    #[inline]
    async fn connect(local: &SocketAddr, remote: &SocketAddr) -> io::Result<Self> {
        let sock = UdpSocket::bind(local).await?;
        sock.connect(remote).await?;

        Ok(sock)
    }

    #[tracing::instrument(err, fields(address = Self::display_addr(address).as_str()))]
    #[inline]
    async fn bind(address: &Self::Address) -> io::Result<Self> {
        UdpSocket::bind(address).await
    }

    #[inline]
    fn display_addr(addr: &SocketAddr) -> String {
        addr.to_string()
    }
}

#[async_trait::async_trait]
impl DatagramSender for UdpSocket {
    #[tracing::instrument(err, fields(packet.len = packet.len(), self.addr = ?self.local_addr().ok()), skip(packet, self))]
    #[inline]
    async fn send(&self, packet: &[u8]) -> io::Result<usize> {
        self.send(packet).await
    }
}

#[async_trait::async_trait]
impl DatagramReceiver for UdpSocket {
    #[tracing::instrument(err, fields(buf.len = buf.len(), self.addr = ?self.local_addr().ok()), skip(self, buf))]
    #[inline]
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf).await
    }
}

#[async_trait::async_trait]
impl DatagramSender for mpsc::Sender<Vec<u8>> {
    async fn send(&self, packet: &[u8]) -> io::Result<usize> {
        self.send(packet.to_vec())
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e))?;
        Ok(packet.len())
    }
}

#[async_trait::async_trait]
impl DatagramReceiver for Mutex<mpsc::Receiver<Vec<u8>>> {
    async fn recv(&self, packet: &mut [u8]) -> io::Result<usize> {
        let result = {
            let mut lck = self.lock().await;
            lck.recv().await
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionAborted, "remote end of channel closed"))?;

        let capacity = packet.len();
        let dst = packet.get_mut(..result.len()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} byte datagram exceeds {capacity} byte buffer", result.len()),
            )
        })?;

        dst.copy_from_slice(&result);

        Ok(result.len())
    }
}

/// One end of an in-memory datagram link.
#[derive(Debug)]
pub struct Channel {
    tx: mpsc::Sender<Vec<u8>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

/// Two connected in-memory endpoints, each buffering up to `buffer` datagrams.
pub fn channel(buffer: usize) -> (Channel, Channel) {
    let (a_tx, a_rx) = mpsc::channel(buffer);
    let (b_tx, b_rx) = mpsc::channel(buffer);

    let a = Channel {
        tx: a_tx,
        rx: Mutex::new(b_rx),
    };

    let b = Channel {
        tx: b_tx,
        rx: Mutex::new(a_rx),
    };

    (a, b)
}

#[async_trait::async_trait]
impl DatagramSender for Channel {
    #[inline]
    async fn send(&self, packet: &[u8]) -> io::Result<usize> {
        DatagramSender::send(&self.tx, packet).await
    }
}

#[async_trait::async_trait]
impl DatagramReceiver for Channel {
    #[inline]
    async fn recv(&self, packet: &mut [u8]) -> io::Result<usize> {
        self.rx.recv(packet).await
    }
}
