//! Actor running a [`Transceiver`] over a datagram socket.
//!
//! Inbound datagrams arrive as a message stream and are processed as they come. Outbound frames
//! are composed on a fixed period, and only sent when they carry at least one ROP.

use std::{
    io,
    net::Ipv4Addr,
    sync::Arc,
    time::Duration,
};

use actix::{
    fut::ActorFutureExt,
    prelude::*,
};
use bytes::{
    Bytes,
    BytesMut,
};
use codec::{
    tokio_codec::Encoder,
    RopFrameCodec,
};
use futures::prelude::*;
use message::{
    Id32,
    Rop,
};
use net::{
    DatagramReceiver,
    DatagramSender,
};
use util::{
    Single,
    Timeout,
};

use crate::{
    nv::Storage,
    receiver::ReceiverStats,
    transceiver::Transceiver,
    Error,
    Result,
};

/// Largest datagram the node will accept.
const RECV_BUFFER: usize = u16::MAX as usize;

pub struct Node<S> {
    transceiver: Transceiver<Single>,
    socket:      Arc<S>,
    period:      Duration,
    codec:       RopFrameCodec,
}

impl<S> Node<S>
where
    S: DatagramSender + DatagramReceiver + Send + Sync + 'static,
{
    pub fn new(transceiver: Transceiver<Single>, socket: Arc<S>, period: Duration) -> Self {
        Self {
            transceiver,
            socket,
            period,
            codec: RopFrameCodec,
        }
    }

    fn step(&mut self, ctx: &mut Context<Self>) {
        let expired = self.transceiver.tick();
        if expired > 0 {
            tracing::debug!(expired, "proxy requests expired");
        }

        let frame = match self.transceiver.transmit() {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(error = %e, code = ?e.code(), "composing frame");
                return;
            },
        };

        let seq = frame.sequence_number();

        let mut buf = BytesMut::with_capacity(frame.encoded_len());
        if let Err(e) = self.codec.encode(&frame, &mut buf) {
            tracing::error!(error = %e, seq, "encoding frame");
            return;
        }

        tracing::trace!(seq, rops = frame.count(), len = buf.len(), "sending frame");

        let socket = self.socket.clone();
        ctx.spawn(
            fut::wrap_future::<_, Self>(async move { socket.send(&buf).await }).map(move |result, _a, _ctx| {
                util::trace_catch!(result, seq, "sending frame");
            }),
        );
    }
}

/// A datagram off the socket, or the error that ended the stream.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Inbound(io::Result<Bytes>);

impl<S> Actor for Node<S>
where
    S: DatagramSender + DatagramReceiver + Send + Sync + 'static,
{
    type Context = Context<Self>;

    #[tracing::instrument(level = "debug", skip_all, fields(remote = %self.transceiver.remote()))]
    fn started(&mut self, ctx: &mut Self::Context) {
        let packets = stream::try_unfold((self.socket.clone(), BytesMut::new()), |(sock, mut buf)| async move {
            buf.resize(RECV_BUFFER, 0);

            let count = sock.recv(&mut buf[..]).await?;
            let packet = buf.split_to(count).freeze();

            Ok::<_, io::Error>(Some((packet, (sock, buf))))
        })
        .map(Inbound);

        ctx.add_message_stream(packets);
        ctx.run_interval(self.period, |a, ctx| a.step(ctx));

        tracing::info!(period = ?self.period, "node started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(stats = ?self.transceiver.stats(), "node stopped");
    }
}

impl<S> Handler<Inbound> for Node<S>
where
    S: DatagramSender + DatagramReceiver + Send + Sync + 'static,
{
    type Result = ();

    fn handle(&mut self, msg: Inbound, ctx: &mut Self::Context) {
        let packet = match msg.0 {
            Ok(packet) => packet,
            Err(e) => {
                tracing::error!(error = %e, "receiving datagram");
                ctx.stop();
                return;
            },
        };

        let from = self.transceiver.remote();

        match self.transceiver.receive(from, packet) {
            Ok(received) => tracing::trace!(?received, "frame processed"),
            Err(e) => tracing::warn!(error = %e, code = ?e.code(), "frame rejected"),
        }
    }
}

/// Queue one-shot ROPs for the next frame, all or nothing.
#[derive(Clone, Debug, Message)]
#[rtype(result = "Result<()>")]
pub struct LoadOccasional(pub Vec<Rop>);

/// Answer a pending proxied ask. See [`Transceiver::proxy_reply_load`].
#[derive(Clone, Debug, Message)]
#[rtype(result = "Result<()>")]
pub struct ProxyReply {
    pub id32:      Id32,
    pub signature: Option<u32>,
    pub data:      Option<Bytes>,
}

#[derive(Clone, Debug, Message)]
#[rtype(result = "Result<()>")]
pub struct AddRegular {
    pub ip:  Ipv4Addr,
    pub rop: Rop,
}

/// Snapshot the value of the variable `ip` holds for `id32`.
#[derive(Copy, Clone, Debug, Message)]
#[rtype(result = "Result<Bytes>")]
pub struct ReadNv {
    pub ip:   Ipv4Addr,
    pub id32: Id32,
}

#[derive(Copy, Clone, Debug, Message)]
#[rtype(result = "ReceiverStats")]
pub struct Stats;

impl<S> Handler<LoadOccasional> for Node<S>
where
    S: DatagramSender + DatagramReceiver + Send + Sync + 'static,
{
    type Result = Result<()>;

    #[tracing::instrument(level = "debug", skip_all, fields(count = msg.0.len()), err)]
    fn handle(&mut self, msg: LoadOccasional, _ctx: &mut Self::Context) -> Self::Result {
        self.transceiver.load_occasionals(msg.0)
    }
}

impl<S> Handler<ProxyReply> for Node<S>
where
    S: DatagramSender + DatagramReceiver + Send + Sync + 'static,
{
    type Result = Result<()>;

    #[tracing::instrument(level = "debug", skip_all, fields(id32 = %msg.id32), err)]
    fn handle(&mut self, msg: ProxyReply, _ctx: &mut Self::Context) -> Self::Result {
        self.transceiver
            .proxy_reply_load(msg.id32, msg.signature, msg.data.as_deref())
    }
}

impl<S> Handler<AddRegular> for Node<S>
where
    S: DatagramSender + DatagramReceiver + Send + Sync + 'static,
{
    type Result = Result<()>;

    fn handle(&mut self, msg: AddRegular, _ctx: &mut Self::Context) -> Self::Result {
        self.transceiver.add_regular(msg.ip, msg.rop)
    }
}

impl<S> Handler<ReadNv> for Node<S>
where
    S: DatagramSender + DatagramReceiver + Send + Sync + 'static,
{
    type Result = Result<Bytes>;

    fn handle(&mut self, msg: ReadNv, _ctx: &mut Self::Context) -> Self::Result {
        self.transceiver
            .nvset()
            .get(msg.ip, msg.id32)
            .ok_or(Error::UnknownNv {
                ip:   msg.ip,
                id32: msg.id32,
            })?
            .get(Storage::Volatile, Timeout::NONE)
    }
}

impl<S> Handler<Stats> for Node<S>
where
    S: DatagramSender + DatagramReceiver + Send + Sync + 'static,
{
    type Result = MessageResult<Stats>;

    fn handle(&mut self, _msg: Stats, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(*self.transceiver.stats())
    }
}
