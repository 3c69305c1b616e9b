//! The transceiver ties the NV-Set to the wire: it owns the receiver, the transmitter and the
//! optional confirmation and proxy subsystems, and is the single entry point a node drives.

use std::{
    fmt,
    net::Ipv4Addr,
    sync::Arc,
};

use bytes::Bytes;
use codec::{
    Frame,
    FrameSizes,
};
use message::{
    Id32,
    Rop,
};
use util::{
    Policy,
    Single,
    Timeout,
};

use crate::{
    agent::Agent,
    clock::Clock,
    confman::{
        ConfirmationConfig,
        ConfirmationManager,
    },
    nv::LOCALHOST,
    nvset::NvSet,
    proxy::{
        Proxy,
        ProxyConfig,
        ProxyParams,
    },
    receiver::{
        InvalidFrameFn,
        Received,
        Receiver,
        ReceiverStats,
        SequenceErrorFn,
    },
    seqnum::Continuity,
    transmitter::Transmitter,
    Error,
    Result,
};

pub struct TransceiverConfig {
    /// Peer the composed frames are addressed to.
    pub remote:            Ipv4Addr,
    pub sizes:             FrameSizes,
    pub confirmation:      ConfirmationConfig,
    pub proxy:             ProxyConfig,
    /// Lock acquisition timeout for every NV and queue access.
    pub lock_timeout:      Timeout,
    pub on_sequence_error: Option<SequenceErrorFn>,
    pub on_invalid_frame:  Option<InvalidFrameFn>,
}

impl TransceiverConfig {
    pub fn new(remote: Ipv4Addr) -> Self {
        Self {
            remote,
            sizes: FrameSizes::default(),
            confirmation: ConfirmationConfig::default(),
            proxy: ProxyConfig::default(),
            lock_timeout: Timeout::Infinite,
            on_sequence_error: None,
            on_invalid_frame: None,
        }
    }

    pub fn on_sequence_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Ipv4Addr, Continuity) + Send + Sync + 'static,
    {
        self.on_sequence_error = Some(Box::new(f));
        self
    }

    pub fn on_invalid_frame<F>(mut self, f: F) -> Self
    where
        F: Fn(Ipv4Addr, &codec::Error) + Send + Sync + 'static,
    {
        self.on_invalid_frame = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for TransceiverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransceiverConfig")
            .field("remote", &self.remote)
            .field("sizes", &self.sizes)
            .field("confirmation", &self.confirmation)
            .field("proxy", &self.proxy)
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

pub struct Transceiver<L: Policy = Single> {
    remote:      Ipv4Addr,
    timeout:     Timeout,
    nvset:       NvSet<L>,
    receiver:    Receiver,
    transmitter: Transmitter,
    confman:     Option<ConfirmationManager<L>>,
    proxy:       Option<Proxy>,
    clock:       Arc<dyn Clock>,
}

impl<L> Transceiver<L>
where
    L: Policy,
{
    #[tracing::instrument(skip_all, fields(remote = %config.remote), err)]
    pub fn new(config: TransceiverConfig, nvset: NvSet<L>, clock: Arc<dyn Clock>) -> Result<Self> {
        let transmitter = Transmitter::new(config.sizes).map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            remote: config.remote,
            timeout: config.lock_timeout,
            nvset,
            receiver: Receiver::new(config.on_sequence_error, config.on_invalid_frame),
            transmitter,
            confman: ConfirmationManager::new(config.confirmation),
            proxy: Proxy::new(config.proxy),
            clock,
        })
    }

    #[inline]
    pub fn remote(&self) -> Ipv4Addr {
        self.remote
    }

    #[inline]
    pub fn nvset(&self) -> &NvSet<L> {
        &self.nvset
    }

    #[inline]
    pub fn nvset_mut(&mut self) -> &mut NvSet<L> {
        &mut self.nvset
    }

    #[inline]
    pub fn stats(&self) -> &ReceiverStats {
        self.receiver.stats()
    }

    #[inline]
    pub fn confirmations(&self) -> Option<&ConfirmationManager<L>> {
        self.confman.as_ref()
    }

    #[inline]
    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    /// Process one datagram received from `from`.
    pub fn receive(&mut self, from: Ipv4Addr, packet: Bytes) -> Result<Received> {
        let mut agent = Agent {
            nvset:   &self.nvset,
            confman: self.confman.as_ref(),
            proxy:   self.proxy.as_mut(),
            now:     self.clock.now(),
            timeout: self.timeout,
        };

        self.receiver.receive(from, packet, &mut agent, &mut self.transmitter)
    }

    /// Compose the next outbound frame. `None` when there is nothing to send; no sequence number
    /// is consumed in that case.
    pub fn transmit(&mut self) -> Result<Option<Frame>> {
        if !self.transmitter.has_pending() {
            return Ok(None);
        }

        let frame = self.transmitter.compose(
            &self.nvset,
            self.confman.as_ref(),
            self.remote,
            self.clock.micros(),
            self.timeout,
        )?;

        Ok(Some(frame))
    }

    #[inline]
    pub fn load_occasional(&mut self, rop: Rop) -> Result<()> {
        self.transmitter.load_occasional(rop, self.confman.as_ref(), self.timeout)
    }

    #[inline]
    pub fn load_occasionals(&mut self, rops: Vec<Rop>) -> Result<()> {
        self.transmitter.load_occasionals(rops, self.confman.as_ref(), self.timeout)
    }

    /// Emit `rop` in every frame, refreshed from the variable `ip` holds.
    #[inline]
    pub fn add_regular(&mut self, ip: Ipv4Addr, rop: Rop) -> Result<()> {
        self.transmitter.add_regular(ip, rop)
    }

    #[inline]
    pub fn remove_regular(&mut self, ip: Ipv4Addr, id32: Id32) -> bool {
        self.transmitter.remove_regular(ip, id32)
    }

    #[inline]
    pub fn clear_regulars(&mut self) {
        self.transmitter.clear_regulars();
    }

    pub fn proxy_params(&mut self, id32: Id32) -> Option<&mut ProxyParams> {
        self.proxy.as_mut()?.params(id32)
    }

    /// Answer a pending proxied ask for the local variable `id32`. The resulting `say` goes out
    /// with the next frame as an occasional ROP.
    pub fn proxy_reply_load(&mut self, id32: Id32, signature: Option<u32>, data: Option<&[u8]>) -> Result<()> {
        let proxy = self.proxy.as_mut().ok_or(Error::NotProxied(id32))?;

        let nv = self.nvset.get(LOCALHOST, id32).ok_or(Error::UnknownNv {
            ip: LOCALHOST,
            id32,
        })?;

        let say = proxy.reply_load(nv, signature, data, self.clock.now(), self.timeout)?;

        self.transmitter
            .load_occasional::<L>(say, None, self.timeout)
            .map_err(|e| {
                tracing::warn!(%id32, error = %e, "proxy reply lost");
                e
            })
    }

    /// Periodic housekeeping. Returns the number of expired proxy requests.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        self.proxy.as_mut().map_or(0, |p| p.tick(now))
    }
}

impl<L> fmt::Debug for Transceiver<L>
where
    L: Policy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transceiver")
            .field("remote", &self.remote)
            .field("nvs", &self.nvset.len())
            .field("receiver", &self.receiver)
            .field("transmitter", &self.transmitter)
            .field("confirmations", &self.confman.is_some())
            .field("proxy", &self.proxy)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    };

    use message::{
        ConfInfo,
        RopCode,
    };

    use super::*;
    use crate::{
        clock::ManualClock,
        nv::{
            NvRom,
            RwMode,
            Storage,
        },
        proxy::ProxyConfig,
    };

    const HOST: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 104);
    const ID: Id32 = Id32::from_raw(0x0100_0001);

    fn transceiver(config: TransceiverConfig, proxied: bool) -> (Transceiver<Single>, ManualClock) {
        let mut nvset = NvSet::new();
        nvset
            .bind(LOCALHOST, 0, ID, Arc::new(NvRom::new(vec![0u8; 4], RwMode::ReadWrite)), proxied)
            .unwrap();

        let clock = ManualClock::default();
        let t = Transceiver::new(config, nvset, Arc::new(clock.clone())).unwrap();

        (t, clock)
    }

    fn packet(seq: u64, rops: &[Rop]) -> Bytes {
        let mut composer = codec::FrameComposer::new(FrameSizes::default()).unwrap();
        composer.load_all(codec::Category::Occasional, rops.to_vec()).unwrap();
        composer.compose(seq, 0).unwrap().to_bytes().unwrap()
    }

    #[test]
    fn invalid_configuration_is_fatal() {
        let config = TransceiverConfig {
            sizes: FrameSizes {
                rop: 0,
                ..Default::default()
            },
            ..TransceiverConfig::new(HOST)
        };

        let result = Transceiver::<Single>::new(config, NvSet::new(), Arc::new(ManualClock::default()));
        assert!(matches!(result, Err(ref e) if e.kind() == crate::ErrorKind::Fatal));
    }

    #[test]
    fn ask_is_answered_in_next_frame() -> eyre::Result<()> {
        let (mut t, clock) = transceiver(TransceiverConfig::new(HOST), false);
        clock.set(std::time::Duration::from_millis(5));

        assert!(t.transmit()?.is_none());

        let received = t.receive(HOST, packet(1, &[Rop::ask(ID).with_signature(3)]))?;
        assert_eq!(received.rops, 1);
        assert_eq!(received.replies, 1);
        assert!(received.continuity.is_ok());

        let frame = t.transmit()?.unwrap();
        assert_eq!(frame.sequence_number(), 1);
        assert_eq!(frame.age(), 5_000);

        let say = frame.rops().next().unwrap()?;
        assert_eq!(say.ropc, RopCode::Say);
        assert_eq!(say.signature, Some(3));

        assert!(t.transmit()?.is_none());

        Ok(())
    }

    #[test]
    fn bad_frames_are_counted() {
        let invalid = Arc::new(AtomicUsize::new(0));
        let sequence = Arc::new(AtomicUsize::new(0));
        let (i, s) = (invalid.clone(), sequence.clone());

        let config = TransceiverConfig::new(HOST)
            .on_invalid_frame(move |_, _| {
                i.fetch_add(1, Ordering::SeqCst);
            })
            .on_sequence_error(move |_, _| {
                s.fetch_add(1, Ordering::SeqCst);
            });

        let (mut t, _) = transceiver(config, false);

        let mut garbage = packet(1, &[]).to_vec();
        garbage[0] ^= 0xff;
        assert!(matches!(t.receive(HOST, garbage.into()), Err(Error::InvalidFrame(_))));

        t.receive(HOST, packet(1, &[])).unwrap();
        t.receive(HOST, packet(3, &[])).unwrap();

        assert_eq!(invalid.load(Ordering::SeqCst), 1);
        assert_eq!(sequence.load(Ordering::SeqCst), 1);
        assert_eq!(t.stats().invalid_frames, 1);
        assert_eq!(t.stats().sequence_errors, 1);
    }

    #[test]
    fn malformed_rop_stops_processing() -> eyre::Result<()> {
        let (mut t, _) = transceiver(TransceiverConfig::new(HOST), false);

        let good = packet(1, &[Rop::set(ID, vec![6u8; 4]), Rop::ask(ID)]);
        let mut bad = good.to_vec();

        // Corrupt the opcode of the second rop.
        let second = message::frame_header::SIZE_BYTES + codec::rop::encoded_len(&Rop::set(ID, vec![6u8; 4]));
        bad[second + 1] = 0;

        let result = t.receive(HOST, bad.into());
        assert!(matches!(result, Err(Error::Malformed { processed: 1, .. })));
        assert_eq!(&t.nvset().get(LOCALHOST, ID).unwrap().get(Storage::Volatile, Timeout::Infinite)?[..], &[6; 4]);
        assert_eq!(t.stats().malformed, 1);

        Ok(())
    }

    #[test]
    fn proxied_ask_round_trip() -> eyre::Result<()> {
        let config = TransceiverConfig {
            proxy: ProxyConfig::enabled(),
            ..TransceiverConfig::new(HOST)
        };
        let (mut t, clock) = transceiver(config, true);

        let received = t.receive(HOST, packet(1, &[Rop::ask(ID).with_signature(9)]))?;
        assert_eq!(received.replies, 0);
        assert!(t.transmit()?.is_none());

        t.proxy_params(ID).unwrap().expected = 1;
        t.proxy_reply_load(ID, Some(9), Some(&[1, 1, 1, 1]))?;

        let say = t.transmit()?.unwrap().rops().next().unwrap()?;
        assert_eq!(&say.data[..], &[1; 4]);
        assert_eq!(say.signature, Some(9));

        t.receive(HOST, packet(2, &[Rop::ask(ID)]))?;
        clock.advance(ProxyConfig::DEFAULT_REPLY_TIMEOUT + std::time::Duration::from_millis(1));
        assert_eq!(t.tick(), 1);
        assert!(matches!(t.proxy_reply_load(ID, None, None), Err(Error::Unmatched(_))));

        Ok(())
    }

    #[test]
    fn confirmation_requests_reach_callbacks() -> eyre::Result<()> {
        let requested = Arc::new(AtomicUsize::new(0));
        let r = requested.clone();

        let config = TransceiverConfig {
            confirmation: ConfirmationConfig::enabled().on_requested(move |to, _| {
                assert_eq!(to, HOST);
                r.fetch_add(1, Ordering::SeqCst);
            }),
            ..TransceiverConfig::new(HOST)
        };
        let (mut t, _) = transceiver(config, false);

        t.load_occasional(Rop::set(ID, vec![2u8; 4]).request_confirmation())?;
        t.transmit()?.unwrap();
        assert_eq!(requested.load(Ordering::SeqCst), 1);

        let ack = Rop::set(ID, vec![2u8; 4]).confirmation(ConfInfo::Ack);
        let received = t.receive(HOST, packet(1, &[ack]))?;
        assert_eq!(received.replies, 0);

        Ok(())
    }
}
