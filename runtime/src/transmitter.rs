use std::net::Ipv4Addr;

use codec::{
    Category,
    Frame,
    FrameComposer,
    FrameSizes,
    Rejected,
};
use message::{
    Id32,
    Rop,
};
use util::{
    Policy,
    Timeout,
};

use crate::{
    confman::ConfirmationManager,
    nv::Storage,
    nvset::NvSet,
    seqnum::FIRST_SEQUENCE_NUMBER,
    Error,
    Result,
};

/// A ROP sent in every frame, carrying the current value of the variable `ip` holds for its id32.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Regular {
    ip:  Ipv4Addr,
    rop: Rop,
}

#[derive(Debug)]
pub struct Transmitter {
    composer: FrameComposer,
    regulars: Vec<Regular>,
    sequence: u64,
}

impl Transmitter {
    pub fn new(sizes: FrameSizes) -> Result<Self, codec::Error> {
        Ok(Self {
            composer: FrameComposer::new(sizes)?,
            regulars: Vec::with_capacity(sizes.max_regular_rops),
            sequence: FIRST_SEQUENCE_NUMBER,
        })
    }

    #[inline]
    pub fn sizes(&self) -> &FrameSizes {
        self.composer.sizes()
    }

    /// Sequence number the next frame will carry.
    #[inline]
    pub fn next_sequence_number(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn regulars(&self) -> usize {
        self.regulars.len()
    }

    /// Whether the next frame would carry at least one ROP.
    pub fn has_pending(&self) -> bool {
        !self.regulars.is_empty()
            || [Category::Occasional, Category::Reply]
                .into_iter()
                .any(|c| self.composer.pending(c) > 0)
    }

    /// Send `rop` in every frame from now on, its data refreshed from the variable `ip` holds.
    /// A regular with the same address and id32 is replaced.
    pub fn add_regular(&mut self, ip: Ipv4Addr, rop: Rop) -> Result<()> {
        let size = codec::rop::encoded_len(&rop);
        let capacity = self.sizes().rop;

        if size > capacity {
            return Err(codec::Error::RopTooLarge {
                size,
                capacity,
            }
            .into());
        }

        if let Some(existing) = self.regulars.iter_mut().find(|r| r.ip == ip && r.rop.id32 == rop.id32) {
            existing.rop = rop;
            return Ok(());
        }

        if self.regulars.len() >= self.sizes().max_regular_rops {
            return Err(codec::Error::TooManyRegulars(self.sizes().max_regular_rops).into());
        }

        self.regulars.push(Regular {
            ip,
            rop,
        });

        Ok(())
    }

    pub fn remove_regular(&mut self, ip: Ipv4Addr, id32: Id32) -> bool {
        let before = self.regulars.len();
        self.regulars.retain(|r| !(r.ip == ip && r.rop.id32 == id32));

        before != self.regulars.len()
    }

    #[inline]
    pub fn clear_regulars(&mut self) {
        self.regulars.clear();
    }

    /// Queue a one-shot ROP. If it requests confirmation it is remembered by `confman`.
    pub fn load_occasional<L>(&mut self, rop: Rop, confman: Option<&ConfirmationManager<L>>, timeout: Timeout) -> Result<()>
    where
        L: Policy,
    {
        self.load_occasionals(vec![rop], confman, timeout)
    }

    /// Queue every ROP or none of them.
    pub fn load_occasionals<L>(
        &mut self,
        rops: Vec<Rop>,
        confman: Option<&ConfirmationManager<L>>,
        timeout: Timeout,
    ) -> Result<()>
    where
        L: Policy,
    {
        let requests = match confman {
            Some(_) => rops.iter().filter(|r| r.rqstconf).cloned().collect(),
            None => vec![],
        };

        self.composer.load_all(Category::Occasional, rops)?;

        if let Some(confman) = confman {
            for rop in &requests {
                util::trace_catch!(level: warn, confman.insert_request(rop, timeout), id32 = %rop.id32, "confirmation not tracked");
            }
        }

        Ok(())
    }

    #[inline]
    pub fn load_reply(&mut self, rop: Rop) -> Result<(), Rejected> {
        self.composer.load(Category::Reply, rop)
    }

    /// Compose the next frame: regulars refreshed from `nvset`, then occasionals, then replies.
    /// Confirmation requests are reported as sent to `remote` once the frame exists.
    #[tracing::instrument(level = "debug", skip(self, nvset, confman, timeout), fields(seq = self.sequence), err)]
    pub fn compose<L>(
        &mut self,
        nvset: &NvSet<L>,
        confman: Option<&ConfirmationManager<L>>,
        remote: Ipv4Addr,
        ageofframe: u64,
        timeout: Timeout,
    ) -> Result<Frame>
    where
        L: Policy,
    {
        // Refresh every value before loading any, so a failed read leaves the composer untouched.
        for regular in &mut self.regulars {
            match nvset.get(regular.ip, regular.rop.id32) {
                Some(nv) => regular.rop.data = nv.get(Storage::Volatile, timeout)?,
                None => {
                    tracing::debug!(ip = %regular.ip, id32 = %regular.rop.id32, "regular has no backing variable");
                },
            }
        }

        for regular in &self.regulars {
            if let Err(rejected) = self.composer.load(Category::Regular, regular.rop.clone()) {
                tracing::warn!(reason = %rejected.reason, id32 = %regular.rop.id32, "regular skipped");
            }
        }

        let frame = self.composer.compose(self.sequence, ageofframe).map_err(Error::Codec)?;
        self.sequence = self.sequence.wrapping_add(1);

        if let Some(confman) = confman {
            confman.process_requests(remote, timeout)?;
        }

        Ok(frame)
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            Arc,
            Barrier,
        },
        thread,
        time::Duration,
    };

    use util::{
        Shared,
        Single,
    };

    use super::*;
    use crate::{
        confman::ConfirmationConfig,
        nv::{
            NvRom,
            RwMode,
            UpdatePolicy,
            LOCALHOST,
        },
    };

    const REMOTE: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 1);
    const ID: Id32 = Id32::from_raw(0x0100_0001);

    fn nvset() -> NvSet<Single> {
        let mut nvset = NvSet::new();
        nvset
            .bind(LOCALHOST, 0, ID, Arc::new(NvRom::new(vec![0u8; 4], RwMode::ReadWrite)), false)
            .unwrap();
        nvset
    }

    #[test]
    fn regulars_track_current_value() -> eyre::Result<()> {
        let nvset = nvset();
        let mut tx = Transmitter::new(FrameSizes::default())?;

        assert!(!tx.has_pending());
        tx.add_regular(LOCALHOST, Rop::sig(ID, vec![0u8; 4]))?;
        tx.add_regular(LOCALHOST, Rop::sig(ID, vec![0u8; 4]).with_signature(1))?;
        assert_eq!(tx.regulars(), 1);

        let nv = nvset.get(LOCALHOST, ID).unwrap();
        nv.set(&[9, 9, 9, 9], false, UpdatePolicy::Never, Timeout::Infinite)?;

        let frame = tx.compose(&nvset, None::<&ConfirmationManager<Single>>, REMOTE, 0, Timeout::Infinite)?;
        assert_eq!(frame.sequence_number(), FIRST_SEQUENCE_NUMBER);
        assert_eq!(frame.count(), 1);

        let rops = frame.rops().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(&rops[0].data[..], &[9; 4]);
        assert_eq!(rops[0].signature, Some(1));

        nv.set(&[8, 8, 8, 8], false, UpdatePolicy::Never, Timeout::Infinite)?;

        let frame = tx.compose(&nvset, None::<&ConfirmationManager<Single>>, REMOTE, 0, Timeout::Infinite)?;
        assert_eq!(frame.sequence_number(), FIRST_SEQUENCE_NUMBER + 1);
        assert_eq!(&frame.rops().next().unwrap()?.data[..], &[8; 4]);

        assert!(tx.remove_regular(LOCALHOST, ID));
        assert!(!tx.has_pending());

        Ok(())
    }

    #[test]
    fn failed_refresh_leaves_no_regulars_behind() -> eyre::Result<()> {
        const SLOW: Id32 = Id32::from_raw(0x0100_0002);

        let entered = Arc::new(Barrier::new(2));
        let leave = Arc::new(Barrier::new(2));

        let rom = {
            let (entered, leave) = (entered.clone(), leave.clone());
            NvRom::new(vec![0u8; 4], RwMode::ReadWrite).with_update(move |_, _| {
                entered.wait();
                leave.wait();
            })
        };

        let mut nvset = NvSet::<Shared>::new();
        nvset.bind(LOCALHOST, 0, ID, Arc::new(NvRom::new(vec![0u8; 4], RwMode::ReadWrite)), false)?;
        nvset.bind(LOCALHOST, 0, SLOW, Arc::new(rom), false)?;
        let nvset = Arc::new(nvset);

        let mut tx = Transmitter::new(FrameSizes::default())?;
        tx.add_regular(LOCALHOST, Rop::sig(ID, vec![0u8; 4]))?;
        tx.add_regular(LOCALHOST, Rop::sig(SLOW, vec![0u8; 4]))?;

        let holder = {
            let nvset = nvset.clone();
            thread::spawn(move || {
                nvset
                    .get(LOCALHOST, SLOW)
                    .map(|nv| nv.update(UpdatePolicy::Always, None, Timeout::Infinite))
            })
        };

        entered.wait();

        let none = None::<&ConfirmationManager<Shared>>;
        let failed = tx.compose(&*nvset, none, REMOTE, 0, Timeout::After(Duration::from_millis(5)));
        assert!(matches!(failed, Err(Error::Timeout)));

        leave.wait();
        assert!(matches!(holder.join().unwrap(), Some(Ok(true))));

        let frame = tx.compose(&*nvset, none, REMOTE, 0, Timeout::Infinite)?;
        let ids = frame.rops().map(|r| r.map(|r| r.id32)).collect::<Result<Vec<_>, _>>()?;
        assert_eq!(ids, vec![ID, SLOW]);
        assert_eq!(frame.sequence_number(), FIRST_SEQUENCE_NUMBER);

        Ok(())
    }

    #[test]
    fn regular_limit() -> eyre::Result<()> {
        let mut tx = Transmitter::new(FrameSizes {
            max_regular_rops: 1,
            ..Default::default()
        })?;

        tx.add_regular(LOCALHOST, Rop::sig(ID, vec![0u8; 4]))?;
        assert!(matches!(
            tx.add_regular(LOCALHOST, Rop::sig(Id32::from_raw(2), vec![0u8; 4])),
            Err(Error::Codec(codec::Error::TooManyRegulars(1)))
        ));

        Ok(())
    }

    #[test]
    fn occasional_confirmations_processed_after_compose() -> eyre::Result<()> {
        let nvset = nvset();
        let confman = ConfirmationManager::<Single>::new(ConfirmationConfig::enabled()).unwrap();
        let mut tx = Transmitter::new(FrameSizes::default())?;

        tx.load_occasionals(
            vec![Rop::set(ID, vec![1u8; 4]).request_confirmation(), Rop::ask(ID)],
            Some(&confman),
            Timeout::Infinite,
        )?;
        assert_eq!(confman.pending(Timeout::Infinite)?, 1);

        tx.load_reply(Rop::say(ID, vec![2u8; 4]))?;

        let frame = tx.compose(&nvset, Some(&confman), REMOTE, 42, Timeout::Infinite)?;
        assert_eq!(frame.count(), 3);
        assert_eq!(frame.age(), 42);
        assert_eq!(confman.pending(Timeout::Infinite)?, 0);

        let rops = frame.rops().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rops[2].ropc, message::RopCode::Say);

        Ok(())
    }
}
