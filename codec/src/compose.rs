use bytes::BytesMut;
use message::{
    frame_header,
    Rop,
};

use crate::{
    rop,
    Error,
    Frame,
    RopFrame,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Category {
    Regular,
    Occasional,
    Reply,
}

/// Byte budgets of an outgoing frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameSizes {
    pub packet:           usize,
    /// Largest single encoded ROP.
    pub rop:              usize,
    pub regulars:         usize,
    pub occasionals:      usize,
    pub replies:          usize,
    pub max_regular_rops: usize,
}

impl Default for FrameSizes {
    fn default() -> Self {
        Self {
            packet:           512,
            rop:              96,
            regulars:         128,
            occasionals:      256,
            replies:          104,
            max_regular_rops: 4,
        }
    }
}

impl FrameSizes {
    pub fn validate(&self) -> Result<(), Error> {
        if [self.packet, self.rop, self.regulars, self.occasionals, self.replies].contains(&0) {
            return Err(Error::InvalidSizes("capacities must be nonzero"));
        }

        if frame_header::SIZE_BYTES + self.regulars + self.occasionals + self.replies > self.packet {
            return Err(Error::InvalidSizes("header and categories exceed the packet capacity"));
        }

        if self.packet - frame_header::SIZE_BYTES > u16::MAX as usize {
            return Err(Error::InvalidSizes("rop region exceeds the frame size field"));
        }

        if self.rop > self.regulars.min(self.occasionals).min(self.replies) {
            return Err(Error::InvalidSizes("a single rop must fit every category"));
        }

        Ok(())
    }

    #[inline]
    pub fn category(&self, category: Category) -> usize {
        match category {
            Category::Regular => self.regulars,
            Category::Occasional => self.occasionals,
            Category::Reply => self.replies,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{} {category} rop(s) rejected: {reason}", rops.len())]
pub struct Rejected {
    pub category: Category,
    /// The ROPs that were not written, in the order they were offered.
    pub rops:     Vec<Rop>,
    #[source]
    pub reason:   Error,
}

/// Accumulates outgoing ROPs by category and emits them as one frame.
#[derive(Debug)]
pub struct FrameComposer {
    sizes:       FrameSizes,
    regulars:    RopFrame,
    occasionals: RopFrame,
    replies:     RopFrame,
}

impl FrameComposer {
    pub fn new(sizes: FrameSizes) -> Result<Self, Error> {
        sizes.validate()?;

        Ok(Self {
            sizes,
            regulars: RopFrame::with_capacity(sizes.regulars),
            occasionals: RopFrame::with_capacity(sizes.occasionals),
            replies: RopFrame::with_capacity(sizes.replies),
        })
    }

    #[inline]
    pub fn sizes(&self) -> &FrameSizes {
        &self.sizes
    }

    #[inline]
    fn frame(&self, category: Category) -> &RopFrame {
        match category {
            Category::Regular => &self.regulars,
            Category::Occasional => &self.occasionals,
            Category::Reply => &self.replies,
        }
    }

    #[inline]
    fn frame_mut(&mut self, category: Category) -> &mut RopFrame {
        match category {
            Category::Regular => &mut self.regulars,
            Category::Occasional => &mut self.occasionals,
            Category::Reply => &mut self.replies,
        }
    }

    #[inline]
    pub fn pending(&self, category: Category) -> u16 {
        self.frame(category).count()
    }

    #[inline]
    pub fn pending_bytes(&self, category: Category) -> usize {
        self.frame(category).len()
    }

    /// Check that `rops` could be appended to `category` as a whole.
    fn admit<'a>(&self, category: Category, rops: impl IntoIterator<Item = &'a Rop>) -> Result<(), Error> {
        let frame = self.frame(category);

        let mut total = 0;
        let mut count = 0;

        for r in rops {
            let size = rop::encoded_len(r);

            if size > self.sizes.rop {
                return Err(Error::RopTooLarge {
                    size,
                    capacity: self.sizes.rop,
                });
            }

            total += size;
            count += 1;
        }

        if category == Category::Regular && frame.count() as usize + count > self.sizes.max_regular_rops {
            return Err(Error::TooManyRegulars(self.sizes.max_regular_rops));
        }

        if total > frame.remaining() {
            return Err(Error::NoSpace {
                needed:    total,
                available: frame.remaining(),
            });
        }

        Ok(())
    }

    pub fn load(&mut self, category: Category, rop: Rop) -> Result<(), Rejected> {
        self.load_all(category, vec![rop])
    }

    /// Append every ROP or none of them. On failure all offered ROPs are handed back.
    #[tracing::instrument(level = "trace", skip(self, rops), fields(count = rops.len()), err)]
    pub fn load_all(&mut self, category: Category, rops: Vec<Rop>) -> Result<(), Rejected> {
        if let Err(reason) = self.admit(category, &rops) {
            return Err(Rejected {
                category,
                rops,
                reason,
            });
        }

        let frame = self.frame_mut(category);
        let mark = frame.mark();

        if let Err(reason) = rops.iter().try_for_each(|r| frame.push(r).map(drop)) {
            frame.rollback(mark);

            return Err(Rejected {
                category,
                rops,
                reason,
            });
        }

        Ok(())
    }

    #[inline]
    pub fn clear(&mut self, category: Category) {
        self.frame_mut(category).clear();
    }

    /// Emit regular, occasional and reply ROPs (in that order) as one frame and empty every
    /// category.
    #[tracing::instrument(level = "trace", skip(self), err)]
    pub fn compose(&mut self, sequencenumber: u64, ageofframe: u64) -> Result<Frame, Error> {
        let parts = [&self.regulars, &self.occasionals, &self.replies];

        let len = parts.iter().map(|p| p.len()).sum::<usize>();
        let count = parts.iter().map(|p| p.count() as usize).sum::<usize>();

        if frame_header::SIZE_BYTES + len > self.sizes.packet {
            return Err(Error::NoSpace {
                needed:    frame_header::SIZE_BYTES + len,
                available: self.sizes.packet,
            });
        }

        let count = u16::try_from(count).map_err(|_| Error::InvalidSizes("too many rops for one frame"))?;

        let mut rops = BytesMut::with_capacity(len);
        parts.iter().for_each(|p| rops.extend_from_slice(p.as_bytes()));

        let frame = Frame::new(sequencenumber, ageofframe, rops.freeze(), count)?;

        self.regulars.clear();
        self.occasionals.clear();
        self.replies.clear();

        Ok(frame)
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use message::Id32;
    use proptest::prelude::*;

    use super::*;

    fn id(tag: u8) -> Id32 {
        Id32::new(1, 0, 0, tag)
    }

    #[test]
    fn default_sizes_are_valid() {
        assert!(FrameSizes::default().validate().is_ok());

        let too_big = FrameSizes {
            occasionals: 512,
            ..Default::default()
        };
        assert!(too_big.validate().is_err());

        let zero = FrameSizes {
            replies: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn regular_limit() -> eyre::Result<()> {
        let mut composer = FrameComposer::new(FrameSizes {
            max_regular_rops: 2,
            ..Default::default()
        })?;

        composer.load(Category::Regular, Rop::sig(id(0), vec![0u8; 4]))?;
        composer.load(Category::Regular, Rop::sig(id(1), vec![0u8; 4]))?;

        let rejected = composer.load(Category::Regular, Rop::sig(id(2), vec![0u8; 4])).unwrap_err();
        assert!(matches!(rejected.reason, Error::TooManyRegulars(2)));
        assert_eq!(rejected.rops, vec![Rop::sig(id(2), vec![0u8; 4])]);

        assert_eq!(composer.pending(Category::Regular), 2);

        Ok(())
    }

    #[test]
    fn load_all_is_all_or_nothing() -> eyre::Result<()> {
        let mut composer = FrameComposer::new(FrameSizes::default())?;

        composer.load(Category::Reply, Rop::ask(id(9)))?;

        // 104 byte reply budget: 8 used, 12 * 8 = 96 fits exactly, 13 do not
        let batch = (0..13).map(|t| Rop::ask(id(t))).collect::<Vec<_>>();
        let rejected = composer.load_all(Category::Reply, batch.clone()).unwrap_err();

        assert_eq!(rejected.category, Category::Reply);
        assert_eq!(rejected.rops, batch);
        assert_eq!(composer.pending(Category::Reply), 1);
        assert_eq!(composer.pending_bytes(Category::Reply), 8);

        composer.load_all(Category::Reply, batch[..12].to_vec())?;
        assert_eq!(composer.pending(Category::Reply), 13);

        Ok(())
    }

    #[test]
    fn oversized_rop_rejected() -> eyre::Result<()> {
        let mut composer = FrameComposer::new(FrameSizes::default())?;

        let rejected = composer.load(Category::Occasional, Rop::set(id(1), vec![0u8; 200])).unwrap_err();
        assert!(matches!(rejected.reason, Error::RopTooLarge { size: 208, capacity: 96 }));

        Ok(())
    }

    #[test]
    fn compose_orders_categories_and_empties() -> eyre::Result<()> {
        let mut composer = FrameComposer::new(FrameSizes::default())?;

        composer.load(Category::Reply, Rop::say(id(3), vec![3u8; 4]))?;
        composer.load(Category::Occasional, Rop::ask(id(2)))?;
        composer.load(Category::Regular, Rop::sig(id(1), vec![1u8; 4]))?;

        let frame = composer.compose(7, 1000)?;
        assert_eq!(frame.sequence_number(), 7);
        assert_eq!(frame.age(), 1000);
        assert_eq!(frame.count(), 3);

        let tags = frame.rops().map(|r| r.map(|r| r.id32.tag())).collect::<Result<Vec<_>, _>>()?;
        assert_eq!(tags, vec![1, 2, 3]);

        let empty = composer.compose(8, 1001)?;
        assert!(empty.is_empty());
        assert_eq!(empty.encoded_len(), frame_header::SIZE_BYTES);

        Ok(())
    }

    prop_compose! {
        fn small_rop()(tag in any::<u8>(), len in 0usize..24, signed in any::<bool>()) -> Rop {
            let rop = Rop::set(id(tag), vec![tag; len]);
            if signed { rop.with_signature(tag as u32) } else { rop }
        }
    }

    proptest! {
        #[test]
        fn compose_then_parse_yields_each_rop_once(rops in proptest::collection::vec(small_rop(), 0..6)) {
            let mut composer = FrameComposer::new(FrameSizes::default()).unwrap();
            composer.load_all(Category::Occasional, rops.clone()).unwrap();

            let bytes = composer.compose(1, 0).unwrap().to_bytes().unwrap();
            let parsed = Frame::parse(bytes).unwrap();

            prop_assert_eq!(parsed.count() as usize, rops.len());

            for (decoded, original) in parsed.rops().zip_eq(rops.iter()) {
                prop_assert_eq!(&decoded.unwrap(), original);
            }
        }
    }
}
