use bytes::{
    BufMut,
    Bytes,
    BytesMut,
};
use message::{
    frame_header::{
        self,
        START_OF_FRAME,
    },
    FrameHeader,
    Rop,
};
use packed_struct::prelude::*;

use crate::{
    rop,
    Error,
};

/// Encoded ROPs of one category, bounded by a byte capacity.
#[derive(Clone, Debug)]
pub struct RopFrame {
    buf:      BytesMut,
    capacity: usize,
    count:    u16,
}

impl RopFrame {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn count(&self) -> u16 {
        self.count
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append `rop`, returning its encoded length. Nothing is appended on failure.
    pub fn push(&mut self, rop: &Rop) -> Result<usize, Error> {
        let needed = rop::encoded_len(rop);

        if needed > self.remaining() || self.count == u16::MAX {
            return Err(Error::NoSpace {
                needed,
                available: self.remaining(),
            });
        }

        let start = self.buf.len();
        self.buf.resize(start + needed, 0);

        match rop::encode(rop, &mut self.buf[start..]) {
            Ok(n) => {
                self.count += 1;
                Ok(n)
            },
            Err(e) => {
                self.buf.truncate(start);
                Err(e)
            },
        }
    }

    pub(crate) fn mark(&self) -> (usize, u16) {
        (self.buf.len(), self.count)
    }

    pub(crate) fn rollback(&mut self, (len, count): (usize, u16)) {
        self.buf.truncate(len);
        self.count = count;
    }

    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
        self.count = 0;
    }
}

/// A ROP-frame: header plus the concatenated ROP region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    rops:       Bytes,
}

impl Frame {
    pub fn new(sequencenumber: u64, ageofframe: u64, rops: Bytes, count: u16) -> Result<Self, Error> {
        let ropssizeof = u16::try_from(rops.len()).map_err(|_| Error::NoSpace {
            needed:    rops.len(),
            available: u16::MAX as usize,
        })?;

        Ok(Self {
            header: FrameHeader::new(ropssizeof, count, ageofframe, sequencenumber),
            rops,
        })
    }

    /// Validate the start-of-frame marker and header of a received packet. Bytes past the
    /// declared ROP region are ignored.
    #[tracing::instrument(level = "trace", skip_all, fields(packet.len = packet.len()), err)]
    pub fn parse(packet: Bytes) -> Result<Self, Error> {
        if packet.len() < frame_header::SIZE_BYTES {
            return Err(Error::ShortFrame(packet.len()));
        }

        let mut sof = [0u8; 4];
        sof.copy_from_slice(&packet[..4]);
        let sof = u32::from_le_bytes(sof);

        if sof != START_OF_FRAME {
            return Err(Error::InvalidStartOfFrame(sof));
        }

        let header = FrameHeader::unpack_from_slice(&packet[..frame_header::SIZE_BYTES])?;

        let declared = header.ropssizeof as usize;
        let available = packet.len() - frame_header::SIZE_BYTES;

        if declared > available {
            return Err(Error::BadRopsSize {
                declared,
                available,
            });
        }

        let start = frame_header::SIZE_BYTES;

        Ok(Self {
            header,
            rops: packet.slice(start..start + declared),
        })
    }

    #[inline]
    pub fn sequence_number(&self) -> u64 {
        self.header.sequencenumber
    }

    #[inline]
    pub fn age(&self) -> u64 {
        self.header.ageofframe
    }

    #[inline]
    pub fn count(&self) -> u16 {
        self.header.ropsnumberof
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.header.ropsnumberof == 0
    }

    #[inline]
    pub fn rops_bytes(&self) -> &Bytes {
        &self.rops
    }

    /// Decode the ROPs in order. Iteration stops after the first error: nothing past a corrupt
    /// ROP can be located reliably.
    #[inline]
    pub fn rops(&self) -> Rops<'_> {
        Rops {
            cursor:    &self.rops,
            remaining: self.header.ropsnumberof,
            failed:    false,
        }
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        frame_header::SIZE_BYTES + self.rops.len()
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.reserve(self.encoded_len());
        dst.put_slice(&self.header.pack()?);
        dst.put_slice(&self.rops);

        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut dst)?;

        Ok(dst.freeze())
    }
}

pub struct Rops<'a> {
    cursor:    &'a [u8],
    remaining: u16,
    failed:    bool,
}

impl<'a> Iterator for Rops<'a> {
    type Item = Result<Rop, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }

        match rop::decode(&mut self.cursor) {
            Ok(rop) => {
                self.remaining -= 1;
                Some(Ok(rop))
            },
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.remaining as usize))
        }
    }
}
