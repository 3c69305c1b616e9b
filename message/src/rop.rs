use std::{
    fmt::{
        Display,
        Formatter,
    },
    num::TryFromIntError,
};

use bytes::Bytes;

use crate::{
    header::{
        ConfInfo,
        RopCode,
        RopCtrl,
        RopHeader,
    },
    Id32,
};

/// Decoded form of a single remote operation.
///
/// The `plussign`/`plustime` control bits are not stored: they are implied by `signature` and
/// `time` being present.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rop {
    pub ropc:      RopCode,
    pub id32:      Id32,
    pub confinfo:  ConfInfo,
    pub rqstconf:  bool,
    pub rqsttime:  bool,
    pub userdefn:  bool,
    pub data:      Bytes,
    pub signature: Option<u32>,
    pub time:      Option<u64>,
}

impl Rop {
    #[inline]
    pub fn new(ropc: RopCode, id32: Id32, data: Bytes) -> Self {
        Self {
            ropc,
            id32,
            confinfo: ConfInfo::None,
            rqstconf: false,
            rqsttime: false,
            userdefn: false,
            data,
            signature: None,
            time: None,
        }
    }

    #[inline]
    pub fn ask(id32: Id32) -> Self {
        Self::new(RopCode::Ask, id32, Bytes::new())
    }

    #[inline]
    pub fn say(id32: Id32, data: impl Into<Bytes>) -> Self {
        Self::new(RopCode::Say, id32, data.into())
    }

    #[inline]
    pub fn set(id32: Id32, data: impl Into<Bytes>) -> Self {
        Self::new(RopCode::Set, id32, data.into())
    }

    #[inline]
    pub fn sig(id32: Id32, data: impl Into<Bytes>) -> Self {
        Self::new(RopCode::Sig, id32, data.into())
    }

    #[inline]
    pub fn rst(id32: Id32) -> Self {
        Self::new(RopCode::Rst, id32, Bytes::new())
    }

    #[inline]
    pub fn with_signature(mut self, signature: u32) -> Self {
        self.signature = Some(signature);
        self
    }

    #[inline]
    pub fn with_time(mut self, time: u64) -> Self {
        self.time = Some(time);
        self
    }

    #[inline]
    pub fn request_confirmation(mut self) -> Self {
        self.rqstconf = true;
        self
    }

    #[inline]
    pub fn request_time(mut self) -> Self {
        self.rqsttime = true;
        self
    }

    /// Confirmation reply for this ROP: same opcode and id32, no data, signature echoed.
    pub fn confirmation(&self, confinfo: ConfInfo) -> Self {
        Self {
            confinfo,
            signature: self.signature,
            ..Self::new(self.ropc, self.id32, Bytes::new())
        }
    }

    #[inline]
    pub fn is_confirmation(&self) -> bool {
        self.confinfo != ConfInfo::None
    }

    pub fn ctrl(&self) -> RopCtrl {
        RopCtrl {
            version:  false,
            userdefn: self.userdefn,
            rqstconf: self.rqstconf,
            rqsttime: self.rqsttime,
            plussign: self.signature.is_some(),
            plustime: self.time.is_some(),
            confinfo: self.confinfo,
        }
    }

    pub fn header(&self) -> Result<RopHeader, TryFromIntError> {
        Ok(RopHeader {
            ctrl: self.ctrl(),
            ropc: self.ropc,
            dsiz: u16::try_from(self.data.len())?,
            id32: self.id32,
        })
    }

    /// Reassemble from a decoded header. Trailers must agree with the header's control bits.
    pub fn from_parts(header: &RopHeader, data: Bytes, signature: Option<u32>, time: Option<u64>) -> Self {
        debug_assert_eq!(header.ctrl.plussign, signature.is_some());
        debug_assert_eq!(header.ctrl.plustime, time.is_some());

        Self {
            ropc: header.ropc,
            id32: header.id32,
            confinfo: header.ctrl.confinfo,
            rqstconf: header.ctrl.rqstconf,
            rqsttime: header.ctrl.rqsttime,
            userdefn: header.ctrl.userdefn,
            data,
            signature,
            time,
        }
    }
}

impl Display for Rop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<{}>", self.ropc, self.id32)?;

        if self.confinfo != ConfInfo::None {
            write!(f, "[{}]", self.confinfo)?;
        }

        if let Some(sig) = self.signature {
            write!(f, " sig={sig:#x}")?;
        }

        // `{:#}` includes the payload.
        if f.alternate() && !self.data.is_empty() {
            write!(f, " data={}", hex::encode(&self.data))?;
        }

        Ok(())
    }
}
