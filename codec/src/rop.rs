//! Encoding of a single ROP: header, data padded to four bytes, then the optional signature and
//! time trailers.

use bytes::{
    Buf,
    BufMut,
    Bytes,
};
use message::{
    align4,
    header,
    Rop,
    RopHeader,
};
use packed_struct::prelude::*;

use crate::Error;

const SIGNATURE_BYTES: usize = 4;
const TIME_BYTES: usize = 8;

#[inline]
fn body_len(dsiz: usize, plussign: bool, plustime: bool) -> usize {
    header::SIZE_BYTES
        + align4(dsiz)
        + if plussign { SIGNATURE_BYTES } else { 0 }
        + if plustime { TIME_BYTES } else { 0 }
}

#[inline]
pub fn encoded_len(rop: &Rop) -> usize {
    body_len(rop.data.len(), rop.signature.is_some(), rop.time.is_some())
}

/// Write `rop` at the start of `out`, returning the number of bytes written. Nothing is written
/// unless the whole ROP fits.
#[tracing::instrument(level = "trace", skip_all, fields(rop = %rop), err)]
pub fn encode(rop: &Rop, out: &mut [u8]) -> Result<usize, Error> {
    let header = rop.header().map_err(|_| Error::DataTooLarge(rop.data.len()))?;

    let needed = encoded_len(rop);
    if out.len() < needed {
        return Err(Error::NoSpace {
            needed,
            available: out.len(),
        });
    }

    let packed = header.pack()?;

    let mut buf = &mut out[..needed];
    buf.put_slice(&packed);
    buf.put_slice(&rop.data);
    buf.put_bytes(0, align4(rop.data.len()) - rop.data.len());

    if let Some(signature) = rop.signature {
        buf.put_u32_le(signature);
    }

    if let Some(time) = rop.time {
        buf.put_u64_le(time);
    }

    Ok(needed)
}

/// Read one ROP from the front of `src`. The cursor only moves past the ROP on success.
#[tracing::instrument(level = "trace", skip_all, fields(remaining = src.len()), err)]
pub fn decode(src: &mut &[u8]) -> Result<Rop, Error> {
    let mut buf = *src;

    if buf.len() < header::SIZE_BYTES {
        return Err(Error::Truncated {
            needed:    header::SIZE_BYTES,
            remaining: buf.len(),
        });
    }

    let header = RopHeader::unpack_from_slice(&buf[..header::SIZE_BYTES]).map_err(|e| {
        tracing::debug!(header = %hex::encode(&buf[..header::SIZE_BYTES]), "undecodable rop header");
        e
    })?;

    if header.ctrl.version {
        return Err(Error::UnsupportedVersion);
    }

    let dsiz = header.dsiz as usize;
    let needed = body_len(dsiz, header.ctrl.plussign, header.ctrl.plustime);

    if buf.len() < needed {
        return Err(Error::Truncated {
            needed,
            remaining: buf.len(),
        });
    }

    buf.advance(header::SIZE_BYTES);

    let data = Bytes::copy_from_slice(&buf[..dsiz]);
    buf.advance(align4(dsiz));

    let signature = header.ctrl.plussign.then(|| buf.get_u32_le());
    let time = header.ctrl.plustime.then(|| buf.get_u64_le());

    *src = buf;

    Ok(Rop::from_parts(&header, data, signature, time))
}
