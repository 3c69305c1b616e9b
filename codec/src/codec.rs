use bytes::BytesMut;
use tokio_util::codec::{
    Decoder,
    Encoder,
};

use crate::{
    Error,
    Frame,
};

/// One ROP-frame per datagram. Decoding consumes the whole buffer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RopFrameCodec;

impl Encoder<Frame> for RopFrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}

impl<'a> Encoder<&'a Frame> for RopFrameCodec {
    type Error = Error;

    fn encode(&mut self, item: &'a Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}

impl Decoder for RopFrameCodec {
    type Error = Error;
    type Item = Frame;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        Frame::parse(src.split().freeze()).map(Some)
    }
}

#[cfg(test)]
mod test {
    use message::{
        Id32,
        Rop,
    };

    use super::*;
    use crate::{
        Category,
        FrameComposer,
        FrameSizes,
    };

    #[test]
    fn encode_then_decode() -> eyre::Result<()> {
        let mut composer = FrameComposer::new(FrameSizes::default())?;
        composer.load(Category::Occasional, Rop::ask(Id32::new(1, 0, 0, 1)).with_signature(3))?;
        let frame = composer.compose(42, 17)?;

        let mut buf = BytesMut::new();
        RopFrameCodec.encode(&frame, &mut buf)?;
        assert_eq!(buf.len(), frame.encoded_len());

        let decoded = RopFrameCodec.decode(&mut buf)?;
        assert_eq!(decoded.as_ref(), Some(&frame));
        assert!(buf.is_empty());

        assert!(RopFrameCodec.decode(&mut buf)?.is_none());

        Ok(())
    }

    #[test]
    fn garbage_is_an_error() {
        let mut buf = BytesMut::from(&[0u8; 32][..]);
        assert!(matches!(RopFrameCodec.decode(&mut buf), Err(Error::InvalidStartOfFrame(0))));
    }
}
