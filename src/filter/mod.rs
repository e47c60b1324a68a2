//! Incremental framing of a byte stream into packages.
//!
//! A [`PipelineFilter`] inspects the bytes received so far and, once a whole
//! frame is buffered, consumes exactly that frame and decodes one package.
//! Decoding may hand back the filter for the next frame, which is how a
//! multi-phase handshake walks from one framing rule to the next.

mod line;

use bytes::{Bytes, BytesMut};

use crate::error::CodecError;

pub use line::{LineFilter, TextPackage};

pub type BoxedFilter<P> = Box<dyn PipelineFilter<Package = P> + Send>;

/// One decoded package plus the filter that frames the next one, if the
/// framing rule changes after this package.
pub struct Decoded<P> {
    pub package: P,
    pub next: Option<BoxedFilter<P>>,
}

impl<P> Decoded<P> {
    pub fn new(package: P) -> Self {
        Decoded {
            package,
            next: None,
        }
    }

    pub fn then(package: P, next: BoxedFilter<P>) -> Self {
        Decoded {
            package,
            next: Some(next),
        }
    }
}

pub trait PipelineFilter {
    type Package;

    /// Returns `Ok(None)` while `buf` does not yet hold a complete frame, and
    /// leaves `buf` untouched in that case.
    fn filter(&mut self, buf: &mut BytesMut) -> Result<Option<Decoded<Self::Package>>, CodecError>;
}

/// Frames with a length known before any byte arrives.
pub trait FixedSizeDecoder {
    type Package;

    fn size(&self) -> usize;

    fn decode(&mut self, frame: Bytes) -> Result<Decoded<Self::Package>, CodecError>;
}

/// Frames made of a constant size header and a body whose length is read
/// from that header.
pub trait FixedHeaderDecoder {
    type Package;

    fn header_size(&self) -> usize;

    /// Body length declared by `header`. Only looks, never consumes.
    fn body_len(&self, header: &[u8]) -> Result<usize, CodecError>;

    /// `frame` holds header and body.
    fn decode(&mut self, frame: Bytes) -> Result<Decoded<Self::Package>, CodecError>;
}

pub struct FixedSizeFilter<D> {
    decoder: D,
}

impl<D> FixedSizeFilter<D> {
    pub fn new(decoder: D) -> Self {
        FixedSizeFilter { decoder }
    }
}

impl<D> FixedSizeFilter<D>
where
    D: FixedSizeDecoder + Send + 'static,
{
    pub fn boxed(decoder: D) -> BoxedFilter<D::Package> {
        Box::new(Self::new(decoder))
    }
}

impl<D: FixedSizeDecoder> PipelineFilter for FixedSizeFilter<D> {
    type Package = D::Package;

    fn filter(&mut self, buf: &mut BytesMut) -> Result<Option<Decoded<Self::Package>>, CodecError> {
        let size = self.decoder.size();
        if buf.len() < size {
            return Ok(None);
        }
        let frame = buf.split_to(size).freeze();
        self.decoder.decode(frame).map(Some)
    }
}

pub struct FixedHeaderFilter<D> {
    decoder: D,
}

impl<D> FixedHeaderFilter<D> {
    pub fn new(decoder: D) -> Self {
        FixedHeaderFilter { decoder }
    }
}

impl<D> FixedHeaderFilter<D>
where
    D: FixedHeaderDecoder + Send + 'static,
{
    pub fn boxed(decoder: D) -> BoxedFilter<D::Package> {
        Box::new(Self::new(decoder))
    }
}

impl<D: FixedHeaderDecoder> PipelineFilter for FixedHeaderFilter<D> {
    type Package = D::Package;

    fn filter(&mut self, buf: &mut BytesMut) -> Result<Option<Decoded<Self::Package>>, CodecError> {
        let header_size = self.decoder.header_size();
        if buf.len() < header_size {
            return Ok(None);
        }
        let frame_len = header_size + self.decoder.body_len(&buf[..header_size])?;
        if buf.len() < frame_len {
            return Ok(None);
        }
        let frame = buf.split_to(frame_len).freeze();
        self.decoder.decode(frame).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Buf;

    struct Pair;

    impl FixedSizeDecoder for Pair {
        type Package = (u8, u8);

        fn size(&self) -> usize {
            2
        }

        fn decode(&mut self, mut frame: Bytes) -> Result<Decoded<Self::Package>, CodecError> {
            Ok(Decoded::then(
                (frame.get_u8(), frame.get_u8()),
                FixedHeaderFilter::boxed(LengthPrefixed),
            ))
        }
    }

    // [len, a, b] where the body is `len` bytes; packages report (len, first body byte)
    struct LengthPrefixed;

    impl FixedHeaderDecoder for LengthPrefixed {
        type Package = (u8, u8);

        fn header_size(&self) -> usize {
            1
        }

        fn body_len(&self, header: &[u8]) -> Result<usize, CodecError> {
            match header[0] {
                0 => Err(CodecError::UnsupportedAddressType(0)),
                len => Ok(len as usize),
            }
        }

        fn decode(&mut self, mut frame: Bytes) -> Result<Decoded<Self::Package>, CodecError> {
            let len = frame.get_u8();
            Ok(Decoded::new((len, frame.get_u8())))
        }
    }

    #[test]
    fn fixed_size_waits_for_whole_frame() {
        let mut filter = FixedSizeFilter::new(Pair);
        let mut buf = BytesMut::from(&[5u8][..]);
        assert!(filter.filter(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1);

        buf.extend_from_slice(&[0, 9]);
        let decoded = filter.filter(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.package, (5, 0));
        assert!(decoded.next.is_some());
        assert_eq!(&buf[..], &[9]);
    }

    #[test]
    fn fixed_header_byte_by_byte() {
        let mut filter = FixedHeaderFilter::new(LengthPrefixed);
        let input = [3u8, 7, 8, 9, 42];
        let mut buf = BytesMut::new();
        for (i, byte) in input.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let decoded = filter.filter(&mut buf).unwrap();
            if i < 3 {
                assert!(decoded.is_none());
                assert_eq!(buf.len(), i + 1);
            } else if i == 3 {
                assert_eq!(decoded.unwrap().package, (3, 7));
                assert!(buf.is_empty());
            } else {
                assert!(decoded.is_none());
                assert_eq!(&buf[..], &[42]);
            }
        }
    }

    #[test]
    fn fixed_header_rejects_bad_header() {
        let mut filter = FixedHeaderFilter::new(LengthPrefixed);
        let mut buf = BytesMut::from(&[0u8, 1, 2][..]);
        assert!(matches!(
            filter.filter(&mut buf),
            Err(CodecError::UnsupportedAddressType(0))
        ));
    }
}
