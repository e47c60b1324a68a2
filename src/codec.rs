//! Endian-aware write helpers over an append-only [`BytesMut`].
//!
//! Every helper returns the number of bytes it appended. Byte order is always
//! chosen by the caller; nothing here depends on the host's endianness.

use std::borrow::Cow;

use bytes::{BufMut, BytesMut};

use crate::error::CodecError;

const MAX_PREFIXED_LEN: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Byte encoding used for text written to the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// One byte per char; anything outside ASCII becomes `?`.
    #[default]
    Ascii,
    Utf8,
}

impl TextEncoding {
    pub fn encode<'a>(&self, value: &'a str) -> Cow<'a, [u8]> {
        match self {
            TextEncoding::Utf8 => Cow::Borrowed(value.as_bytes()),
            TextEncoding::Ascii if value.is_ascii() => Cow::Borrowed(value.as_bytes()),
            TextEncoding::Ascii => Cow::Owned(
                value
                    .chars()
                    .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                    .collect(),
            ),
        }
    }
}

/// Fixed-width integers that can be written in an explicit byte order.
pub trait EndianWrite: Copy {
    const SIZE: usize;
    fn put(self, buf: &mut impl BufMut, endian: Endian);
}

macro_rules! endian_write {
    ($($ty:ty => $be:ident, $le:ident;)*) => {
        $(
            impl EndianWrite for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                fn put(self, buf: &mut impl BufMut, endian: Endian) {
                    match endian {
                        Endian::Big => buf.$be(self),
                        Endian::Little => buf.$le(self),
                    }
                }
            }
        )*
    };
}

endian_write! {
    u16 => put_u16, put_u16_le;
    u32 => put_u32, put_u32_le;
    u64 => put_u64, put_u64_le;
    i16 => put_i16, put_i16_le;
    i32 => put_i32, put_i32_le;
    i64 => put_i64, put_i64_le;
}

impl EndianWrite for u8 {
    const SIZE: usize = 1;
    fn put(self, buf: &mut impl BufMut, _: Endian) {
        buf.put_u8(self)
    }
}

impl EndianWrite for i8 {
    const SIZE: usize = 1;
    fn put(self, buf: &mut impl BufMut, _: Endian) {
        buf.put_i8(self)
    }
}

pub trait BufferWriterExt {
    fn write_endian<T: EndianWrite>(&mut self, value: T, endian: Endian) -> usize;

    fn write_big_endian<T: EndianWrite>(&mut self, value: T) -> usize {
        self.write_endian(value, Endian::Big)
    }

    fn write_little_endian<T: EndianWrite>(&mut self, value: T) -> usize {
        self.write_endian(value, Endian::Little)
    }

    fn write_str(&mut self, value: &str, encoding: TextEncoding) -> usize;

    /// Writes `value` behind a one byte length prefix.
    ///
    /// Fails with [`CodecError::ValueTooLarge`] when the encoded text is longer
    /// than 255 bytes; nothing is appended in that case.
    fn write_str_with_length(
        &mut self,
        value: &str,
        encoding: TextEncoding,
    ) -> Result<usize, CodecError>;
}

impl BufferWriterExt for BytesMut {
    fn write_endian<T: EndianWrite>(&mut self, value: T, endian: Endian) -> usize {
        value.put(self, endian);
        T::SIZE
    }

    fn write_str(&mut self, value: &str, encoding: TextEncoding) -> usize {
        let encoded = encoding.encode(value);
        self.put_slice(&encoded);
        encoded.len()
    }

    fn write_str_with_length(
        &mut self,
        value: &str,
        encoding: TextEncoding,
    ) -> Result<usize, CodecError> {
        let chars = value.chars().count();
        if chars > MAX_PREFIXED_LEN {
            return Err(CodecError::ValueTooLarge(chars));
        }

        let start = self.len();
        self.put_u8(0);
        let written = self.write_str(value, encoding);
        if written > MAX_PREFIXED_LEN {
            self.truncate(start);
            return Err(CodecError::ValueTooLarge(written));
        }
        self[start] = written as u8;

        Ok(written + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_is_explicit() {
        let mut buf = BytesMut::new();
        assert_eq!(buf.write_big_endian(0x0102u16), 2);
        assert_eq!(buf.write_little_endian(0x0102u16), 2);
        assert_eq!(buf.write_endian(0x01020304u32, Endian::Big), 4);
        assert_eq!(buf.write_endian(1u64, Endian::Little), 8);
        assert_eq!(buf.write_little_endian(0x05u8), 1);
        assert_eq!(
            &buf[..],
            &[1, 2, 2, 1, 1, 2, 3, 4, 1, 0, 0, 0, 0, 0, 0, 0, 5][..]
        );
    }

    #[test]
    fn length_prefix_is_backpatched() {
        let mut buf = BytesMut::from(&[0xAAu8][..]);
        let written = buf
            .write_str_with_length("user", TextEncoding::Ascii)
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(&buf[..], b"\xAA\x04user");
    }

    #[test]
    fn length_prefix_limit() {
        let mut buf = BytesMut::new();
        let max = "a".repeat(255);
        assert_eq!(
            buf.write_str_with_length(&max, TextEncoding::Ascii).unwrap(),
            256
        );
        assert_eq!(buf[0], 255);

        let mut buf = BytesMut::new();
        let too_long = "a".repeat(256);
        assert!(matches!(
            buf.write_str_with_length(&too_long, TextEncoding::Ascii),
            Err(CodecError::ValueTooLarge(256))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn length_prefix_checks_encoded_bytes() {
        // 200 chars, 400 bytes once encoded as UTF-8
        let wide = "é".repeat(200);
        let mut buf = BytesMut::from(&b"hdr"[..]);
        assert!(matches!(
            buf.write_str_with_length(&wide, TextEncoding::Utf8),
            Err(CodecError::ValueTooLarge(400))
        ));
        assert_eq!(&buf[..], b"hdr");

        let mut buf = BytesMut::new();
        assert_eq!(
            buf.write_str_with_length(&wide, TextEncoding::Ascii).unwrap(),
            201
        );
        assert!(buf[1..].iter().all(|b| *b == b'?'));
    }
}
