use std::{borrow::Cow, sync::Arc};

use cesu8_str::java as cesu8_java;
use nom::{
    bytes::complete::take,
    number::complete::{be_i16, be_i32, be_u16, be_u32, i8, u8},
};

use crate::error::{ClassFormatError, PResult, fail};

/// Forward-only cursor over raw class-file bytes.
///
/// Every read either consumes exactly the requested width or fails with
/// [`ClassFormatError::Truncated`]; the position never moves backwards.
#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn read<T>(
        &mut self,
        mut parser: impl FnMut(&'a [u8]) -> PResult<'a, T>,
    ) -> Result<T, ClassFormatError> {
        let (rest, value) = parser(&self.data[self.position..])?;
        self.position = self.data.len() - rest.len();
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, ClassFormatError> {
        self.read(u8)
    }

    pub fn read_i8(&mut self) -> Result<i8, ClassFormatError> {
        self.read(i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, ClassFormatError> {
        self.read(be_u16)
    }

    pub fn read_i16(&mut self) -> Result<i16, ClassFormatError> {
        self.read(be_i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, ClassFormatError> {
        self.read(be_u32)
    }

    pub fn read_i32(&mut self) -> Result<i32, ClassFormatError> {
        self.read(be_i32)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFormatError> {
        self.read(take(len))
    }

    pub fn discard(&mut self, len: usize) -> Result<(), ClassFormatError> {
        self.read_bytes(len).map(|_| ())
    }
}

/// Offset of `rest` inside `origin`, both slices of the same buffer.
pub(crate) fn offset_in(origin: &[u8], rest: &[u8]) -> usize {
    origin.len() - rest.len()
}

pub(crate) fn discard(len: usize) -> impl Fn(&[u8]) -> PResult<'_, ()> {
    move |input| {
        let (input, _) = take(len)(input)?;
        Ok((input, ()))
    }
}

/// `u2 length` followed by modified UTF-8 bytes.
pub(crate) fn modified_utf8(input: &[u8]) -> PResult<'_, Arc<str>> {
    let (input, length) = be_u16(input)?;
    let (input, bytes) = take(length)(input)?;
    match decode_modified_utf8(bytes) {
        Some(text) => Ok((input, Arc::from(text))),
        None => fail(ClassFormatError::BadUtf8),
    }
}

pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Option<Cow<'_, str>> {
    let java_str = cesu8_java::JavaStr::from_java_cesu8(bytes).ok()?;
    Some(cesu8_java::from_java_cesu8(java_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_values_in_order() {
        let data = [0x01, 0xff, 0xfe, 0x00, 0x00, 0x01, 0x00, 0x80];
        let mut stream = ByteStream::new(&data);
        assert_eq!(stream.read_u8().unwrap(), 1);
        assert_eq!(stream.read_i16().unwrap(), -2);
        assert_eq!(stream.read_i32().unwrap(), 256);
        assert_eq!(stream.position(), 7);
        assert_eq!(stream.read_i8().unwrap(), -128);
        assert!(stream.is_empty());
    }

    #[test]
    fn truncated_read_fails_without_moving() {
        let data = [0x00, 0x01, 0x02];
        let mut stream = ByteStream::new(&data);
        stream.discard(2).unwrap();
        let err = stream.read_u16().unwrap_err();
        assert_eq!(err, ClassFormatError::Truncated { remaining: 1 });
        assert_eq!(stream.position(), 2);
    }

    #[test]
    fn decodes_modified_utf8_nul() {
        // U+0000 is encoded on two bytes in class files
        let data = [0x00, 0x03, b'a', 0xc0, 0x80];
        let (rest, text) = modified_utf8(&data).unwrap();
        assert!(rest.is_empty());
        assert_eq!(&*text, "a\0");
    }
}
