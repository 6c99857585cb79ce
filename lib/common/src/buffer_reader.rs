// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::mem::size_of;
use zerocopy::{ByteSlice, FromBytes, LayoutVerified, Unaligned};

/// A length-checked cursor over a byte buffer.
///
/// Every read validates the remaining length first; a read that would run
/// past the end of the buffer returns `None` and consumes nothing.
pub struct BufferReader<B> {
    buf: Option<B>,
    bytes_read: usize,
}

impl<B: ByteSlice> BufferReader<B> {
    pub fn new(bytes: B) -> Self {
        BufferReader { buf: Some(bytes), bytes_read: 0 }
    }

    pub fn read<T>(&mut self) -> Option<LayoutVerified<B, T>>
    where
        T: FromBytes + Unaligned,
    {
        self.read_helper::<T>()
    }

    pub fn peek<T>(&self) -> Option<LayoutVerified<&[u8], T>>
    where
        T: FromBytes + Unaligned,
    {
        let buf = self.buf.as_ref()?;
        let (lv, _) = LayoutVerified::<&[u8], T>::new_unaligned_from_prefix(&buf[..])?;
        Some(lv)
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<B> {
        let buf = self.buf.take()?;
        if buf.len() < len {
            self.buf = Some(buf);
            return None;
        }
        let (head, tail) = buf.split_at(len);
        self.buf = Some(tail);
        self.bytes_read += len;
        Some(head)
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.read_bytes(1).map(|bytes| bytes[0])
    }

    pub fn read_u16_be(&mut self) -> Option<u16> {
        self.read_bytes(2).map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        self.read_bytes(2).map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_be(&mut self) -> Option<u32> {
        self.read_bytes(4)
            .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn peek_remaining(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[..],
            None => &[],
        }
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn bytes_remaining(&self) -> usize {
        self.buf.as_ref().map_or(0, |buf| buf.len())
    }

    pub fn into_remaining(mut self) -> B {
        // `buf` is only ever `None` transiently inside `read_bytes`.
        self.buf.take().expect("buffer already consumed")
    }

    fn read_helper<T>(&mut self) -> Option<LayoutVerified<B, T>>
    where
        T: FromBytes + Unaligned,
    {
        let buf = self.buf.take()?;
        match LayoutVerified::<B, T>::new_unaligned_from_prefix(buf) {
            Some((lv, tail)) => {
                self.buf = Some(tail);
                self.bytes_read += size_of::<T>();
                Some(lv)
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_bytes_and_remaining() {
        let mut reader = BufferReader::new(&[1u8, 2, 3, 4, 5][..]);
        assert_eq!(reader.read_bytes(2), Some(&[1u8, 2][..]));
        assert_eq!(reader.bytes_read(), 2);
        assert_eq!(reader.bytes_remaining(), 3);
        assert_eq!(reader.peek_remaining(), &[3, 4, 5]);
    }

    #[test]
    fn read_past_end_returns_none_and_consumes_nothing() {
        let mut reader = BufferReader::new(&[1u8, 2, 3][..]);
        assert_eq!(reader.read_bytes(4), None);
        assert_eq!(reader.bytes_read(), 0);
        assert_eq!(reader.bytes_remaining(), 3);
    }

    #[test]
    fn read_integers() {
        let mut reader = BufferReader::new(&[0x12u8, 0x34, 0x56, 0x78, 0x9a][..]);
        assert_eq!(reader.read_u16_be(), Some(0x1234));
        assert_eq!(reader.read_u16_le(), Some(0x7856));
        assert_eq!(reader.read_byte(), Some(0x9a));
        assert_eq!(reader.read_byte(), None);
    }

    #[test]
    fn into_remaining() {
        let mut reader = BufferReader::new(&[1u8, 2, 3, 4][..]);
        reader.read_bytes(1).unwrap();
        assert_eq!(reader.into_remaining(), &[2, 3, 4][..]);
    }
}
