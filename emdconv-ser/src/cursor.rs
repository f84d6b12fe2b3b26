//! Little-endian reads over a byte slice with truncation reporting.

use crate::{Error, Result};

pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Starts reading at `offset`.
    pub(crate) fn at(data: &'a [u8], offset: usize, what: &'static str) -> Result<Self> {
        if offset > data.len() {
            return Err(Error::Truncated {
                what,
                needed: offset,
                available: data.len(),
            });
        }
        Ok(Self { data, pos: offset })
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::Truncated {
                what,
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, what)?);
        Ok(buf)
    }

    pub(crate) fn u16(&mut self, what: &'static str) -> Result<u16> {
        self.array(what).map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&mut self, what: &'static str) -> Result<u32> {
        self.array(what).map(u32::from_le_bytes)
    }

    pub(crate) fn i32(&mut self, what: &'static str) -> Result<i32> {
        self.array(what).map(i32::from_le_bytes)
    }

    pub(crate) fn u64(&mut self, what: &'static str) -> Result<u64> {
        self.array(what).map(u64::from_le_bytes)
    }

    pub(crate) fn f64(&mut self, what: &'static str) -> Result<f64> {
        self.array(what).map(f64::from_le_bytes)
    }

    /// Reads a file offset, 64-bit wide for newer series versions.
    pub(crate) fn offset(&mut self, wide: bool, what: &'static str) -> Result<u64> {
        if wide {
            self.u64(what)
        } else {
            self.u32(what).map(u64::from)
        }
    }

    /// Reads a `u32` length-prefixed string.
    pub(crate) fn string(&mut self, what: &'static str) -> Result<String> {
        let len = to_usize(u64::from(self.u32(what)?), what)?;
        let bytes = self.take(len, what)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

pub(crate) fn to_usize(value: u64, what: &'static str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::Format(format!("{what}: value {value} exceeds address space")))
}
