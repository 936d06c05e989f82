//! Sequential little-endian reader over an in-memory byte buffer.
//!
//! Every read either consumes exactly the bytes it reports or fails with
//! [`CursorError::OutOfBounds`] and leaves the offset where it was.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Four ASCII bytes introducing or closing a chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(\"{self}\")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("read of {requested} bytes at offset {offset} exceeds buffer ({available} remaining)")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        available: usize,
    },
}

pub type CursorResult<T> = std::result::Result<T, CursorError>;

#[derive(Debug, Clone)]
pub struct BinaryCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

macro_rules! read_le {
    ($($name:ident => $ty:ty, $size:literal);* $(;)?) => {
        $(
            pub fn $name(&mut self) -> CursorResult<$ty> {
                let bytes = self.take_array::<$size>()?;
                Ok(<$ty>::from_le_bytes(bytes))
            }
        )*
    };
}

impl<'a> BinaryCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    read_le! {
        read_u8 => u8, 1;
        read_u16 => u16, 2;
        read_u32 => u32, 4;
        read_i8 => i8, 1;
        read_i16 => i16, 2;
        read_i32 => i32, 4;
        read_f32 => f32, 4;
        read_f64 => f64, 8;
    }

    /// Reads a `len`-byte string window, trimmed at the first NUL.
    pub fn read_fixed_string(&mut self, len: usize) -> CursorResult<String> {
        let window = self.read_bytes(len)?;
        let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
        Ok(String::from_utf8_lossy(&window[..end]).into_owned())
    }

    /// Reads up to the next NUL and consumes the terminator.
    pub fn read_cstring(&mut self) -> CursorResult<String> {
        let rest = &self.data[self.offset..];
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(self.out_of_bounds(rest.len() + 1));
        };
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.offset += end + 1;
        Ok(text)
    }

    pub fn read_tag(&mut self) -> CursorResult<Tag> {
        self.take_array::<4>().map(Tag)
    }

    pub fn read_bytes(&mut self, len: usize) -> CursorResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.out_of_bounds(len));
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Moves to an absolute offset. Seeking to exactly the end is allowed.
    pub fn seek(&mut self, offset: usize) -> CursorResult<()> {
        if offset > self.data.len() {
            return Err(CursorError::OutOfBounds {
                offset,
                requested: 0,
                available: 0,
            });
        }
        self.offset = offset;
        Ok(())
    }

    pub fn skip(&mut self, len: usize) -> CursorResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Fails if `count` records of `record_size` bytes cannot possibly follow.
    pub fn ensure_records(&self, count: usize, record_size: usize) -> CursorResult<()> {
        let needed = count.saturating_mul(record_size);
        if needed > self.remaining() {
            return Err(self.out_of_bounds(needed));
        }
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn eof(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take_array<const N: usize>(&mut self) -> CursorResult<[u8; N]> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn out_of_bounds(&self, requested: usize) -> CursorError {
        CursorError::OutOfBounds {
            offset: self.offset,
            requested,
            available: self.remaining(),
        }
    }
}
