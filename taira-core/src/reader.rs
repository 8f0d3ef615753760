use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

/// Byte order used to decode multi-byte integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("read of {wanted} bytes at offset {offset} overruns buffer of {len} bytes")]
    OutOfBounds {
        offset: usize,
        wanted: usize,
        len: usize,
    },

    #[error("no NUL terminator for string starting at offset {offset}")]
    UnterminatedString { offset: usize },
}

/// Result of a raw (untyped) read.
///
/// Raw reads clamp instead of failing: when fewer bytes remain than were
/// requested, `bytes` holds what was available and `truncated` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBytes<'a> {
    pub bytes: &'a [u8],
    pub truncated: bool,
}

/// A bounded cursor over an immutable byte buffer.
///
/// Tracks a current offset and decodes fixed-width integers with the byte
/// order chosen at construction. Typed reads (integers, strings) fail with a
/// [`ReadError`] when the buffer is too short and leave the offset where it
/// was; raw reads ([`ByteReader::read_bytes`], [`ByteReader::peek_at`]) clamp
/// to the bytes that remain and report the shortfall via [`RawBytes`].
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
    endianness: Endianness,
}

impl<'a> ByteReader<'a> {
    /// Creates a little-endian reader positioned at offset 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endianness(data, Endianness::Little)
    }

    pub fn with_endianness(data: &'a [u8], endianness: Endianness) -> Self {
        Self {
            data,
            offset: 0,
            endianness,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Current offset into the buffer.
    pub fn tell(&self) -> usize {
        self.offset
    }

    /// Bytes left between the current offset and the end of the buffer.
    ///
    /// Saturates at 0: a permissive [`ByteReader::seek`] past the end never
    /// makes this underflow.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Moves the cursor to an arbitrary offset.
    ///
    /// No upper bound is enforced; callers may probe past nominal EOF.
    /// Typed reads from such a position fail with
    /// [`ReadError::OutOfBounds`] and raw reads come back empty.
    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Advances the cursor by `n` bytes without reading them.
    pub fn skip(&mut self, n: usize) {
        self.offset = self.offset.saturating_add(n);
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8], ReadError> {
        let end = self
            .offset
            .checked_add(width)
            .filter(|&end| end <= self.data.len())
            .ok_or(ReadError::OutOfBounds {
                offset: self.offset,
                wanted: width,
                len: self.data.len(),
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        let bytes = self.take(2)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16, ReadError> {
        self.read_u16().map(|word| word as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        let bytes = self.take(4)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        self.read_u32().map(|dword| dword as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        let bytes = self.take(8)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u64(bytes),
            Endianness::Big => BigEndian::read_u64(bytes),
        })
    }

    pub fn read_i64(&mut self) -> Result<i64, ReadError> {
        self.read_u64().map(|qword| qword as i64)
    }

    /// Reads bytes up to (and excluding) a NUL terminator, advancing the
    /// cursor past the NUL.
    pub fn read_cstring(&mut self) -> Result<String, ReadError> {
        let start = self.offset;
        let rest = self.data.get(start..).unwrap_or(&[]);
        let nul = rest
            .iter()
            .position(|&byte| byte == 0)
            .ok_or(ReadError::UnterminatedString { offset: start })?;
        self.offset = start + nul + 1;
        Ok(String::from_utf8_lossy(&rest[..nul]).into_owned())
    }

    /// Reads a NUL-terminated string, then discards padding bytes from the
    /// buffer so that the total consumption (content + NUL + padding) is a
    /// multiple of `align`. The flat format conventionally uses `align = 4`.
    pub fn read_aligned_string(&mut self, align: usize) -> Result<String, ReadError> {
        let start = self.offset;
        let string = self.read_cstring()?;
        if align > 1 {
            let consumed = self.offset - start;
            let pad = (align - consumed % align) % align;
            if pad > self.remaining() {
                let err = ReadError::OutOfBounds {
                    offset: self.offset,
                    wanted: pad,
                    len: self.data.len(),
                };
                self.offset = start;
                return Err(err);
            }
            self.offset += pad;
        }
        Ok(string)
    }

    /// Reads the next `n` bytes, clamping to what remains in the buffer.
    pub fn read_bytes(&mut self, n: usize) -> RawBytes<'a> {
        let take = n.min(self.remaining());
        if take < n {
            log::warn!(
                "short read at offset {}: wanted {} bytes, {} remaining",
                self.offset,
                n,
                take
            );
        }
        let bytes = self
            .data
            .get(self.offset..self.offset + take)
            .unwrap_or(&[]);
        self.offset += take;
        RawBytes {
            bytes,
            truncated: take < n,
        }
    }

    /// Reads `n` bytes as if positioned at `offset`, without moving the
    /// cursor. Out-of-range offsets clamp the same way `read_bytes` does.
    pub fn peek_at(&self, offset: usize, n: usize) -> RawBytes<'a> {
        let len = self.data.len();
        let start = offset.min(len);
        let end = start.saturating_add(n).min(len);
        RawBytes {
            bytes: &self.data[start..end],
            truncated: end - start < n,
        }
    }
}
