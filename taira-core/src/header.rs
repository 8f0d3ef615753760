use crate::reader::{ByteReader, ReadError};

/// Expected value of [`FlatHeader::magic`]: the bytes `bFLT` decoded as a
/// little-endian dword.
pub const FLAT_MAGIC: u32 = 0x544c_4662;

/// Flat format revision this tooling targets.
pub const FLAT_VERSION: u32 = 4;

/// Load the program to RAM rather than executing in place.
pub const FLAT_FLAG_RAM: u32 = 0x0001;
/// Program is PIC with a global offset table.
pub const FLAT_FLAG_GOTPIC: u32 = 0x0002;
/// Everything after the header is gzip-compressed.
pub const FLAT_FLAG_GZIP: u32 = 0x0004;
/// Only the data segment is gzip-compressed.
pub const FLAT_FLAG_GZDATA: u32 = 0x0008;
/// Kernel should trace loading for debugging.
pub const FLAT_FLAG_KTRACE: u32 = 0x0010;

/// The 64-byte header at the start of a uClinux flat (bFLT) executable.
///
/// Sixteen densely packed 32-bit words with no inter-field padding: ten
/// named fields followed by six reserved filler words. All offsets below
/// are file offsets from the start of the image.
///
/// Reference: `include/linux/flat.h` in the uClinux kernel sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FlatHeader {
    /// Signature word; `bFLT` for a well-formed image (see [`FLAT_MAGIC`]).
    pub magic: u32,

    /// Format revision (see [`FLAT_VERSION`]).
    pub rev: u32,

    /// Offset of the first executable instruction.
    pub entry: u32,

    /// Offset of the data segment.
    pub data_start: u32,

    /// Offset of the end of the data segment (and start of bss).
    pub data_end: u32,

    /// Offset of the end of the bss segment.
    pub bss_end: u32,

    /// Size of the stack to allocate, in bytes.
    pub stack_size: u32,

    /// Offset of the relocation records.
    pub reloc_start: u32,

    /// Number of relocation records.
    pub reloc_count: u32,

    /// Loader flags (`FLAT_FLAG_*`).
    pub flags: u32,

    /// Reserved words; captured as raw values, no decoded meaning.
    pub filler: [u32; 6],
}

impl FlatHeader {
    /// On-disk size of the header in bytes.
    pub const SIZE: usize = 64;

    /// Decodes a header from the reader's current position.
    ///
    /// Issues exactly sixteen dword reads in field order, no seeking; on
    /// success the reader has advanced by [`FlatHeader::SIZE`] bytes. The
    /// magic is captured but deliberately not validated here: semantic
    /// checks belong to the caller (see `FlatImage::from_bytes`).
    pub fn parse(rd: &mut ByteReader) -> Result<Self, ReadError> {
        let mut header = FlatHeader {
            magic: rd.read_u32()?,
            rev: rd.read_u32()?,
            entry: rd.read_u32()?,
            data_start: rd.read_u32()?,
            data_end: rd.read_u32()?,
            bss_end: rd.read_u32()?,
            stack_size: rd.read_u32()?,
            reloc_start: rd.read_u32()?,
            reloc_count: rd.read_u32()?,
            flags: rd.read_u32()?,
            filler: [0u32; 6],
        };

        for slot in header.filler.iter_mut() {
            *slot = rd.read_u32()?;
        }

        Ok(header)
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == FLAT_MAGIC
    }

    /// True if any part of the image payload is gzip-compressed.
    pub fn is_gzipped(&self) -> bool {
        self.flags & (FLAT_FLAG_GZIP | FLAT_FLAG_GZDATA) != 0
    }

    pub fn is_gotpic(&self) -> bool {
        self.flags & FLAT_FLAG_GOTPIC != 0
    }

    pub fn loads_to_ram(&self) -> bool {
        self.flags & FLAT_FLAG_RAM != 0
    }

    /// Names of the known flag bits set in [`FlatHeader::flags`].
    pub fn flag_names(&self) -> Vec<&'static str> {
        const KNOWN: [(u32, &str); 5] = [
            (FLAT_FLAG_RAM, "RAM"),
            (FLAT_FLAG_GOTPIC, "GOTPIC"),
            (FLAT_FLAG_GZIP, "GZIP"),
            (FLAT_FLAG_GZDATA, "GZDATA"),
            (FLAT_FLAG_KTRACE, "KTRACE"),
        ];
        KNOWN
            .iter()
            .filter(|(bit, _)| self.flags & bit != 0)
            .map(|&(_, name)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Endianness;

    fn sample_header() -> Vec<u8> {
        let mut buf = Vec::with_capacity(FlatHeader::SIZE);
        buf.extend_from_slice(&FLAT_MAGIC.to_le_bytes());
        for field in 1u32..=9 {
            buf.extend_from_slice(&field.to_le_bytes());
        }
        buf.extend_from_slice(&[0u8; 24]);
        buf
    }

    #[test]
    fn parses_fields_in_order() {
        let buf = sample_header();
        let mut rd = ByteReader::new(&buf);
        let header = FlatHeader::parse(&mut rd).unwrap();

        assert_eq!(header.magic, FLAT_MAGIC);
        assert_eq!(header.rev, 1);
        assert_eq!(header.entry, 2);
        assert_eq!(header.data_start, 3);
        assert_eq!(header.data_end, 4);
        assert_eq!(header.bss_end, 5);
        assert_eq!(header.stack_size, 6);
        assert_eq!(header.reloc_start, 7);
        assert_eq!(header.reloc_count, 8);
        assert_eq!(header.flags, 9);
        assert_eq!(header.filler, [0u32; 6]);
        assert_eq!(rd.tell(), FlatHeader::SIZE);
        assert!(header.has_valid_magic());
    }

    #[test]
    fn short_buffer_fails_with_no_partial_header() {
        let buf = &sample_header()[..10];
        let mut rd = ByteReader::new(buf);
        assert!(matches!(
            FlatHeader::parse(&mut rd),
            Err(ReadError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn parse_is_idempotent() {
        let buf = sample_header();
        let first = FlatHeader::parse(&mut ByteReader::new(&buf)).unwrap();
        let second = FlatHeader::parse(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parses_big_endian_headers() {
        let mut buf = Vec::with_capacity(FlatHeader::SIZE);
        buf.extend_from_slice(&FLAT_MAGIC.to_be_bytes());
        buf.resize(FlatHeader::SIZE, 0);

        let mut rd = ByteReader::with_endianness(&buf, Endianness::Big);
        let header = FlatHeader::parse(&mut rd).unwrap();
        assert!(header.has_valid_magic());
    }

    #[test]
    fn flag_names_reports_set_bits() {
        let buf = sample_header();
        let mut header = FlatHeader::parse(&mut ByteReader::new(&buf)).unwrap();
        header.flags = FLAT_FLAG_RAM | FLAT_FLAG_GZIP;
        assert_eq!(header.flag_names(), vec!["RAM", "GZIP"]);
        assert!(header.is_gzipped());
        assert!(header.loads_to_ram());
        assert!(!header.is_gotpic());
    }
}
