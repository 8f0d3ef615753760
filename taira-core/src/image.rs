use crate::header::{FlatHeader, FLAT_MAGIC, FLAT_VERSION};
use crate::reader::{ByteReader, Endianness};
use anyhow::{bail, Result};
use std::io::Read;

/// A flat executable image whose header has been decoded and checked.
#[derive(Debug)]
pub struct FlatImage {
    pub path: String,
    pub endianness: Endianness,
    pub header: FlatHeader,
}

/// Probes the leading signature bytes to infer the header byte order.
///
/// A little-endian image starts with the literal bytes `bFLT`; a big-endian
/// one stores the same dword reversed. Returns `None` when neither matches
/// or fewer than four bytes are available.
pub fn detect_endianness(buf: &[u8]) -> Option<Endianness> {
    let probe = ByteReader::new(buf).peek_at(0, 4);
    if probe.truncated {
        return None;
    }
    match probe.bytes {
        [0x62, 0x46, 0x4c, 0x54] => Some(Endianness::Little),
        [0x54, 0x4c, 0x46, 0x62] => Some(Endianness::Big),
        _ => None,
    }
}

impl FlatImage {
    /// Opens a flat image from disk, inferring the header byte order from
    /// the signature.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let buf = read_file(&path)?;
        let name = path.as_ref().display().to_string();
        let Some(endianness) = detect_endianness(&buf) else {
            bail!("{name}: no bFLT signature in either byte order");
        };
        Self::from_bytes(&name, &buf, endianness)
    }

    /// Opens a flat image from disk with an explicit byte order.
    pub fn open_with_endianness<P: AsRef<std::path::Path>>(
        path: P,
        endianness: Endianness,
    ) -> Result<Self> {
        let buf = read_file(&path)?;
        Self::from_bytes(&path.as_ref().display().to_string(), &buf, endianness)
    }

    /// Decodes and sanity-checks the header of an in-memory image.
    ///
    /// The header decoder itself is purely mechanical; the magic check
    /// happens here. A wrong revision or a compressed payload only warns,
    /// since the header remains readable either way.
    pub fn from_bytes(name: &str, buf: &[u8], endianness: Endianness) -> Result<Self> {
        let mut rd = ByteReader::with_endianness(buf, endianness);
        let header = FlatHeader::parse(&mut rd)?;

        if !header.has_valid_magic() {
            bail!(
                "{name}: bad flat-image magic {:#010x} (expected {FLAT_MAGIC:#010x})",
                header.magic
            );
        }
        if header.rev != FLAT_VERSION {
            log::warn!(
                "{name}: flat format revision {} (tooling targets revision {FLAT_VERSION})",
                header.rev
            );
        }
        if header.is_gzipped() {
            log::warn!("{name}: compressed flat image; payload decompression is not supported");
        }

        Ok(Self {
            path: name.to_string(),
            endianness,
            header,
        })
    }

    /// File offset of the first executable instruction.
    pub fn entry_offset(&self) -> u64 {
        self.header.entry as u64
    }
}

fn read_file<P: AsRef<std::path::Path>>(path: P) -> Result<Vec<u8>> {
    let mut file = std::fs::File::open(&path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_bytes(endianness: Endianness) -> Vec<u8> {
        let word = |value: u32| match endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        let mut buf = Vec::with_capacity(FlatHeader::SIZE);
        buf.extend_from_slice(&word(FLAT_MAGIC));
        buf.extend_from_slice(&word(FLAT_VERSION));
        buf.extend_from_slice(&word(0x44)); // entry just past the header
        buf.resize(FlatHeader::SIZE, 0);
        buf
    }

    #[test]
    fn detects_byte_order_from_signature() {
        assert_eq!(
            detect_endianness(&image_bytes(Endianness::Little)),
            Some(Endianness::Little)
        );
        assert_eq!(
            detect_endianness(&image_bytes(Endianness::Big)),
            Some(Endianness::Big)
        );
        assert_eq!(detect_endianness(b"\x7fELF"), None);
        assert_eq!(detect_endianness(b"bF"), None);
    }

    #[test]
    fn from_bytes_decodes_a_well_formed_image() {
        let buf = image_bytes(Endianness::Big);
        let img = FlatImage::from_bytes("test.bflt", &buf, Endianness::Big).unwrap();
        assert_eq!(img.header.rev, FLAT_VERSION);
        assert_eq!(img.entry_offset(), 0x44);
    }

    #[test]
    fn rejects_a_bad_magic() {
        let mut buf = image_bytes(Endianness::Little);
        buf[0] = b'X';
        let err = FlatImage::from_bytes("test.bflt", &buf, Endianness::Little).unwrap_err();
        assert!(err.to_string().contains("bad flat-image magic"));
    }

    #[test]
    fn propagates_short_buffer_errors() {
        let buf = &image_bytes(Endianness::Little)[..10];
        assert!(FlatImage::from_bytes("test.bflt", buf, Endianness::Little).is_err());
    }
}
