//! The segment header (component D, `spec.md` §4.3): magic, archive
//! version, and the option bitfield that gates which later bands are
//! present.

use bitflags::bitflags;

use crate::codec::registry::byte1;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::io::ReadBytes;

const MAGIC: u32 = 0xCAFE_D00D;

bitflags! {
    /// The segment header's option bitfield (`spec.md` §4.3). Bits outside
    /// this set are reserved; any set reserved bit is a `BadOptions` error,
    /// not silently ignored, since an unknown option can gate a band this
    /// crate does not know to read.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SegmentOptions: u16 {
        /// Attribute-definition bands are present.
        const HAVE_SPECIAL_FORMATS = 1 << 0;
        /// cp Integer/Float/Long/Double counts are present.
        const HAVE_CP_NUMBERS = 1 << 1;
        /// Every code has an explicit flags word.
        const HAVE_ALL_CODE_FLAGS = 1 << 2;
        /// Archive-level file counts are present.
        const HAVE_FILE_HEADERS = 1 << 4;
        /// Advisory: the sink should deflate entries.
        const DEFLATE_HINT = 1 << 5;
        const HAVE_FILE_MODTIME = 1 << 6;
        const HAVE_FILE_OPTIONS = 1 << 7;
        const HAVE_FILE_SIZE_HI = 1 << 8;
        const HAVE_CLASS_FLAGS_HI = 1 << 9;
        const HAVE_FIELD_FLAGS_HI = 1 << 10;
        const HAVE_METHOD_FLAGS_HI = 1 << 11;
    }
}

const RESERVED_MASK: u16 = !0b1111_1111_1111;

/// The fixed-prefix fields of a segment header plus its decoded options,
/// read in the order `spec.md` §4.3 fixes: magic, archive minor, archive
/// major, then the options-gated bands.
#[derive(Debug, Clone)]
pub struct SegmentHeader {
    pub archive_minor: u16,
    pub archive_major: u16,
    pub options: SegmentOptions,
    pub segments_remaining: u32,
    pub archive_size_hi: i32,
    pub archive_size_lo: i32,
    pub archive_next_count: i32,
    pub archive_modtime: i32,
    pub file_count: i32,
}

impl SegmentHeader {
    /// Reads the fixed prefix and the options-driven header bands, using
    /// `default_codec` for every header band (the segment driver has not
    /// yet read a codec registry specifier at this point in the stream:
    /// `spec.md` §4.3 bands are always read with the caller-supplied
    /// default, matching registry specifier `0`).
    pub fn read<R: ReadBytes>(reader: &mut R, default_codec: &mut Codec) -> Result<SegmentHeader> {
        let magic = reader.read_be_u32()?;
        if magic != MAGIC {
            return Err(Error::BadMagic);
        }

        // Magic, version, and options are fixed-width literal fields;
        // everything after them is a run of bands read with the caller's
        // default codec (`spec.md` §4.3).
        let archive_minor = reader.read_be_u16()?;
        let archive_major = reader.read_be_u16()?;

        let raw_options = reader.read_be_u16()?;
        if raw_options & RESERVED_MASK != 0 {
            return Err(Error::BadOptions("reserved option bit set"));
        }
        let options = SegmentOptions::from_bits_truncate(raw_options);

        let segments_remaining = default_codec.decode_one(reader)? as u32;

        let (archive_size_hi, archive_size_lo, archive_next_count, archive_modtime, file_count) =
            if options.contains(SegmentOptions::HAVE_FILE_HEADERS) {
                let hi = default_codec.decode_one(reader)? as i32;
                let lo = default_codec.decode_one(reader)? as i32;
                let next_count = default_codec.decode_one(reader)? as i32;
                let modtime = default_codec.decode_one(reader)? as i32;
                let files = default_codec.decode_one(reader)? as i32;
                (hi, lo, next_count, modtime, files)
            } else {
                (0, 0, 0, 0, 0)
            };

        Ok(SegmentHeader {
            archive_minor,
            archive_major,
            options,
            segments_remaining,
            archive_size_hi,
            archive_size_lo,
            archive_next_count,
            archive_modtime,
            file_count,
        })
    }
}

impl Default for SegmentHeader {
    fn default() -> SegmentHeader {
        SegmentHeader {
            archive_minor: 0,
            archive_major: 0,
            options: SegmentOptions::empty(),
            segments_remaining: 0,
            archive_size_hi: 0,
            archive_size_lo: 0,
            archive_next_count: 0,
            archive_modtime: 0,
            file_count: 0,
        }
    }
}

/// A fresh `BYTE1` codec, the sensible default when a caller has no
/// opinion about the header's own codec (`spec.md` §4.2 calls `0` "the
/// caller-supplied default codec"; the header itself needs one to read
/// with before any registry specifier has been parsed).
pub fn default_header_codec() -> Codec {
    byte1()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufReader;

    fn bytes_for(minor: u16, major: u16, options: u16, segments_remaining: u8) -> Vec<u8> {
        let mut v = MAGIC.to_be_bytes().to_vec();
        v.extend_from_slice(&minor.to_be_bytes());
        v.extend_from_slice(&major.to_be_bytes());
        v.extend_from_slice(&options.to_be_bytes());
        v.push(segments_remaining);
        v
    }

    #[test]
    fn rejects_bad_magic() {
        let mut r = BufReader::new(&[0, 0, 0, 0]);
        let mut codec = default_header_codec();
        assert!(matches!(SegmentHeader::read(&mut r, &mut codec), Err(Error::BadMagic)));
    }

    #[test]
    fn rejects_reserved_option_bits() {
        let bytes = bytes_for(7, 150, 0xFFFF, 0);
        let mut r = BufReader::new(&bytes);
        let mut codec = default_header_codec();
        let err = SegmentHeader::read(&mut r, &mut codec).unwrap_err();
        assert!(matches!(err, Error::BadOptions(_)));
    }

    #[test]
    fn reads_fixed_prefix_with_no_file_headers() {
        let bytes = bytes_for(7, 150, 0, 3);
        let mut r = BufReader::new(&bytes);
        let mut codec = default_header_codec();
        let header = SegmentHeader::read(&mut r, &mut codec).unwrap();
        assert_eq!(header.archive_minor, 7);
        assert_eq!(header.archive_major, 150);
        assert_eq!(header.segments_remaining, 3);
        assert!(header.options.is_empty());
    }
}
