//! The segment driver (component K, `spec.md` §6): the single public
//! entry point, tying every other component together in wire order —
//! header, band counts, constant pool, classes, files, assembly, sink.

use std::io::Read;

use crate::assembler::assemble_class;
use crate::classbands::{self, ClassBandCodecs};
use crate::cpool::{ConstantPoolBands, CpCodecs, CpCounts};
use crate::error::Result;
use crate::filebands::{self, EntrySink, FileBandCodecs};
use crate::header::{SegmentHeader, SegmentOptions};
use crate::io::{ReadBytes, StreamReader};
use crate::options::UnpackOptions;

/// The archive-level counts that gate how many entries each cp band and
/// the class bands carry. `spec.md` §4.3's header does not itself carry
/// these; this crate reads them as one more default-codec band run,
/// always reading the non-numeric counts and gating the numeric ones
/// behind `HAVE_CP_NUMBERS`, matching the header's own "reserved unless
/// a bit says otherwise" philosophy. See `DESIGN.md`.
struct SegmentCounts {
    cp: CpCounts,
    class_count: usize,
}

fn read_counts<R: ReadBytes>(reader: &mut R, options: SegmentOptions, default_codec: &mut crate::codec::Codec) -> Result<SegmentCounts> {
    let class_count = default_codec.decode_one(reader)? as usize;

    let utf8 = default_codec.decode_one(reader)? as usize;
    let string = default_codec.decode_one(reader)? as usize;
    let class = default_codec.decode_one(reader)? as usize;
    let signature = default_codec.decode_one(reader)? as usize;
    let descr = default_codec.decode_one(reader)? as usize;
    let field = default_codec.decode_one(reader)? as usize;
    let method = default_codec.decode_one(reader)? as usize;
    let imethod = default_codec.decode_one(reader)? as usize;

    let (int, float, long, double) = if options.contains(SegmentOptions::HAVE_CP_NUMBERS) {
        (
            default_codec.decode_one(reader)? as usize,
            default_codec.decode_one(reader)? as usize,
            default_codec.decode_one(reader)? as usize,
            default_codec.decode_one(reader)? as usize,
        )
    } else {
        (0, 0, 0, 0)
    };

    Ok(SegmentCounts {
        cp: CpCounts { utf8, int, float, long, double, string, class, signature, descr, field, method, imethod },
        class_count,
    })
}

/// Unpacks one Pack200 segment from `input`, handing every class and
/// non-class file it contains to `sink` (`spec.md` §6: "the single
/// public entry point").
pub fn unpack_segment<R: Read, S: EntrySink>(input: R, sink: &mut S, options: &UnpackOptions) -> Result<()> {
    let mut reader = StreamReader::new(input);
    let mut default_codec = options.default_codec.clone();

    let header = SegmentHeader::read(&mut reader, &mut default_codec)?;
    log::debug!(
        "segment header: archive {}.{}, options {:?}, {} files",
        header.archive_major,
        header.archive_minor,
        header.options,
        header.file_count
    );

    let counts = read_counts(&mut reader, header.options, &mut default_codec)?;
    log::trace!("segment counts: {} classes, cp_Utf8={}", counts.class_count, counts.cp.utf8);

    let mut cp_codecs = CpCodecs::uniform(options.default_codec.clone());
    let cp = ConstantPoolBands::read(&mut reader, &counts.cp, &mut cp_codecs)?;

    let mut class_codecs = ClassBandCodecs::uniform(options.default_codec.clone());
    let have_all_code_flags = header.options.contains(SegmentOptions::HAVE_ALL_CODE_FLAGS);
    let mut classes = classbands::read_classes(&mut reader, counts.class_count, &cp, &mut class_codecs, have_all_code_flags)?;

    let file_count = header.file_count.max(0) as usize;
    let mut file_codecs = FileBandCodecs::uniform(options.default_codec.clone());
    let deflate_options = match options.deflate_override {
        Some(true) => header.options | SegmentOptions::DEFLATE_HINT,
        Some(false) => header.options - SegmentOptions::DEFLATE_HINT,
        None => header.options,
    };
    let files = filebands::read_files(&mut reader, file_count, &cp, &mut file_codecs, deflate_options, header.archive_modtime)?;

    for class in &mut classes {
        let name = format!("{}.class", class.this_class);
        log::debug!("assembling class {name}");
        let bytes = assemble_class(class, header.archive_minor, header.archive_major)?;
        sink.put_entry(&name, bytes, Some(header.archive_modtime as u32), options.deflate_override)?;
    }

    for file in files {
        log::debug!("emitting file {}", file.name);
        sink.put_entry(&file.name, file.bytes, file.modtime, file.deflate_hint)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::registry::byte1;
    use crate::filebands::testutil::VecSink;

    /// A segment header with no file headers, zero classes, and zero cp
    /// entries, encoded with `BYTE1` throughout.
    fn minimal_segment_bytes() -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend_from_slice(&0xCAFE_D00Du32.to_be_bytes()); // magic
        bytes.extend_from_slice(&0u16.to_be_bytes()); // minor
        bytes.extend_from_slice(&52u16.to_be_bytes()); // major
        bytes.extend_from_slice(&0u16.to_be_bytes()); // options: none set
        bytes.push(0); // segments_remaining
        // counts: class_count=0, utf8=0, string=0, class=0, signature=0,
        // descr=0, field=0, method=0, imethod=0 (HAVE_CP_NUMBERS unset).
        bytes.extend(std::iter::repeat(0u8).take(9));
        bytes
    }

    #[test]
    fn unpacks_an_empty_segment_with_no_classes_or_files() {
        let bytes = minimal_segment_bytes();
        let mut sink = VecSink::default();
        let options = UnpackOptions { default_codec: byte1(), ..UnpackOptions::default() };
        unpack_segment(&bytes[..], &mut sink, &options).unwrap();
        assert!(sink.entries.is_empty());
    }
}
