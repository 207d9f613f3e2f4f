//! Unpacking configuration (component K's entry point, `spec.md` §6).
//!
//! Mirrors the teacher's `FormatOptions`/`MetadataOptions`: a plain data
//! struct with a hand-written `Default` and doc comments on every field,
//! passed by value (by reference, here, since the driver only reads it)
//! into the segment driver's entry point.

use crate::codec::registry::byte1;
use crate::codec::Codec;

/// Recognized options for [`crate::segment::unpack_segment`] (`spec.md`
/// §6: "Configuration with the recognized options").
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// Upper bound on the memory any single band or class buffer may
    /// allocate, in KiB. `0` means unbounded (`spec.md` §6 default).
    pub max_memory_kib: u64,
    /// Overrides the segment header's `DEFLATE_HINT` bit when set,
    /// forcing every sunk entry to be treated as deflated (`Some(true)`)
    /// or stored (`Some(false)`) regardless of what the archive itself
    /// advertises. `None` defers to the header's own bit.
    pub deflate_override: Option<bool>,
    /// The codec the segment header and every band that has not yet read
    /// its own codec-specifier byte decodes with (`spec.md` §4.2,
    /// specifier `0`: "the caller-supplied default codec").
    pub default_codec: Codec,
}

impl Default for UnpackOptions {
    fn default() -> UnpackOptions {
        UnpackOptions { max_memory_kib: 0, deflate_override: None, default_codec: byte1() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded_with_no_deflate_override() {
        let opts = UnpackOptions::default();
        assert_eq!(opts.max_memory_kib, 0);
        assert_eq!(opts.deflate_override, None);
    }
}
