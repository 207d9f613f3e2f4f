//! Attributes: the polymorphic capability set every class-file attribute
//! implements (`spec.md` §3, "Attribute"), the layout-string engine for
//! non-predefined attributes (component F), and the predefined encoders
//! for the ones the JVM class-file format defines outright (`spec.md`
//! Purpose & Scope: "omits the straightforward predefined-attribute
//! encoders... specifies how they plug into the assembler").

pub mod layout;
pub mod predefined;

use crate::classfile::ClassConstantPool;
use crate::error::Result;

/// An attribute ready to be written into a class file.
///
/// Grounded on the Design Notes' guidance to replace the source's deep
/// `ClassFileEntry -> Attribute -> concrete attribute` inheritance chain
/// with a trait object over a shared capability set: concrete attribute
/// kinds (predefined encoders, and the layout engine's generic decoded
/// attribute) each implement this trait once.
pub trait Attribute {
    /// The UTF-8 name this attribute is stored under.
    fn name(&self) -> &str;

    /// Length of `write_body`'s output, without the 6-byte
    /// `(name_index, length)` header.
    fn length_without_header(&self) -> u32;

    /// Writes the attribute body (no header) to `out`.
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Resolves every nested constant-pool reference against `pool`.
    /// Must run exactly once, before `write_body` or `nested_entries`.
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()>;

    /// Every constant-pool entry this attribute's body refers to, so the
    /// assembler can add them before building the final pool
    /// (`spec.md` §4.8 step 2: "Adding an entry transitively adds its
    /// nested cp entries").
    fn nested_entries(&self) -> Vec<crate::cpool::Entry>;

    /// Whether this attribute carries packed bytecode indices that must
    /// be renumbered to byte offsets once the method's code array is
    /// fully laid out (`spec.md` §3, "Attribute").
    fn has_bci_renumbering(&self) -> bool {
        false
    }

    /// Maps this attribute's packed bytecode indices to resolved byte
    /// offsets, using the instruction stream's `byte_code_offsets` table
    /// (`spec.md` §3, "Attribute": "additionally expose
    /// `renumber(byte_code_offsets)`"). A no-op for attributes that don't
    /// carry bytecode indices.
    fn renumber(&mut self, byte_code_offsets: &[u32]) -> Result<()> {
        let _ = byte_code_offsets;
        Ok(())
    }

    /// `Some((minor, major))` for the `ClassFileVersion` pseudo-attribute
    /// (SPEC_FULL.md §4.9): a per-class version override that never
    /// reaches the emitted class file's own attribute table. `None` for
    /// every other attribute.
    fn version_override(&self) -> Option<(u16, u16)> {
        None
    }
}
