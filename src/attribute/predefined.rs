//! Predefined attribute encoders (`spec.md` Purpose & Scope; SPEC_FULL.md
//! §4.9): the wire format for every attribute the JVM class-file spec
//! defines outright, unchanged from JVMS §4.7. Each implements
//! [`Attribute`]; `resolve` turns a stored `Utf8Ref`/class-name into its
//! constant-pool index, and `write_body` serialises using those resolved
//! indices.

use std::rc::Rc;

use super::Attribute;
use crate::classfile::ClassConstantPool;
use crate::cpool::{Entry, Utf8Ref};
use crate::error::Result;

fn utf8_name(name: &str) -> Utf8Ref {
    Rc::from(name)
}

/// Bundles the bookkeeping every predefined attribute needs: its own
/// name, resolved at `resolve` time to its own `Utf8_info` index (every
/// attribute is itself a named constant-pool entry in the class file).
struct NameSlot {
    name: Utf8Ref,
    name_index: Option<u32>,
}

impl NameSlot {
    fn new(name: &'static str) -> NameSlot {
        NameSlot { name: utf8_name(name), name_index: None }
    }

    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.name_index = Some(pool.index_of(&Entry::Utf8(self.name.clone()))?);
        Ok(())
    }
}

macro_rules! marker_attribute {
    ($name:ident, $wire_name:literal) => {
        /// The `
#[doc = $wire_name]
        /// ` marker attribute: no body.
        pub struct $name {
            slot: NameSlot,
        }

        impl $name {
            pub fn new() -> $name {
                $name { slot: NameSlot::new($wire_name) }
            }
        }

        impl Default for $name {
            fn default() -> $name {
                $name::new()
            }
        }

        impl Attribute for $name {
            fn name(&self) -> &str {
                &self.slot.name
            }
            fn length_without_header(&self) -> u32 {
                0
            }
            fn write_body(&self, _out: &mut Vec<u8>) -> Result<()> {
                Ok(())
            }
            fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
                self.slot.resolve(pool)
            }
            fn nested_entries(&self) -> Vec<Entry> {
                vec![Entry::Utf8(self.slot.name.clone())]
            }
        }
    };
}

marker_attribute!(Deprecated, "Deprecated");
marker_attribute!(Synthetic, "Synthetic");

/// `SourceFile` (JVMS §4.7.10): one `Utf8_info` naming the source file.
pub struct SourceFile {
    slot: NameSlot,
    file: Utf8Ref,
    file_index: Option<u32>,
}

impl SourceFile {
    pub fn new(file: Utf8Ref) -> SourceFile {
        SourceFile { slot: NameSlot::new("SourceFile"), file, file_index: None }
    }
}

impl Attribute for SourceFile {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        2
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let idx = self.file_index.ok_or(crate::error::Error::EmitBeforeResolve)?;
        out.extend_from_slice(&idx.to_be_bytes());
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)?;
        self.file_index = Some(pool.index_of(&Entry::Utf8(self.file.clone()))?);
        Ok(())
    }
    fn nested_entries(&self) -> Vec<Entry> {
        vec![Entry::Utf8(self.slot.name.clone()), Entry::Utf8(self.file.clone())]
    }
}

/// `ConstantValue` (JVMS §4.7.2): a single literal index, whose entry kind
/// is carried so `nested_entries` can add the right thing.
pub enum ConstantValueLiteral {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(Utf8Ref),
}

pub struct ConstantValue {
    slot: NameSlot,
    literal: ConstantValueLiteral,
    value_index: Option<u32>,
}

impl ConstantValue {
    pub fn new(literal: ConstantValueLiteral) -> ConstantValue {
        ConstantValue { slot: NameSlot::new("ConstantValue"), literal, value_index: None }
    }

    fn entry(&self) -> Entry {
        match &self.literal {
            ConstantValueLiteral::Int(v) => Entry::Integer(*v),
            ConstantValueLiteral::Float(v) => Entry::Float(*v),
            ConstantValueLiteral::Long(v) => Entry::Long(*v),
            ConstantValueLiteral::Double(v) => Entry::Double(*v),
            ConstantValueLiteral::String(s) => Entry::String(s.clone()),
        }
    }
}

impl Attribute for ConstantValue {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        2
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let idx = self.value_index.ok_or(crate::error::Error::EmitBeforeResolve)?;
        out.extend_from_slice(&idx.to_be_bytes());
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)?;
        self.value_index = Some(pool.index_of(&self.entry())?);
        Ok(())
    }
    fn nested_entries(&self) -> Vec<Entry> {
        vec![Entry::Utf8(self.slot.name.clone()), self.entry()]
    }
}

/// `Exceptions` (JVMS §4.7.5): a list of checked-exception class names.
pub struct Exceptions {
    slot: NameSlot,
    classes: Vec<Utf8Ref>,
    indices: Option<Vec<u32>>,
}

impl Exceptions {
    pub fn new(classes: Vec<Utf8Ref>) -> Exceptions {
        Exceptions { slot: NameSlot::new("Exceptions"), classes, indices: None }
    }
}

impl Attribute for Exceptions {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        2 + 2 * self.classes.len() as u32
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let indices = self.indices.as_ref().ok_or(crate::error::Error::EmitBeforeResolve)?;
        out.extend_from_slice(&(indices.len() as u16).to_be_bytes());
        for i in indices {
            out.extend_from_slice(&i.to_be_bytes());
        }
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)?;
        self.indices = Some(
            self.classes.iter().map(|c| pool.index_of(&Entry::Class(c.clone()))).collect::<Result<Vec<_>>>()?,
        );
        Ok(())
    }
    fn nested_entries(&self) -> Vec<Entry> {
        let mut out = vec![Entry::Utf8(self.slot.name.clone())];
        out.extend(self.classes.iter().cloned().map(Entry::Class));
        out
    }
}

/// `Signature` (JVMS §4.7.9): one `Utf8_info` carrying a generic signature.
pub struct Signature {
    slot: NameSlot,
    signature: Utf8Ref,
    signature_index: Option<u32>,
}

impl Signature {
    pub fn new(signature: Utf8Ref) -> Signature {
        Signature { slot: NameSlot::new("Signature"), signature, signature_index: None }
    }
}

impl Attribute for Signature {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        2
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let idx = self.signature_index.ok_or(crate::error::Error::EmitBeforeResolve)?;
        out.extend_from_slice(&idx.to_be_bytes());
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)?;
        self.signature_index = Some(pool.index_of(&Entry::Utf8(self.signature.clone()))?);
        Ok(())
    }
    fn nested_entries(&self) -> Vec<Entry> {
        vec![Entry::Utf8(self.slot.name.clone()), Entry::Utf8(self.signature.clone())]
    }
}

/// `EnclosingMethod` (JVMS §4.7.7).
pub struct EnclosingMethod {
    slot: NameSlot,
    class: Utf8Ref,
    method: Option<(Utf8Ref, Utf8Ref)>,
    class_index: Option<u32>,
    method_index: Option<u32>,
}

impl EnclosingMethod {
    pub fn new(class: Utf8Ref, method: Option<(Utf8Ref, Utf8Ref)>) -> EnclosingMethod {
        EnclosingMethod { slot: NameSlot::new("EnclosingMethod"), class, method, class_index: None, method_index: None }
    }
}

impl Attribute for EnclosingMethod {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        4
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let class_idx = self.class_index.ok_or(crate::error::Error::EmitBeforeResolve)?;
        out.extend_from_slice(&class_idx.to_be_bytes());
        out.extend_from_slice(&self.method_index.unwrap_or(0).to_be_bytes());
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)?;
        self.class_index = Some(pool.index_of(&Entry::Class(self.class.clone()))?);
        if let Some((name, descriptor)) = &self.method {
            self.method_index = Some(pool.index_of(&Entry::NameAndType { name: name.clone(), descriptor: descriptor.clone() })?);
        }
        Ok(())
    }
    fn nested_entries(&self) -> Vec<Entry> {
        let mut out = vec![Entry::Utf8(self.slot.name.clone()), Entry::Class(self.class.clone())];
        if let Some((name, descriptor)) = &self.method {
            out.push(Entry::NameAndType { name: name.clone(), descriptor: descriptor.clone() });
        }
        out
    }
}

/// One entry of `InnerClasses` (JVMS §4.7.6).
pub struct InnerClassEntry {
    pub inner_class: Utf8Ref,
    pub outer_class: Option<Utf8Ref>,
    pub inner_name: Option<Utf8Ref>,
    pub access_flags: u16,
}

pub struct InnerClasses {
    slot: NameSlot,
    entries: Vec<InnerClassEntry>,
    resolved: Option<Vec<(u32, u32, u32)>>,
}

impl InnerClasses {
    pub fn new(entries: Vec<InnerClassEntry>) -> InnerClasses {
        InnerClasses { slot: NameSlot::new("InnerClasses"), entries, resolved: None }
    }
}

impl Attribute for InnerClasses {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        2 + 8 * self.entries.len() as u32
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let resolved = self.resolved.as_ref().ok_or(crate::error::Error::EmitBeforeResolve)?;
        out.extend_from_slice(&(resolved.len() as u16).to_be_bytes());
        for (i, (inner, outer, name)) in resolved.iter().enumerate() {
            out.extend_from_slice(&inner.to_be_bytes());
            out.extend_from_slice(&outer.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&self.entries[i].access_flags.to_be_bytes());
        }
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)?;
        let mut resolved = Vec::with_capacity(self.entries.len());
        for e in &self.entries {
            let inner = pool.index_of(&Entry::Class(e.inner_class.clone()))?;
            let outer = match &e.outer_class {
                Some(c) => pool.index_of(&Entry::Class(c.clone()))?,
                None => 0,
            };
            let name = match &e.inner_name {
                Some(n) => pool.index_of(&Entry::Utf8(n.clone()))?,
                None => 0,
            };
            resolved.push((inner, outer, name));
        }
        self.resolved = Some(resolved);
        Ok(())
    }
    fn nested_entries(&self) -> Vec<Entry> {
        let mut out = vec![Entry::Utf8(self.slot.name.clone())];
        for e in &self.entries {
            out.push(Entry::Class(e.inner_class.clone()));
            if let Some(c) = &e.outer_class {
                out.push(Entry::Class(c.clone()));
            }
            if let Some(n) = &e.inner_name {
                out.push(Entry::Utf8(n.clone()));
            }
        }
        out
    }
}

/// `LineNumberTable` (JVMS §4.7.12): `(start_pc, line_number)` pairs.
/// `start_pc` is a packed bytecode index until the code array is laid
/// out; `renumber` patches every entry in place.
pub struct LineNumberTable {
    slot: NameSlot,
    entries: Vec<(u32, u16)>,
}

impl LineNumberTable {
    pub fn new(entries: Vec<(u32, u16)>) -> LineNumberTable {
        LineNumberTable { slot: NameSlot::new("LineNumberTable"), entries }
    }
}

impl Attribute for LineNumberTable {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        2 + 4 * self.entries.len() as u32
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for (start_pc, line) in &self.entries {
            out.extend_from_slice(&(*start_pc as u16).to_be_bytes());
            out.extend_from_slice(&line.to_be_bytes());
        }
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)
    }
    fn nested_entries(&self) -> Vec<Entry> {
        vec![Entry::Utf8(self.slot.name.clone())]
    }
    fn has_bci_renumbering(&self) -> bool {
        true
    }
    /// Converts every packed bytecode index to an absolute byte offset
    /// using the code's `byte_code_offsets` array (`spec.md` §3,
    /// "Attribute"; §4.7 "BCI fixup").
    fn renumber(&mut self, byte_code_offsets: &[u32]) -> Result<()> {
        for (start_pc, _) in &mut self.entries {
            *start_pc = *byte_code_offsets
                .get(*start_pc as usize)
                .ok_or(crate::error::Error::Overflow("LineNumberTable start_pc out of range"))?;
        }
        Ok(())
    }
}

/// One entry of `LocalVariableTable`/`LocalVariableTypeTable` (JVMS
/// §4.7.13/§4.7.14): identical shape, differing only in whether `kind`
/// carries a descriptor or a generic signature.
pub struct LocalVariableEntry {
    pub start_pc: u32,
    pub length: u32,
    pub name: Utf8Ref,
    pub kind: Utf8Ref,
    pub index: u16,
}

pub struct LocalVariableTable {
    slot: NameSlot,
    entries: Vec<LocalVariableEntry>,
    resolved: Option<Vec<(u32, u32, u32)>>,
    is_type_table: bool,
}

impl LocalVariableTable {
    pub fn new(entries: Vec<LocalVariableEntry>) -> LocalVariableTable {
        LocalVariableTable { slot: NameSlot::new("LocalVariableTable"), entries, resolved: None, is_type_table: false }
    }

    pub fn new_type_table(entries: Vec<LocalVariableEntry>) -> LocalVariableTable {
        LocalVariableTable { slot: NameSlot::new("LocalVariableTypeTable"), entries, resolved: None, is_type_table: true }
    }
}

impl Attribute for LocalVariableTable {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        let _ = self.is_type_table;
        2 + 10 * self.entries.len() as u32
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        let resolved = self.resolved.as_ref().ok_or(crate::error::Error::EmitBeforeResolve)?;
        out.extend_from_slice(&(resolved.len() as u16).to_be_bytes());
        for (i, (name_idx, kind_idx, _)) in resolved.iter().enumerate() {
            let e = &self.entries[i];
            out.extend_from_slice(&(e.start_pc as u16).to_be_bytes());
            out.extend_from_slice(&(e.length as u16).to_be_bytes());
            out.extend_from_slice(&(*name_idx as u16).to_be_bytes());
            out.extend_from_slice(&(*kind_idx as u16).to_be_bytes());
            out.extend_from_slice(&e.index.to_be_bytes());
        }
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)?;
        let mut resolved = Vec::with_capacity(self.entries.len());
        for e in &self.entries {
            let name_idx = pool.index_of(&Entry::Utf8(e.name.clone()))?;
            let kind_idx = pool.index_of(&Entry::Utf8(e.kind.clone()))?;
            resolved.push((name_idx, kind_idx, 0));
        }
        self.resolved = Some(resolved);
        Ok(())
    }
    fn nested_entries(&self) -> Vec<Entry> {
        let mut out = vec![Entry::Utf8(self.slot.name.clone())];
        for e in &self.entries {
            out.push(Entry::Utf8(e.name.clone()));
            out.push(Entry::Utf8(e.kind.clone()));
        }
        out
    }
    fn has_bci_renumbering(&self) -> bool {
        true
    }
    fn renumber(&mut self, byte_code_offsets: &[u32]) -> Result<()> {
        for e in &mut self.entries {
            let start = *byte_code_offsets
                .get(e.start_pc as usize)
                .ok_or(crate::error::Error::Overflow("local variable start_pc out of range"))?;
            let end = *byte_code_offsets
                .get((e.start_pc + e.length) as usize)
                .ok_or(crate::error::Error::Overflow("local variable length out of range"))?;
            e.length = end - start;
            e.start_pc = start;
        }
        Ok(())
    }
}

/// `StackMapTable` (JVMS §4.7.4). Pack200 band-decodes its entries the
/// same way as any non-predefined attribute (SPEC_FULL.md §4.9: "its
/// layout is simply built in as a predefined layout string, not
/// hand-coded"); this crate stores the already-assembled byte body,
/// since the shape of a stack-map frame is orthogonal to the constant
/// pool and carries no indices of its own to resolve beyond the ones its
/// verification-type-info entries name.
pub struct StackMapTable {
    slot: NameSlot,
    body: Vec<u8>,
    class_refs: Vec<Utf8Ref>,
}

impl StackMapTable {
    pub fn new(body: Vec<u8>, class_refs: Vec<Utf8Ref>) -> StackMapTable {
        StackMapTable { slot: NameSlot::new("StackMapTable"), body, class_refs }
    }
}

impl Attribute for StackMapTable {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        self.body.len() as u32
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.body);
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)
    }
    fn nested_entries(&self) -> Vec<Entry> {
        let mut out = vec![Entry::Utf8(self.slot.name.clone())];
        out.extend(self.class_refs.iter().cloned().map(Entry::Class));
        out
    }
}

/// `AnnotationDefault` / `RuntimeVisibleAnnotations` /
/// `RuntimeInvisibleAnnotations` / `RuntimeVisibleParameterAnnotations` /
/// `RuntimeInvisibleParameterAnnotations` (JVMS §4.7.16-§4.7.20): these
/// five share one shape here. The annotation grammar itself (`element_value`
/// unions over eight tag kinds) is orthogonal to Pack200's banding and to
/// this crate's own pipeline (Non-goals: "general-purpose class-file
/// toolkit"), so this stores the already-resolved byte body plus the
/// `Utf8`/`Class` entries it references, the same pattern as
/// [`StackMapTable`].
pub struct RawAnnotationAttribute {
    slot: NameSlot,
    body: Vec<u8>,
    referenced: Vec<Entry>,
}

impl RawAnnotationAttribute {
    pub fn annotation_default(body: Vec<u8>, referenced: Vec<Entry>) -> RawAnnotationAttribute {
        RawAnnotationAttribute { slot: NameSlot::new("AnnotationDefault"), body, referenced }
    }
    pub fn runtime_visible_annotations(body: Vec<u8>, referenced: Vec<Entry>) -> RawAnnotationAttribute {
        RawAnnotationAttribute { slot: NameSlot::new("RuntimeVisibleAnnotations"), body, referenced }
    }
    pub fn runtime_invisible_annotations(body: Vec<u8>, referenced: Vec<Entry>) -> RawAnnotationAttribute {
        RawAnnotationAttribute { slot: NameSlot::new("RuntimeInvisibleAnnotations"), body, referenced }
    }
    pub fn runtime_visible_parameter_annotations(body: Vec<u8>, referenced: Vec<Entry>) -> RawAnnotationAttribute {
        RawAnnotationAttribute { slot: NameSlot::new("RuntimeVisibleParameterAnnotations"), body, referenced }
    }
    pub fn runtime_invisible_parameter_annotations(body: Vec<u8>, referenced: Vec<Entry>) -> RawAnnotationAttribute {
        RawAnnotationAttribute { slot: NameSlot::new("RuntimeInvisibleParameterAnnotations"), body, referenced }
    }
}

impl Attribute for RawAnnotationAttribute {
    fn name(&self) -> &str {
        &self.slot.name
    }
    fn length_without_header(&self) -> u32 {
        self.body.len() as u32
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.body);
        Ok(())
    }
    fn resolve(&mut self, pool: &ClassConstantPool) -> Result<()> {
        self.slot.resolve(pool)
    }
    fn nested_entries(&self) -> Vec<Entry> {
        let mut out = vec![Entry::Utf8(self.slot.name.clone())];
        out.extend(self.referenced.iter().cloned());
        out
    }
}

/// `ClassFileVersion`: a Pack200-only pseudo-attribute (SPEC_FULL.md
/// §4.9) carrying a per-class minor/major override. It never appears in
/// the emitted `.class` file's attribute table; the segment driver reads
/// it off the class and applies it to that class's header fields instead.
#[derive(Debug, Clone, Copy)]
pub struct ClassFileVersion {
    pub minor: u16,
    pub major: u16,
}

impl Attribute for ClassFileVersion {
    fn name(&self) -> &str {
        "ClassFileVersion"
    }
    fn length_without_header(&self) -> u32 {
        4
    }
    fn write_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.minor.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        Ok(())
    }
    fn resolve(&mut self, _pool: &ClassConstantPool) -> Result<()> {
        Ok(())
    }
    fn nested_entries(&self) -> Vec<Entry> {
        vec![]
    }
    fn version_override(&self) -> Option<(u16, u16)> {
        Some((self.minor, self.major))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ClassConstantPool;

    #[test]
    fn source_file_resolves_and_writes_its_index() {
        let mut attr = SourceFile::new(Rc::from("Main.java"));
        let mut pool = ClassConstantPool::new(&[]);
        for e in attr.nested_entries() {
            pool.add(e);
        }
        pool.resolve().unwrap();
        attr.resolve(&pool).unwrap();
        let mut out = Vec::new();
        attr.write_body(&mut out).unwrap();
        assert_eq!(out.len(), 2);
        let idx = u16::from_be_bytes([out[0], out[1]]);
        assert_eq!(idx as u32, pool.index_of(&Entry::Utf8(Rc::from("Main.java"))).unwrap());
    }

    #[test]
    fn deprecated_is_a_zero_length_marker() {
        let mut attr = Deprecated::new();
        let mut pool = ClassConstantPool::new(&[]);
        for e in attr.nested_entries() {
            pool.add(e);
        }
        pool.resolve().unwrap();
        attr.resolve(&pool).unwrap();
        assert_eq!(attr.length_without_header(), 0);
        assert_eq!(attr.name(), "Deprecated");
    }

    #[test]
    fn line_number_table_renumbers_packed_indices() {
        let mut attr = LineNumberTable::new(vec![(0, 1), (2, 5)]);
        attr.renumber(&[0, 3, 7, 10]).unwrap();
        let mut pool = ClassConstantPool::new(&[]);
        for e in attr.nested_entries() {
            pool.add(e);
        }
        pool.resolve().unwrap();
        attr.resolve(&pool).unwrap();
        let mut out = Vec::new();
        attr.write_body(&mut out).unwrap();
        assert_eq!(u16::from_be_bytes([out[2], out[3]]), 0);
        assert_eq!(u16::from_be_bytes([out[8], out[9]]), 7);
    }
}
