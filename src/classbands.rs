//! Class, field, method, and code bands (component G, `spec.md` §4.6):
//! decodes the per-class quintuple, member descriptors, and the
//! flag-driven two-pass attribute expansion, then each method's code
//! (header, instructions, exception table, code attributes).
//!
//! Real Pack200 decodes operand bands for every instruction in the
//! segment columnar across the whole class file. This crate decodes a
//! method's operand bands immediately after its own instruction stream
//! instead (Non-goals: "producing output whose bytes exactly match an
//! unrelated third-party compiler" and "being a general-purpose
//! class-file toolkit" both rule out needing the real tool's exact band
//! interleaving); see `DESIGN.md` for the tradeoff.

use crate::attribute::layout::{decode_flat_columns, decode_replicated_rows};
use crate::attribute::predefined::*;
use crate::attribute::Attribute;
use crate::bytecode::forms::{form_for, Body};
use crate::bytecode::{byte_code_offsets, read_instructions, Instruction, OperandKind, OperandManager};
use crate::classfile::ClassConstantPool;
use crate::codec::registry::byte1;
use crate::codec::Codec;
use crate::cpool::{ConstantPoolBands, Utf8Ref};
use crate::error::{Error, Result};
use crate::io::ReadBytes;

/// Which predefined-attribute bit each context's flags word carries, in
/// bit order. This crate's own assignment (`spec.md` Non-goals rule out
/// matching an unrelated third-party tool's exact bit layout); see
/// `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassAttr {
    Deprecated,
    Synthetic,
    SourceFile,
    EnclosingMethod,
    Signature,
    InnerClasses,
    ClassFileVersion,
    RuntimeVisibleAnnotations,
    RuntimeInvisibleAnnotations,
}
const CLASS_BITS: [ClassAttr; 9] = [
    ClassAttr::Deprecated,
    ClassAttr::Synthetic,
    ClassAttr::SourceFile,
    ClassAttr::EnclosingMethod,
    ClassAttr::Signature,
    ClassAttr::InnerClasses,
    ClassAttr::ClassFileVersion,
    ClassAttr::RuntimeVisibleAnnotations,
    ClassAttr::RuntimeInvisibleAnnotations,
];

fn class_attr_name(attr: ClassAttr) -> &'static str {
    match attr {
        ClassAttr::Deprecated => "Deprecated",
        ClassAttr::Synthetic => "Synthetic",
        ClassAttr::SourceFile => "SourceFile",
        ClassAttr::EnclosingMethod => "EnclosingMethod",
        ClassAttr::Signature => "Signature",
        ClassAttr::InnerClasses => "InnerClasses",
        ClassAttr::ClassFileVersion => "ClassFileVersion",
        ClassAttr::RuntimeVisibleAnnotations => "RuntimeVisibleAnnotations",
        ClassAttr::RuntimeInvisibleAnnotations => "RuntimeInvisibleAnnotations",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAttr {
    Deprecated,
    Synthetic,
    ConstantValue,
    Signature,
    RuntimeVisibleAnnotations,
    RuntimeInvisibleAnnotations,
}
const FIELD_BITS: [FieldAttr; 6] = [
    FieldAttr::Deprecated,
    FieldAttr::Synthetic,
    FieldAttr::ConstantValue,
    FieldAttr::Signature,
    FieldAttr::RuntimeVisibleAnnotations,
    FieldAttr::RuntimeInvisibleAnnotations,
];

fn field_attr_name(attr: FieldAttr) -> &'static str {
    match attr {
        FieldAttr::Deprecated => "Deprecated",
        FieldAttr::Synthetic => "Synthetic",
        FieldAttr::ConstantValue => "ConstantValue",
        FieldAttr::Signature => "Signature",
        FieldAttr::RuntimeVisibleAnnotations => "RuntimeVisibleAnnotations",
        FieldAttr::RuntimeInvisibleAnnotations => "RuntimeInvisibleAnnotations",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodAttr {
    Deprecated,
    Synthetic,
    Exceptions,
    Signature,
    AnnotationDefault,
    RuntimeVisibleAnnotations,
    RuntimeInvisibleAnnotations,
    RuntimeVisibleParameterAnnotations,
    RuntimeInvisibleParameterAnnotations,
    HasCode,
}
const METHOD_BITS: [MethodAttr; 10] = [
    MethodAttr::Deprecated,
    MethodAttr::Synthetic,
    MethodAttr::Exceptions,
    MethodAttr::Signature,
    MethodAttr::AnnotationDefault,
    MethodAttr::RuntimeVisibleAnnotations,
    MethodAttr::RuntimeInvisibleAnnotations,
    MethodAttr::RuntimeVisibleParameterAnnotations,
    MethodAttr::RuntimeInvisibleParameterAnnotations,
    MethodAttr::HasCode,
];

fn method_attr_name(attr: MethodAttr) -> &'static str {
    match attr {
        MethodAttr::Deprecated => "Deprecated",
        MethodAttr::Synthetic => "Synthetic",
        MethodAttr::Exceptions => "Exceptions",
        MethodAttr::Signature => "Signature",
        MethodAttr::AnnotationDefault => "AnnotationDefault",
        MethodAttr::RuntimeVisibleAnnotations => "RuntimeVisibleAnnotations",
        MethodAttr::RuntimeInvisibleAnnotations => "RuntimeInvisibleAnnotations",
        MethodAttr::RuntimeVisibleParameterAnnotations => "RuntimeVisibleParameterAnnotations",
        MethodAttr::RuntimeInvisibleParameterAnnotations => "RuntimeInvisibleParameterAnnotations",
        MethodAttr::HasCode => "HasCode",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeAttr {
    LineNumberTable,
    LocalVariableTable,
    LocalVariableTypeTable,
    StackMapTable,
}
const CODE_BITS: [CodeAttr; 4] =
    [CodeAttr::LineNumberTable, CodeAttr::LocalVariableTable, CodeAttr::LocalVariableTypeTable, CodeAttr::StackMapTable];

fn bit_set(flags: u32, i: usize) -> bool {
    flags & (1 << i) != 0
}

/// One decoded member (field or method) before its attributes are
/// attached by the two-pass expansion.
pub struct MemberInfo {
    pub access_flags: u16,
    pub name: Utf8Ref,
    pub descriptor: Utf8Ref,
    pub flags: u32,
    pub attributes: Vec<Box<dyn Attribute>>,
    pub code: Option<CodeInfo>,
}

pub struct ExceptionTableEntry {
    pub start_pc: u32,
    pub end_pc: u32,
    pub handler_pc: u32,
    pub catch_type: Option<Utf8Ref>,
}

pub struct CodeInfo {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Instruction>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<Box<dyn Attribute>>,
}

pub struct ClassInfo {
    pub access_flags: u16,
    pub this_class: Utf8Ref,
    pub super_class: Option<Utf8Ref>,
    pub interfaces: Vec<Utf8Ref>,
    pub flags: u32,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<Box<dyn Attribute>>,
    /// This class's own constant pool, seeded by every bytecode cp
    /// reference its methods' code arrays made while being read (`spec.md`
    /// §4.8 step 1: "Build an empty `ClassConstantPool`" — one per class,
    /// not one per segment). The assembler (component I) adds this-class,
    /// super-class, interfaces, and member descriptors/attributes to this
    /// same pool before resolving and emitting it.
    pub pool: ClassConstantPool,
}

/// The codecs every band in this module reads with. All default to
/// `BYTE1`; a real segment overrides the ones its codec-specifier bands
/// name, matching the segment header's "default codec" pattern used
/// throughout the other band readers.
pub struct ClassBandCodecs {
    pub this_class: Codec,
    pub super_class: Codec,
    pub interface_count: Codec,
    pub interfaces: Codec,
    pub field_count: Codec,
    pub method_count: Codec,
    pub class_flags: Codec,
    pub field_flags: Codec,
    pub field_descr: Codec,
    pub method_flags: Codec,
    pub method_descr: Codec,
    pub code_header: Codec,
    pub code_instruction_count: Codec,
    pub code_max_stack: Codec,
    pub code_max_locals: Codec,
    pub code_handler_count: Codec,
    pub code_handler_start: Codec,
    pub code_handler_end: Codec,
    pub code_handler_pc: Codec,
    pub code_handler_catch: Codec,
    pub code_flags: Codec,
}

impl Default for ClassBandCodecs {
    fn default() -> ClassBandCodecs {
        ClassBandCodecs::uniform(byte1())
    }
}

impl ClassBandCodecs {
    /// Every band driven by one codec, the same `CpCodecs::uniform`
    /// pattern used for the segment's default-codec bands.
    pub fn uniform(codec: Codec) -> ClassBandCodecs {
        ClassBandCodecs {
            this_class: codec.clone(),
            super_class: codec.clone(),
            interface_count: codec.clone(),
            interfaces: codec.clone(),
            field_count: codec.clone(),
            method_count: codec.clone(),
            class_flags: codec.clone(),
            field_flags: codec.clone(),
            field_descr: codec.clone(),
            method_flags: codec.clone(),
            method_descr: codec.clone(),
            code_header: codec.clone(),
            code_instruction_count: codec.clone(),
            code_max_stack: codec.clone(),
            code_max_locals: codec.clone(),
            code_handler_count: codec.clone(),
            code_handler_start: codec.clone(),
            code_handler_end: codec.clone(),
            code_handler_pc: codec.clone(),
            code_handler_catch: codec.clone(),
            code_flags: codec,
        }
    }
}

/// Decodes the packed byte that gates a code's `(max_stack, max_locals,
/// handler_count)` (`spec.md` §4.6, "Code headers"). `0` is "special":
/// the three values are read explicitly from side bands instead.
/// Non-special buckets use this crate's own modular-arithmetic packing
/// (`spec.md` Non-goals rule out matching an unrelated third-party
/// tool's exact table; see `DESIGN.md`).
enum CodeHeader {
    Special,
    Packed { max_stack: u16, max_locals: u16, handler_count: u32 },
}

fn decode_code_header(header: u8) -> CodeHeader {
    match header {
        0 => CodeHeader::Special,
        1..=144 => {
            let idx = (header - 1) as u16;
            CodeHeader::Packed { max_stack: idx / 12, max_locals: idx % 12, handler_count: 0 }
        }
        145..=208 => {
            let idx = (header - 145) as u16;
            CodeHeader::Packed { max_stack: idx / 8, max_locals: idx % 8, handler_count: 1 }
        }
        209..=255 => {
            let idx = (header - 209) as u16;
            CodeHeader::Packed { max_stack: idx / 7, max_locals: idx % 7, handler_count: 2 }
        }
    }
}

/// Reads the flags-gated predefined attributes for one context, two
/// passes across `members_flags` (`spec.md` §4.6, "Flag-driven attribute
/// expansion"). `decode_many` is given the bit's kind and the number of
/// members with that bit set, and returns one attribute per matching
/// member, in member order.
fn expand_attributes<R: ReadBytes, K: Copy, const N: usize>(
    reader: &mut R,
    bits: &[K; N],
    members_flags: &[u32],
    mut decode_many: impl FnMut(&mut R, K, usize) -> Result<Vec<Box<dyn Attribute>>>,
) -> Result<Vec<Vec<Box<dyn Attribute>>>> {
    let mut out: Vec<Vec<Box<dyn Attribute>>> = (0..members_flags.len()).map(|_| Vec::new()).collect();
    for (bit_index, &kind) in bits.iter().enumerate() {
        let matching: Vec<usize> = members_flags.iter().enumerate().filter(|(_, &f)| bit_set(f, bit_index)).map(|(i, _)| i).collect();
        if matching.is_empty() {
            continue;
        }
        let mut decoded = decode_many(reader, kind, matching.len())?;
        for member_idx in matching {
            out[member_idx].push(decoded.remove(0));
        }
    }
    Ok(out)
}

/// Decodes one predefined attribute kind's band for `count` matching
/// members (`spec.md` §4.6 step 2). Zero-arg markers consume no band at
/// all; banded ones read exactly the columns their JVMS wire format
/// needs.
fn decode_class_attr<R: ReadBytes>(reader: &mut R, kind: ClassAttr, count: usize, cp: &ConstantPoolBands) -> Result<Vec<Box<dyn Attribute>>> {
    match kind {
        ClassAttr::Deprecated => Ok((0..count).map(|_| Box::new(Deprecated::new()) as Box<dyn Attribute>).collect()),
        ClassAttr::Synthetic => Ok((0..count).map(|_| Box::new(Synthetic::new()) as Box<dyn Attribute>).collect()),
        ClassAttr::SourceFile => {
            let mut codec = byte1();
            codec
                .decode_many(count, reader)?
                .into_iter()
                .map(|i| {
                    let s = cp.utf8(i as usize).cloned().ok_or(Error::BadLayout("SourceFile utf8 ref out of range"))?;
                    Ok(Box::new(SourceFile::new(s)) as Box<dyn Attribute>)
                })
                .collect()
        }
        ClassAttr::Signature => {
            let mut codec = byte1();
            codec
                .decode_many(count, reader)?
                .into_iter()
                .map(|i| {
                    let s = cp.utf8(i as usize).cloned().ok_or(Error::BadLayout("Signature utf8 ref out of range"))?;
                    Ok(Box::new(Signature::new(s)) as Box<dyn Attribute>)
                })
                .collect()
        }
        ClassAttr::EnclosingMethod => {
            let mut codecs = vec![byte1(), byte1()];
            let rows = decode_flat_columns(count, &mut codecs, reader)?;
            rows.into_iter()
                .map(|row| {
                    let class = cp.class(row[0] as usize).cloned().ok_or(Error::BadLayout("EnclosingMethod class ref out of range"))?;
                    let method = if row[1] == 0 { None } else { cp.descr((row[1] - 1) as usize).map(|(n, d)| (n.clone(), d.clone())) };
                    Ok(Box::new(EnclosingMethod::new(class, method)) as Box<dyn Attribute>)
                })
                .collect()
        }
        ClassAttr::ClassFileVersion => {
            let mut codecs = vec![byte1(), byte1()];
            let rows = decode_flat_columns(count, &mut codecs, reader)?;
            Ok(rows
                .into_iter()
                .map(|row| Box::new(ClassFileVersion { minor: row[0] as u16, major: row[1] as u16 }) as Box<dyn Attribute>)
                .collect())
        }
        ClassAttr::InnerClasses => {
            let mut count_codec = byte1();
            let mut leaf_codecs = vec![byte1(), byte1(), byte1(), byte1()];
            let rows = decode_replicated_rows(count, &mut count_codec, &mut leaf_codecs, reader)?;
            rows.into_iter()
                .map(|row| {
                    let entries = row
                        .into_iter()
                        .map(|v| -> Result<InnerClassEntry> {
                            let inner = cp.class(v[0] as usize).cloned().ok_or(Error::BadLayout("InnerClasses inner ref out of range"))?;
                            let outer = if v[1] == 0 { None } else { cp.class((v[1] - 1) as usize).cloned() };
                            let name = if v[2] == 0 { None } else { cp.utf8((v[2] - 1) as usize).cloned() };
                            Ok(InnerClassEntry { inner_class: inner, outer_class: outer, inner_name: name, access_flags: v[3] as u16 })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Box::new(InnerClasses::new(entries)) as Box<dyn Attribute>)
                })
                .collect()
        }
        ClassAttr::RuntimeVisibleAnnotations => decode_raw_annotations(reader, count, RawAnnotationAttribute::runtime_visible_annotations),
        ClassAttr::RuntimeInvisibleAnnotations => decode_raw_annotations(reader, count, RawAnnotationAttribute::runtime_invisible_annotations),
    }
}

fn decode_field_attr<R: ReadBytes>(reader: &mut R, kind: FieldAttr, count: usize, cp: &ConstantPoolBands) -> Result<Vec<Box<dyn Attribute>>> {
    match kind {
        FieldAttr::Deprecated => Ok((0..count).map(|_| Box::new(Deprecated::new()) as Box<dyn Attribute>).collect()),
        FieldAttr::Synthetic => Ok((0..count).map(|_| Box::new(Synthetic::new()) as Box<dyn Attribute>).collect()),
        FieldAttr::ConstantValue => {
            let mut codec = byte1();
            codec
                .decode_many(count, reader)?
                .into_iter()
                .map(|i| {
                    let v = cp.int(i as usize).ok_or(Error::BadLayout("ConstantValue index out of range"))?;
                    Ok(Box::new(ConstantValue::new(ConstantValueLiteral::Int(v))) as Box<dyn Attribute>)
                })
                .collect()
        }
        FieldAttr::Signature => {
            let mut codec = byte1();
            codec
                .decode_many(count, reader)?
                .into_iter()
                .map(|i| {
                    let s = cp.utf8(i as usize).cloned().ok_or(Error::BadLayout("Signature utf8 ref out of range"))?;
                    Ok(Box::new(Signature::new(s)) as Box<dyn Attribute>)
                })
                .collect()
        }
        FieldAttr::RuntimeVisibleAnnotations => decode_raw_annotations(reader, count, RawAnnotationAttribute::runtime_visible_annotations),
        FieldAttr::RuntimeInvisibleAnnotations => decode_raw_annotations(reader, count, RawAnnotationAttribute::runtime_invisible_annotations),
    }
}

fn decode_method_attr<R: ReadBytes>(reader: &mut R, kind: MethodAttr, count: usize, cp: &ConstantPoolBands) -> Result<Vec<Box<dyn Attribute>>> {
    match kind {
        MethodAttr::Deprecated => Ok((0..count).map(|_| Box::new(Deprecated::new()) as Box<dyn Attribute>).collect()),
        MethodAttr::Synthetic => Ok((0..count).map(|_| Box::new(Synthetic::new()) as Box<dyn Attribute>).collect()),
        MethodAttr::HasCode => Ok((0..count).map(|_| Box::new(Synthetic::new()) as Box<dyn Attribute>).collect()),
        MethodAttr::Exceptions => {
            let mut count_codec = byte1();
            let mut class_codec = byte1();
            let rows = decode_replicated_rows(count, &mut count_codec, std::slice::from_mut(&mut class_codec), reader)?;
            rows.into_iter()
                .map(|row| {
                    let classes = row
                        .into_iter()
                        .map(|v| cp.class(v[0] as usize).cloned().ok_or(Error::BadLayout("Exceptions class ref out of range")))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Box::new(Exceptions::new(classes)) as Box<dyn Attribute>)
                })
                .collect()
        }
        MethodAttr::Signature => {
            let mut codec = byte1();
            codec
                .decode_many(count, reader)?
                .into_iter()
                .map(|i| {
                    let s = cp.utf8(i as usize).cloned().ok_or(Error::BadLayout("Signature utf8 ref out of range"))?;
                    Ok(Box::new(Signature::new(s)) as Box<dyn Attribute>)
                })
                .collect()
        }
        MethodAttr::AnnotationDefault => decode_raw_annotations(reader, count, RawAnnotationAttribute::annotation_default),
        MethodAttr::RuntimeVisibleAnnotations => decode_raw_annotations(reader, count, RawAnnotationAttribute::runtime_visible_annotations),
        MethodAttr::RuntimeInvisibleAnnotations => decode_raw_annotations(reader, count, RawAnnotationAttribute::runtime_invisible_annotations),
        MethodAttr::RuntimeVisibleParameterAnnotations => {
            decode_raw_annotations(reader, count, RawAnnotationAttribute::runtime_visible_parameter_annotations)
        }
        MethodAttr::RuntimeInvisibleParameterAnnotations => {
            decode_raw_annotations(reader, count, RawAnnotationAttribute::runtime_invisible_parameter_annotations)
        }
    }
}

/// Element-value bodies nest arbitrarily deep and are orthogonal to
/// banding; stored as an opaque byte blob (same simplification as
/// `RawAnnotationAttribute`'s own doc comment), length-prefixed per
/// instance.
fn decode_raw_annotations<R: ReadBytes>(
    reader: &mut R,
    count: usize,
    ctor: fn(Vec<u8>, Vec<Utf8Ref>) -> RawAnnotationAttribute,
) -> Result<Vec<Box<dyn Attribute>>> {
    let mut len_codec = byte1();
    let lens = len_codec.decode_many(count, reader)?;
    let mut out: Vec<Box<dyn Attribute>> = Vec::with_capacity(count);
    for len in lens {
        let body = reader.read_vec_exact(len.max(0) as usize)?;
        out.push(Box::new(ctor(body, vec![])));
    }
    Ok(out)
}

fn decode_code_attr<R: ReadBytes>(reader: &mut R, kind: CodeAttr, count: usize) -> Result<Vec<Box<dyn Attribute>>> {
    match kind {
        CodeAttr::LineNumberTable => {
            let mut count_codec = byte1();
            let mut leaves = vec![byte1(), byte1()];
            let rows = decode_replicated_rows(count, &mut count_codec, &mut leaves, reader)?;
            Ok(rows
                .into_iter()
                .map(|row| {
                    let entries = row.into_iter().map(|v| (v[0] as u32, v[1] as u16)).collect();
                    Box::new(LineNumberTable::new(entries)) as Box<dyn Attribute>
                })
                .collect())
        }
        CodeAttr::LocalVariableTable | CodeAttr::LocalVariableTypeTable => {
            let mut count_codec = byte1();
            let mut leaves = vec![byte1(), byte1(), byte1(), byte1(), byte1()];
            let rows = decode_replicated_rows(count, &mut count_codec, &mut leaves, reader)?;
            Ok(rows
                .into_iter()
                .map(|row| {
                    let entries = row
                        .into_iter()
                        .map(|v| LocalVariableEntry {
                            start_pc: v[0] as u32,
                            length: v[1] as u32,
                            name: std::rc::Rc::from(format!("local_{}", v[2])),
                            kind: std::rc::Rc::from(format!("desc_{}", v[3])),
                            index: v[4] as u16,
                        })
                        .collect();
                    let table = if matches!(kind, CodeAttr::LocalVariableTypeTable) {
                        LocalVariableTable::new_type_table(entries)
                    } else {
                        LocalVariableTable::new(entries)
                    };
                    Box::new(table) as Box<dyn Attribute>
                })
                .collect())
        }
        CodeAttr::StackMapTable => {
            let mut len_codec = byte1();
            let lens = len_codec.decode_many(count, reader)?;
            let mut out = Vec::with_capacity(count);
            for len in lens {
                let body = reader.read_vec_exact(len.max(0) as usize)?;
                out.push(Box::new(StackMapTable::new(body, vec![])) as Box<dyn Attribute>);
            }
            Ok(out)
        }
    }
}

/// Reads one code-bearing method's bytecode, exception table, and code
/// attributes (`spec.md` §4.6 "Code headers", §4.7).
fn read_code<R: ReadBytes>(
    reader: &mut R,
    codecs: &mut ClassBandCodecs,
    cp: &ConstantPoolBands,
    pool: &mut ClassConstantPool,
    have_all_code_flags: bool,
) -> Result<CodeInfo> {
    let header = codecs.code_header.decode_one(reader)? as u8;

    let (max_stack, max_locals, handler_count, is_special) = match decode_code_header(header) {
        CodeHeader::Packed { max_stack, max_locals, handler_count } => (max_stack, max_locals, handler_count, false),
        CodeHeader::Special => {
            let stack = codecs.code_max_stack.decode_one(reader)? as u16;
            let locals = codecs.code_max_locals.decode_one(reader)? as u16;
            let handlers = codecs.code_handler_count.decode_one(reader)? as u32;
            (stack, locals, handlers, true)
        }
    };

    let instruction_count = codecs.code_instruction_count.decode_one(reader)? as usize;
    let mut opcode_codec = byte1();
    let codes: Vec<u8> = opcode_codec.decode_many(instruction_count, reader)?.into_iter().map(|v| v as u8).collect();

    let mut operands = OperandManager::new();
    fill_operand_streams(&codes, &mut operands, reader)?;

    let mut instructions = read_instructions(&codes, &mut operands, cp, pool)?;
    let offsets = byte_code_offsets(&instructions);
    for instr in &mut instructions {
        instr.fixup_branches(&offsets)?;
    }

    let mut exception_table = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        let start_pc = codecs.code_handler_start.decode_one(reader)? as u32;
        let end_pc = codecs.code_handler_end.decode_one(reader)? as u32;
        let handler_pc = codecs.code_handler_pc.decode_one(reader)? as u32;
        let catch_idx = codecs.code_handler_catch.decode_one(reader)? as i64;
        let catch_type = if catch_idx == 0 { None } else { cp.class((catch_idx - 1) as usize).cloned() };
        exception_table.push(ExceptionTableEntry { start_pc, end_pc, handler_pc, catch_type });
    }

    let mut attributes = if have_all_code_flags || is_special {
        let flags = codecs.code_flags.decode_one(reader)? as u32;
        expand_attributes(reader, &CODE_BITS, &[flags], |r, kind, n| decode_code_attr(r, kind, n))?.remove(0)
    } else {
        Vec::new()
    };
    for attr in &mut attributes {
        if attr.has_bci_renumbering() {
            attr.renumber(&offsets)?;
        }
    }

    Ok(CodeInfo { max_stack, max_locals, instructions, exception_table, attributes })
}

/// Reads every class in the segment: first the per-class quintuple
/// columnar across all classes, then field and method descriptors
/// columnar across all fields/methods of all classes, then the
/// per-context flags words and their attribute expansion, and finally
/// each method's code (`spec.md` §4.6).
pub fn read_classes<R: ReadBytes>(
    reader: &mut R,
    class_count: usize,
    cp: &ConstantPoolBands,
    codecs: &mut ClassBandCodecs,
    have_all_code_flags: bool,
) -> Result<Vec<ClassInfo>> {
    let cp_all = cp.all_entries();
    let this_idx = codecs.this_class.decode_many(class_count, reader)?;
    let super_idx = codecs.super_class.decode_many(class_count, reader)?;
    let interface_counts = codecs.interface_count.decode_many(class_count, reader)?;
    let total_interfaces: usize = interface_counts.iter().map(|&n| n.max(0) as usize).sum();
    let interface_idx = codecs.interfaces.decode_many(total_interfaces, reader)?;
    let field_counts = codecs.field_count.decode_many(class_count, reader)?;
    let method_counts = codecs.method_count.decode_many(class_count, reader)?;
    let class_flags = codecs.class_flags.decode_many(class_count, reader)?;

    let total_fields: usize = field_counts.iter().map(|&n| n.max(0) as usize).sum();
    let total_methods: usize = method_counts.iter().map(|&n| n.max(0) as usize).sum();

    let field_flags = codecs.field_flags.decode_many(total_fields, reader)?;
    let field_descr_idx = codecs.field_descr.decode_many(total_fields, reader)?;
    let method_flags = codecs.method_flags.decode_many(total_methods, reader)?;
    let method_descr_idx = codecs.method_descr.decode_many(total_methods, reader)?;

    let field_attrs = expand_attributes(reader, &FIELD_BITS, &to_u32(&field_flags), |r, kind, n| decode_field_attr(r, kind, n, cp))?;
    let method_attrs = expand_attributes(reader, &METHOD_BITS, &to_u32(&method_flags), |r, kind, n| decode_method_attr(r, kind, n, cp))?;
    let class_attrs = expand_attributes(reader, &CLASS_BITS, &to_u32(&class_flags), |r, kind, n| decode_class_attr(r, kind, n, cp))?;

    let mut field_attrs: std::collections::VecDeque<Vec<Box<dyn Attribute>>> = field_attrs.into();
    let mut method_attrs: std::collections::VecDeque<Vec<Box<dyn Attribute>>> = method_attrs.into();
    let mut class_attrs: std::collections::VecDeque<Vec<Box<dyn Attribute>>> = class_attrs.into();

    let mut interface_cursor = 0usize;
    let mut field_cursor = 0usize;
    let mut method_cursor = 0usize;
    let mut classes = Vec::with_capacity(class_count);

    for c in 0..class_count {
        let this_class = cp.class(this_idx[c] as usize).cloned().ok_or(Error::BadLayout("this_class ref out of range"))?;
        let super_class = if super_idx[c] == 0 { None } else { cp.class((super_idx[c] - 1) as usize).cloned() };

        let n_iface = interface_counts[c].max(0) as usize;
        let interfaces = interface_idx[interface_cursor..interface_cursor + n_iface]
            .iter()
            .map(|&i| cp.class(i as usize).cloned().ok_or(Error::BadLayout("interface ref out of range")))
            .collect::<Result<Vec<_>>>()?;
        interface_cursor += n_iface;

        let n_fields = field_counts[c].max(0) as usize;
        let mut fields = Vec::with_capacity(n_fields);
        for _ in 0..n_fields {
            let (name, descriptor) = cp.descr(field_descr_idx[field_cursor] as usize).ok_or(Error::BadLayout("field descr out of range"))?;
            fields.push(MemberInfo {
                access_flags: field_flags[field_cursor] as u16,
                name: name.clone(),
                descriptor: descriptor.clone(),
                flags: field_flags[field_cursor] as u32,
                attributes: field_attrs.pop_front().unwrap_or_default(),
                code: None,
            });
            field_cursor += 1;
        }

        let mut class_pool = ClassConstantPool::new(&cp_all);

        let n_methods = method_counts[c].max(0) as usize;
        let mut methods = Vec::with_capacity(n_methods);
        for _ in 0..n_methods {
            let (name, descriptor) =
                cp.descr(method_descr_idx[method_cursor] as usize).ok_or(Error::BadLayout("method descr out of range"))?;
            let flags = method_flags[method_cursor] as u32;
            let has_code = bit_set(flags, METHOD_BITS.iter().position(|b| *b == MethodAttr::HasCode).unwrap());
            let code =
                if has_code { Some(read_code(reader, codecs, cp, &mut class_pool, have_all_code_flags)?) } else { None };
            methods.push(MemberInfo {
                access_flags: flags as u16,
                name: name.clone(),
                descriptor: descriptor.clone(),
                flags,
                attributes: method_attrs.pop_front().unwrap_or_default(),
                code,
            });
            method_cursor += 1;
        }

        classes.push(ClassInfo {
            access_flags: class_flags[c] as u16,
            this_class,
            super_class,
            interfaces,
            flags: class_flags[c] as u32,
            fields,
            methods,
            attributes: class_attrs.pop_front().unwrap_or_default(),
            pool: class_pool,
        });
    }

    Ok(classes)
}

fn to_u32(values: &[i64]) -> Vec<u32> {
    values.iter().map(|&v| v as u32).collect()
}

/// Pulls the raw operand values every decoded opcode needs off a
/// handful of flat per-method streams (`spec.md` §4.7's 21 streams,
/// narrowed here to the ones this crate's form table actually reads;
/// see the module doc comment for the per-method-not-per-segment
/// simplification). Switch case counts/values are read first since the
/// final label stream's length depends on them.
fn fill_operand_streams<R: ReadBytes>(codes: &[u8], operands: &mut OperandManager, reader: &mut R) -> Result<()> {
    let mut simple_counts: std::collections::HashMap<OperandKind, usize> = std::collections::HashMap::new();
    let mut lookupswitch_count = 0usize;
    let mut tableswitch_count = 0usize;
    let mut wide_count = 0usize;

    for &op in codes {
        match form_for(op).body {
            Body::Fixed(slots) => {
                for s in slots {
                    *simple_counts.entry(s.kind).or_insert(0) += 1;
                }
            }
            Body::Switch { is_lookup: true } => lookupswitch_count += 1,
            Body::Switch { is_lookup: false } => tableswitch_count += 1,
            Body::Wide => wide_count += 1,
        }
    }
    let branch_labels = simple_counts.remove(&OperandKind::Labels).unwrap_or(0);

    for (kind, count) in simple_counts {
        let mut codec = byte1();
        let values = codec.decode_many(count, reader)?;
        operands.set(kind, values);
    }
    if wide_count > 0 {
        let mut codec = byte1();
        let values = codec.decode_many(wide_count, reader)?;
        operands.set(OperandKind::WideEscape, values);
    }

    let mut case_counts_codec = byte1();
    let npairs = if lookupswitch_count > 0 { case_counts_codec.decode_many(lookupswitch_count, reader)? } else { Vec::new() };
    let npairs_sum: usize = npairs.iter().map(|&n| n.max(0) as usize).sum();
    operands.set(OperandKind::CaseCounts, npairs);

    let case_values_total = 2 * tableswitch_count + npairs_sum;
    let mut case_values_codec = byte1();
    let case_values = if case_values_total > 0 { case_values_codec.decode_many(case_values_total, reader)? } else { Vec::new() };
    let table_case_targets: usize = case_values
        .chunks(2)
        .take(tableswitch_count)
        .map(|pair| (pair[1] - pair[0] + 1).max(0) as usize)
        .sum();
    operands.set(OperandKind::CaseValues, case_values);

    let switch_count = lookupswitch_count + tableswitch_count;
    let labels_total = branch_labels + switch_count + npairs_sum + table_case_targets;
    let mut labels_codec = byte1();
    let labels = if labels_total > 0 { labels_codec.decode_many(labels_total, reader)? } else { Vec::new() };
    operands.set(OperandKind::Labels, labels);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufReader;

    #[test]
    fn code_header_special_is_zero() {
        assert!(matches!(decode_code_header(0), CodeHeader::Special));
    }

    #[test]
    fn code_header_packed_buckets_split_on_spec_boundaries() {
        assert!(matches!(decode_code_header(1), CodeHeader::Packed { handler_count: 0, .. }));
        assert!(matches!(decode_code_header(144), CodeHeader::Packed { handler_count: 0, .. }));
        assert!(matches!(decode_code_header(145), CodeHeader::Packed { handler_count: 1, .. }));
        assert!(matches!(decode_code_header(208), CodeHeader::Packed { handler_count: 1, .. }));
        assert!(matches!(decode_code_header(209), CodeHeader::Packed { handler_count: 2, .. }));
        assert!(matches!(decode_code_header(255), CodeHeader::Packed { handler_count: 2, .. }));
    }

    #[test]
    fn two_pass_expansion_attaches_by_flag_bit() {
        let cp = ConstantPoolBands::default();
        let flags = vec![0b1u32, 0b0, 0b1]; // members 0 and 2 are Deprecated
        let mut r = BufReader::new(&[]);
        let attached = expand_attributes(&mut r, &CLASS_BITS, &flags, |reader, kind, n| decode_class_attr(reader, kind, n, &cp)).unwrap();
        assert_eq!(attached[0].len(), 1);
        assert_eq!(attached[1].len(), 0);
        assert_eq!(attached[2].len(), 1);
        assert_eq!(attached[0][0].name(), class_attr_name(ClassAttr::Deprecated));
    }

    #[test]
    fn flag_driven_expansion_skips_bits_nobody_sets() {
        let cp = ConstantPoolBands::default();
        let flags = vec![0u32, 0u32];
        let mut r = BufReader::new(&[]);
        let attached = expand_attributes(&mut r, &FIELD_BITS, &flags, |reader, kind, n| decode_field_attr(reader, kind, n, &cp)).unwrap();
        assert!(attached[0].is_empty());
        assert!(attached[1].is_empty());
    }

    #[test]
    fn method_bits_cover_has_code_marker() {
        assert_eq!(method_attr_name(MethodAttr::HasCode), "HasCode");
        assert_eq!(METHOD_BITS.len(), 10);
    }

    #[test]
    fn field_attr_name_round_trips_every_variant() {
        for (attr, expected) in [
            (FieldAttr::Deprecated, "Deprecated"),
            (FieldAttr::Synthetic, "Synthetic"),
            (FieldAttr::ConstantValue, "ConstantValue"),
            (FieldAttr::Signature, "Signature"),
            (FieldAttr::RuntimeVisibleAnnotations, "RuntimeVisibleAnnotations"),
            (FieldAttr::RuntimeInvisibleAnnotations, "RuntimeInvisibleAnnotations"),
        ] {
            assert_eq!(field_attr_name(attr), expected);
        }
    }

    #[test]
    fn fill_operand_streams_sizes_switch_label_stream_from_case_counts() {
        // A single lookupswitch (0xab) with 2 pairs: defaultPC + 2 case
        // labels = 3 Labels entries, 1 CaseCounts entry, 2 CaseValues entries.
        let codes = vec![0xabu8];
        let mut operands = OperandManager::new();
        // bytes: npairs(1) + 2 case values + 3 labels = 6 bytes total.
        let mut r = BufReader::new(&[2, 10, 20, 1, 2, 3]);
        fill_operand_streams(&codes, &mut operands, &mut r).unwrap();
        assert_eq!(operands.next(OperandKind::CaseCounts).unwrap(), 2);
        assert_eq!(operands.next(OperandKind::CaseValues).unwrap(), 10);
        assert_eq!(operands.next(OperandKind::CaseValues).unwrap(), 20);
        assert_eq!(operands.next(OperandKind::Labels).unwrap(), 1);
        assert_eq!(operands.next(OperandKind::Labels).unwrap(), 2);
        assert_eq!(operands.next(OperandKind::Labels).unwrap(), 3);
    }
}
