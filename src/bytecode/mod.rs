//! Bytecode form table and operand manager (component H, `spec.md` §4.7):
//! expands a packed opcode stream plus its per-kind operand bands into
//! standard `.class` bytecode, deferring branch-target and constant-pool
//! index patching until the code array is fully laid out and the class
//! constant pool has resolved.

pub mod forms;

use std::collections::HashMap;

use crate::classfile::ClassConstantPool;
use crate::cpool::{ConstantPoolBands, Entry};
use crate::error::{Error, Result};
use forms::{form_for, Body};

/// One of the operand manager's 21 typed streams (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    CaseCounts,
    CaseValues,
    RawBytes,
    RawShorts,
    Locals,
    Labels,
    ClassRef,
    FieldRef,
    MethodRef,
    IMethodRef,
    StringRef,
    IntRef,
    FloatRef,
    LongRef,
    DoubleRef,
    ThisFieldRef,
    ThisMethodRef,
    SuperFieldRef,
    SuperMethodRef,
    InitRefs,
    WideEscape,
}

const ALL_KINDS: [OperandKind; 21] = [
    OperandKind::CaseCounts,
    OperandKind::CaseValues,
    OperandKind::RawBytes,
    OperandKind::RawShorts,
    OperandKind::Locals,
    OperandKind::Labels,
    OperandKind::ClassRef,
    OperandKind::FieldRef,
    OperandKind::MethodRef,
    OperandKind::IMethodRef,
    OperandKind::StringRef,
    OperandKind::IntRef,
    OperandKind::FloatRef,
    OperandKind::LongRef,
    OperandKind::DoubleRef,
    OperandKind::ThisFieldRef,
    OperandKind::ThisMethodRef,
    OperandKind::SuperFieldRef,
    OperandKind::SuperMethodRef,
    OperandKind::InitRefs,
    OperandKind::WideEscape,
];

/// Holds one pre-decoded `Vec<i32>` per operand stream and a read cursor
/// into each (`spec.md` §4.7: "The operand manager holds 21 integer
/// streams").
#[derive(Debug, Default)]
pub struct OperandManager {
    streams: HashMap<OperandKind, (Vec<i32>, usize)>,
}

impl OperandManager {
    pub fn new() -> OperandManager {
        let mut streams = HashMap::with_capacity(ALL_KINDS.len());
        for k in ALL_KINDS {
            streams.insert(k, (Vec::new(), 0));
        }
        OperandManager { streams }
    }

    /// Supplies the decoded values for one stream, replacing any previous
    /// contents and resetting its cursor.
    pub fn set(&mut self, kind: OperandKind, values: Vec<i32>) {
        self.streams.insert(kind, (values, 0));
    }

    fn next(&mut self, kind: OperandKind) -> Result<i32> {
        let (values, cursor) = self.streams.get_mut(&kind).expect("every OperandKind is pre-populated by new()");
        let v = *values.get(*cursor).ok_or(Error::TruncatedInput("bytecode operand stream"))?;
        *cursor += 1;
        Ok(v)
    }
}

fn cp_entry_for(kind: OperandKind, raw_index: i32, cp: &ConstantPoolBands) -> Result<Entry> {
    let i = raw_index as usize;
    match kind {
        OperandKind::ClassRef => cp.class(i).cloned().map(Entry::Class).ok_or(Error::BadLayout("bytecode class ref out of range")),
        OperandKind::StringRef => cp.string(i).cloned().map(Entry::String).ok_or(Error::BadLayout("bytecode string ref out of range")),
        OperandKind::LongRef => cp.long(i).map(Entry::Long).ok_or(Error::BadLayout("bytecode long ref out of range")),
        OperandKind::FieldRef | OperandKind::ThisFieldRef | OperandKind::SuperFieldRef => {
            cp.field(i).ok_or(Error::BadLayout("bytecode field ref out of range"))
        }
        OperandKind::MethodRef | OperandKind::ThisMethodRef | OperandKind::SuperMethodRef | OperandKind::InitRefs => {
            cp.method(i).ok_or(Error::BadLayout("bytecode method ref out of range"))
        }
        OperandKind::IMethodRef => cp.imethod(i).ok_or(Error::BadLayout("bytecode interface method ref out of range")),
        _ => unreachable!("cp_entry_for only called for cp-bank operand kinds"),
    }
}

fn is_cp_kind(kind: OperandKind) -> bool {
    matches!(
        kind,
        OperandKind::ClassRef
            | OperandKind::StringRef
            | OperandKind::LongRef
            | OperandKind::FieldRef
            | OperandKind::ThisFieldRef
            | OperandKind::SuperFieldRef
            | OperandKind::MethodRef
            | OperandKind::ThisMethodRef
            | OperandKind::SuperMethodRef
            | OperandKind::InitRefs
            | OperandKind::IMethodRef
    )
}

/// One decoded bytecode instruction: an opcode plus the bytes it will
/// emit, with pending patches for constant-pool indices (filled once the
/// class constant pool resolves) and branch targets (filled once the
/// whole code array's byte offsets are known) (`spec.md` §3, "Bytecode").
pub struct Instruction {
    pub opcode: u8,
    pub packed_index: u32,
    pub byte_offset: u32,
    bytes: Vec<u8>,
    cp_patches: Vec<(usize, Entry, u8)>,
    branch_patches: Vec<(usize, i64, u8)>,
}

impl Instruction {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Patches every pending constant-pool index using `pool`'s resolved
    /// indices (`spec.md` §4.8 step 6).
    pub fn resolve_cp(&mut self, pool: &ClassConstantPool) -> Result<()> {
        for (offset, entry, width) in &self.cp_patches {
            let idx = pool.index_of(entry)?;
            write_be(&mut self.bytes, *offset, idx, *width);
        }
        Ok(())
    }

    /// Patches every pending branch target using `byte_code_offsets`, the
    /// packed-index -> absolute-byte-offset table built once the whole
    /// method's code array is laid out (`spec.md` §4.7, "BCI fixup";
    /// §8, "BCI fixup" testable property).
    pub fn fixup_branches(&mut self, byte_code_offsets: &[u32]) -> Result<()> {
        for (offset, relative_target, width) in &self.branch_patches {
            let target_idx = self.packed_index as i64 + *relative_target;
            let target_offset = *byte_code_offsets
                .get(target_idx as usize)
                .ok_or(Error::Overflow("branch target packed index out of range"))?;
            let rel = target_offset as i64 - self.byte_offset as i64;
            write_be_signed(&mut self.bytes, *offset, rel, *width)?;
        }
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn write_be(bytes: &mut [u8], offset: usize, value: u32, width: u8) {
    match width {
        1 => bytes[offset] = value as u8,
        2 => bytes[offset..offset + 2].copy_from_slice(&(value as u16).to_be_bytes()),
        4 => bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes()),
        _ => unreachable!("operand widths are 1, 2, or 4"),
    }
}

fn write_be_signed(bytes: &mut [u8], offset: usize, value: i64, width: u8) -> Result<()> {
    match width {
        2 => {
            let v = i16::try_from(value).map_err(|_| Error::Overflow("branch offset does not fit in 2 bytes"))?;
            bytes[offset..offset + 2].copy_from_slice(&v.to_be_bytes());
        }
        4 => {
            let v = i32::try_from(value).map_err(|_| Error::Overflow("branch offset does not fit in 4 bytes"))?;
            bytes[offset..offset + 4].copy_from_slice(&v.to_be_bytes());
        }
        _ => unreachable!("branch widths are 2 or 4"),
    }
    Ok(())
}

/// Pads `bytes.len()` (relative to the code array start at 0) up to the
/// next multiple of 4.
fn switch_padding(offset_in_code: u32) -> usize {
    let rem = (offset_in_code + 1) % 4;
    (if rem == 0 { 0 } else { 4 - rem }) as usize
}

/// Decodes `codes` (one packed opcode byte per instruction, in program
/// order) into [`Instruction`]s, pulling operands from `operands` and
/// adding every constant-pool reference the instructions make to `pool`
/// (`spec.md` §4.8 step 2). Byte offsets are assigned in the same forward
/// pass, which is sufficient for `lookupswitch`/`tableswitch` padding
/// since it depends only on already-finalized prior instructions.
pub fn read_instructions(
    codes: &[u8],
    operands: &mut OperandManager,
    cp: &ConstantPoolBands,
    pool: &mut ClassConstantPool,
) -> Result<Vec<Instruction>> {
    let mut out = Vec::with_capacity(codes.len());
    let mut running_offset: u32 = 0;

    for (packed_index, &opcode) in codes.iter().enumerate() {
        let form = form_for(opcode);
        let mut bytes = vec![opcode];
        let mut cp_patches = Vec::new();
        let mut branch_patches = Vec::new();

        match &form.body {
            Body::Fixed(slots) => {
                for s in slots {
                    let raw = operands.next(s.kind)?;
                    if is_cp_kind(s.kind) {
                        let entry = cp_entry_for(s.kind, raw, cp)?;
                        if form.must_start {
                            pool.add_must_start(entry.clone());
                        } else {
                            pool.add(entry.clone());
                        }
                        let offset = bytes.len();
                        bytes.extend(std::iter::repeat(0u8).take(s.width as usize));
                        cp_patches.push((offset, entry, s.width));
                    } else if s.kind == OperandKind::Labels {
                        let offset = bytes.len();
                        bytes.extend(std::iter::repeat(0u8).take(s.width as usize));
                        branch_patches.push((offset, raw as i64, s.width));
                    } else {
                        let offset = bytes.len();
                        bytes.extend(std::iter::repeat(0u8).take(s.width as usize));
                        write_be(&mut bytes, offset, raw as u32, s.width);
                    }
                }
            }
            Body::Switch { is_lookup } => {
                let pad = switch_padding(running_offset);
                bytes.extend(std::iter::repeat(0u8).take(pad));

                let default_target = operands.next(OperandKind::Labels)?;
                let default_offset = bytes.len();
                bytes.extend([0u8; 4]);
                branch_patches.push((default_offset, default_target as i64, 4));

                if *is_lookup {
                    let npairs = operands.next(OperandKind::CaseCounts)?;
                    bytes.extend((npairs as u32).to_be_bytes());
                    for _ in 0..npairs {
                        let m = operands.next(OperandKind::CaseValues)?;
                        bytes.extend((m as u32).to_be_bytes());
                        let t = operands.next(OperandKind::Labels)?;
                        let off = bytes.len();
                        bytes.extend([0u8; 4]);
                        branch_patches.push((off, t as i64, 4));
                    }
                } else {
                    let low = operands.next(OperandKind::CaseValues)?;
                    let high = operands.next(OperandKind::CaseValues)?;
                    bytes.extend((low as u32).to_be_bytes());
                    bytes.extend((high as u32).to_be_bytes());
                    let count = (high - low + 1).max(0);
                    for _ in 0..count {
                        let t = operands.next(OperandKind::Labels)?;
                        let off = bytes.len();
                        bytes.extend([0u8; 4]);
                        branch_patches.push((off, t as i64, 4));
                    }
                }
            }
            Body::Wide => {
                let inner_opcode = operands.next(OperandKind::WideEscape)? as u8;
                bytes.push(inner_opcode);
                let inner_form = form_for(inner_opcode);
                if let Body::Fixed(slots) = &inner_form.body {
                    for s in slots {
                        let raw = operands.next(s.kind)?;
                        let offset = bytes.len();
                        bytes.extend([0u8; 2]);
                        write_be(&mut bytes, offset, raw as u32, 2);
                    }
                }
                if inner_opcode == 0x84 {
                    // iinc under wide takes a 2-byte signed increment too.
                    let raw = operands.next(OperandKind::RawBytes)?;
                    let offset = bytes.len();
                    bytes.extend([0u8; 2]);
                    write_be(&mut bytes, offset, raw as u32, 2);
                }
            }
        }

        let len = bytes.len() as u32;
        out.push(Instruction {
            opcode,
            packed_index: packed_index as u32,
            byte_offset: running_offset,
            bytes,
            cp_patches,
            branch_patches,
        });
        running_offset += len;
    }

    Ok(out)
}

/// Builds the `byte_code_offsets` table the BCI fixup pass needs: one
/// entry per packed index, plus a one-past-the-end sentinel for targets
/// that point just past the last instruction.
pub fn byte_code_offsets(instructions: &[Instruction]) -> Vec<u32> {
    let mut out: Vec<u32> = instructions.iter().map(|i| i.byte_offset).collect();
    let end = instructions.last().map(|i| i.byte_offset + i.len() as u32).unwrap_or(0);
    out.push(end);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_pool() -> ClassConstantPool {
        ClassConstantPool::new(&[])
    }

    #[test]
    fn scenario_6_lookupswitch_rewrite() {
        let cp = ConstantPoolBands::default();
        let mut pool = empty_pool();
        let mut operands = OperandManager::new();
        operands.set(OperandKind::CaseCounts, vec![2]);
        operands.set(OperandKind::CaseValues, vec![10, 20]);
        // One label per case plus the defaultPC, in read order.
        operands.set(OperandKind::Labels, vec![5, 5, 5]);

        let codes = [0xabu8];
        let instrs = read_instructions(&codes, &mut operands, &cp, &mut pool).unwrap();
        assert_eq!(instrs.len(), 1);
        let bytes = &instrs[0].bytes;
        assert_eq!(bytes[0], 0xab);
        assert_eq!(&bytes[1..4], &[0, 0, 0]); // 3 bytes padding
        assert_eq!(&bytes[8..12], &[0, 0, 0, 2]); // npairs
        assert_eq!(&bytes[12..16], &[0, 0, 0, 10]); // case0 match
        assert_eq!(&bytes[20..24], &[0, 0, 0, 20]); // case1 match
        assert_eq!(bytes.len(), 28);
    }

    #[test]
    fn branch_fixup_computes_relative_offset() {
        let cp = ConstantPoolBands::default();
        let mut pool = empty_pool();
        let mut operands = OperandManager::new();
        // goto at packed index 0 targeting packed index 2 (relative +2).
        operands.set(OperandKind::Labels, vec![2]);
        let codes = [0xa7u8]; // goto
        let mut instrs = read_instructions(&codes, &mut operands, &cp, &mut pool).unwrap();
        let offsets = vec![0u32, 3, 7, 10];
        instrs[0].fixup_branches(&offsets).unwrap();
        let bytes = instrs[0].bytes.clone();
        assert_eq!(i16::from_be_bytes([bytes[1], bytes[2]]), 7);
    }

    #[test]
    fn resolve_cp_patches_the_pool_assigned_index() {
        let cp = ConstantPoolBands::default();
        let mut pool = empty_pool();
        let mut operands = OperandManager::new();
        operands.set(OperandKind::RawBytes, vec![7]);
        let codes = [0xbcu8]; // newarray: one raw byte, no cp ref
        let mut instrs = read_instructions(&codes, &mut operands, &cp, &mut pool).unwrap();
        pool.resolve().unwrap();
        instrs[0].resolve_cp(&pool).unwrap();
        assert_eq!(instrs[0].bytes, vec![0xbc, 7]);
    }
}
