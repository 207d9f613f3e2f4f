//! The class-file assembler (component I, `spec.md` §4.8): finishes
//! resolving a class's constant pool, then serialises the class to the
//! exact byte shape JVMS §4.1 requires, starting with the `CAFEBABE`
//! magic.

use std::rc::Rc;

use crate::attribute::Attribute;
use crate::classbands::{ClassInfo, CodeInfo, MemberInfo};
use crate::classfile::ClassConstantPool;
use crate::cpool::Entry;
use crate::error::{Error, Result};

const MAGIC: u32 = 0xCAFE_BABE;

/// Assembles `class` into a standard `.class` file's bytes.
///
/// `default_minor`/`default_major` are the segment's shared version,
/// used unless the class carries a `ClassFileVersion` override
/// (`spec.md` §4.8 step 1 runs first; steps 2-7 follow in order).
pub fn assemble_class(class: &mut ClassInfo, default_minor: u16, default_major: u16) -> Result<Vec<u8>> {
    let (minor, major) = class
        .attributes
        .iter()
        .find_map(|a| a.version_override())
        .unwrap_or((default_minor, default_major));

    add_entries(class);
    class.pool.resolve()?;
    resolve_attributes(class)?;

    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&minor.to_be_bytes());
    out.extend_from_slice(&major.to_be_bytes());
    out.extend_from_slice(&class.pool.size_plus_one()?.to_be_bytes());
    for entry in class.pool.entries_in_order()? {
        write_pool_entry(&mut out, entry, &class.pool)?;
    }

    out.extend_from_slice(&class.access_flags.to_be_bytes());
    out.extend_from_slice(&index_of_u16(&class.pool, &Entry::Class(class.this_class.clone()))?.to_be_bytes());
    let super_idx = match &class.super_class {
        Some(s) => index_of_u16(&class.pool, &Entry::Class(s.clone()))?,
        None => 0,
    };
    out.extend_from_slice(&super_idx.to_be_bytes());

    out.extend_from_slice(&(class.interfaces.len() as u16).to_be_bytes());
    for iface in &class.interfaces {
        out.extend_from_slice(&index_of_u16(&class.pool, &Entry::Class(iface.clone()))?.to_be_bytes());
    }

    write_members(&mut out, &mut class.fields, &class.pool)?;
    write_members(&mut out, &mut class.methods, &class.pool)?;

    let emitted_attrs: Vec<&Box<dyn Attribute>> = class.attributes.iter().filter(|a| a.version_override().is_none()).collect();
    out.extend_from_slice(&(emitted_attrs.len() as u16).to_be_bytes());
    for a in emitted_attrs {
        write_attribute(&mut out, a.as_ref(), &class.pool)?;
    }

    Ok(out)
}

/// Adds every constant-pool entry the class needs beyond the ones its
/// bytecode already seeded (`spec.md` §4.8 step 2: "Adding an entry
/// transitively adds its nested cp entries").
fn add_entries(class: &mut ClassInfo) {
    class.pool.add(Entry::Class(class.this_class.clone()));
    if let Some(super_name) = &class.super_class {
        class.pool.add(Entry::Class(super_name.clone()));
    }
    for iface in &class.interfaces {
        class.pool.add(Entry::Class(iface.clone()));
    }

    for member in class.fields.iter().chain(class.methods.iter()) {
        add_member_entries(&mut class.pool, member);
    }

    for attr in class.attributes.iter().filter(|a| a.version_override().is_none()) {
        add_attribute_entries(&mut class.pool, attr.as_ref());
    }
}

fn add_member_entries(pool: &mut ClassConstantPool, member: &MemberInfo) {
    pool.add(Entry::Utf8(member.name.clone()));
    pool.add(Entry::Utf8(member.descriptor.clone()));
    for attr in &member.attributes {
        add_attribute_entries(pool, attr.as_ref());
    }
    if let Some(code) = &member.code {
        pool.add(Entry::Utf8(Rc::from("Code")));
        for e in &code.exception_table {
            if let Some(catch_type) = &e.catch_type {
                pool.add(Entry::Class(catch_type.clone()));
            }
        }
        for attr in &code.attributes {
            add_attribute_entries(pool, attr.as_ref());
        }
    }
}

fn add_attribute_entries(pool: &mut ClassConstantPool, attr: &dyn Attribute) {
    pool.add(Entry::Utf8(Rc::from(attr.name())));
    for e in attr.nested_entries() {
        pool.add(e);
    }
}

/// Runs every attribute's `resolve` and every instruction's `resolve_cp`
/// now that the pool has a final index assignment (`spec.md` §4.8 step
/// 6). Branch targets were already fixed up by `classbands::read_code`.
fn resolve_attributes(class: &mut ClassInfo) -> Result<()> {
    for member in class.fields.iter_mut().chain(class.methods.iter_mut()) {
        for attr in &mut member.attributes {
            attr.resolve(&class.pool)?;
        }
        if let Some(code) = &mut member.code {
            for instr in &mut code.instructions {
                instr.resolve_cp(&class.pool)?;
            }
            for attr in &mut code.attributes {
                attr.resolve(&class.pool)?;
            }
        }
    }
    for attr in &mut class.attributes {
        attr.resolve(&class.pool)?;
    }
    Ok(())
}

fn index_of_u16(pool: &ClassConstantPool, entry: &Entry) -> Result<u16> {
    pool.index_of(entry).map(|i| i as u16)
}

fn write_pool_entry(out: &mut Vec<u8>, entry: &Entry, pool: &ClassConstantPool) -> Result<()> {
    match entry {
        Entry::Utf8(s) => {
            let bytes = crate::cpool::encode_modified_utf8(s);
            if bytes.len() > u16::MAX as usize {
                return Err(Error::PoolOverflow);
            }
            out.push(1);
            out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(&bytes);
        }
        Entry::Integer(v) => {
            out.push(3);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Entry::Float(v) => {
            out.push(4);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Entry::Long(v) => {
            out.push(5);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Entry::Double(v) => {
            out.push(6);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Entry::String(s) => {
            out.push(8);
            out.extend_from_slice(&index_of_u16(pool, &Entry::Utf8(s.clone()))?.to_be_bytes());
        }
        Entry::Class(s) => {
            out.push(7);
            out.extend_from_slice(&index_of_u16(pool, &Entry::Utf8(s.clone()))?.to_be_bytes());
        }
        Entry::NameAndType { name, descriptor } => {
            out.push(12);
            out.extend_from_slice(&index_of_u16(pool, &Entry::Utf8(name.clone()))?.to_be_bytes());
            out.extend_from_slice(&index_of_u16(pool, &Entry::Utf8(descriptor.clone()))?.to_be_bytes());
        }
        Entry::FieldRef { class, name, descriptor } => write_ref_entry(out, 9, class, name, descriptor, pool)?,
        Entry::MethodRef { class, name, descriptor } => write_ref_entry(out, 10, class, name, descriptor, pool)?,
        Entry::InterfaceMethodRef { class, name, descriptor } => write_ref_entry(out, 11, class, name, descriptor, pool)?,
    }
    Ok(())
}

fn write_ref_entry(
    out: &mut Vec<u8>,
    tag: u8,
    class: &crate::cpool::Utf8Ref,
    name: &crate::cpool::Utf8Ref,
    descriptor: &crate::cpool::Utf8Ref,
    pool: &ClassConstantPool,
) -> Result<()> {
    let class_idx = index_of_u16(pool, &Entry::Class(class.clone()))?;
    let nat = Entry::NameAndType { name: name.clone(), descriptor: descriptor.clone() };
    let nat_idx = index_of_u16(pool, &nat)?;
    out.push(tag);
    out.extend_from_slice(&class_idx.to_be_bytes());
    out.extend_from_slice(&nat_idx.to_be_bytes());
    Ok(())
}

fn write_attribute(out: &mut Vec<u8>, attr: &dyn Attribute, pool: &ClassConstantPool) -> Result<()> {
    let name_idx = index_of_u16(pool, &Entry::Utf8(Rc::from(attr.name())))?;
    out.extend_from_slice(&name_idx.to_be_bytes());
    out.extend_from_slice(&attr.length_without_header().to_be_bytes());
    attr.write_body(out)
}

fn write_members(out: &mut Vec<u8>, members: &mut [MemberInfo], pool: &ClassConstantPool) -> Result<()> {
    out.extend_from_slice(&(members.len() as u16).to_be_bytes());
    for m in members {
        out.extend_from_slice(&m.access_flags.to_be_bytes());
        out.extend_from_slice(&index_of_u16(pool, &Entry::Utf8(m.name.clone()))?.to_be_bytes());
        out.extend_from_slice(&index_of_u16(pool, &Entry::Utf8(m.descriptor.clone()))?.to_be_bytes());

        let attr_count = m.attributes.len() + if m.code.is_some() { 1 } else { 0 };
        out.extend_from_slice(&(attr_count as u16).to_be_bytes());
        for a in &m.attributes {
            write_attribute(out, a.as_ref(), pool)?;
        }
        if let Some(code) = &mut m.code {
            write_code_attribute(out, code, pool)?;
        }
    }
    Ok(())
}

/// The `Code` attribute (JVMS §4.7.3) is synthesised here rather than
/// through [`Attribute`]: its payload (the instruction stream, exception
/// table) lives on [`CodeInfo`], not on a boxed attribute.
fn write_code_attribute(out: &mut Vec<u8>, code: &mut CodeInfo, pool: &ClassConstantPool) -> Result<()> {
    let name_idx = index_of_u16(pool, &Entry::Utf8(Rc::from("Code")))?;

    let mut body = Vec::new();
    body.extend_from_slice(&code.max_stack.to_be_bytes());
    body.extend_from_slice(&code.max_locals.to_be_bytes());

    let instructions = std::mem::take(&mut code.instructions);
    let mut code_bytes = Vec::new();
    for instr in instructions {
        code_bytes.extend(instr.into_bytes());
    }
    body.extend_from_slice(&(code_bytes.len() as u32).to_be_bytes());
    body.extend_from_slice(&code_bytes);

    body.extend_from_slice(&(code.exception_table.len() as u16).to_be_bytes());
    for e in &code.exception_table {
        body.extend_from_slice(&(e.start_pc as u16).to_be_bytes());
        body.extend_from_slice(&(e.end_pc as u16).to_be_bytes());
        body.extend_from_slice(&(e.handler_pc as u16).to_be_bytes());
        let catch_idx = match &e.catch_type {
            Some(c) => index_of_u16(pool, &Entry::Class(c.clone()))?,
            None => 0,
        };
        body.extend_from_slice(&catch_idx.to_be_bytes());
    }

    body.extend_from_slice(&(code.attributes.len() as u16).to_be_bytes());
    for a in &code.attributes {
        write_attribute(&mut body, a.as_ref(), pool)?;
    }

    out.extend_from_slice(&name_idx.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::predefined::Deprecated;

    fn empty_class(this_class: &str) -> ClassInfo {
        let cp_all: Vec<Entry> = vec![];
        ClassInfo {
            access_flags: 0x0021,
            this_class: Rc::from(this_class),
            super_class: Some(Rc::from("java/lang/Object")),
            interfaces: vec![],
            flags: 0,
            fields: vec![],
            methods: vec![],
            attributes: vec![],
            pool: ClassConstantPool::new(&cp_all),
        }
    }

    #[test]
    fn emits_cafebabe_magic_and_version() {
        let mut class = empty_class("Main");
        let bytes = assemble_class(&mut class, 0, 52).unwrap();
        assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 0);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 52);
    }

    #[test]
    fn class_file_version_override_is_not_emitted_as_an_attribute() {
        let mut class = empty_class("Main");
        class.attributes.push(Box::new(crate::attribute::predefined::ClassFileVersion { minor: 3, major: 49 }));
        let bytes = assemble_class(&mut class, 0, 52).unwrap();
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 3);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 49);
    }

    #[test]
    fn member_with_code_emits_one_synthesized_code_attribute() {
        let mut class = empty_class("Main");
        class.methods.push(MemberInfo {
            access_flags: 0x0001,
            name: Rc::from("run"),
            descriptor: Rc::from("()V"),
            flags: 0,
            attributes: vec![],
            code: Some(CodeInfo {
                max_stack: 1,
                max_locals: 1,
                instructions: vec![],
                exception_table: vec![],
                attributes: vec![],
            }),
        });
        let bytes = assemble_class(&mut class, 0, 52).unwrap();
        // Sanity: the class file is well-formed enough to contain a Code
        // attribute name among the pool's Utf8 entries.
        assert!(bytes.windows(4).any(|w| w == b"Code"));
    }

    #[test]
    fn class_attributes_round_trip_through_the_attribute_table() {
        let mut class = empty_class("Main");
        class.attributes.push(Box::new(Deprecated::new()));
        let bytes = assemble_class(&mut class, 0, 52).unwrap();
        assert!(bytes.windows(10).any(|w| w == b"Deprecated"));
    }
}
