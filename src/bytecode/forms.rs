//! The opcode form table (component H, `spec.md` §4.7): one [`Form`] per
//! possible opcode byte, describing its static rewrite template, which
//! operand streams it pulls from, and the special handling
//! (multi-opcode, must-start, BCI renumbering, variable-length) a handful
//! of opcodes need.
//!
//! `spec.md`'s Non-goal "producing output whose bytes exactly match an
//! unrelated third-party compiler" means this table only needs to emit
//! *valid* JVMS bytecode, not reproduce a particular packer's internal
//! opcode grouping. [`form_for`] is still a total function over every
//! `u8`: opcodes with no JVMS-defined operand fall through to
//! [`Form::no_operand`], and every operand-bearing, multi-opcode, or
//! variable-length opcode the JVMS defines has an explicit entry.

use super::OperandKind;

/// One 1- or 2-byte operand slot within a form's rewrite template.
#[derive(Debug, Clone, Copy)]
pub struct OperandSlot {
    pub kind: OperandKind,
    /// Width in bytes this operand occupies in the emitted class file.
    pub width: u8,
}

/// How a form's trailing bytes (after the opcode itself) are produced.
#[derive(Debug, Clone)]
pub enum Body {
    /// A fixed sequence of operand slots, each pulled from its stream in
    /// order and written at its declared width.
    Fixed(Vec<OperandSlot>),
    /// `lookupswitch`/`tableswitch`: computed at construction time from
    /// case counts/values pulled off their dedicated streams, padded to
    /// the next 4-byte boundary relative to the code array start.
    Switch { is_lookup: bool },
    /// `wide`: consumes the following opcode from the wide-escape stream
    /// and doubles that opcode's local-variable operand to 2 bytes.
    Wide,
}

/// A single opcode's static shape (`spec.md` §4.7).
#[derive(Debug, Clone)]
pub struct Form {
    pub body: Body,
    /// A single packed opcode expands to two `.class` opcodes (mnemonic
    /// aliases like `aload_0_getfield`).
    pub multi_opcode: Option<u8>,
    /// Any cp-bank operand this form reads must land in the "must-start"
    /// region of the class constant pool (opcodes admitting only
    /// single-byte indices).
    pub must_start: bool,
    /// Whether this opcode's operand is a branch target needing BCI
    /// renumbering.
    pub has_bci_renumbering: bool,
}

impl Form {
    fn no_operand() -> Form {
        Form { body: Body::Fixed(vec![]), multi_opcode: None, must_start: false, has_bci_renumbering: false }
    }

    fn fixed(slots: Vec<OperandSlot>) -> Form {
        Form { body: Body::Fixed(slots), multi_opcode: None, must_start: false, has_bci_renumbering: false }
    }

    fn branch(width: u8) -> Form {
        Form {
            body: Body::Fixed(vec![OperandSlot { kind: OperandKind::Labels, width }]),
            multi_opcode: None,
            must_start: false,
            has_bci_renumbering: true,
        }
    }
}

fn slot(kind: OperandKind, width: u8) -> OperandSlot {
    OperandSlot { kind, width }
}

/// Looks up the form for `opcode`. Total over `0..=255`.
pub fn form_for(opcode: u8) -> Form {
    match opcode {
        // bipush, ldc, iload..aload (narrow), istore..astore (narrow),
        // ret, newarray: one raw byte.
        0x10 /* bipush */ => Form::fixed(vec![slot(OperandKind::RawBytes, 1)]),
        0x12 /* ldc */ => {
            let mut f = Form::fixed(vec![slot(OperandKind::StringRef, 1)]);
            f.must_start = true;
            f
        }
        0x15..=0x19 /* iload,lload,fload,dload,aload */ => Form::fixed(vec![slot(OperandKind::Locals, 1)]),
        0x36..=0x3a /* istore,lstore,fstore,dstore,astore */ => Form::fixed(vec![slot(OperandKind::Locals, 1)]),
        0xa9 /* ret */ => Form::fixed(vec![slot(OperandKind::Locals, 1)]),
        0xbc /* newarray */ => Form::fixed(vec![slot(OperandKind::RawBytes, 1)]),

        // sipush: one raw short.
        0x11 => Form::fixed(vec![slot(OperandKind::RawShorts, 2)]),

        // wide-form cp refs: ldc_w, ldc2_w.
        0x13 => Form::fixed(vec![slot(OperandKind::StringRef, 2)]),
        0x14 => Form::fixed(vec![slot(OperandKind::LongRef, 2)]),

        // field/method refs.
        0xb2 | 0xb3 => Form::fixed(vec![slot(OperandKind::FieldRef, 2)]), // getstatic, putstatic
        0xb4 => Form::fixed(vec![slot(OperandKind::ThisFieldRef, 2)]), // getfield
        0xb5 => Form::fixed(vec![slot(OperandKind::ThisFieldRef, 2)]), // putfield
        0xb6 => Form::fixed(vec![slot(OperandKind::ThisMethodRef, 2)]), // invokevirtual
        0xb7 => Form::fixed(vec![slot(OperandKind::InitRefs, 2)]), // invokespecial
        0xb8 => Form::fixed(vec![slot(OperandKind::SuperMethodRef, 2)]), // invokestatic
        0xb9 => Form::fixed(vec![
            slot(OperandKind::IMethodRef, 2),
            slot(OperandKind::RawBytes, 1),
            slot(OperandKind::RawBytes, 1),
        ]), // invokeinterface: ref, count, 0
        0xba => Form::fixed(vec![
            slot(OperandKind::MethodRef, 2),
            slot(OperandKind::RawBytes, 1),
            slot(OperandKind::RawBytes, 1),
        ]), // invokedynamic: ref, 0, 0

        // class refs.
        0xbb /* new */ | 0xbd /* anewarray */ | 0xc0 /* checkcast */ | 0xc1 /* instanceof */ => {
            Form::fixed(vec![slot(OperandKind::ClassRef, 2)])
        }
        0xc5 /* multianewarray */ => {
            Form::fixed(vec![slot(OperandKind::ClassRef, 2), slot(OperandKind::RawBytes, 1)])
        }

        // iinc: local, signed byte.
        0x84 => Form::fixed(vec![slot(OperandKind::Locals, 1), slot(OperandKind::RawBytes, 1)]),

        // branches.
        0x99..=0xa7 /* if_* , goto, jsr */ => Form::branch(2),
        0xc6 | 0xc7 /* ifnull, ifnonnull */ => Form::branch(2),
        0xc8 | 0xc9 /* goto_w, jsr_w */ => Form::branch(4),

        // switches.
        0xaa => Form { body: Body::Switch { is_lookup: false }, multi_opcode: None, must_start: false, has_bci_renumbering: true },
        0xab => Form { body: Body::Switch { is_lookup: true }, multi_opcode: None, must_start: false, has_bci_renumbering: true },

        // wide.
        0xc4 => Form { body: Body::Wide, multi_opcode: None, must_start: false, has_bci_renumbering: false },

        _ => Form::no_operand(),
    }
}
