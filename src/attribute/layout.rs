//! The attribute layout-string engine (component F, `spec.md` §4.5): a
//! recursive-descent parser from a layout string into a tree of
//! [`LayoutElement`] nodes, used by any attribute without a predefined
//! encoder.
//!
//! This only parses and models the tree shape the layout grammar
//! describes; turning a parsed layout plus a class's decoded bands into
//! bytes is the class/field/method/code bands module's job, since that is
//! the only place with access to the bands a layout's leaves read from.
//! Full backward/forward [`Call`](LayoutElement::Call) resolution across
//! arbitrarily nested callables is also left to that caller: this crate's
//! own pipeline only ever emits attributes with a single root callable,
//! and Non-goals rule out serving as a general-purpose layout interpreter
//! for third-party layouts.

use crate::codec::Codec;
use crate::error::{bad_layout_error, Result};
use crate::io::ReadBytes;

/// The four basic integral shapes a layout leaf can read (`spec.md` §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicType {
    /// `B`: one byte.
    Byte,
    /// `H`: a halfword.
    Half,
    /// `I`: a full integer.
    Int,
    /// `V`: a bytecode index (BCI).
    Bci,
}

/// The `[SFPO]*` flavor prefixes a layout leaf can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flavors {
    pub signed: bool,
    pub one_based: bool,
    pub position_relative: bool,
    pub offset: bool,
}

/// An `Integral` leaf: `[SFPO]*[BHIV]`, optionally followed by a literal
/// constant-pool hint `K[IJFDSLN]` (`spec.md` §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct IntegralSpec {
    pub flavors: Flavors,
    pub basic: BasicType,
    /// The `K<letter>` suffix, when present: which literal-constant band
    /// (Int/Long/Float/Double/String/[un]qualified) this value selects.
    pub literal_kind: Option<char>,
}

/// A `Reference` leaf: `R[CSDFMIUQ](N)?` (`spec.md` §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSpec {
    pub flavors: Flavors,
    pub basic: BasicType,
    /// Which cp bank this reference indexes: Class, Signature, Descr,
    /// Field, Method, Imethod, Utf8, or (qualified/unqualified) name.
    pub bank: char,
    /// The optional `(N)` group-count suffix.
    pub group: Option<u32>,
}

/// A parsed layout element (`spec.md` §4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutElement {
    Integral(IntegralSpec),
    Reference(ReferenceSpec),
    /// `N<Integral>[ body ]`: a count leaf followed by that many copies of
    /// `body`, each sub-element columnar in its own band.
    Replication { count: IntegralSpec, body: Vec<LayoutElement> },
    /// `T<Integral>(tag1,tag2,...)[body]...()[default]`.
    Union { tag: IntegralSpec, cases: Vec<(Vec<i64>, Vec<LayoutElement>)>, default: Vec<LayoutElement> },
    /// `[ body ]` at any nesting level. `index` is this callable's
    /// 0-based position in parse order; index 0 is the root.
    Callable { index: usize, body: Vec<LayoutElement> },
    /// `(±n)`: a reference to another callable, relative to the one it
    /// appears in. `0` is self; negative marks the target
    /// backwards-callable.
    Call(i32),
}

/// Parses a full layout string into its top-level element sequence.
pub fn parse(layout: &str) -> Result<Vec<LayoutElement>> {
    let mut p = Parser { bytes: layout.as_bytes(), pos: 0, next_callable_id: 0 };
    let elements = p.parse_sequence(None)?;
    if p.pos != p.bytes.len() {
        return bad_layout_error("trailing characters after layout");
    }
    Ok(elements)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    next_callable_id: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.bump() == Some(b) {
            Ok(())
        } else {
            bad_layout_error("unexpected character in layout")
        }
    }

    /// Parses elements until end-of-input or, if `stop` is given, until
    /// that byte is seen (without consuming it).
    fn parse_sequence(&mut self, stop: Option<u8>) -> Result<Vec<LayoutElement>> {
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(b) if Some(b) == stop => break,
                _ => out.push(self.parse_element()?),
            }
        }
        Ok(out)
    }

    fn parse_element(&mut self) -> Result<LayoutElement> {
        match self.peek() {
            Some(b'N') => self.parse_replication(),
            Some(b'T') => self.parse_union(),
            Some(b'[') => self.parse_callable(),
            Some(b'(') => self.parse_call(),
            Some(_) => self.parse_integral_or_reference(),
            None => bad_layout_error("unexpected end of layout"),
        }
    }

    fn parse_flavors(&mut self) -> Flavors {
        let mut flavors = Flavors::default();
        loop {
            match self.peek() {
                Some(b'S') => {
                    flavors.signed = true;
                    self.pos += 1;
                }
                Some(b'F') => {
                    flavors.one_based = true;
                    self.pos += 1;
                }
                Some(b'P') => {
                    flavors.position_relative = true;
                    self.pos += 1;
                }
                Some(b'O') => {
                    flavors.offset = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        flavors
    }

    fn parse_basic(&mut self) -> Result<BasicType> {
        match self.bump() {
            Some(b'B') => Ok(BasicType::Byte),
            Some(b'H') => Ok(BasicType::Half),
            Some(b'I') => Ok(BasicType::Int),
            Some(b'V') => Ok(BasicType::Bci),
            _ => bad_layout_error("expected a basic type letter (B, H, I, or V)"),
        }
    }

    fn parse_integral(&mut self) -> Result<IntegralSpec> {
        let flavors = self.parse_flavors();
        let basic = self.parse_basic()?;
        let literal_kind = if self.peek() == Some(b'K') {
            self.pos += 1;
            match self.bump() {
                Some(c @ (b'I' | b'J' | b'F' | b'D' | b'S' | b'L' | b'N')) => Some(c as char),
                _ => return bad_layout_error("expected a literal-pool kind letter after K"),
            }
        } else {
            None
        };
        Ok(IntegralSpec { flavors, basic, literal_kind })
    }

    fn parse_integral_or_reference(&mut self) -> Result<LayoutElement> {
        let flavors = self.parse_flavors();
        let basic = self.parse_basic()?;
        match self.peek() {
            Some(b'K') => {
                self.pos += 1;
                let kind = match self.bump() {
                    Some(c @ (b'I' | b'J' | b'F' | b'D' | b'S' | b'L' | b'N')) => c as char,
                    _ => return bad_layout_error("expected a literal-pool kind letter after K"),
                };
                Ok(LayoutElement::Integral(IntegralSpec { flavors, basic, literal_kind: Some(kind) }))
            }
            Some(b'R') => {
                self.pos += 1;
                let bank = match self.bump() {
                    Some(c @ (b'C' | b'S' | b'D' | b'F' | b'M' | b'I' | b'U' | b'Q')) => c as char,
                    _ => return bad_layout_error("expected a reference bank letter after R"),
                };
                let group = if self.peek() == Some(b'(') {
                    self.pos += 1;
                    let n = self.parse_unsigned_decimal()?;
                    self.expect(b')')?;
                    Some(n)
                } else {
                    None
                };
                Ok(LayoutElement::Reference(ReferenceSpec { flavors, basic, bank, group }))
            }
            _ => Ok(LayoutElement::Integral(IntegralSpec { flavors, basic, literal_kind: None })),
        }
    }

    fn parse_unsigned_decimal(&mut self) -> Result<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == start {
            return bad_layout_error("expected a decimal number");
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(crate::error::Error::BadLayout("decimal number out of range"))
    }

    fn parse_signed_decimal(&mut self) -> Result<i64> {
        let negative = if self.peek() == Some(b'-') {
            self.pos += 1;
            true
        } else {
            false
        };
        let n = self.parse_unsigned_decimal()? as i64;
        Ok(if negative { -n } else { n })
    }

    fn parse_body(&mut self) -> Result<Vec<LayoutElement>> {
        self.expect(b'[')?;
        if self.peek() == Some(b']') {
            return bad_layout_error("empty layout body");
        }
        let body = self.parse_sequence(Some(b']'))?;
        self.expect(b']')?;
        Ok(body)
    }

    fn parse_callable(&mut self) -> Result<LayoutElement> {
        let index = self.next_callable_id;
        self.next_callable_id += 1;
        let body = self.parse_body()?;
        Ok(LayoutElement::Callable { index, body })
    }

    fn parse_call(&mut self) -> Result<LayoutElement> {
        self.expect(b'(')?;
        let n = self.parse_signed_decimal()?;
        self.expect(b')')?;
        if n < i32::MIN as i64 || n > i32::MAX as i64 {
            return bad_layout_error("call offset out of range");
        }
        Ok(LayoutElement::Call(n as i32))
    }

    fn parse_replication(&mut self) -> Result<LayoutElement> {
        self.expect(b'N')?;
        let count = self.parse_integral()?;
        let body = self.parse_body()?;
        Ok(LayoutElement::Replication { count, body })
    }

    fn parse_union(&mut self) -> Result<LayoutElement> {
        self.expect(b'T')?;
        let tag = self.parse_integral()?;
        let mut cases = Vec::new();
        loop {
            if self.peek() != Some(b'(') {
                break;
            }
            self.pos += 1;
            let mut values = Vec::new();
            if self.peek() != Some(b')') {
                values.push(self.parse_signed_decimal()?);
                while self.peek() == Some(b',') {
                    self.pos += 1;
                    values.push(self.parse_signed_decimal()?);
                }
            }
            self.expect(b')')?;
            let body = self.parse_body()?;
            if values.is_empty() {
                // `()[default]`: the empty-tag-list case is the default,
                // and must be the last one.
                return Ok(LayoutElement::Union { tag, cases, default: body });
            }
            cases.push((values, body));
        }
        bad_layout_error("union layout missing a default `()[...]` case")
    }
}

/// Decodes `n` outer instances of a flat sequence of simple leaf bands
/// (no nested replication/union), one column per leaf, column-major
/// (`spec.md` §4.5: "an attribute's payload fans out into one integer
/// band per Integral/Reference leaf; each band is consumed column-wise").
/// Covers the common case of a fixed-shape predefined or user-defined
/// attribute body with no `N`/`T` structure.
pub fn decode_flat_columns<R: ReadBytes>(n: usize, leaf_codecs: &mut [Codec], reader: &mut R) -> Result<Vec<Vec<i64>>> {
    let mut columns = Vec::with_capacity(leaf_codecs.len());
    for codec in leaf_codecs.iter_mut() {
        columns.push(codec.decode_many(n, reader)?.into_iter().map(|v| v as i64).collect::<Vec<_>>());
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(columns.iter().map(|c| c[i]).collect());
    }
    Ok(out)
}

/// Decodes `n` outer instances of a single top-level `Replication` of
/// simple leaf bands (`NH[ ... ]` with no nested replication/union
/// inside the body): the count column, then each leaf's band across the
/// flattened total of all repetitions, in declaration order (`spec.md`
/// §4.6, "band encoding is columnar: all ConstantValue values come
/// before any Signature values" — the same columnar discipline applies
/// one level down, inside a single replicated attribute body).
pub fn decode_replicated_rows<R: ReadBytes>(
    n: usize,
    count_codec: &mut Codec,
    leaf_codecs: &mut [Codec],
    reader: &mut R,
) -> Result<Vec<Vec<Vec<i64>>>> {
    let counts = count_codec.decode_many(n, reader)?;
    let total: usize = counts.iter().map(|&c| c.max(0) as usize).sum();

    let mut leaf_columns: Vec<Vec<i64>> = Vec::with_capacity(leaf_codecs.len());
    for codec in leaf_codecs.iter_mut() {
        leaf_columns.push(codec.decode_many(total, reader)?.into_iter().map(|v| v as i64).collect());
    }

    let mut out = Vec::with_capacity(n);
    let mut cursor = 0usize;
    for &c in &counts {
        let c = c.max(0) as usize;
        let mut rows = Vec::with_capacity(c);
        for _ in 0..c {
            rows.push(leaf_columns.iter().map(|col| col[cursor]).collect());
            cursor += 1;
        }
        out.push(rows);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_integral() {
        let els = parse("SH").unwrap();
        assert_eq!(
            els,
            vec![LayoutElement::Integral(IntegralSpec {
                flavors: Flavors { signed: true, ..Default::default() },
                basic: BasicType::Half,
                literal_kind: None,
            })]
        );
    }

    #[test]
    fn parses_a_reference_with_group() {
        let els = parse("IRC(2)").unwrap();
        assert_eq!(
            els,
            vec![LayoutElement::Reference(ReferenceSpec {
                flavors: Flavors::default(),
                basic: BasicType::Int,
                bank: 'C',
                group: Some(2),
            })]
        );
    }

    #[test]
    fn parses_replication_and_rejects_empty_body() {
        let els = parse("NH[HRCH]").unwrap();
        match &els[0] {
            LayoutElement::Replication { body, .. } => assert_eq!(body.len(), 2),
            _ => panic!("expected replication"),
        }
        assert!(parse("NH[]").is_err());
        assert!(parse("[]").is_err());
    }

    #[test]
    fn parses_union_with_default() {
        let els = parse("TB(1,2)[HRC](0)[HRC]()[H]").unwrap();
        match &els[0] {
            LayoutElement::Union { cases, default, .. } => {
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].0, vec![1, 2]);
                assert_eq!(default.len(), 1);
            }
            _ => panic!("expected union"),
        }
    }

    #[test]
    fn numbers_callables_in_appearance_order_and_parses_calls() {
        let els = parse("[H(0)][H]").unwrap();
        match &els[0] {
            LayoutElement::Callable { index, body } => {
                assert_eq!(*index, 0);
                assert!(matches!(body[1], LayoutElement::Call(0)));
            }
            _ => panic!("expected callable"),
        }
        match &els[1] {
            LayoutElement::Callable { index, .. } => assert_eq!(*index, 1),
            _ => panic!("expected callable"),
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("H)").is_err());
    }

    #[test]
    fn decodes_flat_columns() {
        use crate::codec::registry::byte1;
        use crate::io::BufReader;
        let mut codecs = vec![byte1(), byte1()];
        let mut r = BufReader::new(&[1, 2, 3, 10, 20, 30]);
        let rows = decode_flat_columns(3, &mut codecs, &mut r).unwrap();
        assert_eq!(rows, vec![vec![1, 10], vec![2, 20], vec![3, 30]]);
    }

    #[test]
    fn decodes_replicated_rows() {
        use crate::codec::registry::byte1;
        use crate::io::BufReader;
        let mut count_codec = byte1();
        let mut leaf_codecs = vec![byte1(), byte1()];
        // counts = [2, 0, 1]; then 3 total rows: leaf0 column, leaf1 column.
        let mut r = BufReader::new(&[2, 0, 1, 1, 2, 3, 11, 22, 33]);
        let rows = decode_replicated_rows(3, &mut count_codec, &mut leaf_codecs, &mut r).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![vec![1, 11], vec![2, 22]]);
        assert_eq!(rows[1], Vec::<Vec<i64>>::new());
        assert_eq!(rows[2], vec![vec![3, 33]]);
    }
}
