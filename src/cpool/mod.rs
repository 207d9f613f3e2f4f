//! Constant-pool bands (component E, `spec.md` §4.4): decodes the packed
//! `cp_Utf8`, `cp_Int`, `cp_Float`, `cp_Long`, `cp_Double`, `cp_String`,
//! `cp_Class`, `cp_Signature`, `cp_Descr`, `cp_Field`, `cp_Method`, and
//! `cp_Imethod` bands, in that fixed order, into [`Entry`] values.
//!
//! Cross-references between bands (a `cp_String` pointing back at a
//! `cp_Utf8` slot, a `cp_Field` pointing at a `cp_Class` and a `cp_Descr`)
//! are resolved immediately into the referenced value rather than carried
//! as raw band-local indices, using `Rc<str>` as a cheap-to-clone interned
//! handle (Design Notes, "Cycles": an arena of handles instead of
//! re-following integer indices at every use site).

mod utf8;

pub(crate) use utf8::encode as encode_modified_utf8;

use std::rc::Rc;

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::io::ReadBytes;

/// An interned, reference-counted string: the "arena handle" for every
/// `Utf8`-shaped value (`spec.md` Design Notes, "Cycles").
pub type Utf8Ref = Rc<str>;

/// A constant-pool entry (`spec.md` §3, "Constant-pool entry").
///
/// Unlike the band-local indices Pack200 decodes, every cross-reference
/// here is already resolved to the referenced value; the class-file
/// assembler (component I) is what re-introduces indices, once per
/// deduplicated pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Utf8(Utf8Ref),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(Utf8Ref),
    Class(Utf8Ref),
    NameAndType { name: Utf8Ref, descriptor: Utf8Ref },
    FieldRef { class: Utf8Ref, name: Utf8Ref, descriptor: Utf8Ref },
    MethodRef { class: Utf8Ref, name: Utf8Ref, descriptor: Utf8Ref },
    InterfaceMethodRef { class: Utf8Ref, name: Utf8Ref, descriptor: Utf8Ref },
}

/// How many entries are present in each cp band. The segment header
/// (component D) derives these from the archive-level counts and, when
/// `HAVE_CP_NUMBERS` is set, from an explicit numbers band; `cpool` itself
/// takes them as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpCounts {
    pub utf8: usize,
    pub int: usize,
    pub float: usize,
    pub long: usize,
    pub double: usize,
    pub string: usize,
    pub class: usize,
    pub signature: usize,
    pub descr: usize,
    pub field: usize,
    pub method: usize,
    pub imethod: usize,
}

/// The codec used for each band, one field per band that isn't itself
/// implied by another (e.g. `cp_Utf8` needs two: prefix counts and suffix
/// lengths). Every field is an owned [`Codec`] since codecs are stateful
/// (Design Notes, "Iterator-shaped codecs") and each band's decode
/// consumes its own carried `last`.
#[derive(Debug, Clone)]
pub struct CpCodecs {
    pub utf8_prefix: Codec,
    pub utf8_suffix_len: Codec,
    pub int: Codec,
    pub float: Codec,
    pub long: Codec,
    pub double: Codec,
    pub string: Codec,
    pub class: Codec,
    pub signature_form: Codec,
    pub signature_classes: Codec,
    pub descr_name: Codec,
    pub descr_signature: Codec,
    pub field_class: Codec,
    pub field_descr: Codec,
    pub method_class: Codec,
    pub method_descr: Codec,
    pub imethod_class: Codec,
    pub imethod_descr: Codec,
}

impl CpCodecs {
    /// Every band driven by one codec, e.g. the caller-supplied default
    /// codec from the segment header (`spec.md` §4.2, specifier `0`).
    pub fn uniform(codec: Codec) -> CpCodecs {
        CpCodecs {
            utf8_prefix: codec.clone(),
            utf8_suffix_len: codec.clone(),
            int: codec.clone(),
            float: codec.clone(),
            long: codec.clone(),
            double: codec.clone(),
            string: codec.clone(),
            class: codec.clone(),
            signature_form: codec.clone(),
            signature_classes: codec.clone(),
            descr_name: codec.clone(),
            descr_signature: codec.clone(),
            field_class: codec.clone(),
            field_descr: codec.clone(),
            method_class: codec.clone(),
            method_descr: codec.clone(),
            imethod_class: codec.clone(),
            imethod_descr: codec,
        }
    }
}

/// The decoded contents of every cp band, in band-local (0-based) index
/// order (`spec.md` §4.4).
#[derive(Debug, Default)]
pub struct ConstantPoolBands {
    utf8: Vec<Utf8Ref>,
    int: Vec<i32>,
    float: Vec<f32>,
    long: Vec<i64>,
    double: Vec<f64>,
    /// `cp_String` entries, already resolved to their referenced `Utf8Ref`.
    string: Vec<Utf8Ref>,
    /// `cp_Class` entries, already resolved to their referenced `Utf8Ref`.
    class: Vec<Utf8Ref>,
    /// `cp_Descr` entries: (name, descriptor) pairs, forming `NameAndType`.
    descr: Vec<(Utf8Ref, Utf8Ref)>,
    field: Vec<(Utf8Ref, Utf8Ref, Utf8Ref)>,
    method: Vec<(Utf8Ref, Utf8Ref, Utf8Ref)>,
    imethod: Vec<(Utf8Ref, Utf8Ref, Utf8Ref)>,
}

impl ConstantPoolBands {
    pub fn read<R: ReadBytes>(reader: &mut R, counts: &CpCounts, codecs: &mut CpCodecs) -> Result<ConstantPoolBands> {
        let utf8 = read_utf8_band(reader, counts.utf8, &mut codecs.utf8_prefix, &mut codecs.utf8_suffix_len)?;

        let int = codecs.int.decode_many(counts.int, reader)?;
        let float = codecs
            .float
            .decode_many(counts.float, reader)?
            .into_iter()
            .map(|v| f32::from_bits(v as u32))
            .collect();
        let long = read_long_band(reader, counts.long, &mut codecs.long)?;
        let double = read_double_band(reader, counts.double, &mut codecs.double)?;

        let string = read_index_band(reader, counts.string, &mut codecs.string, &utf8, "cp_String")?;
        let class = read_index_band(reader, counts.class, &mut codecs.class, &utf8, "cp_Class")?;

        let signature = read_signature_band(
            reader,
            counts.signature,
            &mut codecs.signature_form,
            &mut codecs.signature_classes,
            &utf8,
            &class,
        )?;

        let descr = read_descr_band(reader, counts.descr, &mut codecs.descr_name, &mut codecs.descr_signature, &utf8, &signature)?;

        let field = read_member_band(reader, counts.field, &mut codecs.field_class, &mut codecs.field_descr, &class, &descr)?;
        let method = read_member_band(reader, counts.method, &mut codecs.method_class, &mut codecs.method_descr, &class, &descr)?;
        let imethod =
            read_member_band(reader, counts.imethod, &mut codecs.imethod_class, &mut codecs.imethod_descr, &class, &descr)?;

        Ok(ConstantPoolBands { utf8, int, float, long, double, string, class, descr, field, method, imethod })
    }

    pub fn utf8(&self, i: usize) -> Option<&Utf8Ref> {
        self.utf8.get(i)
    }
    pub fn class(&self, i: usize) -> Option<&Utf8Ref> {
        self.class.get(i)
    }
    pub fn string(&self, i: usize) -> Option<&Utf8Ref> {
        self.string.get(i)
    }
    pub fn int(&self, i: usize) -> Option<i32> {
        self.int.get(i).copied()
    }
    pub fn float(&self, i: usize) -> Option<f32> {
        self.float.get(i).copied()
    }
    pub fn long(&self, i: usize) -> Option<i64> {
        self.long.get(i).copied()
    }
    pub fn double(&self, i: usize) -> Option<f64> {
        self.double.get(i).copied()
    }
    pub fn descr(&self, i: usize) -> Option<(&Utf8Ref, &Utf8Ref)> {
        self.descr.get(i).map(|(n, d)| (n, d))
    }
    pub fn field(&self, i: usize) -> Option<Entry> {
        self.field.get(i).map(|(c, n, d)| Entry::FieldRef { class: c.clone(), name: n.clone(), descriptor: d.clone() })
    }
    pub fn method(&self, i: usize) -> Option<Entry> {
        self.method.get(i).map(|(c, n, d)| Entry::MethodRef { class: c.clone(), name: n.clone(), descriptor: d.clone() })
    }
    pub fn imethod(&self, i: usize) -> Option<Entry> {
        self.imethod
            .get(i)
            .map(|(c, n, d)| Entry::InterfaceMethodRef { class: c.clone(), name: n.clone(), descriptor: d.clone() })
    }

    /// Every entry, in the order `spec.md` §4.4 decodes the bands
    /// (`cp_Descr`/`cp_Signature` fold into `NameAndType`). Each entry's
    /// position here is its *global index*, used by the assembler to
    /// impose the stable primary ordering from `spec.md` §4.8.
    pub fn all_entries(&self) -> Vec<Entry> {
        let mut out = Vec::with_capacity(
            self.utf8.len()
                + self.int.len()
                + self.float.len()
                + self.long.len()
                + self.double.len()
                + self.string.len()
                + self.class.len()
                + self.descr.len()
                + self.field.len()
                + self.method.len()
                + self.imethod.len(),
        );
        out.extend(self.utf8.iter().cloned().map(Entry::Utf8));
        out.extend(self.int.iter().copied().map(Entry::Integer));
        out.extend(self.float.iter().copied().map(Entry::Float));
        out.extend(self.long.iter().copied().map(Entry::Long));
        out.extend(self.double.iter().copied().map(Entry::Double));
        out.extend(self.string.iter().cloned().map(Entry::String));
        out.extend(self.class.iter().cloned().map(Entry::Class));
        out.extend(self.descr.iter().cloned().map(|(name, descriptor)| Entry::NameAndType { name, descriptor }));
        out.extend((0..self.field.len()).filter_map(|i| self.field(i)));
        out.extend((0..self.method.len()).filter_map(|i| self.method(i)));
        out.extend((0..self.imethod.len()).filter_map(|i| self.imethod(i)));
        out
    }
}

fn read_long_band<R: ReadBytes>(reader: &mut R, n: usize, codec: &mut Codec) -> Result<Vec<i64>> {
    // Long values exceed i32 range; decode via repeated decode_one rather
    // than decode_many, which truncates to i32 for ordinary bands.
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(codec.decode_one(reader)?);
    }
    Ok(out)
}

fn read_double_band<R: ReadBytes>(reader: &mut R, n: usize, codec: &mut Codec) -> Result<Vec<f64>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(f64::from_bits(codec.decode_one(reader)? as u64));
    }
    Ok(out)
}

/// Reads `cp_Utf8`: a prefix-reuse count band, a suffix-length band, and
/// the raw suffix bytes, in that order (`spec.md` §4.4). Each string is
/// `previous[..prefix] || decode_modified_utf8(suffix_bytes)`; the first
/// string never has a previous one, so its effective prefix is always 0.
fn read_utf8_band<R: ReadBytes>(
    reader: &mut R,
    n: usize,
    prefix_codec: &mut Codec,
    suffix_len_codec: &mut Codec,
) -> Result<Vec<Utf8Ref>> {
    let prefixes = prefix_codec.decode_many(n, reader)?;
    let suffix_lens = suffix_len_codec.decode_many(n, reader)?;

    let mut out: Vec<Utf8Ref> = Vec::with_capacity(n);
    for i in 0..n {
        let suffix_len = suffix_lens[i];
        if suffix_len < 0 {
            return Err(Error::BadLayout("cp_Utf8 suffix length is negative"));
        }
        let suffix_bytes = reader.read_vec_exact(suffix_len as usize)?;
        let suffix = utf8::decode(&suffix_bytes)?;

        let whole = if i == 0 {
            suffix
        } else {
            let prefix_len = prefixes[i].max(0) as usize;
            let previous = &out[i - 1];
            let prefix_chars: String = previous.chars().take(prefix_len).collect();
            prefix_chars + &suffix
        };
        out.push(Rc::from(whole));
    }
    Ok(out)
}

fn read_index_band<R: ReadBytes>(
    reader: &mut R,
    n: usize,
    codec: &mut Codec,
    utf8: &[Utf8Ref],
    where_: &'static str,
) -> Result<Vec<Utf8Ref>> {
    let indices = codec.decode_many(n, reader)?;
    indices
        .into_iter()
        .map(|i| utf8.get(i as usize).cloned().ok_or(Error::BadLayout(where_)))
        .collect()
}

/// Reads `cp_Signature`: for each entry, a form index into `cp_Utf8`
/// naming a descriptor template, then one class reference per `L;`
/// placeholder the template contains, spliced in left to right
/// (`spec.md` §4.4, "Signatures are formed by splicing").
fn read_signature_band<R: ReadBytes>(
    reader: &mut R,
    n: usize,
    form_codec: &mut Codec,
    classes_codec: &mut Codec,
    utf8: &[Utf8Ref],
    classes: &[Utf8Ref],
) -> Result<Vec<Utf8Ref>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let form_idx = form_codec.decode_one(reader)?;
        let form = utf8
            .get(form_idx as usize)
            .ok_or(Error::BadLayout("cp_Signature form index out of range"))?;
        let placeholder_count = count_placeholders(form);
        let mut spliced = String::with_capacity(form.len());
        let mut remaining = form.as_str();
        for _ in 0..placeholder_count {
            let at = remaining.find("L;").expect("count_placeholders matched this many");
            spliced.push_str(&remaining[..at]);
            let class_idx = classes_codec.decode_one(reader)?;
            let class_name = classes
                .get(class_idx as usize)
                .ok_or(Error::BadLayout("cp_Signature class index out of range"))?;
            spliced.push('L');
            spliced.push_str(class_name);
            spliced.push(';');
            remaining = &remaining[at + 2..];
        }
        spliced.push_str(remaining);
        out.push(Rc::from(spliced));
    }
    Ok(out)
}

fn count_placeholders(form: &str) -> usize {
    let bytes = form.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'L' && bytes[i + 1] == b';' {
            count += 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    count
}

fn read_descr_band<R: ReadBytes>(
    reader: &mut R,
    n: usize,
    name_codec: &mut Codec,
    signature_codec: &mut Codec,
    utf8: &[Utf8Ref],
    signatures: &[Utf8Ref],
) -> Result<Vec<(Utf8Ref, Utf8Ref)>> {
    let names = name_codec.decode_many(n, reader)?;
    let sigs = signature_codec.decode_many(n, reader)?;
    names
        .into_iter()
        .zip(sigs)
        .map(|(ni, si)| {
            let name = utf8.get(ni as usize).cloned().ok_or(Error::BadLayout("cp_Descr name index out of range"))?;
            let descriptor = signatures
                .get(si as usize)
                .cloned()
                .ok_or(Error::BadLayout("cp_Descr signature index out of range"))?;
            Ok((name, descriptor))
        })
        .collect()
}

fn read_member_band<R: ReadBytes>(
    reader: &mut R,
    n: usize,
    class_codec: &mut Codec,
    descr_codec: &mut Codec,
    classes: &[Utf8Ref],
    descrs: &[(Utf8Ref, Utf8Ref)],
) -> Result<Vec<(Utf8Ref, Utf8Ref, Utf8Ref)>> {
    let class_idx = class_codec.decode_many(n, reader)?;
    let descr_idx = descr_codec.decode_many(n, reader)?;
    class_idx
        .into_iter()
        .zip(descr_idx)
        .map(|(ci, di)| {
            let class = classes.get(ci as usize).cloned().ok_or(Error::BadLayout("member class index out of range"))?;
            let (name, descriptor) =
                descrs.get(di as usize).cloned().ok_or(Error::BadLayout("member descr index out of range"))?;
            Ok((class, name, descriptor))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Bhsd, Signedness};
    use crate::io::BufReader;

    fn unsigned_byte() -> Codec {
        Codec::Bhsd(Bhsd::new(1, 256, Signedness::Unsigned, false).unwrap())
    }

    #[test]
    fn utf8_band_reconstructs_prefix_reuse() {
        // Two strings: "foo" then "foobar", sharing the 3-char prefix "foo".
        let prefixes = [0u8, 3];
        let suffix_lens = [3u8, 3];
        let mut bytes = vec![];
        bytes.extend(prefixes);
        bytes.extend(suffix_lens);
        bytes.extend(b"foo");
        bytes.extend(b"bar");
        let mut reader = BufReader::new(&bytes);
        let mut prefix_codec = unsigned_byte();
        let mut suffix_codec = unsigned_byte();
        let strings = read_utf8_band(&mut reader, 2, &mut prefix_codec, &mut suffix_codec).unwrap();
        assert_eq!(&*strings[0], "foo");
        assert_eq!(&*strings[1], "foobar");
    }

    #[test]
    fn signature_band_splices_class_refs() {
        let utf8: Vec<Utf8Ref> = vec![Rc::from("(L;L;)V")];
        let classes: Vec<Utf8Ref> = vec![Rc::from("java/lang/Object"), Rc::from("java/lang/String")];
        // form index 0, then class indices 0 and 1.
        let mut reader = BufReader::new(&[0, 0, 1]);
        let mut form_codec = unsigned_byte();
        let mut class_codec = unsigned_byte();
        let out = read_signature_band(&mut reader, 1, &mut form_codec, &mut class_codec, &utf8, &classes).unwrap();
        assert_eq!(&*out[0], "(Ljava/lang/Object;Ljava/lang/String;)V");
    }

    #[test]
    fn read_populates_every_band_in_order() {
        // utf8 count=1 ("A", no prefix reuse possible on the first entry)
        let mut bytes = vec![];
        bytes.push(0u8); // prefix[0]
        bytes.push(1u8); // suffix_len[0]
        bytes.push(b'A');
        bytes.push(65u8); // int value
        bytes.push(0u8); // cp_String index -> utf8[0]
        bytes.push(0u8); // cp_Class index -> utf8[0]
        let mut reader = BufReader::new(&bytes);
        let counts = CpCounts { utf8: 1, int: 1, string: 1, class: 1, ..Default::default() };
        let mut codecs = CpCodecs::uniform(unsigned_byte());
        let bands = ConstantPoolBands::read(&mut reader, &counts, &mut codecs).unwrap();
        assert_eq!(&**bands.utf8(0).unwrap(), "A");
        assert_eq!(bands.int(0).unwrap(), 65);
        assert_eq!(&**bands.string(0).unwrap(), "A");
        assert_eq!(&**bands.class(0).unwrap(), "A");
    }
}
