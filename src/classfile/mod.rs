//! The class constant pool (`spec.md` §3 "Class constant pool", §4.8
//! "Class-file assembler"): an ordered, deduplicated pool with "must
//! start" front-loading and `Long`/`Double` double-slot allocation.

use std::collections::{HashMap, HashSet};

use crate::cpool::Entry;
use crate::error::{Error, Result};

/// A hashable, reflexively-equal wrapper around [`Entry`] so it can live
/// in a [`HashSet`]/[`HashMap`] key. `Entry` carries `f32`/`f64` constant
/// values; this pool only ever compares them for value-based
/// deduplication of decoded class-file constants, never NaN-sensitive
/// arithmetic, so treating bit-identical floats as equal (and hashing
/// their bit pattern) is sound for this use (Design Notes, "Polymorphism":
/// "attribute equality for CP dedup is by structural value, not
/// identity").
#[derive(Debug, Clone)]
struct Key(Entry);

impl PartialEq for Key {
    fn eq(&self, other: &Key) -> bool {
        entry_eq(&self.0, &other.0)
    }
}
impl Eq for Key {}

impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        entry_hash(&self.0, state)
    }
}

fn entry_eq(a: &Entry, b: &Entry) -> bool {
    use Entry::*;
    match (a, b) {
        (Utf8(x), Utf8(y)) | (String(x), String(y)) | (Class(x), Class(y)) => x == y,
        (Integer(x), Integer(y)) => x == y,
        (Float(x), Float(y)) => x.to_bits() == y.to_bits(),
        (Long(x), Long(y)) => x == y,
        (Double(x), Double(y)) => x.to_bits() == y.to_bits(),
        (NameAndType { name: n1, descriptor: d1 }, NameAndType { name: n2, descriptor: d2 }) => n1 == n2 && d1 == d2,
        (FieldRef { class: c1, name: n1, descriptor: d1 }, FieldRef { class: c2, name: n2, descriptor: d2 })
        | (MethodRef { class: c1, name: n1, descriptor: d1 }, MethodRef { class: c2, name: n2, descriptor: d2 })
        | (
            InterfaceMethodRef { class: c1, name: n1, descriptor: d1 },
            InterfaceMethodRef { class: c2, name: n2, descriptor: d2 },
        ) => c1 == c2 && n1 == n2 && d1 == d2,
        _ => false,
    }
}

fn entry_hash<H: std::hash::Hasher>(e: &Entry, state: &mut H) {
    use std::hash::Hash as _;
    use Entry::*;
    std::mem::discriminant(e).hash(state);
    match e {
        Utf8(s) | String(s) | Class(s) => s.hash(state),
        Integer(v) => v.hash(state),
        Float(v) => v.to_bits().hash(state),
        Long(v) => v.hash(state),
        Double(v) => v.to_bits().hash(state),
        NameAndType { name, descriptor } => {
            name.hash(state);
            descriptor.hash(state);
        }
        FieldRef { class, name, descriptor }
        | MethodRef { class, name, descriptor }
        | InterfaceMethodRef { class, name, descriptor } => {
            class.hash(state);
            name.hash(state);
            descriptor.hash(state);
        }
    }
}

/// The nested entries a composite entry implies, so adding e.g. a
/// `FieldRef` also adds its `Class` and `NameAndType`, which in turn add
/// their `Utf8`s (`spec.md` §4.8 step 2).
fn nested_of(e: &Entry) -> Vec<Entry> {
    use Entry::*;
    match e {
        Utf8(_) | Integer(_) | Float(_) | Long(_) | Double(_) => vec![],
        String(s) => vec![Utf8(s.clone())],
        Class(name) => vec![Utf8(name.clone())],
        NameAndType { name, descriptor } => vec![Utf8(name.clone()), Utf8(descriptor.clone())],
        FieldRef { class, name, descriptor } | MethodRef { class, name, descriptor } | InterfaceMethodRef { class, name, descriptor } => {
            vec![Class(class.clone()), NameAndType { name: name.clone(), descriptor: descriptor.clone() }]
        }
    }
}

fn is_wide(e: &Entry) -> bool {
    matches!(e, Entry::Long(_) | Entry::Double(_))
}

/// Sort key for residual `Utf8`/`Class` entries with no global index
/// (`spec.md` §4.8 step 3: "sorted lexicographically (stable)").
fn lexicographic_key(e: &Entry) -> Option<&str> {
    match e {
        Entry::Utf8(s) => Some(s),
        Entry::Class(s) => Some(s),
        _ => None,
    }
}

/// The ordered, deduplicated constant pool for one class (`spec.md` §3,
/// §4.8). Built by repeated [`ClassConstantPool::add`] /
/// [`ClassConstantPool::add_must_start`] calls, then finalized once by
/// [`ClassConstantPool::resolve`].
pub struct ClassConstantPool {
    global_index: HashMap<Key, usize>,
    seen: HashSet<Key>,
    added_order: Vec<Entry>,
    must_start: HashSet<Key>,
    resolved: Option<Vec<Entry>>,
    index_of_map: HashMap<Key, u32>,
}

impl ClassConstantPool {
    /// `cp_all` is the packed cp-all band's entries in their decoded
    /// order (`cpool::ConstantPoolBands::all_entries`), used to recover
    /// each entry's global index for primary ordering.
    pub fn new(cp_all: &[Entry]) -> ClassConstantPool {
        let mut global_index = HashMap::with_capacity(cp_all.len());
        for (i, e) in cp_all.iter().enumerate() {
            global_index.entry(Key(e.clone())).or_insert(i);
        }
        ClassConstantPool {
            global_index,
            seen: HashSet::new(),
            added_order: Vec::new(),
            must_start: HashSet::new(),
            resolved: None,
            index_of_map: HashMap::new(),
        }
    }

    /// Adds `entry` and, transitively, every entry it nests, unless
    /// already present (`spec.md` §4.8 step 2).
    pub fn add(&mut self, entry: Entry) {
        self.add_inner(entry, false);
    }

    /// Like [`Self::add`], but marks `entry` itself (not its nested
    /// entries) as "must start": it is moved to the very front of the
    /// pool during resolution (`spec.md` §4.8 step 4), for operands of
    /// opcodes that only admit a restricted-width index.
    pub fn add_must_start(&mut self, entry: Entry) {
        self.must_start.insert(Key(entry.clone()));
        self.add_inner(entry, false);
    }

    fn add_inner(&mut self, entry: Entry, _from_nested: bool) {
        let key = Key(entry.clone());
        if self.seen.contains(&key) {
            return;
        }
        self.seen.insert(key);
        let nested = nested_of(&entry);
        self.added_order.push(entry);
        for n in nested {
            self.add_inner(n, true);
        }
    }

    /// Builds the final 1-based index assignment (`spec.md` §4.8 steps
    /// 3-5). Idempotent is not claimed: calling this twice is a
    /// programmer error (`spec.md` §4.8 "Invariant").
    pub fn resolve(&mut self) -> Result<()> {
        if self.resolved.is_some() {
            return Err(Error::AlreadyResolved);
        }

        let mut with_global: Vec<(usize, Entry)> = Vec::new();
        let mut residual_textual: Vec<Entry> = Vec::new();
        let mut residual_other: Vec<Entry> = Vec::new();

        for e in &self.added_order {
            if let Some(&gi) = self.global_index.get(&Key(e.clone())) {
                with_global.push((gi, e.clone()));
            } else if lexicographic_key(e).is_some() {
                residual_textual.push(e.clone());
            } else {
                residual_other.push(e.clone());
            }
        }

        with_global.sort_by_key(|(gi, _)| *gi);
        residual_textual.sort_by(|a, b| lexicographic_key(a).cmp(&lexicographic_key(b)));

        let mut ordered: Vec<Entry> =
            with_global.into_iter().map(|(_, e)| e).chain(residual_textual).chain(residual_other).collect();

        // Stable-partition must-start entries to the front (`spec.md`
        // §4.8 step 4).
        let (front, rest): (Vec<Entry>, Vec<Entry>) =
            ordered.drain(..).partition(|e| self.must_start.contains(&Key(e.clone())));
        ordered = front.into_iter().chain(rest).collect();

        if ordered.len() > u16::MAX as usize {
            return Err(Error::PoolOverflow);
        }

        let mut index_of_map = HashMap::with_capacity(ordered.len());
        let mut next_index: u32 = 1;
        for e in &ordered {
            if next_index > u16::MAX as u32 {
                return Err(Error::PoolOverflow);
            }
            index_of_map.insert(Key(e.clone()), next_index);
            next_index += if is_wide(e) { 2 } else { 1 };
        }
        if next_index - 1 > u16::MAX as u32 {
            return Err(Error::PoolOverflow);
        }

        self.index_of_map = index_of_map;
        self.resolved = Some(ordered);
        Ok(())
    }

    /// The 1-based class-file index for `entry`. Only valid after
    /// [`Self::resolve`] (`spec.md` §4.8 "Invariant").
    pub fn index_of(&self, entry: &Entry) -> Result<u32> {
        if self.resolved.is_none() {
            return Err(Error::EmitBeforeResolve);
        }
        self.index_of_map.get(&Key(entry.clone())).copied().ok_or(Error::EmitBeforeResolve)
    }

    /// `pool.size() + 1` in JVMS terms: one past the highest occupied
    /// slot, counting the phantom second slot of every `Long`/`Double`.
    pub fn size_plus_one(&self) -> Result<u16> {
        let ordered = self.resolved.as_ref().ok_or(Error::EmitBeforeResolve)?;
        let mut n: u32 = 1;
        for e in ordered {
            n += if is_wide(e) { 2 } else { 1 };
        }
        Ok(n as u16)
    }

    /// The entries in final pool order, skipping nothing (the phantom
    /// `Long`/`Double` slot is the emitter's concern, not this list's).
    pub fn entries_in_order(&self) -> Result<&[Entry]> {
        self.resolved.as_deref().ok_or(Error::EmitBeforeResolve)
    }

    /// `count_of(Long) + count_of(Double)`, for the pool-ordering
    /// testable property (`spec.md` §8).
    pub fn long_slot_count(&self) -> Result<usize> {
        Ok(self.entries_in_order()?.iter().filter(|e| is_wide(e)).count())
    }

    /// Whether every must-start entry's index is less than every
    /// non-must-start entry's index (`spec.md` §8, "Pool ordering").
    pub fn must_start_precedes_rest(&self) -> Result<bool> {
        let ordered = self.entries_in_order()?;
        let mut seen_non_must_start = false;
        for e in ordered {
            let is_must_start = self.must_start.contains(&Key(e.clone()));
            if is_must_start && seen_non_must_start {
                return Ok(false);
            }
            if !is_must_start {
                seen_non_must_start = true;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8(s: &str) -> Entry {
        Entry::Utf8(std::rc::Rc::from(s))
    }
    fn class(s: &str) -> Entry {
        Entry::Class(std::rc::Rc::from(s))
    }

    #[test]
    fn long_and_double_take_two_slots_each() {
        let cp_all = vec![utf8("a")];
        let mut pool = ClassConstantPool::new(&cp_all);
        pool.add(utf8("a"));
        pool.add(Entry::Long(5));
        pool.add(Entry::Double(2.5));
        pool.resolve().unwrap();
        assert_eq!(pool.long_slot_count().unwrap(), 2);
        let idx_a = pool.index_of(&utf8("a")).unwrap();
        let idx_long = pool.index_of(&Entry::Long(5)).unwrap();
        let idx_double = pool.index_of(&Entry::Double(2.5)).unwrap();
        // Each wide entry consumes its own slot plus the next index's gap.
        assert_eq!(idx_double - idx_long, 2);
        assert!(idx_a > 0);
    }

    #[test]
    fn must_start_entries_sort_before_the_rest() {
        let cp_all = vec![class("B"), class("A")];
        let mut pool = ClassConstantPool::new(&cp_all);
        pool.add(class("B"));
        pool.add_must_start(class("A"));
        pool.resolve().unwrap();
        assert!(pool.must_start_precedes_rest().unwrap());
        assert!(pool.index_of(&class("A")).unwrap() < pool.index_of(&class("B")).unwrap());
    }

    #[test]
    fn residual_entries_sort_lexicographically() {
        let cp_all = vec![]; // neither entry has a global index
        let mut pool = ClassConstantPool::new(&cp_all);
        pool.add(utf8("zebra"));
        pool.add(utf8("apple"));
        pool.resolve().unwrap();
        assert!(pool.index_of(&utf8("apple")).unwrap() < pool.index_of(&utf8("zebra")).unwrap());
    }

    #[test]
    fn emit_before_resolve_is_an_error() {
        let pool = ClassConstantPool::new(&[]);
        assert!(matches!(pool.index_of(&utf8("x")), Err(Error::EmitBeforeResolve)));
    }

    #[test]
    fn resolving_twice_is_an_error() {
        let mut pool = ClassConstantPool::new(&[]);
        pool.add(utf8("x"));
        pool.resolve().unwrap();
        assert!(matches!(pool.resolve(), Err(Error::AlreadyResolved)));
    }

    #[test]
    fn adding_a_field_ref_transitively_adds_its_class_and_name_and_type() {
        let cp_all = vec![];
        let mut pool = ClassConstantPool::new(&cp_all);
        pool.add(Entry::FieldRef { class: std::rc::Rc::from("Foo"), name: std::rc::Rc::from("x"), descriptor: std::rc::Rc::from("I") });
        pool.resolve().unwrap();
        assert!(pool.index_of(&class("Foo")).is_ok());
        assert!(pool
            .index_of(&Entry::NameAndType { name: std::rc::Rc::from("x"), descriptor: std::rc::Rc::from("I") })
            .is_ok());
        assert!(pool.index_of(&utf8("Foo")).is_ok());
        assert!(pool.index_of(&utf8("x")).is_ok());
        assert!(pool.index_of(&utf8("I")).is_ok());
    }
}
