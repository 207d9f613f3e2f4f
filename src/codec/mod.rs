//! Variable-length integer codecs: BHSD, Run, and Population (`spec.md` §3, §4.1).
//!
//! Codecs are positional and stateful (Design Notes, "Iterator-shaped
//! codecs"): a [`Bhsd`] instance owns its own carried `last` value rather
//! than being a pure function, the same way the teacher's demuxers own a
//! running bit-reservoir or sample-history rather than recomputing it.

pub mod registry;

use crate::error::{Error, Result};
use crate::io::ReadBytes;

/// Signedness mode for a BHSD codec.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signedness {
    Unsigned,
    /// Low-bit zig-zag: even -> `n/2`, odd -> `-(n+1)/2`.
    ZigZagLowBit,
    /// Bias-2 zig-zag: every fourth raw value is stolen for a negative.
    ZigZagBias2,
}

impl Signedness {
    fn code(self) -> u8 {
        match self {
            Signedness::Unsigned => 0,
            Signedness::ZigZagLowBit => 1,
            Signedness::ZigZagBias2 => 2,
        }
    }

    fn from_code(code: u8) -> Result<Signedness> {
        match code {
            0 => Ok(Signedness::Unsigned),
            1 => Ok(Signedness::ZigZagLowBit),
            2 => Ok(Signedness::ZigZagBias2),
            _ => Err(Error::BadCodecSpecifier("signedness must be 0, 1, or 2")),
        }
    }
}

/// A byte-size/high/sign/delta codec (`spec.md` §3, "Codec").
///
/// `b` is the max bytes per integer (1..=5), `h` the continuation radix
/// (1..=256), `s` the signedness, and `d` whether decoded values are
/// carried as deltas against the previous decode.
#[derive(Debug, Clone)]
pub struct Bhsd {
    b: u8,
    h: u16,
    s: Signedness,
    delta: bool,
    /// Carried value for delta mode. `None` until the first decode (or an
    /// explicit seed) supplies one.
    last: Option<i64>,
}

impl Bhsd {
    /// Builds a canonical-shape BHSD codec, validating the invariants from
    /// `spec.md` §3: `b=1 ⇒ h=256`, `b=5 ⇒ h≠256`.
    pub fn new(b: u8, h: u16, s: Signedness, delta: bool) -> Result<Bhsd> {
        if !(1..=5).contains(&b) {
            return Err(Error::BadCodecSpecifier("b must be in 1..=5"));
        }
        if !(1..=256).contains(&h) {
            return Err(Error::BadCodecSpecifier("h must be in 1..=256"));
        }
        if b == 1 && h != 256 {
            return Err(Error::BadCodecSpecifier("b=1 requires h=256"));
        }
        if b == 5 && h == 256 {
            return Err(Error::BadCodecSpecifier("b=5 requires h!=256"));
        }
        Ok(Bhsd { b, h, s, delta, last: None })
    }

    pub fn b(&self) -> u8 {
        self.b
    }
    pub fn h(&self) -> u16 {
        self.h
    }
    pub fn s(&self) -> Signedness {
        self.s
    }
    pub fn is_delta(&self) -> bool {
        self.delta
    }

    /// Seeds the carried `last` value explicitly, e.g. when a band
    /// continues a delta sequence started by an earlier band.
    pub fn with_seed(mut self, seed: i64) -> Bhsd {
        self.last = Some(seed);
        self
    }

    /// `cardinality = Σ_{k=0..b-1} h^k·(256-h) + h^b`.
    pub fn cardinality(&self) -> u64 {
        let h = self.h as u64;
        let mut total: u64 = 0;
        let mut hk: u64 = 1;
        for _ in 0..self.b {
            total += hk * (256 - h);
            hk *= h;
        }
        total += hk;
        total
    }

    /// Smallest value this codec can decode.
    pub fn smallest(&self) -> i64 {
        bounds(self.s, self.cardinality()).0
    }

    /// Largest value this codec can decode.
    pub fn largest(&self) -> i64 {
        bounds(self.s, self.cardinality()).1
    }

    /// Whether this codec can represent `v`.
    pub fn encodes(&self, v: i64) -> bool {
        v >= self.smallest() && v <= self.largest()
    }

    /// Reads the raw, unsigned digit accumulator for a single BHSD integer.
    ///
    /// A byte `v` continues the integer when `v >= 256-h` (there are `h`
    /// such continuation values per position; the remaining `256-h` values
    /// terminate it); each byte, continuation or terminal, contributes its
    /// full value at the position's weight `h^k`, and weight compounds by
    /// `h` only after a continuation. The final byte (position `b-1`)
    /// always terminates regardless of its value. This is the formulation
    /// that reproduces every literal byte sequence in `spec.md` §8 (the
    /// prose in §4.1 describes the same shape but is imprecise about which
    /// side of the threshold continues and what a continuation byte
    /// contributes; the worked scenarios are taken as authoritative).
    fn read_raw<R: ReadBytes>(&self, reader: &mut R) -> Result<u64> {
        let h = self.h as u64;
        let continuation_threshold = 256 - h; // L = 256 - H
        let mut acc: u64 = 0;
        let mut weight: u64 = 1;
        for k in 0..self.b {
            let v = reader.read_byte()? as u64;
            acc += v * weight;
            if v < continuation_threshold || k == self.b - 1 {
                return Ok(acc);
            }
            weight *= h;
        }
        unreachable!("loop always returns by k == b-1")
    }

    fn sign_transform(&self, n: u64) -> i64 {
        match self.s {
            Signedness::Unsigned => n as i64,
            Signedness::ZigZagLowBit => {
                if n % 2 == 0 {
                    (n / 2) as i64
                } else {
                    -(((n + 1) / 2) as i64)
                }
            }
            Signedness::ZigZagBias2 => {
                if n % 4 == 3 {
                    -(((n - 3) / 4 + 1) as i64)
                } else {
                    n as i64 - (n / 4) as i64
                }
            }
        }
    }

    /// Decodes one integer using an explicit, non-carried `last`. This is
    /// the low-level contract from `spec.md` §4.1: a delta codec invoked
    /// with `last = None` has no seed and cannot proceed.
    pub fn decode_one_seeded<R: ReadBytes>(&self, reader: &mut R, last: Option<i64>) -> Result<i64> {
        let raw = self.read_raw(reader)?;
        let v = self.sign_transform(raw);
        if self.delta {
            let last = last.ok_or(Error::DeltaWithoutSeed)?;
            Ok(wrap_into_range(last.wrapping_add(v), self.smallest(), self.largest(), self.cardinality()))
        } else {
            Ok(v)
        }
    }

    /// Decodes one integer, carrying `last` across calls on `self`.
    pub fn decode_one<R: ReadBytes>(&mut self, reader: &mut R) -> Result<i64> {
        let seed = if self.delta { Some(self.last.unwrap_or(0)) } else { None };
        let v = self.decode_one_seeded(reader, seed)?;
        if self.delta {
            self.last = Some(v);
        }
        Ok(v)
    }

    /// Decodes `n` integers, identical to `n` sequential [`Bhsd::decode_one`]
    /// calls. `spec.md` §4.1 calls this "the only performance-critical
    /// path"; there is no algorithmic shortcut available for BHSD (each
    /// digit's continuation depends on the previous byte), so this simply
    /// avoids the per-call `Result` indirection of the generic trampoline.
    pub fn decode_many<R: ReadBytes>(&mut self, n: usize, reader: &mut R) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let v = self.decode_one(reader)?;
            out.push(to_i32(v)?);
        }
        Ok(out)
    }
}

fn to_i32(v: i64) -> Result<i32> {
    i32::try_from(v).map_err(|_| Error::Overflow("bhsd decode_many"))
}

fn wrap_into_range(v: i64, smallest: i64, largest: i64, cardinality: u64) -> i64 {
    if v >= smallest && v <= largest {
        return v;
    }
    let card = cardinality as i64;
    let span = largest - smallest + 1;
    debug_assert_eq!(span, card.min(span));
    let mut w = (v - smallest) % card;
    if w < 0 {
        w += card;
    }
    smallest + w
}

fn bounds(s: Signedness, cardinality: u64) -> (i64, i64) {
    let n = (cardinality - 1) as i64; // max raw accumulator value
    match s {
        Signedness::Unsigned => (0, n),
        Signedness::ZigZagLowBit => (-((n + 1) / 2), n / 2),
        Signedness::ZigZagBias2 => {
            // Closed form derived from the bias-2 transform: positive
            // results are produced, in increasing order, by raw values not
            // congruent to 3 (mod 4); negative results by those that are.
            let neg_count = (n + 1) / 4; // largest k with 4k-1 <= n
            let smallest = -neg_count;
            let mut largest = 0i64;
            for r in 0..3i64 {
                if n >= r {
                    let q = (n - r) / 4;
                    let v = 3 * q + r;
                    if v > largest {
                        largest = v;
                    }
                }
            }
            (smallest, largest)
        }
    }
}

/// A canonical (b, h, s, d) shape, used by the registry to name and look up
/// the 115 canonical codecs (`spec.md` §4.2, §8 "Canonical registry
/// fidelity").
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BhsdShape {
    pub b: u8,
    pub h: u16,
    pub s: u8,
    pub d: u8,
}

impl BhsdShape {
    pub fn to_codec(self) -> Result<Bhsd> {
        Bhsd::new(self.b, self.h, Signedness::from_code(self.s)?, self.d != 0)
    }
}

impl std::fmt::Display for BhsdShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{},{})", self.b, self.h, self.s, self.d)
    }
}

/// `RunCodec(k, A, B)`: the first `k` integers decode with `a`, the
/// remainder with `b`; each half carries its own `last` (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct RunCodec {
    k: u32,
    a: Box<Codec>,
    b: Box<Codec>,
    consumed: u64,
}

impl RunCodec {
    pub fn new(k: u32, a: Codec, b: Codec) -> RunCodec {
        RunCodec { k, a: Box::new(a), b: Box::new(b), consumed: 0 }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    /// The two sub-codecs, for inspection by the registry's reverse lookup.
    pub fn halves(&self) -> (&Codec, &Codec) {
        (&self.a, &self.b)
    }

    pub fn decode_one<R: ReadBytes>(&mut self, reader: &mut R) -> Result<i64> {
        let v = if self.consumed < self.k as u64 {
            self.a.decode_one(reader)?
        } else {
            self.b.decode_one(reader)?
        };
        self.consumed += 1;
        Ok(v)
    }

    pub fn decode_many<R: ReadBytes>(&mut self, n: usize, reader: &mut R) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(to_i32(self.decode_one(reader)?)?);
        }
        Ok(out)
    }
}

/// `PopulationCodec(favoured, token, unfavoured, L)` (`spec.md` §3, §8
/// scenario 5).
#[derive(Debug, Clone)]
pub struct PopulationCodec {
    favoured: Box<Codec>,
    token: Box<Codec>,
    unfavoured: Box<Codec>,
    /// Bounds the favoured table size when the token codec is derived
    /// rather than explicit (`spec.md` §3).
    l: u8,
}

impl PopulationCodec {
    pub fn new(favoured: Codec, token: Codec, unfavoured: Codec, l: u8) -> Result<PopulationCodec> {
        if !(1..=255).contains(&l) {
            return Err(Error::BadCodecSpecifier("population L must be in 1..=255"));
        }
        Ok(PopulationCodec { favoured: Box::new(favoured), token: Box::new(token), unfavoured: Box::new(unfavoured), l })
    }

    pub fn l(&self) -> u8 {
        self.l
    }

    /// The three sub-codecs, for inspection by the registry's reverse lookup.
    pub fn parts(&self) -> (&Codec, &Codec, &Codec) {
        (&self.favoured, &self.token, &self.unfavoured)
    }

    /// Decodes `n` values: a favoured-value table terminated by a repeat of
    /// either the smallest-magnitude favoured value or the previous value,
    /// a token band of `n` table indices, and an unfavoured band supplying
    /// values where the token is zero.
    pub fn decode_many<R: ReadBytes>(&mut self, n: usize, reader: &mut R) -> Result<Vec<i32>> {
        let mut favoured_table: Vec<i32> = Vec::new();
        loop {
            let v = to_i32(self.favoured.decode_one(reader)?)?;
            let terminator = match favoured_table.last() {
                Some(&prev) => v == prev,
                None => false,
            };
            let is_smallest_repeat =
                favoured_table.iter().min().map(|&m| v == m).unwrap_or(false) && !favoured_table.is_empty();
            favoured_table.push(v);
            if terminator || is_smallest_repeat {
                favoured_table.pop();
                break;
            }
            if favoured_table.len() >= self.l as usize {
                break;
            }
        }

        let tokens = self.token.decode_many(n, reader)?;
        let unfavoured_count = tokens.iter().filter(|&&t| t == 0).count();
        let unfavoured_values = self.unfavoured.decode_many(unfavoured_count, reader)?;

        let mut unfavoured_iter = unfavoured_values.into_iter();
        let mut out = Vec::with_capacity(n);
        for t in tokens {
            if t == 0 {
                out.push(unfavoured_iter.next().ok_or(Error::TruncatedInput("population unfavoured band"))?);
            } else {
                let idx = (t - 1) as usize;
                let v = *favoured_table
                    .get(idx)
                    .ok_or(Error::BadCodecSpecifier("population token out of range"))?;
                out.push(v);
            }
        }
        Ok(out)
    }
}

/// A codec reachable through the encoding registry: a BHSD instance, a
/// `Run` composite, or a `Population` composite.
#[derive(Debug, Clone)]
pub enum Codec {
    Bhsd(Bhsd),
    Run(RunCodec),
    Population(PopulationCodec),
}

impl Codec {
    pub fn decode_one<R: ReadBytes>(&mut self, reader: &mut R) -> Result<i64> {
        match self {
            Codec::Bhsd(c) => c.decode_one(reader),
            Codec::Run(c) => c.decode_one(reader),
            Codec::Population(c) => {
                // A population codec has no meaningful single-value decode
                // outside of `decode_many` (it must first read a table and
                // an n-length token band); spec.md §7 treats this as a
                // programmer error.
                let _ = reader;
                Err(Error::PopulationWithoutCount)
            }
        }
    }

    pub fn decode_many<R: ReadBytes>(&mut self, n: usize, reader: &mut R) -> Result<Vec<i32>> {
        match self {
            Codec::Bhsd(c) => c.decode_many(n, reader),
            Codec::Run(c) => c.decode_many(n, reader),
            Codec::Population(c) => c.decode_many(n, reader),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufReader;

    fn bhsd(b: u8, h: u16, s: u8, d: u8) -> Bhsd {
        Bhsd::new(b, h, Signedness::from_code(s).unwrap(), d != 0).unwrap()
    }

    #[test]
    fn scenario_1_canonical_26() {
        let mut c = bhsd(5, 64, 0, 0);
        let mut r = BufReader::new(&[0x00, 0x05, 0x0A, 0xC0, 0x01, 0x40]);
        assert_eq!(c.decode_many(5, &mut r).unwrap(), vec![0, 5, 10, 256, 64]);
    }

    #[test]
    fn scenario_2_signed_zigzag() {
        let mut c = bhsd(1, 256, 2, 0);
        let input: Vec<u8> = (0..12).collect();
        let mut r = BufReader::new(&input);
        assert_eq!(
            c.decode_many(12, &mut r).unwrap(),
            vec![0, 1, 2, -1, 3, 4, 5, -2, 6, 7, 8, -3]
        );
    }

    #[test]
    fn scenario_3_delta_1_byte() {
        let mut c = bhsd(1, 256, 0, 1);
        let mut r = BufReader::new(&[1, 1, 1, 1]);
        assert_eq!(c.decode_many(4, &mut r).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn scenario_4_unsigned5_continuation() {
        let mut c = bhsd(5, 64, 0, 0);
        assert_eq!(c.decode_one(&mut BufReader::new(&[192, 1])).unwrap(), 256);
        let mut c = bhsd(5, 64, 0, 0);
        assert_eq!(c.decode_one(&mut BufReader::new(&[255, 191])).unwrap(), 12479);
        let mut c = bhsd(5, 64, 0, 0);
        assert_eq!(c.decode_one(&mut BufReader::new(&[192, 192, 0])).unwrap(), 12480);
    }

    #[test]
    fn scenario_5_population() {
        let byte1 = || Codec::Bhsd(bhsd(1, 256, 0, 0));
        let mut pop = PopulationCodec::new(byte1(), byte1(), byte1(), 255).unwrap();
        let mut r = BufReader::new(&[4, 5, 6, 4, 2, 1, 3, 0, 7]);
        assert_eq!(pop.decode_many(4, &mut r).unwrap(), vec![5, 4, 6, 7]);
    }

    #[test]
    fn bhsd_invertibility_unsigned_byte() {
        let c = bhsd(1, 256, 0, 0);
        for v in 0..=255i64 {
            assert!(c.encodes(v));
        }
        assert!(!c.encodes(256));
        assert!(!c.encodes(-1));
    }

    #[test]
    fn delta_without_seed_is_an_error() {
        let c = bhsd(1, 256, 0, 1);
        let mut r = BufReader::new(&[5]);
        assert!(matches!(c.decode_one_seeded(&mut r, None), Err(Error::DeltaWithoutSeed)));
    }

    #[test]
    fn zigzag_low_bit_bounds_are_symmetric() {
        let c = bhsd(1, 256, 1, 0);
        assert_eq!(c.smallest(), -128);
        assert_eq!(c.largest(), 127);
    }
}
