//! The crate-wide error type and the error code enum used at the CLI-wrapper boundary.

use std::fmt;
use std::result;

/// `Error` enumerates every way unpacking a segment can fail.
///
/// Variants are split into data errors (malformed Pack200 input, reported
/// in `spec.md` §7) and programmer errors (API misuse on the part of this
/// crate's own callers into its internal modules). Programmer-error
/// variants are never raised by a `debug_assert!`-only check: they are
/// real, always-on guards so that malformed internal state can never
/// panic the host process.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred while reading the input stream.
    Io(std::io::Error),
    /// The input stream ended before a value or band could be fully read.
    TruncatedInput(&'static str),
    /// The segment header's magic number was not `CAFED00D`.
    BadMagic,
    /// The segment header's option bitfield set a reserved bit, or an
    /// option combination the driver cannot honour.
    BadOptions(&'static str),
    /// A codec specifier byte (or its follow-on bytes) did not name a
    /// valid BHSD, Run, or Population codec.
    BadCodecSpecifier(&'static str),
    /// An attribute layout string could not be parsed.
    BadLayout(&'static str),
    /// A class/field/method/code flag word set a bit with no corresponding
    /// predefined or user-defined attribute layout.
    InvalidFlag(&'static str),
    /// Resolving the class constant pool produced more than 65535 entries,
    /// or a `Long`/`Double` would need index 65535 for its second slot.
    PoolOverflow,
    /// A decoded value could not be represented by the type the caller
    /// requested (e.g. an `i32` band decoding an out-of-range `i64`).
    Overflow(&'static str),
    /// A feature or option combination this crate deliberately does not
    /// implement (see `spec.md` Non-goals) or an input construct this
    /// crate's author chose not to guess the correct behaviour for (see
    /// Design Notes, "Open questions").
    Unsupported(&'static str),
    /// A constant pool entry, attribute, or bytecode was resolved a second
    /// time. Programmer error.
    AlreadyResolved,
    /// A class-file entry was asked for its resolved index before
    /// `resolve` ran. Programmer error.
    EmitBeforeResolve,
    /// A delta-mode codec was asked to decode without a carried `last`
    /// value and no seed was ever supplied. Programmer error.
    DeltaWithoutSeed,
    /// A `PopulationCodec` was asked to decode a single value outside of
    /// its `decode_many(n, ..)` call, which is the only valid entry point
    /// since it must first read its favoured table and an `n`-length
    /// token band. Programmer error.
    PopulationWithoutCount,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::TruncatedInput(where_) => write!(f, "truncated input while reading {where_}"),
            Error::BadMagic => write!(f, "bad segment magic, expected CAFED00D"),
            Error::BadOptions(msg) => write!(f, "bad segment options: {msg}"),
            Error::BadCodecSpecifier(msg) => write!(f, "bad codec specifier: {msg}"),
            Error::BadLayout(msg) => write!(f, "bad attribute layout: {msg}"),
            Error::InvalidFlag(msg) => write!(f, "invalid flag: {msg}"),
            Error::PoolOverflow => write!(f, "class constant pool overflowed 65535 entries"),
            Error::Overflow(where_) => write!(f, "decoded value out of range in {where_}"),
            Error::Unsupported(feature) => write!(f, "unsupported: {feature}"),
            Error::AlreadyResolved => write!(f, "entry was resolved more than once"),
            Error::EmitBeforeResolve => write!(f, "entry was emitted before being resolved"),
            Error::DeltaWithoutSeed => write!(f, "delta codec decoded without a carried last value"),
            Error::PopulationWithoutCount => {
                write!(f, "population codec decoded outside of decode_many")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::TruncatedInput("stream"),
            _ => Error::Io(err),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience constructor for a truncated-input error.
pub fn truncated_error<T>(where_: &'static str) -> Result<T> {
    Err(Error::TruncatedInput(where_))
}

/// Convenience constructor for a bad-options error.
pub fn bad_options_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::BadOptions(msg))
}

/// Convenience constructor for a bad-codec-specifier error.
pub fn bad_codec_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::BadCodecSpecifier(msg))
}

/// Convenience constructor for a bad-layout error.
pub fn bad_layout_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::BadLayout(msg))
}

/// Convenience constructor for an unsupported-feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience constructor for a pool-overflow error.
pub fn pool_overflow_error<T>() -> Result<T> {
    Err(Error::PoolOverflow)
}

/// Error codes surfaced to a CLI wrapper, per `spec.md` §6.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Ok = 0,
    BadMagic = 1,
    BadOptions = 2,
    TruncatedInput = 3,
    BadLayout = 4,
    BadCodecSpecifier = 5,
    PoolOverflow = 6,
    Unsupported = 7,
}

impl From<&Error> for ErrorCode {
    fn from(err: &Error) -> ErrorCode {
        match err {
            Error::BadMagic => ErrorCode::BadMagic,
            Error::BadOptions(_) => ErrorCode::BadOptions,
            Error::TruncatedInput(_) | Error::Io(_) => ErrorCode::TruncatedInput,
            Error::BadLayout(_) => ErrorCode::BadLayout,
            Error::BadCodecSpecifier(_) => ErrorCode::BadCodecSpecifier,
            Error::PoolOverflow => ErrorCode::PoolOverflow,
            Error::Overflow(_)
            | Error::Unsupported(_)
            | Error::AlreadyResolved
            | Error::EmitBeforeResolve
            | Error::DeltaWithoutSeed
            | Error::PopulationWithoutCount => ErrorCode::Unsupported,
        }
    }
}
