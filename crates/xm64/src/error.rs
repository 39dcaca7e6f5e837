//! Error types for XM64 module parsing and playback.

use wav64::Wav64Error;

/// Something wrong with the shape of an XM64 metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    /// Magic bytes did not read `XM64`.
    BadMagic,
    /// Header version byte did not match the supported version.
    UnsupportedVersion,
    /// A length-prefixed or table-indexed region ran past the end of the
    /// metadata slice.
    Truncated,
    /// A pattern, instrument, or sample index referenced by a pattern slot
    /// or instrument table has no corresponding entry.
    IndexOutOfRange,
    /// Too many channels, patterns, instruments, or envelope points for
    /// this build's fixed-capacity tables.
    CapacityExceeded,
}

impl core::fmt::Display for FormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadMagic => f.write_str("bad XM64 magic"),
            Self::UnsupportedVersion => f.write_str("unsupported XM64 version"),
            Self::Truncated => f.write_str("XM64 metadata truncated"),
            Self::IndexOutOfRange => f.write_str("XM64 index out of range"),
            Self::CapacityExceeded => f.write_str("XM64 table capacity exceeded"),
        }
    }
}

/// Top-level error surfaced by the `xm64` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Xm64Error<IoError> {
    /// A metadata parse error (see [`FormatError`]).
    Format(FormatError),
    /// A wav64 instrument failed to open, decode, or seek.
    Sample(SampleErrorKind),
    /// Passed through from the underlying wav64 decode/seek call.
    Wav64(Wav64Error<IoError>),
    /// The player was asked to seek or play past the end of the song.
    OutOfRange,
}

/// Coarse classification of a wav64-side failure, kept separate from
/// [`Wav64Error`] itself so `Xm64Error` doesn't need to be generic over
/// every codec's own error enum, only the I/O error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleErrorKind {
    /// The instrument/sample index a pattern slot referenced has no bound
    /// wav64 waveform.
    NotBound,
    /// The sample-offset effect (0x9) targeted a frame with no nearby
    /// VADPCM skip point.
    SeekPointMiss,
}

impl<IoError: core::fmt::Debug> core::fmt::Display for Xm64Error<IoError> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Format(e) => write!(f, "{e}"),
            Self::Sample(SampleErrorKind::NotBound) => f.write_str("instrument has no bound waveform"),
            Self::Sample(SampleErrorKind::SeekPointMiss) => f.write_str("sample offset has no nearby skip point"),
            Self::Wav64(e) => write!(f, "{e:?}"),
            Self::OutOfRange => f.write_str("position out of song range"),
        }
    }
}

impl<IoError> From<FormatError> for Xm64Error<IoError> {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}
