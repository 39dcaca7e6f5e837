//! Error taxonomy for the WAV64 container and its codecs.
//!
//! Mirrors `platform::storage_sdmmc::SdmmcError`'s hand-rolled style: a
//! `Copy` enum plus a manual `Display`, generic over the host storage
//! backend's own error type rather than boxing it away.

/// Errors surfaced by `wav64` public operations.
///
/// `Io` carries the backing `platform::storage::File`/`Storage` error
/// verbatim — this crate never interprets storage failures itself, it only
/// propagates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wav64Error<IoError> {
    /// Asset magic, version, or format code was not recognised.
    Format(FormatError),
    /// The underlying storage read/seek failed.
    Io(IoError),
    /// A caller-reachable contract violation (bad state size, bps change on
    /// a non-empty buffer, append overflow after compaction).
    Configuration(ConfigurationError),
    /// Random access into a Huffman-compressed VADPCM stream landed on a
    /// position that is not a registered skip point.
    SeekPointMiss,
    /// The CELT decoder rejected a compressed Opus-Custom frame.
    OpusDecode,
}

/// Sub-reasons for [`Wav64Error::Format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    /// The 4-byte magic at offset 0 was not `b"WV64"`.
    BadMagic,
    /// The header version byte was not the supported value (4).
    UnsupportedVersion,
    /// The format code did not match any registered codec.
    UnknownCodec,
    /// A Huffman code table did not tile all 256 8-bit prefixes.
    IncompleteHuffmanTable,
    /// The file ended before a fixed-size header/extension region was read.
    Truncated,
}

/// Sub-reasons for [`Wav64Error::Configuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// `set_bps` was called on a sample buffer that already holds samples.
    BufferNotEmpty,
    /// A waveform's declared `state_size` exceeds the buffer's reserved
    /// codec-state region.
    StateTooLarge,
    /// `append` could not fit `wlen` frames even after compaction.
    BufferTooSmall,
}

impl<IoError: core::fmt::Debug> core::fmt::Display for Wav64Error<IoError> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Format(e) => write!(f, "wav64 format error: {e}"),
            Self::Io(e) => write!(f, "wav64 i/o error: {e:?}"),
            Self::Configuration(e) => write!(f, "wav64 configuration error: {e}"),
            Self::SeekPointMiss => f.write_str("wav64: seek position is not a registered skip point"),
            Self::OpusDecode => f.write_str("wav64: opus-custom decode failed"),
        }
    }
}

impl core::fmt::Display for FormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BadMagic => f.write_str("bad magic (expected \"WV64\")"),
            Self::UnsupportedVersion => f.write_str("unsupported header version"),
            Self::UnknownCodec => f.write_str("unknown codec format code"),
            Self::IncompleteHuffmanTable => f.write_str("huffman table does not cover all 256 prefixes"),
            Self::Truncated => f.write_str("file truncated before end of header/extension"),
        }
    }
}

impl core::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferNotEmpty => f.write_str("set_bps called on a non-empty sample buffer"),
            Self::StateTooLarge => f.write_str("waveform state_size exceeds reserved region"),
            Self::BufferTooSmall => f.write_str("append does not fit even after compaction"),
        }
    }
}
