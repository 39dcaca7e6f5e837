//! The `Waveform` capability — an abstract source of samples addressable by
//! logical sample index.
//!
//! Grounded on `platform::storage::{Storage, File}`'s return-position
//! `impl Future` trait style (no `async fn` in trait, for pre-1.75 `no_std`
//! dyn-dispatch compatibility) and `playback::decoder::FrameDecoder`'s
//! associated-`Error`-type convention.

use crate::sample_buffer::SampleBuffer;
use platform::uncached::UncachedRegion;

/// Number of channels a waveform carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channels {
    /// One channel.
    Mono,
    /// Two interleaved channels.
    Stereo,
}

impl Channels {
    /// The on-disk/wire channel count (1 or 2).
    pub const fn count(self) -> u8 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }

    /// Decode a wire channel count.
    ///
    /// Returns `None` for anything other than 1 or 2, matching §3's
    /// `channel count ∈ {1,2}` invariant.
    pub const fn from_count(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            _ => None,
        }
    }
}

/// Bit depth of a waveform's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFormat {
    /// 8 bits per sample.
    Pcm8,
    /// 16 bits per sample.
    Pcm16,
}

impl SampleFormat {
    /// Wire/API bit depth (8 or 16).
    pub const fn bits(self) -> u8 {
        match self {
            Self::Pcm8 => 8,
            Self::Pcm16 => 16,
        }
    }

    /// `bps` shift used throughout §4.B: 0 for 8-bit, 1 for 16-bit.
    pub const fn shift(self) -> u8 {
        match self {
            Self::Pcm8 => 0,
            Self::Pcm16 => 1,
        }
    }

    /// Decode a wire bit depth. Returns `None` for anything other than 8/16.
    pub const fn from_bits(n: u8) -> Option<Self> {
        match n {
            8 => Some(Self::Pcm8),
            16 => Some(Self::Pcm16),
            _ => None,
        }
    }
}

/// The fixed attribute set every waveform exposes (§3 "Waveform").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaveformAttrs {
    /// Channel count.
    pub channels: Channels,
    /// Sample bit depth.
    pub format: SampleFormat,
    /// Base frequency in Hz.
    pub frequency: u32,
    /// Length in sample frames.
    pub length: u32,
    /// Loop length in sample frames; 0 means non-looping.
    pub loop_length: u32,
    /// Per-voice codec state size in bytes.
    pub state_size: u16,
}

impl WaveformAttrs {
    /// `bps` shift accounting for both bit depth and channel count, as used
    /// by the raw codec's byte-offset arithmetic (`wav64.c`'s
    /// `(bits==8?0:1) + (channels==2?1:0)`).
    pub const fn frame_shift(&self) -> u8 {
        self.format.shift() + if matches!(self.channels, Channels::Stereo) { 1 } else { 0 }
    }

    /// Bytes per sample frame (all channels).
    pub const fn bytes_per_frame(&self) -> u32 {
        1u32 << self.frame_shift()
    }
}

/// A source of mono/stereo 8/16-bit PCM samples, addressable by logical
/// sample index.
///
/// `start` is optional (default no-op); `read` is mandatory. Both may
/// suspend on I/O; callers must not reenter the same voice's sample buffer
/// while a `read` is in flight (§5 "Suspension points").
pub trait Waveform<R: UncachedRegion> {
    /// Error type (propagated from storage, or a codec/format violation).
    type Error: core::fmt::Debug;

    /// Static attributes of this waveform.
    fn attrs(&self) -> WaveformAttrs;

    /// Invoked once when a voice begins producing samples from this
    /// waveform. Default: no-op (most codecs need no setup beyond what
    /// `read`'s `seeking = true` path already does).
    fn start(
        &mut self,
        _sbuf: &mut SampleBuffer<R>,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>> {
        async { Ok(()) }
    }

    /// Append up to `wlen` frames starting at logical index `wpos` into
    /// `sbuf`. `seeking` is true when `wpos` is discontinuous from the
    /// previous call. May append fewer than `wlen` frames (short read).
    fn read(
        &mut self,
        sbuf: &mut SampleBuffer<R>,
        wpos: u32,
        wlen: u32,
        seeking: bool,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}
