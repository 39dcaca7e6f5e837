//! WAV64 container and codecs for SoulAudio DAP
//!
//! This crate decodes the WAV64 sample-asset container: a fixed 28-byte
//! header, an optional codec-specific extension region, and a sample
//! payload streamed or preloaded through a per-voice [`SampleBuffer`].
//!
//! # Architecture
//!
//! ```text
//! container::Wav64File (header, extension)
//!         ↓
//! codec::{raw, vadpcm, opus}::*Waveform  (impl waveform::Waveform)
//!         ↓
//! sample_buffer::SampleBuffer  (per-voice ring, backed by platform::uncached memory)
//! ```
//!
//! # Codecs
//!
//! - [`codec::raw`] - uncompressed PCM, streamed or preloaded
//! - [`codec::vadpcm`] - predictive ADPCM with an optional Huffman overlay
//! - [`codec::opus`] - Opus-Custom (CELT-only), behind the `opus` feature
//!
//! # Features
//!
//! - `std`: enable standard-library support (for host-side testing)
//! - `defmt`: enable defmt logging/formatting on the public error and
//!   attribute types
//! - `opus`: link in the Opus-Custom codec dispatch entry

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bitio;
pub mod codec;
pub mod container;
pub mod error;
pub mod null_offload;
pub mod sample_buffer;
pub mod waveform;

pub use container::{FormatCode, VadpcmExtension, Wav64File, Wav64Header, Wav64Waveform};
pub use error::{ConfigurationError, FormatError, Wav64Error};
pub use null_offload::NullOffloadQueue;
pub use sample_buffer::SampleBuffer;
pub use waveform::{Channels, SampleFormat, Waveform, WaveformAttrs};

#[cfg(feature = "opus")]
pub use codec::opus::{CeltDecoder, OpusExtension};

/// Preload a small raw-PCM or VADPCM waveform entirely into `dest`, handing
/// back a ready-to-play [`codec::raw::RawPreloadedWaveform`] backed by it.
///
/// Grounded on `wav64.c`'s `internal_open` preload branch: rather than
/// allocate a heap block sized to the decoded payload, decode it into
/// `dest` once via a throwaway [`SampleBuffer`] built on the same memory,
/// then hand back a preloaded waveform that serves straight out of
/// `dest` from then on — no second copy, no allocator. `dest` must be at
/// least `attrs.length * attrs.bytes_per_frame()` bytes; a shorter buffer
/// decodes as much as fits and reports the frame count actually filled.
///
/// Only codecs that can decode a whole waveform in a single bounded
/// `Waveform::read` call (everything but streaming-only uses) are
/// sensible callers of this helper; VADPCM and raw both qualify.
pub async fn preload<'dest, R, W, IoError>(
    waveform: &mut W,
    dest: &'dest mut [u8],
) -> Result<codec::raw::RawPreloadedWaveform<'dest, IoError>, Wav64Error<IoError>>
where
    R: platform::uncached::UncachedRegion,
    W: Waveform<R, Error = Wav64Error<IoError>>,
    IoError: core::fmt::Debug,
{
    let attrs = waveform.attrs();
    let frame_bytes = attrs.bytes_per_frame();
    let total_bytes = dest.len() as u32;
    let capacity_frames = total_bytes / frame_bytes.max(1);
    let wanted_frames = attrs.length.min(capacity_frames);

    let got_len = {
        let mut sbuf: SampleBuffer<'_, R> = SampleBuffer::init(dest, total_bytes, 0);
        sbuf.set_bps(attrs.format).map_err(Wav64Error::Configuration)?;
        waveform.start(&mut sbuf).await?;
        waveform.read(&mut sbuf, 0, wanted_frames, true).await?;
        let mut got_len = wanted_frames;
        let _ = sbuf.get(waveform, 0, &mut got_len).await?;
        got_len
    };

    let filled_bytes = (got_len * frame_bytes) as usize;
    let preloaded_attrs = WaveformAttrs {
        length: got_len,
        ..attrs
    };
    Ok(codec::raw::RawPreloadedWaveform::new(
        &dest[..filled_bytes],
        preloaded_attrs,
    ))
}
