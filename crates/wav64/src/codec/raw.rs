//! The raw PCM codec — samples stored on disk (or in memory) exactly as
//! the mixer consumes them, no decode step at all.
//!
//! Grounded on `wav64.c`'s `wav64_none_*` vtable entries: `read` is either a
//! direct seek-then-read from the backing file, or — once a waveform has
//! been fully preloaded into RAM (§2.2 "WAV64 preload finalization") — a
//! plain slice copy with no I/O at all.

// Offset/length arithmetic here stays within the frame-aligned windows
// `SampleBuffer::append` hands back.
#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use platform::storage::File;
use platform::uncached::UncachedRegion;

use crate::error::Wav64Error;
use crate::null_offload::NullOffloadQueue;
use crate::sample_buffer::SampleBuffer;
use crate::waveform::{Waveform, WaveformAttrs};

/// Raw PCM streamed from a [`File`] on every read.
pub struct RawStreamingWaveform<F> {
    file: F,
    attrs: WaveformAttrs,
    /// Byte offset of sample 0 within the file.
    start_offset: u32,
}

impl<F: File> RawStreamingWaveform<F> {
    /// Bind a raw codec reading from `file` starting at byte `start_offset`.
    pub fn new(file: F, attrs: WaveformAttrs, start_offset: u32) -> Self {
        Self {
            file,
            attrs,
            start_offset,
        }
    }

    /// Give back the underlying file (e.g. to reuse its descriptor for a
    /// sibling waveform, as `xm64.c` does for its per-instrument samples).
    pub fn into_file(self) -> F {
        self.file
    }
}

impl<R: UncachedRegion, F: File> Waveform<R> for RawStreamingWaveform<F>
where
    F::Error: core::fmt::Debug,
{
    type Error = Wav64Error<F::Error>;

    fn attrs(&self) -> WaveformAttrs {
        self.attrs
    }

    async fn read(
        &mut self,
        sbuf: &mut SampleBuffer<R>,
        wpos: u32,
        wlen: u32,
        seeking: bool,
    ) -> Result<(), Self::Error> {
        if seeking {
            let byte_off =
                u64::from(self.start_offset) + u64::from(wpos) * u64::from(self.attrs.bytes_per_frame());
            self.file.seek(byte_off).await.map_err(Wav64Error::Io)?;
        }
        let mut offload = NullOffloadQueue;
        let dst = sbuf
            .append(&mut offload, wlen)
            .await
            .map_err(Wav64Error::Configuration)?;
        let mut filled = 0usize;
        while filled < dst.len() {
            #[allow(clippy::indexing_slicing)]
            let n = self.file.read(&mut dst[filled..]).await.map_err(Wav64Error::Io)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < dst.len() {
            sbuf.undo(((dst.len() - filled) as u32) / self.attrs.bytes_per_frame())
                .map_err(Wav64Error::Configuration)?;
        }
        Ok(())
    }
}

/// Raw PCM already fully resident in memory.
///
/// Used both for assets small enough to preload outright, and as the
/// finalized state of any codec after a one-shot (non-streaming) `load`
/// call decodes a whole waveform up front — at that point the original
/// codec's vtable entry is discarded in favour of this one, since there is
/// nothing left to decode (§2.2).
pub struct RawPreloadedWaveform<'a, IoError> {
    data: &'a [u8],
    attrs: WaveformAttrs,
    _io_error: core::marker::PhantomData<IoError>,
}

impl<'a, IoError> RawPreloadedWaveform<'a, IoError> {
    /// Bind a raw codec serving samples straight out of `data`.
    ///
    /// `IoError` is the host's storage error type, carried only so this
    /// codec's `Error` associated type matches every other codec's
    /// `Wav64Error<IoError>` for the same container — a preloaded waveform
    /// never actually produces an `Io` error itself.
    pub fn new(data: &'a [u8], attrs: WaveformAttrs) -> Self {
        Self {
            data,
            attrs,
            _io_error: core::marker::PhantomData,
        }
    }
}

impl<'a, R: UncachedRegion, IoError: core::fmt::Debug> Waveform<R> for RawPreloadedWaveform<'a, IoError> {
    type Error = Wav64Error<IoError>;

    fn attrs(&self) -> WaveformAttrs {
        self.attrs
    }

    async fn read(
        &mut self,
        sbuf: &mut SampleBuffer<R>,
        wpos: u32,
        wlen: u32,
        _seeking: bool,
    ) -> Result<(), Self::Error> {
        let frame_bytes = self.attrs.bytes_per_frame();
        let start = (wpos * frame_bytes) as usize;
        let want = (wlen * frame_bytes) as usize;
        let end = (start + want).min(self.data.len());
        let src = self.data.get(start..end).unwrap_or(&[]);
        let mut offload = NullOffloadQueue;
        let frames_available = (src.len() as u32) / frame_bytes;
        let dst = sbuf
            .append(&mut offload, frames_available)
            .await
            .map_err(Wav64Error::Configuration)?;
        dst.copy_from_slice(&src[..dst.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::waveform::{Channels, SampleFormat};
    use platform::uncached::HeapRegion;

    fn attrs() -> WaveformAttrs {
        WaveformAttrs {
            channels: Channels::Mono,
            format: SampleFormat::Pcm16,
            frequency: 44100,
            length: 4,
            loop_length: 0,
            state_size: 0,
        }
    }

    #[tokio::test]
    async fn preloaded_raw_serves_samples_directly() {
        let data = [1u8, 0, 2, 0, 3, 0, 4, 0];
        let mut wave: RawPreloadedWaveform<'_, core::convert::Infallible> =
            RawPreloadedWaveform::new(&data, attrs());
        let mut mem = vec![0u8; 64];
        let mut sbuf: SampleBuffer<'_, HeapRegion> = SampleBuffer::init(&mut mem, 32, 32);
        sbuf.set_bps(SampleFormat::Pcm16).unwrap();

        Waveform::<HeapRegion>::read(&mut wave, &mut sbuf, 0, 4, false)
            .await
            .unwrap();

        let mut wlen = 4;
        let got = sbuf.get(&mut wave, 0, &mut wlen).await.unwrap();
        assert_eq!(wlen, 4);
        assert_eq!(got, &data);
    }
}
