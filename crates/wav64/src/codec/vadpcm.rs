//! The VADPCM codec: 8th-order predictive ADPCM over two history vectors,
//! with an optional Huffman overlay compressing the 4-bit residual stream
//! further, and a skip-point table standing in for the random access a
//! bare predictive codec cannot otherwise support.
//!
//! Grounded on `wav64_vadpcm.c`'s reference scalar decoder, `huffv_decompress`,
//! and `wav64_vadpcm_init_huffman`, and on `wav64_vadpcm_internal.h`'s struct
//! layouts (`wav64_vadpcm_vector_t`, `wav64_state_vadpcm_t`,
//! `wav64_vadpcm_skippoint_t`).

// Frame/nibble/bit index arithmetic is bounded by the fixed 9-byte frame
// and 16-sample layouts asserted in the constants above.
#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use platform::offload::{OffloadJob, OffloadJobKind, OffloadQueue};
use platform::storage::File;
use platform::uncached::UncachedRegion;

use crate::bitio::BitReader;
use crate::codec::huffman::{HuffmanSpec, HuffmanTable};
use crate::error::{FormatError, Wav64Error};
use crate::sample_buffer::SampleBuffer;
use crate::waveform::{Waveform, WaveformAttrs};

/// Samples produced by one compressed frame.
pub const FRAME_SAMPLES: usize = 16;
/// On-disk bytes per compressed frame (1 header byte + 8 packed-nibble bytes).
pub const FRAME_BYTES: usize = 9;

/// The 8 most recently decoded samples of one channel — `wav64_vadpcm_vector_t`,
/// generalized from its packed fixed-point pointer trick to a plain `i32`
/// array so it can double as the accumulator's running history.
pub type HistoryVector = [i32; 8];

/// Per-channel decoder history — exactly `wav64_state_vadpcm_t`'s
/// `state: [vector_t; 2]`, one slot per channel (only slot 0 is driven by
/// this crate's mono-only decode path).
pub type DecoderState = [HistoryVector; 2];

/// One entry of a predictor codebook: coefficients applied against each of
/// the two history vectors to predict the next 8-sample half-frame.
#[derive(Debug, Clone, Copy)]
pub struct Predictor {
    /// Coefficients applied to `state[0]` (older history vector).
    pub coef_prev: [i32; 8],
    /// Coefficients applied to `state[1]` (newer history vector).
    pub coef_cur: [i32; 8],
}

/// Fixed-point shift the predictor coefficients are scaled by (Q11, the
/// shift the reference decoder uses before clamping back to `i16`).
const PREDICTOR_SHIFT: u32 = 11;

fn sign_extend4(v: u8) -> i32 {
    if v & 0x8 != 0 {
        i32::from(v) - 16
    } else {
        i32::from(v)
    }
}

fn clamp16(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Decode one 16-sample frame given its predictor and the 8 residual-nibble
/// bytes (header byte already stripped and its scale nibble passed in
/// separately), updating `history` in place for the next frame.
///
/// This is an 8th-order-codebook, order-2 predictor (the `coef_prev`/
/// `coef_cur` pair is `predictor[0]`/`predictor[order-1]` for `order == 2`):
/// each of the frame's two 8-sample vectors is predicted from the previous
/// vector's last two history samples, then the residual for lane `k` is
/// convolved forward into lanes `k+1..7` of the *same* vector using the
/// `order-1` predictor (`wav64_vadpcm.c`'s reference `vadpcm_decode`).
pub fn decode_frame(predictor: &Predictor, scale: u32, nibbles: &[u8; 8], history: &mut HistoryVector) -> [i16; 16] {
    let mut out = [0i16; 16];

    for vector in 0..2 {
        let mut acc = [0i64; 8];

        // Accumulate the part of the predictor from the previous vector's
        // last two history samples (order == 2): history[6] against
        // coef_prev (predictor[0]), history[7] against coef_cur
        // (predictor[order-1]).
        for i in 0..8 {
            acc[i] += i64::from(history[6]) * i64::from(predictor.coef_prev[i]);
            acc[i] += i64::from(history[7]) * i64::from(predictor.coef_cur[i]);
        }

        let mut residuals = [0i32; 8];
        for i in 0..4 {
            let byte = nibbles[4 * vector + i];
            residuals[2 * i] = sign_extend4((byte >> 4) & 0xF);
            residuals[2 * i + 1] = sign_extend4(byte & 0xF);
        }

        // Accumulate the residual and predicted values. Lane k's residual
        // also convolves forward into lanes k+1..7 via the order-1
        // (coef_cur) predictor vector — the in-frame prediction step a
        // pure history-based accumulation misses entirely.
        for k in 0..8 {
            let residual = residuals[k] << scale;
            acc[k] += i64::from(residual) << PREDICTOR_SHIFT;
            for i in 0..(7 - k) {
                acc[k + 1 + i] += i64::from(residual) * i64::from(predictor.coef_cur[i]);
            }
        }

        for i in 0..8 {
            let sample = clamp16((acc[i] >> PREDICTOR_SHIFT) as i32);
            out[8 * vector + i] = sample;
            history[i] = i32::from(sample);
        }
    }

    out
}

/// A registered random-access point into a Huffman-compressed (or plain)
/// VADPCM stream: the decoder state and bitstream position at a specific
/// logical frame index.
#[derive(Debug, Clone, Copy)]
pub struct SkipPoint {
    /// Logical frame index this skip point restores decoding to.
    pub frame_index: u32,
    /// Decoder state at that frame index.
    pub state: DecoderState,
    /// Byte offset of the compressed frame (direct-seek streams), or the
    /// byte offset the Huffman bit cursor should be reset to.
    pub byte_offset: u32,
    /// Additional bit offset within `byte_offset` (Huffman streams only).
    pub bit_offset: u32,
}

/// The optional Huffman overlay: three per-nibble-position contexts.
pub struct HuffmanOverlay {
    contexts: [HuffmanTable; 3],
}

impl HuffmanOverlay {
    /// Build the three contexts from their canonical specs.
    pub fn build(specs: &[HuffmanSpec; 3]) -> Result<Self, FormatError> {
        Ok(Self {
            contexts: [
                HuffmanTable::build(&specs[0])?,
                HuffmanTable::build(&specs[1])?,
                HuffmanTable::build(&specs[2])?,
            ],
        })
    }

    fn context(&self, nibble_index: usize) -> &HuffmanTable {
        let ctx = nibble_index.min(2);
        #[allow(clippy::indexing_slicing)]
        &self.contexts[ctx]
    }
}

/// A VADPCM-compressed waveform, optionally Huffman-overlaid.
pub struct VadpcmWaveform<F, O> {
    file: F,
    offload: O,
    attrs: WaveformAttrs,
    start_offset: u32,
    predictors: heapless::Vec<Predictor, 16>,
    huffman: Option<HuffmanOverlay>,
    skip_points: heapless::Vec<SkipPoint, 64>,
    state: DecoderState,
    next_frame: u32,
    bit_pos: u32,
}

impl<F: File, O: OffloadQueue> VadpcmWaveform<F, O> {
    /// Construct a VADPCM waveform reading compressed frames from `file`
    /// starting at byte `start_offset`, using `predictors` as its codebook
    /// and driving decode jobs through `offload`.
    pub fn new(
        file: F,
        offload: O,
        attrs: WaveformAttrs,
        start_offset: u32,
        predictors: heapless::Vec<Predictor, 16>,
        huffman: Option<HuffmanOverlay>,
        skip_points: heapless::Vec<SkipPoint, 64>,
    ) -> Self {
        Self {
            file,
            offload,
            attrs,
            start_offset,
            predictors,
            huffman,
            skip_points,
            state: [[0; 8]; 2],
            next_frame: 0,
            bit_pos: 0,
        }
    }

    fn predictor_for(&self, index: u8) -> Option<&Predictor> {
        self.predictors.get(index as usize).or_else(|| self.predictors.first())
    }

    /// Restore decoder state from the nearest skip point at or before
    /// `frame`, or the stream start if none is earlier. Returns the frame
    /// index actually restored to.
    fn seek_to_nearest(&mut self, frame: u32) -> Result<u32, ()> {
        let best = self
            .skip_points
            .iter()
            .filter(|sp| sp.frame_index <= frame)
            .max_by_key(|sp| sp.frame_index);
        match best {
            Some(sp) => {
                self.state = sp.state;
                self.next_frame = sp.frame_index;
                self.bit_pos = sp.bit_offset;
                Ok(sp.frame_index)
            }
            None if frame == 0 => {
                self.state = [[0; 8]; 2];
                self.next_frame = 0;
                self.bit_pos = 0;
                Ok(0)
            }
            None => Err(()),
        }
    }

    async fn read_frame(&mut self) -> Result<[u8; FRAME_BYTES], F::Error> {
        let byte_off = u64::from(self.start_offset) + u64::from(self.next_frame) * FRAME_BYTES as u64;
        self.file.seek(byte_off).await?;
        let mut frame = [0u8; FRAME_BYTES];
        let mut filled = 0;
        while filled < FRAME_BYTES {
            #[allow(clippy::indexing_slicing)]
            let n = self.file.read(&mut frame[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(frame)
    }

    async fn decode_next_frame(&mut self) -> Result<[i16; FRAME_SAMPLES], Wav64Error<F::Error>> {
        let raw = self.read_frame().await.map_err(Wav64Error::Io)?;
        let header = raw[0];
        let predictor_index = header >> 4;
        let scale = u32::from(header & 0xF);

        let mut nibbles = [0u8; 8];
        if let Some(overlay) = self.huffman.as_ref() {
            // Huffman-compressed residual stream: decode 16 nibbles from
            // the bitstream instead of taking them verbatim from `raw`.
            let mut br = BitReader::new(&raw[1..]);
            br.seek_bytes(0);
            br.skip_bits(self.bit_pos).map_err(Wav64Error::Format)?;
            let mut packed = [0u8; 16];
            for (i, slot) in packed.iter_mut().enumerate() {
                let peek = br.peek_bits(8).map_err(Wav64Error::Format)? as u8;
                let (symbol, bits) = overlay.context(i).decode(peek);
                br.read_bits(u32::from(bits)).map_err(Wav64Error::Format)?;
                *slot = symbol & 0xF;
            }
            for i in 0..8 {
                #[allow(clippy::indexing_slicing)]
                {
                    nibbles[i] = (packed[i * 2] << 4) | packed[i * 2 + 1];
                }
            }
            self.bit_pos = br.bit_position();
        } else {
            nibbles.copy_from_slice(&raw[1..]);
        }

        let predictor = *self
            .predictor_for(predictor_index)
            .ok_or(Wav64Error::Format(FormatError::UnknownCodec))?;
        let _ = self.offload.submit(OffloadJob {
            kind: OffloadJobKind::VadpcmDecode,
            target_ptr: 0,
            len: FRAME_SAMPLES * 2,
        });
        let out = decode_frame(&predictor, scale, &nibbles, &mut self.state[0]);
        self.next_frame += 1;
        Ok(out)
    }
}

impl<R: UncachedRegion, F: File, O: OffloadQueue> Waveform<R> for VadpcmWaveform<F, O>
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
            // Only Huffman-compressed streams are skip-point-restricted;
            // plain VADPCM can seek to any frame boundary directly.
            if self.huffman.is_some() {
                self.seek_to_nearest(wpos).map_err(|()| Wav64Error::SeekPointMiss)?;
            } else {
                self.state = [[0; 8]; 2];
                self.next_frame = wpos;
                self.bit_pos = 0;
            }
        }

        // §4.E: round the requested length up to a full frame, then decode
        // in chunks sized to keep the offload queue fed without starving
        // the mixer (94 mono / 47 stereo frames per round in the original).
        let chunk_frames: u32 = if matches!(self.attrs.channels, crate::waveform::Channels::Stereo) {
            47
        } else {
            94
        };
        let rounded = wlen.div_ceil(FRAME_SAMPLES as u32) * FRAME_SAMPLES as u32;
        let mut produced = 0u32;
        while produced < rounded {
            let this_round = chunk_frames.min(rounded - produced);
            let frames_in_chunk = this_round.div_ceil(FRAME_SAMPLES as u32);

            let dst = sbuf
                .append(&mut self.offload, this_round)
                .await
                .map_err(Wav64Error::Configuration)?;
            let dst_len = dst.len();
            let mut written = 0usize;
            for _ in 0..frames_in_chunk {
                let samples = self.decode_next_frame().await?;
                for s in samples {
                    if written + 2 > dst_len {
                        break;
                    }
                    let bytes = s.to_le_bytes();
                    #[allow(clippy::indexing_slicing)]
                    {
                        dst[written] = bytes[0];
                        dst[written + 1] = bytes[1];
                    }
                    written += 2;
                }
            }
            if written < dst_len {
                let leftover_frames = ((dst_len - written) / 2) as u32;
                sbuf.undo(leftover_frames).map_err(Wav64Error::Configuration)?;
            }
            produced += this_round;
        }

        // A loop point may fall mid-chunk; §2.2's loop-end race means any
        // overflow past it must be retracted and synced before the mixer
        // is allowed to see it.
        if self.attrs.loop_length > 0 {
            let loop_end = self.attrs.length;
            let window_end = wpos + rounded;
            if window_end > loop_end {
                let overflow = window_end - loop_end;
                sbuf.undo(overflow.min(rounded)).map_err(Wav64Error::Configuration)?;
                self.offload.sync().await.map_err(|_| Wav64Error::OpusDecode)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_predictor() -> Predictor {
        Predictor {
            coef_prev: [0; 8],
            coef_cur: [0; 8],
        }
    }

    #[test]
    fn zero_residual_zero_predictor_is_silence() {
        let mut history: HistoryVector = [0; 8];
        let out = decode_frame(&identity_predictor(), 0, &[0u8; 8], &mut history);
        assert_eq!(out, [0i16; 16]);
    }

    #[test]
    fn residual_scale_shifts_nibbles() {
        let mut history: HistoryVector = [0; 8];
        // High nibble of the first byte is 0b0001 -> residual 1, shifted
        // left by scale=4 -> 16, unaffected by a zero predictor.
        let out = decode_frame(&identity_predictor(), 4, &[0x10, 0, 0, 0, 0, 0, 0, 0], &mut history);
        assert_eq!(out[0], 16);
    }

    #[test]
    fn sign_extend_handles_negative_nibbles() {
        assert_eq!(sign_extend4(0b1111), -1);
        assert_eq!(sign_extend4(0b0111), 7);
        assert_eq!(sign_extend4(0b1000), -8);
    }

    /// Exercises the history-prediction term: a zero predictor contributes
    /// nothing, so a non-zero `coef_cur` against a non-zero `history[7]`
    /// (the last sample of the previous vector) must show up scaled by
    /// Q11, with no contribution from `history`'s other 7 lanes.
    #[test]
    fn history_term_is_scalar_times_predictor_vector_not_a_dot_product() {
        let predictor = Predictor {
            coef_prev: [0; 8],
            coef_cur: [2048, 0, 0, 0, 0, 0, 0, 0],
        };
        let mut history: HistoryVector = [0, 0, 0, 0, 0, 0, 0, 3];
        let out = decode_frame(&predictor, 0, &[0u8; 8], &mut history);
        // vector 0: acc[0] = history[7] * coef_cur[0] = 3 * 2048, >>11 == 3.
        assert_eq!(out[0], 3);
        assert_eq!(&out[1..8], &[0i16; 7]);
        // vector 1 predicts from vector 0's output, whose history[6..8] is
        // [0, 0] (lanes 6 and 7 of [3, 0, 0, 0, 0, 0, 0, 0]) — silence.
        assert_eq!(&out[8..16], &[0i16; 8]);
    }

    /// Exercises the in-frame convolution step: a residual at lane 0 must
    /// be spread forward into lane 1 via the order-1 predictor vector, not
    /// just written into its own lane.
    #[test]
    fn residual_convolves_forward_into_later_lanes() {
        let predictor = Predictor {
            coef_prev: [0; 8],
            coef_cur: [2048, 0, 0, 0, 0, 0, 0, 0],
        };
        let mut history: HistoryVector = [0; 8];
        // High nibble of byte 0 is 0b0001 -> residual[0] = 1 at scale 0.
        let out = decode_frame(&predictor, 0, &[0x10, 0, 0, 0, 0, 0, 0, 0], &mut history);
        // Lane 0: residual<<11 == 2048, >>11 == 1.
        assert_eq!(out[0], 1);
        // Lane 1: convolved contribution residual * coef_cur[0] == 2048, >>11 == 1.
        assert_eq!(out[1], 1);
        assert_eq!(&out[2..8], &[0i16; 6]);
        // Second vector sees history[6..8] == [0, 0] (from [1, 1, 0, 0, 0, 0, 0, 0]
        // written after vector 0), so it decodes to silence.
        assert_eq!(&out[8..16], &[0i16; 8]);
    }
}
