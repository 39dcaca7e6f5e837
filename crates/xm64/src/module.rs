//! XM64 module metadata: header, instrument/envelope tables, and
//! per-pattern row streaming.
//!
//! The metadata block (patterns, instruments, envelopes — never raw sample
//! data, which lives in separate wav64 assets the host binds per instrument)
//! arrives pre-decompressed as a byte slice via [`MetadataSource`]; whatever
//! compression the asset pipeline applied upstream is out of this crate's
//! scope. Layout is this crate's own (no asset pipeline producing
//! byte-exact XM64 metadata exists in this corpus), following the same
//! house style as `wav64::container`'s header: fixed big-endian fields,
//! parsed with the same [`wav64::bitio::ByteReader`] that crate's own
//! container and VADPCM extension parsing use. The per-row note packing
//! (packed-flag byte, five optional fields) is carried over unchanged from
//! the classic XM pattern format, since it is a proven, compact encoding
//! worth reusing rather than reinventing.

// Field-count and table-index arithmetic here is bounded by the fixed
// capacities declared alongside each table.
#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use wav64::bitio::ByteReader;

use crate::error::FormatError;

/// Fixed 5-byte sanity header at the start of the decompressed metadata
/// blob (magic + version). The outer XM64 asset container's own
/// `metadata_offset`/`metadata_size` fields describe where to find and how
/// large this blob is *before* decompression — the host's decompression
/// step consumes those, not this parser, since decompression is out of
/// scope here (see the module doc comment).
pub const HEADER_SIZE: usize = 5;
/// Required magic.
pub const MAGIC: &[u8; 4] = b"XM64";
/// Supported header version.
pub const VERSION: u8 = 11;

/// Channels this build supports per module.
pub const MAX_CHANNELS: usize = 32;
/// Patterns this build supports per module.
pub const MAX_PATTERNS: usize = 256;
/// Instruments this build supports per module.
pub const MAX_INSTRUMENTS: usize = 128;
/// Samples this build supports per instrument.
pub const MAX_SAMPLES_PER_INSTRUMENT: usize = 16;
/// Envelope points this build supports per envelope (matches the classic
/// XM format's fixed 12-point envelopes).
pub const MAX_ENVELOPE_POINTS: usize = 12;
/// Song order-table length.
pub const MAX_ORDER_LENGTH: usize = 256;

/// A pre-decompressed XM64 metadata blob. The host satisfies this trait
/// however its asset pipeline decompresses the block (from ROM, from a
/// heap buffer, ...); this crate only ever needs a `&[u8]` view of it.
pub trait MetadataSource {
    /// The decompressed metadata bytes.
    fn bytes(&self) -> &[u8];
}

impl MetadataSource for &[u8] {
    fn bytes(&self) -> &[u8] {
        self
    }
}

impl<const N: usize> MetadataSource for heapless::Vec<u8, N> {
    fn bytes(&self) -> &[u8] {
        self.as_slice()
    }
}

/// One (x, y) control point of a volume or panning envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopePoint {
    /// Tick position.
    pub x: u16,
    /// Value at that tick (0..=64).
    pub y: u16,
}

/// A volume or panning envelope.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    /// Control points in ascending `x` order.
    pub points: heapless::Vec<EnvelopePoint, MAX_ENVELOPE_POINTS>,
    /// Index of the sustain point, if `sustain_enabled`.
    pub sustain_point: u8,
    /// Index of the loop start point, if `loop_enabled`.
    pub loop_start: u8,
    /// Index of the loop end point, if `loop_enabled`.
    pub loop_end: u8,
    /// Whether this envelope is in use at all.
    pub enabled: bool,
    /// Whether playback holds at `sustain_point` until note release.
    pub sustain_enabled: bool,
    /// Whether playback loops between `loop_start` and `loop_end`.
    pub loop_enabled: bool,
}

impl Envelope {
    /// Evaluate the envelope at `tick`, linearly interpolating between
    /// control points — `libxm`'s `envelope_tick` without the sustain/loop
    /// tick-clamping, which the caller (the voice's own envelope counter)
    /// is responsible for applying before calling this.
    pub fn value_at(&self, tick: u16) -> u16 {
        let Some(last) = self.points.last() else {
            return 64;
        };
        if tick >= last.x {
            return last.y;
        }
        let mut prev = self.points.first().copied().unwrap_or_default();
        for point in &self.points {
            if point.x > tick {
                let span = point.x.saturating_sub(prev.x).max(1);
                let progress = tick.saturating_sub(prev.x);
                let delta = i32::from(point.y) - i32::from(prev.y);
                let interpolated = i32::from(prev.y) + delta * i32::from(progress) / i32::from(span);
                return interpolated.clamp(0, 64) as u16;
            }
            prev = *point;
        }
        prev.y
    }
}

/// Loop style of a sample within an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopType {
    /// No looping.
    None,
    /// Forward loop.
    Forward,
    /// Ping-pong (bidirectional) loop.
    PingPong,
}

impl LoopType {
    fn from_u8(v: u8) -> Self {
        match v & 0x03 {
            1 => Self::Forward,
            2 => Self::PingPong,
            _ => Self::None,
        }
    }
}

/// One XM sample slot: XM pitch/volume/pan metadata plus an index into the
/// host's table of bound wav64 assets. Raw PCM never lives in the metadata
/// block itself — see the module doc comment.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// Index into the host-supplied table of wav64 assets this instrument's
    /// samples are bound to.
    pub wav64_index: u16,
    /// 1/128th-semitone fine pitch correction.
    pub finetune: i8,
    /// Semitone offset from C-4 (the XM sample base note).
    pub relative_note: i8,
    /// Default volume (0..=64).
    pub volume: u8,
    /// Default panning (0..=255, 128 = center).
    pub panning: u8,
    /// Loop style.
    pub loop_type: LoopType,
}

/// One XM instrument: a note-to-sample map plus volume/panning envelopes
/// and vibrato parameters shared by every sample it maps to.
#[derive(Debug, Clone, Default)]
pub struct Instrument {
    /// Note number (0..96) to sample-slot-within-this-instrument map.
    pub sample_map: [u8; 96],
    /// This instrument's samples.
    pub samples: heapless::Vec<Sample, MAX_SAMPLES_PER_INSTRUMENT>,
    /// Volume envelope, if enabled.
    pub volume_envelope: Option<Envelope>,
    /// Panning envelope, if enabled.
    pub panning_envelope: Option<Envelope>,
    /// Autovibrato waveform.
    pub vibrato_type: u8,
    /// Autovibrato sweep (ticks to reach full depth).
    pub vibrato_sweep: u8,
    /// Autovibrato depth.
    pub vibrato_depth: u8,
    /// Autovibrato rate.
    pub vibrato_rate: u8,
    /// Volume fadeout-per-tick applied after note release.
    pub volume_fadeout: u16,
}

impl Instrument {
    /// The sample slot index this instrument maps `note` to, or `None` if
    /// `note` has no sample (or this instrument has none at all).
    pub fn sample_for_note(&self, note: u8) -> Option<&Sample> {
        let slot = *self.sample_map.get(usize::from(note).min(95))?;
        self.samples.get(usize::from(slot))
    }
}

/// One row of one pattern, one channel's worth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternSlot {
    /// Note number: 0 = no note, 1..=96 = C-0..B-7, 97 = note off (`libxm`'s
    /// `NOTE_OFF`).
    pub note: u8,
    /// Instrument number, 1-based; 0 = none (keep current).
    pub instrument: u8,
    /// Volume-column byte, raw (effects.rs decodes its sub-range meaning).
    pub volume: u8,
    /// Effect type.
    pub effect: u8,
    /// Effect parameter.
    pub effect_param: u8,
}

/// Note value meaning "release this voice" rather than retrigger it.
pub const NOTE_OFF: u8 = 97;

/// A pattern's row count and the byte span of its packed row data within
/// the metadata blob — patterns are never materialized in full; the player
/// streams one row at a time via [`XmModule::read_row`], matching the
/// forward-only scan a tick engine naturally performs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pattern {
    /// Number of rows in this pattern.
    pub rows: u16,
    /// Byte offset of this pattern's packed row data, relative to the start
    /// of the metadata blob.
    pub data_offset: u32,
}

/// A fully parsed XM64 module: header fields, the song order table, and
/// the instrument/envelope tables. Pattern row data stays in the metadata
/// blob and is streamed on demand.
#[derive(Debug, Clone)]
pub struct XmModule {
    /// Active channel count.
    pub num_channels: u8,
    /// Ticks per row at song start.
    pub default_speed: u8,
    /// Beats per minute at song start.
    pub default_bpm: u16,
    /// Whether note-to-frequency conversion uses the linear (vs. Amiga
    /// period) table. Only the linear table is implemented — see
    /// `crate::freqtable`.
    pub linear_frequency_table: bool,
    /// Pattern index to restart at when playback reaches the end of
    /// `order_table` (or via an out-of-range pattern-jump effect).
    pub restart_position: u16,
    /// Song order: index into `patterns` per song position.
    pub order_table: heapless::Vec<u8, MAX_ORDER_LENGTH>,
    /// Pattern table.
    pub patterns: heapless::Vec<Pattern, MAX_PATTERNS>,
    /// Instrument table, 0-indexed (pattern slots' 1-based `instrument`
    /// field must be decremented before indexing this).
    pub instruments: heapless::Vec<Instrument, MAX_INSTRUMENTS>,
}

fn read_envelope(r: &mut ByteReader<'_>) -> Result<Envelope, FormatError> {
    let num_points = r.u8().map_err(|_| FormatError::Truncated)?;
    let mut points = heapless::Vec::new();
    for _ in 0..num_points.min(MAX_ENVELOPE_POINTS as u8) {
        let x = r.u16().map_err(|_| FormatError::Truncated)?;
        let y = r.u16().map_err(|_| FormatError::Truncated)?;
        points.push(EnvelopePoint { x, y }).map_err(|_| FormatError::CapacityExceeded)?;
    }
    // Any remaining declared points beyond this build's capacity are
    // consumed but dropped, matching `wav64` extension parsing's existing
    // fixed-capacity-table precedent.
    for _ in MAX_ENVELOPE_POINTS as u8..num_points {
        r.u16().map_err(|_| FormatError::Truncated)?;
        r.u16().map_err(|_| FormatError::Truncated)?;
    }
    let sustain_point = r.u8().map_err(|_| FormatError::Truncated)?;
    let loop_start = r.u8().map_err(|_| FormatError::Truncated)?;
    let loop_end = r.u8().map_err(|_| FormatError::Truncated)?;
    let flags = r.u8().map_err(|_| FormatError::Truncated)?;
    Ok(Envelope {
        points,
        sustain_point,
        loop_start,
        loop_end,
        enabled: flags & 1 != 0,
        sustain_enabled: flags & 2 != 0,
        loop_enabled: flags & 4 != 0,
    })
}

fn read_instrument(r: &mut ByteReader<'_>) -> Result<Instrument, FormatError> {
    let sample_count = r.u16().map_err(|_| FormatError::Truncated)?;
    let mut sample_map = [0u8; 96];
    for slot in &mut sample_map {
        *slot = r.u8().map_err(|_| FormatError::Truncated)?;
    }
    let volume_envelope = read_envelope(r)?;
    let panning_envelope = read_envelope(r)?;
    let vibrato_type = r.u8().map_err(|_| FormatError::Truncated)?;
    let vibrato_sweep = r.u8().map_err(|_| FormatError::Truncated)?;
    let vibrato_depth = r.u8().map_err(|_| FormatError::Truncated)?;
    let vibrato_rate = r.u8().map_err(|_| FormatError::Truncated)?;
    let volume_fadeout = r.u16().map_err(|_| FormatError::Truncated)?;

    let mut samples = heapless::Vec::new();
    for _ in 0..sample_count {
        let wav64_index = r.u16().map_err(|_| FormatError::Truncated)?;
        let finetune = r.u8().map_err(|_| FormatError::Truncated)? as i8;
        let relative_note = r.u8().map_err(|_| FormatError::Truncated)? as i8;
        let volume = r.u8().map_err(|_| FormatError::Truncated)?;
        let panning = r.u8().map_err(|_| FormatError::Truncated)?;
        let loop_type = LoopType::from_u8(r.u8().map_err(|_| FormatError::Truncated)?);
        if samples
            .push(Sample {
                wav64_index,
                finetune,
                relative_note,
                volume,
                panning,
                loop_type,
            })
            .is_err()
        {
            return Err(FormatError::CapacityExceeded);
        }
    }

    Ok(Instrument {
        sample_map,
        samples,
        volume_envelope: volume_envelope.enabled.then_some(volume_envelope),
        panning_envelope: panning_envelope.enabled.then_some(panning_envelope),
        vibrato_type,
        vibrato_sweep,
        vibrato_depth,
        vibrato_rate,
        volume_fadeout,
    })
}

impl XmModule {
    /// Parse header, order table, pattern table, and instrument/envelope
    /// tables out of `meta`. Pattern row data is left in place; use
    /// [`Self::read_row`] to stream it.
    pub fn parse(meta: &dyn MetadataSource) -> Result<Self, FormatError> {
        let bytes = meta.bytes();
        let mut r = ByteReader::new(bytes);
        let magic = r.bytes::<4>().map_err(|_| FormatError::Truncated)?;
        if &magic != MAGIC {
            return Err(FormatError::BadMagic);
        }
        let version = r.u8().map_err(|_| FormatError::Truncated)?;
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion);
        }
        let num_channels = r.u8().map_err(|_| FormatError::Truncated)?;
        let num_patterns = r.u16().map_err(|_| FormatError::Truncated)?;
        let num_instruments = r.u16().map_err(|_| FormatError::Truncated)?;
        let song_length = r.u16().map_err(|_| FormatError::Truncated)?;
        let restart_position = r.u16().map_err(|_| FormatError::Truncated)?;
        let flags = r.u8().map_err(|_| FormatError::Truncated)?;
        let default_speed = r.u8().map_err(|_| FormatError::Truncated)?;
        let default_bpm = r.u16().map_err(|_| FormatError::Truncated)?;

        let mut order_table = heapless::Vec::new();
        for _ in 0..song_length.min(MAX_ORDER_LENGTH as u16) {
            order_table
                .push(r.u8().map_err(|_| FormatError::Truncated)?)
                .map_err(|_| FormatError::CapacityExceeded)?;
        }
        for _ in MAX_ORDER_LENGTH as u16..song_length {
            r.u8().map_err(|_| FormatError::Truncated)?;
        }

        let mut patterns = heapless::Vec::new();
        for _ in 0..num_patterns {
            let rows = r.u16().map_err(|_| FormatError::Truncated)?;
            let data_offset = r.u32().map_err(|_| FormatError::Truncated)?;
            patterns
                .push(Pattern { rows, data_offset })
                .map_err(|_| FormatError::CapacityExceeded)?;
        }

        let mut instruments = heapless::Vec::new();
        for _ in 0..num_instruments {
            let instrument = read_instrument(&mut r)?;
            instruments.push(instrument).map_err(|_| FormatError::CapacityExceeded)?;
        }

        Ok(Self {
            num_channels,
            default_speed,
            default_bpm,
            linear_frequency_table: flags & 1 != 0,
            restart_position,
            order_table,
            patterns,
            instruments,
        })
    }

    /// Read one row of `pattern_index` into `out`, one slot per active
    /// channel, advancing `cursor` (a byte offset into `meta`, initialized
    /// to `patterns[pattern_index].data_offset` when a pattern is entered)
    /// past the row just read.
    pub fn read_row(
        &self,
        meta: &dyn MetadataSource,
        pattern_index: usize,
        cursor: &mut u32,
        out: &mut [PatternSlot],
    ) -> Result<(), FormatError> {
        let bytes = meta.bytes();
        let mut r = ByteReader::new(bytes);
        r.skip(*cursor as usize).map_err(|_| FormatError::Truncated)?;
        let channels = usize::from(self.num_channels).min(out.len()).min(MAX_CHANNELS);
        let _ = pattern_index;
        for slot in out.iter_mut().take(channels) {
            *slot = read_slot(&mut r)?;
        }
        *cursor = u32::try_from(r.position()).map_err(|_| FormatError::Truncated)?;
        Ok(())
    }

    /// The pattern index at song position `order`, honoring wraparound via
    /// [`crate::wrap_index`].
    pub fn pattern_at(&self, order: usize) -> Option<usize> {
        let len = self.order_table.len();
        if len == 0 {
            return None;
        }
        let wrapped = crate::wrap_index(order, len);
        self.order_table.get(wrapped).map(|&p| usize::from(p))
    }
}

fn read_slot(r: &mut ByteReader<'_>) -> Result<PatternSlot, FormatError> {
    let first = r.u8().map_err(|_| FormatError::Truncated)?;
    if first & 0x80 != 0 {
        let mut slot = PatternSlot::default();
        if first & 0x01 != 0 {
            slot.note = r.u8().map_err(|_| FormatError::Truncated)?;
        }
        if first & 0x02 != 0 {
            slot.instrument = r.u8().map_err(|_| FormatError::Truncated)?;
        }
        if first & 0x04 != 0 {
            slot.volume = r.u8().map_err(|_| FormatError::Truncated)?;
        }
        if first & 0x08 != 0 {
            slot.effect = r.u8().map_err(|_| FormatError::Truncated)?;
        }
        if first & 0x10 != 0 {
            slot.effect_param = r.u8().map_err(|_| FormatError::Truncated)?;
        }
        Ok(slot)
    } else {
        Ok(PatternSlot {
            note: first,
            instrument: r.u8().map_err(|_| FormatError::Truncated)?,
            volume: r.u8().map_err(|_| FormatError::Truncated)?,
            effect: r.u8().map_err(|_| FormatError::Truncated)?,
            effect_param: r.u8().map_err(|_| FormatError::Truncated)?,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use wav64::bitio::ByteWriter;

    fn synth_module() -> heapless::Vec<u8, 512> {
        let mut w: ByteWriter<512> = ByteWriter::new();
        w.bytes(MAGIC);
        w.u8(VERSION);
        w.u8(2); // num_channels
        w.u16(1); // num_patterns
        w.u16(0); // num_instruments
        w.u16(1); // song_length
        w.u16(0); // restart_position
        w.u8(1); // flags: linear freq table
        w.u8(6); // default_speed
        w.u16(125); // default_bpm
        w.u8(0); // order_table[0]
                  // pattern table: 1 pattern, 1 row, data right after this table entry
        w.u16(1); // rows
        let data_offset_patch = w.placeholder_u32();
        // row data starts here
        let row_start = w.len();
        w.u8(0x80 | 0x01 | 0x02); // packed: note + instrument
        w.u8(49); // note C-4 (1-based, C-0=1)
        w.u8(1); // instrument
        w.u8(0x80); // channel 1: empty
        w.patch_u32(data_offset_patch, row_start as u32);
        w.finish()
    }

    #[test]
    fn parses_header_and_order_table() {
        let bytes = synth_module();
        let module = XmModule::parse(&bytes.as_slice()).expect("valid module");
        assert_eq!(module.num_channels, 2);
        assert_eq!(module.default_bpm, 125);
        assert_eq!(module.order_table.as_slice(), &[0]);
        assert_eq!(module.patterns.len(), 1);
    }

    #[test]
    fn reads_one_packed_row() {
        let bytes = synth_module();
        let module = XmModule::parse(&bytes.as_slice()).expect("valid module");
        let pattern = module.patterns[0];
        let mut cursor = pattern.data_offset;
        let mut row = [PatternSlot::default(); 2];
        module
            .read_row(&bytes.as_slice(), 0, &mut cursor, &mut row)
            .expect("row reads");
        assert_eq!(row[0].note, 49);
        assert_eq!(row[0].instrument, 1);
        assert_eq!(row[1], PatternSlot::default());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = synth_module();
        bytes[0] = b'X';
        assert_eq!(XmModule::parse(&bytes.as_slice()), Err(FormatError::BadMagic));
    }

    #[test]
    fn envelope_interpolates_between_points() {
        let env = Envelope {
            points: heapless::Vec::from_slice(&[
                EnvelopePoint { x: 0, y: 0 },
                EnvelopePoint { x: 10, y: 64 },
            ])
            .unwrap(),
            sustain_point: 0,
            loop_start: 0,
            loop_end: 0,
            enabled: true,
            sustain_enabled: false,
            loop_enabled: false,
        };
        assert_eq!(env.value_at(0), 0);
        assert_eq!(env.value_at(5), 32);
        assert_eq!(env.value_at(10), 64);
        assert_eq!(env.value_at(20), 64);
    }
}
