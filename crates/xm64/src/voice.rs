//! Per-channel XM voice state: everything the tick engine and effect
//! processor need to carry forward from one tick to the next.
//!
//! Grounded on `libxm`'s `xm_channel_context_t` (the mixer-adjacent fields —
//! instrument/sample pointers, sample position, frequency, volume/panning,
//! envelope counters, per-effect memory registers, vibrato/tremolo phase,
//! ping-pong direction) carried over field-for-field, generalized from that
//! struct's packed C layout to plain Rust fields with no change in meaning.

/// One channel's full playback state.
#[derive(Debug, Clone, Copy)]
pub struct VoiceContext {
    /// 1-based instrument number currently bound (0 = none).
    pub instrument: u8,
    /// 0-based sample-within-instrument slot currently bound.
    pub sample: u8,
    /// Last note number played (for portamento/arpeggio reference).
    pub note: u8,
    /// Logical sample position, fractional (advanced by `step` every
    /// output sample by the mixer; this crate only updates it at tick
    /// boundaries and hands the integer part to `Waveform::read`).
    pub sample_position: f64,
    /// Samples advanced per output sample (pitch ratio), derived from
    /// `frequency` and the mixer's output rate.
    pub step: f64,
    /// Current playback frequency in Hz, after vibrato/portamento/
    /// arpeggio are applied on top of the note's base frequency.
    pub frequency: f64,
    /// Base frequency (no per-tick pitch effects applied), recomputed on
    /// every new note/portamento target change.
    pub base_frequency: f64,
    /// Current volume, 0..=64.
    pub volume: u8,
    /// Current panning, 0..=255 (128 = center).
    pub panning: u8,
    /// Volume envelope tick counter.
    pub volume_envelope_tick: u16,
    /// Panning envelope tick counter.
    pub panning_envelope_tick: u16,
    /// Whether the note has been released (`NOTE_OFF` seen, or fadeout
    /// engaged) — envelopes past their sustain point advance again only
    /// once this is set.
    pub released: bool,
    /// Fadeout multiplier, counts down from 65535 after release.
    pub fadeout: u16,
    /// Autovibrato sweep-in position (ticks since note start, capped at
    /// the instrument's vibrato sweep).
    pub autovibrato_tick: u16,
    /// Effect vibrato waveform phase.
    pub vibrato_position: u8,
    /// Effect tremolo waveform phase.
    pub tremolo_position: u8,
    /// Ping-pong loop direction: `true` = forward.
    pub ping_pong_forward: bool,
    /// Muted by the host (not part of the tick algorithm, a playback
    /// control surface).
    pub muted: bool,
    /// Whether this voice is currently sounding.
    pub playing: bool,

    /// Tone-portamento target frequency (`3xx`/`5xx`).
    pub portamento_target: f64,
    /// Last nonzero tone-portamento rate (effect memory).
    pub portamento_param: u8,
    /// Last nonzero portamento-up/down rate (effect memory, shared by
    /// `1xx`/`2xx`).
    pub porta_updown_param: u8,
    /// Last nonzero volume-slide rate (effect memory, shared by
    /// `Axx`/`5xx`/`6xx`).
    pub volume_slide_param: u8,
    /// Last nonzero vibrato rate/depth (effect memory, `4xy`).
    pub vibrato_param: u8,
    /// Last nonzero tremolo rate/depth (effect memory, `7xy`).
    pub tremolo_param: u8,
    /// Last nonzero retrigger parameter (effect memory, `Rxy`/`E9x`).
    pub retrigger_param: u8,
    /// Last nonzero arpeggio parameter (effect memory, `0xy`).
    pub arpeggio_param: u8,
    /// Last nonzero fine-portamento-up parameter (`E1x`).
    pub fine_porta_up_param: u8,
    /// Last nonzero fine-portamento-down parameter (`E2x`).
    pub fine_porta_down_param: u8,
}

impl Default for VoiceContext {
    fn default() -> Self {
        Self {
            instrument: 0,
            sample: 0,
            note: 0,
            sample_position: 0.0,
            step: 1.0,
            frequency: 0.0,
            base_frequency: 0.0,
            volume: 64,
            panning: 128,
            volume_envelope_tick: 0,
            panning_envelope_tick: 0,
            released: false,
            fadeout: 65535,
            autovibrato_tick: 0,
            vibrato_position: 0,
            tremolo_position: 0,
            ping_pong_forward: true,
            muted: false,
            playing: false,
            portamento_target: 0.0,
            portamento_param: 0,
            porta_updown_param: 0,
            volume_slide_param: 0,
            vibrato_param: 0,
            tremolo_param: 0,
            retrigger_param: 0,
            arpeggio_param: 0,
            fine_porta_up_param: 0,
            fine_porta_down_param: 0,
        }
    }
}

impl VoiceContext {
    /// Reset per-note state on a fresh trigger, keeping effect-memory
    /// registers (those persist across notes within a channel).
    pub fn trigger(&mut self, note: u8, instrument: u8) {
        self.note = note;
        self.instrument = instrument;
        self.released = false;
        self.fadeout = 65535;
        self.volume_envelope_tick = 0;
        self.panning_envelope_tick = 0;
        self.autovibrato_tick = 0;
        self.vibrato_position = 0;
        self.tremolo_position = 0;
        self.playing = true;
    }

    /// Mark the voice released (`NOTE_OFF` seen): envelopes resume
    /// past their sustain point and fadeout begins.
    pub fn release(&mut self) {
        self.released = true;
    }
}
