//! The tick-driven song player.
//!
//! Grounded on `playback::engine::PlaybackEngine`'s clean state-machine
//! shape (an explicit step function advancing one unit of playback and
//! reporting how long until it must run again, rather than owning a timer
//! itself) and on `xm64.c`'s wrapper design: that file never touches a
//! mixer channel's ring buffer directly, it only calls a small, channel-
//! indexed API (`wav64_play`, `mixer_ch_set_freq`, `mixer_ch_set_vol`) to
//! drive playback. [`VoiceSink`] is that same seam, generalized to a trait
//! so this crate stays independent of any one mixer's concrete channel
//! API, and so the player itself never needs to hold one different
//! [`wav64::Waveform`] type per channel — a generic collection of
//! differently-typed waveforms has no single Rust type, the host's mixer is
//! already the place that resolves "channel number to waveform" today.

use critical_section::Mutex;
use core::cell::Cell;

use crate::error::{FormatError, Xm64Error};
use crate::effects::{apply_row, apply_tick, SongAction, TickAction};
use crate::module::{MetadataSource, PatternSlot, XmModule, MAX_CHANNELS};
use crate::voice::VoiceContext;

/// The host-provided control surface for actually sounding a channel.
///
/// Every method is fire-and-forget from the player's perspective: it
/// computes target state once per tick and hands it off here, same as
/// `xm64.c` does with the real mixer.
pub trait VoiceSink {
    /// Bind `wav64_index` to `channel` and start it playing from
    /// `seek_frame` (usually 0; nonzero for a sample-offset effect or a
    /// retrigger).
    fn trigger(&mut self, channel: u8, wav64_index: u16, seek_frame: u32);
    /// Update `channel`'s playback frequency in Hz.
    fn set_frequency(&mut self, channel: u8, hz: f64);
    /// Update `channel`'s volume (0..=64) and panning (0..=255).
    fn set_volume(&mut self, channel: u8, volume: u8, panning: u8);
    /// Silence `channel` immediately.
    fn stop(&mut self, channel: u8);
}

#[derive(Debug, Clone, Copy, Default)]
struct TransportState {
    order: u16,
    row: u16,
    tick: u16,
    speed: u8,
    bpm: u16,
    pattern_loop_row: u16,
    pattern_loop_count: u8,
    stopped: bool,
}

/// Pending seek/stop requests set from outside the tick loop (an
/// interrupt-adjacent context on the real hardware, hence the
/// `critical_section` cell rather than a plain `Cell`/`RefCell`).
#[derive(Debug, Clone, Copy, Default)]
struct PendingControl {
    stop: bool,
    seek: Option<(u16, u16)>,
}

/// Drives an [`XmModule`] tick by tick, computing each active channel's
/// target pitch/volume/panning and issuing trigger/stop calls through a
/// [`VoiceSink`].
pub struct Xm64Player<M: MetadataSource> {
    module: XmModule,
    meta: M,
    sample_rate: u32,
    voices: heapless::Vec<VoiceContext, MAX_CHANNELS>,
    row_slots: heapless::Vec<PatternSlot, MAX_CHANNELS>,
    row_cursor: u32,
    transport: TransportState,
    pending: Mutex<Cell<PendingControl>>,
}

impl<M: MetadataSource> Xm64Player<M> {
    /// Build a player over `module`/`meta`, starting at song position 0 and
    /// the module's default speed/bpm.
    pub fn new(module: XmModule, meta: M, sample_rate: u32) -> Self {
        let channels = usize::from(module.num_channels).min(MAX_CHANNELS);
        let mut voices = heapless::Vec::new();
        let mut row_slots = heapless::Vec::new();
        for _ in 0..channels {
            let _ = voices.push(VoiceContext::default());
            let _ = row_slots.push(PatternSlot::default());
        }
        let transport = TransportState {
            speed: module.default_speed,
            bpm: module.default_bpm,
            ..TransportState::default()
        };
        Self {
            module,
            meta,
            sample_rate,
            voices,
            row_slots,
            row_cursor: 0,
            transport,
            pending: Mutex::new(Cell::new(PendingControl::default())),
        }
    }

    /// Request playback stop; honored at the start of the next [`Self::tick`].
    pub fn request_stop(&self) {
        critical_section::with(|cs| {
            let mut pending = self.pending.borrow(cs).get();
            pending.stop = true;
            self.pending.borrow(cs).set(pending);
        });
    }

    /// Request a jump to `(order, row)`; honored at the start of the next
    /// [`Self::tick`]. Out-of-range values are clamped when applied.
    pub fn request_seek(&self, order: u16, row: u16) {
        critical_section::with(|cs| {
            let mut pending = self.pending.borrow(cs).get();
            pending.seek = Some((order, row));
            self.pending.borrow(cs).set(pending);
        });
    }

    /// Current song position, for host UI/telemetry.
    pub fn position(&self) -> (u16, u16) {
        (self.transport.order, self.transport.row)
    }

    fn take_pending(&self) -> PendingControl {
        critical_section::with(|cs| {
            let pending = self.pending.borrow(cs).get();
            self.pending.borrow(cs).set(PendingControl::default());
            pending
        })
    }

    fn samples_until_next_tick(&self) -> u32 {
        let bpm = u32::from(self.transport.bpm.max(1));
        (self.sample_rate.saturating_mul(5)) / bpm.saturating_mul(2).max(1)
    }

    fn enter_pattern(&mut self, pattern_index: usize, row: u16) -> Result<(), FormatError> {
        let pattern = *self.module.patterns.get(pattern_index).ok_or(FormatError::IndexOutOfRange)?;
        self.row_cursor = pattern.data_offset;
        for r in 0..row {
            let _ = r;
            self.module.read_row(&self.meta, pattern_index, &mut self.row_cursor, &mut self.row_slots)?;
        }
        Ok(())
    }

    /// Advance playback by one tick.
    ///
    /// Steps, matching the tick algorithm this format's engines converge
    /// on: (1) honor a pending stop, (2) honor a pending seek, (3) on tick
    /// 0 of a row, stream the row and apply its one-shot effects; on every
    /// other tick, apply the recurring effects; (4) advance the tick/row/
    /// order counters; (5) push each channel's resulting frequency/volume/
    /// panning (and any trigger/stop) to `sink`; (6) return the sample
    /// count until this should be called again, or `None` if playback has
    /// stopped.
    pub fn tick<S: VoiceSink>(&mut self, sink: &mut S) -> Result<Option<u32>, Xm64Error<core::convert::Infallible>> {
        let pending = self.take_pending();
        if pending.stop || self.transport.stopped {
            self.transport.stopped = true;
            for (ch, _) in self.voices.iter().enumerate() {
                sink.stop(ch as u8);
            }
            return Ok(None);
        }

        if let Some((order, row)) = pending.seek {
            self.transport.order = order;
            self.transport.row = row;
            self.transport.tick = 0;
            let pattern_index = self.module.pattern_at(usize::from(order)).ok_or(Xm64Error::OutOfRange)?;
            self.enter_pattern(pattern_index, row).map_err(Xm64Error::Format)?;
        }

        let pattern_index = self
            .module
            .pattern_at(usize::from(self.transport.order))
            .ok_or(Xm64Error::OutOfRange)?;

        let mut song_action = SongAction::default();
        if self.transport.tick == 0 {
            if self.transport.row == 0 || self.row_cursor_uninitialized() {
                self.enter_pattern(pattern_index, self.transport.row).map_err(Xm64Error::Format)?;
            } else {
                self.module
                    .read_row(&self.meta, pattern_index, &mut self.row_cursor, &mut self.row_slots)
                    .map_err(Xm64Error::Format)?;
            }
            for (channel, slot) in self.row_slots.clone().iter().enumerate() {
                let instrument = self.instrument_for(slot);
                let Some(voice) = self.voices.get_mut(channel) else { continue };
                let (action, action_song) = apply_row(voice, slot, instrument);
                merge_song_action(&mut song_action, action_song);
                self.dispatch(channel as u8, voice, slot, action, sink);
            }
        } else {
            for (channel, slot) in self.row_slots.clone().iter().enumerate() {
                let Some(voice) = self.voices.get_mut(channel) else { continue };
                apply_tick(voice, slot, self.transport.tick);
                self.push_voice_state(channel as u8, voice, sink);
            }
        }

        self.apply_song_action(song_action);
        self.advance_transport();

        Ok(Some(self.samples_until_next_tick()))
    }

    fn row_cursor_uninitialized(&self) -> bool {
        self.row_cursor == 0 && self.transport.tick == 0 && self.transport.row == 0
    }

    fn instrument_for(&self, slot: &PatternSlot) -> Option<&crate::module::Instrument> {
        if slot.instrument == 0 {
            return None;
        }
        self.module.instruments.get(usize::from(slot.instrument - 1))
    }

    fn dispatch<S: VoiceSink>(&self, channel: u8, voice: &VoiceContext, slot: &PatternSlot, action: TickAction, sink: &mut S) {
        if action.stop {
            sink.stop(channel);
            return;
        }
        if action.trigger {
            let wav64_index = self
                .instrument_for(slot)
                .and_then(|instr| instr.sample_for_note(slot.note.saturating_sub(1)))
                .map_or(0, |sample| sample.wav64_index);
            let seek = action.seek_to.unwrap_or(0);
            sink.trigger(channel, wav64_index, seek);
        } else if let Some(seek_frame) = action.seek_to {
            let wav64_index = self
                .instrument_for(slot)
                .and_then(|instr| instr.sample_for_note(slot.note.saturating_sub(1)))
                .map_or(0, |sample| sample.wav64_index);
            sink.trigger(channel, wav64_index, seek_frame);
        }
        self.push_voice_state(channel, voice, sink);
    }

    fn push_voice_state<S: VoiceSink>(&self, channel: u8, voice: &VoiceContext, sink: &mut S) {
        sink.set_frequency(channel, voice.frequency);
        sink.set_volume(channel, voice.volume, voice.panning);
    }

    fn apply_song_action(&mut self, action: SongAction) {
        if let Some(speed) = action.speed {
            self.transport.speed = speed;
        }
        if let Some(bpm) = action.bpm {
            self.transport.bpm = bpm;
        }
        if let Some(order) = action.position_jump {
            self.transport.order = u16::from(order);
            self.transport.row = 0;
            self.row_cursor = u32::MAX; // force `enter_pattern` on the next tick 0
        }
        if let Some(row) = action.pattern_break {
            self.transport.order = self.transport.order.saturating_add(1);
            self.transport.row = u16::from(row);
            self.row_cursor = u32::MAX;
        }
        if let Some(marker) = action.pattern_loop {
            if marker == 0 {
                self.transport.pattern_loop_row = self.transport.row;
            } else if self.transport.pattern_loop_count == 0 {
                self.transport.pattern_loop_count = marker;
                self.transport.row = self.transport.pattern_loop_row;
                self.row_cursor = u32::MAX;
            } else {
                self.transport.pattern_loop_count -= 1;
                if self.transport.pattern_loop_count > 0 {
                    self.transport.row = self.transport.pattern_loop_row;
                    self.row_cursor = u32::MAX;
                }
            }
        }
    }

    fn advance_transport(&mut self) {
        if self.row_cursor == u32::MAX {
            // A position-jump/pattern-break/pattern-loop effect already set
            // the destination row this tick; don't also fall through to
            // the ordinary end-of-row advance below.
            self.row_cursor = 0;
            self.transport.tick = 0;
            return;
        }
        self.transport.tick += 1;
        if self.transport.tick >= u16::from(self.transport.speed.max(1)) {
            self.transport.tick = 0;
            self.transport.row += 1;
            let pattern_index = self.module.pattern_at(usize::from(self.transport.order));
            let rows_in_pattern = pattern_index
                .and_then(|p| self.module.patterns.get(p))
                .map_or(0, |p| p.rows);
            if self.transport.row >= rows_in_pattern {
                self.transport.row = 0;
                self.transport.order = self.transport.order.saturating_add(1);
                if usize::from(self.transport.order) >= self.module.order_table.len() {
                    self.transport.order = self.module.restart_position;
                }
            }
        }
    }
}

fn merge_song_action(into: &mut SongAction, from: SongAction) {
    into.speed = from.speed.or(into.speed);
    into.bpm = from.bpm.or(into.bpm);
    into.position_jump = from.position_jump.or(into.position_jump);
    into.pattern_break = from.pattern_break.or(into.pattern_break);
    into.pattern_loop = from.pattern_loop.or(into.pattern_loop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use wav64::bitio::ByteWriter;

    struct RecordingSink {
        triggers: heapless::Vec<(u8, u16, u32), 32>,
        stops: heapless::Vec<u8, 32>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                triggers: heapless::Vec::new(),
                stops: heapless::Vec::new(),
            }
        }
    }

    impl VoiceSink for RecordingSink {
        fn trigger(&mut self, channel: u8, wav64_index: u16, seek_frame: u32) {
            let _ = self.triggers.push((channel, wav64_index, seek_frame));
        }
        fn set_frequency(&mut self, _channel: u8, _hz: f64) {}
        fn set_volume(&mut self, _channel: u8, _volume: u8, _panning: u8) {}
        fn stop(&mut self, channel: u8) {
            let _ = self.stops.push(channel);
        }
    }

    fn synth_module_bytes() -> heapless::Vec<u8, 512> {
        let mut w: ByteWriter<512> = ByteWriter::new();
        w.bytes(crate::module::MAGIC);
        w.u8(crate::module::VERSION);
        w.u8(1); // num_channels
        w.u16(1); // num_patterns
        w.u16(0); // num_instruments
        w.u16(1); // song_length
        w.u16(0); // restart_position
        w.u8(1); // flags
        w.u8(6); // default_speed
        w.u16(125); // default_bpm
        w.u8(0); // order_table[0]
        w.u16(2); // rows
        let patch = w.placeholder_u32();
        let start = w.len();
        w.u8(0x80 | 0x01); // row 0: note only
        w.u8(49);
        w.u8(0x80); // row 1: empty
        w.patch_u32(patch, start as u32);
        w.finish()
    }

    #[test]
    fn fresh_player_starts_at_song_origin() {
        let bytes = synth_module_bytes();
        let module = XmModule::parse(&bytes.as_slice()).expect("valid module");
        let player = Xm64Player::new(module, bytes, 32000);
        assert_eq!(player.position(), (0, 0));
    }

    #[test]
    fn first_tick_triggers_the_first_note() {
        let bytes = synth_module_bytes();
        let module = XmModule::parse(&bytes.as_slice()).expect("valid module");
        let mut player = Xm64Player::new(module, bytes, 32000);
        let mut sink = RecordingSink::new();
        let result = player.tick(&mut sink).expect("tick succeeds");
        assert!(result.is_some());
        assert_eq!(sink.triggers.len(), 1);
        assert_eq!(sink.triggers[0].0, 0);
    }

    #[test]
    fn stop_request_silences_every_channel_and_ends_playback() {
        let bytes = synth_module_bytes();
        let module = XmModule::parse(&bytes.as_slice()).expect("valid module");
        let mut player = Xm64Player::new(module, bytes, 32000);
        player.request_stop();
        let mut sink = RecordingSink::new();
        let result = player.tick(&mut sink).expect("tick succeeds");
        assert!(result.is_none());
        assert_eq!(sink.stops.as_slice(), &[0]);
    }
}
