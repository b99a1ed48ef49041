//! Event reconstruction and dispatch
//!
//! The runtime half of the crate. The host calls the raw signal entry
//! points below from the landmarks woven into its routines; each call is
//! gated on the session lifecycle, classified into one of the five
//! canonical events, and fanned out synchronously through the bus.
//!
//! Signals carry either note payloads the host had in hand when the
//! landmark fired, or bare indices the dispatcher resolves through the
//! session's note table. A signal that arrives while no session is
//! active is dropped silently - that is expected at session boundaries.

use std::rc::Rc;

use crate::events::{CompanionNote, EventBus, NoteEvent};
use crate::host::{Note, NoteKind, TrackData};
use crate::session::SessionGate;

/// Session gate, event reconstruction, and listener fan-out in one place
///
/// All entry points run on the host's single execution thread; nothing
/// here suspends, blocks, or is called concurrently.
#[derive(Debug, Default)]
pub struct GameplayEvents {
    gate: SessionGate,
    bus: EventBus,
}

impl GameplayEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only "is a play session active" flag
    pub fn is_playing(&self) -> bool {
        self.gate.is_playing()
    }

    // ========================================================================
    // Lifecycle notifications from the host
    // ========================================================================

    pub fn session_started(&mut self, track_data: &Rc<TrackData>) {
        self.gate.start(track_data);
        tracing::info!(notes = track_data.len(), "session started");
    }

    pub fn practice_session_started(&mut self, track_data: &Rc<TrackData>) {
        self.gate.start(track_data);
        tracing::info!(notes = track_data.len(), "practice session started");
    }

    pub fn returned_to_selection(&mut self) {
        self.gate.stop();
        tracing::info!("returned to selection");
    }

    pub fn session_completed(&mut self) {
        self.gate.stop();
        tracing::info!("session completed");
    }

    // ========================================================================
    // Listener registration
    // ========================================================================

    pub fn on_note_hit(&mut self, handler: impl FnMut(&NoteEvent) + 'static) {
        self.bus.on_note_hit(handler);
    }

    pub fn on_sustained_note_tick(&mut self, handler: impl FnMut(&NoteEvent) + 'static) {
        self.bus.on_sustained_note_tick(handler);
    }

    pub fn on_overbeat(&mut self, handler: impl FnMut() + 'static) {
        self.bus.on_overbeat(handler);
    }

    pub fn on_note_miss(&mut self, handler: impl FnMut(&NoteEvent) + 'static) {
        self.bus.on_note_miss(handler);
    }

    pub fn on_sustained_note_failed(&mut self, handler: impl FnMut(&NoteEvent) + 'static) {
        self.bus.on_sustained_note_failed(handler);
    }

    /// Register debug-level log listeners for every event kind
    pub fn log_events(&mut self) {
        self.bus.on_note_hit(|event| {
            tracing::debug!(
                index = event.note_index,
                kind = ?event.note.kind,
                end = event.end.map(|end| end.index),
                offset = event.time_offset,
                "note hit"
            );
        });
        self.bus.on_sustained_note_tick(|event| {
            tracing::debug!(
                index = event.note_index,
                kind = ?event.note.kind,
                "sustained note tick"
            );
        });
        self.bus.on_overbeat(|| tracing::debug!("overbeat"));
        self.bus.on_note_miss(|event| {
            tracing::debug!(
                index = event.note_index,
                kind = ?event.note.kind,
                end = event.end.map(|end| end.index),
                "note miss"
            );
        });
        self.bus.on_sustained_note_failed(|event| {
            tracing::debug!(
                index = event.note_index,
                kind = ?event.note.kind,
                end = event.end.map(|end| end.index),
                "sustained note failed"
            );
        });
    }

    // ========================================================================
    // Raw hit signals
    // ========================================================================

    /// Simple note resolved by the note-state routine
    pub fn normal_note_hit(&mut self, note_index: i32, note: Note, time_offset: f32) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };

        if note.kind == NoteKind::Match {
            self.hit(note_index, note, None, 0.0);
        } else if note.length > 0.0 {
            let Some(end) = self.companion(note.end_note_index) else {
                return;
            };
            self.hit(note_index, note, Some(end), time_offset);
        } else {
            self.hit(note_index, note, None, time_offset);
        }
    }

    /// Drum-end release scored by the note-state routine
    pub fn beat_release_hit(&mut self, note_index: i32, note: Note, time_offset: f32) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };
        self.hit(note_index, note, None, time_offset);
    }

    /// Freestyle hold entered on time
    pub fn hold_hit(&mut self, note_index: i32, end_note_index: i32, time_offset: f32) {
        if !self.gate.is_playing() {
            return;
        }
        let Some((note_index, note)) = self.lookup(note_index) else {
            return;
        };
        let Some(end) = self.companion(end_note_index) else {
            return;
        };
        self.hit(note_index, note, Some(end), time_offset);
    }

    /// Freestyle hold released on time
    pub fn liftoff_hit(&mut self, note_index: i32, time_offset: f32) {
        if !self.gate.is_playing() {
            return;
        }
        let Some((note_index, note)) = self.lookup(note_index) else {
            return;
        };
        self.hit(note_index, note, None, time_offset);
    }

    /// Spin section completed
    pub fn spin_hit(&mut self, note_index: i32, note: Note) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };
        self.hit(note_index, note, None, 0.0);
    }

    // ========================================================================
    // Raw sustain-tick signals
    // ========================================================================

    /// Freestyle hold scored one frame of sustain
    pub fn hold_tick(&mut self, note_index: i32, end_note_index: i32) {
        if !self.gate.is_playing() {
            return;
        }
        let Some((note_index, note)) = self.lookup(note_index) else {
            return;
        };
        let Some(end) = self.companion(end_note_index) else {
            return;
        };
        self.tick(note_index, note, Some(end));
    }

    /// Paired beat hold scored one frame of sustain
    pub fn beat_hold_tick(
        &mut self,
        note_index: i32,
        end_note_index: i32,
        note: Note,
        end_note: Note,
    ) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };
        let Some(end_index) = signal_index(end_note_index) else {
            return;
        };
        self.tick(
            note_index,
            note,
            Some(CompanionNote {
                index: end_index,
                note: end_note,
            }),
        );
    }

    /// Spin section scored one frame of sustain
    pub fn spin_tick(&mut self, note_index: i32, note: Note) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };
        self.tick(note_index, note, None);
    }

    /// Scratch section scored one frame of sustain
    pub fn scratch_tick(&mut self, note_index: i32) {
        if !self.gate.is_playing() {
            return;
        }
        let Some((note_index, note)) = self.lookup(note_index) else {
            return;
        };
        self.tick(note_index, note, None);
    }

    // ========================================================================
    // Global penalty signal
    // ========================================================================

    /// Score multiplier dropped
    pub fn overbeat(&mut self) {
        if self.gate.is_playing() {
            self.bus.publish_overbeat();
        }
    }

    // ========================================================================
    // Raw miss signals
    // ========================================================================

    /// Simple note failed
    pub fn note_miss(&mut self, note_index: i32, note: Note) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };
        self.miss(note_index, note, None);
    }

    /// Beat note failed before its hold was entered
    pub fn beat_miss(&mut self, note_index: i32, note: Note) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };

        if note.length > 0.0 {
            let Some(end) = self.companion(note.end_note_index) else {
                return;
            };
            self.miss(note_index, note, Some(end));
        } else {
            self.miss(note_index, note, None);
        }
    }

    /// Paired beat hold broke after being entered
    pub fn beat_hold_miss(
        &mut self,
        note_index: i32,
        end_note_index: i32,
        note: Note,
        end_note: Note,
    ) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };
        let Some(end_index) = signal_index(end_note_index) else {
            return;
        };
        self.failed(
            note_index,
            note,
            Some(CompanionNote {
                index: end_index,
                note: end_note,
            }),
        );
    }

    /// Freestyle hold failed; `has_entered` picks the outcome path
    ///
    /// A failure before the hold was entered is an ordinary miss; a
    /// failure after entry breaks a sustained note. Exactly one event is
    /// published either way.
    pub fn hold_miss(&mut self, note_index: i32, end_note_index: i32, has_entered: bool) {
        if !self.gate.is_playing() {
            return;
        }
        let Some((note_index, note)) = self.lookup(note_index) else {
            return;
        };
        let Some(end) = self.companion(end_note_index) else {
            return;
        };

        if has_entered {
            self.failed(note_index, note, Some(end));
        } else {
            self.miss(note_index, note, Some(end));
        }
    }

    /// Freestyle liftoff failed at release
    pub fn liftoff_miss(&mut self, note_index: i32) {
        if !self.gate.is_playing() {
            return;
        }
        let Some((note_index, note)) = self.lookup(note_index) else {
            return;
        };
        self.miss(note_index, note, None);
    }

    /// Spin section failed; `failed_initial_spin` picks the outcome path
    pub fn spin_miss(&mut self, note_index: i32, note: Note, failed_initial_spin: bool) {
        if !self.gate.is_playing() {
            return;
        }
        let Some(note_index) = signal_index(note_index) else {
            return;
        };

        if failed_initial_spin {
            self.miss(note_index, note, None);
        } else {
            self.failed(note_index, note, None);
        }
    }

    /// Scratch section broke mid-sustain
    pub fn scratch_miss(&mut self, note_index: i32) {
        if !self.gate.is_playing() {
            return;
        }
        let Some((note_index, note)) = self.lookup(note_index) else {
            return;
        };
        self.failed(note_index, note, None);
    }

    // ========================================================================
    // Reconstruction helpers
    // ========================================================================

    /// Resolve a required note the signal references only by index
    fn lookup(&self, index: i32) -> Option<(usize, Note)> {
        let note = self.gate.note(index)?;
        Some((index as usize, note))
    }

    /// Resolve a required companion note by index
    fn companion(&self, index: i32) -> Option<CompanionNote> {
        let note = self.gate.note(index)?;
        Some(CompanionNote {
            index: index as usize,
            note,
        })
    }

    fn hit(&mut self, note_index: usize, note: Note, end: Option<CompanionNote>, time_offset: f32) {
        // Kinds without intrinsic timing always report a zero offset
        let time_offset = if note.carries_timing() { time_offset } else { 0.0 };
        self.bus.publish_note_hit(&NoteEvent {
            note_index,
            note,
            end,
            time_offset,
        });
    }

    fn tick(&mut self, note_index: usize, note: Note, end: Option<CompanionNote>) {
        self.bus.publish_sustained_note_tick(&NoteEvent {
            note_index,
            note,
            end,
            time_offset: 0.0,
        });
    }

    fn miss(&mut self, note_index: usize, note: Note, end: Option<CompanionNote>) {
        self.bus.publish_note_miss(&NoteEvent {
            note_index,
            note,
            end,
            time_offset: 0.0,
        });
    }

    fn failed(&mut self, note_index: usize, note: Note, end: Option<CompanionNote>) {
        self.bus.publish_sustained_note_failed(&NoteEvent {
            note_index,
            note,
            end,
            time_offset: 0.0,
        });
    }
}

/// Validate a non-negative index carried directly on a signal payload
///
/// A negative value here means the woven landmark handed over something
/// other than the expected slot - a defect, not a user-facing error.
fn signal_index(index: i32) -> Option<usize> {
    if index >= 0 {
        return Some(index as usize);
    }
    debug_assert!(false, "signal carried negative note index {index}");
    tracing::error!(index, "signal carried a negative note index; dropped");
    None
}
