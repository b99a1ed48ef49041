//! Session lifecycle gating
//!
//! A play session is the interval between a session-start notification
//! and the next return-to-selection or completion notification. Signals
//! woven into the host keep firing outside that interval (menus, replays
//! winding down); the gate is what drops them.

use std::rc::{Rc, Weak};

use crate::host::{Note, TrackData};

/// Process-wide "is a play session active" state
///
/// Holds the only mutable state the dispatcher reads: the active flag and
/// a non-owning handle to the host's note table. The handle is rebound on
/// every session start and cleared on session end; it is never consulted
/// while the gate is inactive.
#[derive(Debug, Default)]
pub struct SessionGate {
    playing: bool,
    table: Weak<TrackData>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the active state, binding the session's note table
    pub fn start(&mut self, table: &Rc<TrackData>) {
        self.table = Rc::downgrade(table);
        self.playing = true;
    }

    /// Leave the active state and invalidate the table handle
    pub fn stop(&mut self) {
        self.playing = false;
        self.table = Weak::new();
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Resolve a note by host index via the bound table
    ///
    /// Only meaningful while active. A negative index is the host's "no
    /// note" and resolves to `None` without complaint; a dead handle or an
    /// index the table cannot resolve is a landmark/payload defect - loud
    /// in development builds, logged and dropped in production.
    pub fn note(&self, index: i32) -> Option<Note> {
        debug_assert!(self.playing, "note lookup outside an active session");
        if index < 0 {
            return None;
        }

        let Some(table) = self.table.upgrade() else {
            debug_assert!(false, "note table handle dead during an active session");
            tracing::error!("note table handle dead during an active session");
            return None;
        };

        let note = table.note(index as usize);
        if note.is_none() {
            debug_assert!(false, "note index {index} does not resolve in the active table");
            tracing::error!(index, "note index does not resolve in the active table");
        }
        note
    }
}
