//! Host boundary types
//!
//! Structural descriptions of the instrumented program: note payloads,
//! the index-addressed note table, the identifiers of the routines the
//! weave targets, and the symbol registry the weave plans resolve
//! against. The core never interprets any of this beyond the predicates
//! and offsets handed to it; business rules stay on the host side.

use std::fmt;

use hashbrown::{HashMap, HashSet};

use crate::weave::{FieldRef, Instr, MethodRef};

/// Note category, as the host classifies its scored objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    Match,
    Tap,
    HoldStart,
    HoldEnd,
    DrumStart,
    DrumEnd,
    SectionContinuationOrEnd,
    SpinStart,
    ScratchStart,
}

/// How a drum section's closing note is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrumEndType {
    Hit,
    Release,
}

/// Note payload at the host boundary
///
/// Plain value copied out of the host's table; `end_note_index` keeps the
/// host's `-1` = none convention and is normalized by [`Note::end_note`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub kind: NoteKind,
    pub length: f32,
    pub end_note_index: i32,
    pub drum_end_type: DrumEndType,
}

impl Note {
    pub fn new(kind: NoteKind) -> Self {
        Self {
            kind,
            length: 0.0,
            end_note_index: -1,
            drum_end_type: DrumEndType::Hit,
        }
    }

    pub fn with_length(mut self, length: f32) -> Self {
        self.length = length;
        self
    }

    pub fn with_end(mut self, end_note_index: i32) -> Self {
        self.end_note_index = end_note_index;
        self
    }

    pub fn with_drum_end(mut self, drum_end_type: DrumEndType) -> Self {
        self.drum_end_type = drum_end_type;
        self
    }

    /// Companion note index, when this note closes with one
    pub fn end_note(&self) -> Option<usize> {
        (self.end_note_index >= 0).then_some(self.end_note_index as usize)
    }

    /// Whether the scored portion of this note carries its own timing
    ///
    /// Match notes, hold starts, section continuations, and drum ends
    /// scored as a release have no intrinsic timing; hit events for them
    /// report a zero offset regardless of what the host measured.
    pub fn carries_timing(&self) -> bool {
        match self.kind {
            NoteKind::Match | NoteKind::HoldStart | NoteKind::SectionContinuationOrEnd => false,
            NoteKind::DrumEnd => self.drum_end_type != DrumEndType::Release,
            _ => true,
        }
    }
}

/// Index-addressed note table, owned by the host for one session
///
/// The core only ever holds a non-owning handle to this (see
/// [`crate::session::SessionGate`]); the host rebinds it at each session
/// start.
#[derive(Debug, Default)]
pub struct TrackData {
    notes: Vec<Note>,
}

impl TrackData {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn note(&self, index: usize) -> Option<Note> {
        self.notes.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Target routines the weave instruments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineId {
    TrackUpdate,
    UpdateNoteState,
    UpdateFreestyleSectionState,
    UpdateSpinSectionState,
    UpdateScratchSectionState,
}

impl RoutineId {
    pub const ALL: [RoutineId; 5] = [
        RoutineId::TrackUpdate,
        RoutineId::UpdateNoteState,
        RoutineId::UpdateFreestyleSectionState,
        RoutineId::UpdateSpinSectionState,
        RoutineId::UpdateScratchSectionState,
    ];
}

impl fmt::Display for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TrackUpdate => "track_update",
            Self::UpdateNoteState => "update_note_state",
            Self::UpdateFreestyleSectionState => "update_freestyle_section_state",
            Self::UpdateSpinSectionState => "update_spin_section_state",
            Self::UpdateScratchSectionState => "update_scratch_section_state",
        };
        f.write_str(name)
    }
}

/// Method and field symbols the host build actually exposes
///
/// The typed shape of the target: weave plans resolve every symbol they
/// reference against this registry once, at startup, and fail fast on
/// anything missing rather than discovering the mismatch mid-weave.
#[derive(Debug, Default)]
pub struct SymbolTable {
    methods: HashSet<MethodRef>,
    fields: HashSet<FieldRef>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_method(&mut self, owner: &str, name: &str) -> MethodRef {
        let method = MethodRef::new(owner, name);
        self.methods.insert(method.clone());
        method
    }

    pub fn register_field(&mut self, owner: &str, name: &str) -> FieldRef {
        let field = FieldRef::new(owner, name);
        self.fields.insert(field.clone());
        field
    }

    pub fn method(&self, owner: &str, name: &str) -> Option<MethodRef> {
        self.methods.get(&MethodRef::new(owner, name)).cloned()
    }

    pub fn field(&self, owner: &str, name: &str) -> Option<FieldRef> {
        self.fields.get(&FieldRef::new(owner, name)).cloned()
    }
}

/// The instrumentable surface of the host
///
/// Symbol registry plus one instruction stream per target routine,
/// supplied once at weave time.
#[derive(Debug, Default)]
pub struct HostImage {
    pub symbols: SymbolTable,
    routines: HashMap<RoutineId, Vec<Instr>>,
}

impl HostImage {
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            routines: HashMap::new(),
        }
    }

    pub fn insert_routine(&mut self, id: RoutineId, stream: Vec<Instr>) {
        self.routines.insert(id, stream);
    }

    pub fn routine(&self, id: RoutineId) -> Option<&[Instr]> {
        self.routines.get(&id).map(Vec::as_slice)
    }
}
