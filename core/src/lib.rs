//! Notegraft Core - gameplay event instrumentation
//!
//! This crate observes the internal control flow of an externally-owned,
//! already-compiled rhythm game and republishes what it sees as a small,
//! typed event API. At load time it weaves calls into the host's
//! per-frame routines by structural pattern matching over their
//! instruction streams; at play time those calls arrive as raw signals
//! that are gated on the session lifecycle, reconstructed into canonical
//! events, and fanned out to listeners.
//!
//! # Architecture
//!
//! - [`weave`] - pattern matcher and deferred patch applier
//! - [`hooks`] - weave plans for the five instrumented routines
//! - [`host`] - structural boundary types for the target program
//! - [`GameplayEvents`] - session gate, event reconstruction, fan-out

pub mod events;
pub mod gameplay;
pub mod hooks;
pub mod host;
pub mod session;
pub mod weave;

#[cfg(test)]
mod integration;
#[cfg(test)]
pub mod test_utils;

// Re-export the event API
pub use events::{CompanionNote, EventBus, NoteEvent};
pub use gameplay::GameplayEvents;
pub use session::SessionGate;

// Re-export the weave surface
pub use hooks::{Bindings, HOOK_OWNER, hook, install};
pub use weave::{
    DeferredInsertions, FieldRef, Instr, LabelId, MatchResult, MatchSet, MatchSpan, MethodRef,
    Opcode, Operand, Pattern, PatternChain, Predicate, WeaveError,
};

// Re-export host boundary types
pub use host::{DrumEndType, HostImage, Note, NoteKind, RoutineId, SymbolTable, TrackData};
