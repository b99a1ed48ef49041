//! Instruction-stream weaving engine
//!
//! The structural half of the crate: a pattern matcher that locates
//! landmarks in a routine's instruction stream, and a deferred-insertion
//! applier that rewrites the stream in one consistent pass. Weaving runs
//! exactly once, before the host begins normal execution; the engine
//! trusts that matched landmarks correspond to the intended semantic
//! locations and never interprets the host's code beyond the structural
//! predicates it is given.

mod insert;
mod instr;
mod pattern;

pub use insert::DeferredInsertions;
pub use instr::{FieldRef, Instr, LabelId, MethodRef, Opcode, Operand};
pub use pattern::{MatchResult, MatchSet, MatchSpan, Pattern, PatternChain, Predicate};

use crate::host::RoutineId;

/// Weave-time structural mismatch
///
/// Every variant is fatal: it signals that the host build has diverged
/// from the shape the weave plans expect, so the instrumentation is not
/// installed at all. None of these conditions is retried or recovered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeaveError {
    /// A required pattern chain found zero occurrences
    #[error("pattern chain matched no occurrence in the instruction stream")]
    NoMatch,

    /// An insertion was recorded outside the original stream
    #[error("insertion at index {at} is outside the stream (length {len})")]
    InsertionOutOfBounds { at: usize, len: usize },

    /// The host build does not expose a required method
    #[error("host build does not expose method {owner}::{name}")]
    MissingMethod { owner: String, name: String },

    /// The host build does not expose a required field
    #[error("host build does not expose field {owner}::{name}")]
    MissingField { owner: String, name: String },

    /// The host image carries no instruction stream for a target routine
    #[error("host image has no instruction stream for routine {0}")]
    MissingRoutine(RoutineId),
}
