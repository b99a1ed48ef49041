//! Weave plans for the instrumented routines
//!
//! One plan per target routine: the pattern chains that locate its
//! landmarks and the call sequences inserted at each stage end. All host
//! bindings resolve once, up front, against the symbol table; all
//! insertion points are recorded against the original stream and applied
//! in a single pass. [`install`] drives the five plans and commits the
//! woven streams only when every one of them succeeds, so a structural
//! mismatch anywhere leaves the host image completely untouched.
//!
//! The inserted sequences push the host's own locals, arguments, and
//! fields before calling a dispatcher entry point, mirroring what the
//! surrounding routine has in hand at that landmark.

use crate::host::{HostImage, RoutineId, SymbolTable};
use crate::weave::{
    DeferredInsertions, FieldRef, Instr, MethodRef, Opcode, Pattern, PatternChain, Predicate,
    WeaveError,
};

/// Owner name carried by the woven calls to dispatcher entry points
pub const HOOK_OWNER: &str = "GameplayEvents";

/// Host value stored to `release_state` when a liftoff fails
const RELEASE_STATE_FAILED: i32 = 5;

/// Method reference for a dispatcher signal entry point
pub fn hook(name: &str) -> MethodRef {
    MethodRef::new(HOOK_OWNER, name)
}

/// Host symbols the weave plans reference, resolved once at startup
#[derive(Debug, Clone)]
pub struct Bindings {
    drop_multiplier: MethodRef,
    add_score_if_possible: MethodRef,
    allow_error_to_occur: MethodRef,
    note_end_note_index: FieldRef,
    freestyle_first_note_index: FieldRef,
    freestyle_end_note_index: FieldRef,
    freestyle_has_entered: FieldRef,
    freestyle_release_state: FieldRef,
    tap_score: FieldRef,
    spinner_note_index: FieldRef,
    scratch_note_index: FieldRef,
    spin_failed_initial: FieldRef,
}

impl Bindings {
    /// Resolve every required host symbol
    ///
    /// # Errors
    ///
    /// Fails fast with [`WeaveError::MissingMethod`] or
    /// [`WeaveError::MissingField`] on the first symbol the host build
    /// does not expose; nothing is woven in that case.
    pub fn resolve(symbols: &SymbolTable) -> Result<Self, WeaveError> {
        let method = |owner: &str, name: &str| {
            symbols
                .method(owner, name)
                .ok_or_else(|| WeaveError::MissingMethod {
                    owner: owner.into(),
                    name: name.into(),
                })
        };
        let field = |owner: &str, name: &str| {
            symbols
                .field(owner, name)
                .ok_or_else(|| WeaveError::MissingField {
                    owner: owner.into(),
                    name: name.into(),
                })
        };

        Ok(Self {
            drop_multiplier: method("ScoreState", "drop_multiplier")?,
            add_score_if_possible: method("GameplayLogic", "add_score_if_possible")?,
            allow_error_to_occur: method("GameplayLogic", "allow_error_to_occur")?,
            note_end_note_index: field("Note", "end_note_index")?,
            freestyle_first_note_index: field("FreestyleSection", "first_note_index")?,
            freestyle_end_note_index: field("FreestyleSection", "end_note_index")?,
            freestyle_has_entered: field("FreestyleSectionState", "has_entered")?,
            freestyle_release_state: field("FreestyleSectionState", "release_state")?,
            tap_score: field("GameplayVariables", "tap_score")?,
            spinner_note_index: field("SpinnerSection", "note_index")?,
            scratch_note_index: field("ScratchSection", "note_index")?,
            spin_failed_initial: field("SpinSectionState", "failed_initial_spin")?,
        })
    }
}

/// Weave every target routine, committing only when all of them succeed
///
/// # Errors
///
/// Any structural mismatch aborts the whole weave; the host image is left
/// exactly as supplied and the instrumentation is simply not installed.
pub fn install(image: &mut HostImage, bindings: &Bindings) -> Result<(), WeaveError> {
    let mut woven = Vec::with_capacity(RoutineId::ALL.len());

    for id in RoutineId::ALL {
        let stream = image.routine(id).ok_or(WeaveError::MissingRoutine(id))?;
        let result = match id {
            RoutineId::TrackUpdate => weave_track_update(stream, bindings),
            RoutineId::UpdateNoteState => weave_update_note_state(stream, bindings),
            RoutineId::UpdateFreestyleSectionState => {
                weave_update_freestyle_section_state(stream, bindings)
            }
            RoutineId::UpdateSpinSectionState => weave_update_spin_section_state(stream, bindings),
            RoutineId::UpdateScratchSectionState => {
                weave_update_scratch_section_state(stream, bindings)
            }
        };

        match result {
            Ok(new_stream) => {
                tracing::info!(
                    routine = %id,
                    before = stream.len(),
                    after = new_stream.len(),
                    "routine woven"
                );
                woven.push((id, new_stream));
            }
            Err(err) => {
                tracing::error!(
                    routine = %id,
                    error = %err,
                    "weave aborted; instrumentation not installed"
                );
                return Err(err);
            }
        }
    }

    for (id, stream) in woven {
        image.insert_routine(id, stream);
    }
    Ok(())
}

/// Single-predicate pattern: call to this method
fn calls(method: &MethodRef) -> Pattern {
    Pattern::new([Predicate::Calls(method.clone())])
}

/// The host's error bookkeeping: allow-error call with its result popped
fn error_flush(bindings: &Bindings) -> Pattern {
    Pattern::new([
        Predicate::Calls(bindings.allow_error_to_occur.clone()),
        Predicate::Op(Opcode::Pop),
    ])
}

/// Scoring call sites: a `this` load somewhere before the score call
fn score_call(bindings: &Bindings) -> PatternChain {
    Pattern::new([Predicate::LoadsArg(Some(0))]).then(calls(&bindings.add_score_if_possible))
}

/// Per-frame update: the only multiplier drop is the overbeat penalty
fn weave_track_update(stream: &[Instr], bindings: &Bindings) -> Result<Vec<Instr>, WeaveError> {
    let drop = calls(&bindings.drop_multiplier).find_first(stream)?;

    let mut insertions = DeferredInsertions::new();
    insertions.add(drop.span(0).end, [Instr::call(hook("overbeat"))]);
    insertions.apply(stream)
}

/// Note-state update: simple hits, beat releases, beat hold ticks, and
/// the three miss flavors
fn weave_update_note_state(
    stream: &[Instr],
    bindings: &Bindings,
) -> Result<Vec<Instr>, WeaveError> {
    let mut insertions = DeferredInsertions::new();

    for occurrence in score_call(bindings).find_all(stream) {
        let lead = occurrence.span(0);
        let end = occurrence.span(1).end;
        match stream[lead.start + 1].loads_local() {
            // Short-form local load: the points-to-add path scores a plain note
            Some(slot) if slot >= 4 => insertions.add(
                end,
                [
                    Instr::ldarg(2),  // noteIndex
                    Instr::ldloc(1),  // note
                    Instr::ldloc(7),  // timeOffset
                    Instr::call(hook("normal_note_hit")),
                ],
            ),
            // gameplayVariables feeds the beat-release path
            Some(3) => insertions.add(
                end,
                [
                    Instr::ldloc(1), // note
                    Instr::ldfld(bindings.note_end_note_index.clone()),
                    Instr::ldloc(42), // endNote
                    Instr::ldloc(46), // beatTimeOffset
                    Instr::call(hook("beat_release_hit")),
                ],
            ),
            // Constant score: one sustain tick on a paired beat hold
            _ => insertions.add(
                end,
                [
                    Instr::ldarg(2), // noteIndex
                    Instr::ldloc(1), // note
                    Instr::ldfld(bindings.note_end_note_index.clone()),
                    Instr::ldloc(1),  // note
                    Instr::ldloc(42), // endNote
                    Instr::call(hook("beat_hold_tick")),
                ],
            ),
        }
    }

    for occurrence in calls(&bindings.drop_multiplier).find_all(stream) {
        let span = occurrence.span(0);
        // A branch four slots back guards the plain-miss drop; the
        // unguarded drop is a broken beat hold.
        if span.start >= 4 && stream[span.start - 4].is_branch() {
            insertions.add(
                span.end,
                [
                    Instr::ldloc(1), // note
                    Instr::ldfld(bindings.note_end_note_index.clone()),
                    Instr::ldloc(42), // endNote
                    Instr::call(hook("note_miss")),
                ],
            );
        } else {
            insertions.add(
                span.end,
                [
                    Instr::ldarg(2), // noteIndex
                    Instr::ldloc(1), // note
                    Instr::ldfld(bindings.note_end_note_index.clone()),
                    Instr::ldloc(1),  // note
                    Instr::ldloc(42), // endNote
                    Instr::call(hook("beat_hold_miss")),
                ],
            );
        }
    }

    for occurrence in error_flush(bindings).find_all(stream) {
        insertions.add(
            occurrence.span(0).end,
            [
                Instr::ldarg(2), // noteIndex
                Instr::ldloc(1), // note
                Instr::call(hook("beat_miss")),
            ],
        );
    }

    insertions.apply(stream)
}

/// Freestyle-section update: hold entry/liftoff hits, sustain ticks, and
/// the entered/un-entered failure split
fn weave_update_freestyle_section_state(
    stream: &[Instr],
    bindings: &Bindings,
) -> Result<Vec<Instr>, WeaveError> {
    let mut insertions = DeferredInsertions::new();

    for occurrence in score_call(bindings).find_all(stream) {
        let start = occurrence.span(0).start;
        let end = occurrence.span(1).end;
        match stream[start + 1].loads_local() {
            Some(slot) if slot >= 4 => {
                if stream[start + 2].loads_field(&bindings.tap_score) {
                    // Scoring the tap value: the hold was entered on time
                    insertions.add(
                        end,
                        [
                            Instr::ldloc(6), // section
                            Instr::ldfld(bindings.freestyle_first_note_index.clone()),
                            Instr::ldloc(6), // section
                            Instr::ldfld(bindings.freestyle_end_note_index.clone()),
                            Instr::ldloc(50), // timeOffset
                            Instr::call(hook("hold_hit")),
                        ],
                    );
                } else {
                    insertions.add(
                        end,
                        [
                            Instr::ldloc(6), // section
                            Instr::ldfld(bindings.freestyle_end_note_index.clone()),
                            Instr::ldloc(53), // liftoff timeOffset
                            Instr::call(hook("liftoff_hit")),
                        ],
                    );
                }
            }
            _ => insertions.add(
                end,
                [
                    Instr::ldloc(6), // section
                    Instr::ldfld(bindings.freestyle_first_note_index.clone()),
                    Instr::ldloc(6), // section
                    Instr::ldfld(bindings.freestyle_end_note_index.clone()),
                    Instr::call(hook("hold_tick")),
                ],
            ),
        }
    }

    // The failure path rejoins at a labeled instruction after the error
    // bookkeeping; that is where the section state is still in scope.
    let miss = error_flush(bindings)
        .then(Pattern::new([Predicate::HasLabel]))
        .find_first(stream)?;
    insertions.add(
        miss.span(1).end,
        [
            Instr::ldloc(6), // section
            Instr::ldfld(bindings.freestyle_first_note_index.clone()),
            Instr::ldloc(6), // section
            Instr::ldfld(bindings.freestyle_end_note_index.clone()),
            Instr::ldarg(4), // state
            Instr::ldfld(bindings.freestyle_has_entered.clone()),
            Instr::call(hook("hold_miss")),
        ],
    );

    let liftoff = Pattern::new([
        Predicate::LoadsArg(None), // state
        Predicate::LoadsConst(RELEASE_STATE_FAILED),
        Predicate::StoresField(bindings.freestyle_release_state.clone()),
    ])
    .find_first(stream)?;
    insertions.add(
        liftoff.span(0).end,
        [
            Instr::ldloc(6), // section
            Instr::ldfld(bindings.freestyle_end_note_index.clone()),
            Instr::call(hook("liftoff_miss")),
        ],
    );

    insertions.apply(stream)
}

/// Spin-section update: completion hits, sustain ticks, and the
/// initial-vs-mid-spin failure split
fn weave_update_spin_section_state(
    stream: &[Instr],
    bindings: &Bindings,
) -> Result<Vec<Instr>, WeaveError> {
    let mut insertions = DeferredInsertions::new();

    for occurrence in score_call(bindings).find_all(stream) {
        let start = occurrence.span(0).start;
        let end = occurrence.span(1).end;
        // The spins counter feeds the completion path; everything else ticks
        let signal = if stream[start + 1].loads_local() == Some(2) {
            "spin_hit"
        } else {
            "spin_tick"
        };
        insertions.add(
            end,
            [
                Instr::ldloc(3), // section
                Instr::ldfld(bindings.spinner_note_index.clone()),
                Instr::ldloc(4), // note
                Instr::call(hook(signal)),
            ],
        );
    }

    let miss = error_flush(bindings).find_first(stream)?;
    insertions.add(
        miss.span(0).end,
        [
            Instr::ldloc(3), // section
            Instr::ldfld(bindings.spinner_note_index.clone()),
            Instr::ldloc(4), // note
            Instr::ldarg(4), // state
            Instr::ldfld(bindings.spin_failed_initial.clone()),
            Instr::call(hook("spin_miss")),
        ],
    );

    insertions.apply(stream)
}

/// Scratch-section update: one tick site, one failure site
fn weave_update_scratch_section_state(
    stream: &[Instr],
    bindings: &Bindings,
) -> Result<Vec<Instr>, WeaveError> {
    let mut insertions = DeferredInsertions::new();

    let tick = calls(&bindings.add_score_if_possible).find_first(stream)?;
    insertions.add(
        tick.span(0).end,
        [
            Instr::ldloc(2), // section
            Instr::ldfld(bindings.scratch_note_index.clone()),
            Instr::call(hook("scratch_tick")),
        ],
    );

    let miss = calls(&bindings.drop_multiplier).find_first(stream)?;
    insertions.add(
        miss.span(0).end,
        [
            Instr::ldloc(2), // section
            Instr::ldfld(bindings.scratch_note_index.clone()),
            Instr::call(hook("scratch_miss")),
        ],
    );

    insertions.apply(stream)
}
