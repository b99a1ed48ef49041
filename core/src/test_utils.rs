//! Shared fixtures for weave and dispatch tests
//!
//! Synthetic host-shaped instruction streams: minimal routine bodies that
//! carry the same structural landmarks the weave plans look for in the
//! real host.

use crate::host::{HostImage, RoutineId, SymbolTable};
use crate::weave::{FieldRef, Instr, LabelId, MethodRef, Opcode, Operand};

/// Symbol table exposing every method and field the weave plans resolve
pub fn full_symbols() -> SymbolTable {
    let mut symbols = SymbolTable::new();
    symbols.register_method("ScoreState", "drop_multiplier");
    symbols.register_method("GameplayLogic", "add_score_if_possible");
    symbols.register_method("GameplayLogic", "allow_error_to_occur");
    symbols.register_field("Note", "end_note_index");
    symbols.register_field("FreestyleSection", "first_note_index");
    symbols.register_field("FreestyleSection", "end_note_index");
    symbols.register_field("FreestyleSectionState", "has_entered");
    symbols.register_field("FreestyleSectionState", "release_state");
    symbols.register_field("GameplayVariables", "tap_score");
    symbols.register_field("SpinnerSection", "note_index");
    symbols.register_field("ScratchSection", "note_index");
    symbols.register_field("SpinSectionState", "failed_initial_spin");
    symbols
}

fn drop_multiplier() -> Instr {
    Instr::call(MethodRef::new("ScoreState", "drop_multiplier"))
}

fn add_score() -> Instr {
    Instr::call(MethodRef::new("GameplayLogic", "add_score_if_possible"))
}

fn allow_error() -> Instr {
    Instr::call(MethodRef::new("GameplayLogic", "allow_error_to_occur"))
}

pub fn track_update_stream() -> Vec<Instr> {
    vec![
        Instr::op(Opcode::Nop),
        Instr::ldarg(0),
        drop_multiplier(),
        Instr::op(Opcode::Ret),
    ]
}

pub fn update_note_state_stream() -> Vec<Instr> {
    vec![
        Instr::ldarg(0), // 0: normal-hit score site
        Instr::ldloc(7),
        add_score(),
        Instr::ldarg(0), // 3: beat-release score site
        Instr::ldloc(3),
        add_score(),
        Instr::ldarg(0), // 6: beat-hold-tick score site
        Instr::ldc_i4(1),
        add_score(),
        Instr::branch(Opcode::BrFalse, LabelId(0)), // 9: guards the plain-miss drop
        Instr::op(Opcode::Nop),
        Instr::op(Opcode::Nop),
        Instr::op(Opcode::Nop),
        drop_multiplier(), // 13: branch four back
        Instr::op(Opcode::Nop),
        Instr::op(Opcode::Nop),
        Instr::op(Opcode::Nop),
        Instr::op(Opcode::Nop),
        drop_multiplier(), // 18: unguarded
        allow_error(),     // 19
        Instr::op(Opcode::Pop),
        Instr::op(Opcode::Ret),
    ]
}

pub fn update_freestyle_section_state_stream() -> Vec<Instr> {
    vec![
        Instr::ldarg(0), // 0: hold-hit score site
        Instr::ldloc(8),
        Instr::ldfld(FieldRef::new("GameplayVariables", "tap_score")),
        add_score(),
        Instr::ldarg(0), // 4: liftoff-hit score site
        Instr::ldloc(9),
        Instr::ldloc(10),
        add_score(),
        Instr::ldarg(0), // 8: hold-tick score site
        Instr::ldc_i4(1),
        add_score(),
        allow_error(), // 11
        Instr::op(Opcode::Pop),
        Instr::op(Opcode::Nop),
        Instr::op(Opcode::Nop).with_label(LabelId(1)), // 14: failure paths rejoin
        Instr::ldarg(4),                               // 15: release-state store
        Instr::ldc_i4(5),
        Instr::stfld(FieldRef::new("FreestyleSectionState", "release_state")),
        Instr::op(Opcode::Ret),
    ]
}

pub fn update_spin_section_state_stream() -> Vec<Instr> {
    vec![
        Instr::ldarg(0), // 0: completion score site
        Instr::ldloc(2),
        add_score(),
        Instr::ldarg(0), // 3: tick score site
        Instr::ldc_i4(1),
        add_score(),
        allow_error(), // 6
        Instr::op(Opcode::Pop),
        Instr::op(Opcode::Ret),
    ]
}

pub fn update_scratch_section_state_stream() -> Vec<Instr> {
    vec![
        add_score(), // 0
        Instr::op(Opcode::Nop),
        drop_multiplier(), // 2
        Instr::op(Opcode::Ret),
    ]
}

/// Host image carrying the full symbol table and all five routines
pub fn host_image() -> HostImage {
    let mut image = HostImage::new(full_symbols());
    image.insert_routine(RoutineId::TrackUpdate, track_update_stream());
    image.insert_routine(RoutineId::UpdateNoteState, update_note_state_stream());
    image.insert_routine(
        RoutineId::UpdateFreestyleSectionState,
        update_freestyle_section_state_stream(),
    );
    image.insert_routine(RoutineId::UpdateSpinSectionState, update_spin_section_state_stream());
    image.insert_routine(
        RoutineId::UpdateScratchSectionState,
        update_scratch_section_state_stream(),
    );
    image
}

/// Names of woven dispatcher calls, in stream order
pub fn hook_calls(stream: &[Instr]) -> Vec<String> {
    stream
        .iter()
        .filter_map(|instr| match &instr.operand {
            Some(Operand::Method(method)) if method.owner == crate::hooks::HOOK_OWNER => {
                Some(method.name.clone())
            }
            _ => None,
        })
        .collect()
}
