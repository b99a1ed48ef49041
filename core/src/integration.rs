//! Integration tests for the instrumentation pipeline
//!
//! Covers the full weave across all five routines, the all-or-nothing
//! commit on structural mismatch, and session-bracketed event flow from
//! raw signals to published events.

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::gameplay::GameplayEvents;
    use crate::hooks::{Bindings, install};
    use crate::host::{DrumEndType, Note, NoteKind, RoutineId, TrackData};
    use crate::test_utils::{host_image, hook_calls, update_scratch_section_state_stream};
    use crate::weave::WeaveError;

    // ============================================================================
    // Weaving
    // ============================================================================

    #[test]
    fn test_install_weaves_every_routine() {
        let mut image = host_image();
        let bindings = Bindings::resolve(&image.symbols).unwrap();

        install(&mut image, &bindings).unwrap();

        let expected: [(RoutineId, usize); 5] = [
            (RoutineId::TrackUpdate, 1),
            (RoutineId::UpdateNoteState, 6),
            (RoutineId::UpdateFreestyleSectionState, 5),
            (RoutineId::UpdateSpinSectionState, 3),
            (RoutineId::UpdateScratchSectionState, 2),
        ];
        for (id, hooks) in expected {
            let woven = image.routine(id).unwrap();
            assert_eq!(hook_calls(woven).len(), hooks, "{id}");
        }
    }

    #[test]
    fn test_install_preserves_original_instructions() {
        let mut image = host_image();
        let bindings = Bindings::resolve(&image.symbols).unwrap();
        let original = crate::test_utils::update_note_state_stream();

        install(&mut image, &bindings).unwrap();

        // Every original instruction survives, in order
        let woven = image.routine(RoutineId::UpdateNoteState).unwrap();
        let mut remaining = original.iter();
        let mut next = remaining.next();
        for instr in woven {
            if Some(instr) == next {
                next = remaining.next();
            }
        }
        assert!(next.is_none());
    }

    #[test]
    fn test_install_is_all_or_nothing_on_landmark_mismatch() {
        let mut image = host_image();
        // Strip the scratch routine of its multiplier drop
        let mut sabotaged = update_scratch_section_state_stream();
        sabotaged.remove(2);
        image.insert_routine(RoutineId::UpdateScratchSectionState, sabotaged);

        let bindings = Bindings::resolve(&image.symbols).unwrap();
        let result = install(&mut image, &bindings);

        assert!(matches!(result, Err(WeaveError::NoMatch)));
        // Nothing was committed, not even the routines that would have woven
        for id in RoutineId::ALL {
            assert!(hook_calls(image.routine(id).unwrap()).is_empty(), "{id}");
        }
    }

    #[test]
    fn test_install_requires_every_routine_stream() {
        let mut image = crate::host::HostImage::new(crate::test_utils::full_symbols());
        let bindings = Bindings::resolve(&image.symbols).unwrap();

        let result = install(&mut image, &bindings);
        assert!(matches!(result, Err(WeaveError::MissingRoutine(_))));
    }

    // ============================================================================
    // Signal flow
    // ============================================================================

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Hit,
        Tick,
        Overbeat,
        Miss,
        Failed,
    }

    fn recording_dispatcher() -> (GameplayEvents, Rc<RefCell<Vec<Kind>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut events = GameplayEvents::new();

        let sink = Rc::clone(&log);
        events.on_note_hit(move |_| sink.borrow_mut().push(Kind::Hit));
        let sink = Rc::clone(&log);
        events.on_sustained_note_tick(move |_| sink.borrow_mut().push(Kind::Tick));
        let sink = Rc::clone(&log);
        events.on_overbeat(move || sink.borrow_mut().push(Kind::Overbeat));
        let sink = Rc::clone(&log);
        events.on_note_miss(move |_| sink.borrow_mut().push(Kind::Miss));
        let sink = Rc::clone(&log);
        events.on_sustained_note_failed(move |_| sink.borrow_mut().push(Kind::Failed));

        (events, log)
    }

    fn session_table() -> Rc<TrackData> {
        let mut notes = vec![Note::new(NoteKind::Tap); 10];
        notes[5] = Note::new(NoteKind::HoldStart).with_length(2.0).with_end(9);
        notes[9] = Note::new(NoteKind::HoldEnd);
        notes[3] = Note::new(NoteKind::DrumEnd).with_drum_end(DrumEndType::Release);
        Rc::new(TrackData::new(notes))
    }

    #[test]
    fn test_events_only_inside_session_brackets() {
        let (mut events, log) = recording_dispatcher();
        let table = session_table();

        // Before any session: everything drops
        events.normal_note_hit(0, Note::new(NoteKind::Tap), 0.01);
        events.overbeat();
        events.hold_miss(5, 9, true);
        assert!(log.borrow().is_empty());

        // First session
        events.session_started(&table);
        events.normal_note_hit(0, Note::new(NoteKind::Tap), 0.01);
        events.hold_tick(5, 9);
        events.session_completed();

        // Between sessions: drops again
        events.overbeat();
        events.scratch_miss(5);
        assert_eq!(*log.borrow(), vec![Kind::Hit, Kind::Tick]);

        // Second session works the same way
        events.practice_session_started(&table);
        events.overbeat();
        events.returned_to_selection();
        events.overbeat();
        assert_eq!(*log.borrow(), vec![Kind::Hit, Kind::Tick, Kind::Overbeat]);
    }

    #[test]
    fn test_entered_hold_failure_publishes_one_sustained_failure() {
        let (mut events, log) = recording_dispatcher();
        events.session_started(&session_table());

        events.hold_miss(5, 9, true);

        assert_eq!(*log.borrow(), vec![Kind::Failed]);
    }

    #[test]
    fn test_spin_failure_shape_depends_only_on_the_flag() {
        let (mut events, log) = recording_dispatcher();
        events.session_started(&session_table());
        let note = Note::new(NoteKind::SpinStart);

        events.spin_miss(2, note, true);
        events.spin_miss(2, note, false);

        assert_eq!(*log.borrow(), vec![Kind::Miss, Kind::Failed]);
    }

    #[test]
    fn test_full_pipeline_weave_then_signal() {
        // Weave first, then run a session against the woven image
        let mut image = host_image();
        let bindings = Bindings::resolve(&image.symbols).unwrap();
        install(&mut image, &bindings).unwrap();

        let (mut events, log) = recording_dispatcher();
        events.session_started(&session_table());

        // The host reaches the overbeat landmark in its update loop
        let woven = image.routine(RoutineId::TrackUpdate).unwrap();
        for instr in woven {
            if instr.calls(&crate::hooks::hook("overbeat")) {
                events.overbeat();
            }
        }
        events.session_completed();

        assert_eq!(*log.borrow(), vec![Kind::Overbeat]);
    }
}
