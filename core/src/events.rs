//! Canonical gameplay events and the listener registry
//!
//! Events are constructed synchronously by the dispatcher, handed to
//! listeners by reference, and discarded; nothing retains them. The bus
//! is an explicit per-kind handler list: registration order is invocation
//! order, a handler may be registered any number of times, and no handler
//! can veto or stop propagation to the ones after it. Handler panics are
//! not caught here - they surface to the host's own error boundary.

use std::fmt;

use crate::host::Note;

/// Paired companion note closing a multi-note construct
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompanionNote {
    pub index: usize,
    pub note: Note,
}

/// Payload shared by hit, sustained-tick, miss, and sustained-failure
/// events
///
/// `time_offset` is only meaningful for hits; every other kind reports
/// zero. `end` is present exactly for paired/dual-index events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub note_index: usize,
    pub note: Note,
    pub end: Option<CompanionNote>,
    pub time_offset: f32,
}

type NoteHandler = Box<dyn FnMut(&NoteEvent)>;

/// Per-kind handler registries with synchronous fan-out
#[derive(Default)]
pub struct EventBus {
    note_hit: Vec<NoteHandler>,
    sustained_note_tick: Vec<NoteHandler>,
    overbeat: Vec<Box<dyn FnMut()>>,
    note_miss: Vec<NoteHandler>,
    sustained_note_failed: Vec<NoteHandler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A note was resolved successfully
    pub fn on_note_hit(&mut self, handler: impl FnMut(&NoteEvent) + 'static) {
        self.note_hit.push(Box::new(handler));
    }

    /// A sustained construct scored one per-frame tick
    pub fn on_sustained_note_tick(&mut self, handler: impl FnMut(&NoteEvent) + 'static) {
        self.sustained_note_tick.push(Box::new(handler));
    }

    /// The score multiplier dropped
    pub fn on_overbeat(&mut self, handler: impl FnMut() + 'static) {
        self.overbeat.push(Box::new(handler));
    }

    /// A note failed before being entered
    pub fn on_note_miss(&mut self, handler: impl FnMut(&NoteEvent) + 'static) {
        self.note_miss.push(Box::new(handler));
    }

    /// A sustained construct broke after being entered
    pub fn on_sustained_note_failed(&mut self, handler: impl FnMut(&NoteEvent) + 'static) {
        self.sustained_note_failed.push(Box::new(handler));
    }

    pub(crate) fn publish_note_hit(&mut self, event: &NoteEvent) {
        for handler in &mut self.note_hit {
            handler(event);
        }
    }

    pub(crate) fn publish_sustained_note_tick(&mut self, event: &NoteEvent) {
        for handler in &mut self.sustained_note_tick {
            handler(event);
        }
    }

    pub(crate) fn publish_overbeat(&mut self) {
        for handler in &mut self.overbeat {
            handler();
        }
    }

    pub(crate) fn publish_note_miss(&mut self, event: &NoteEvent) {
        for handler in &mut self.note_miss {
            handler(event);
        }
    }

    pub(crate) fn publish_sustained_note_failed(&mut self, event: &NoteEvent) {
        for handler in &mut self.sustained_note_failed {
            handler(event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("note_hit", &self.note_hit.len())
            .field("sustained_note_tick", &self.sustained_note_tick.len())
            .field("overbeat", &self.overbeat.len())
            .field("note_miss", &self.note_miss.len())
            .field("sustained_note_failed", &self.sustained_note_failed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::host::NoteKind;

    fn event() -> NoteEvent {
        NoteEvent {
            note_index: 0,
            note: Note::new(NoteKind::Tap),
            end: None,
            time_offset: 0.0,
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        for tag in ["first", "second", "third"] {
            let seen = Rc::clone(&seen);
            bus.on_note_hit(move |_| seen.borrow_mut().push(tag));
        }
        bus.publish_note_hit(&event());

        assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_same_handler_may_register_twice() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();

        for _ in 0..2 {
            let count = Rc::clone(&count);
            bus.on_overbeat(move || *count.borrow_mut() += 1);
        }
        bus.publish_overbeat();

        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_kinds_are_independent() {
        let hits = Rc::new(RefCell::new(0));
        let misses = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();

        {
            let hits = Rc::clone(&hits);
            bus.on_note_hit(move |_| *hits.borrow_mut() += 1);
        }
        {
            let misses = Rc::clone(&misses);
            bus.on_note_miss(move |_| *misses.borrow_mut() += 1);
        }

        bus.publish_note_miss(&event());
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(*misses.borrow(), 1);
    }
}
