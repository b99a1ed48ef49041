//! Structural pattern matching over instruction streams
//!
//! A [`Pattern`] is a contiguous run of predicates; a [`PatternChain`]
//! strings patterns together so that each stage begins matching at or
//! after the end of the previous stage's span. Matching scans left to
//! right and always prefers the leftmost qualifying run, and occurrences
//! of a chain never overlap.
//!
//! A chain that matches nothing is a structural mismatch with the host
//! (wrong host version, moved landmark) and surfaces as the fatal
//! [`WeaveError::NoMatch`] - it is never treated as recoverable.

use super::WeaveError;
use super::instr::{FieldRef, Instr, MethodRef, Opcode};

/// Pure structural test over a single instruction
///
/// Each predicate accepts or rejects exactly one instruction; there is no
/// lookahead inside a predicate.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Opcode tag equals
    Op(Opcode),
    /// Call or virtual call to this method
    Calls(MethodRef),
    /// Load of this field
    LoadsField(FieldRef),
    /// Store to this field
    StoresField(FieldRef),
    /// Argument load; `None` accepts any slot
    LoadsArg(Option<u8>),
    /// i4 constant load with this value
    LoadsConst(i32),
    /// Instruction is a jump target
    HasLabel,
}

impl Predicate {
    pub fn matches(&self, instr: &Instr) -> bool {
        match self {
            Self::Op(opcode) => instr.opcode == *opcode,
            Self::Calls(method) => instr.calls(method),
            Self::LoadsField(field) => instr.loads_field(field),
            Self::StoresField(field) => instr.stores_field(field),
            Self::LoadsArg(None) => instr.loads_arg().is_some(),
            Self::LoadsArg(Some(slot)) => instr.loads_arg() == Some(*slot),
            Self::LoadsConst(value) => instr.loads_const(*value),
            Self::HasLabel => instr.has_labels(),
        }
    }
}

/// Contiguous, exact-length predicate run
///
/// Predicate `j` must accept the instruction at `start + j`; there are no
/// gaps inside a pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    predicates: Vec<Predicate>,
}

impl Pattern {
    /// # Panics
    ///
    /// An empty predicate list is a configuration bug, not a runtime
    /// condition, and panics.
    pub fn new(predicates: impl Into<Vec<Predicate>>) -> Self {
        let predicates = predicates.into();
        assert!(
            !predicates.is_empty(),
            "a pattern needs at least one predicate"
        );
        Self { predicates }
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Chain a follow-up pattern after this one
    pub fn then(self, next: Pattern) -> PatternChain {
        PatternChain::new(self).then(next)
    }

    /// All occurrences of this pattern alone, as a single-stage chain
    pub fn find_all(&self, stream: &[Instr]) -> MatchSet {
        PatternChain::new(self.clone()).find_all(stream)
    }

    /// First occurrence, or the fatal mismatch error
    pub fn find_first(&self, stream: &[Instr]) -> Result<MatchResult, WeaveError> {
        PatternChain::new(self.clone()).find_first(stream)
    }

    fn matches_at(&self, stream: &[Instr], at: usize) -> bool {
        // Short-circuits on the first rejection; selection is unaffected
        // because candidate starts are still visited left to right.
        self.predicates
            .iter()
            .enumerate()
            .all(|(j, predicate)| predicate.matches(&stream[at + j]))
    }
}

/// Ordered sequence of patterns matched stage by stage
#[derive(Debug, Clone)]
pub struct PatternChain {
    stages: Vec<Pattern>,
}

impl PatternChain {
    pub fn new(first: Pattern) -> Self {
        Self {
            stages: vec![first],
        }
    }

    pub fn then(mut self, next: Pattern) -> Self {
        self.stages.push(next);
        self
    }

    /// Every occurrence of the full chain, in stream order
    ///
    /// Stage 1 of an occurrence takes the leftmost qualifying run at or
    /// after the previous occurrence's final span; stage `k+1` resumes at
    /// or after the end of stage `k`'s span, with arbitrary instructions
    /// allowed in between stages. Returned occurrences never overlap.
    pub fn find_all(&self, stream: &[Instr]) -> MatchSet {
        let mut occurrences = Vec::new();
        let mut pos = 0;

        'scan: loop {
            let mut spans = Vec::with_capacity(self.stages.len());
            let mut cursor = pos;

            for stage in &self.stages {
                let Some(start) = find_run(stream, stage, cursor) else {
                    // A later stage that matches nowhere forward cannot
                    // match for any later stage-1 start either.
                    break 'scan;
                };
                let span = MatchSpan {
                    start,
                    end: start + stage.len(),
                };
                cursor = span.end;
                spans.push(span);
            }

            pos = cursor;
            occurrences.push(MatchResult { spans });
        }

        MatchSet { occurrences }
    }

    /// First occurrence of the full chain
    ///
    /// # Errors
    ///
    /// [`WeaveError::NoMatch`] when the chain has no occurrence; the
    /// caller is expected to abort the weave.
    pub fn find_first(&self, stream: &[Instr]) -> Result<MatchResult, WeaveError> {
        self.find_all(stream).into_first()
    }
}

/// Leftmost start at or after `from` where the pattern's run matches
fn find_run(stream: &[Instr], pattern: &Pattern, from: usize) -> Option<usize> {
    let len = pattern.len();
    if stream.len() < len {
        return None;
    }
    (from..=stream.len() - len).find(|&start| pattern.matches_at(stream, start))
}

/// Half-open index range of one matched stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    /// Exclusive
    pub end: usize,
}

/// One occurrence of a chain: one span per stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    spans: Vec<MatchSpan>,
}

impl MatchResult {
    /// Span of the given stage
    ///
    /// # Panics
    ///
    /// Panics when `stage` is out of range; stage counts are fixed by the
    /// chain that produced this result.
    pub fn span(&self, stage: usize) -> MatchSpan {
        self.spans[stage]
    }

    pub fn spans(&self) -> &[MatchSpan] {
        &self.spans
    }
}

/// All occurrences of a chain in one stream, in stream order
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    occurrences: Vec<MatchResult>,
}

impl MatchSet {
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchResult> {
        self.occurrences.iter()
    }

    /// First occurrence, or the fatal mismatch error
    pub fn first(&self) -> Result<&MatchResult, WeaveError> {
        self.occurrences.first().ok_or(WeaveError::NoMatch)
    }

    fn into_first(mut self) -> Result<MatchResult, WeaveError> {
        if self.occurrences.is_empty() {
            return Err(WeaveError::NoMatch);
        }
        Ok(self.occurrences.swap_remove(0))
    }
}

impl IntoIterator for MatchSet {
    type Item = MatchResult;
    type IntoIter = std::vec::IntoIter<MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.occurrences.into_iter()
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a MatchResult;
    type IntoIter = std::slice::Iter<'a, MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
