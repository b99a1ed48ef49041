//! Deferred insertion of instructions at original-stream indices
//!
//! Insertion points are computed against the unmodified stream, so naive
//! immediate insertion would shift every later recorded index. The
//! applier instead buckets pending insertions by target index and rebuilds
//! the stream in a single pass, emitting each bucket immediately before
//! the instruction originally at that index.

use hashbrown::HashMap;

use super::WeaveError;
use super::instr::Instr;

/// Accumulated insertions against one original stream
#[derive(Debug, Default)]
pub struct DeferredInsertions {
    entries: Vec<(usize, Vec<Instr>)>,
}

impl DeferredInsertions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record instructions to insert before the instruction originally at
    /// `at`; `at` equal to the stream length appends at the end.
    ///
    /// Multiple insertions at the same index are emitted in add order.
    pub fn add(&mut self, at: usize, instructions: impl IntoIterator<Item = Instr>) {
        self.entries.push((at, instructions.into_iter().collect()));
    }

    /// Number of recorded insertions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Perform every recorded insertion in one rebuild pass
    ///
    /// The output preserves the relative order of original instructions
    /// exactly, and its length is the original length plus the total
    /// number of inserted instructions.
    ///
    /// # Errors
    ///
    /// [`WeaveError::InsertionOutOfBounds`] when any recorded index lies
    /// outside `[0, stream.len()]`. That can only arise from an
    /// inconsistent pattern match, so the caller aborts the weave.
    pub fn apply(&self, stream: &[Instr]) -> Result<Vec<Instr>, WeaveError> {
        let mut inserted = 0;
        for (at, instructions) in &self.entries {
            if *at > stream.len() {
                return Err(WeaveError::InsertionOutOfBounds {
                    at: *at,
                    len: stream.len(),
                });
            }
            inserted += instructions.len();
        }

        let mut buckets: HashMap<usize, Vec<&Instr>> = HashMap::new();
        for (at, instructions) in &self.entries {
            buckets.entry(*at).or_default().extend(instructions.iter());
        }

        let mut output = Vec::with_capacity(stream.len() + inserted);
        for (index, instr) in stream.iter().enumerate() {
            if let Some(pending) = buckets.get(&index) {
                output.extend(pending.iter().map(|instr| (*instr).clone()));
            }
            output.push(instr.clone());
        }
        if let Some(pending) = buckets.get(&stream.len()) {
            output.extend(pending.iter().map(|instr| (*instr).clone()));
        }

        Ok(output)
    }
}
