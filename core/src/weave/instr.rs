//! Instruction model for instrumented routines
//!
//! One routine body is an ordered stream of [`Instr`] values; the index
//! into that stream is the sole addressing mechanism the weave uses.
//! Instructions read from the host are treated as immutable; instructions
//! the weave inserts are plain values constructed here.

use std::fmt;

use smallvec::SmallVec;

/// Identifier of a jump label attached to an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

/// Reference to a host method, compared structurally by owner and name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
}

impl MethodRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

/// Reference to a host field, compared structurally by owner and name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
}

impl FieldRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

/// Opcode tag
///
/// A closed set covering what the instrumented routines and their tests
/// actually contain. The weave never interprets these beyond structural
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Pop,
    Dup,
    Ret,
    Call,
    Callvirt,
    Newobj,
    Ldarg,
    Ldloc,
    Stloc,
    Ldfld,
    Stfld,
    LdcI4,
    LdcR4,
    Br,
    BrTrue,
    BrFalse,
    Switch,
}

impl Opcode {
    /// Whether this tag transfers control
    pub fn is_branch(self) -> bool {
        matches!(self, Self::Br | Self::BrTrue | Self::BrFalse | Self::Switch)
    }
}

/// Typed operand carried by an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Method(MethodRef),
    Field(FieldRef),
    Local(u8),
    Arg(u8),
    Int(i32),
    Float(f32),
}

/// One instruction in a routine's stream
///
/// Branch targets are metadata alongside the opcode; an instruction whose
/// opcode is a branch reports [`Instr::is_branch`] even when its targets
/// were not recoverable from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub opcode: Opcode,
    pub operand: Option<Operand>,
    pub labels: SmallVec<[LabelId; 2]>,
    pub branch_targets: SmallVec<[LabelId; 1]>,
}

impl Instr {
    /// Bare instruction with no operand
    pub fn op(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: None,
            labels: SmallVec::new(),
            branch_targets: SmallVec::new(),
        }
    }

    /// Call to the given method
    pub fn call(method: MethodRef) -> Self {
        Self {
            operand: Some(Operand::Method(method)),
            ..Self::op(Opcode::Call)
        }
    }

    /// Field load
    pub fn ldfld(field: FieldRef) -> Self {
        Self {
            operand: Some(Operand::Field(field)),
            ..Self::op(Opcode::Ldfld)
        }
    }

    /// Field store
    pub fn stfld(field: FieldRef) -> Self {
        Self {
            operand: Some(Operand::Field(field)),
            ..Self::op(Opcode::Stfld)
        }
    }

    /// Local variable load
    pub fn ldloc(slot: u8) -> Self {
        Self {
            operand: Some(Operand::Local(slot)),
            ..Self::op(Opcode::Ldloc)
        }
    }

    /// Argument load
    pub fn ldarg(slot: u8) -> Self {
        Self {
            operand: Some(Operand::Arg(slot)),
            ..Self::op(Opcode::Ldarg)
        }
    }

    /// i4 constant load
    pub fn ldc_i4(value: i32) -> Self {
        Self {
            operand: Some(Operand::Int(value)),
            ..Self::op(Opcode::LdcI4)
        }
    }

    /// Branch with a known target
    pub fn branch(opcode: Opcode, target: LabelId) -> Self {
        debug_assert!(opcode.is_branch(), "branch constructor needs a branch tag");
        let mut instr = Self::op(opcode);
        instr.branch_targets.push(target);
        instr
    }

    /// Attach a label, marking this instruction as a jump target
    pub fn with_label(mut self, label: LabelId) -> Self {
        self.labels.push(label);
        self
    }

    /// Exact test: call or virtual call to this method
    pub fn calls(&self, method: &MethodRef) -> bool {
        matches!(self.opcode, Opcode::Call | Opcode::Callvirt)
            && matches!(&self.operand, Some(Operand::Method(m)) if m == method)
    }

    /// Exact test: loads this field
    pub fn loads_field(&self, field: &FieldRef) -> bool {
        self.opcode == Opcode::Ldfld
            && matches!(&self.operand, Some(Operand::Field(f)) if f == field)
    }

    /// Exact test: stores to this field
    pub fn stores_field(&self, field: &FieldRef) -> bool {
        self.opcode == Opcode::Stfld
            && matches!(&self.operand, Some(Operand::Field(f)) if f == field)
    }

    /// Local slot this instruction loads, if it is a local load
    pub fn loads_local(&self) -> Option<u8> {
        match (self.opcode, &self.operand) {
            (Opcode::Ldloc, Some(Operand::Local(slot))) => Some(*slot),
            _ => None,
        }
    }

    /// Argument slot this instruction loads, if it is an argument load
    pub fn loads_arg(&self) -> Option<u8> {
        match (self.opcode, &self.operand) {
            (Opcode::Ldarg, Some(Operand::Arg(slot))) => Some(*slot),
            _ => None,
        }
    }

    /// Exact test: loads this i4 constant
    pub fn loads_const(&self, value: i32) -> bool {
        self.opcode == Opcode::LdcI4 && self.operand == Some(Operand::Int(value))
    }

    /// Whether this instruction transfers control
    pub fn is_branch(&self) -> bool {
        self.opcode.is_branch()
    }

    /// Whether any jump targets this instruction
    pub fn has_labels(&self) -> bool {
        !self.labels.is_empty()
    }
}
