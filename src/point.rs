use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::ir::{BinOp, InstrId, InstrKind, Module, Predicate};
use crate::store::ModuleId;

/// Identifier for a mutation operator, used for reporting and for junk
/// detection's choice of source visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperatorKind {
    ConditionalsBoundary,
    MathAdd,
    MathSub,

    /// Operators outside the built-in catalogue.
    Custom(&'static str),
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::ConditionalsBoundary => write!(f, "conditionals_boundary"),
            OperatorKind::MathAdd => write!(f, "math_add"),
            OperatorKind::MathSub => write!(f, "math_sub"),
            OperatorKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// A function addressed across the module store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionRef {
    pub module: ModuleId,
    pub index: usize,
}

/// Source position of a mutation point, recovered from the owning
/// module's source file name and the instruction's debug location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

/// The reversible rewrite a mutation point performs. Stores the original
/// and replacement opcode words; never a cloned instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Edit {
    BinaryOp { from: BinOp, to: BinOp },
    Predicate { from: Predicate, to: Predicate },
}

/// A fully specified pending edit to one instruction.
///
/// `apply` followed by `revert` is the identity on the IR. A point lives
/// for one pipeline iteration; at most one point targeting a given
/// instruction may be applied at a time.
#[derive(Debug, Clone, Serialize)]
pub struct MutationPoint {
    pub operator: OperatorKind,
    pub function: FunctionRef,
    pub instr: InstrId,
    pub edit: Edit,
    pub location: Option<SourceLocation>,

    #[serde(skip)]
    applied: bool,
}

impl MutationPoint {
    pub fn new(
        operator: OperatorKind,
        function: FunctionRef,
        instr: InstrId,
        edit: Edit,
        location: Option<SourceLocation>,
    ) -> Self {
        Self {
            operator,
            function,
            instr,
            edit,
            location,
            applied: false,
        }
    }

    /// Rewrite the target instruction in place.
    pub fn apply(&mut self, module: &mut Module) {
        debug_assert!(!self.applied, "mutation point applied twice");
        self.write(module, true);
        self.applied = true;
    }

    /// Restore the target instruction to its pre-apply form.
    pub fn revert(&mut self, module: &mut Module) {
        debug_assert!(self.applied, "revert without apply");
        self.write(module, false);
        self.applied = false;
    }

    fn write(&self, module: &mut Module, forward: bool) {
        let function = &mut module.functions[self.function.index];
        let kind = &mut function.instr_mut(self.instr).kind;

        match (kind, self.edit) {
            (InstrKind::Binary { op, .. }, Edit::BinaryOp { from, to }) => {
                let (expect, next) = if forward { (from, to) } else { (to, from) };
                debug_assert_eq!(*op, expect, "instruction no longer matches this point");
                *op = next;
            }
            (InstrKind::Icmp { pred, .. }, Edit::Predicate { from, to }) => {
                let (expect, next) = if forward { (from, to) } else { (to, from) };
                debug_assert_eq!(*pred, expect, "instruction no longer matches this point");
                *pred = next;
            }
            (_kind, _edit) => {
                debug_assert!(false, "edit {_edit:?} does not fit instruction {_kind:?}");
            }
        }
    }
}
