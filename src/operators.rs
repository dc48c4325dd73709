use crate::ir::{BinOp, InstrId, InstrKind, Module};
use crate::point::{Edit, FunctionRef, MutationPoint, OperatorKind, SourceLocation};

/// A pluggable mutation operator. Scans are pure: they read the function
/// body and emit pending edits without touching the IR.
pub trait MutationOperator {
    fn kind(&self) -> OperatorKind;

    /// Candidate points for one function, ordered by instruction index.
    fn scan(&self, module: &Module, function: FunctionRef) -> Vec<MutationPoint>;
}

/// The built-in catalogue, in registration order.
pub fn default_operators() -> Vec<Box<dyn MutationOperator>> {
    vec![
        Box::new(ConditionalsBoundary),
        Box::new(MathAdd),
        Box::new(MathSub),
    ]
}

fn source_location(module: &Module, function: FunctionRef, id: InstrId) -> Option<SourceLocation> {
    let path = module.source_file.as_ref()?;
    let loc = module.functions[function.index].instr(id).loc?;
    Some(SourceLocation {
        path: path.clone(),
        line: loc.line,
        column: loc.column,
    })
}

/// Rewrites strict integer comparisons to non-strict and vice versa
/// (`<` ↔ `<=`, `>` ↔ `>=`). Equality comparisons are left alone.
pub struct ConditionalsBoundary;

impl MutationOperator for ConditionalsBoundary {
    fn kind(&self) -> OperatorKind {
        OperatorKind::ConditionalsBoundary
    }

    fn scan(&self, module: &Module, function: FunctionRef) -> Vec<MutationPoint> {
        let mut points = Vec::new();

        for (i, instr) in module.functions[function.index].instrs.iter().enumerate() {
            let InstrKind::Icmp { pred, .. } = instr.kind else {
                continue;
            };
            let Some(counterpart) = pred.boundary_counterpart() else {
                continue;
            };

            let id = InstrId(i as u32);
            points.push(MutationPoint::new(
                self.kind(),
                function,
                id,
                Edit::Predicate {
                    from: pred,
                    to: counterpart,
                },
                source_location(module, function, id),
            ));
        }

        points
    }
}

fn binary_rewrites(
    module: &Module,
    function: FunctionRef,
    kind: OperatorKind,
    rewrite: fn(BinOp) -> Option<BinOp>,
) -> Vec<MutationPoint> {
    let mut points = Vec::new();

    for (i, instr) in module.functions[function.index].instrs.iter().enumerate() {
        let InstrKind::Binary { op, .. } = instr.kind else {
            continue;
        };
        let Some(to) = rewrite(op) else { continue };

        let id = InstrId(i as u32);
        points.push(MutationPoint::new(
            kind,
            function,
            id,
            Edit::BinaryOp { from: op, to },
            source_location(module, function, id),
        ));
    }

    points
}

/// Replaces additions with subtractions of the same operands. The IR
/// forms of `+=` and `++` are add instructions and are covered by the
/// same rewrite.
pub struct MathAdd;

impl MutationOperator for MathAdd {
    fn kind(&self) -> OperatorKind {
        OperatorKind::MathAdd
    }

    fn scan(&self, module: &Module, function: FunctionRef) -> Vec<MutationPoint> {
        binary_rewrites(module, function, self.kind(), |op| match op {
            BinOp::Add => Some(BinOp::Sub),
            BinOp::FAdd => Some(BinOp::FSub),
            _ => None,
        })
    }
}

/// Symmetric to `MathAdd`: subtractions become additions.
pub struct MathSub;

impl MutationOperator for MathSub {
    fn kind(&self) -> OperatorKind {
        OperatorKind::MathSub
    }

    fn scan(&self, module: &Module, function: FunctionRef) -> Vec<MutationPoint> {
        binary_rewrites(module, function, self.kind(), |op| match op {
            BinOp::Sub => Some(BinOp::Add),
            BinOp::FSub => Some(BinOp::FAdd),
            _ => None,
        })
    }
}
