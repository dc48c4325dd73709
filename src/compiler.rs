use std::collections::BTreeMap;

use crate::error::CompileError;
use crate::ir::{Block, Constant, Function, InstrKind, Module, Operand, Terminator, Type};

/// The native-code image of one module at one point in time: a symbol
/// table mapping function names to their verified code.
///
/// Baseline objects are cached by the driver; mutant recompiles are
/// transient and dropped after one test invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    symbols: BTreeMap<String, Function>,
}

impl Object {
    pub fn resolve(&self, symbol: &str) -> Option<&Function> {
        self.symbols.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, &Function)> {
        self.symbols.iter().map(|(n, f)| (n.as_str(), f))
    }
}

/// Compiles a module into an `Object` representing exactly its current
/// IR. Holds no state between calls; caching is the caller's concern.
#[derive(Debug, Default)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, module: &Module) -> Result<Object, CompileError> {
        let mut symbols = BTreeMap::new();

        for function in &module.functions {
            verify(function)?;
            if symbols
                .insert(function.name.clone(), function.clone())
                .is_some()
            {
                return Err(CompileError::new(
                    &function.name,
                    "duplicate symbol in module",
                ));
            }
        }

        Ok(Object { symbols })
    }
}

/// What the verifier knows about an operand's type. Integer constants
/// are width-polymorphic; call results resolve across objects and stay
/// unknown here.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Inferred {
    AnyInt,
    Known(Type),
    Unknown,
}

impl Inferred {
    /// Acceptable where an integer is required.
    fn int_compatible(self) -> bool {
        match self {
            Inferred::AnyInt | Inferred::Unknown => true,
            Inferred::Known(t) => t.is_int(),
        }
    }

    /// Acceptable where a float is required.
    fn float_compatible(self) -> bool {
        match self {
            Inferred::Unknown => true,
            Inferred::AnyInt => false,
            Inferred::Known(t) => t.is_float(),
        }
    }
}

fn verify(f: &Function) -> Result<(), CompileError> {
    if f.blocks.is_empty() {
        return Err(CompileError::new(&f.name, "function has no entry block"));
    }

    let result_types = infer_results(f);

    for block in &f.blocks {
        for &id in &block.instrs {
            if id.index() >= f.instrs.len() {
                return Err(CompileError::new(&f.name, "instruction id out of range"));
            }
            verify_instr(f, &f.instrs[id.index()].kind, &result_types)?;
        }
        verify_terminator(f, block, &result_types)?;
    }

    Ok(())
}

/// Forward pass over the instruction pool assigning each instruction a
/// result type where one is statically known.
fn infer_results(f: &Function) -> Vec<Inferred> {
    let mut types = vec![Inferred::Unknown; f.instrs.len()];

    for (i, instr) in f.instrs.iter().enumerate() {
        types[i] = match &instr.kind {
            InstrKind::Binary { op, lhs, .. } => {
                if op.is_float() {
                    Inferred::Known(Type::F64)
                } else {
                    // Integer result takes the width of a typed operand.
                    match operand_type(f, *lhs, &types) {
                        Inferred::Known(t) if t.is_int() => Inferred::Known(t),
                        _ => Inferred::AnyInt,
                    }
                }
            }
            InstrKind::Icmp { .. } => Inferred::Known(Type::I1),
            InstrKind::Alloca { .. } => Inferred::Known(Type::Ptr),
            InstrKind::Load { ptr } => match ptr {
                Operand::Value(id) => match f.instrs.get(id.index()).map(|i| &i.kind) {
                    Some(InstrKind::Alloca { ty }) => Inferred::Known(*ty),
                    _ => Inferred::Unknown,
                },
                _ => Inferred::Unknown,
            },
            InstrKind::Call { .. } | InstrKind::Store { .. } => Inferred::Unknown,
        };
    }

    types
}

fn operand_type(f: &Function, operand: Operand, results: &[Inferred]) -> Inferred {
    match operand {
        Operand::Const(Constant::Int(_)) => Inferred::AnyInt,
        Operand::Const(Constant::Float(_)) => Inferred::Known(Type::F64),
        Operand::Const(Constant::Bool(_)) => Inferred::Known(Type::I1),
        Operand::Arg(i) => match f.params.get(i as usize) {
            Some(t) => Inferred::Known(*t),
            None => Inferred::Unknown,
        },
        Operand::Value(id) => results
            .get(id.index())
            .copied()
            .unwrap_or(Inferred::Unknown),
    }
}

fn verify_operand(f: &Function, operand: Operand) -> Result<(), CompileError> {
    match operand {
        Operand::Const(_) => Ok(()),
        Operand::Arg(i) => {
            if (i as usize) < f.params.len() {
                Ok(())
            } else {
                Err(CompileError::new(&f.name, "argument index out of range"))
            }
        }
        Operand::Value(id) => match f.instrs.get(id.index()) {
            Some(instr) if instr.kind.yields_value() => Ok(()),
            Some(_) => Err(CompileError::new(
                &f.name,
                "operand reads an instruction that yields no value",
            )),
            None => Err(CompileError::new(&f.name, "operand id out of range")),
        },
    }
}

fn verify_instr(
    f: &Function,
    kind: &InstrKind,
    results: &[Inferred],
) -> Result<(), CompileError> {
    match kind {
        InstrKind::Binary { op, lhs, rhs } => {
            verify_operand(f, *lhs)?;
            verify_operand(f, *rhs)?;

            let lt = operand_type(f, *lhs, results);
            let rt = operand_type(f, *rhs, results);

            if op.is_float() {
                if !lt.float_compatible() || !rt.float_compatible() {
                    return Err(CompileError::new(
                        &f.name,
                        "float opcode on non-float operand",
                    ));
                }
            } else {
                if !lt.int_compatible() || !rt.int_compatible() {
                    return Err(CompileError::new(
                        &f.name,
                        "integer opcode on non-integer operand",
                    ));
                }
                if let (Inferred::Known(a), Inferred::Known(b)) = (lt, rt) {
                    if a != b {
                        return Err(CompileError::new(&f.name, "operand width mismatch"));
                    }
                }
            }
            Ok(())
        }
        InstrKind::Icmp { lhs, rhs, .. } => {
            verify_operand(f, *lhs)?;
            verify_operand(f, *rhs)?;
            for operand in [*lhs, *rhs] {
                if !operand_type(f, operand, results).int_compatible() {
                    return Err(CompileError::new(&f.name, "icmp on non-integer operand"));
                }
            }
            Ok(())
        }
        InstrKind::Call { args, .. } => {
            for operand in args {
                verify_operand(f, *operand)?;
            }
            Ok(())
        }
        InstrKind::Alloca { .. } => Ok(()),
        InstrKind::Load { ptr } => {
            verify_operand(f, *ptr)?;
            verify_pointer(f, *ptr, results, "load through a non-pointer")
        }
        InstrKind::Store { ptr, value } => {
            verify_operand(f, *ptr)?;
            verify_operand(f, *value)?;
            verify_pointer(f, *ptr, results, "store through a non-pointer")
        }
    }
}

fn verify_pointer(
    f: &Function,
    ptr: Operand,
    results: &[Inferred],
    message: &str,
) -> Result<(), CompileError> {
    match operand_type(f, ptr, results) {
        Inferred::Unknown | Inferred::Known(Type::Ptr) => Ok(()),
        _ => Err(CompileError::new(&f.name, message)),
    }
}

fn verify_terminator(
    f: &Function,
    block: &Block,
    results: &[Inferred],
) -> Result<(), CompileError> {
    match &block.terminator {
        Terminator::Ret(value) => match (f.ret, value) {
            (Type::Void, None) => Ok(()),
            (Type::Void, Some(_)) => {
                Err(CompileError::new(&f.name, "void function returns a value"))
            }
            (_, None) => Err(CompileError::new(
                &f.name,
                "non-void function returns nothing",
            )),
            (ret, Some(operand)) => {
                verify_operand(f, *operand)?;
                match operand_type(f, *operand, results) {
                    Inferred::Known(t) if t != ret => {
                        Err(CompileError::new(&f.name, "return type mismatch"))
                    }
                    Inferred::AnyInt if !ret.is_int() => {
                        Err(CompileError::new(&f.name, "return type mismatch"))
                    }
                    _ => Ok(()),
                }
            }
        },
        Terminator::Br {
            cond,
            then_block,
            else_block,
        } => {
            verify_operand(f, *cond)?;
            if !operand_type(f, *cond, results).int_compatible() {
                return Err(CompileError::new(&f.name, "branch on a non-integer"));
            }
            for target in [then_block, else_block] {
                if target.index() >= f.blocks.len() {
                    return Err(CompileError::new(&f.name, "branch target out of range"));
                }
            }
            Ok(())
        }
        Terminator::Jump(target) => {
            if target.index() >= f.blocks.len() {
                return Err(CompileError::new(&f.name, "jump target out of range"));
            }
            Ok(())
        }
    }
}
