use std::collections::HashMap;
use std::time::Instant;

use thiserror::Error;

use crate::ir::{BinOp, Constant, Function, InstrKind, Operand, Predicate, Terminator};

/// A runtime value in the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Ptr(usize),
    Unit,
}

/// Abnormal termination of an invocation. Every trap maps to an
/// `Invalid` execution result at the runner level.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Trap {
    #[error("unresolved symbol `{0}`")]
    UnresolvedSymbol(String),

    #[error("call to `{0}` with wrong argument count")]
    ArityMismatch(String),

    #[error("operand type mismatch at run time")]
    TypeError,

    #[error("read of an uninitialized stack slot")]
    UninitializedRead,

    #[error("use of a value before it was computed")]
    UseBeforeDef,

    #[error("step budget exhausted")]
    OutOfFuel,

    #[error("deadline expired")]
    DeadlineExpired,

    #[error("call depth exceeded")]
    CallDepthExceeded,
}

/// Symbol table of a linked object set.
pub type Symbols<'a> = HashMap<&'a str, &'a Function>;

const MAX_CALL_DEPTH: usize = 256;
const DEADLINE_CHECK_INTERVAL: u64 = 4096;

/// Run `entry` to completion against `symbols`.
///
/// `fuel` bounds the total instruction count across all frames so a
/// non-terminating mutant cannot hang the pipeline; `deadline` is the
/// optional wall-clock bound.
pub fn execute(
    symbols: &Symbols<'_>,
    entry: &Function,
    args: &[Value],
    fuel: u64,
    deadline: Option<Instant>,
) -> Result<Value, Trap> {
    let mut eval = Evaluator {
        symbols,
        fuel,
        deadline,
        until_deadline_check: DEADLINE_CHECK_INTERVAL,
    };
    eval.call(entry, args, 0)
}

struct Evaluator<'a> {
    symbols: &'a Symbols<'a>,
    fuel: u64,
    deadline: Option<Instant>,
    until_deadline_check: u64,
}

impl<'a> Evaluator<'a> {
    fn tick(&mut self) -> Result<(), Trap> {
        if self.fuel == 0 {
            return Err(Trap::OutOfFuel);
        }
        self.fuel -= 1;

        self.until_deadline_check -= 1;
        if self.until_deadline_check == 0 {
            self.until_deadline_check = DEADLINE_CHECK_INTERVAL;
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(Trap::DeadlineExpired);
                }
            }
        }
        Ok(())
    }

    fn call(&mut self, function: &Function, args: &[Value], depth: usize) -> Result<Value, Trap> {
        if depth > MAX_CALL_DEPTH {
            return Err(Trap::CallDepthExceeded);
        }
        if args.len() != function.params.len() {
            return Err(Trap::ArityMismatch(function.name.clone()));
        }

        let mut frame = Frame {
            values: vec![None; function.instrs.len()],
            slots: Vec::new(),
        };

        let mut block = &function.blocks[0];
        loop {
            for &id in &block.instrs {
                self.tick()?;
                let result = self.step(&function.instr(id).kind, args, &mut frame, depth)?;
                frame.values[id.index()] = result;
            }

            self.tick()?;
            match &block.terminator {
                Terminator::Ret(None) => return Ok(Value::Unit),
                Terminator::Ret(Some(operand)) => return frame.eval(*operand, args),
                Terminator::Jump(target) => block = function.block(*target),
                Terminator::Br {
                    cond,
                    then_block,
                    else_block,
                } => {
                    let taken = match frame.eval(*cond, args)? {
                        Value::Bool(b) => b,
                        Value::Int(n) => n != 0,
                        _ => return Err(Trap::TypeError),
                    };
                    block = function.block(if taken { *then_block } else { *else_block });
                }
            }
        }
    }

    fn step(
        &mut self,
        kind: &InstrKind,
        args: &[Value],
        frame: &mut Frame,
        depth: usize,
    ) -> Result<Option<Value>, Trap> {
        match kind {
            InstrKind::Binary { op, lhs, rhs } => {
                let l = frame.eval(*lhs, args)?;
                let r = frame.eval(*rhs, args)?;
                Ok(Some(apply_binop(*op, l, r)?))
            }
            InstrKind::Icmp { pred, lhs, rhs } => {
                let l = frame.eval(*lhs, args)?;
                let r = frame.eval(*rhs, args)?;
                Ok(Some(Value::Bool(apply_icmp(*pred, l, r)?)))
            }
            InstrKind::Call { callee, args: call_args } => {
                let target = self
                    .symbols
                    .get(callee.as_str())
                    .copied()
                    .ok_or_else(|| Trap::UnresolvedSymbol(callee.clone()))?;

                let mut values = Vec::with_capacity(call_args.len());
                for operand in call_args {
                    values.push(frame.eval(*operand, args)?);
                }
                Ok(Some(self.call(target, &values, depth + 1)?))
            }
            InstrKind::Alloca { .. } => {
                frame.slots.push(None);
                Ok(Some(Value::Ptr(frame.slots.len() - 1)))
            }
            InstrKind::Load { ptr } => match frame.eval(*ptr, args)? {
                Value::Ptr(slot) => frame
                    .slots
                    .get(slot)
                    .copied()
                    .flatten()
                    .map(Some)
                    .ok_or(Trap::UninitializedRead),
                _ => Err(Trap::TypeError),
            },
            InstrKind::Store { ptr, value } => {
                let v = frame.eval(*value, args)?;
                match frame.eval(*ptr, args)? {
                    Value::Ptr(slot) if slot < frame.slots.len() => {
                        frame.slots[slot] = Some(v);
                        Ok(None)
                    }
                    _ => Err(Trap::TypeError),
                }
            }
        }
    }
}

struct Frame {
    values: Vec<Option<Value>>,
    slots: Vec<Option<Value>>,
}

impl Frame {
    fn eval(&self, operand: Operand, args: &[Value]) -> Result<Value, Trap> {
        match operand {
            Operand::Const(Constant::Int(n)) => Ok(Value::Int(n)),
            Operand::Const(Constant::Float(x)) => Ok(Value::Float(x)),
            Operand::Const(Constant::Bool(b)) => Ok(Value::Bool(b)),
            Operand::Arg(i) => args.get(i as usize).copied().ok_or(Trap::TypeError),
            Operand::Value(id) => self
                .values
                .get(id.index())
                .copied()
                .flatten()
                .ok_or(Trap::UseBeforeDef),
        }
    }
}

fn apply_binop(op: BinOp, l: Value, r: Value) -> Result<Value, Trap> {
    match (op, l, r) {
        (BinOp::Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
        (BinOp::Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(b))),
        (BinOp::Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(b))),
        (BinOp::FAdd, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (BinOp::FSub, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
        (BinOp::FMul, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
        _ => Err(Trap::TypeError),
    }
}

fn apply_icmp(pred: Predicate, l: Value, r: Value) -> Result<bool, Trap> {
    let (a, b) = match (l, r) {
        (Value::Int(a), Value::Int(b)) => (a, b),
        (Value::Bool(a), Value::Bool(b)) => (a as i64, b as i64),
        _ => return Err(Trap::TypeError),
    };

    Ok(match pred {
        Predicate::Eq => a == b,
        Predicate::Ne => a != b,
        Predicate::Slt => a < b,
        Predicate::Sle => a <= b,
        Predicate::Sgt => a > b,
        Predicate::Sge => a >= b,
        Predicate::Ult => (a as u64) < (b as u64),
        Predicate::Ule => (a as u64) <= (b as u64),
        Predicate::Ugt => (a as u64) > (b as u64),
        Predicate::Uge => (a as u64) >= (b as u64),
    })
}
