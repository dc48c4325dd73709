use std::time::{Duration, Instant};

use crate::compiler::Object;
use crate::interp::{self, Symbols, Value};
use crate::result::{ExecutionResult, ExecutionStatus};
use crate::test_finder::Test;

/// Fuel handed to every invocation so mutants that loop forever still
/// terminate with an `Invalid` verdict.
const STEP_BUDGET: u64 = 10_000_000;

/// Links a complete object set, resolves the test entry symbol and runs
/// it once. Wall-clock timing covers the invocation only.
#[derive(Debug, Default)]
pub struct TestRunner {
    timeout: Option<Duration>,
}

impl TestRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn run(&self, test: &Test, objects: &[&Object]) -> ExecutionResult {
        let symbols = match link(objects) {
            Ok(symbols) => symbols,
            Err(_) => return ExecutionResult::invalid(0),
        };

        let Some(entry) = symbols.get(test.name.as_str()).copied() else {
            return ExecutionResult::invalid(0);
        };

        let start = Instant::now();
        let deadline = self.timeout.map(|t| start + t);
        let outcome = interp::execute(&symbols, entry, &[], STEP_BUDGET, deadline);
        let time_ns = start.elapsed().as_nanos() as u64;

        let status = match outcome {
            Ok(Value::Int(ret)) => {
                if test.kind.passes(ret) {
                    ExecutionStatus::Passed
                } else {
                    ExecutionStatus::Failed
                }
            }
            // A test entry that returns nothing usable is a runner error,
            // not a verdict.
            Ok(_) => ExecutionStatus::Invalid,
            Err(_) => ExecutionStatus::Invalid,
        };

        ExecutionResult { status, time_ns }
    }
}

/// Duplicate definitions across the object set.
#[derive(Debug, PartialEq, Eq)]
pub struct DuplicateSymbol(pub String);

/// Merge the objects' symbol tables into one resolution map.
fn link<'a>(objects: &[&'a Object]) -> Result<Symbols<'a>, DuplicateSymbol> {
    let mut symbols = Symbols::new();

    for object in objects {
        for (name, function) in object.symbols() {
            if symbols.insert(name, function).is_some() {
                return Err(DuplicateSymbol(name.to_string()));
            }
        }
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::ir::{int, FunctionBuilder, Module, Type};
    use crate::point::FunctionRef;
    use crate::store::ModuleId;
    use crate::test_finder::TestKind;

    fn object_with(name: &str, functions: Vec<crate::ir::Function>) -> Object {
        let module = Module {
            name: name.to_string(),
            source_file: None,
            functions,
        };
        Compiler::new().compile(&module).expect("compile")
    }

    fn returning(name: &str, value: i64) -> crate::ir::Function {
        let mut b = FunctionBuilder::new(name, vec![], Type::I64);
        b.ret(Some(int(value)));
        b.build()
    }

    fn simple_test(name: &str) -> Test {
        Test {
            name: name.to_string(),
            entry: FunctionRef {
                module: ModuleId(0),
                index: 0,
            },
            kind: TestKind::Simple,
        }
    }

    #[test]
    fn zero_return_passes_and_nonzero_fails() {
        let pass = object_with("a", vec![returning("test_ok", 0)]);
        let fail = object_with("b", vec![returning("test_bad", 7)]);

        let runner = TestRunner::new();
        let result = runner.run(&simple_test("test_ok"), &[&pass, &fail]);
        assert_eq!(result.status, ExecutionStatus::Passed);

        let result = runner.run(&simple_test("test_bad"), &[&pass, &fail]);
        assert_eq!(result.status, ExecutionStatus::Failed);
    }

    #[test]
    fn duplicate_symbols_fail_the_link() {
        let a = object_with("a", vec![returning("test_x", 0)]);
        let b = object_with("b", vec![returning("test_x", 0)]);

        let result = TestRunner::new().run(&simple_test("test_x"), &[&a, &b]);
        assert_eq!(result.status, ExecutionStatus::Invalid);
    }

    #[test]
    fn missing_entry_symbol_is_invalid() {
        let a = object_with("a", vec![returning("other", 0)]);
        let result = TestRunner::new().run(&simple_test("test_x"), &[&a]);
        assert_eq!(result.status, ExecutionStatus::Invalid);
    }

    #[test]
    fn timing_is_reported() {
        let a = object_with("a", vec![returning("test_ok", 0)]);
        let result = TestRunner::new().run(&simple_test("test_ok"), &[&a]);
        assert_eq!(result.status, ExecutionStatus::Passed);
        assert!(result.time_ns > 0);
    }
}
