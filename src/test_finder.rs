use std::collections::HashSet;

use serde::Serialize;

use crate::ir::InstrKind;
use crate::operators::MutationOperator;
use crate::point::{FunctionRef, MutationPoint};
use crate::store::ModuleStore;

/// Which convention names a test entry and how its return value reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// A `test_`-prefixed function: returns 0 on pass.
    Simple,

    /// A program `main`: exit code 0 on pass.
    Main,
}

impl TestKind {
    /// Interpret an integer return value under this convention.
    pub fn passes(self, ret: i64) -> bool {
        match self {
            TestKind::Simple | TestKind::Main => ret == 0,
        }
    }
}

/// A discovered test entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Test {
    pub name: String,
    pub entry: FunctionRef,
    pub kind: TestKind,
}

/// A function reachable from a test and eligible for mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Testee {
    pub name: String,
    pub function: FunctionRef,
}

/// Enumerate test entry points across all modules, in module load order
/// then function order.
pub fn find_tests(store: &ModuleStore) -> Vec<Test> {
    let mut tests = Vec::new();

    for (id, module) in store.iter() {
        for (index, function) in module.functions.iter().enumerate() {
            let kind = if function.name == "main" {
                TestKind::Main
            } else if function.name.starts_with("test_") {
                TestKind::Simple
            } else {
                continue;
            };

            tests.push(Test {
                name: function.name.clone(),
                entry: FunctionRef { module: id, index },
                kind,
            });
        }
    }

    tests
}

/// Preorder traversal of the call graph rooted at the test entry,
/// yielding each distinct function once and excluding the entry itself.
///
/// Calls resolve by callee name across the store in module load order;
/// unresolved callees are external and skipped.
pub fn find_testees(store: &ModuleStore, test: &Test) -> Vec<Testee> {
    let mut visited = HashSet::new();
    visited.insert(test.entry);

    let mut testees = Vec::new();
    walk_callees(store, test.entry, &mut visited, &mut testees);
    testees
}

fn walk_callees(
    store: &ModuleStore,
    from: FunctionRef,
    visited: &mut HashSet<FunctionRef>,
    out: &mut Vec<Testee>,
) {
    let function = &store.get(from.module).functions[from.index];

    let mut callees = Vec::new();
    for block in &function.blocks {
        for &id in &block.instrs {
            if let InstrKind::Call { callee, .. } = &function.instr(id).kind {
                callees.push(callee.clone());
            }
        }
    }

    for name in callees {
        let Some(target) = resolve(store, &name) else {
            continue;
        };
        if !visited.insert(target) {
            continue;
        }

        out.push(Testee {
            name,
            function: target,
        });
        walk_callees(store, target, visited, out);
    }
}

fn resolve(store: &ModuleStore, name: &str) -> Option<FunctionRef> {
    for (id, module) in store.iter() {
        if let Some(index) = module.function_named(name) {
            return Some(FunctionRef { module: id, index });
        }
    }
    None
}

/// Collect every operator's candidate points for one testee. Ordering is
/// stable: operator registration order, then instruction index.
pub fn find_mutation_points(
    store: &ModuleStore,
    operators: &[Box<dyn MutationOperator>],
    testee: &Testee,
) -> Vec<MutationPoint> {
    let module = store.get(testee.function.module);

    let mut points = Vec::new();
    for operator in operators {
        points.extend(operator.scan(module, testee.function));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{arg, int, BinOp, FunctionBuilder, Module, Predicate, Type};
    use crate::operators::default_operators;
    use crate::point::OperatorKind;

    fn module(name: &str, functions: Vec<crate::ir::Function>) -> Module {
        Module {
            name: name.to_string(),
            source_file: None,
            functions,
        }
    }

    fn call_only(name: &str, callee: &str) -> crate::ir::Function {
        let mut b = FunctionBuilder::new(name, vec![], Type::I64);
        b.call(callee, vec![]);
        b.ret(Some(int(0)));
        b.build()
    }

    #[test]
    fn tests_are_found_in_module_then_function_order() {
        let mut store = ModuleStore::new();
        store.add(module(
            "a",
            vec![call_only("helper", "x"), call_only("test_b", "x")],
        ));
        store.add(module("b", vec![call_only("main", "x")]));

        let tests = find_tests(&store);
        let names: Vec<&str> = tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["test_b", "main"]);
        assert_eq!(tests[0].kind, TestKind::Simple);
        assert_eq!(tests[1].kind, TestKind::Main);
    }

    #[test]
    fn testees_are_preorder_distinct_and_exclude_the_entry() {
        // test_a -> f -> g, then f again (memoised), then unresolved ext.
        let mut store = ModuleStore::new();

        let mut t = FunctionBuilder::new("test_a", vec![], Type::I64);
        t.call("f", vec![]);
        t.call("f", vec![]);
        t.call("ext", vec![]);
        t.ret(Some(int(0)));

        store.add(module("tester", vec![t.build()]));
        store.add(module("testee", vec![call_only("f", "g"), call_only("g", "f")]));

        let tests = find_tests(&store);
        let testees = find_testees(&store, &tests[0]);

        let names: Vec<&str> = testees.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["f", "g"]);
    }

    #[test]
    fn mutation_points_follow_operator_registration_order() {
        let mut b = FunctionBuilder::new("f", vec![Type::I64, Type::I64], Type::I64);
        let d = b.binary(BinOp::Sub, arg(0), arg(1));
        let _c = b.icmp(Predicate::Slt, arg(0), arg(1));
        let s = b.binary(BinOp::Add, d, arg(1));
        b.ret(Some(s));

        let mut store = ModuleStore::new();
        let id = store.add(module("m", vec![b.build()]));

        let testee = Testee {
            name: "f".to_string(),
            function: FunctionRef { module: id, index: 0 },
        };

        let points = find_mutation_points(&store, &default_operators(), &testee);
        let kinds: Vec<OperatorKind> = points.iter().map(|p| p.operator).collect();
        assert_eq!(
            kinds,
            vec![
                OperatorKind::ConditionalsBoundary,
                OperatorKind::MathAdd,
                OperatorKind::MathSub,
            ]
        );
    }
}
