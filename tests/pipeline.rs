//! End-to-end pipeline scenarios driven through an injected in-memory
//! module loader.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use mutir::compiler::Compiler;
use mutir::driver::Driver;
use mutir::error::LoadError;
use mutir::ir::{arg, float, int, BinOp, FunctionBuilder, InstrId, InstrKind, Module, Predicate, Type};
use mutir::junk::CxxJunkDetector;
use mutir::loader::ModuleLoader;
use mutir::operators::{default_operators, MathAdd, MutationOperator};
use mutir::point::{Edit, FunctionRef, MutationPoint, OperatorKind};
use mutir::result::ExecutionStatus;
use mutir::runner::TestRunner;
use mutir::store::ModuleStore;
use mutir::test_finder::{find_mutation_points, find_tests, find_testees};
use mutir::Config;

struct FakeLoader {
    modules: HashMap<PathBuf, Module>,
}

impl FakeLoader {
    fn new(modules: Vec<(&str, Module)>) -> Self {
        Self {
            modules: modules
                .into_iter()
                .map(|(path, m)| (PathBuf::from(path), m))
                .collect(),
        }
    }
}

impl ModuleLoader for FakeLoader {
    fn load_module_at_path(&self, path: &Path) -> Result<Module, LoadError> {
        self.modules
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                path: path.to_path_buf(),
            })
    }
}

fn module(name: &str, functions: Vec<mutir::ir::Function>) -> Module {
    Module {
        name: name.to_string(),
        source_file: None,
        functions,
    }
}

fn config(paths: &[&str]) -> Config {
    Config::new(paths.iter().map(PathBuf::from).collect())
}

/// A test that returns 0 iff `callee(args) pred expected` holds.
fn assertion_test(
    test_name: &str,
    callee: &str,
    args: Vec<mutir::ir::Operand>,
    pred: Predicate,
    expected: i64,
) -> mutir::ir::Function {
    let mut b = FunctionBuilder::new(test_name, vec![], Type::I64);
    let bb_pass = b.add_block();
    let bb_fail = b.add_block();
    let r = b.call(callee, args);
    let ok = b.icmp(pred, r, int(expected));
    b.br(ok, bb_pass, bb_fail);
    b.switch_to(bb_pass);
    b.ret(Some(int(0)));
    b.switch_to(bb_fail);
    b.ret(Some(int(1)));
    b.build()
}

// --- Scenario: trivial passing test, no mutations possible ------------

#[test]
fn trivial_test_with_unmutatable_testee() {
    let mut noop = FunctionBuilder::new("noop", vec![], Type::Void);
    noop.ret(None);

    let mut t = FunctionBuilder::new("test_trivial", vec![], Type::I64);
    t.call("noop", vec![]);
    t.ret(Some(int(0)));

    let loader = FakeLoader::new(vec![
        ("tester", module("tester", vec![t.build()])),
        ("testee", module("testee", vec![noop.build()])),
    ]);

    let results = Driver::new(config(&["tester", "testee"]))
        .run(&loader)
        .expect("run");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].test.name, "test_trivial");
    assert_eq!(results[0].baseline.status, ExecutionStatus::Passed);
    assert!(results[0].mutants.is_empty());
}

// --- Scenario: boundary mutant killed ---------------------------------

#[test]
fn boundary_mutant_on_a_bare_comparison_is_killed() {
    // is_greater(2, 2) is false; the `>=` mutant turns it true.
    let mut g = FunctionBuilder::new("is_greater", vec![Type::I64, Type::I64], Type::I1);
    let c = g.icmp(Predicate::Sgt, arg(0), arg(1));
    g.ret(Some(c));

    let mut t = FunctionBuilder::new("test_is_greater", vec![], Type::I64);
    let bb_fail = t.add_block();
    let bb_pass = t.add_block();
    let r = t.call("is_greater", vec![int(2), int(2)]);
    t.br(r, bb_fail, bb_pass);
    t.switch_to(bb_fail);
    t.ret(Some(int(1)));
    t.switch_to(bb_pass);
    t.ret(Some(int(0)));

    let loader = FakeLoader::new(vec![
        ("tester", module("tester", vec![t.build()])),
        ("testee", module("testee", vec![g.build()])),
    ]);

    let results = Driver::new(config(&["tester", "testee"]))
        .run(&loader)
        .expect("run");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].baseline.status, ExecutionStatus::Passed);
    assert_eq!(results[0].mutants.len(), 1);
    assert_eq!(
        results[0].mutants[0].point.operator,
        OperatorKind::ConditionalsBoundary
    );
    assert_eq!(results[0].mutants[0].result.status, ExecutionStatus::Failed);
}

#[test]
fn boundary_mutant_on_max_survives() {
    // max(3, 2) is 3 under both `>` and `>=`: the classic undetectable
    // boundary mutant.
    let mut m = FunctionBuilder::new("max", vec![Type::I64, Type::I64], Type::I64);
    let bb_then = m.add_block();
    let bb_else = m.add_block();
    let c = m.icmp(Predicate::Sgt, arg(0), arg(1));
    m.br(c, bb_then, bb_else);
    m.switch_to(bb_then);
    m.ret(Some(arg(0)));
    m.switch_to(bb_else);
    m.ret(Some(arg(1)));

    let t = assertion_test("test_max", "max", vec![int(3), int(2)], Predicate::Eq, 3);

    let loader = FakeLoader::new(vec![
        ("tester", module("tester", vec![t])),
        ("testee", module("testee", vec![m.build()])),
    ]);

    let results = Driver::new(config(&["tester", "testee"]))
        .run(&loader)
        .expect("run");

    assert_eq!(results[0].baseline.status, ExecutionStatus::Passed);
    assert_eq!(results[0].mutants.len(), 1);
    assert_eq!(results[0].mutants[0].result.status, ExecutionStatus::Passed);
}

// --- Scenario: arithmetic survivor ------------------------------------

#[test]
fn weak_inequality_test_misses_the_add_mutant() {
    // sum(2, 2) != 5 holds for the baseline (4) and the mutant (0).
    let mut s = FunctionBuilder::new("sum", vec![Type::I64, Type::I64], Type::I64);
    let r = s.binary(BinOp::Add, arg(0), arg(1));
    s.ret(Some(r));

    let t = assertion_test("test_sum", "sum", vec![int(2), int(2)], Predicate::Ne, 5);

    let loader = FakeLoader::new(vec![
        ("tester", module("tester", vec![t])),
        ("testee", module("testee", vec![s.build()])),
    ]);

    let results = Driver::new(config(&["tester", "testee"]))
        .run(&loader)
        .expect("run");

    assert_eq!(results[0].baseline.status, ExecutionStatus::Passed);
    assert_eq!(results[0].mutants.len(), 1);
    assert_eq!(results[0].mutants[0].point.operator, OperatorKind::MathAdd);
    assert_eq!(results[0].mutants[0].result.status, ExecutionStatus::Passed);
}

// --- Scenario: junk filtering -----------------------------------------

#[test]
fn points_without_a_source_footprint_are_filtered() {
    // The module claims its add sits on a line of the source that holds
    // no user-written `+` (a synthesised initialiser, say).
    let mut source = tempfile::Builder::new()
        .suffix(".c")
        .tempfile()
        .expect("temp source");
    write!(
        source,
        "int wrapped(int a, int b);\nint holder = 0;\nint user_sum(int a, int b) {{ return a + b; }}\n"
    )
    .unwrap();

    let mut w = FunctionBuilder::new("wrapped", vec![Type::I64, Type::I64], Type::I64);
    let r = w.binary_at(BinOp::Add, arg(0), arg(1), 2, 5);
    w.ret(Some(r));

    let mut testee = module("testee", vec![w.build()]);
    testee.source_file = Some(source.path().to_path_buf());

    let mut t = FunctionBuilder::new("test_wrapped", vec![], Type::I64);
    t.call("wrapped", vec![int(1), int(2)]);
    t.ret(Some(int(0)));

    let loader = FakeLoader::new(vec![
        ("tester", module("tester", vec![t.build()])),
        ("testee", testee),
    ]);

    let results = Driver::new(config(&["tester", "testee"]))
        .with_junk_detector(Box::new(CxxJunkDetector::new(None, None)))
        .run(&loader)
        .expect("run");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].baseline.status, ExecutionStatus::Passed);
    assert!(results[0].mutants.is_empty());
}

// --- Scenario: compile-failing mutant ---------------------------------

/// Rewrites float adds to the integer opcode, which the compiler rejects.
struct BreakFloatAdd;

impl MutationOperator for BreakFloatAdd {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Custom("break_float_add")
    }

    fn scan(&self, module: &Module, function: FunctionRef) -> Vec<MutationPoint> {
        let mut points = Vec::new();
        for (i, instr) in module.functions[function.index].instrs.iter().enumerate() {
            if let InstrKind::Binary {
                op: BinOp::FAdd, ..
            } = instr.kind
            {
                points.push(MutationPoint::new(
                    self.kind(),
                    function,
                    InstrId(i as u32),
                    Edit::BinaryOp {
                        from: BinOp::FAdd,
                        to: BinOp::Add,
                    },
                    None,
                ));
            }
        }
        points
    }
}

#[test]
fn ill_typed_mutant_is_invalid_and_the_pipeline_continues() {
    let mut f = FunctionBuilder::new("fmix", vec![Type::F64, Type::F64], Type::F64);
    let r = f.binary(BinOp::FAdd, arg(0), arg(1));
    f.ret(Some(r));

    let mut t = FunctionBuilder::new("test_fmix", vec![], Type::I64);
    t.call("fmix", vec![float(1.0), float(2.0)]);
    t.ret(Some(int(0)));

    let loader = FakeLoader::new(vec![
        ("tester", module("tester", vec![t.build()])),
        ("testee", module("testee", vec![f.build()])),
    ]);

    let operators: Vec<Box<dyn MutationOperator>> =
        vec![Box::new(BreakFloatAdd), Box::new(MathAdd)];

    let results = Driver::new(config(&["tester", "testee"]))
        .with_operators(operators)
        .run(&loader)
        .expect("run");

    assert_eq!(results[0].mutants.len(), 2);

    // The hand-crafted edit fails to compile and is recorded, not fatal.
    assert_eq!(
        results[0].mutants[0].point.operator,
        OperatorKind::Custom("break_float_add")
    );
    assert_eq!(results[0].mutants[0].result.status, ExecutionStatus::Invalid);

    // The following catalogue point still runs normally.
    assert_eq!(results[0].mutants[1].point.operator, OperatorKind::MathAdd);
    assert_eq!(results[0].mutants[1].result.status, ExecutionStatus::Passed);
}

// --- Scenario: isolation across mutants -------------------------------

#[test]
fn apply_compile_revert_restores_ir_and_baseline_behaviour() {
    // mix(a, b) = (a + b) - b carries one MathAdd and one MathSub point.
    let mut f = FunctionBuilder::new("mix", vec![Type::I64, Type::I64], Type::I64);
    let s = f.binary(BinOp::Add, arg(0), arg(1));
    let d = f.binary(BinOp::Sub, s, arg(1));
    f.ret(Some(d));

    let tester = assertion_test("test_mix", "mix", vec![int(7), int(5)], Predicate::Eq, 7);

    let mut store = ModuleStore::new();
    let tester_id = store.add(module("tester", vec![tester]));
    let testee_id = store.add(module("testee", vec![f.build()]));

    let compiler = Compiler::new();
    let runner = TestRunner::new();

    let baseline_tester = compiler.compile(store.get(tester_id)).expect("baseline");
    let baseline_testee = compiler.compile(store.get(testee_id)).expect("baseline");
    let pristine = store.get(testee_id).clone();

    let tests = find_tests(&store);
    let testees = find_testees(&store, &tests[0]);
    let points = find_mutation_points(&store, &default_operators(), &testees[0]);
    assert_eq!(points.len(), 2);

    let baseline_result = runner.run(&tests[0], &[&baseline_tester, &baseline_testee]);
    assert_eq!(baseline_result.status, ExecutionStatus::Passed);

    for mut point in points {
        point.apply(store.get_mut(testee_id));
        let mutant = compiler.compile(store.get(testee_id)).expect("mutant compile");
        let mutant_result = runner.run(&tests[0], &[&baseline_tester, &mutant]);
        point.revert(store.get_mut(testee_id));

        // Each mutant changes (7 + 5) - 5; both rewrites are detected.
        assert_eq!(mutant_result.status, ExecutionStatus::Failed);

        // The IR is back to its pre-apply state, bit for bit.
        assert_eq!(store.get(testee_id), &pristine);

        // Recompiling yields the baseline object again, and the original
        // test reproduces its baseline verdict.
        let recompiled = compiler.compile(store.get(testee_id)).expect("recompile");
        assert_eq!(recompiled, baseline_testee);

        let again = runner.run(&tests[0], &[&baseline_tester, &recompiled]);
        assert_eq!(again.status, baseline_result.status);
    }
}

// --- Co-resident test and testee --------------------------------------

#[test]
fn co_resident_test_and_testee_link_cleanly() {
    // Test and testee share a module: the mutant object re-emits the
    // test's own code alongside the mutated function.
    let mut inc = FunctionBuilder::new("inc", vec![Type::I64], Type::I64);
    let r = inc.binary(BinOp::Add, arg(0), int(1));
    inc.ret(Some(r));

    let t = assertion_test("test_inc", "inc", vec![int(1)], Predicate::Eq, 2);

    let loader = FakeLoader::new(vec![(
        "unit",
        module("unit", vec![t, inc.build()]),
    )]);

    let results = Driver::new(config(&["unit"])).run(&loader).expect("run");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].baseline.status, ExecutionStatus::Passed);
    assert_eq!(results[0].mutants.len(), 1);
    assert_eq!(results[0].mutants[0].result.status, ExecutionStatus::Failed);
}
