use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::compiler::{Compiler, Object};
use crate::config::Config;
use crate::junk::{JunkDetector, PassthroughJunkDetector};
use crate::loader::ModuleLoader;
use crate::operators::{default_operators, MutationOperator};
use crate::result::{ExecutionResult, MutationResult, TestResult};
use crate::runner::TestRunner;
use crate::store::{ModuleId, ModuleStore};
use crate::test_finder::{find_mutation_points, find_testees, find_tests};

/// Cooperative cancellation flag, checked between tests and between
/// mutation points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates the whole pipeline: load, baseline, discover, mutate,
/// execute, revert, report.
pub struct Driver {
    config: Config,
    operators: Vec<Box<dyn MutationOperator>>,
    junk: Box<dyn JunkDetector>,
    runner: TestRunner,
    cancel: CancelToken,
}

impl Driver {
    pub fn new(config: Config) -> Self {
        let runner = TestRunner::with_timeout(
            config
                .timeout_ms
                .map(std::time::Duration::from_millis),
        );

        Self {
            config,
            operators: default_operators(),
            junk: Box::new(PassthroughJunkDetector),
            runner,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_operators(mut self, operators: Vec<Box<dyn MutationOperator>>) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_junk_detector(mut self, junk: Box<dyn JunkDetector>) -> Self {
        self.junk = junk;
        self
    }

    /// A handle callers may use to cancel the run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute the pipeline. Modules load and compile eagerly; every
    /// baseline failure is fatal, every post-baseline failure is
    /// evidence and becomes an `Invalid` mutant result.
    pub fn run(&mut self, loader: &dyn ModuleLoader) -> Result<Vec<TestResult>> {
        self.config.validate()?;

        let mut store = ModuleStore::new();
        for path in &self.config.bitcode_paths {
            store
                .load(loader, path)
                .with_context(|| format!("failed to load bitcode module {path:?}"))?;
        }

        let compiler = Compiler::new();
        let mut baseline = Vec::with_capacity(store.len());
        for id in store.ids() {
            let object = compiler.compile(store.get(id)).with_context(|| {
                format!(
                    "baseline compilation of module `{}` failed",
                    store.get(id).name
                )
            })?;
            baseline.push(object);
        }

        let mut results = Vec::new();

        'tests: for test in find_tests(&store) {
            if self.cancel.is_cancelled() {
                break;
            }

            let everything: Vec<&Object> = baseline.iter().collect();
            let baseline_result = self.runner.run(&test, &everything);

            let mut mutants = Vec::new();
            for testee in find_testees(&store, &test) {
                let parent = testee.function.module;

                for mut point in find_mutation_points(&store, &self.operators, &testee) {
                    // A cancelled run keeps only fully processed tests.
                    if self.cancel.is_cancelled() {
                        continue 'tests;
                    }
                    if self.junk.is_junk(&point) {
                        continue;
                    }

                    point.apply(store.get_mut(parent));

                    let result = match compiler.compile(store.get(parent)) {
                        Ok(mutant) => {
                            let mut objects = all_but_one(&baseline, parent);
                            objects.push(&mutant);
                            self.runner.run(&test, &objects)
                        }
                        Err(_) => ExecutionResult::invalid(0),
                    };

                    point.revert(store.get_mut(parent));

                    mutants.push(MutationResult { point, result });
                }
            }

            results.push(TestResult {
                test,
                baseline: baseline_result,
                mutants,
            });
        }

        Ok(results)
    }
}

/// The cached baseline objects of every module except `one`.
fn all_but_one(baseline: &[Object], one: ModuleId) -> Vec<&Object> {
    baseline
        .iter()
        .enumerate()
        .filter(|(i, _)| ModuleId(*i) != one)
        .map(|(_, object)| object)
        .collect()
}
