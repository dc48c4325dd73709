use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::driver::Driver;
use crate::junk::{CompilationDatabase, CxxJunkDetector, JunkDetector, PassthroughJunkDetector};
use crate::loader::JsonModuleLoader;
use crate::operators::default_operators;
use crate::report::{render_summary, render_test_results, MutationRunReport};
use crate::result::RunSummary;
use crate::store::ModuleStore;
use crate::test_finder::{find_mutation_points, find_testees, find_tests};
use crate::ui::Ui;

/// Top-level CLI arguments for the `mutir` binary.
#[derive(Debug, Parser)]
#[command(
    name = "mutir",
    version,
    about = "Mutation testing for LLVM-style IR modules"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands supported by `mutir`.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run mutation testing over a set of bitcode modules.
    Run {
        /// Bitcode module files, loaded in the given order.
        #[arg(long = "bitcode", required = true, num_args = 1..)]
        bitcode: Vec<PathBuf>,

        /// Directory holding compile_commands.json for junk detection.
        #[arg(long)]
        compdb_dir: Option<PathBuf>,

        /// Compiler flags used when a source file has no compdb entry.
        #[arg(long)]
        cxx_flags: Option<String>,

        /// Per-test timeout in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Emit the machine-readable JSON report on stdout.
        #[arg(long)]
        json: bool,
    },

    /// List discovered tests, testees and mutation points without running.
    List {
        /// Bitcode module files, loaded in the given order.
        #[arg(long = "bitcode", required = true, num_args = 1..)]
        bitcode: Vec<PathBuf>,
    },
}

/// Parse CLI arguments and dispatch the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            bitcode,
            compdb_dir,
            cxx_flags,
            timeout_ms,
            json,
        } => {
            let config = Config {
                bitcode_paths: bitcode,
                cxx_compilation_database_dir: compdb_dir,
                cxx_compilation_flags: cxx_flags,
                timeout_ms,
            };

            let ui = Ui::new(json);
            ui.title("mutir: run");

            let junk = junk_detector(&config, &ui);
            let mut driver = Driver::new(config).with_junk_detector(junk);

            let results = match driver.run(&JsonModuleLoader) {
                Ok(results) => results,
                Err(e) => {
                    ui.error(format!("mutation run failed: {e:#}"));
                    return Err(e);
                }
            };

            let summary = RunSummary::from_results(&results);

            if json {
                // Human-readable view goes to stderr; stdout is the report.
                for result in &results {
                    ui.line(format!("test: {}", result.test.name));
                    for mutant in &result.mutants {
                        ui.mutant_line(mutant);
                    }
                }
            } else {
                for line in render_test_results(&results) {
                    ui.line(line);
                }
            }

            for line in render_summary(&summary) {
                ui.line(line);
            }

            if json {
                let report = MutationRunReport::new(results);
                println!("{}", serde_json::to_string_pretty(&report)?);
            }

            Ok(())
        }

        Command::List { bitcode } => {
            let config = Config::new(bitcode);
            config.validate()?;

            let ui = Ui::new(false);
            ui.title("mutir: list");

            let mut store = ModuleStore::new();
            for path in &config.bitcode_paths {
                store.load(&JsonModuleLoader, path)?;
            }

            let operators = default_operators();
            for test in find_tests(&store) {
                ui.line(format!("test: {}", test.name));
                for testee in find_testees(&store, &test) {
                    let points = find_mutation_points(&store, &operators, &testee);
                    ui.line(format!(
                        "  testee: {} ({} mutation points)",
                        testee.name,
                        points.len()
                    ));
                }
            }

            Ok(())
        }
    }
}

/// Pick a junk detector for this run: source-backed when any C/C++
/// information is configured, pass-through otherwise.
fn junk_detector(config: &Config, ui: &Ui) -> Box<dyn JunkDetector> {
    if !config.has_junk_detection() {
        return Box::new(PassthroughJunkDetector);
    }

    let compdb = match &config.cxx_compilation_database_dir {
        Some(dir) => match CompilationDatabase::load_from_directory(dir) {
            Ok(compdb) => Some(compdb),
            Err(e) => {
                ui.warn(format!("ignoring compilation database: {e:#}"));
                None
            }
        },
        None => None,
    };

    Box::new(CxxJunkDetector::new(
        compdb,
        config.cxx_compilation_flags.as_deref(),
    ))
}
