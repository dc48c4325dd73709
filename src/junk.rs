use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::point::{MutationPoint, OperatorKind};

/// Classifies mutation points that have no meaningful source footprint.
/// `true` means "discard".
pub trait JunkDetector {
    fn is_junk(&self, point: &MutationPoint) -> bool;
}

/// Keeps every point. Used when the configuration carries no C/C++
/// source information.
#[derive(Debug, Default)]
pub struct PassthroughJunkDetector;

impl JunkDetector for PassthroughJunkDetector {
    fn is_junk(&self, _point: &MutationPoint) -> bool {
        false
    }
}

/// One entry of a JSON compilation database.
#[derive(Debug, Clone, Deserialize)]
struct CompileCommand {
    directory: PathBuf,
    file: PathBuf,

    #[serde(default)]
    command: Option<String>,

    #[serde(default)]
    arguments: Option<Vec<String>>,
}

impl CompileCommand {
    fn args(&self) -> Vec<String> {
        if let Some(arguments) = &self.arguments {
            return arguments.clone();
        }
        self.command
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// A `compile_commands.json` loaded from a directory.
#[derive(Debug)]
pub struct CompilationDatabase {
    commands: Vec<CompileCommand>,
}

impl CompilationDatabase {
    pub fn load_from_directory(dir: &Path) -> Result<Self> {
        let path = dir.join("compile_commands.json");
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read compilation database at {path:?}"))?;
        let commands: Vec<CompileCommand> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse compilation database at {path:?}"))?;
        Ok(Self { commands })
    }

    /// Lookup by full path first, then by bare file name.
    fn entry_for(&self, file: &Path) -> Option<&CompileCommand> {
        if let Some(entry) = self.commands.iter().find(|c| c.file.as_path() == file) {
            return Some(entry);
        }
        let name = file.file_name()?;
        self.commands
            .iter()
            .find(|c| c.file.file_name() == Some(name))
    }
}

/// The operator-site categories the source index distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiteKind {
    Relational,
    Add,
    AddAssign,
    Increment,
    Sub,
    SubAssign,
    Decrement,
}

/// An operator occurrence: the byte range of the whole expression it
/// belongs to, in document order.
#[derive(Debug, Clone, Copy)]
struct OperatorSite {
    kind: SiteKind,
    start: usize,
    end: usize,
}

/// Operator sites of one parsed source file plus the offsets needed to
/// turn a (line, column) into a byte position.
#[derive(Debug)]
struct SourceIndex {
    sites: Vec<OperatorSite>,
    line_starts: Vec<usize>,
    len: usize,
}

impl SourceIndex {
    fn parse(text: &str, cpp: bool) -> Option<Self> {
        let language = if cpp {
            tree_sitter_cpp::language()
        } else {
            tree_sitter_c::language()
        };

        let mut parser = tree_sitter::Parser::new();
        parser.set_language(language).ok()?;
        let tree = parser.parse(text, None)?;

        let mut sites = Vec::new();
        collect_sites(tree.root_node(), &mut sites);

        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }

        Some(Self {
            sites,
            line_starts,
            len: text.len(),
        })
    }

    /// Byte offset of a 1-based (line, column) position.
    fn offset_of(&self, line: u32, column: u32) -> Option<usize> {
        if line == 0 || column == 0 {
            return None;
        }
        let start = *self.line_starts.get(line as usize - 1)?;
        let offset = start + column as usize - 1;
        if offset > self.len {
            return None;
        }
        Some(offset)
    }

    /// Whether any site of an accepted kind encloses `offset`. Among the
    /// enclosing sites the tightest range decides; ties keep the first.
    fn has_enclosing(&self, accepted: &[SiteKind], offset: usize) -> bool {
        let mut best: Option<OperatorSite> = None;

        for site in &self.sites {
            if !accepted.contains(&site.kind) {
                continue;
            }
            if offset < site.start || offset >= site.end {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => site.end - site.start < current.end - current.start,
            };
            if better {
                best = Some(*site);
            }
        }

        best.is_some()
    }
}

fn collect_sites(node: tree_sitter::Node<'_>, out: &mut Vec<OperatorSite>) {
    let kind = match node.kind() {
        "binary_expression" => node
            .child_by_field_name("operator")
            .and_then(|op| match op.kind() {
                "<" | "<=" | ">" | ">=" => Some(SiteKind::Relational),
                "+" => Some(SiteKind::Add),
                "-" => Some(SiteKind::Sub),
                _ => None,
            }),
        "assignment_expression" => {
            node.child_by_field_name("operator")
                .and_then(|op| match op.kind() {
                    "+=" => Some(SiteKind::AddAssign),
                    "-=" => Some(SiteKind::SubAssign),
                    _ => None,
                })
        }
        "update_expression" => node
            .child_by_field_name("operator")
            .and_then(|op| match op.kind() {
                "++" => Some(SiteKind::Increment),
                "--" => Some(SiteKind::Decrement),
                _ => None,
            }),
        _ => None,
    };

    if let Some(kind) = kind {
        out.push(OperatorSite {
            kind,
            start: node.start_byte(),
            end: node.end_byte(),
        });
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_sites(child, out);
        }
    }
}

#[derive(Debug, Clone)]
enum CachedSource {
    /// The named file does not exist: there is no file entry for the
    /// point, so it is junk.
    Missing,

    /// The file exists but could not be read or parsed: a detector
    /// error, so the point is kept.
    Unusable,

    Indexed(Arc<SourceIndex>),
}

/// Junk detection backed by parsed C/C++ sources.
///
/// Sources are parsed once per path and shared; the cache mutex is not
/// held across parsing (check, parse outside the lock, commit, discard
/// the duplicate on a race).
pub struct CxxJunkDetector {
    compdb: Option<CompilationDatabase>,
    compilation_flags: Vec<String>,
    sources: Mutex<HashMap<PathBuf, CachedSource>>,
}

impl CxxJunkDetector {
    pub fn new(compdb: Option<CompilationDatabase>, flags: Option<&str>) -> Self {
        Self {
            compdb,
            compilation_flags: flags
                .unwrap_or("")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Compilation arguments for one file: its database entry when there
    /// is one, the plain flags list otherwise.
    fn command_line(&self, file: &Path) -> (Option<PathBuf>, Vec<String>) {
        if let Some(compdb) = &self.compdb {
            if let Some(entry) = compdb.entry_for(file) {
                return (Some(entry.directory.clone()), entry.args());
            }
        }
        (None, self.compilation_flags.clone())
    }

    fn source_for(&self, path: &Path) -> CachedSource {
        if let Some(cached) = self.sources.lock().unwrap().get(path) {
            return cached.clone();
        }

        let loaded = self.load_source(path);

        let mut cache = self.sources.lock().unwrap();
        cache.entry(path.to_path_buf()).or_insert(loaded).clone()
    }

    fn load_source(&self, path: &Path) -> CachedSource {
        let (directory, args) = self.command_line(path);

        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(directory) = directory {
            directory.join(path)
        } else {
            path.to_path_buf()
        };

        if !resolved.exists() {
            return CachedSource::Missing;
        }

        let Ok(text) = fs::read_to_string(&resolved) else {
            return CachedSource::Unusable;
        };

        match SourceIndex::parse(&text, parse_as_cpp(&resolved, &args)) {
            Some(index) => CachedSource::Indexed(Arc::new(index)),
            None => CachedSource::Unusable,
        }
    }
}

/// C++ when the command line says so (`-x c++`, a C++ `-std=`) or the
/// file extension does.
fn parse_as_cpp(path: &Path, args: &[String]) -> bool {
    for (i, arg) in args.iter().enumerate() {
        if arg == "-x" && args.get(i + 1).is_some_and(|v| v == "c++") {
            return true;
        }
        if arg.starts_with("-std=c++") || arg.starts_with("-std=gnu++") {
            return true;
        }
    }

    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("cc" | "cpp" | "cxx" | "hpp" | "hh")
    )
}

impl JunkDetector for CxxJunkDetector {
    fn is_junk(&self, point: &MutationPoint) -> bool {
        let Some(location) = &point.location else {
            // No debug info, no source footprint.
            return true;
        };

        let accepted: &[SiteKind] = match point.operator {
            OperatorKind::ConditionalsBoundary => &[SiteKind::Relational],
            OperatorKind::MathAdd => &[SiteKind::Add, SiteKind::AddAssign, SiteKind::Increment],
            OperatorKind::MathSub => &[SiteKind::Sub, SiteKind::SubAssign, SiteKind::Decrement],
            OperatorKind::Custom(_) => return false,
        };

        match self.source_for(&location.path) {
            CachedSource::Missing => true,
            CachedSource::Unusable => false,
            CachedSource::Indexed(index) => {
                let Some(offset) = index.offset_of(location.line, location.column) else {
                    return false;
                };
                !index.has_enclosing(accepted, offset)
            }
        }
    }
}
