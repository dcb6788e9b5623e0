//! Module loader (spec.md section 4.1).
//!
//! Starting from a root [`ModulePath`] and a list of search-path
//! directories, resolves the `.fble` source file for each transitively
//! referenced module and produces a [`Program`]: modules in dependency
//! order, leaf-first, root last.
//!
//! Grounded on `snow-common`'s `ModuleGraph` (cycle detection via a
//! recursion-stack set) and `mesh-pkg`'s resolver (dependency walk with a
//! visited set), generalized from a flat in-memory name graph to
//! filesystem-path-based module resolution.
//!
//! Direct construction of a `Program` from a pre-compiled (preloaded)
//! module descriptor (spec.md section 6.5) is *not* this crate's job: the
//! `PreloadedModule` ABI lives in `fble-bc`, one layer above the checker,
//! and a dependency from here to there would be circular. `fble-bc`
//! supplies the equivalent "build a runnable program without re-parsing"
//! entry point over its own descriptor type instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fble_common::{Loc, ModulePath};
use fble_syntax::ast::Expr;
use fble_syntax::parser::Parser;
use rustc_hash::FxHashSet;

/// One parsed module: its resolved path, body expression, and the
/// (unresolved) paths of the modules it immediately depends on, in the
/// order they were first mentioned in its source (spec.md section 4.1).
#[derive(Debug, Clone)]
pub struct Module {
    pub path: ModulePath,
    pub body: Expr,
    pub deps: Vec<ModulePath>,
    pub source_path: PathBuf,
}

/// A fully loaded program: modules in dependency order, leaf-first, with
/// the root module last.
#[derive(Debug, Clone)]
pub struct Program {
    pub modules: Vec<Module>,
}

impl Program {
    /// The root module -- the last one in dependency order.
    pub fn root(&self) -> &Module {
        self.modules.last().expect("a loaded Program always has at least the root module")
    }
}

/// Everything that can go wrong while loading (spec.md section 7).
#[derive(Debug, Clone)]
pub enum LoadError {
    /// No file under any search-path root matched this module path.
    UnresolvedModule {
        path: ModulePath,
        search_path: Vec<PathBuf>,
    },
    /// A module (transitively) depends on itself.
    RecursiveImport { cycle: Vec<ModulePath> },
    /// The module's source file could not be read.
    Io { path: PathBuf, message: String },
    /// The module's source file failed to parse.
    Parse(fble_syntax::error::ParseError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::UnresolvedModule { path, search_path } => {
                write!(
                    f,
                    "could not find module {path} in search path {search_path:?}"
                )
            }
            LoadError::RecursiveImport { cycle } => {
                write!(f, "recursive import: ")?;
                for (i, p) in cycle.iter().enumerate() {
                    if i > 0 {
                        write!(f, " -> ")?;
                    }
                    write!(f, "{p}")?;
                }
                Ok(())
            }
            LoadError::Io { path, message } => {
                write!(f, "{}: {message}", path.display())
            }
            LoadError::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<fble_syntax::error::ParseError> for LoadError {
    fn from(e: fble_syntax::error::ParseError) -> Self {
        LoadError::Parse(e)
    }
}

/// Resolve `path` against each search-path root in order, returning the
/// first file that exists (spec.md section 4.1 search-path policy).
fn resolve_file(search_path: &[PathBuf], path: &ModulePath) -> Option<PathBuf> {
    let rel = path.to_relative_file_path();
    for root in search_path {
        let candidate = root.join(&rel);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Load `root` and everything it transitively depends on.
///
/// Depth-first from the root. On each module, parse it to get its
/// immediate `deps`, detect import cycles during the traversal (always a
/// source bug, per spec.md section 4.1), and dedup already-loaded modules
/// by path equality. No partial `Program` is ever returned: any error
/// aborts the whole load.
pub fn load(search_path: &[PathBuf], root: ModulePath) -> Result<Program, LoadError> {
    let mut loaded: Vec<Module> = Vec::new();
    let mut loaded_paths: FxHashSet<ModulePath> = FxHashSet::default();
    let mut stack: Vec<ModulePath> = Vec::new();

    load_module(search_path, &root, &mut loaded, &mut loaded_paths, &mut stack)?;

    Ok(Program { modules: loaded })
}

fn load_module(
    search_path: &[PathBuf],
    path: &ModulePath,
    loaded: &mut Vec<Module>,
    loaded_paths: &mut FxHashSet<ModulePath>,
    stack: &mut Vec<ModulePath>,
) -> Result<(), LoadError> {
    if loaded_paths.contains(path) {
        return Ok(());
    }

    if let Some(pos) = stack.iter().position(|p| p == path) {
        let mut cycle: Vec<ModulePath> = stack[pos..].to_vec();
        cycle.push(path.clone());
        return Err(LoadError::RecursiveImport { cycle });
    }

    let file = resolve_file(search_path, path).ok_or_else(|| LoadError::UnresolvedModule {
        path: path.clone(),
        search_path: search_path.to_vec(),
    })?;

    let source = std::fs::read_to_string(&file).map_err(|e| LoadError::Io {
        path: file.clone(),
        message: e.to_string(),
    })?;

    let source_name = file.display().to_string();
    let parsed = Parser::new(&source, &source_name).parse_module()?;

    stack.push(path.clone());
    for dep in &parsed.deps {
        load_module(search_path, dep, loaded, loaded_paths, stack)?;
    }
    stack.pop();

    loaded_paths.insert(path.clone());
    loaded.push(Module {
        path: path.clone(),
        body: parsed.body,
        deps: parsed.deps,
        source_path: file,
    });
    Ok(())
}

/// Reject module path components containing a `/` (spec.md section 4.1:
/// "Reject module names containing `/`"). The parser never produces such a
/// name from `/A/B%` syntax, but a `ModulePath` built programmatically
/// (e.g. from a CLI `-m` flag) must be validated explicitly.
pub fn validate_module_path(path: &ModulePath) -> Result<(), LoadError> {
    for name in &path.components {
        if name.text.contains('/') {
            return Err(LoadError::Io {
                path: PathBuf::from(&name.text),
                message: format!("module name {:?} may not contain '/'", name.text),
            });
        }
    }
    Ok(())
}

/// Parse a `/A/B%` style module path given on the command line into a
/// [`ModulePath`], attributing every component to `loc`.
pub fn parse_module_path_arg(text: &str, source: Rc<str>) -> Result<ModulePath, LoadError> {
    let loc = Loc::new(source, 1, 1);
    let trimmed = text.strip_prefix('/').unwrap_or(text);
    let mut components = Vec::new();
    for part in trimmed.split('/') {
        if part.is_empty() {
            continue;
        }
        let split = fble_lexer::split_namespace(part);
        let space = if split.is_type {
            fble_common::NameSpace::Type
        } else {
            fble_common::NameSpace::Normal
        };
        components.push(fble_common::Name::new(split.text, space, loc.clone()));
    }
    // The trailing component of a module reference always carries the
    // `%` suffix as part of its text (see fble-syntax's parser doc comment
    // on `ModulePath` conventions).
    if let Some(last) = components.last_mut() {
        if !last.text.ends_with('%') {
            last.text.push('%');
        }
    }
    let path = ModulePath::new(components);
    validate_module_path(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_module(dir: &Path, rel: &str, contents: &str) {
        let full = dir.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(full).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_single_module_with_no_deps() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "Main.fble", "*()()");

        let root = parse_module_path_arg("/Main%", Rc::from("cli")).unwrap();
        let program = load(&[dir.path().to_path_buf()], root).unwrap();

        assert_eq!(program.modules.len(), 1);
        assert_eq!(program.root().path.to_string(), "/Main%");
    }

    #[test]
    fn orders_dependencies_leaf_first() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "Leaf.fble", "*()()");
        write_module(dir.path(), "Main.fble", "/Leaf%");

        let root = parse_module_path_arg("/Main%", Rc::from("cli")).unwrap();
        let program = load(&[dir.path().to_path_buf()], root).unwrap();

        let names: Vec<String> = program.modules.iter().map(|m| m.path.to_string()).collect();
        assert_eq!(names, vec!["/Leaf%".to_string(), "/Main%".to_string()]);
    }

    #[test]
    fn dedups_shared_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "Leaf.fble", "*()()");
        write_module(dir.path(), "A.fble", "/Leaf%");
        write_module(dir.path(), "B.fble", "/Leaf%");
        write_module(dir.path(), "Main.fble", "/A%(/B%)");

        let root = parse_module_path_arg("/Main%", Rc::from("cli")).unwrap();
        let program = load(&[dir.path().to_path_buf()], root).unwrap();

        let leaf_count = program
            .modules
            .iter()
            .filter(|m| m.path.to_string() == "/Leaf%")
            .count();
        assert_eq!(leaf_count, 1);
    }

    #[test]
    fn detects_recursive_import() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "A.fble", "/B%");
        write_module(dir.path(), "B.fble", "/A%");

        let root = parse_module_path_arg("/A%", Rc::from("cli")).unwrap();
        let err = load(&[dir.path().to_path_buf()], root).unwrap_err();
        assert!(matches!(err, LoadError::RecursiveImport { .. }));
    }

    #[test]
    fn unresolved_module_reports_search_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = parse_module_path_arg("/Missing%", Rc::from("cli")).unwrap();
        let err = load(&[dir.path().to_path_buf()], root).unwrap_err();
        assert!(matches!(err, LoadError::UnresolvedModule { .. }));
    }

    #[test]
    fn rejects_module_name_with_slash() {
        let loc = Loc::new(Rc::from("t"), 1, 1);
        let bad = ModulePath::new(vec![fble_common::Name::new(
            "a/b",
            fble_common::NameSpace::Normal,
            loc,
        )]);
        assert!(validate_module_path(&bad).is_err());
    }
}
