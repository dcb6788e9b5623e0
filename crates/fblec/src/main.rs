//! The Fble core CLI: `fblec`.
//!
//! Wires the five pipeline stages (spec.md section 2) into one batch
//! run -- load, check, lower, link, interpret -- behind the CLI contract
//! every concrete front end (`fble-test`, `fble-stdio`, ...) is specified
//! to share (spec.md section 6.1). Those front ends themselves, and the
//! standard-library application modules they run, are out of scope
//! (spec.md section 1); this binary exists to exercise the core end to
//! end and to drive the `--profile` pprof export.
//!
//! Options:
//! - `-h`/`--help` - usage and exit 0
//! - `-v`/`--version` - version line and exit 0
//! - `-I DIR` - append `DIR` to the module search path (repeatable)
//! - `-m`/`--module MODULE_PATH` - the module to run
//! - `--profile FILE` - write a pprof-format profile report to `FILE` on exit
//! - `--` - end of options; remaining args are passed to the loaded program
//!
//! Exit codes (spec.md section 6.1): 0 success, 1 compile error, 2 runtime
//! error, 3 usage error, 4 other error (e.g. failure to open the profile
//! file).

use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use clap::Parser;

use fble_bc::{Instr, Module};
use fble_heap::{Heap, Value, ValueId};
use fble_interp::{eval_program, NoIo};
use fble_profile::Profile;

const EXIT_OK: i32 = 0;
const EXIT_COMPILE_ERROR: i32 = 1;
const EXIT_RUNTIME_ERROR: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 3;
const EXIT_OTHER_ERROR: i32 = 4;

#[derive(Parser)]
#[command(
    name = "fblec",
    about = "Load, check, and run an Fble module",
    disable_version_flag = true
)]
struct Cli {
    /// Append DIR to the module search path.
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// The module to run, e.g. /Main%.
    #[arg(short = 'm', long = "module", value_name = "MODULE_PATH")]
    module: Option<String>,

    /// Write a pprof-format profile report to FILE on exit.
    #[arg(long = "profile", value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Print the version line and exit.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::SetTrue)]
    version: bool,

    /// Arguments passed through to the loaded program, after `--`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    program_args: Vec<String>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                print!("{e}");
                process::exit(EXIT_OK);
            }
            eprint!("{e}");
            process::exit(EXIT_USAGE_ERROR);
        }
    };

    if cli.version {
        println!("fblec {}", env!("CARGO_PKG_VERSION"));
        process::exit(EXIT_OK);
    }

    let Some(module_arg) = cli.module else {
        eprintln!("fblec: usage error: -m/--module MODULE_PATH is required");
        process::exit(EXIT_USAGE_ERROR);
    };

    process::exit(run(&cli.include, &module_arg, cli.profile.as_deref(), &cli.program_args));
}

fn run(search_path: &[PathBuf], module_arg: &str, profile_path: Option<&std::path::Path>, _program_args: &[String]) -> i32 {
    let root = match fble_loader::parse_module_path_arg(module_arg, Rc::from("<command line>")) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_USAGE_ERROR;
        }
    };

    let program = match fble_loader::load(search_path, root) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{e}");
            return match e {
                fble_loader::LoadError::Io { .. } => EXIT_OTHER_ERROR,
                _ => EXIT_COMPILE_ERROR,
            };
        }
    };

    let checked = match fble_check::check_program(&program) {
        Ok(checked) => checked,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_COMPILE_ERROR;
        }
    };
    for warning in &checked.warnings {
        eprint!(
            "{}",
            fble_common::format_diagnostic(&warning.loc, fble_common::Severity::Warning, &warning.message)
        );
    }

    let mut modules = fble_bc::lower_program(&checked.modules);
    let profile_block_names = link_profile_ids(&mut modules);

    let enable_profile = profile_path.is_some();
    let profile = Profile::new(enable_profile, profile_block_names);
    let mut thread = profile.new_thread();

    let mut heap = Heap::new();
    let mut io = NoIo;
    let result = {
        let thread_ref = thread.as_mut();
        eval_program(&mut heap, thread_ref, &mut io, &modules)
    };
    drop(thread);

    let exit = match result {
        Ok(value) => {
            println!("{}", describe_value(&heap, value));
            EXIT_OK
        }
        Err(e) => {
            eprintln!("{e}");
            EXIT_RUNTIME_ERROR
        }
    };

    if let Some(path) = profile_path {
        if let Err(e) = std::fs::write(path, profile.to_pprof()) {
            eprintln!("fblec: could not write profile to {}: {e}", path.display());
            return EXIT_OTHER_ERROR;
        }
    }

    exit
}

/// Renumber every module's `profile_block_id`s (on both its `CodeBlock`s and
/// their `ProfileEnter`/`ProfileReplace` instructions) from module-local
/// indices into one flat, program-wide id space, and return the combined
/// name table in that same order (spec.md section 3.7's `profile_blocks`,
/// flattened across every linked module). `fble-bc::lower_module` numbers
/// each module's own blocks from zero -- plugging more than one module's
/// bytecode into a single shared `Profile` (spec.md section 4.7) requires
/// offsetting every module but the first by the block count of every module
/// already placed before it.
fn link_profile_ids(modules: &mut [Module]) -> Vec<fble_common::Name> {
    let mut names = Vec::new();
    let mut offset: u32 = 0;
    for module in modules.iter_mut() {
        let count = module.profile_blocks.len() as u32;
        if offset > 0 {
            for block in &mut module.blocks {
                block.profile_block_id += offset;
                for instr in &mut block.instructions {
                    match instr {
                        Instr::ProfileEnter { block_id } | Instr::ProfileReplace { block_id } => {
                            *block_id += offset;
                        }
                        _ => {}
                    }
                }
            }
        }
        names.extend(module.profile_blocks.iter().cloned());
        offset += count;
    }
    names
}

/// A short, source-free textual rendering of a result value -- struct field
/// count, union tag, or an opaque marker for `Func`/`Native`/`Ref`. Good
/// enough to confirm a batch run actually produced something without
/// reproducing any concrete front end's own value-printing conventions
/// (those live in `fble-test`/`fble-stdio`, out of scope per spec.md
/// section 1).
fn describe_value(heap: &Heap, id: ValueId) -> String {
    match heap.get(id) {
        Value::Struct(fields) => {
            let rendered: Vec<String> = fields.iter().map(|f| describe_value(heap, *f)).collect();
            format!("*({})", rendered.join(","))
        }
        Value::Union { tag, arg, .. } => format!("{}:{}", tag, describe_value(heap, *arg)),
        Value::Func { .. } => "<func>".to_string(),
        Value::Native { .. } => "<native>".to_string(),
        Value::Ref(Some(inner)) => describe_value(heap, *inner),
        Value::Ref(None) => "<undefined ref>".to_string(),
    }
}
