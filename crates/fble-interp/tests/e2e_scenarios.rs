//! Real source-to-result end-to-end tests covering the documented pipeline
//! scenarios (spec.md section 8.3): each test writes actual `.fble` source
//! to a temp search-path root and drives it through the full
//! load -> check -> lower -> run pipeline, the same sequence `fblec`'s
//! `main.rs` drives, rather than hand-building a `Tc` tree or bytecode
//! directly. Unlike `fblec/tests/e2e.rs`, these run in-process so a test
//! can inspect the resulting `Profile`/`Heap` state directly instead of
//! only the CLI's stdout.

use std::path::{Path, PathBuf};

use fble_bc::Module as BcModule;
use fble_heap::{Executable, Heap, Value};
use fble_interp::{eval_program, NoIo};
use fble_profile::Profile;

fn write_module(dir: &Path, rel: &str, contents: &str) {
    let full = dir.join(rel);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, contents).unwrap();
}

/// Load, check, and lower every module rooted at `root` (e.g. `/Main%`)
/// under `dir`, panicking with the stage's error on failure -- the
/// pipeline glue `fblec::main::run` drives, minus argument parsing and
/// exit codes.
fn compile(dir: &Path, root: &str) -> Vec<BcModule> {
    let root_path = fble_loader::parse_module_path_arg(root, std::rc::Rc::from("<test>")).expect("module path");
    let program = fble_loader::load(&[PathBuf::from(dir)], root_path).expect("load");
    let checked = fble_check::check_program(&program).expect("check");
    fble_bc::lower_program(&checked.modules)
}

#[test]
fn enum_not_flips_a_union_tag() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "Main.fble",
        "@ Unit@ = *();\n\
         @ Bool@ = +(Unit@ True, Unit@ False);\n\
         (Bool@; Bool@) Not = (Bool@ b) {\n\
           b?(True: Bool@:False(Unit@()), False: Bool@:True(Unit@()))\n\
         };\n\
         Not(Bool@:True(Unit@()))",
    );

    let modules = compile(dir.path(), "/Main%");
    let mut heap = Heap::new();
    let result = eval_program(&mut heap, None, &mut NoIo, &modules).expect("run");

    assert_eq!(heap.union_tag(result), 1, "Not(True) should select the False arm");
}

/// The process-link scenario (spec.md section 8.3.5): a `Link` opens a
/// get/put port pair, an `Exec` binding runs `put` to fill the slot, and
/// the `Link`'s body is the bare `get` reference -- the one surface form
/// `fble-check`'s `run_process` actually forces into a zero-argument call
/// (see `infer.rs`'s doc comment on `run_process`). `Exec`'s own trailing
/// body position is not forced the same way (spec.md section 4.3's typing
/// table gives `Exec`'s type as plain `type(body)`, no process coercion),
/// so here the program hands back the still-unforced `get` closure and
/// this test plays the role of the host IO driver, making the one
/// remaining call itself -- exactly what a `ProcessIo` implementation
/// would do on the program's behalf.
#[test]
fn process_link_puts_then_gets_true() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "Main.fble",
        "@ Unit@ = *();\n\
         @ Bool@ = +(Unit@ True, Unit@ False);\n\
         Link(Bool@; get, put) {\n\
           Exec(Unit@ ignored = put(Bool@:True(Unit@()))) {\n\
             get\n\
           }\n\
         }",
    );

    let modules = compile(dir.path(), "/Main%");
    let mut heap = Heap::new();
    let result = eval_program(&mut heap, None, &mut NoIo, &modules).expect("run");

    match heap.get(result) {
        Value::Func { executable: Executable::Native(_), .. } => {}
        other => panic!("expected the unforced get closure, got {other:?}"),
    }
    let outcome = fble_interp::call_native_for_test(&mut heap, result, &[]).expect("get should not block");
    let value = match outcome {
        fble_heap::NativeOutcome::Existing(v) => v,
        other => panic!("expected a value the put already delivered, got {other:?}"),
    };
    assert_eq!(heap.union_tag(value), 0, "get should read back the True put into the port");
}

/// The tail-recursion scenario (spec.md section 8.3.3 / invariant 8.1.6):
/// a self-recursive `CountDown` walks a million-deep Peano `Nat@` purely
/// via tail calls. The million-deep *argument* is built directly on the
/// heap (a plain loop, not recursion) rather than by parsing a
/// million-token literal -- no test harness would hand-author that much
/// source -- but `CountDown` itself is real compiled-and-run bytecode, so
/// a broken tail-call (or a broken local-slot assignment that clobbers
/// `n` on each recursive step) would still make this fail or hang.
#[test]
fn tail_recursion_counts_down_a_million_without_growing_the_stack() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "Main.fble",
        "@ Unit@ = *();\n\
         @ Nat@ = +(Unit@ Z, Nat@ S);\n\
         (Nat@; Unit@) CountDown = (Nat@ n) {\n\
           n?(Z: n.Z, S: CountDown(n.S))\n\
         };\n\
         CountDown",
    );

    let modules = compile(dir.path(), "/Main%");
    let mut heap = Heap::new();
    let count_down = eval_program(&mut heap, None, &mut NoIo, &modules).expect("run");

    const GENERIC_TAGWIDTH: u32 = 31;
    let unit = heap.new_struct(Vec::new());
    let mut n = heap.new_union(GENERIC_TAGWIDTH, 0, unit);
    for _ in 0..1_000_000u32 {
        n = heap.new_union(GENERIC_TAGWIDTH, 1, n);
    }

    let mut interp = fble_interp::Interpreter::new();
    let result = interp.run(&mut heap, None, &mut NoIo, count_down, vec![n]).expect("tail recursion should not overflow");
    match heap.get(result) {
        Value::Struct(fields) => assert!(fields.is_empty(), "CountDown should bottom out at the Unit@ payload of Z"),
        other => panic!("expected the Z payload (an empty struct), got {other:?}"),
    }
}

/// The profile-count scenario (spec.md section 8.3.4), grounded on
/// `examples/original_source/test/profiles-test.c`'s `Not`/`t`/`f`/`f2`
/// program. Every nested `FuncValue` in this port lowers to a generically
/// named `"<func>"` profile block (`fble-bc/src/lower.rs`'s `Tc::FuncValue`
/// arm), so blocks can't be looked up by name the way the original's
/// per-function block names allow; this asserts on block indices instead,
/// which are deterministic for a fixed source (block 0 is always the
/// module root, block 1 is the first -- and here the only -- nested
/// `FuncValue`, `Not`'s body).
#[test]
fn profile_counts_match_the_documented_not_scenario() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "Main.fble",
        "@ Unit@ = *();\n\
         @ Bool@ = +(Unit@ True, Unit@ False);\n\
         (Bool@; Bool@) Not = (Bool@ b) {\n\
           b?(True: Bool@:False(Unit@()), False: Bool@:True(Unit@()))\n\
         };\n\
         Bool@ t = Not(Bool@:False(Unit@()));\n\
         Bool@ f = Not(Bool@:True(Unit@()));\n\
         Bool@ f2 = Not(Bool@:True(Unit@()));\n\
         *(t, f, f2)",
    );

    let modules = compile(dir.path(), "/Main%");
    assert_eq!(modules.len(), 1);
    let profile_block_names = modules[0].profile_blocks.clone();
    let profile = Profile::new(true, profile_block_names);
    let mut thread = profile.new_thread();

    let mut heap = Heap::new();
    let mut io = NoIo;
    let result = eval_program(&mut heap, thread.as_mut(), &mut io, &modules).expect("run");
    drop(thread);

    assert_eq!(heap.union_tag(heap.struct_field(result, 0)), 0, "t = Not(False) should select the True arm");
    assert_eq!(profile.count(1), 3, "Not's body block should be entered once per call site: t, f, f2");
    assert_eq!(profile.calls(0, 1), 3, "all three calls to Not originate from the module's own top-level block");
}

/// The cross-package abstraction scenario (spec.md section 8.3.6): a value
/// cast into an abstract type under package `/Pkg` may only be read back
/// out (`AbstractAccess`, `.@`) by code whose own module path falls under
/// that package (`fble-check`'s `check_package_access`). A module path's
/// trailing component always carries the `%` that a package path never
/// does (`fble-syntax/src/parser.rs`'s module-path-vs-package-path
/// convention), so `/Pkg` is a prefix of `/Pkg/Mod%` but `/Other%` is not.
#[test]
fn abstract_access_from_outside_the_package_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "Pkg/Mod.fble",
        "@ Unit@ = *();\n%/Pkg @(Unit@, Unit@())",
    );
    write_module(dir.path(), "Other.fble", "/Pkg/Mod%.@");

    let root = fble_loader::parse_module_path_arg("/Other%", std::rc::Rc::from("<test>")).expect("module path");
    let program = fble_loader::load(&[dir.path().to_path_buf()], root).expect("load");
    let err = fble_check::check_program(&program).expect_err("access from outside /Pkg must be rejected");

    assert!(
        err.message.contains("is not part of package"),
        "unexpected check error: {}",
        err.message
    );
}
