//! Translate a checked module's [`Tc`] tree into bytecode (spec.md section
//! 4.4): one [`CodeBlock`] per module body and per nested `FuncValue`,
//! flattened into a single per-module block table and referenced by
//! [`BlockRef`].
//!
//! Grounded on `snow-codegen/src/mir/lower.rs`'s single recursive `lower`
//! walk over a typed tree with a small per-function register/builder state,
//! adapted from "typed tree -> MIR -> LLVM" to "typed tree -> flat
//! register bytecode" (no SSA, no basic-block CFG -- just instruction-index
//! jumps into one flat `Vec<Instr>` per block, per spec.md section 3.5).
//!
//! Register allocation follows spec.md section 4.4 literally: "function args
//! first, then let-bound locals, then temporaries", with no live-range
//! analysis -- every sub-expression gets a fresh local unless it can reuse
//! an existing one as a plain operand [`Src`] without a destination.
//!
//! Tail calls are handled by keeping two lowering entry points per `Tc`
//! subtree: [`Lowerer::lower`] (value-producing, returns a [`Src`]) and
//! [`Lowerer::lower_tail`] (block-terminating, always ends the instruction
//! stream in a `Return` or a tail `Call`). A `UnionSelect` in tail position
//! lowers each branch straight to its own `Return`, with no merge point --
//! unlike the non-tail case, which copies every branch's result into one
//! shared local before falling through to a common continuation. This
//! matters because a tail `Call` replaces the current frame in place (spec.md
//! section 4.6.2): nothing may run after it in the same frame, so a merge
//! point following a tail call would read through a frame that no longer
//! exists.
//!
//! `fble-check`'s `Scope` resolves `Tc::Link`'s `get`/`put` ports and
//! `Tc::Exec`'s bindings in the *same* function frame as their surrounding
//! code (no `with_function_frame` boundary -- see `fble-check/src/scope.rs`
//! and `fble-check/src/infer.rs`'s `Link`/`Exec` arms). So, despite being
//! typed as `ProcType`, both lower inline into the enclosing block rather
//! than as a separate closure: there is no "thunk" to build and `Call`.
//! `Exec` bindings lower exactly like a non-recursive `Let` (each binding
//! checked, in order, before its own name enters scope -- see
//! `infer.rs`'s `Exec` arm -- so no forward reference is possible and no
//! `Ref`/`RefDef` fixpoint is needed).
//!
//! `ProfileReplace` (spec.md section 3.5) is never emitted by this lowerer:
//! "`Call` lowers tail calls as `ProfileReplace` in the run path" (section
//! 4.4) is read here as describing the *interpreter's* action when it
//! executes a tail `Call` (it already knows the callee's `profile_block_id`
//! at that point, dynamically, from the `Value` being called), not a
//! separate static instruction the lowerer could emit ahead of time without
//! knowing which function value will occupy `func` at run time.

use fble_check::tc::{Binding, Choice};
use fble_check::{CheckedModule, Tc};
use fble_common::{Loc, Name, NameSpace, VarIndex, VarSource};
use fble_types::DataKind;

use crate::instr::{BlockRef, CodeBlock, Instr, Local, Src};
use crate::module::Module;

/// Lower every module of a checked program. Each module's block table is
/// independent (no cross-module block references -- inter-module values
/// flow through ordinary `Var`/`Call` on the dependency's already-lowered
/// top-level value, exactly like any other captured static).
pub fn lower_program(modules: &[CheckedModule]) -> Vec<Module> {
    modules.iter().map(lower_module).collect()
}

pub fn lower_module(module: &CheckedModule) -> Module {
    let mut lowerer = Lowerer {
        blocks: Vec::new(),
        profile_blocks: Vec::new(),
    };
    let name = Name::new(module.path.to_string(), NameSpace::Normal, Loc::synthetic());
    let top = lowerer.lower_function(module.deps.len() as u32, 0, &module.tc, name);
    debug_assert_eq!(top.0, 0, "a module's own top-level block is always block 0");
    Module {
        path: module.path.clone(),
        deps: module.deps.clone(),
        blocks: lowerer.blocks,
        profile_blocks: lowerer.profile_blocks,
    }
}

/// Per-module lowering state: the flat block table under construction.
struct Lowerer {
    blocks: Vec<CodeBlock>,
    profile_blocks: Vec<Name>,
}

/// Per-block lowering state: the instruction stream and register allocator
/// for one [`CodeBlock`] currently being built.
struct Builder {
    instructions: Vec<Instr>,
    next_local: u32,
    /// The most specific `Loc` lowering has passed through so far, used for
    /// `Call` sites that have no `Loc` of their own on `Tc::FuncApply`
    /// (spec.md section 3.4's `Tc` table carries a `Loc` on `DataAccess`,
    /// `Let`/`Exec` bindings, `UnionSelect` choices, and `FuncValue`'s body,
    /// but not on plain application).
    current_loc: Loc,
}

impl Builder {
    fn fresh(&mut self) -> Local {
        let l = self.next_local;
        self.next_local += 1;
        l
    }

    fn push(&mut self, instr: Instr) {
        self.instructions.push(instr);
    }
}

fn var_src(idx: VarIndex) -> Src {
    match idx.source {
        VarSource::Local => Src::Local(idx.index),
        VarSource::Static => Src::Static(idx.index),
    }
}

impl Lowerer {
    fn lower_function(&mut self, num_args: u32, num_statics: u32, body: &Tc, name: Name) -> BlockRef {
        let id = self.blocks.len() as u32;
        self.blocks.push(CodeBlock::new(num_args, num_statics, id));
        self.profile_blocks.push(name.clone());

        // Register allocation follows spec.md section 4.4 literally: args
        // first, then let-bound locals, then temporaries. `fble-check`'s
        // `Scope` already assigned every named binding in this frame its
        // slot (`scope.rs`'s `push_local`, carried here via `Binding::index`
        // / `Tc::Link`'s `get_index`/`put_index`); `named_local_high_water`
        // finds the top of that range so temporaries (`Builder::fresh`)
        // start strictly above every named local instead of racing them for
        // the same slot numbers.
        let mut next_local = num_args;
        named_local_high_water(body, &mut next_local);

        let mut builder = Builder {
            instructions: vec![Instr::ProfileEnter { block_id: id }],
            next_local,
            current_loc: name.loc.clone(),
        };
        self.lower_tail(&mut builder, body);

        let block = &mut self.blocks[id as usize];
        block.num_locals = builder.next_local;
        block.instructions = builder.instructions;
        BlockRef(id)
    }

    /// Lower `tc` as a value, returning the operand its result ends up in.
    /// Never emits `Return` -- the caller decides what happens next.
    fn lower(&mut self, b: &mut Builder, tc: &Tc) -> Src {
        match tc {
            Tc::Var(idx) => var_src(*idx),

            Tc::Let { recursive, bindings, body } => {
                self.lower_bindings(b, *recursive, bindings);
                self.lower(b, body)
            }

            Tc::StructValue(fields) => {
                let srcs: Vec<Src> = fields.iter().map(|f| self.lower(b, f)).collect();
                let dst = b.fresh();
                b.push(Instr::StructValue { dst, fields: srcs });
                Src::Local(dst)
            }

            Tc::UnionValue { tag, arg } => {
                let arg_src = self.lower(b, arg);
                let dst = b.fresh();
                b.push(Instr::UnionValue { dst, tag: *tag, arg: arg_src });
                Src::Local(dst)
            }

            Tc::UnionSelect { condition, choices } => self.lower_union_select(b, condition, choices, false),

            Tc::DataAccess { kind, object, tag, loc } => {
                let obj_src = self.lower(b, object);
                b.current_loc = loc.clone();
                let dst = b.fresh();
                let instr = match kind {
                    DataKind::Struct => Instr::StructAccess { dst, obj: obj_src, tag: *tag, loc: loc.clone() },
                    DataKind::Union => Instr::UnionAccess { dst, obj: obj_src, tag: *tag, loc: loc.clone() },
                };
                b.push(instr);
                Src::Local(dst)
            }

            Tc::FuncValue { captures, args, body, body_loc } => {
                let capture_srcs: Vec<Src> = captures.iter().map(|idx| var_src(*idx)).collect();
                let name = Name::new("<func>", NameSpace::Normal, body_loc.clone());
                let block = self.lower_function(args.len() as u32, captures.len() as u32, body, name);
                let dst = b.fresh();
                b.push(Instr::FuncValue { dst, code: block, captures: capture_srcs });
                Src::Local(dst)
            }

            Tc::FuncApply { func, args } => {
                let (dst, _) = self.lower_call(b, func, args, false);
                Src::Local(dst)
            }

            Tc::Link { get_index, put_index, body, .. } => {
                self.lower_link_ports(b, *get_index, *put_index);
                self.lower(b, body)
            }

            Tc::Exec { bindings, body } => {
                self.lower_exec_bindings(b, bindings);
                self.lower(b, body)
            }

            Tc::List(elements) => {
                let srcs: Vec<Src> = elements.iter().map(|e| self.lower(b, e)).collect();
                let dst = b.fresh();
                b.push(Instr::List { dst, elements: srcs });
                Src::Local(dst)
            }

            Tc::Literal(tags) => {
                let dst = b.fresh();
                b.push(Instr::Literal { dst, tags: tags.clone() });
                Src::Local(dst)
            }

            Tc::TypeValue => {
                let dst = b.fresh();
                b.push(Instr::Type { dst });
                Src::Local(dst)
            }
        }
    }

    /// Lower `tc` in tail/return position: the emitted instructions always
    /// end the block, either in `Return` or in a tail `Call`.
    fn lower_tail(&mut self, b: &mut Builder, tc: &Tc) {
        match tc {
            Tc::Let { recursive, bindings, body } => {
                self.lower_bindings(b, *recursive, bindings);
                self.lower_tail(b, body);
            }

            Tc::Exec { bindings, body } => {
                self.lower_exec_bindings(b, bindings);
                self.lower_tail(b, body);
            }

            Tc::Link { get_index, put_index, body, .. } => {
                self.lower_link_ports(b, *get_index, *put_index);
                self.lower_tail(b, body);
            }

            Tc::UnionSelect { condition, choices } => {
                self.lower_union_select(b, condition, choices, true);
            }

            Tc::FuncApply { func, args } => {
                self.lower_call(b, func, args, true);
            }

            _ => {
                let src = self.lower(b, tc);
                b.push(Instr::ProfileExit);
                b.push(Instr::Return { src });
            }
        }
    }

    /// Shared `Let`/`Exec`-style binding lowering for the non-tail-producing
    /// bindings that precede a body. Recursive lets use `Ref`/`RefDef` to
    /// support forward/mutual reference (spec.md section 4.4); otherwise
    /// each binding's value is computed and copied straight into its slot.
    /// Every binding places its value at `binding.index` -- the exact local
    /// `fble-check`'s `Scope` assigned it (`scope.rs`'s `push_local`) and
    /// that every `Tc::Var` referencing it was resolved against, rather
    /// than a slot the Lowerer derives on its own (`named_local_high_water`
    /// already reserved this range ahead of any temporary).
    fn lower_bindings(&mut self, b: &mut Builder, recursive: bool, bindings: &[Binding]) {
        if recursive {
            for binding in bindings {
                b.push(Instr::Ref { dst: binding.index.index });
            }
            for binding in bindings {
                b.current_loc = binding.loc.clone();
                let value = self.lower(b, &binding.tc);
                b.push(Instr::RefDef { r: binding.index.index, value });
            }
        } else {
            for binding in bindings {
                b.current_loc = binding.loc.clone();
                let value = self.lower(b, &binding.tc);
                b.push(Instr::Copy { dst: binding.index.index, src: value });
            }
        }
    }

    /// `Tc::Exec` bindings are always sequential/non-recursive (spec.md
    /// section 4.3's `Exec` typing rule checks each binding before pushing
    /// its own name into scope), so this is `lower_bindings`'s non-recursive
    /// arm without the shared `recursive` parameter.
    fn lower_exec_bindings(&mut self, b: &mut Builder, bindings: &[Binding]) {
        for binding in bindings {
            b.current_loc = binding.loc.clone();
            let value = self.lower(b, &binding.tc);
            b.push(Instr::Copy { dst: binding.index.index, src: value });
        }
    }

    /// Emit the `Link` instruction pairing a `Tc::Link`'s two port locals,
    /// at the exact slots `fble-check` resolved `get`/`put` to (see
    /// `lower_bindings`'s doc comment).
    fn lower_link_ports(&mut self, b: &mut Builder, get_index: VarIndex, put_index: VarIndex) -> (Local, Local) {
        let get = get_index.index;
        let put = put_index.index;
        b.push(Instr::Link { get, put });
        (get, put)
    }

    /// Lower a `Tc::FuncApply` as a `Call`. Returns the destination local
    /// (meaningful only when `tail` is false -- a tail call replaces the
    /// frame, so nothing downstream reads `dst`).
    fn lower_call(&mut self, b: &mut Builder, func: &Tc, args: &[Tc], tail: bool) -> (Local, Src) {
        let func_src = self.lower(b, func);
        let arg_srcs: Vec<Src> = args.iter().map(|a| self.lower(b, a)).collect();
        let dst = b.fresh();
        let loc = b.current_loc.clone();
        b.push(Instr::Call { dst, func: func_src, args: arg_srcs, tail, loc });
        (dst, Src::Local(dst))
    }

    /// Lower a `Tc::UnionSelect`. In tail position every branch ends in its
    /// own `Return`/tail `Call` with no merge point (see the module doc
    /// comment); otherwise every branch copies its result into one shared
    /// local and falls through to a common continuation after the table.
    fn lower_union_select(&mut self, b: &mut Builder, condition: &Tc, choices: &[Choice], tail: bool) -> Src {
        let cond_src = self.lower(b, condition);

        // Reserve the `UnionSelect` instruction's slot; its `targets` are
        // only known once every branch has been laid out below.
        let select_idx = b.instructions.len();
        b.push(Instr::Jump { offset: 0 });

        let mut targets = Vec::with_capacity(choices.len());
        let merge_dst = if tail { None } else { Some(b.fresh()) };
        let mut merge_jumps = Vec::new();

        for choice in choices {
            targets.push(b.instructions.len() as u32);
            b.current_loc = choice.loc.clone();
            if tail {
                self.lower_tail(b, &choice.tc);
            } else {
                let value = self.lower(b, &choice.tc);
                b.push(Instr::Copy { dst: merge_dst.expect("non-tail select always allocates a merge local"), src: value });
                merge_jumps.push(b.instructions.len());
                b.push(Instr::Jump { offset: 0 });
            }
        }

        let merge_point = b.instructions.len() as u32;
        for &jump_idx in &merge_jumps {
            patch_jump(b, jump_idx, merge_point);
        }

        b.instructions[select_idx] = Instr::UnionSelect { condition: cond_src, targets };

        match merge_dst {
            Some(dst) => Src::Local(dst),
            None => Src::Local(0), // unread: tail position never consumes this
        }
    }
}

/// Walk `tc`, raising `high_water` past every named local slot
/// (`Binding::index`, `Tc::Link`'s `get_index`/`put_index`) it finds, without
/// descending into a nested `Tc::FuncValue` -- that body lowers into its own
/// block with its own, independently numbered, frame. Starting
/// `Builder::fresh`'s bump counter at the result (see `lower_function`)
/// keeps every compiler temporary strictly above the named-local range
/// `fble-check`'s `Scope` already carved out, so `Tc::Var`'s Checker-assigned
/// index and the Lowerer's physical slot always agree.
fn named_local_high_water(tc: &Tc, high_water: &mut u32) {
    match tc {
        Tc::Var(_) | Tc::Literal(_) | Tc::TypeValue => {}

        Tc::StructValue(fields) => fields.iter().for_each(|f| named_local_high_water(f, high_water)),

        Tc::UnionValue { arg, .. } => named_local_high_water(arg, high_water),

        Tc::UnionSelect { condition, choices } => {
            named_local_high_water(condition, high_water);
            for choice in choices {
                named_local_high_water(&choice.tc, high_water);
            }
        }

        Tc::DataAccess { object, .. } => named_local_high_water(object, high_water),

        // A nested function's locals live in its own block's frame.
        Tc::FuncValue { .. } => {}

        Tc::FuncApply { func, args } => {
            named_local_high_water(func, high_water);
            for arg in args {
                named_local_high_water(arg, high_water);
            }
        }

        Tc::Link { get_index, put_index, body, .. } => {
            *high_water = (*high_water).max(get_index.index + 1).max(put_index.index + 1);
            named_local_high_water(body, high_water);
        }

        Tc::Exec { bindings, body } => {
            for binding in bindings {
                *high_water = (*high_water).max(binding.index.index + 1);
                named_local_high_water(&binding.tc, high_water);
            }
            named_local_high_water(body, high_water);
        }

        Tc::List(elements) => elements.iter().for_each(|e| named_local_high_water(e, high_water)),

        Tc::Let { bindings, body, .. } => {
            for binding in bindings {
                *high_water = (*high_water).max(binding.index.index + 1);
                named_local_high_water(&binding.tc, high_water);
            }
            named_local_high_water(body, high_water);
        }
    }
}

/// Rewrite the `Jump` at `jump_idx` to a relative offset landing on
/// `target` (spec.md section 3.5: "relative PC jump (signed)", relative to
/// the instruction *after* the jump).
fn patch_jump(b: &mut Builder, jump_idx: usize, target: u32) {
    let offset = target as i32 - (jump_idx as i32 + 1);
    b.instructions[jump_idx] = Instr::Jump { offset };
}

#[cfg(test)]
mod tests {
    use super::*;
    use fble_check::check_program;
    use fble_loader::Program;
    use fble_syntax::parser::parse_module;
    use fble_common::ModulePath;

    fn program_from(source: &str) -> Program {
        let parsed = parse_module(source, "Main.fble").expect("parses");
        Program {
            modules: vec![fble_loader::Module {
                path: ModulePath::new(vec![]),
                body: parsed.body,
                deps: parsed.deps,
                source_path: "Main.fble".into(),
            }],
        }
    }

    fn lower_source(source: &str) -> Module {
        let program = program_from(source);
        let checked = check_program(&program).expect("type-checks");
        lower_module(&checked.modules[0])
    }

    #[test]
    fn lowers_unit_struct_to_a_single_block() {
        let module = lower_source("*()()");
        assert_eq!(module.blocks.len(), 1);
        let block = &module.blocks[0];
        assert!(matches!(block.instructions.last(), Some(Instr::Return { .. })));
    }

    #[test]
    fn lowers_func_value_to_its_own_block() {
        let module = lower_source("(*() x){ x }(*()())");
        assert!(module.blocks.len() >= 2, "func value gets a nested block");
    }

    /// Regression test for the Checker/Lowerer slot mismatch: a `let`
    /// nested inside a non-first struct field used to read whatever slot
    /// the Lowerer's flat temporary counter happened to be at, rather than
    /// the slot `fble-check`'s `Scope` actually assigned the binding
    /// (`scope.rs`'s `push_local` numbers only named bindings, so the
    /// field before it -- a temporary, not a named local -- must not shift
    /// `x`'s slot).
    #[test]
    fn let_nested_in_a_non_first_struct_field_reads_its_own_slot() {
        let loc = Loc::synthetic();
        let x_name = Name::new("x", NameSpace::Normal, loc.clone());

        // *( <opaque unit>, { let x = <opaque unit>; x } )
        let body = Tc::StructValue(vec![
            Tc::StructValue(vec![]),
            Tc::Let {
                recursive: false,
                bindings: vec![Binding {
                    name: x_name,
                    loc: loc.clone(),
                    tc: Tc::StructValue(vec![]),
                    index: VarIndex::local(0),
                }],
                body: Box::new(Tc::Var(VarIndex::local(0))),
            },
        ]);

        let mut lowerer = Lowerer {
            blocks: Vec::new(),
            profile_blocks: Vec::new(),
        };
        let name = Name::new("Test", NameSpace::Normal, loc);
        lowerer.lower_function(0, 0, &body, name);

        let block = &lowerer.blocks[0];
        let outer = block
            .instructions
            .iter()
            .find(|i| matches!(i, Instr::StructValue { fields, .. } if fields.len() == 2))
            .expect("the outer 2-field struct value is lowered");
        match outer {
            Instr::StructValue { fields, .. } => {
                assert_eq!(
                    fields[1],
                    Src::Local(0),
                    "the let's use of `x` must read the slot its own Copy wrote, not field 0's temporary"
                );
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn union_select_in_tail_position_has_no_merge_jumps() {
        let module = lower_source(
            "(+(*() t, *() f) x){ x?(t: *()(), f: *()()) }(+(*() t, *() f):t(*()()))",
        );
        // The func value's body block ends its select branches directly in
        // `Return`, never falling through to a shared `Jump`-then-`Return`.
        let func_block = module.blocks.iter().find(|bl| bl.num_args == 1).expect("func block");
        let returns = func_block
            .instructions
            .iter()
            .filter(|i| matches!(i, Instr::Return { .. }))
            .count();
        assert_eq!(returns, 2, "each branch returns directly");
    }
}
