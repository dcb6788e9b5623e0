//! Variable scope with cross-function capture resolution (spec.md section
//! 4.3's `FuncValue` typing rule).
//!
//! Grounded on the original implementation's `Scope`/`Var`/`GetVar` triple:
//! each nested function scope keeps a `statics` cache of names it has
//! already pulled in from an enclosing scope, and a `locals` stack of names
//! bound directly within it (arguments, `let`/`exec` bindings). Looking up a
//! name that isn't local walks outward one frame at a time, caching the
//! result as a new `statics` entry in every frame it passes through and
//! recording the capture's source [`VarIndex`] so the enclosing `FuncValue`
//! knows what to close over at lowering time.

use rustc_hash::FxHashMap;

use fble_common::{ModulePath, Name, VarIndex};
use fble_types::TypeId;

/// Either a plain value/type name, or a module reference (spec.md section
/// 4.3.5: each module dependency is pushed once at the top of the module's
/// root frame, resolved the same way an ordinary name would be).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarName {
    Name(Name),
    Module(ModulePath),
}

/// Usage flags for one popped local, reported by [`Scope::pop_locals`].
#[derive(Debug, Clone, Copy)]
pub struct LocalStats {
    pub used: bool,
    pub accessed: bool,
}

struct Var {
    name: VarName,
    ty: TypeId,
    used: bool,
    accessed: bool,
    index: VarIndex,
}

/// One function's worth of scope: its own locals, its cache of captures
/// pulled in from enclosing frames, and (for a real `FuncValue`, as opposed
/// to the synthetic boundary used by [`Scope::with_type_only_frame`]) the
/// out-list of capture sources to record in the eventual `Tc::FuncValue`.
struct Frame {
    locals: Vec<Var>,
    statics: Vec<Var>,
    captured: Vec<VarIndex>,
    /// True only for the throwaway frame `TypeCheckExprForType` pushes: a
    /// lookup that reaches past this frame into its parent never marks the
    /// parent variable "used", since type-only expressions are erased
    /// entirely before anything would need to read them at runtime.
    phantom_boundary: bool,
}

impl Frame {
    fn new() -> Self {
        Frame {
            locals: Vec::new(),
            statics: Vec::new(),
            captured: Vec::new(),
            phantom_boundary: false,
        }
    }
}

pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    /// A fresh scope for one module's root: no parent, one frame.
    pub fn new_module_root() -> Self {
        Scope {
            frames: vec![Frame::new()],
        }
    }

    /// Push a new local binding into the current (innermost) frame, at the
    /// next local slot index.
    pub fn push_local(&mut self, name: VarName, ty: TypeId) -> VarIndex {
        let frame = self.frames.last_mut().expect("scope always has a frame");
        let index = VarIndex::local(frame.locals.len() as u32);
        frame.locals.push(Var {
            name,
            ty,
            used: false,
            accessed: false,
            index,
        });
        index
    }

    /// Pop the most recently pushed local from the current frame.
    pub fn pop_local(&mut self) {
        let frame = self.frames.last_mut().expect("scope always has a frame");
        frame.locals.pop().expect("pop_local with no local pushed");
    }

    /// Pop `n` locals and report, for each, whether it was used at runtime
    /// (drives the `Let` binding's `recursive` flag) and whether it was
    /// merely referenced at all, including phantom type-only lookups
    /// (drives the unused-variable warning -- spec.md section 4.3.6 warns
    /// on "never referenced", not "never used for its value").
    pub fn pop_locals(&mut self, n: usize) -> Vec<LocalStats> {
        let frame = self.frames.last_mut().expect("scope always has a frame");
        let start = frame.locals.len() - n;
        frame
            .locals
            .drain(start..)
            .map(|v| LocalStats {
                used: v.used,
                accessed: v.accessed,
            })
            .collect()
    }

    /// Look up a name, marking it (and every frame it is captured through)
    /// as accessed, and as used unless this is a phantom (type-only) lookup.
    pub fn get_var(&mut self, name: &VarName, phantom: bool) -> Option<(VarIndex, TypeId)> {
        self.get_var_in(self.frames.len() - 1, name, phantom)
    }

    fn get_var_in(
        &mut self,
        frame_idx: usize,
        name: &VarName,
        phantom: bool,
    ) -> Option<(VarIndex, TypeId)> {
        {
            let frame = &mut self.frames[frame_idx];
            if let Some(v) = frame.locals.iter_mut().rev().find(|v| &v.name == name) {
                v.accessed = true;
                v.used = v.used || !phantom;
                return Some((v.index, v.ty));
            }
            if let Some(v) = frame.statics.iter_mut().find(|v| &v.name == name) {
                v.accessed = true;
                v.used = v.used || !phantom;
                return Some((v.index, v.ty));
            }
        }

        if frame_idx == 0 {
            return None;
        }

        let parent_phantom = phantom || self.frames[frame_idx].phantom_boundary;
        let (parent_index, ty) = self.get_var_in(frame_idx - 1, name, parent_phantom)?;

        let frame = &mut self.frames[frame_idx];
        let index = VarIndex::static_(frame.statics.len() as u32);
        frame.statics.push(Var {
            name: name.clone(),
            ty,
            used: !phantom,
            accessed: true,
            index,
        });
        frame.captured.push(parent_index);
        Some((index, ty))
    }

    /// Enter a new function scope (spec.md section 4.3's `FuncValue` rule):
    /// pushes a fresh frame, runs `f`, then pops it and returns `f`'s result
    /// together with the frame's capture out-list.
    pub fn with_function_frame<T>(&mut self, f: impl FnOnce(&mut Scope) -> T) -> (T, Vec<VarIndex>) {
        self.frames.push(Frame::new());
        let result = f(self);
        let frame = self.frames.pop().expect("frame just pushed");
        (result, frame.captured)
    }

    /// Enter the synthetic "type-only" boundary `TypeCheckExprForType` uses:
    /// like [`Self::with_function_frame`], but any lookup that escapes this
    /// frame into its parent is forced phantom, and the frame's own capture
    /// list is discarded (nothing downstream ever reads it).
    pub fn with_type_only_frame<T>(&mut self, f: impl FnOnce(&mut Scope) -> T) -> T {
        let mut frame = Frame::new();
        frame.phantom_boundary = true;
        self.frames.push(frame);
        let result = f(self);
        self.frames.pop();
        result
    }

}

/// Whether a binding should be exempt from unused-variable warnings
/// (spec.md section 4.3.6): a `_`-prefixed name is intentionally discarded.
pub fn warn_if_unused(name: &Name) -> bool {
    !name.text.starts_with('_')
}

/// A cache of already-resolved module dependency types, keyed by path, built
/// once per module at the top of its root frame (spec.md section 4.3.5).
pub type ModuleVars = FxHashMap<ModulePath, (VarIndex, TypeId)>;
