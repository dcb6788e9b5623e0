//! The typed tree: the Checker's output, the Lowerer's input (spec.md
//! section 3.4). One variant per runtime action -- by the time a `Tc` tree
//! exists, every name has been resolved to a [`VarIndex`] and every type
//! question has been settled; nothing downstream ever looks a name up
//! again.

use fble_common::{Loc, Name, VarIndex};
use fble_types::DataKind;

/// One binding in a [`Tc::Let`] or [`Tc::Exec`]: the surface name (for
/// diagnostics and the Lowerer's debug info), the binding's own location,
/// its checked right-hand side, and the local slot `fble-check`'s `Scope`
/// reserved for it (`scope.rs`'s `push_local` return value, carried
/// verbatim so the Lowerer places the binding exactly where every
/// `Tc::Var` reference to it was already resolved to expect -- see
/// `fble-bc/src/lower.rs`'s module doc comment).
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: Name,
    pub loc: Loc,
    pub tc: Tc,
    pub index: VarIndex,
}

/// One arm of a [`Tc::UnionSelect`], in the union type's declared tag order.
#[derive(Debug, Clone)]
pub struct Choice {
    pub name: Name,
    pub loc: Loc,
    pub tc: Tc,
}

#[derive(Debug, Clone)]
pub enum Tc {
    Var(VarIndex),
    Let {
        recursive: bool,
        bindings: Vec<Binding>,
        body: Box<Tc>,
    },
    StructValue(Vec<Tc>),
    UnionValue {
        tag: u32,
        arg: Box<Tc>,
    },
    UnionSelect {
        condition: Box<Tc>,
        choices: Vec<Choice>,
    },
    DataAccess {
        kind: DataKind,
        object: Box<Tc>,
        tag: u32,
        loc: Loc,
    },
    FuncValue {
        /// Where each captured static comes from in the *enclosing* scope
        /// (spec.md section 3.4: "captured static indices").
        captures: Vec<VarIndex>,
        args: Vec<Name>,
        body: Box<Tc>,
        body_loc: Loc,
    },
    FuncApply {
        func: Box<Tc>,
        args: Vec<Tc>,
    },
    Link {
        get: Name,
        put: Name,
        /// The local slots `scope.rs` reserved for `get`/`put`, in that
        /// order -- see [`Binding::index`].
        get_index: VarIndex,
        put_index: VarIndex,
        body: Box<Tc>,
    },
    Exec {
        bindings: Vec<Binding>,
        body: Box<Tc>,
    },
    List(Vec<Tc>),
    /// One declared-union tag index per letter of the literal word, in
    /// source order.
    Literal(Vec<u32>),
    /// The erased representation of a first-class type value (a `Let`
    /// binding's right-hand side after a `PolyValue` is checked, or the
    /// payload of an `AbstractCast`/poly `abstract_type` result).
    TypeValue,
}
