//! Type representation for the Fble checker (spec.md section 3.3).
//!
//! Grounded on `snow-typeck/src/ty.rs`'s tagged `Ty` enum, generalized from
//! a monomorphic Hindley-Milner type system to Fble's richer type algebra:
//! struct/union data types, function and process types, first-class
//! polymorphism (`PolyType`/`PolyApplyType`), module packages and abstract
//! types, and deferred `VarType` placeholders used for let-binding
//! inference.

use std::fmt;

use fble_common::{Kind, ModulePath, Name};

/// Whether a [`TypeData::Data`] type is a struct (product) or a union (sum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Struct,
    Union,
}

/// A handle into a [`crate::heap::TypeHeap`]. Cheap to copy; two `TypeId`s
/// are equal iff they name the same heap slot, which is *not* the same as
/// the two types being structurally equal -- use
/// [`crate::heap::TypeHeap::types_equal`] for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) u32);

/// The shape stored at a `TypeId` slot in the [`crate::heap::TypeHeap`].
///
/// One variant per row of spec.md section 3.3. `PolyApplyType` is kept
/// unreduced at construction time and normalized lazily by
/// [`crate::heap::TypeHeap::normalize`]; `VarType` is a deferred
/// placeholder populated later by `assign_var_type`.
#[derive(Debug, Clone)]
pub enum TypeData {
    Data(DataKind, Vec<(Name, TypeId)>),
    Func(Vec<TypeId>, TypeId),
    Proc(TypeId),
    Poly { param: TypeId, body: TypeId },
    PolyApply { poly: TypeId, arg: TypeId },
    Package { path: ModulePath, opaque: bool },
    Abstract { package: TypeId, inner: TypeId },
    /// A deferred placeholder; `var` indexes into the heap's unification
    /// table, `name`/`kind` are the binding's surface identity (used for
    /// error messages), independent of whatever the var resolves to.
    Var { var: VarKey, name: Name, kind: Kind },
    /// The type of a type value (types are first-class at kind level >= 1).
    TypeType(TypeId),
}

/// Key into the [`crate::heap::TypeHeap`]'s `ena` unification table for a
/// deferred `VarType`. Distinct from `TypeId`: several `VarType` slots can
/// in principle share a `VarKey` after unification merges them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarKey(pub(crate) u32);

impl ena::unify::UnifyKey for VarKey {
    type Value = Option<TypeId>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        VarKey(u)
    }

    fn tag() -> &'static str {
        "FbleVarType"
    }
}

impl ena::unify::EqUnifyValue for TypeId {}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Struct => write!(f, "struct"),
            DataKind::Union => write!(f, "union"),
        }
    }
}
