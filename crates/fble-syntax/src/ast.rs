//! Untyped AST produced by the [`crate::Parser`].
//!
//! One [`Expr`] node per syntactic form (section 3.2). Every node carries a
//! [`Loc`] pointing at the form's leading token, used both for checker
//! diagnostics and lowering.

use fble_common::{Kind, Loc, ModulePath, Name};

/// An AST node: a location plus the syntactic form.
#[derive(Debug, Clone)]
pub struct Expr {
    pub loc: Loc,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(loc: Loc, kind: ExprKind) -> Self {
        Self { loc, kind }
    }
}

/// Whether a `DataType` declares a struct (product) or a union (sum).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Struct,
    Union,
}

/// A single binding in a `Let` expression: `<kind?><type?> <name> = <expr>`.
#[derive(Debug, Clone)]
pub struct LetBinding {
    /// Present for a type-level binding (`<name>@ <name> = <expr>`).
    pub kind: Option<Kind>,
    /// Present when the binding has an explicit type annotation. Absent
    /// means the checker must infer it via a `VarType`.
    pub type_: Option<Box<Expr>>,
    pub name: Name,
    pub expr: Box<Expr>,
}

/// One field of a `FuncValue`'s argument list: `<type> <name>`.
#[derive(Debug, Clone)]
pub struct FuncArg {
    pub type_: Box<Expr>,
    pub name: Name,
}

/// One choice of a `UnionSelect`: `tag: expr`, or the default choice
/// (`name` is the synthetic `:` tag) when `expr` is `None` and this is the
/// trailing `: z` arm.
#[derive(Debug, Clone)]
pub struct SelectChoice {
    pub name: Name,
    pub expr: Option<Expr>,
}

/// One binding in an `Exec` block: `<type?> <name> = <proc-expr>`.
#[derive(Debug, Clone)]
pub struct ExecBinding {
    pub type_: Option<Box<Expr>>,
    pub name: Name,
    pub expr: Box<Expr>,
}

/// The syntactic form of an [`Expr`], one variant per row of section 3.2's
/// `Expr` table.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Var(Name),
    Let {
        bindings: Vec<LetBinding>,
        body: Box<Expr>,
    },
    DataType {
        data_kind: DataKind,
        fields: Vec<(Expr, Name)>,
    },
    DataAccess {
        object: Box<Expr>,
        field: Name,
    },
    StructValueImplicitType(Vec<(Name, Expr)>),
    UnionValue {
        type_: Box<Expr>,
        field: Name,
        arg: Box<Expr>,
    },
    UnionSelect {
        condition: Box<Expr>,
        choices: Vec<SelectChoice>,
        default: Option<Box<Expr>>,
    },
    FuncType {
        args: Vec<Expr>,
        return_type: Box<Expr>,
    },
    FuncValue {
        args: Vec<FuncArg>,
        body: Box<Expr>,
    },
    ProcType {
        element: Box<Expr>,
    },
    PolyValue {
        param_kind: Kind,
        param_name: Name,
        body: Box<Expr>,
    },
    PolyApply {
        poly: Box<Expr>,
        arg: Box<Expr>,
    },
    PackageType {
        path: ModulePath,
    },
    AbstractCast {
        package: Box<Expr>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    AbstractAccess {
        value: Box<Expr>,
    },
    List {
        func: Box<Expr>,
        elements: Vec<Expr>,
    },
    Literal {
        func: Box<Expr>,
        word: String,
        word_loc: Loc,
    },
    ModulePath(ModulePath),
    Apply {
        func: Box<Expr>,
        args: Vec<Expr>,
        bind_syntax: bool,
    },
    Typeof(Box<Expr>),
    /// `Link(T; get, put) { body }` -- opens a linked get/put port pair and
    /// runs a process body in process context.
    Link {
        element_type: Box<Expr>,
        get: Name,
        put: Name,
        body: Box<Expr>,
    },
    /// `Exec(T1 x1 = p1, …) { body }` -- runs each binding's process to
    /// completion, binds its result, then runs body in process context.
    Exec {
        bindings: Vec<ExecBinding>,
        body: Box<Expr>,
    },
}
