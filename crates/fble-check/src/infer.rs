//! Single-pass kind+type checking over the AST, producing a [`Tc`] tree per
//! module (spec.md section 4.3).
//!
//! Grounded structurally on `snow-typeck/src/infer.rs`'s single
//! `Scope`/`Env`-threaded recursive walk with `Result`-based error
//! reporting, but *not* on its Hindley-Milner machinery: that file
//! generalizes `let`-bound initializers into `Scheme`s with `enter_level`/
//! `leave_level`, and instantiates them implicitly at every use. Fble has no
//! implicit generalization -- polymorphism is fully explicit, introduced by
//! `PolyValue` and eliminated by `PolyApply` (spec.md section 4.3.4's
//! `PolyApply` rule is the *only* place a poly's body type is substituted).
//! So this checker keeps the teacher's shape (one recursive `infer_expr`,
//! one mutable `Scope`, explicit `?`-propagated errors) while building the
//! type algebra from scratch around `fble-types`'s `TypeHeap`. The combined
//! kind-and-type pass itself is grounded on `examples/original_source/fble/lib/typecheck.c`,
//! which checks a kind and a type in the same walk rather than as separate
//! phases.

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use fble_common::{Loc, ModulePath, Name, NameSpace, VarIndex};
use fble_loader::Program;
use fble_syntax::ast::{DataKind as AstDataKind, Expr, ExprKind};
use fble_types::{DataKind, TypeData, TypeHeap, TypeId};

use crate::error::CheckError;
use crate::scope::{warn_if_unused, Scope, VarName};
use crate::tc::{Binding, Choice, Tc};

/// One checked module: its (deduplicated, first-use-ordered) dependency
/// list, the checked body, and the body's type -- what an importer sees
/// when it later binds this module as a value (spec.md section 4.3.5).
pub struct CheckedModule {
    pub path: ModulePath,
    pub deps: Vec<ModulePath>,
    pub tc: Tc,
    pub type_: TypeId,
}

/// A non-fatal diagnostic (spec.md section 4.3.6): checking continues past
/// these, unlike a [`CheckError`].
#[derive(Debug, Clone)]
pub struct CheckWarning {
    pub loc: Loc,
    pub message: String,
}

pub struct CheckOutput {
    pub modules: Vec<CheckedModule>,
    pub types: TypeHeap,
    pub warnings: Vec<CheckWarning>,
}

/// Checker state threaded through every call: the type arena, the module
/// currently being checked (needed for package-access checks), and the
/// accumulated warnings.
struct Checker {
    types: TypeHeap,
    current_module: ModulePath,
    warnings: Vec<CheckWarning>,
}

/// Check every module of a loaded [`Program`], in the loader's dependency
/// order (leaves first), so that each module's dependencies are already
/// checked by the time it is checked itself.
pub fn check_program(program: &Program) -> Result<CheckOutput, CheckError> {
    let mut checker = Checker {
        types: TypeHeap::new(),
        current_module: program.modules[0].path.clone(),
        warnings: Vec::new(),
    };
    let mut module_types: FxHashMap<ModulePath, TypeId> = FxHashMap::default();
    let mut checked = Vec::with_capacity(program.modules.len());

    for module in &program.modules {
        checker.current_module = module.path.clone();

        let mut seen = FxHashSet::default();
        let mut dep_paths = Vec::new();
        for dep in &module.deps {
            if seen.insert(dep.clone()) {
                dep_paths.push(dep.clone());
            }
        }

        let mut scope = Scope::new_module_root();
        for dep in &dep_paths {
            let ty = *module_types
                .get(dep)
                .expect("loader resolves dependencies before dependents");
            scope.push_local(VarName::Module(dep.clone()), ty);
        }

        let (body_tc, body_ty) = infer_expr(&mut scope, &mut checker, &module.body)?;
        scope.pop_locals(dep_paths.len());

        module_types.insert(module.path.clone(), body_ty);
        checked.push(CheckedModule {
            path: module.path.clone(),
            deps: dep_paths,
            tc: body_tc,
            type_: body_ty,
        });
    }

    Ok(CheckOutput {
        modules: checked,
        types: checker.types,
        warnings: checker.warnings,
    })
}

/// Check `expr` as an ordinary (non-phantom) value expression.
fn infer_expr(scope: &mut Scope, checker: &mut Checker, expr: &Expr) -> Result<(Tc, TypeId), CheckError> {
    infer_expr_inner(scope, checker, expr, false)
}

/// Check `expr` as a type, discarding the `Tc` it would produce as a value
/// (type expressions are fully erased before runtime -- spec.md section
/// 3.6's `TypeValue` is the one exception, used only when a type is itself
/// bound as a value). Always phantom: nothing a type expression touches is
/// read at runtime, so no enclosing `FuncValue` needs to capture it.
fn check_type(scope: &mut Scope, checker: &mut Checker, expr: &Expr) -> Result<TypeId, CheckError> {
    scope.with_type_only_frame(|scope| check_type_inner(scope, checker, expr))
}

fn check_type_inner(scope: &mut Scope, checker: &mut Checker, expr: &Expr) -> Result<TypeId, CheckError> {
    match &expr.kind {
        ExprKind::DataType { data_kind, fields } => {
            let mut out = Vec::with_capacity(fields.len());
            for (type_expr, name) in fields {
                if out.iter().any(|(n, _): &(Name, TypeId)| n == name) {
                    return Err(duplicate_field(name));
                }
                let ty = check_type_inner(scope, checker, type_expr)?;
                out.push((name.clone(), ty));
            }
            Ok(checker.types.new_data(ast_to_data_kind(*data_kind), out))
        }
        ExprKind::FuncType { args, return_type } => {
            let mut arg_tys = Vec::with_capacity(args.len());
            for a in args {
                arg_tys.push(check_type_inner(scope, checker, a)?);
            }
            let ret = check_type_inner(scope, checker, return_type)?;
            Ok(checker.types.new_func(arg_tys, ret))
        }
        ExprKind::ProcType { element } => {
            let elem = check_type_inner(scope, checker, element)?;
            Ok(checker.types.new_proc(elem))
        }
        ExprKind::PackageType { path } => Ok(checker.types.new_package(path.clone(), true)),
        ExprKind::PolyValue {
            param_kind,
            param_name,
            body,
        } => {
            let var_id = checker.types.new_var(param_name.clone(), param_kind.clone());
            scope.push_local(VarName::Name(param_name.clone()), var_id);
            let body_ty = check_type_inner(scope, checker, body);
            scope.pop_local();
            Ok(checker.types.new_poly(var_id, body_ty?))
        }
        ExprKind::PolyApply { poly, arg } => {
            let poly_ty = check_type_inner(scope, checker, poly)?;
            let norm = checker.types.normalize(poly_ty);
            match checker.types.get(norm).clone() {
                TypeData::Poly { param, body } => {
                    let arg_ty = check_type_inner(scope, checker, arg)?;
                    Ok(checker.types.substitute(body, param, arg_ty))
                }
                _ => Err(CheckError::new(poly.loc.clone(), "poly application of a non-poly type")),
            }
        }
        ExprKind::Typeof(inner) => {
            let (_, ty) = infer_expr_inner(scope, checker, inner, true)?;
            Ok(ty)
        }
        ExprKind::Var(name) if name.space == NameSpace::Type => {
            let (_, ty) = scope
                .get_var(&VarName::Name(name.clone()), true)
                .ok_or_else(|| undefined_name(name))?;
            Ok(ty)
        }
        _ => {
            let (_, ty) = infer_expr_inner(scope, checker, expr, true)?;
            let norm = checker.types.normalize(ty);
            match checker.types.get(norm) {
                TypeData::TypeType(inner) => Ok(*inner),
                _ => Err(CheckError::new(expr.loc.clone(), "expected a type")),
            }
        }
    }
}

fn infer_expr_inner(
    scope: &mut Scope,
    checker: &mut Checker,
    expr: &Expr,
    phantom: bool,
) -> Result<(Tc, TypeId), CheckError> {
    match &expr.kind {
        ExprKind::Var(name) => {
            let (idx, stored_ty) = scope
                .get_var(&VarName::Name(name.clone()), phantom)
                .ok_or_else(|| undefined_name(name))?;
            let value_ty = if name.space == NameSpace::Type {
                checker.types.new_type_type(stored_ty)
            } else {
                stored_ty
            };
            Ok((Tc::Var(idx), value_ty))
        }

        ExprKind::ModulePath(path) => {
            let (idx, ty) = scope
                .get_var(&VarName::Module(path.clone()), phantom)
                .ok_or_else(|| {
                    CheckError::new(expr.loc.clone(), format!("undefined module dependency {path}"))
                })?;
            Ok((Tc::Var(idx), ty))
        }

        ExprKind::DataType { .. } | ExprKind::FuncType { .. } | ExprKind::ProcType { .. } | ExprKind::PackageType { .. } => {
            let ty = check_type(scope, checker, expr)?;
            Ok((Tc::TypeValue, checker.types.new_type_type(ty)))
        }

        ExprKind::Let { bindings, body } => {
            let mut seeded: Vec<(bool, TypeId, VarIndex)> = Vec::with_capacity(bindings.len());
            for b in bindings {
                if let Some(kind) = &b.kind {
                    let var_id = checker.types.new_var(b.name.clone(), kind.clone());
                    let index = scope.push_local(VarName::Name(b.name.clone()), var_id);
                    seeded.push((true, var_id, index));
                } else {
                    let type_expr = b
                        .type_
                        .as_ref()
                        .expect("value-level let binding always carries a type annotation");
                    let ty = check_type(scope, checker, type_expr)?;
                    let index = scope.push_local(VarName::Name(b.name.clone()), ty);
                    seeded.push((false, ty, index));
                }
            }

            let mut tc_bindings = Vec::with_capacity(bindings.len());
            for (b, (is_type, ty, index)) in bindings.iter().zip(seeded.iter()) {
                if *is_type {
                    let rhs_ty = check_type(scope, checker, &b.expr)?;
                    checker
                        .types
                        .assign_var_type(*ty, rhs_ty)
                        .map_err(|_| vacuous_recursion(&b.name))?;
                    tc_bindings.push(Binding {
                        name: b.name.clone(),
                        loc: b.expr.loc.clone(),
                        tc: Tc::TypeValue,
                        index: *index,
                    });
                } else {
                    let (rhs_tc, rhs_ty) = infer_expr_inner(scope, checker, &b.expr, phantom)?;
                    if !checker.types.types_equal(rhs_ty, *ty) {
                        return Err(type_mismatch(&checker.types, &b.expr.loc, *ty, rhs_ty));
                    }
                    tc_bindings.push(Binding {
                        name: b.name.clone(),
                        loc: b.expr.loc.clone(),
                        tc: rhs_tc,
                        index: *index,
                    });
                }
            }

            let (body_tc, body_ty) = infer_expr_inner(scope, checker, body, phantom)?;
            let stats = scope.pop_locals(bindings.len());
            for (b, stat) in bindings.iter().zip(stats.iter()) {
                if warn_if_unused(&b.name) && !stat.accessed {
                    checker.warnings.push(CheckWarning {
                        loc: b.name.loc.clone(),
                        message: format!("unused variable '{}'", b.name.text),
                    });
                }
            }
            let recursive = stats.iter().any(|s| s.used);

            Ok((
                Tc::Let {
                    recursive,
                    bindings: tc_bindings,
                    body: Box::new(body_tc),
                },
                body_ty,
            ))
        }

        ExprKind::StructValueImplicitType(fields) => {
            let mut tcs = Vec::with_capacity(fields.len());
            let mut field_tys = Vec::with_capacity(fields.len());
            for (name, e) in fields {
                if field_tys.iter().any(|(n, _): &(Name, TypeId)| n == name) {
                    return Err(duplicate_field(name));
                }
                let (tc, ty) = infer_expr_inner(scope, checker, e, phantom)?;
                tcs.push(tc);
                field_tys.push((name.clone(), ty));
            }
            let struct_ty = checker.types.new_data(DataKind::Struct, field_tys);
            Ok((Tc::StructValue(tcs), struct_ty))
        }

        ExprKind::DataAccess { object, field } => {
            let (obj_tc, obj_ty) = infer_expr_inner(scope, checker, object, phantom)?;
            let norm = checker.types.normalize(obj_ty);
            match checker.types.get(norm).clone() {
                TypeData::Data(DataKind::Struct, fields) => {
                    let idx = fields
                        .iter()
                        .position(|(n, _)| n == field)
                        .ok_or_else(|| undefined_field(field))?;
                    Ok((
                        Tc::DataAccess {
                            kind: DataKind::Struct,
                            object: Box::new(obj_tc),
                            tag: idx as u32,
                            loc: expr.loc.clone(),
                        },
                        fields[idx].1,
                    ))
                }
                _ => Err(CheckError::new(
                    object.loc.clone(),
                    "field access on a non-struct value",
                )),
            }
        }

        ExprKind::UnionValue { type_, field, arg } => {
            let union_ty = check_type(scope, checker, type_)?;
            let norm = checker.types.normalize(union_ty);
            let fields = match checker.types.get(norm).clone() {
                TypeData::Data(DataKind::Union, fields) => fields,
                _ => return Err(CheckError::new(type_.loc.clone(), "expected a union type")),
            };
            let idx = fields
                .iter()
                .position(|(n, _)| n == field)
                .ok_or_else(|| undefined_field(field))?;
            let (arg_tc, arg_ty) = infer_expr_inner(scope, checker, arg, phantom)?;
            if !checker.types.types_equal(arg_ty, fields[idx].1) {
                return Err(type_mismatch(&checker.types, &arg.loc, fields[idx].1, arg_ty));
            }
            Ok((
                Tc::UnionValue {
                    tag: idx as u32,
                    arg: Box::new(arg_tc),
                },
                union_ty,
            ))
        }

        ExprKind::UnionSelect {
            condition,
            choices,
            default,
        } => {
            let (cond_tc, cond_ty) = infer_expr_inner(scope, checker, condition, phantom)?;
            let norm = checker.types.normalize(cond_ty);
            let fields = match checker.types.get(norm).clone() {
                TypeData::Data(DataKind::Union, fields) => fields,
                _ => {
                    return Err(CheckError::new(
                        condition.loc.clone(),
                        "union select on a non-union value",
                    ))
                }
            };

            for c in choices {
                if !fields.iter().any(|(n, _)| n == &c.name) {
                    return Err(CheckError::new(
                        c.name.loc.clone(),
                        format!("'{}' is not a tag of the selected union type", c.name.text),
                    ));
                }
            }

            let mut result_ty: Option<TypeId> = None;
            let mut default_checked: Option<(Tc, TypeId)> = None;
            let mut tc_choices = Vec::with_capacity(fields.len());

            for (name, _field_ty) in &fields {
                let (tc, ty, loc) = if let Some(choice) = choices.iter().find(|c| &c.name == name) {
                    let e = choice
                        .expr
                        .as_ref()
                        .ok_or_else(|| CheckError::new(choice.name.loc.clone(), "missing choice expression"))?;
                    let (tc, ty) = infer_expr_inner(scope, checker, e, phantom)?;
                    (tc, ty, e.loc.clone())
                } else if let Some(default_expr) = default {
                    if default_checked.is_none() {
                        default_checked = Some(infer_expr_inner(scope, checker, default_expr, phantom)?);
                    }
                    let (tc, ty) = default_checked.clone().unwrap();
                    (tc, ty, default_expr.loc.clone())
                } else {
                    return Err(CheckError::new(
                        expr.loc.clone(),
                        format!("missing union select branch for tag '{}'", name.text),
                    ));
                };

                match result_ty {
                    None => result_ty = Some(ty),
                    Some(expected) => {
                        if !checker.types.types_equal(expected, ty) {
                            return Err(type_mismatch(&checker.types, &loc, expected, ty));
                        }
                    }
                }

                tc_choices.push(Choice {
                    name: name.clone(),
                    loc,
                    tc,
                });
            }

            let result_ty = result_ty.ok_or_else(|| {
                CheckError::new(expr.loc.clone(), "union select over an empty union has no type")
            })?;

            Ok((
                Tc::UnionSelect {
                    condition: Box::new(cond_tc),
                    choices: tc_choices,
                },
                result_ty,
            ))
        }

        ExprKind::FuncValue { args, body } => {
            let mut arg_tys = Vec::with_capacity(args.len());
            for a in args {
                arg_tys.push(check_type(scope, checker, &a.type_)?);
            }
            let body_loc = body.loc.clone();
            let (inner, captures) = scope.with_function_frame(|scope| {
                for (a, ty) in args.iter().zip(arg_tys.iter()) {
                    scope.push_local(VarName::Name(a.name.clone()), *ty);
                }
                infer_expr_inner(scope, checker, body, phantom)
            });
            let (body_tc, body_ty) = inner?;
            let arg_names = args.iter().map(|a| a.name.clone()).collect();
            let func_ty = checker.types.new_func(arg_tys, body_ty);
            Ok((
                Tc::FuncValue {
                    captures,
                    args: arg_names,
                    body: Box::new(body_tc),
                    body_loc,
                },
                func_ty,
            ))
        }

        ExprKind::PolyValue {
            param_kind,
            param_name,
            body,
        } => {
            let var_id = checker.types.new_var(param_name.clone(), param_kind.clone());
            let body_loc = body.loc.clone();
            let (inner, captures) = scope.with_function_frame(|scope| {
                scope.push_local(VarName::Name(param_name.clone()), var_id);
                infer_expr_inner(scope, checker, body, phantom)
            });
            let (body_tc, body_ty) = inner?;
            Ok((
                Tc::FuncValue {
                    captures,
                    args: vec![param_name.clone()],
                    body: Box::new(body_tc),
                    body_loc,
                },
                checker.types.new_poly(var_id, body_ty),
            ))
        }

        ExprKind::PolyApply { poly, arg } => {
            let (poly_tc, poly_ty) = infer_expr_inner(scope, checker, poly, phantom)?;
            let norm = checker.types.normalize(poly_ty);
            match checker.types.get(norm).clone() {
                TypeData::Poly { param, body } => {
                    let arg_ty = check_type(scope, checker, arg)?;
                    let result_ty = checker.types.substitute(body, param, arg_ty);
                    Ok((
                        Tc::FuncApply {
                            func: Box::new(poly_tc),
                            args: vec![Tc::TypeValue],
                        },
                        result_ty,
                    ))
                }
                _ => Err(CheckError::new(poly.loc.clone(), "poly application of a non-poly value")),
            }
        }

        ExprKind::Apply { func, args, .. } => {
            let (func_tc, func_ty) = infer_expr_inner(scope, checker, func, phantom)?;
            let norm = checker.types.normalize(func_ty);
            match checker.types.get(norm).clone() {
                TypeData::Func(arg_tys, ret_ty) => {
                    if arg_tys.len() != args.len() {
                        return Err(arity_mismatch(&expr.loc, arg_tys.len(), args.len()));
                    }
                    let mut arg_tcs = Vec::with_capacity(args.len());
                    for (a, expected) in args.iter().zip(arg_tys.iter()) {
                        let (a_tc, a_ty) = infer_expr_inner(scope, checker, a, phantom)?;
                        if !checker.types.types_equal(a_ty, *expected) {
                            return Err(type_mismatch(&checker.types, &a.loc, *expected, a_ty));
                        }
                        arg_tcs.push(a_tc);
                    }
                    Ok((
                        Tc::FuncApply {
                            func: Box::new(func_tc),
                            args: arg_tcs,
                        },
                        ret_ty,
                    ))
                }
                TypeData::TypeType(inner) => {
                    let inner_norm = checker.types.normalize(inner);
                    match checker.types.get(inner_norm).clone() {
                        TypeData::Data(DataKind::Struct, fields) => {
                            if fields.len() != args.len() {
                                return Err(arity_mismatch(&expr.loc, fields.len(), args.len()));
                            }
                            let mut arg_tcs = Vec::with_capacity(args.len());
                            for (a, (_, expected)) in args.iter().zip(fields.iter()) {
                                let (a_tc, a_ty) = infer_expr_inner(scope, checker, a, phantom)?;
                                if !checker.types.types_equal(a_ty, *expected) {
                                    return Err(type_mismatch(&checker.types, &a.loc, *expected, a_ty));
                                }
                                arg_tcs.push(a_tc);
                            }
                            Ok((Tc::StructValue(arg_tcs), inner))
                        }
                        TypeData::Package { .. } => {
                            if args.len() != 1 {
                                return Err(arity_mismatch(&expr.loc, 1, args.len()));
                            }
                            let pkg_path = match checker.types.get(inner_norm) {
                                TypeData::Package { path, .. } => path.clone(),
                                _ => unreachable!(),
                            };
                            check_package_access(checker, &expr.loc, &pkg_path)?;
                            let (v_tc, v_ty) = infer_expr_inner(scope, checker, &args[0], phantom)?;
                            Ok((v_tc, checker.types.new_abstract(inner, v_ty)))
                        }
                        _ => Err(not_a_function(&func.loc)),
                    }
                }
                _ => Err(not_a_function(&func.loc)),
            }
        }

        ExprKind::AbstractCast {
            package,
            target,
            value,
        } => {
            let pkg_ty = check_type(scope, checker, package)?;
            let norm = checker.types.normalize(pkg_ty);
            let pkg_path = match checker.types.get(norm) {
                TypeData::Package { path, .. } => path.clone(),
                _ => return Err(CheckError::new(package.loc.clone(), "expected a package type")),
            };
            check_package_access(checker, &expr.loc, &pkg_path)?;
            let target_ty = check_type(scope, checker, target)?;
            let (v_tc, v_ty) = infer_expr_inner(scope, checker, value, phantom)?;
            if !checker.types.opaque_equals(target_ty, v_ty) {
                return Err(type_mismatch(&checker.types, &value.loc, target_ty, v_ty));
            }
            Ok((v_tc, checker.types.new_abstract(pkg_ty, target_ty)))
        }

        ExprKind::AbstractAccess { value } => {
            let (v_tc, v_ty) = infer_expr_inner(scope, checker, value, phantom)?;
            let norm = checker.types.normalize(v_ty);
            match checker.types.get(norm).clone() {
                TypeData::Abstract { package, inner } => {
                    let pkg_norm = checker.types.normalize(package);
                    let pkg_path = match checker.types.get(pkg_norm) {
                        TypeData::Package { path, .. } => path.clone(),
                        _ => unreachable!("Abstract.package always normalizes to a Package type"),
                    };
                    check_package_access(checker, &expr.loc, &pkg_path)?;
                    Ok((v_tc, inner))
                }
                _ => Err(CheckError::new(
                    value.loc.clone(),
                    "abstract access on a non-abstract value",
                )),
            }
        }

        ExprKind::List { func, elements } => {
            let (func_tc, func_ty) = infer_expr_inner(scope, checker, func, phantom)?;
            let norm = checker.types.normalize(func_ty);
            let (elem_ty, ret_ty) = match checker.types.get(norm).clone() {
                TypeData::Func(args, ret) if args.len() == 1 => (args[0], ret),
                _ => return Err(not_a_function(&func.loc)),
            };
            let mut elem_tcs = Vec::with_capacity(elements.len());
            for e in elements {
                let (tc, ty) = infer_expr_inner(scope, checker, e, phantom)?;
                if !checker.types.types_equal(ty, elem_ty) {
                    return Err(type_mismatch(&checker.types, &e.loc, elem_ty, ty));
                }
                elem_tcs.push(tc);
            }
            // `f` is applied exactly once, to the whole constructed list
            // (spec.md section 4.3.4: "return(f)" is the List expr's type,
            // not the list's own shape) -- it is not sugar for repeated
            // per-element application.
            Ok((
                Tc::FuncApply {
                    func: Box::new(func_tc),
                    args: vec![Tc::List(elem_tcs)],
                },
                ret_ty,
            ))
        }

        ExprKind::Literal { func, word, word_loc } => {
            let (func_tc, func_ty) = infer_expr_inner(scope, checker, func, phantom)?;
            let norm = checker.types.normalize(func_ty);
            let (elem_ty, ret_ty) = match checker.types.get(norm).clone() {
                TypeData::Func(args, ret) if args.len() == 1 => (args[0], ret),
                _ => return Err(not_a_function(&func.loc)),
            };
            let elem_norm = checker.types.normalize(elem_ty);
            let fields = match checker.types.get(elem_norm).clone() {
                TypeData::Data(DataKind::Union, fields) => fields,
                _ => return Err(CheckError::new(func.loc.clone(), "literal's element type is not a union")),
            };
            let mut tags = Vec::with_capacity(word.len());
            for ch in word.chars() {
                let letter = ch.to_string();
                let idx = fields
                    .iter()
                    .position(|(n, _)| n.text == letter)
                    .ok_or_else(|| {
                        CheckError::new(
                            word_loc.clone(),
                            format!("'{letter}' is not a tag of the literal's union type"),
                        )
                    })?;
                tags.push(idx as u32);
            }
            Ok((
                Tc::FuncApply {
                    func: Box::new(func_tc),
                    args: vec![Tc::Literal(tags)],
                },
                ret_ty,
            ))
        }

        ExprKind::Typeof(inner) => {
            let (_, ty) = infer_expr_inner(scope, checker, inner, true)?;
            Ok((Tc::TypeValue, ty))
        }

        ExprKind::Link {
            element_type,
            get,
            put,
            body,
        } => {
            let et = check_type(scope, checker, element_type)?;
            let get_ty = checker.types.new_proc(et);
            let unit_ty = checker.types.new_data(DataKind::Struct, vec![]);
            let put_ret = checker.types.new_proc(unit_ty);
            let put_ty = checker.types.new_func(vec![et], put_ret);
            let get_index = scope.push_local(VarName::Name(get.clone()), get_ty);
            let put_index = scope.push_local(VarName::Name(put.clone()), put_ty);
            let inner = infer_expr_inner(scope, checker, body, phantom);
            scope.pop_locals(2);
            let (body_tc, body_ty) = inner?;
            let norm = checker.types.normalize(body_ty);
            if !matches!(checker.types.get(norm), TypeData::Proc(_)) {
                return Err(CheckError::new(body.loc.clone(), "Link body must be a process"));
            }
            Ok((
                Tc::Link {
                    get: get.clone(),
                    put: put.clone(),
                    get_index,
                    put_index,
                    body: Box::new(run_process(body_tc)),
                },
                body_ty,
            ))
        }

        ExprKind::Exec { bindings, body } => {
            let mut tc_bindings = Vec::with_capacity(bindings.len());
            for b in bindings {
                let (p_tc, p_ty) = infer_expr_inner(scope, checker, &b.expr, phantom)?;
                let norm = checker.types.normalize(p_ty);
                let elem_ty = match checker.types.get(norm) {
                    TypeData::Proc(elem) => *elem,
                    _ => return Err(CheckError::new(b.expr.loc.clone(), "Exec binding must be a process")),
                };
                if let Some(annotation) = &b.type_ {
                    let annotated = check_type(scope, checker, annotation)?;
                    if !checker.types.types_equal(annotated, elem_ty) {
                        return Err(type_mismatch(&checker.types, &b.expr.loc, annotated, elem_ty));
                    }
                }
                let index = scope.push_local(VarName::Name(b.name.clone()), elem_ty);
                tc_bindings.push(Binding {
                    name: b.name.clone(),
                    loc: b.expr.loc.clone(),
                    tc: run_process(p_tc),
                    index,
                });
            }
            let inner = infer_expr_inner(scope, checker, body, phantom);
            scope.pop_locals(bindings.len());
            let (body_tc, body_ty) = inner?;
            Ok((
                Tc::Exec {
                    bindings: tc_bindings,
                    body: Box::new(body_tc),
                },
                body_ty,
            ))
        }
    }
}

/// Force a process-typed `Tc` to actually run (spec.md section 4.6.3:
/// "the interpreter treats each proc as a zero-argument thunk"). A bare
/// `Tc::Var` in process position (the only way a `Link`-bound `get` port is
/// ever referenced -- it is read by naming it, not by calling it) names an
/// unapplied runtime thunk and needs an explicit zero-argument invocation to
/// fire. Every other process-shaped `Tc` (`put(x)`, a user function call
/// returning `Proc@<T>`, a nested `Link`/`Exec`) already runs to completion
/// as part of being lowered/evaluated -- see `fble-bc`'s lowerer doc
/// comment on `Tc::Link`/`Tc::Exec` inlining -- so wrapping those again
/// would invoke an already-resolved value a second time.
fn run_process(tc: Tc) -> Tc {
    match tc {
        Tc::Var(_) => Tc::FuncApply {
            func: Box::new(tc),
            args: Vec::new(),
        },
        other => other,
    }
}

fn ast_to_data_kind(kind: AstDataKind) -> DataKind {
    match kind {
        AstDataKind::Struct => DataKind::Struct,
        AstDataKind::Union => DataKind::Union,
    }
}

fn check_package_access(checker: &Checker, loc: &Loc, pkg_path: &ModulePath) -> Result<(), CheckError> {
    if pkg_path.is_prefix_of(&checker.current_module) {
        Ok(())
    } else {
        Err(CheckError::new(
            loc.clone(),
            format!(
                "module {} is not part of package {pkg_path}",
                checker.current_module
            ),
        ))
    }
}

fn undefined_name(name: &Name) -> CheckError {
    CheckError::new(name.loc.clone(), format!("undefined variable '{name}'"))
}

fn undefined_field(name: &Name) -> CheckError {
    CheckError::new(name.loc.clone(), format!("'{}' is not a field of this type", name.text))
}

fn duplicate_field(name: &Name) -> CheckError {
    CheckError::new(name.loc.clone(), format!("duplicate field '{}'", name.text))
}

fn vacuous_recursion(name: &Name) -> CheckError {
    CheckError::new(
        name.loc.clone(),
        format!("'{}' is vacuously recursive: its type reduces to itself", name.text),
    )
}

fn arity_mismatch(loc: &Loc, expected: usize, found: usize) -> CheckError {
    CheckError::new(loc.clone(), format!("expected {expected} arguments, found {found}"))
}

fn not_a_function(loc: &Loc) -> CheckError {
    CheckError::new(loc.clone(), "applied value is not a function")
}

fn type_mismatch(types: &TypeHeap, loc: &Loc, expected: TypeId, found: TypeId) -> CheckError {
    CheckError::new(
        loc.clone(),
        format!(
            "type mismatch: expected {}, found {}",
            display_type(types, expected),
            display_type(types, found)
        ),
    )
}

/// A best-effort textual rendering of a type for diagnostics. Not a parser
/// round-trip (no surface syntax is reconstructed), just enough structure
/// for a human to tell two mismatched types apart.
fn display_type(types: &TypeHeap, id: TypeId) -> String {
    match types.get(id) {
        TypeData::Data(DataKind::Struct, fields) => {
            format!(
                "*({})",
                fields
                    .iter()
                    .map(|(n, t)| format!("{} {}", display_type(types, *t), n.text))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
        TypeData::Data(DataKind::Union, fields) => {
            format!(
                "+({})",
                fields
                    .iter()
                    .map(|(n, t)| format!("{} {}", display_type(types, *t), n.text))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
        TypeData::Func(args, ret) => format!(
            "({}; {})",
            args.iter()
                .map(|t| display_type(types, *t))
                .collect::<Vec<_>>()
                .join(", "),
            display_type(types, *ret)
        ),
        TypeData::Proc(elem) => format!("{}!", display_type(types, *elem)),
        TypeData::Poly { param, body } => {
            format!("<{}; {}>", display_type(types, *param), display_type(types, *body))
        }
        TypeData::PolyApply { poly, arg } => {
            format!("{}<{}>", display_type(types, *poly), display_type(types, *arg))
        }
        TypeData::Package { path, .. } => format!("%{path}"),
        TypeData::Abstract { inner, .. } => display_type(types, *inner),
        TypeData::Var { name, .. } => name.text.clone(),
        TypeData::TypeType(inner) => format!("@<{}>", display_type(types, *inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fble_common::ModulePath;
    use fble_loader::Module;
    use fble_syntax::parser::parse_module;

    fn program_from(source: &str) -> Program {
        let parsed = parse_module(source, "Main.fble").expect("parses");
        Program {
            modules: vec![Module {
                path: ModulePath::new(vec![]),
                body: parsed.body,
                deps: parsed.deps,
                source_path: "Main.fble".into(),
            }],
        }
    }

    #[test]
    fn checks_a_struct_literal() {
        let program = program_from("*()()");
        let out = check_program(&program).expect("type-checks");
        assert_eq!(out.modules.len(), 1);
    }

    #[test]
    fn rejects_mismatched_argument_type() {
        let program = program_from("(+(*() t, *() f) x){ x }(*())");
        let err = check_program(&program).unwrap_err();
        assert!(err.message.contains("type mismatch"));
    }

    #[test]
    fn union_value_and_select_round_trip() {
        let program = program_from(
            "(+(*() t, *() f) x){ x?(t: *()(), f: *()()) }(+(*() t, *() f):t(*()()))",
        );
        let out = check_program(&program);
        assert!(out.is_ok(), "{:?}", out.err());
    }

    #[test]
    fn detects_undefined_variable() {
        let program = program_from("undefined_name");
        let err = check_program(&program).unwrap_err();
        assert!(err.message.contains("undefined variable"));
    }

    #[test]
    fn func_value_and_apply_type_check() {
        let program = program_from("(*() x){ x }(*()())");
        let out = check_program(&program).expect("type-checks");
        assert_eq!(out.modules.len(), 1);
    }
}
