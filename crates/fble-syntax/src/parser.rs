//! Recursive-descent parser for Fble source files.
//!
//! Builds [`Expr`] nodes directly (no intermediate CST) since, unlike the
//! source this crate is grounded on, there is no formatter or language
//! server downstream that would need a lossless tree.
//!
//! # Concrete syntax
//!
//! spec.md section 4.2 gives grammar highlights, not an exhaustive grammar,
//! so the concrete token sequences below are this port's own design. Each
//! choice is picked to keep every form unambiguous for one-token-of-context
//! recursive descent:
//!
//! ```text
//! module      := expr EOF
//! expr        := bindings? operand
//! bindings    := binding (',' binding)* ';'
//! binding     := '@' name'@' '=' expr          (type-level binding)
//!              | type name '=' expr            (value binding)
//! operand     := atom postfix*
//! atom        := '(' expr ')'                                  grouping
//!              | '*' '(' field (',' field)* ')'                struct type
//!              | '+' '(' field (',' field)* ')'                union type
//!              | '(' func_head                                 func type/value
//!              | '<' kind name '@'? ';' expr '>'                poly value
//!              | '%' module_path                               package type
//!              | '/' module_path_tail                           module path ref
//!              | '@' operand                                   typeof
//!              | ident
//! field       := type name
//! func_head   := (type (',' type)* ';' type ')'                 func type
//!              | (type name (',' type name)* )? ')' '{' expr '}' func value
//! postfix     := '.' '@'                                        abstract access
//!              | '.' name                                       data access
//!              | ':' name '(' expr ')'                          union value
//!              | '?' '(' choice (',' choice)* ')'                union select
//!              | '(' (expr (',' expr)*)? ')'                    apply
//!              | '@' '(' type ',' expr ')'                      abstract cast
//!              | '<' type '>'                                   poly apply
//!              | '[' (expr (',' expr)*)? ']'                    list
//!              | '|' (ident | string)                           literal
//!              | '!'                                            proc type
//! choice      := name ':' expr | ':' expr
//! ```
//!
//! `Link` and `Exec` are recognized as contextual forms in head position --
//! `Link(T; get, put) { body }` and `Exec(T1 x1 = p1, …) { body }` -- rather
//! than reserved keywords, matching section 3.4's dedicated `Tc::Link` and
//! `Tc::Exec` variants. If the shape doesn't match after the leading word is
//! consumed, parsing backtracks and treats it as a plain identifier, the
//! same way `Ident` is never reserved elsewhere.

use std::rc::Rc;

use fble_common::{Kind, Loc, ModulePath, Name, NameSpace};
use fble_lexer::{split_namespace, LineIndex, Lexer, Token, TokenKind};

use crate::ast::{DataKind, Expr, ExecBinding, ExprKind, FuncArg, LetBinding, SelectChoice};
use crate::error::ParseError;

/// The result of parsing one module: its body expression and the module
/// paths referenced anywhere within it (the Loader's dependency list).
pub struct ParsedModule {
    pub body: Expr,
    pub deps: Vec<ModulePath>,
}

pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    source_name: Rc<str>,
    line_index: LineIndex,
    deps: Vec<ModulePath>,
}

type PResult<T> = Result<T, ParseError>;

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, source_name: &str) -> Self {
        Self {
            tokens: Lexer::tokenize(source),
            pos: 0,
            source,
            source_name: Rc::from(source_name),
            line_index: LineIndex::new(source),
            deps: Vec::new(),
        }
    }

    pub fn parse_module(mut self) -> PResult<ParsedModule> {
        let body = self.parse_expr()?;
        self.expect(TokenKind::Eof)?;
        Ok(ParsedModule {
            body,
            deps: self.deps,
        })
    }

    // ── token access ────────────────────────────────────────────────

    fn tok(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn tok_at(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&self.tokens[self.tokens.len() - 1])
    }

    fn kind(&self) -> &TokenKind {
        &self.tok().kind
    }

    fn text(&self, tok: &Token) -> &'src str {
        &self.source[tok.span.start as usize..tok.span.end as usize]
    }

    fn loc(&self) -> Loc {
        self.loc_at(self.tok())
    }

    fn loc_at(&self, tok: &Token) -> Loc {
        let (line, col) = self.line_index.line_col(tok.span.start);
        Loc::new(self.source_name.clone(), line, col)
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: TokenKind) -> bool {
        *self.kind() == kind
    }

    fn at_at(&self, n: usize, kind: TokenKind) -> bool {
        self.tok_at(n).kind == kind
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.loc(), message)
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.at(kind.clone()) {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected {kind:?} but found {:?}", self.kind())))
        }
    }

    // ── names ──────────────────────────────────────────────────────

    fn parse_name(&mut self) -> PResult<Name> {
        let tok = self.expect(TokenKind::Ident)?;
        let raw = self.text(&tok);
        let split = split_namespace(raw);
        let space = if split.is_type {
            NameSpace::Type
        } else {
            NameSpace::Normal
        };
        Ok(Name {
            text: split.text.to_string(),
            space,
            loc: self.loc_at(&tok),
        })
    }

    // ── module paths ───────────────────────────────────────────────
    //
    // `fble_common::ModulePath` follows the convention (fixed by its own
    // unit tests) that a fully-qualified module reference carries its
    // trailing `%` as part of the *last component's* `Name::text`, not as
    // a separate path element -- `/Core/Stdio%` is two components,
    // `Core` and `Stdio%`. A package path used in a `PackageType` (a
    // prefix, not a specific module) has no trailing `%` at all.

    fn parse_path_components(&mut self) -> PResult<(Vec<Name>, Loc)> {
        let start_loc = self.loc();
        let mut components = Vec::new();
        loop {
            self.expect(TokenKind::Slash)?;
            let name = self.parse_name()?;
            components.push(name);
            if self.at(TokenKind::Slash) {
                continue;
            }
            break;
        }
        Ok((components, start_loc))
    }

    /// `/A/B%` -- a reference to a specific module.
    fn parse_module_path(&mut self) -> PResult<(ModulePath, Loc)> {
        let (mut components, start_loc) = self.parse_path_components()?;
        self.expect(TokenKind::Percent)?;
        if let Some(last) = components.last_mut() {
            last.text.push('%');
        }
        let path = ModulePath { components };
        self.deps.push(path.clone());
        Ok((path, start_loc))
    }

    /// `/A/B` -- a package prefix, with no trailing `%`.
    fn parse_package_path(&mut self) -> PResult<(ModulePath, Loc)> {
        let (components, start_loc) = self.parse_path_components()?;
        Ok((ModulePath { components }, start_loc))
    }

    // ── expressions ────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        if let Some(expr) = self.try_parse_let()? {
            return Ok(expr);
        }
        self.parse_operand()
    }

    /// A let binding always opens with either `@` (type-level binding) or a
    /// type expression whose postfix-complete form is directly followed by
    /// an `Ident` and then `=` or `,`. That one token of lookahead after a
    /// fully-parsed operand is enough to commit without backtracking.
    fn try_parse_let(&mut self) -> PResult<Option<Expr>> {
        let loc = self.loc();
        let mut bindings = Vec::new();

        if self.at(TokenKind::At) {
            // `@ name@ = expr` (type binding) and a bare `@expr` `Typeof`
            // both start with a standalone `@` token; try the binding shape
            // first and fall back to a plain expression if it doesn't hold.
            let save = self.pos;
            match self.parse_type_binding() {
                Ok(binding) => bindings.push(binding),
                Err(_) => {
                    self.pos = save;
                    return Ok(None);
                }
            }
        } else {
            let save = self.pos;
            let type_expr = match self.parse_operand() {
                Ok(e) => e,
                Err(_) => {
                    self.pos = save;
                    return Ok(None);
                }
            };
            if !self.at(TokenKind::Ident) {
                self.pos = save;
                return Ok(None);
            }
            let name = self.parse_name()?;
            if !self.at(TokenKind::Equals) {
                self.pos = save;
                return Ok(None);
            }
            self.bump();
            let rhs = self.parse_expr_no_let_trailer()?;
            bindings.push(LetBinding {
                kind: None,
                type_: Some(Box::new(type_expr)),
                name,
                expr: Box::new(rhs),
            });
        }

        while self.at(TokenKind::Comma) {
            self.bump();
            if self.at(TokenKind::At) {
                bindings.push(self.parse_type_binding()?);
            } else {
                let type_expr = self.parse_operand()?;
                let name = self.parse_name()?;
                self.expect(TokenKind::Equals)?;
                let rhs = self.parse_expr_no_let_trailer()?;
                bindings.push(LetBinding {
                    kind: None,
                    type_: Some(Box::new(type_expr)),
                    name,
                    expr: Box::new(rhs),
                });
            }
        }

        self.expect(TokenKind::Semicolon)?;
        let body = self.parse_expr()?;
        Ok(Some(Expr::new(
            loc,
            ExprKind::Let {
                bindings,
                body: Box::new(body),
            },
        )))
    }

    /// The RHS of a single binding: parsed as a full operand, never itself
    /// consuming a trailing `, name = ...` or `;` (those belong to the
    /// enclosing `bindings` list).
    fn parse_expr_no_let_trailer(&mut self) -> PResult<Expr> {
        self.parse_operand()
    }

    fn parse_type_binding(&mut self) -> PResult<LetBinding> {
        self.expect(TokenKind::At)?;
        let name = self.parse_name()?;
        self.expect(TokenKind::Equals)?;
        let rhs = self.parse_expr_no_let_trailer()?;
        Ok(LetBinding {
            kind: Some(Kind::type_()),
            type_: None,
            name,
            expr: Box::new(rhs),
        })
    }

    fn parse_operand(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            let current = self.kind().clone();
            expr = match current {
                TokenKind::Dot => self.parse_dot(expr)?,
                TokenKind::Colon => self.parse_union_value(expr)?,
                TokenKind::Question => self.parse_union_select(expr)?,
                TokenKind::LParen => self.parse_apply(expr)?,
                TokenKind::LBracket => self.parse_list(expr)?,
                TokenKind::Pipe => self.parse_literal(expr)?,
                TokenKind::Bang => {
                    let loc = expr.loc.clone();
                    self.bump();
                    Expr::new(
                        loc,
                        ExprKind::ProcType {
                            element: Box::new(expr),
                        },
                    )
                }
                TokenKind::At if self.at_at(1, TokenKind::LParen) => self.parse_abstract_cast(expr)?,
                TokenKind::Lt => self.parse_poly_apply(expr)?,
                _ => break,
            };
        }
        Ok(expr)
    }

    fn parse_dot(&mut self, object: Expr) -> PResult<Expr> {
        let loc = object.loc.clone();
        self.bump(); // '.'
        if self.at(TokenKind::At) {
            self.bump();
            return Ok(Expr::new(
                loc,
                ExprKind::AbstractAccess {
                    value: Box::new(object),
                },
            ));
        }
        let field = self.parse_name()?;
        Ok(Expr::new(
            loc,
            ExprKind::DataAccess {
                object: Box::new(object),
                field,
            },
        ))
    }

    fn parse_union_value(&mut self, type_expr: Expr) -> PResult<Expr> {
        let loc = type_expr.loc.clone();
        self.bump(); // ':'
        let field = self.parse_name()?;
        self.expect(TokenKind::LParen)?;
        let arg = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::new(
            loc,
            ExprKind::UnionValue {
                type_: Box::new(type_expr),
                field,
                arg: Box::new(arg),
            },
        ))
    }

    fn parse_union_select(&mut self, condition: Expr) -> PResult<Expr> {
        let loc = condition.loc.clone();
        self.bump(); // '?'
        self.expect(TokenKind::LParen)?;
        let mut choices = Vec::new();
        let mut default = None;
        loop {
            if self.at(TokenKind::Colon) {
                self.bump();
                let e = self.parse_expr_no_comma()?;
                default = Some(Box::new(e));
            } else {
                let name = self.parse_name()?;
                self.expect(TokenKind::Colon)?;
                let e = self.parse_expr_no_comma()?;
                choices.push(SelectChoice {
                    name,
                    expr: Some(e),
                });
            }
            if self.at(TokenKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::new(
            loc,
            ExprKind::UnionSelect {
                condition: Box::new(condition),
                choices,
                default,
            },
        ))
    }

    /// A select/apply/list element: a full operand, but one that does not
    /// itself start a `let` (those would swallow the enclosing `,`/`)`).
    fn parse_expr_no_comma(&mut self) -> PResult<Expr> {
        self.parse_operand()
    }

    fn parse_apply(&mut self, func: Expr) -> PResult<Expr> {
        let loc = func.loc.clone();
        self.bump(); // '('
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr_no_comma()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::new(
            loc,
            ExprKind::Apply {
                func: Box::new(func),
                args,
                bind_syntax: false,
            },
        ))
    }

    fn parse_list(&mut self, func: Expr) -> PResult<Expr> {
        let loc = func.loc.clone();
        self.bump(); // '['
        let mut elements = Vec::new();
        if !self.at(TokenKind::RBracket) {
            loop {
                elements.push(self.parse_expr_no_comma()?);
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::new(
            loc,
            ExprKind::List {
                func: Box::new(func),
                elements,
            },
        ))
    }

    fn parse_literal(&mut self, func: Expr) -> PResult<Expr> {
        let loc = func.loc.clone();
        self.bump(); // '|'
        let tok = self.bump();
        let word_loc = self.loc_at(&tok);
        let word = match tok.kind {
            TokenKind::Ident => self.text(&tok).to_string(),
            TokenKind::StringLit => fble_lexer::unescape_string_literal(self.text(&tok)),
            _ => return Err(ParseError::new(word_loc, "expected a literal word after '|'")),
        };
        Ok(Expr::new(
            loc,
            ExprKind::Literal {
                func: Box::new(func),
                word,
                word_loc,
            },
        ))
    }

    fn parse_abstract_cast(&mut self, package: Expr) -> PResult<Expr> {
        let loc = package.loc.clone();
        self.bump(); // '@'
        self.bump(); // '('
        let target = self.parse_expr_no_comma()?;
        self.expect(TokenKind::Comma)?;
        let value = self.parse_expr_no_comma()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::new(
            loc,
            ExprKind::AbstractCast {
                package: Box::new(package),
                target: Box::new(target),
                value: Box::new(value),
            },
        ))
    }

    fn parse_poly_apply(&mut self, poly: Expr) -> PResult<Expr> {
        let loc = poly.loc.clone();
        self.bump(); // '<'
        let arg = self.parse_expr_no_comma()?;
        self.expect(TokenKind::Gt)?;
        Ok(Expr::new(
            loc,
            ExprKind::PolyApply {
                poly: Box::new(poly),
                arg: Box::new(arg),
            },
        ))
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        match self.kind().clone() {
            TokenKind::At => {
                self.bump();
                let inner = self.parse_operand()?;
                Ok(Expr::new(loc, ExprKind::Typeof(Box::new(inner))))
            }
            TokenKind::Star => {
                self.bump();
                self.parse_data_type(loc, DataKind::Struct)
            }
            TokenKind::Plus => {
                self.bump();
                self.parse_data_type(loc, DataKind::Union)
            }
            TokenKind::Percent => {
                self.bump();
                let (path, _) = self.parse_package_path()?;
                Ok(Expr::new(loc, ExprKind::PackageType { path }))
            }
            TokenKind::Slash => {
                let (path, path_loc) = self.parse_module_path()?;
                Ok(Expr::new(path_loc, ExprKind::ModulePath(path)))
            }
            TokenKind::Lt => {
                self.bump();
                self.parse_poly_value(loc)
            }
            TokenKind::LParen => {
                self.bump();
                self.parse_paren_head(loc)
            }
            TokenKind::Ident => {
                let text = self.text(self.tok()).to_string();
                if text == "Link" && self.at_at(1, TokenKind::LParen) {
                    return self.parse_link(loc);
                }
                if text == "Exec" && self.at_at(1, TokenKind::LParen) {
                    return self.parse_exec(loc);
                }
                let name = self.parse_name()?;
                Ok(Expr::new(loc, ExprKind::Var(name)))
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    /// `Link(T; get, put) { body }`. Backtracks to a plain identifier if the
    /// shape doesn't match past the leading word.
    fn parse_link(&mut self, loc: Loc) -> PResult<Expr> {
        let save = self.pos;
        match self.try_parse_link(loc.clone()) {
            Ok(expr) => Ok(expr),
            Err(_) => {
                self.pos = save;
                let name = self.parse_name()?;
                Ok(Expr::new(loc, ExprKind::Var(name)))
            }
        }
    }

    fn try_parse_link(&mut self, loc: Loc) -> PResult<Expr> {
        self.bump(); // 'Link'
        self.expect(TokenKind::LParen)?;
        let element_type = self.parse_operand()?;
        self.expect(TokenKind::Semicolon)?;
        let get = self.parse_name()?;
        self.expect(TokenKind::Comma)?;
        let put = self.parse_name()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_expr()?;
        self.expect(TokenKind::RBrace)?;

        Ok(Expr::new(
            loc,
            ExprKind::Link {
                element_type: Box::new(element_type),
                get,
                put,
                body: Box::new(body),
            },
        ))
    }

    /// `Exec(T1 x1 = p1, T2 x2 = p2) { body }`. Backtracks to a plain
    /// identifier if the shape doesn't match past the leading word.
    fn parse_exec(&mut self, loc: Loc) -> PResult<Expr> {
        let save = self.pos;
        match self.try_parse_exec(loc.clone()) {
            Ok(expr) => Ok(expr),
            Err(_) => {
                self.pos = save;
                let name = self.parse_name()?;
                Ok(Expr::new(loc, ExprKind::Var(name)))
            }
        }
    }

    fn try_parse_exec(&mut self, loc: Loc) -> PResult<Expr> {
        self.bump(); // 'Exec'
        self.expect(TokenKind::LParen)?;
        let mut bindings = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let type_ = self.parse_operand()?;
                let name = self.parse_name()?;
                self.expect(TokenKind::Equals)?;
                let expr = self.parse_operand()?;
                bindings.push(ExecBinding {
                    type_: Some(Box::new(type_)),
                    name,
                    expr: Box::new(expr),
                });
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_expr()?;
        self.expect(TokenKind::RBrace)?;

        Ok(Expr::new(
            loc,
            ExprKind::Exec {
                bindings,
                body: Box::new(body),
            },
        ))
    }

    fn parse_data_type(&mut self, loc: Loc, data_kind: DataKind) -> PResult<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut fields = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let field_type = self.parse_operand()?;
                let name = self.parse_name()?;
                fields.push((field_type, name));
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::new(loc, ExprKind::DataType { data_kind, fields }))
    }

    fn parse_poly_value(&mut self, loc: Loc) -> PResult<Expr> {
        let param_kind = if self.at(TokenKind::At) {
            self.bump();
            Kind::type_()
        } else {
            self.expect(TokenKind::Percent)?;
            Kind::value()
        };
        let param_name = self.parse_name()?;
        self.expect(TokenKind::Semicolon)?;
        let body = self.parse_expr()?;
        self.expect(TokenKind::Gt)?;
        Ok(Expr::new(
            loc,
            ExprKind::PolyValue {
                param_kind,
                param_name,
                body: Box::new(body),
            },
        ))
    }

    /// After consuming the leading `(`, decide between a func *type*
    /// (`(T1, T2; R)`) and a func *value* (`(T1 x1, T2 x2) { body }`) by
    /// checking whether the first parenthesized item is followed by a name.
    fn parse_paren_head(&mut self, loc: Loc) -> PResult<Expr> {
        if self.at(TokenKind::RParen) {
            // Zero-arg func value: `(){ body }`.
            self.bump();
            self.expect(TokenKind::LBrace)?;
            let body = self.parse_expr()?;
            self.expect(TokenKind::RBrace)?;
            return Ok(Expr::new(
                loc,
                ExprKind::FuncValue {
                    args: Vec::new(),
                    body: Box::new(body),
                },
            ));
        }

        let first_type = self.parse_operand()?;

        if self.at(TokenKind::Ident) {
            // Func value: types are followed by argument names.
            let mut args = Vec::new();
            let name = self.parse_name()?;
            args.push(FuncArg {
                type_: Box::new(first_type),
                name,
            });
            while self.at(TokenKind::Comma) {
                self.bump();
                let t = self.parse_operand()?;
                let n = self.parse_name()?;
                args.push(FuncArg {
                    type_: Box::new(t),
                    name: n,
                });
            }
            self.expect(TokenKind::RParen)?;
            self.expect(TokenKind::LBrace)?;
            let body = self.parse_expr()?;
            self.expect(TokenKind::RBrace)?;
            return Ok(Expr::new(
                loc,
                ExprKind::FuncValue {
                    args,
                    body: Box::new(body),
                },
            ));
        }

        if self.at(TokenKind::RParen) {
            // A single parenthesized expression: grouping, not a func type.
            self.bump();
            return Ok(first_type);
        }

        // Func type: `(T1, T2; R)`.
        let mut arg_types = vec![first_type];
        while self.at(TokenKind::Comma) {
            self.bump();
            arg_types.push(self.parse_operand()?);
        }
        self.expect(TokenKind::Semicolon)?;
        let return_type = self.parse_operand()?;
        self.expect(TokenKind::RParen)?;
        Ok(Expr::new(
            loc,
            ExprKind::FuncType {
                args: arg_types,
                return_type: Box::new(return_type),
            },
        ))
    }
}

/// Parse one module's source text into its body expression and referenced
/// module paths.
pub fn parse_module(source: &str, source_name: &str) -> PResult<ParsedModule> {
    Parser::new(source, source_name).parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Expr {
        parse_module(src, "Test.fble").expect("parse").body
    }

    #[test]
    fn parses_bare_var() {
        let e = parse("Foo");
        assert!(matches!(e.kind, ExprKind::Var(_)));
    }

    #[test]
    fn parses_value_let() {
        let e = parse("Bool@ x = True; x");
        match e.kind {
            ExprKind::Let { bindings, .. } => {
                assert_eq!(bindings.len(), 1);
                assert_eq!(bindings[0].name.text, "x");
                assert!(bindings[0].type_.is_some());
            }
            _ => panic!("expected Let"),
        }
    }

    #[test]
    fn parses_type_level_let() {
        let e = parse("@ T@ = Bool@; T@");
        match e.kind {
            ExprKind::Let { bindings, .. } => {
                assert!(bindings[0].kind.is_some());
                assert!(bindings[0].type_.is_none());
            }
            _ => panic!("expected Let"),
        }
    }

    #[test]
    fn parses_struct_type_and_value() {
        let e = parse("*(Bool@ x, Bool@ y)");
        assert!(matches!(e.kind, ExprKind::DataType { data_kind: DataKind::Struct, .. }));
    }

    #[test]
    fn parses_union_value_and_select() {
        let e = parse("Maybe@:Just(x)?(Just: x, Nothing: y)");
        assert!(matches!(e.kind, ExprKind::UnionSelect { .. }));
    }

    #[test]
    fn parses_data_access() {
        let e = parse("p.x");
        assert!(matches!(e.kind, ExprKind::DataAccess { .. }));
    }

    #[test]
    fn parses_apply_and_list() {
        let e = parse("f(a, b)");
        assert!(matches!(e.kind, ExprKind::Apply { .. }));
        let e = parse("f[a, b, c]");
        assert!(matches!(e.kind, ExprKind::List { .. }));
    }

    #[test]
    fn parses_literal_sugar() {
        let e = parse("Letter@|hello");
        match e.kind {
            ExprKind::Literal { word, .. } => assert_eq!(word, "hello"),
            _ => panic!("expected Literal"),
        }
    }

    #[test]
    fn parses_func_type_and_value() {
        let e = parse("(Bool@, Bool@; Bool@)");
        assert!(matches!(e.kind, ExprKind::FuncType { .. }));
        let e = parse("(Bool@ x, Bool@ y) { x }");
        assert!(matches!(e.kind, ExprKind::FuncValue { .. }));
    }

    #[test]
    fn parses_proc_type() {
        let e = parse("Bool@!");
        assert!(matches!(e.kind, ExprKind::ProcType { .. }));
    }

    #[test]
    fn parses_poly_value_and_apply() {
        let e = parse("<@ T@; T@>");
        assert!(matches!(e.kind, ExprKind::PolyValue { .. }));
        let e = parse("f<Bool@>");
        assert!(matches!(e.kind, ExprKind::PolyApply { .. }));
    }

    #[test]
    fn parses_module_path_and_records_dep() {
        let parsed = parse_module("/Core/Bool%", "Test.fble").expect("parse");
        assert!(matches!(parsed.body.kind, ExprKind::ModulePath(_)));
        assert_eq!(parsed.deps.len(), 1);
        assert_eq!(parsed.deps[0].components.len(), 2);
    }

    #[test]
    fn parses_package_type_and_abstract_forms() {
        let e = parse("%/Core/Bool");
        assert!(matches!(e.kind, ExprKind::PackageType { .. }));
        let e = parse("pkg @(T, v)");
        assert!(matches!(e.kind, ExprKind::AbstractCast { .. }));
        let e = parse("v.@");
        assert!(matches!(e.kind, ExprKind::AbstractAccess { .. }));
    }

    #[test]
    fn parses_typeof() {
        let e = parse("@x");
        assert!(matches!(e.kind, ExprKind::Typeof(_)));
    }

    #[test]
    fn parses_link() {
        let e = parse("Link(Bool@; get, put) { get }");
        match e.kind {
            ExprKind::Link { get, put, .. } => {
                assert_eq!(get.text, "get");
                assert_eq!(put.text, "put");
            }
            _ => panic!("expected Link"),
        }
    }

    #[test]
    fn link_falls_back_to_plain_identifier() {
        let e = parse("Link");
        assert!(matches!(e.kind, ExprKind::Var(_)));
    }

    #[test]
    fn parses_exec() {
        let e = parse("Exec(Bool@ x = p) { x }");
        match e.kind {
            ExprKind::Exec { bindings, .. } => {
                assert_eq!(bindings.len(), 1);
                assert_eq!(bindings[0].name.text, "x");
            }
            _ => panic!("expected Exec"),
        }
    }

    #[test]
    fn exec_falls_back_to_plain_identifier() {
        let e = parse("Exec");
        assert!(matches!(e.kind, ExprKind::Var(_)));
    }

    #[test]
    fn unexpected_token_reports_location() {
        let err = parse_module(")", "Test.fble").unwrap_err();
        assert_eq!(err.loc.line, 1);
        assert_eq!(err.loc.col, 1);
    }
}
