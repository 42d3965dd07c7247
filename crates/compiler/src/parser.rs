//! Recursive-descent parser: token stream -> AST
//!
//! Surface grammar for function declarations uses the `->` arrow operator
//! for the return type (`func name(int a) -> int { ... }`), which is why
//! `Arrow` exists in the token set even though no other construct needs
//! it. Everything else follows spec.md §4.2 exactly: layered expression
//! precedence, panic-mode recovery with a synchronization set, cast
//! disambiguation via one-token lookahead, and known-type tracking so
//! `Point p;` is recognized as a declaration once `struct Point { ... }`
//! has been seen.

use crate::ast::*;
use std::collections::HashSet;
use tern_core::{AggregateError, Diagnostic, DiagnosticCode, Span, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<Diagnostic>,
    known_types: HashSet<String>,
    next_expr_id: ExprId,
}

type PResult<T> = Result<T, Diagnostic>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
            known_types: HashSet::new(),
            next_expr_id: 0,
        }
    }

    fn next_id(&mut self) -> ExprId {
        let id = self.next_expr_id;
        self.next_expr_id += 1;
        id
    }

    // ---- token stream primitives ----------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, code: DiagnosticCode, message: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.current();
            Err(Diagnostic::error(code, message, tok.span))
        }
    }

    fn consume_optional_semicolon(&mut self) {
        self.matches(&TokenKind::Semicolon);
    }

    // ---- top level --------------------------------------------------

    pub fn parse(mut self) -> Result<Program, AggregateError> {
        let mut program = Program::new();

        while !self.check(&TokenKind::BeginMain) && !self.is_at_end() {
            let checkpoint = self.pos;
            let result = self.parse_top_level_item(&mut program);
            if let Err(d) = result {
                self.errors.push(d);
                self.synchronize_top_level();
            }
            if self.pos == checkpoint && !self.is_at_end() {
                self.advance();
            }
        }

        if !self.matches(&TokenKind::BeginMain) {
            let tok = self.current();
            self.errors.push(Diagnostic::error(
                DiagnosticCode::ExpectedStart,
                "Program must start with the begin-of-main keyword.",
                tok.span,
            ));
            while !self.check(&TokenKind::BeginMain) && !self.is_at_end() {
                self.advance();
            }
            self.matches(&TokenKind::BeginMain);
        }

        let mut statements = Vec::new();
        while !self.check(&TokenKind::EndMain) && !self.is_at_end() {
            let checkpoint = self.pos;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(d) => {
                    self.errors.push(d);
                    self.synchronize(false);
                }
            }
            if self.pos == checkpoint && !self.is_at_end() {
                self.advance();
            }
        }
        program.statements = statements;

        if !self.matches(&TokenKind::EndMain) {
            let tok = self.current();
            self.errors.push(Diagnostic::error(
                DiagnosticCode::ExpectedEnd,
                "Program must end with the end-of-main keyword.",
                tok.span,
            ));
        }

        if !self.is_at_end() {
            let tok = self.current();
            self.errors.push(Diagnostic::error(
                DiagnosticCode::UnexpectedToken,
                "Unexpected tokens found after the end-of-main keyword.",
                tok.span,
            ));
        }

        if self.errors.is_empty() {
            Ok(program)
        } else {
            Err(AggregateError::new(self.errors))
        }
    }

    fn parse_top_level_item(&mut self, program: &mut Program) -> PResult<()> {
        if self.check(&TokenKind::Import) {
            let import_tok = self.advance();
            let path = self.parse_import_path()?;
            program.imports.push(ImportDecl { path, span: import_tok.span });
        } else if self.check(&TokenKind::Struct) || self.check(&TokenKind::Class) {
            program.type_decls.push(self.parse_type_decl()?);
        } else if self.check(&TokenKind::Func) {
            program.functions.push(self.parse_function()?);
        } else {
            let tok = self.current();
            return Err(Diagnostic::error(
                DiagnosticCode::UnexpectedToken,
                "Only imports, type declarations, or functions are allowed before the begin-of-main keyword.",
                tok.span,
            ));
        }
        Ok(())
    }

    fn parse_import_path(&mut self) -> PResult<String> {
        let tok = self.expect(
            &TokenKind::StringLiteral(String::new()),
            DiagnosticCode::InvalidStatement,
            "Expected an import path string after `import`.",
        )?;
        self.consume_optional_semicolon();
        match tok.kind {
            TokenKind::StringLiteral(s) => Ok(s),
            _ => unreachable!(),
        }
    }

    fn parse_type_decl(&mut self) -> PResult<TypeDecl> {
        let kind_tok = self.advance();
        let kind = match kind_tok.kind {
            TokenKind::Struct => CompositeKind::Struct,
            TokenKind::Class => CompositeKind::Class,
            _ => {
                return Err(Diagnostic::error(
                    DiagnosticCode::UnexpectedToken,
                    "Expected `struct` or `class`.",
                    kind_tok.span,
                ))
            }
        };
        let name_tok = self.expect(
            &TokenKind::Ident(String::new()),
            DiagnosticCode::InvalidStatement,
            "Expected a type name.",
        )?;
        let name = ident_text(&name_tok);
        self.expect(
            &TokenKind::LBrace,
            DiagnosticCode::MissingLbrace,
            "Expected `{` to start the type body.",
        )?;

        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.is_at_end() {
                return Err(Diagnostic::error(
                    DiagnosticCode::MissingRbrace,
                    "Expected `}` to close the type declaration.",
                    self.current().span,
                ));
            }
            let spec = self.parse_type_spec(false)?;
            let field_name_tok = self.expect(
                &TokenKind::Ident(String::new()),
                DiagnosticCode::InvalidStatement,
                "Expected a field name.",
            )?;
            let field_span = field_name_tok.span;
            let field_name = ident_text(&field_name_tok);
            let spec = self.parse_trailing_array(spec)?;
            self.consume_optional_semicolon();
            fields.push(FieldDecl {
                spec,
                name: field_name,
                span: field_span,
            });
        }
        self.expect(
            &TokenKind::RBrace,
            DiagnosticCode::MissingRbrace,
            "Expected `}` to close the type declaration.",
        )?;
        self.matches(&TokenKind::Semicolon);
        self.known_types.insert(name.clone());
        Ok(TypeDecl {
            kind,
            name,
            fields,
            span: kind_tok.span,
        })
    }

    fn parse_trailing_array(&mut self, spec: TypeSpec) -> PResult<TypeSpec> {
        if self.matches(&TokenKind::LBracket) {
            let size_tok = self.expect(
                &TokenKind::IntLiteral(0),
                DiagnosticCode::InvalidStatement,
                "Expected a numeric array size.",
            )?;
            let size = match size_tok.kind {
                TokenKind::IntLiteral(n) => n,
                _ => unreachable!(),
            };
            self.expect(
                &TokenKind::RBracket,
                DiagnosticCode::UnexpectedToken,
                "Expected `]` after the array size.",
            )?;
            Ok(TypeSpec {
                array_size: Some(size.max(0) as u64),
                ..spec
            })
        } else {
            Ok(spec)
        }
    }

    fn parse_function(&mut self) -> PResult<FunctionDecl> {
        let fn_tok = self.expect(
            &TokenKind::Func,
            DiagnosticCode::InvalidFunction,
            "Expected `func` at the start of a function declaration.",
        )?;
        let name_tok = self.expect(
            &TokenKind::Ident(String::new()),
            DiagnosticCode::InvalidFunction,
            "Expected a function name.",
        )?;
        let name = ident_text(&name_tok);
        self.expect(
            &TokenKind::LParen,
            DiagnosticCode::MissingLparen,
            "Expected `(` after the function name.",
        )?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            params.push(self.parse_param()?);
            while self.matches(&TokenKind::Comma) {
                params.push(self.parse_param()?);
            }
        }
        self.expect(
            &TokenKind::RParen,
            DiagnosticCode::MissingRparen,
            "Expected `)` after the parameter list.",
        )?;
        self.expect(
            &TokenKind::Arrow,
            DiagnosticCode::InvalidFunction,
            "Expected `->` before the return type.",
        )?;
        let return_spec = self.parse_type_spec(true)?;
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            params,
            return_spec,
            body,
            span: fn_tok.span,
        })
    }

    fn parse_param(&mut self) -> PResult<ParamDecl> {
        let spec = self.parse_type_spec(false)?;
        let name_tok = self.expect(
            &TokenKind::Ident(String::new()),
            DiagnosticCode::InvalidParams,
            "Expected a parameter name.",
        )?;
        let span = name_tok.span;
        Ok(ParamDecl {
            spec,
            name: ident_text(&name_tok),
            span,
        })
    }

    fn parse_type_spec(&mut self, allow_void: bool) -> PResult<TypeSpec> {
        let tok = self.current().clone();
        let name = match &tok.kind {
            TokenKind::TypeInt => "int",
            TokenKind::TypeFloat => "float",
            TokenKind::TypeBool => "bool",
            TokenKind::TypeText => "text",
            TokenKind::TypeVoid => {
                if !allow_void {
                    return Err(Diagnostic::error(
                        DiagnosticCode::TypeMismatch,
                        "`void` is not allowed here.",
                        tok.span,
                    ));
                }
                "void"
            }
            TokenKind::Struct => {
                self.advance();
                let name_tok = self.expect(
                    &TokenKind::Ident(String::new()),
                    DiagnosticCode::InvalidStatement,
                    "Expected a struct type name.",
                )?;
                return Ok(TypeSpec {
                    type_name: format!("struct {}", ident_text(&name_tok)),
                    array_size: None,
                    span: tok.span,
                });
            }
            TokenKind::Class => {
                self.advance();
                let name_tok = self.expect(
                    &TokenKind::Ident(String::new()),
                    DiagnosticCode::InvalidStatement,
                    "Expected a class type name.",
                )?;
                return Ok(TypeSpec {
                    type_name: format!("class {}", ident_text(&name_tok)),
                    array_size: None,
                    span: tok.span,
                });
            }
            TokenKind::Ident(n) if self.known_types.contains(n) => {
                self.advance();
                return Ok(TypeSpec {
                    type_name: n.clone(),
                    array_size: None,
                    span: tok.span,
                });
            }
            _ => {
                return Err(Diagnostic::error(
                    DiagnosticCode::InvalidStatement,
                    "Expected a type name.",
                    tok.span,
                ))
            }
        };
        self.advance();
        Ok(TypeSpec {
            type_name: name.to_string(),
            array_size: None,
            span: tok.span,
        })
    }

    fn is_var_decl_start(&self) -> bool {
        match self.current().kind {
            TokenKind::TypeInt | TokenKind::TypeFloat | TokenKind::TypeBool | TokenKind::TypeText => {
                matches!(self.peek_kind(1), TokenKind::Ident(_))
            }
            TokenKind::Struct | TokenKind::Class => {
                matches!(self.peek_kind(1), TokenKind::Ident(_)) && matches!(self.peek_kind(2), TokenKind::Ident(_))
            }
            TokenKind::Ident(ref n) => {
                self.known_types.contains(n) && matches!(self.peek_kind(1), TokenKind::Ident(_))
            }
            _ => false,
        }
    }

    fn is_cast_start(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::TypeInt | TokenKind::TypeFloat | TokenKind::TypeBool | TokenKind::TypeText
        ) && matches!(self.peek_kind(1), TokenKind::LParen)
    }

    // ---- statements --------------------------------------------------

    fn parse_statement(&mut self) -> PResult<Stmt> {
        if self.check(&TokenKind::LBrace) {
            let (stmts, span) = self.parse_block_raw()?;
            return Ok(Stmt::Block(stmts, span));
        }
        if self.is_var_decl_start() {
            return self.parse_var_decl();
        }
        match self.current().kind {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Break => {
                let tok = self.advance();
                self.consume_optional_semicolon();
                Ok(Stmt::Break(tok.span))
            }
            TokenKind::Continue => {
                let tok = self.advance();
                self.consume_optional_semicolon();
                Ok(Stmt::Continue(tok.span))
            }
            TokenKind::Print => self.parse_print(),
            TokenKind::Return => self.parse_return(),
            _ => self.parse_assignment_or_expr_statement(true),
        }
    }

    fn parse_var_decl(&mut self) -> PResult<Stmt> {
        let spec = self.parse_type_spec(false)?;
        let span = spec.span;
        let name_tok = self.expect(
            &TokenKind::Ident(String::new()),
            DiagnosticCode::InvalidStatement,
            "Expected a variable name.",
        )?;
        let name = ident_text(&name_tok);
        let spec = self.parse_trailing_array(spec)?;
        let init = if self.matches(&TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume_optional_semicolon();
        Ok(Stmt::VarDecl {
            spec,
            name,
            init,
            span,
        })
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        Ok(self.parse_block_raw()?.0)
    }

    fn parse_block_raw(&mut self) -> PResult<(Vec<Stmt>, Span)> {
        let lbrace = self.expect(
            &TokenKind::LBrace,
            DiagnosticCode::MissingLbrace,
            "Expected `{` to start a block.",
        )?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.is_at_end() {
                return Err(Diagnostic::error(
                    DiagnosticCode::MissingRbrace,
                    "Expected `}` before end of file.",
                    self.current().span,
                ));
            }
            let checkpoint = self.pos;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(d) => {
                    self.errors.push(d);
                    self.synchronize(true);
                }
            }
            if self.pos == checkpoint && !self.is_at_end() {
                self.advance();
            }
        }
        self.expect(
            &TokenKind::RBrace,
            DiagnosticCode::MissingRbrace,
            "Expected `}` to close the block.",
        )?;
        Ok((statements, lbrace.span))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        self.expect(&TokenKind::LParen, DiagnosticCode::MissingLparen, "Expected `(` after `if`.")?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` after the if condition.")?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.matches(&TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            span: tok.span,
        })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        self.expect(&TokenKind::LParen, DiagnosticCode::MissingLparen, "Expected `(` after `while`.")?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` after the while condition.")?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body, span: tok.span })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        self.expect(&TokenKind::LParen, DiagnosticCode::MissingLparen, "Expected `(` after `for`.")?;
        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if self.is_var_decl_start() {
            Some(Box::new(self.parse_var_decl()?))
        } else {
            Some(Box::new(self.parse_assignment_or_expr_statement(false)?))
        };
        self.expect(
            &TokenKind::Semicolon,
            DiagnosticCode::MissingSemicolon,
            "Expected `;` after the for-loop initializer.",
        )?;
        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(
            &TokenKind::Semicolon,
            DiagnosticCode::MissingSemicolon,
            "Expected `;` after the for-loop condition.",
        )?;
        let post = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_assignment_or_expr_statement(false)?))
        };
        self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` to close the for-loop header.")?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
            span: tok.span,
        })
    }

    fn parse_do_while(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        let body = self.parse_block()?;
        self.expect(&TokenKind::While, DiagnosticCode::InvalidStatement, "Expected `while` after a `do` block.")?;
        self.expect(&TokenKind::LParen, DiagnosticCode::MissingLparen, "Expected `(` after `while`.")?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` after the do-while condition.")?;
        self.consume_optional_semicolon();
        Ok(Stmt::DoWhile { body, cond, span: tok.span })
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        self.expect(&TokenKind::LParen, DiagnosticCode::MissingLparen, "Expected `(` after `switch`.")?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` after the switch condition.")?;
        self.expect(&TokenKind::LBrace, DiagnosticCode::MissingLbrace, "Expected `{` after the switch condition.")?;

        let mut cases = Vec::new();
        let mut default: Option<Vec<Stmt>> = None;
        while !self.check(&TokenKind::RBrace) {
            if self.is_at_end() {
                return Err(Diagnostic::error(
                    DiagnosticCode::MissingRbrace,
                    "Expected `}` to close the switch block.",
                    self.current().span,
                ));
            }
            if self.matches(&TokenKind::Case) {
                let case_span = self.tokens[self.pos - 1].span;
                let label = self.parse_expression()?;
                self.expect(&TokenKind::Colon, DiagnosticCode::UnexpectedToken, "Expected `:` after the case label.")?;
                let body = self.parse_case_body()?;
                cases.push(CaseClause { label, body, span: case_span });
                continue;
            }
            if self.matches(&TokenKind::Default) {
                let default_tok = self.tokens[self.pos - 1].clone();
                if default.is_some() {
                    return Err(Diagnostic::error(
                        DiagnosticCode::DuplicateDefault,
                        "Only one `default` block is allowed in a switch.",
                        default_tok.span,
                    ));
                }
                self.expect(&TokenKind::Colon, DiagnosticCode::UnexpectedToken, "Expected `:` after `default`.")?;
                default = Some(self.parse_case_body()?);
                continue;
            }
            return Err(Diagnostic::error(
                DiagnosticCode::UnexpectedToken,
                "Expected `case` or `default` inside a switch block.",
                self.current().span,
            ));
        }
        self.expect(&TokenKind::RBrace, DiagnosticCode::MissingRbrace, "Expected `}` to close the switch block.")?;
        Ok(Stmt::Switch { cond, cases, default, span: tok.span })
    }

    fn parse_case_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::Case)
            && !self.check(&TokenKind::Default)
            && !self.check(&TokenKind::RBrace)
            && !self.is_at_end()
        {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_print(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        self.expect(&TokenKind::LParen, DiagnosticCode::MissingLparen, "Expected `(` after `print`.")?;
        let value = self.parse_expression()?;
        self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` after the print expression.")?;
        self.consume_optional_semicolon();
        Ok(Stmt::Print(value, tok.span))
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        let value = if self.is_return_boundary() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_optional_semicolon();
        Ok(Stmt::Return(value, tok.span))
    }

    fn is_return_boundary(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Semicolon
                | TokenKind::RBrace
                | TokenKind::EndMain
                | TokenKind::Eof
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Do
                | TokenKind::Switch
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Print
                | TokenKind::Return
        )
    }

    fn parse_assignment_or_expr_statement(&mut self, expect_semicolon: bool) -> PResult<Stmt> {
        if matches!(self.current().kind, TokenKind::Incr | TokenKind::Decr) {
            let op_tok = self.advance();
            let target = self.parse_postfix()?;
            check_lvalue(&target, op_tok.span)?;
            let one = Expr::IntLiteral { value: 1, id: self.next_id(), span: op_tok.span };
            let op = if matches!(op_tok.kind, TokenKind::Incr) { BinaryOp::Add } else { BinaryOp::Sub };
            let value = Expr::Binary {
                op,
                left: Box::new(target.clone()),
                right: Box::new(one),
                id: self.next_id(),
                span: op_tok.span,
            };
            if expect_semicolon {
                self.consume_optional_semicolon();
            }
            let span = target.span();
            return Ok(Stmt::Assign { target, value, span });
        }

        let expr = self.parse_expression()?;
        let compound = match self.current().kind {
            TokenKind::Assign => Some(None),
            TokenKind::PlusAssign => Some(Some(BinaryOp::Add)),
            TokenKind::MinusAssign => Some(Some(BinaryOp::Sub)),
            TokenKind::StarAssign => Some(Some(BinaryOp::Mul)),
            TokenKind::SlashAssign => Some(Some(BinaryOp::Div)),
            TokenKind::PercentAssign => Some(Some(BinaryOp::Mod)),
            TokenKind::Incr => Some(Some(BinaryOp::Add)),
            TokenKind::Decr => Some(Some(BinaryOp::Sub)),
            _ => None,
        };
        if let Some(op) = compound {
            let op_tok = self.advance();
            check_lvalue(&expr, op_tok.span)?;
            let value = match op {
                None => self.parse_expression()?,
                Some(BinaryOp::Add) | Some(BinaryOp::Sub)
                    if matches!(op_tok.kind, TokenKind::Incr | TokenKind::Decr) =>
                {
                    let one = Expr::IntLiteral { value: 1, id: self.next_id(), span: op_tok.span };
                    Expr::Binary {
                        op: op.unwrap(),
                        left: Box::new(expr.clone()),
                        right: Box::new(one),
                        id: self.next_id(),
                        span: op_tok.span,
                    }
                }
                Some(bin_op) => {
                    let rhs = self.parse_expression()?;
                    Expr::Binary {
                        op: bin_op,
                        left: Box::new(expr.clone()),
                        right: Box::new(rhs),
                        id: self.next_id(),
                        span: op_tok.span,
                    }
                }
            };
            if expect_semicolon {
                self.consume_optional_semicolon();
            }
            let span = expr.span();
            return Ok(Stmt::Assign { target: expr, value, span });
        }

        if expect_semicolon {
            self.consume_optional_semicolon();
        }
        let span = expr.span();
        Ok(Stmt::ExprStmt(expr, span))
    }

    // ---- expressions ---------------------------------------------------

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let tok = self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary { op: BinaryOp::Or, left: Box::new(left), right: Box::new(right), id: self.next_id(), span: tok.span };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            let tok = self.advance();
            let right = self.parse_equality()?;
            left = Expr::Binary { op: BinaryOp::And, left: Box::new(left), right: Box::new(right), id: self.next_id(), span: tok.span };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            let tok = self.advance();
            let right = self.parse_relational()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), id: self.next_id(), span: tok.span };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            let tok = self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), id: self.next_id(), span: tok.span };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let tok = self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), id: self.next_id(), span: tok.span };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let tok = self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), id: self.next_id(), span: tok.span };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::Bang) {
            let tok = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand), id: self.next_id(), span: tok.span });
        }
        if self.check(&TokenKind::Minus) {
            let tok = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand), id: self.next_id(), span: tok.span });
        }
        if self.is_cast_start() {
            let spec = self.parse_type_spec(false)?;
            self.expect(&TokenKind::LParen, DiagnosticCode::MissingLparen, "Expected `(` after the cast type.")?;
            let operand = self.parse_expression()?;
            self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` after the cast expression.")?;
            return Ok(Expr::Cast {
                type_name: spec.type_name,
                expr: Box::new(operand),
                id: self.next_id(),
                span: spec.span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(&TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    args.push(self.parse_expression()?);
                    while self.matches(&TokenKind::Comma) {
                        args.push(self.parse_expression()?);
                    }
                }
                self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` after call arguments.")?;
                let callee = match &expr {
                    Expr::Identifier { name, .. } => name.clone(),
                    _ => {
                        return Err(Diagnostic::error(
                            DiagnosticCode::InvalidExpression,
                            "Only a function name can be called.",
                            expr.span(),
                        ))
                    }
                };
                let span = expr.span();
                expr = Expr::Call { callee, args, id: self.next_id(), span };
                continue;
            }
            if self.matches(&TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let rb = self.expect(&TokenKind::RBracket, DiagnosticCode::UnexpectedToken, "Expected `]` after the index expression.")?;
                expr = Expr::Index { base: Box::new(expr), index: Box::new(index), id: self.next_id(), span: rb.span };
                continue;
            }
            if self.matches(&TokenKind::Dot) {
                let name_tok = self.expect(&TokenKind::Ident(String::new()), DiagnosticCode::InvalidExpression, "Expected a member name after `.`.")?;
                let span = name_tok.span;
                expr = Expr::Member { base: Box::new(expr), field: ident_text(&name_tok), id: self.next_id(), span };
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::IntLiteral(v) => {
                self.advance();
                Ok(Expr::IntLiteral { value: v, id: self.next_id(), span: tok.span })
            }
            TokenKind::FloatLiteral(v) => {
                self.advance();
                Ok(Expr::FloatLiteral { value: v, id: self.next_id(), span: tok.span })
            }
            TokenKind::StringLiteral(ref s) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::StringLiteral { value: s, id: self.next_id(), span: tok.span })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::BoolLiteral { value: true, id: self.next_id(), span: tok.span })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::BoolLiteral { value: false, id: self.next_id(), span: tok.span })
            }
            TokenKind::Ident(ref name) => {
                let name = name.clone();
                self.advance();
                Ok(Expr::Identifier { name, id: self.next_id(), span: tok.span })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen, DiagnosticCode::MissingRparen, "Expected `)` after the expression.")?;
                Ok(expr)
            }
            _ => Err(Diagnostic::error(
                DiagnosticCode::InvalidExpression,
                format!("Unexpected token `{}` in expression.", tok.text),
                tok.span,
            )),
        }
    }

    // ---- recovery ------------------------------------------------------

    fn at_sync_point(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Import
                | TokenKind::TypeInt
                | TokenKind::TypeFloat
                | TokenKind::TypeBool
                | TokenKind::TypeText
                | TokenKind::Struct
                | TokenKind::Class
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Do
                | TokenKind::Switch
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Print
                | TokenKind::Return
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::EndMain
                | TokenKind::Func
                | TokenKind::BeginMain
        )
    }

    /// Advances past the current statement fragment, guaranteeing forward
    /// progress: if no synchronization point is reached by consuming at
    /// least one token, the loop still advances once more below.
    fn synchronize(&mut self, in_block: bool) {
        let start = self.pos;
        while !self.is_at_end() {
            if self.pos > start && matches!(self.tokens[self.pos - 1].kind, TokenKind::Semicolon) {
                return;
            }
            if self.at_sync_point() {
                if matches!(self.current().kind, TokenKind::RBrace) {
                    if in_block {
                        return;
                    }
                } else {
                    return;
                }
            }
            self.advance();
        }
        if self.pos == start && !self.is_at_end() {
            self.advance();
        }
    }

    fn synchronize_top_level(&mut self) {
        while !self.is_at_end() {
            if matches!(
                self.current().kind,
                TokenKind::Import | TokenKind::Struct | TokenKind::Class | TokenKind::Func | TokenKind::BeginMain
            ) {
                return;
            }
            self.advance();
        }
    }
}

fn ident_text(tok: &Token) -> String {
    match &tok.kind {
        TokenKind::Ident(s) => s.clone(),
        _ => tok.text.clone(),
    }
}

fn check_lvalue(expr: &Expr, span: Span) -> PResult<()> {
    match expr {
        Expr::Identifier { .. } | Expr::Index { .. } | Expr::Member { .. } => Ok(()),
        _ => Err(Diagnostic::error(
            DiagnosticCode::InvalidLvalue,
            "Assignment target must be a variable, index, or field access.",
            span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_ok(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().unwrap().tokens;
        Parser::new(tokens).parse().unwrap()
    }

    #[test]
    fn parses_arithmetic_and_print() {
        let program = parse_ok("begin int x = 1 + 2 * 3; print(x); return 0; end");
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn reports_aggregate_error_for_multiple_syntax_faults() {
        let tokens = Lexer::new("begin int x = 1 print(x) end").tokenize().unwrap().tokens;
        let err = Parser::new(tokens).parse().unwrap_err();
        assert!(err.diagnostics().len() >= 1);
    }

    #[test]
    fn top_level_break_is_parsed_and_left_to_semantic_analysis() {
        let program = parse_ok("begin break; end");
        assert!(matches!(program.statements[0], Stmt::Break(_)));
    }

    #[test]
    fn function_with_arrow_return_type_and_call() {
        let program = parse_ok(
            "func twice(int a) -> int { return a * 2; } begin print(twice(3)); end",
        );
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].params.len(), 1);
    }

    #[test]
    fn cast_disambiguated_from_declaration() {
        let program = parse_ok("begin float x = float(3); end");
        match &program.statements[0] {
            Stmt::VarDecl { init: Some(Expr::Cast { .. }), .. } => {}
            other => panic!("expected cast initializer, got {:?}", other),
        }
    }

    #[test]
    fn struct_field_then_known_type_var_decl() {
        let program = parse_ok(
            "struct Point { int x; int y; } begin Point p; end",
        );
        assert_eq!(program.type_decls.len(), 1);
        assert!(matches!(program.statements[0], Stmt::VarDecl { .. }));
    }

    #[test]
    fn compound_assignment_desugars_to_binary() {
        let program = parse_ok("begin int x = 1; x += 2; end");
        match &program.statements[1] {
            Stmt::Assign { value: Expr::Binary { op: BinaryOp::Add, .. }, .. } => {}
            other => panic!("expected desugared add, got {:?}", other),
        }
    }
}
