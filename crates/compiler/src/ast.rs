//! Abstract syntax tree for Tern
//!
//! Every expression node carries a stable [`ExprId`] assigned during
//! parsing. The semantic analyzer keys its expression-type map on this id
//! rather than node identity, so backends that re-walk the (unchanged)
//! tree can recover the inferred type of any expression without having to
//! re-run inference. See `semantic::SemanticResult::expr_types`.

use tern_core::Span;

/// A stable per-compilation identifier for an expression node.
pub type ExprId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub imports: Vec<ImportDecl>,
    pub type_decls: Vec<TypeDecl>,
    pub functions: Vec<FunctionDecl>,
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            imports: Vec::new(),
            type_decls: Vec::new(),
            functions: Vec::new(),
            statements: Vec::new(),
        }
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Struct,
    Class,
}

impl CompositeKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            CompositeKind::Struct => "struct",
            CompositeKind::Class => "class",
        }
    }
}

/// A field in a struct/class declaration, or a parameter in a function
/// signature, or a local variable declaration: all three share the
/// `TYPE name[SIZE]` surface syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    /// The type name as written: a primitive keyword, `struct`/`class`
    /// name, or a previously declared composite's bare name.
    pub type_name: String,
    /// `Some(n)` when the declaration used the trailing `[n]` array form.
    pub array_size: Option<u64>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub spec: TypeSpec,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub kind: CompositeKind,
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub spec: TypeSpec,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub return_spec: TypeSpec,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub label: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl {
        spec: TypeSpec,
        name: String,
        init: Option<Expr>,
        span: Span,
    },
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
        span: Span,
    },
    Switch {
        cond: Expr,
        cases: Vec<CaseClause>,
        default: Option<Vec<Stmt>>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Print(Expr, Span),
    Return(Option<Expr>, Span),
    ExprStmt(Expr, Span),
    Block(Vec<Stmt>, Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Break(span)
            | Stmt::Continue(span)
            | Stmt::Print(_, span)
            | Stmt::Return(_, span)
            | Stmt::ExprStmt(_, span)
            | Stmt::Block(_, span) => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier {
        name: String,
        id: ExprId,
        span: Span,
    },
    IntLiteral {
        value: i64,
        id: ExprId,
        span: Span,
    },
    FloatLiteral {
        value: f64,
        id: ExprId,
        span: Span,
    },
    BoolLiteral {
        value: bool,
        id: ExprId,
        span: Span,
    },
    StringLiteral {
        value: String,
        id: ExprId,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        id: ExprId,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        id: ExprId,
        span: Span,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
        id: ExprId,
        span: Span,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        id: ExprId,
        span: Span,
    },
    Member {
        base: Box<Expr>,
        field: String,
        id: ExprId,
        span: Span,
    },
    Cast {
        type_name: String,
        expr: Box<Expr>,
        id: ExprId,
        span: Span,
    },
}

impl Expr {
    pub fn id(&self) -> ExprId {
        match self {
            Expr::Identifier { id, .. }
            | Expr::IntLiteral { id, .. }
            | Expr::FloatLiteral { id, .. }
            | Expr::BoolLiteral { id, .. }
            | Expr::StringLiteral { id, .. }
            | Expr::Unary { id, .. }
            | Expr::Binary { id, .. }
            | Expr::Call { id, .. }
            | Expr::Index { id, .. }
            | Expr::Member { id, .. }
            | Expr::Cast { id, .. } => *id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Identifier { span, .. }
            | Expr::IntLiteral { span, .. }
            | Expr::FloatLiteral { span, .. }
            | Expr::BoolLiteral { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Member { span, .. }
            | Expr::Cast { span, .. } => *span,
        }
    }
}
