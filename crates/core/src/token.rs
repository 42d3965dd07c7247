//! Token record
//!
//! A [`Token`] is a tagged record produced by the lexer. Kinds partition
//! into literal, identifier, keyword, punctuation, and a single trailing
//! EOF token whose position is one past the end of the source.

use crate::span::Span;

/// The tag of a [`Token`].
///
/// Two-character operators are always distinct variants from their
/// one-character prefixes (e.g. `PlusAssign` is never confused with
/// `Plus`) so the parser never needs to re-split lexemes.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    Ident(String),

    // Keywords: program structure
    Import,
    BeginMain,
    EndMain,
    Func,

    // Keywords: control flow
    If,
    Else,
    While,
    For,
    Do,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Print,
    Return,

    // Keywords: literals and types
    True,
    False,
    TypeInt,
    TypeFloat,
    TypeBool,
    TypeText,
    TypeVoid,
    Struct,
    Class,

    // Punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Lt,
    Gt,
    Bang,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Colon,
    Arrow,

    // Two-character operators
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Incr,
    Decr,
    EqEq,
    NotEq,
    LtEq,
    GtEq,
    AndAnd,
    OrOr,

    Eof,
}

impl TokenKind {
    /// True for tokens that introduce a primitive type name.
    pub fn is_primitive_type(&self) -> bool {
        matches!(
            self,
            TokenKind::TypeInt
                | TokenKind::TypeFloat
                | TokenKind::TypeBool
                | TokenKind::TypeText
                | TokenKind::TypeVoid
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The literal source text the token was lexed from (the original
    /// spelling, including legacy keyword aliases).
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn line(&self) -> u32 {
        self.span.line
    }

    pub fn column(&self) -> u32 {
        self.span.column
    }
}
