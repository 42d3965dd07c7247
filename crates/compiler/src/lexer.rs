//! Lexical analysis: byte stream -> token stream
//!
//! Skips whitespace/BOM and comments, folds keyword spellings (including
//! a legacy dialect that raises a `legacy_keyword` warning instead of
//! rejecting the input), and parses literals. Fails fatally on an unknown
//! character or an unterminated string/block comment.

use tern_core::{Diagnostic, DiagnosticCode, Span, Token, TokenKind};

/// Canonical keyword spellings. Checked after identifier scanning, so an
/// identifier lexeme that matches one of these becomes a keyword token.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("import", TokenKind::Import),
    ("begin", TokenKind::BeginMain),
    ("end", TokenKind::EndMain),
    ("func", TokenKind::Func),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("do", TokenKind::Do),
    ("switch", TokenKind::Switch),
    ("case", TokenKind::Case),
    ("default", TokenKind::Default),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("print", TokenKind::Print),
    ("return", TokenKind::Return),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("int", TokenKind::TypeInt),
    ("float", TokenKind::TypeFloat),
    ("bool", TokenKind::TypeBool),
    ("text", TokenKind::TypeText),
    ("void", TokenKind::TypeVoid),
    ("struct", TokenKind::Struct),
    ("class", TokenKind::Class),
];

/// Legacy spellings accepted for backward compatibility. Each folds to
/// the same `TokenKind` as its canonical counterpart (named here for the
/// warning message) but is reported via `legacy_keyword`.
const LEGACY_KEYWORDS: &[(&str, TokenKind, &str)] = &[
    ("start", TokenKind::BeginMain, "begin"),
    ("finish", TokenKind::EndMain, "end"),
    ("function", TokenKind::Func, "func"),
    ("stop", TokenKind::Break, "break"),
    ("resume", TokenKind::Continue, "continue"),
    ("yes", TokenKind::True, "true"),
    ("no", TokenKind::False, "false"),
];

fn keyword_kind(word: &str) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|(spelling, _)| *spelling == word)
        .map(|(_, kind)| kind.clone())
}

fn legacy_keyword(word: &str) -> Option<(TokenKind, &'static str)> {
    LEGACY_KEYWORDS
        .iter()
        .find(|(spelling, ..)| *spelling == word)
        .map(|(_, kind, canonical)| (kind.clone(), *canonical))
}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    warnings: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub warnings: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            warnings: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<LexResult, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.is_at_end() {
                tokens.push(Token::new(TokenKind::Eof, "", self.here()));
                break;
            }
            tokens.push(self.next_token()?);
        }
        Ok(LexResult {
            tokens,
            warnings: self.warnings,
        })
    }

    fn here(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> u8 {
        *self.source.get(self.pos).unwrap_or(&0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        *self.source.get(self.pos + offset).unwrap_or(&0)
    }

    fn advance(&mut self) -> u8 {
        let ch = self.source[self.pos];
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' | 0xEF => {
                    // 0xEF starts a UTF-8 BOM sequence (EF BB BF); treat any
                    // lone occurrence as whitespace rather than misreading it.
                    self.advance();
                }
                b'\n' => {
                    self.advance();
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while !self.is_at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    let start = self.here();
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            return Err(Diagnostic::error(
                                DiagnosticCode::UnterminatedString,
                                "Unterminated block comment.",
                                start,
                            ));
                        }
                        if self.peek() == b'*' && self.peek_at(1) == b'/' {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, Diagnostic> {
        let start = self.here();
        let ch = self.peek();

        if ch.is_ascii_alphabetic() || ch == b'_' {
            return Ok(self.identifier_or_keyword(start));
        }
        if ch.is_ascii_digit() {
            return self.number(start);
        }
        if ch == b'"' {
            return self.string(start);
        }

        // Two-character operators must be tried before their one-character
        // prefixes.
        let two = [ch, self.peek_at(1)];
        if let Some(kind) = two_char_kind(two) {
            self.advance();
            self.advance();
            let text = std::str::from_utf8(&two).unwrap().to_string();
            return Ok(Token::new(kind, text, start));
        }
        if let Some(kind) = one_char_kind(ch) {
            self.advance();
            return Ok(Token::new(kind, (ch as char).to_string(), start));
        }

        Err(Diagnostic::error(
            DiagnosticCode::UnknownChar,
            format!("Unexpected character `{}`.", ch as char),
            start,
        ))
    }

    fn identifier_or_keyword(&mut self, start: Span) -> Token {
        let begin = self.pos;
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[begin..self.pos])
            .unwrap()
            .to_string();

        if let Some(kind) = keyword_kind(&text) {
            return Token::new(kind, text, start);
        }
        if let Some((kind, canonical)) = legacy_keyword(&text) {
            self.warnings.push(Diagnostic::warning(
                DiagnosticCode::LegacyKeyword,
                format!("`{}` is a legacy spelling of `{}`.", text, canonical),
                start,
            ));
            return Token::new(kind, text, start);
        }
        Token::new(TokenKind::Ident(text.clone()), text, start)
    }

    fn number(&mut self, start: Span) -> Result<Token, Diagnostic> {
        let begin = self.pos;
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            let text = std::str::from_utf8(&self.source[begin..self.pos])
                .unwrap()
                .to_string();
            let value: f64 = text.parse().unwrap();
            return Ok(Token::new(TokenKind::FloatLiteral(value), text, start));
        }
        let text = std::str::from_utf8(&self.source[begin..self.pos])
            .unwrap()
            .to_string();
        let value: i64 = text.parse().unwrap();
        Ok(Token::new(TokenKind::IntLiteral(value), text, start))
    }

    fn string(&mut self, start: Span) -> Result<Token, Diagnostic> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            if self.is_at_end() {
                return Err(Diagnostic::error(
                    DiagnosticCode::UnterminatedString,
                    "Unterminated string literal.",
                    start,
                ));
            }
            let ch = self.peek();
            if ch == b'"' {
                self.advance();
                break;
            }
            if ch == b'\n' {
                return Err(Diagnostic::error(
                    DiagnosticCode::UnterminatedString,
                    "Newline inside string literal.",
                    start,
                ));
            }
            if ch == b'\\' {
                self.advance();
                let esc = self.peek();
                self.advance();
                match esc {
                    b'n' => value.push('\n'),
                    b't' => value.push('\t'),
                    b'"' => value.push('"'),
                    b'\\' => value.push('\\'),
                    other => {
                        value.push('\\');
                        value.push(other as char);
                    }
                }
                continue;
            }
            value.push(self.advance() as char);
        }
        Ok(Token::new(TokenKind::StringLiteral(value.clone()), value, start))
    }
}

fn two_char_kind(chars: [u8; 2]) -> Option<TokenKind> {
    let s = std::str::from_utf8(&chars).ok()?;
    Some(match s {
        "++" => TokenKind::Incr,
        "--" => TokenKind::Decr,
        "+=" => TokenKind::PlusAssign,
        "-=" => TokenKind::MinusAssign,
        "*=" => TokenKind::StarAssign,
        "/=" => TokenKind::SlashAssign,
        "%=" => TokenKind::PercentAssign,
        "==" => TokenKind::EqEq,
        "!=" => TokenKind::NotEq,
        "<=" => TokenKind::LtEq,
        ">=" => TokenKind::GtEq,
        "&&" => TokenKind::AndAnd,
        "||" => TokenKind::OrOr,
        "->" => TokenKind::Arrow,
        _ => return None,
    })
}

fn one_char_kind(ch: u8) -> Option<TokenKind> {
    Some(match ch {
        b'+' => TokenKind::Plus,
        b'-' => TokenKind::Minus,
        b'*' => TokenKind::Star,
        b'/' => TokenKind::Slash,
        b'%' => TokenKind::Percent,
        b'=' => TokenKind::Assign,
        b'<' => TokenKind::Lt,
        b'>' => TokenKind::Gt,
        b'!' => TokenKind::Bang,
        b'(' => TokenKind::LParen,
        b')' => TokenKind::RParen,
        b'{' => TokenKind::LBrace,
        b'}' => TokenKind::RBrace,
        b'[' => TokenKind::LBracket,
        b']' => TokenKind::RBracket,
        b';' => TokenKind::Semicolon,
        b',' => TokenKind::Comma,
        b'.' => TokenKind::Dot,
        b':' => TokenKind::Colon,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_arithmetic_and_print() {
        let ks = kinds("int x = 1 + 2 * 3; print(x);");
        assert_eq!(
            ks,
            vec![
                TokenKind::TypeInt,
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::IntLiteral(1),
                TokenKind::Plus,
                TokenKind::IntLiteral(2),
                TokenKind::Star,
                TokenKind::IntLiteral(3),
                TokenKind::Semicolon,
                TokenKind::Print,
                TokenKind::LParen,
                TokenKind::Ident("x".into()),
                TokenKind::RParen,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn float_literal_requires_digit_after_dot() {
        let ks = kinds("3.5");
        assert_eq!(ks, vec![TokenKind::FloatLiteral(3.5), TokenKind::Eof]);
    }

    #[test]
    fn legacy_keyword_folds_and_warns() {
        let result = Lexer::new("start print(1); end").tokenize().unwrap();
        assert_eq!(result.tokens[0].kind, TokenKind::BeginMain);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, DiagnosticCode::LegacyKeyword);
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::UnterminatedString);
    }

    #[test]
    fn unknown_char_is_fatal() {
        let err = Lexer::new("@").tokenize().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::UnknownChar);
    }

    #[test]
    fn two_char_operators_win_over_one_char_prefix() {
        let ks = kinds("a += 1");
        assert_eq!(
            ks,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::PlusAssign,
                TokenKind::IntLiteral(1),
                TokenKind::Eof,
            ]
        );
    }
}
