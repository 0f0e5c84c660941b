// Lexer for gatelink object files (`*.gnl`).
//
// One declaration per line; newlines are significant. Uses the `logos`
// crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Object file tokens.
///
/// Names carry no value; use the span to retrieve the text. Kind and role
/// words are plain names and are classified by the loader.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|//[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("module")]
    Module,
    #[token("fn")]
    Fn,

    // ── Symbols ──
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("~")]
    Tilde,
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token("@")]
    At,
    #[token("<")]
    Lt,
    #[token("=")]
    Equals,
    #[token("#")]
    Hash,

    // ── Literals ──
    /// Integer literal, optionally negative.
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse().ok())]
    Number(i64),

    /// Node, module, kind or role name. Dots are allowed for bit
    /// addresses such as `IX0.7`.
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*")]
    Name,

    // ── Structure ──
    /// One or more newlines (declaration terminator).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Module => write!(f, "module"),
            Token::Fn => write!(f, "fn"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Tilde => write!(f, "~"),
            Token::Arrow => write!(f, "->"),
            Token::FatArrow => write!(f, "=>"),
            Token::At => write!(f, "@"),
            Token::Lt => write!(f, "<"),
            Token::Equals => write!(f, "="),
            Token::Hash => write!(f, "#"),
            Token::Number(v) => write!(f, "{v}"),
            Token::Name => write!(f, "<name>"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Public API ──

/// Lex an object file into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
