//! Rendering units.
//!
//! Expressions and queries lower to a flat [`TokenStream`]. Only the stream
//! knows about the target dialect: identifiers and string literals are
//! quoted when the stream is rendered, never earlier.

use super::dialect::{Dialect, SqlDialect};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Reserved word or operator, emitted as written.
    Keyword(&'static str),
    /// Punctuation: `(`, `)`, `,`, `.`, `*`.
    Symbol(char),
    /// Identifier, quoted per dialect.
    Ident(String),
    /// String literal, quoted per dialect.
    Str(String),
    Int(i64),
    /// Float literal. Non-finite values render as `NULL`.
    Float(f64),
    Space,
    Newline,
    /// Indentation depth, two spaces per level.
    Indent(u8),
}

impl Token {
    fn render_into(&self, out: &mut String, dialect: Dialect) {
        match self {
            Token::Keyword(word) => out.push_str(word),
            Token::Symbol(c) => out.push(*c),
            Token::Ident(name) => out.push_str(&dialect.quote_identifier(name)),
            Token::Str(text) => out.push_str(&dialect.quote_string(text)),
            Token::Int(n) => out.push_str(&n.to_string()),
            Token::Float(f) if f.is_finite() => out.push_str(ryu::Buffer::new().format_finite(*f)),
            Token::Float(_) => out.push_str("NULL"),
            Token::Space => out.push(' '),
            Token::Newline => out.push('\n'),
            Token::Indent(depth) => {
                for _ in 0..*depth {
                    out.push_str("  ");
                }
            }
        }
    }
}

/// An ordered run of tokens with chainable push helpers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn keyword(&mut self, word: &'static str) -> &mut Self {
        self.push(Token::Keyword(word))
    }

    pub fn symbol(&mut self, c: char) -> &mut Self {
        self.push(Token::Symbol(c))
    }

    pub fn ident(&mut self, name: &str) -> &mut Self {
        self.push(Token::Ident(name.to_string()))
    }

    pub fn string(&mut self, text: &str) -> &mut Self {
        self.push(Token::Str(text.to_string()))
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }

    /// Start a new line indented `depth` levels.
    pub fn line(&mut self, depth: u8) -> &mut Self {
        self.push(Token::Newline);
        if depth > 0 {
            self.push(Token::Indent(depth));
        }
        self
    }

    /// Keyword surrounded by single spaces, e.g. ` AND `.
    pub fn infix(&mut self, word: &'static str) -> &mut Self {
        self.space().keyword(word).space()
    }

    /// `NAME(` ready for arguments.
    pub fn call(&mut self, name: &'static str) -> &mut Self {
        self.keyword(name).symbol('(')
    }

    /// `, ` between list items.
    pub fn separator(&mut self) -> &mut Self {
        self.symbol(',').space()
    }

    pub fn append(&mut self, other: TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn render(&self, dialect: Dialect) -> String {
        let mut out = String::with_capacity(self.tokens.len() * 6);
        for token in &self.tokens {
            token.render_into(&mut out, dialect);
        }
        out
    }
}
