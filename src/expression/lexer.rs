//! Lexer for formula expressions.
//!
//! Produces the full token set of the host expression syntax, including
//! tokens for constructs the parser will refuse (strings, dots, brackets,
//! keywords). Rejection happens in the parser so the error names the
//! construct instead of reporting an unknown character.

use super::SafeExpressionError;

/// A lexical token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// A token in a formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // ========================================================================
    // Literals
    // ========================================================================
    Number(f64),
    Ident(String),
    /// Quoted string. Always refused by the parser.
    Str(String),

    // ========================================================================
    // Keywords
    // ========================================================================
    If,
    Else,
    And,
    Or,
    Not,
    In,
    Is,
    For,
    Lambda,
    Import,
    From,
    Def,
    Class,
    True,
    False,
    None,

    // ========================================================================
    // Operators
    // ========================================================================
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// `=`
    Assign,
    /// `:=`
    Walrus,
    /// Any of `& | ^ ~ << >>`
    Bitwise(&'static str),
    /// `@`
    At,

    // ========================================================================
    // Punctuation
    // ========================================================================
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Semicolon,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::In => write!(f, "in"),
            Token::Is => write!(f, "is"),
            Token::For => write!(f, "for"),
            Token::Lambda => write!(f, "lambda"),
            Token::Import => write!(f, "import"),
            Token::From => write!(f, "from"),
            Token::Def => write!(f, "def"),
            Token::Class => write!(f, "class"),
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::None => write!(f, "None"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::DoubleStar => write!(f, "**"),
            Token::Slash => write!(f, "/"),
            Token::DoubleSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Lte => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Gte => write!(f, ">="),
            Token::Assign => write!(f, "="),
            Token::Walrus => write!(f, ":="),
            Token::Bitwise(op) => write!(f, "{op}"),
            Token::At => write!(f, "@"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
        }
    }
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word {
        "if" => Token::If,
        "else" => Token::Else,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "is" => Token::Is,
        "for" => Token::For,
        "lambda" => Token::Lambda,
        "import" => Token::Import,
        "from" => Token::From,
        "def" => Token::Def,
        "class" => Token::Class,
        "True" => Token::True,
        "False" => Token::False,
        "None" => Token::None,
        _ => return None,
    })
}

/// Tokenize a formula.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, SafeExpressionError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Numbers: 12, 1.5, .5, 1e3, 2.5E-2, 1_000
        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'.' {
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
                    i += 1;
                }
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = src[start..i].chars().filter(|ch| *ch != '_').collect();
            let value = text.parse::<f64>().map_err(|_| SafeExpressionError::Syntax {
                message: format!("invalid number '{}'", &src[start..i]),
                position: start,
            })?;
            tokens.push(Spanned {
                token: Token::Number(value),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &src[start..i];
            let token = keyword(word).unwrap_or_else(|| Token::Ident(word.to_string()));
            tokens.push(Spanned {
                token,
                offset: start,
            });
            continue;
        }

        if c == b'\'' || c == b'"' {
            let quote = c;
            i += 1;
            while i < bytes.len() && bytes[i] != quote {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= bytes.len() {
                return Err(SafeExpressionError::Syntax {
                    message: "unterminated string".into(),
                    position: start,
                });
            }
            i += 1;
            tokens.push(Spanned {
                token: Token::Str(src[start + 1..i - 1].to_string()),
                offset: start,
            });
            continue;
        }

        let next = bytes.get(i + 1).copied();
        let (token, width) = match (c, next) {
            (b'*', Some(b'*')) => (Token::DoubleStar, 2),
            (b'/', Some(b'/')) => (Token::DoubleSlash, 2),
            (b'=', Some(b'=')) => (Token::EqEq, 2),
            (b'!', Some(b'=')) => (Token::NotEq, 2),
            (b'<', Some(b'=')) => (Token::Lte, 2),
            (b'>', Some(b'=')) => (Token::Gte, 2),
            (b'<', Some(b'<')) => (Token::Bitwise("<<"), 2),
            (b'>', Some(b'>')) => (Token::Bitwise(">>"), 2),
            (b':', Some(b'=')) => (Token::Walrus, 2),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'%', _) => (Token::Percent, 1),
            (b'<', _) => (Token::Lt, 1),
            (b'>', _) => (Token::Gt, 1),
            (b'=', _) => (Token::Assign, 1),
            (b'&', _) => (Token::Bitwise("&"), 1),
            (b'|', _) => (Token::Bitwise("|"), 1),
            (b'^', _) => (Token::Bitwise("^"), 1),
            (b'~', _) => (Token::Bitwise("~"), 1),
            (b'@', _) => (Token::At, 1),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b'[', _) => (Token::LBracket, 1),
            (b']', _) => (Token::RBracket, 1),
            (b'{', _) => (Token::LBrace, 1),
            (b'}', _) => (Token::RBrace, 1),
            (b',', _) => (Token::Comma, 1),
            (b'.', _) => (Token::Dot, 1),
            (b':', _) => (Token::Colon, 1),
            (b';', _) => (Token::Semicolon, 1),
            _ => {
                let ch = src[start..].chars().next().unwrap_or('?');
                return Err(SafeExpressionError::Syntax {
                    message: format!("unexpected character '{ch}'"),
                    position: start,
                });
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
        i += width;
    }

    Ok(tokens)
}
