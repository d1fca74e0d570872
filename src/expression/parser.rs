//! Recursive-descent parser producing the allow-listed expression tree.
//!
//! Precedence, lowest first:
//! conditional (`a if c else b`), comparison (chainable),
//! `+ -`, `* / // %`, unary `+ -`, `**` (right associative, binds tighter
//! than a unary minus on its left), calls and atoms.
//!
//! Anything outside that grammar is refused with
//! [`SafeExpressionError::Disallowed`] naming the construct.

use super::lexer::{Spanned, Token};
use super::{SafeExpressionError, ALLOWED_FUNCTIONS, MAX_AST_DEPTH, MAX_NODES};

/// Parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(f64),
    Bool(bool),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// `a < b <= c` keeps every operand so each is evaluated once.
    Compare {
        first: Box<Node>,
        rest: Vec<(CmpOp, Node)>,
    },
    Call {
        func: String,
        args: Vec<Node>,
    },
    IfElse {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    /// List or tuple literal.
    List(Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Node {
    /// Variable names referenced by the tree, in first-seen order.
    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Node::Number(_) | Node::Bool(_) => {}
            Node::Name(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Node::Unary { operand, .. } => operand.collect_names(out),
            Node::Binary { left, right, .. } => {
                left.collect_names(out);
                right.collect_names(out);
            }
            Node::Compare { first, rest } => {
                first.collect_names(out);
                for (_, node) in rest {
                    node.collect_names(out);
                }
            }
            Node::Call { args, .. } | Node::List(args) => {
                for arg in args {
                    arg.collect_names(out);
                }
            }
            Node::IfElse {
                cond,
                then,
                otherwise,
            } => {
                then.collect_names(out);
                cond.collect_names(out);
                otherwise.collect_names(out);
            }
        }
    }
}

/// Parse a token stream into a [`Node`].
pub fn parse(tokens: &[Spanned], source_len: usize) -> Result<Node, SafeExpressionError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        nodes: 0,
        source_len,
    };
    if tokens.is_empty() {
        return Err(SafeExpressionError::Syntax {
            message: "empty expression".into(),
            position: 0,
        });
    }
    let node = parser.expression()?;
    if let Some(tok) = parser.peek() {
        return Err(parser.unexpected(tok.clone(), parser.offset()));
    }
    Ok(node)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
    nodes: usize,
    source_len: usize,
}

impl<'a> Parser<'a> {
    // ========================================================================
    // Cursor
    // ========================================================================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source_len, |s| s.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|s| s.token.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), SafeExpressionError> {
        if self.eat(&expected) {
            return Ok(());
        }
        let position = self.offset();
        match self.peek().cloned() {
            Some(tok) => Err(self.unexpected(tok, position)),
            None => Err(SafeExpressionError::Syntax {
                message: format!("expected '{expected}' but expression ended"),
                position,
            }),
        }
    }

    // ========================================================================
    // Limits
    // ========================================================================

    fn enter(&mut self) -> Result<(), SafeExpressionError> {
        self.depth += 1;
        if self.depth > MAX_AST_DEPTH {
            return Err(SafeExpressionError::DepthExceeded(MAX_AST_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn node(&mut self, node: Node) -> Result<Node, SafeExpressionError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(SafeExpressionError::TooManyNodes(MAX_NODES));
        }
        Ok(node)
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Map a token that cannot appear here to the most specific error.
    fn unexpected(&self, tok: Token, position: usize) -> SafeExpressionError {
        let construct = match tok {
            Token::Str(_) => "string constant",
            Token::And | Token::Or | Token::Not => "boolean operator",
            Token::Dot => "attribute access",
            Token::LBracket => "subscript",
            Token::Lambda => "lambda",
            Token::Import | Token::From => "import",
            Token::Def | Token::Class => "function or class definition",
            Token::For => "comprehension",
            Token::In | Token::Is => "membership or identity test",
            Token::Assign | Token::Walrus => "assignment",
            Token::Bitwise(_) => "bitwise operator",
            Token::At => "matrix multiplication or decorator",
            Token::LBrace | Token::RBrace => "dict or set literal",
            Token::None => "None constant",
            Token::Semicolon => "multiple statements",
            other => {
                return SafeExpressionError::Syntax {
                    message: format!("unexpected '{other}'"),
                    position,
                }
            }
        };
        SafeExpressionError::Disallowed(construct.into())
    }

    // ========================================================================
    // Grammar
    // ========================================================================

    /// expression := comparison ['if' comparison 'else' expression]
    fn expression(&mut self) -> Result<Node, SafeExpressionError> {
        self.enter()?;
        let then = self.comparison()?;
        let node = if self.eat(&Token::If) {
            let cond = self.comparison()?;
            self.expect(Token::Else)?;
            let otherwise = self.expression()?;
            self.node(Node::IfElse {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            })?
        } else {
            then
        };
        self.leave();
        Ok(node)
    }

    /// comparison := additive (cmp_op additive)*
    fn comparison(&mut self) -> Result<Node, SafeExpressionError> {
        let first = self.additive()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => CmpOp::Eq,
                Some(Token::NotEq) => CmpOp::Ne,
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::Lte) => CmpOp::Lte,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::Gte) => CmpOp::Gte,
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            self.node(Node::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    /// additive := term (('+' | '-') term)*
    fn additive(&mut self) -> Result<Node, SafeExpressionError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = self.node(Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }
        Ok(left)
    }

    /// term := unary (('*' | '/' | '//' | '%') unary)*
    fn term(&mut self) -> Result<Node, SafeExpressionError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::DoubleSlash) => BinOp::FloorDiv,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = self.node(Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }
        Ok(left)
    }

    /// unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Result<Node, SafeExpressionError> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Not) => return Err(SafeExpressionError::Disallowed("boolean operator".into())),
            Some(Token::Bitwise("~")) => {
                return Err(SafeExpressionError::Disallowed("bitwise operator".into()))
            }
            _ => return self.power(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.unary()?;
        self.leave();
        self.node(Node::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// power := primary ['**' unary]
    fn power(&mut self) -> Result<Node, SafeExpressionError> {
        let base = self.primary()?;
        if self.eat(&Token::DoubleStar) {
            self.enter()?;
            let exponent = self.unary()?;
            self.leave();
            return self.node(Node::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    /// primary := atom trailer*, where the only accepted trailer is a call
    /// on a whitelisted name.
    fn primary(&mut self) -> Result<Node, SafeExpressionError> {
        let atom = self.atom()?;
        match self.peek() {
            Some(Token::LParen) => match atom {
                Node::Name(func) => self.call(func),
                _ => Err(SafeExpressionError::Disallowed("indirect call".into())),
            },
            Some(Token::Dot) => Err(SafeExpressionError::Disallowed("attribute access".into())),
            Some(Token::LBracket) => Err(SafeExpressionError::Disallowed("subscript".into())),
            _ => Ok(atom),
        }
    }

    fn call(&mut self, func: String) -> Result<Node, SafeExpressionError> {
        if !ALLOWED_FUNCTIONS.contains(&func.as_str()) {
            return Err(SafeExpressionError::Disallowed(format!(
                "call to non-whitelisted function '{func}'"
            )));
        }
        self.expect(Token::LParen)?;
        self.enter()?;
        let mut args = Vec::new();
        while self.peek() != Some(&Token::RParen) {
            match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(_)), Some(Token::Assign)) => {
                    return Err(SafeExpressionError::Disallowed("keyword argument".into()))
                }
                (Some(Token::Star), _) | (Some(Token::DoubleStar), _) => {
                    return Err(SafeExpressionError::Disallowed("argument unpacking".into()))
                }
                _ => {}
            }
            args.push(self.expression()?);
            if self.peek() == Some(&Token::For) {
                return Err(SafeExpressionError::Disallowed("comprehension".into()));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        self.leave();
        self.node(Node::Call { func, args })
    }

    /// atom := number | name | True | False | '(' ... ')' | '[' ... ']'
    fn atom(&mut self) -> Result<Node, SafeExpressionError> {
        let position = self.offset();
        let Some(tok) = self.advance() else {
            return Err(SafeExpressionError::Syntax {
                message: "unexpected end of expression".into(),
                position,
            });
        };
        match tok {
            Token::Number(n) => self.node(Node::Number(n)),
            Token::True => self.node(Node::Bool(true)),
            Token::False => self.node(Node::Bool(false)),
            Token::Ident(name) => {
                if name.starts_with("__") {
                    return Err(SafeExpressionError::Disallowed(format!(
                        "dunder name '{name}'"
                    )));
                }
                self.node(Node::Name(name))
            }
            Token::LParen => self.group(),
            Token::LBracket => self.list(),
            other => Err(self.unexpected(other, position)),
        }
    }

    /// Parenthesized expression or tuple. The opening paren is consumed.
    fn group(&mut self) -> Result<Node, SafeExpressionError> {
        self.enter()?;
        if self.eat(&Token::RParen) {
            self.leave();
            return self.node(Node::List(Vec::new()));
        }
        let first = self.expression()?;
        if self.peek() == Some(&Token::For) {
            return Err(SafeExpressionError::Disallowed("comprehension".into()));
        }
        let node = if self.eat(&Token::Comma) {
            let mut items = vec![first];
            while self.peek() != Some(&Token::RParen) {
                items.push(self.expression()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.node(Node::List(items))?
        } else {
            first
        };
        self.expect(Token::RParen)?;
        self.leave();
        Ok(node)
    }

    /// List literal. The opening bracket is consumed.
    fn list(&mut self) -> Result<Node, SafeExpressionError> {
        self.enter()?;
        let mut items = Vec::new();
        while self.peek() != Some(&Token::RBracket) {
            items.push(self.expression()?);
            if self.peek() == Some(&Token::For) {
                return Err(SafeExpressionError::Disallowed("comprehension".into()));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBracket)?;
        self.leave();
        self.node(Node::List(items))
    }
}
