// eval/compiled.rs - Equation text → compiled expression tree
//
// Equations are tokenized and parsed once into a small `Expr` tree which can
// then be evaluated for any value of `x` without touching the source text.
// The grammar is exactly what `equation::check_syntax` admits: integer
// literals, the variable `x`, `+ - * /`, `^` (or `**`) for powers,
// parentheses and unary minus. Nothing else is ever interpreted.
//
//   expr    := term (('+' | '-') term)*
//   term    := unary (('*' | '/') unary)*
//   unary   := '-' unary | power
//   power   := primary ('^' unary)?        right-associative
//   primary := NUMBER | 'x' | '(' expr ')'
//
// Both the tree and the parser recursion are capped at `MAX_DEPTH`.

use crate::error::EquationError;
use crate::eval::equation::check_syntax;
use smallvec::SmallVec;

// ── Tokens ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    X,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::X => "x".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Caret => "^".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Spanned {
    token: Token,
    position: usize,
}

/// Most equations are a handful of tokens; keep them on the stack.
type TokenBuf = SmallVec<[Spanned; 16]>;

/// Split an already-validated equation into tokens. Positions are character
/// offsets, matching those reported by `check_syntax`.
fn tokenize(src: &str) -> Result<TokenBuf, EquationError> {
    let chars: SmallVec<[char; 32]> = src.chars().collect();
    let mut tokens = TokenBuf::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value: f64 = literal
                    .parse()
                    .ok()
                    .filter(|v: &f64| v.is_finite())
                    .ok_or(EquationError::InvalidNumber { literal })?;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    position: start,
                });
                continue;
            }
            'x' => Token::X,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.get(i + 1) == Some(&'*') => {
                // `**` is the same power operator as `^`
                tokens.push(Spanned {
                    token: Token::Caret,
                    position: i,
                });
                i += 2;
                continue;
            }
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => {
                return Err(EquationError::UnexpectedToken {
                    found: other.to_string(),
                    position: i,
                })
            }
        };
        tokens.push(Spanned { token, position: i });
        i += 1;
    }

    Ok(tokens)
}

// ── Expression tree ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// The chain input `x`.
    Var,
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Raw IEEE evaluation. May return infinities or NaN; callers that need
    /// a usable value go through `CompiledEquation::evaluate`.
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Var => x,
            Expr::Neg(inner) => -inner.eval(x),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(x);
                let b = rhs.eval(x);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                }
            }
        }
    }
}

// ── Parser ──────────────────────────────────────────────────────────

/// Deepest expression tree, and deepest parser recursion, a compiled
/// equation may have. Bounds the stack used by parsing, evaluation and drop.
pub const MAX_DEPTH: usize = 256;

/// A parsed subtree together with its depth.
type Parsed = (Expr, usize);

fn nest(expr: Expr, depth: usize) -> Result<Parsed, EquationError> {
    if depth > MAX_DEPTH {
        return Err(EquationError::TooDeep { limit: MAX_DEPTH });
    }
    Ok((expr, depth))
}

fn join(op: BinaryOp, (lhs, l): Parsed, (rhs, r): Parsed) -> Result<Parsed, EquationError> {
    nest(Expr::binary(op, lhs, rhs), l.max(r) + 1)
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    /// Active `unary` frames. Every recursive path of the grammar passes
    /// through `unary`, so this bounds the call stack.
    nesting: usize,
}

impl<'t> Parser<'t> {
    #[inline]
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|s| s.token)
    }

    fn next(&mut self) -> Result<Spanned, EquationError> {
        let spanned = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or(EquationError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(spanned)
    }

    fn expr(&mut self) -> Result<Parsed, EquationError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = join(op, lhs, rhs)?;
        }
    }

    fn term(&mut self) -> Result<Parsed, EquationError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = join(op, lhs, rhs)?;
        }
    }

    fn unary(&mut self) -> Result<Parsed, EquationError> {
        self.nesting += 1;
        if self.nesting > MAX_DEPTH {
            return Err(EquationError::TooDeep { limit: MAX_DEPTH });
        }
        let parsed = if self.peek() == Some(Token::Minus) {
            self.pos += 1;
            let (inner, depth) = self.unary()?;
            nest(Expr::Neg(Box::new(inner)), depth + 1)?
        } else {
            self.power()?
        };
        self.nesting -= 1;
        Ok(parsed)
    }

    fn power(&mut self) -> Result<Parsed, EquationError> {
        let base = self.primary()?;
        if self.peek() == Some(Token::Caret) {
            self.pos += 1;
            // Exponent goes back through `unary` so `2^-1` and `2^3^2` parse.
            let exponent = self.unary()?;
            return join(BinaryOp::Pow, base, exponent);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Parsed, EquationError> {
        let Spanned { token, position } = self.next()?;
        match token {
            Token::Number(n) => Ok((Expr::Number(n), 1)),
            Token::X => Ok((Expr::Var, 1)),
            Token::LParen => {
                let inner = self.expr()?;
                match self.next()? {
                    Spanned {
                        token: Token::RParen,
                        ..
                    } => Ok(inner),
                    other => Err(EquationError::UnexpectedToken {
                        found: other.token.describe(),
                        position: other.position,
                    }),
                }
            }
            other => Err(EquationError::UnexpectedToken {
                found: other.describe(),
                position,
            }),
        }
    }
}

// ── Compiled equation ───────────────────────────────────────────────

/// A parsed equation, ready to be evaluated for any `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEquation {
    expr: Expr,
}

impl CompiledEquation {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate for `x`. Non-finite results are reported as failures.
    pub fn evaluate(&self, x: f64) -> Result<f64, EquationError> {
        let value = self.expr.eval(x);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EquationError::NonFinite { value })
        }
    }
}

/// Validate and parse an equation. A blank equation compiles to `x`, so the
/// node passes its input through unchanged.
pub fn compile(equation: &str) -> Result<CompiledEquation, EquationError> {
    check_syntax(equation)?;

    let tokens = tokenize(equation)?;
    if tokens.is_empty() {
        return Ok(CompiledEquation { expr: Expr::Var });
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        nesting: 0,
    };
    let (expr, _) = parser.expr()?;

    if let Some(extra) = tokens.get(parser.pos) {
        return Err(EquationError::TrailingInput {
            position: extra.position,
        });
    }

    Ok(CompiledEquation { expr })
}
