//! Built-in evaluator for selection and weight expressions over event columns.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! or   := and ( "||" and )*
//! and  := cmp ( "&&" cmp )*
//! cmp  := add ( ( "==" | "!=" | "<" | "<=" | ">" | ">=" ) add )*   // chained: a < b < c
//! add  := mul ( ( "+" | "-" ) mul )*
//! mul  := unary ( ( "*" | "/" ) unary )*
//! unary:= ( "-" | "!" ) unary | atom
//! atom := number | ident | ident "(" args ")" | "(" or ")"
//! ```
//!
//! Functions: `abs`/`fabs`, `sqrt`, `log`, `exp`, `pow`, `min`, `max`.
//! Boolean results are `1.0`/`0.0`; a value passes a selection when `> 0`.
//! The empty string compiles to the constant `1` (select everything).

use crate::error::{Result, SelectError};

#[derive(Debug, Clone)]
enum Node {
    Number(f64),
    Column(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Log,
    Exp,
    Pow,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<(Func, usize)> {
        Some(match name {
            "abs" | "fabs" => (Func::Abs, 1),
            "sqrt" => (Func::Sqrt, 1),
            "log" => (Func::Log, 1),
            "exp" => (Func::Exp, 1),
            "pow" => (Func::Pow, 2),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            _ => return None,
        })
    }
}

/// A compiled expression ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    ast: Node,
    /// Column names referenced by this expression (ordered by first occurrence).
    pub columns: Vec<String>,
}

impl CompiledExpr {
    /// Parse and compile an expression string.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Ok(CompiledExpr { ast: Node::Number(1.0), columns: Vec::new() });
        }
        let mut parser = Parser::new(&tokens);
        let ast = parser.parse_or()?;
        if let Some(t) = parser.peek() {
            return Err(SelectError::Expression(format!(
                "unexpected token after expression: {t:?} in '{input}'"
            )));
        }
        Ok(CompiledExpr { ast, columns: parser.columns })
    }

    /// Evaluate for a single row; `values` follows the order of [`CompiledExpr::columns`].
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        eval(&self.ast, values)
    }

    /// Evaluate column-wise over `n_rows` rows.
    ///
    /// `columns` follows the order of [`CompiledExpr::columns`]; each slice must hold
    /// at least `n_rows` values.
    pub fn eval_bulk(&self, columns: &[&[f64]], n_rows: usize) -> Vec<f64> {
        if columns.is_empty() {
            return vec![eval(&self.ast, &[]); n_rows];
        }
        let mut row = vec![0.0f64; columns.len()];
        (0..n_rows)
            .map(|i| {
                for (slot, col) in row.iter_mut().zip(columns) {
                    *slot = col[i];
                }
                eval(&self.ast, &row)
            })
            .collect()
    }
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn eval(node: &Node, vals: &[f64]) -> f64 {
    match node {
        Node::Number(n) => *n,
        Node::Column(i) => vals[*i],
        Node::Neg(a) => -eval(a, vals),
        Node::Not(a) => truth(eval(a, vals) <= 0.0),
        Node::Binary(Op::And, a, b) => truth(eval(a, vals) > 0.0 && eval(b, vals) > 0.0),
        Node::Binary(Op::Or, a, b) => truth(eval(a, vals) > 0.0 || eval(b, vals) > 0.0),
        Node::Binary(op, a, b) => {
            let lhs = eval(a, vals);
            let rhs = eval(b, vals);
            match op {
                Op::Add => lhs + rhs,
                Op::Sub => lhs - rhs,
                Op::Mul => lhs * rhs,
                Op::Div => lhs / rhs,
                Op::Eq => truth((lhs - rhs).abs() < f64::EPSILON),
                Op::Ne => truth((lhs - rhs).abs() >= f64::EPSILON),
                Op::Lt => truth(lhs < rhs),
                Op::Le => truth(lhs <= rhs),
                Op::Gt => truth(lhs > rhs),
                Op::Ge => truth(lhs >= rhs),
                Op::And | Op::Or => unreachable!("short-circuit operators handled above"),
            }
        }
        Node::Call(f, args) => {
            let a0 = eval(&args[0], vals);
            match f {
                Func::Abs => a0.abs(),
                Func::Sqrt => a0.sqrt(),
                Func::Log => a0.ln(),
                Func::Exp => a0.exp(),
                Func::Pow => a0.powf(eval(&args[1], vals)),
                Func::Min => a0.min(eval(&args[1], vals)),
                Func::Max => a0.max(eval(&args[1], vals)),
            }
        }
    }
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let two = match (c, next) {
            ('&', Some('&')) => Some(Token::And),
            ('|', Some('|')) => Some(Token::Or),
            ('=', Some('=')) => Some(Token::Eq),
            ('!', Some('=')) => Some(Token::Ne),
            ('<', Some('=')) => Some(Token::Le),
            ('>', Some('=')) => Some(Token::Ge),
            _ => None,
        };
        if let Some(t) = two {
            tokens.push(t);
            i += 2;
            continue;
        }

        let one = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '!' => Some(Token::Not),
            _ => None,
        };
        if let Some(t) = one {
            tokens.push(t);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() {
                let d = chars[i];
                let exponent_sign =
                    (d == '+' || d == '-') && i > start && matches!(chars[i - 1], 'e' | 'E');
                if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            let s: String = chars[start..i].iter().collect();
            let n: f64 = s
                .parse()
                .map_err(|_| SelectError::Expression(format!("invalid number: '{s}'")))?;
            tokens.push(Token::Num(n));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        return Err(SelectError::Expression(format!("unexpected character: '{c}' in '{input}'")));
    }

    Ok(tokens)
}

// ── Parser (recursive descent) ─────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    columns: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0, columns: Vec::new() }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => {
                Err(SelectError::Expression(format!("expected {expected:?}, got {other:?}")))
            }
        }
    }

    fn resolve_column(&mut self, name: &str) -> usize {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Node::Binary(Op::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = Node::Binary(Op::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn cmp_op(&self) -> Option<Op> {
        match self.peek() {
            Some(Token::Eq) => Some(Op::Eq),
            Some(Token::Ne) => Some(Op::Ne),
            Some(Token::Lt) => Some(Op::Lt),
            Some(Token::Le) => Some(Op::Le),
            Some(Token::Gt) => Some(Op::Gt),
            Some(Token::Ge) => Some(Op::Ge),
            _ => None,
        }
    }

    // `a < b < c` is `a < b && b < c`.
    fn parse_cmp(&mut self) -> Result<Node> {
        let mut lhs = self.parse_add()?;
        let mut chain: Option<Node> = None;
        while let Some(op) = self.cmp_op() {
            self.advance();
            let rhs = self.parse_add()?;
            let link = Node::Binary(op, Box::new(lhs), Box::new(rhs.clone()));
            chain = Some(match chain {
                None => link,
                Some(prev) => Node::Binary(Op::And, Box::new(prev), Box::new(link)),
            });
            lhs = rhs;
        }
        Ok(chain.unwrap_or(lhs))
    }

    fn parse_add(&mut self) -> Result<Node> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Op::Add,
                Some(Token::Minus) => Op::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Node> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Op::Mul,
                Some(Token::Slash) => Op::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(Node::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Not) => {
                self.advance();
                Ok(Node::Not(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Node> {
        match self.advance().cloned() {
            Some(Token::Num(n)) => Ok(Node::Number(n)),
            Some(Token::LParen) => {
                let e = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Ident(name)) if matches!(self.peek(), Some(Token::LParen)) => {
                self.advance();
                let (func, arity) = Func::lookup(&name).ok_or_else(|| {
                    SelectError::Expression(format!("unknown function: '{name}'"))
                })?;
                let mut args = vec![self.parse_or()?];
                while matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                    args.push(self.parse_or()?);
                }
                self.expect(&Token::RParen)?;
                if args.len() != arity {
                    return Err(SelectError::Expression(format!(
                        "function '{name}' takes {arity} argument(s), got {}",
                        args.len()
                    )));
                }
                Ok(Node::Call(func, args))
            }
            Some(Token::Ident(name)) => Ok(Node::Column(self.resolve_column(&name))),
            other => Err(SelectError::Expression(format!(
                "expected number, identifier, or '(', got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_selects_everything() {
        let e = CompiledExpr::compile("   ").unwrap();
        assert!(e.columns.is_empty());
        assert_eq!(e.eval_row(&[]), 1.0);
        assert_eq!(e.eval_bulk(&[], 3), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn arithmetic_precedence() {
        let e = CompiledExpr::compile("2 + 3 * 4").unwrap();
        assert_relative_eq!(e.eval_row(&[]), 14.0);
        let e = CompiledExpr::compile("(1 + 2) * (3 + 4)").unwrap();
        assert_relative_eq!(e.eval_row(&[]), 21.0);
        let e = CompiledExpr::compile("-x + 1").unwrap();
        assert_relative_eq!(e.eval_row(&[5.0]), -4.0);
    }

    #[test]
    fn columns_in_first_occurrence_order() {
        let e = CompiledExpr::compile("numJets <= 3 && jet1_pt > 50000 && numJets > 0").unwrap();
        assert_eq!(e.columns, vec!["numJets", "jet1_pt"]);
        assert_eq!(e.eval_row(&[2.0, 60000.0]), 1.0);
        assert_eq!(e.eval_row(&[4.0, 60000.0]), 0.0);
    }

    #[test]
    fn chained_comparison() {
        let e = CompiledExpr::compile("80 < mass_mmc_tau1_tau2 < 120").unwrap();
        assert_eq!(e.columns, vec!["mass_mmc_tau1_tau2"]);
        assert_eq!(e.eval_row(&[100.0]), 1.0);
        assert_eq!(e.eval_row(&[79.0]), 0.0);
        assert_eq!(e.eval_row(&[125.0]), 0.0);
    }

    #[test]
    fn functions_and_arity() {
        assert_relative_eq!(CompiledExpr::compile("fabs(x)").unwrap().eval_row(&[-1.5]), 1.5);
        assert_relative_eq!(CompiledExpr::compile("pow(x, 2)").unwrap().eval_row(&[3.0]), 9.0);
        assert_relative_eq!(CompiledExpr::compile("max(a, b)").unwrap().eval_row(&[3.0, 7.0]), 7.0);
        let err = CompiledExpr::compile("sqrt(a, b)").unwrap_err();
        assert!(err.to_string().contains("takes 1 argument"));
        assert!(CompiledExpr::compile("eta(x)").is_err());
    }

    #[test]
    fn logical_not_and_ne() {
        let e = CompiledExpr::compile("!(x > 3)").unwrap();
        assert_eq!(e.eval_row(&[2.0]), 1.0);
        assert_eq!(e.eval_row(&[5.0]), 0.0);
        let e = CompiledExpr::compile("q != -1").unwrap();
        assert_eq!(e.eval_row(&[1.0]), 1.0);
        assert_eq!(e.eval_row(&[-1.0]), 0.0);
    }

    #[test]
    fn scientific_notation() {
        let e = CompiledExpr::compile("1.5e2 + 3.0E-1").unwrap();
        assert_relative_eq!(e.eval_row(&[]), 150.3, epsilon = 1e-10);
    }

    #[test]
    fn bulk_eval() {
        let e = CompiledExpr::compile("a * b").unwrap();
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 20.0, 30.0];
        assert_eq!(e.eval_bulk(&[&a, &b], 3), vec![10.0, 40.0, 90.0]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(CompiledExpr::compile("x > ").is_err());
        assert!(CompiledExpr::compile("x $ 2").is_err());
        assert!(CompiledExpr::compile("(x > 1").is_err());
        assert!(CompiledExpr::compile("x 1").is_err());
    }
}
