//! Array expression parser.
//!
//! Grammar:
//!
//! ```text
//! query   := build | NAME
//! build   := "build" "(" "<" NAME ":" type ">" "[" NAME "=" INT ":" INT
//!            ("," INT)? "]" "," expr ")"
//! type    := "double" | "int64"
//! expr    := term (("+" | "-") term)*
//! term    := factor (("*" | "/") factor)*
//! factor  := NUMBER | NAME | "-" factor | "(" expr ")"
//! ```
//!
//! A bare `NAME` refers to a stored array. Inside a build expression the
//! only valid `NAME` is the dimension, which evaluates to its coordinate.

use crate::common::error::QueryError;

/// Attribute value type of a build expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Double,
    Int64,
}

impl AttrType {
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s {
            "double" => Ok(Self::Double),
            "int64" => Ok(Self::Int64),
            other => Err(QueryError::Parse(format!("unknown attribute type {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Int64 => "int64",
        }
    }
}

/// Arithmetic expression over the build dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Dim,
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

/// A parsed `build(...)` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildExpr {
    pub attr_name: String,
    pub attr_type: AttrType,
    pub dim_name: String,
    pub lo: i64,
    pub hi: i64,
    pub chunk: Option<usize>,
    pub expr: Expr,
}

/// A parsed query: either a build expression or a stored array reference.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    Build(BuildExpr),
    Ref(String),
}

/// Parse a query expression string.
pub fn parse_query(input: &str) -> Result<QueryExpr, QueryError> {
    let mut p = Parser::new(input);
    p.skip_ws();
    let q = if p.peek_keyword("build") {
        QueryExpr::Build(p.parse_build()?)
    } else {
        QueryExpr::Ref(p.parse_name()?)
    };
    p.skip_ws();
    if !p.at_end() {
        return Err(p.err("trailing input after expression"));
    }
    Ok(q)
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, msg: &str) -> QueryError {
        QueryError::Parse(format!("{msg} at offset {}", self.pos))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), QueryError> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", c as char)))
        }
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        let rest = &self.src[self.pos..];
        rest.starts_with(kw.as_bytes())
            && !matches!(
                rest.get(kw.len()),
                Some(c) if c.is_ascii_alphanumeric() || *c == b'_'
            )
    }

    fn parse_name(&mut self) -> Result<String, QueryError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.err("expected identifier"));
        }
        let name = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        if name.as_bytes()[0].is_ascii_digit() {
            return Err(self.err("identifier cannot start with a digit"));
        }
        Ok(name.to_string())
    }

    fn parse_int(&mut self) -> Result<i64, QueryError> {
        self.skip_ws();
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        text.parse::<i64>()
            .map_err(|_| self.err("expected integer"))
    }

    fn parse_number(&mut self) -> Result<f64, QueryError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'.') {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        text.parse::<f64>().map_err(|_| self.err("expected number"))
    }

    fn parse_build(&mut self) -> Result<BuildExpr, QueryError> {
        // "build" consumed by caller check, skip it here
        self.pos += "build".len();
        self.expect(b'(')?;

        // attribute spec: <name:type>
        self.expect(b'<')?;
        let attr_name = self.parse_name()?;
        self.expect(b':')?;
        let attr_type = AttrType::parse(&self.parse_name()?)?;
        self.expect(b'>')?;

        // dimension spec: [name=lo:hi] or [name=lo:hi,chunk]
        self.expect(b'[')?;
        let dim_name = self.parse_name()?;
        self.expect(b'=')?;
        let lo = self.parse_int()?;
        self.expect(b':')?;
        let hi = self.parse_int()?;
        if hi < lo {
            return Err(self.err("dimension upper bound below lower bound"));
        }

        self.skip_ws();
        let chunk = if self.peek() == Some(b',') {
            self.pos += 1;
            let c = self.parse_int()?;
            if c <= 0 {
                return Err(self.err("chunk interval must be positive"));
            }
            Some(c as usize)
        } else {
            None
        };
        self.expect(b']')?;

        self.expect(b',')?;
        let expr = self.parse_expr(&dim_name)?;
        self.expect(b')')?;

        Ok(BuildExpr {
            attr_name,
            attr_type,
            dim_name,
            lo,
            hi,
            chunk,
            expr,
        })
    }

    fn parse_expr(&mut self, dim: &str) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_term(dim)?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'+') => {
                    self.bump();
                    let rhs = self.parse_term(dim)?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(b'-') => {
                    self.bump();
                    let rhs = self.parse_term(dim)?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_term(&mut self, dim: &str) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_factor(dim)?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'*') => {
                    self.bump();
                    let rhs = self.parse_factor(dim)?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(b'/') => {
                    self.bump();
                    let rhs = self.parse_factor(dim)?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_factor(&mut self, dim: &str) -> Result<Expr, QueryError> {
        self.skip_ws();
        match self.peek() {
            Some(b'-') => {
                self.bump();
                Ok(Expr::Neg(Box::new(self.parse_factor(dim)?)))
            }
            Some(b'(') => {
                self.bump();
                let e = self.parse_expr(dim)?;
                self.expect(b')')?;
                Ok(e)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => Ok(Expr::Num(self.parse_number()?)),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                let name = self.parse_name()?;
                if name == dim {
                    Ok(Expr::Dim)
                } else {
                    Err(QueryError::Parse(format!("unknown identifier {name}")))
                }
            }
            _ => Err(self.err("expected expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_build() {
        let q = parse_query("build(<x:double>[i=1:5], i)").unwrap();
        let QueryExpr::Build(b) = q else {
            panic!("expected build");
        };
        assert_eq!(b.attr_name, "x");
        assert_eq!(b.attr_type, AttrType::Double);
        assert_eq!(b.dim_name, "i");
        assert_eq!((b.lo, b.hi), (1, 5));
        assert_eq!(b.chunk, None);
        assert_eq!(b.expr, Expr::Dim);
    }

    #[test]
    fn parses_chunk_interval_and_arithmetic() {
        let q = parse_query("build(<v:int64>[k=0:9,4], k * 2 + 1)").unwrap();
        let QueryExpr::Build(b) = q else {
            panic!("expected build");
        };
        assert_eq!(b.chunk, Some(4));
        assert_eq!(
            b.expr,
            Expr::Add(
                Box::new(Expr::Mul(Box::new(Expr::Dim), Box::new(Expr::Num(2.0)))),
                Box::new(Expr::Num(1.0)),
            )
        );
    }

    #[test]
    fn precedence_and_parens() {
        let a = parse_query("build(<x:double>[i=1:2], i + i * 3)").unwrap();
        let b = parse_query("build(<x:double>[i=1:2], i + (i * 3))").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bare_name_is_a_reference() {
        assert_eq!(
            parse_query("  up_0001 ").unwrap(),
            QueryExpr::Ref("up_0001".into())
        );
    }

    #[test]
    fn rejects_unknown_identifier() {
        assert!(parse_query("build(<x:double>[i=1:5], j)").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_query("build(<x:double>[i=5:1], i)").is_err());
        assert!(parse_query("build(<x:float>[i=1:5], i)").is_err());
        assert!(parse_query("build(<x:double>[i=1:5], i) extra").is_err());
        assert!(parse_query("").is_err());
    }
}
