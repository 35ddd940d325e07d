use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::format::{format_duration, format_time, quote_string, serde_nanos};
use super::token::Token;

/// An expression that can be evaluated to a value.
///
/// Every sub-expression is owned by its parent, so cloning an `Expr` always
/// yields an independent tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Binary(BinaryExpr),
    Paren(Box<Expr>),
    Call(Call),
    VarRef(VarRef),
    Boolean(bool),
    Number(f64),
    String(String),
    Time(DateTime<Utc>),
    Duration(#[serde(with = "serde_nanos")] Duration),
    /// Matches all fields.
    Wildcard,
    /// The tag-key pseudo-column.
    TagKeyIdent,
    /// A value known to be absent. Only produced by reduction; the language
    /// itself has no way to spell it.
    #[serde(skip)]
    Nil,
}

/// An operation between two expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub op: Token,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
}

/// A function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
}

/// A reference to a variable, such as a field or tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarRef {
    pub name: String,
}

impl VarRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Expr {
    pub fn binary(op: Token, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(BinaryExpr {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn paren(inner: Expr) -> Self {
        Expr::Paren(Box::new(inner))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(Call {
            name: name.into(),
            args,
        })
    }

    pub fn var_ref(name: impl Into<String>) -> Self {
        Expr::VarRef(VarRef::new(name))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::String(value.into())
    }

    /// True for the literal kinds that reduction can compute with.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Boolean(_)
                | Expr::Number(_)
                | Expr::String(_)
                | Expr::Time(_)
                | Expr::Duration(_)
                | Expr::Nil
        )
    }

    pub fn is_true_literal(&self) -> bool {
        matches!(self, Expr::Boolean(true))
    }

    pub fn is_false_literal(&self) -> bool {
        matches!(self, Expr::Boolean(false))
    }
}

impl From<VarRef> for Expr {
    fn from(var_ref: VarRef) -> Self {
        Expr::VarRef(var_ref)
    }
}

impl From<BinaryExpr> for Expr {
    fn from(expr: BinaryExpr) -> Self {
        Expr::Binary(expr)
    }
}

impl From<Call> for Expr {
    fn from(call: Call) -> Self {
        Expr::Call(call)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary(expr) => write!(f, "{}", expr),
            Expr::Paren(inner) => write!(f, "({})", inner),
            Expr::Call(call) => write!(f, "{}", call),
            Expr::VarRef(var_ref) => write!(f, "{}", var_ref),
            Expr::Boolean(v) => write!(f, "{}", v),
            Expr::Number(v) => write!(f, "{:.3}", v),
            Expr::String(v) => f.write_str(&quote_string(v)),
            Expr::Time(v) => write!(f, "\"{}\"", format_time(v)),
            Expr::Duration(v) => f.write_str(&format_duration(v)),
            Expr::Wildcard => f.write_str("*"),
            Expr::TagKeyIdent => f.write_str("TAG KEY"),
            Expr::Nil => f.write_str("nil"),
        }
    }
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Expr::Number(2.0).to_string(), "2.000");
        assert_eq!(Expr::Number(0.12345).to_string(), "0.123");
        assert_eq!(Expr::Boolean(false).to_string(), "false");
        assert_eq!(Expr::string("us-west").to_string(), "'us-west'");
        assert_eq!(Expr::Duration(Duration::minutes(10)).to_string(), "10m");
        assert_eq!(
            Expr::Time(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()).to_string(),
            "\"2000-01-01 00:00:00\""
        );
        assert_eq!(Expr::Wildcard.to_string(), "*");
        assert_eq!(Expr::TagKeyIdent.to_string(), "TAG KEY");
        assert_eq!(Expr::Nil.to_string(), "nil");
    }

    #[test]
    fn test_compound_rendering() {
        let expr = Expr::binary(
            Token::And,
            Expr::paren(Expr::binary(
                Token::Eq,
                Expr::var_ref("host"),
                Expr::string("server01"),
            )),
            Expr::binary(
                Token::Gt,
                Expr::call("mean", vec![Expr::var_ref("value")]),
                Expr::Number(10.0),
            ),
        );
        assert_eq!(
            expr.to_string(),
            "(host = 'server01') AND mean(value) > 10.000"
        );
        assert_eq!(Expr::call("now", vec![]).to_string(), "now()");
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Expr::binary(Token::Add, Expr::var_ref("a"), Expr::Number(1.0));
        let mut copy = original.clone();
        assert_eq!(copy, original);

        if let Expr::Binary(binary) = &mut copy {
            *binary.rhs = Expr::Number(2.0);
        }
        assert_ne!(copy, original);
        assert_eq!(original.to_string(), "a + 1.000");
        assert_eq!(copy.to_string(), "a + 2.000");
    }

    #[test]
    fn test_nil_is_not_serializable() {
        assert!(serde_json::to_string(&Expr::Nil).is_err());
        assert!(serde_json::to_string(&Expr::Number(1.0)).is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let expr = Expr::binary(
            Token::Lt,
            Expr::var_ref("time"),
            Expr::Duration(Duration::seconds(30)),
        );
        let json = serde_json::to_string(&expr).unwrap();
        let decoded: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, expr);
    }
}
