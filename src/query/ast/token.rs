use std::fmt;

use serde::{Deserialize, Serialize};

/// Operators that can join the two sides of a binary expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    // Arithmetic
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /

    // Logical
    And,
    Or,

    // Comparison
    Eq,  // =
    Neq, // !=
    Lt,  // <
    Lte, // <=
    Gt,  // >
    Gte, // >=
}

impl Token {
    pub fn is_logical(&self) -> bool {
        matches!(self, Token::And | Token::Or)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Token::Eq | Token::Neq | Token::Lt | Token::Lte | Token::Gt | Token::Gte
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Token::Add | Token::Sub | Token::Mul | Token::Div)
    }

    /// Returns the operator to use when the operands are swapped,
    /// e.g. `a < b` is the same as `b > a`.
    pub fn mirror(self) -> Token {
        match self {
            Token::Lt => Token::Gt,
            Token::Lte => Token::Gte,
            Token::Gt => Token::Lt,
            Token::Gte => Token::Lte,
            other => other,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Add => "+",
            Token::Sub => "-",
            Token::Mul => "*",
            Token::Div => "/",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Eq => "=",
            Token::Neq => "!=",
            Token::Lt => "<",
            Token::Lte => "<=",
            Token::Gt => ">",
            Token::Gte => ">=",
        };
        f.write_str(s)
    }
}
