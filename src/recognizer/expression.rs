use crate::error::CaptchaError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
}

impl Operator {
    pub fn from_token(token: char) -> Result<Self, CaptchaError> {
        match token {
            '+' => Ok(Self::Add),
            '-' => Ok(Self::Subtract),
            '*' | 'x' | '×' => Ok(Self::Multiply),
            other => Err(CaptchaError::Expression(format!("unknown operator '{}'", other))),
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
        }
    }
}

/// A recognized `left op right` statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expression {
    pub left: u32,
    pub operator: Operator,
    pub right: u32,
}

impl Expression {
    pub fn from_tokens(left: char, operator: char, right: char) -> Result<Self, CaptchaError> {
        Ok(Self {
            left: digit(left)?,
            operator: Operator::from_token(operator)?,
            right: digit(right)?,
        })
    }

    pub fn evaluate(&self) -> Result<i64, CaptchaError> {
        let (l, r) = (i64::from(self.left), i64::from(self.right));
        let value = match self.operator {
            Operator::Add => l.checked_add(r),
            Operator::Subtract => l.checked_sub(r),
            Operator::Multiply => l.checked_mul(r),
        };
        value.ok_or_else(|| CaptchaError::Expression(format!("overflow evaluating {}", self)))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.left, self.operator.symbol(), self.right)
    }
}

fn digit(token: char) -> Result<u32, CaptchaError> {
    token
        .to_digit(10)
        .ok_or_else(|| CaptchaError::Expression(format!("'{}' is not a digit", token)))
}
