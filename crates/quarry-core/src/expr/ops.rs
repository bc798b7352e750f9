use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum CompareOp {
    #[display("=")]
    Eq,
    #[display("<>")]
    Ne,
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
}

impl CompareOp {
    /// Logical complement: `NOT (a op b)` ⇔ `a op.negate() b`.
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Ge => Self::Lt,
            Self::Gt => Self::Le,
            Self::Le => Self::Gt,
        }
    }

    /// Evaluate the comparison given an ordering of left against right.
    #[must_use]
    pub const fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match self {
            Self::Eq => matches!(ordering, Equal),
            Self::Ne => !matches!(ordering, Equal),
            Self::Lt => matches!(ordering, Less),
            Self::Le => !matches!(ordering, Greater),
            Self::Gt => matches!(ordering, Greater),
            Self::Ge => !matches!(ordering, Less),
        }
    }
}

///
/// ArithOp
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum ArithOp {
    #[display("+")]
    Add,
    #[display("-")]
    Sub,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("%")]
    Rem,
}

///
/// BinaryOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BinaryOp {
    Arith(ArithOp),
    Compare(CompareOp),
    And,
    Or,
    Concat,
    Like,
}

impl BinaryOp {
    #[must_use]
    pub const fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    #[must_use]
    pub const fn is_predicate(self) -> bool {
        matches!(self, Self::Compare(_) | Self::And | Self::Or | Self::Like)
    }
}

impl From<CompareOp> for BinaryOp {
    fn from(op: CompareOp) -> Self {
        Self::Compare(op)
    }
}

impl From<ArithOp> for BinaryOp {
    fn from(op: ArithOp) -> Self {
        Self::Arith(op)
    }
}

///
/// UnaryOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
}

///
/// ScalarFn
/// Method-like scalar operations with a direct query-language equivalent.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ScalarFn {
    #[display("ABS")]
    Abs,
    #[display("SQRT")]
    Sqrt,
    #[display("LOWER")]
    Lower,
    #[display("UPPER")]
    Upper,
    #[display("TRIM")]
    Trim,
    #[display("LENGTH")]
    Length,
}

///
/// AggregateFn
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum AggregateFn {
    #[display("COUNT")]
    Count,
    #[display("SUM")]
    Sum,
    #[display("MIN")]
    Min,
    #[display("MAX")]
    Max,
    #[display("AVG")]
    Avg,
}
