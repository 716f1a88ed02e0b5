use crate::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEquals => "<=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEquals => ">=",
            CompareOp::In => "IN",
            CompareOp::Contains => "CONTAINS",
            CompareOp::StartsWith => "STARTS WITH",
            CompareOp::EndsWith => "ENDS WITH",
            CompareOp::Matches => "=~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    Any,
    None,
    Single,
}

impl Quantifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Quantifier::All => "all",
            Quantifier::Any => "any",
            Quantifier::None => "none",
            Quantifier::Single => "single",
        }
    }
}

/// Tree structures and leaves for condition building.
#[derive(Debug, Clone)]
pub enum Predicate {
    Compare {
        lhs: Expr,
        op: CompareOp,
        rhs: Expr,
    },
    IsNull(Expr),
    IsNotNull(Expr),
    /// `exists((a)-[:R]->(b))`
    Exists(Pattern),
    /// `all(x IN list WHERE cond)`
    Quantified {
        quantifier: Quantifier,
        variable: Variable,
        list: Expr,
        condition: Box<Predicate>,
    },
    /// `(a AND b)`, a single entry renders as itself and an empty list as `true`.
    And(Vec<Predicate>),
    /// `(a OR b)`, a single entry renders as itself and an empty list as `false`.
    Or(Vec<Predicate>),
    /// `NOT (a)`
    Not(Box<Predicate>),
    /// A boolean valued expression.
    Expr(Expr),
    Literal(bool),
}

impl Predicate {
    pub fn compare(lhs: impl Into<Expr>, op: CompareOp, rhs: impl Into<Expr>) -> Self {
        Predicate::Compare {
            lhs: lhs.into(),
            op,
            rhs: rhs.into(),
        }
    }

    pub fn quantified(quantifier: Quantifier, variable: Variable, list: impl Into<Expr>, condition: Predicate) -> Self {
        Predicate::Quantified {
            quantifier,
            variable,
            list: list.into(),
            condition: Box::new(condition),
        }
    }

    /// Joins the predicates with AND, skipping the `true` placeholders.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let mut predicates: Vec<_> = predicates
            .into_iter()
            .filter(|p| !matches!(p, Predicate::Literal(true)))
            .collect();

        match predicates.len() {
            0 => Predicate::Literal(true),
            1 => predicates.remove(0),
            _ => Predicate::And(predicates),
        }
    }

    /// Joins the predicates with OR.
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let mut predicates: Vec<_> = predicates.into_iter().collect();

        match predicates.len() {
            0 => Predicate::Literal(false),
            1 => predicates.remove(0),
            _ => Predicate::Or(predicates),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Predicate::Not(inner) => *inner,
            Predicate::Literal(b) => Predicate::Literal(!b),
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// A predicate that is always true and adds nothing to a conjunction.
    pub fn is_trivial(&self) -> bool {
        matches!(self, Predicate::Literal(true))
    }
}

/// Comparison builders for anything convertible into an [`Expr`].
pub trait Comparable: Into<Expr> {
    fn equals(self, rhs: impl Into<Expr>) -> Predicate {
        Predicate::compare(self, CompareOp::Equals, rhs)
    }

    fn not_equals(self, rhs: impl Into<Expr>) -> Predicate {
        Predicate::compare(self, CompareOp::NotEquals, rhs)
    }

    fn less_than(self, rhs: impl Into<Expr>) -> Predicate {
        Predicate::compare(self, CompareOp::LessThan, rhs)
    }

    fn less_than_or_equals(self, rhs: impl Into<Expr>) -> Predicate {
        Predicate::compare(self, CompareOp::LessThanOrEquals, rhs)
    }

    fn greater_than(self, rhs: impl Into<Expr>) -> Predicate {
        Predicate::compare(self, CompareOp::GreaterThan, rhs)
    }

    fn greater_than_or_equals(self, rhs: impl Into<Expr>) -> Predicate {
        Predicate::compare(self, CompareOp::GreaterThanOrEquals, rhs)
    }

    fn is_null(self) -> Predicate {
        Predicate::IsNull(self.into())
    }

    fn is_not_null(self) -> Predicate {
        Predicate::IsNotNull(self.into())
    }
}

impl<T> Comparable for T where T: Into<Expr> {}
