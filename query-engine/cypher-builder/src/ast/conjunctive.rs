use crate::ast::Predicate;

/// `AND`, `OR` and `NOT` conjunctive implementations.
pub trait Conjunctive {
    /// Builds an `AND` condition having `self` as the left leaf and `other` as the right.
    fn and(self, other: Predicate) -> Predicate;

    /// Builds an `OR` condition having `self` as the left leaf and `other` as the right.
    fn or(self, other: Predicate) -> Predicate;

    /// Builds a `NOT` condition having `self` as the condition.
    fn not(self) -> Predicate;
}

impl Conjunctive for Predicate {
    fn and(self, other: Predicate) -> Predicate {
        Predicate::all([self, other])
    }

    fn or(self, other: Predicate) -> Predicate {
        Predicate::any([self, other])
    }

    fn not(self) -> Predicate {
        self.negate()
    }
}
