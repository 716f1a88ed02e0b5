use std::borrow::Cow;

use crate::ast::*;

/// `MATCH` or `OPTIONAL MATCH` with its `WHERE`.
#[derive(Debug, Clone)]
pub struct Match {
    pub pattern: Pattern,
    pub optional: bool,
    pub filter: Option<Predicate>,
}

impl Match {
    pub fn new(pattern: Pattern) -> Self {
        Match {
            pattern,
            optional: false,
            filter: None,
        }
    }

    pub fn optional(pattern: Pattern) -> Self {
        Match {
            optional: true,
            ..Match::new(pattern)
        }
    }

    /// Adds a condition, conjoined with the ones already present.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = conjoin(self.filter.take(), predicate);
        self
    }
}

impl From<Match> for Clause {
    fn from(m: Match) -> Self {
        Clause::Match(m)
    }
}

pub(crate) fn conjoin(existing: Option<Predicate>, predicate: Predicate) -> Option<Predicate> {
    match (existing, predicate) {
        (existing, p) if p.is_trivial() => existing,
        (None, p) => Some(p),
        (Some(e), p) => Some(Predicate::all([e, p])),
    }
}

/// A column of `WITH` or `RETURN`.
#[derive(Debug, Clone)]
pub enum ProjectionItem {
    Star,
    Expr { expr: Expr, alias: Option<Variable> },
}

impl ProjectionItem {
    pub fn expr(expr: impl Into<Expr>) -> Self {
        ProjectionItem::Expr {
            expr: expr.into(),
            alias: None,
        }
    }

    pub fn aliased(expr: impl Into<Expr>, alias: impl Into<Variable>) -> Self {
        ProjectionItem::Expr {
            expr: expr.into(),
            alias: Some(alias.into()),
        }
    }
}

impl From<Variable> for ProjectionItem {
    fn from(v: Variable) -> Self {
        ProjectionItem::expr(v)
    }
}

impl From<&Variable> for ProjectionItem {
    fn from(v: &Variable) -> Self {
        ProjectionItem::expr(v)
    }
}

/// The body shared by `WITH` and `RETURN`.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub items: Vec<ProjectionItem>,
    pub distinct: bool,
    pub ordering: Ordering,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
    /// Only rendered after `WITH`.
    pub filter: Option<Predicate>,
}

impl Projection {
    pub fn new(items: impl IntoIterator<Item = ProjectionItem>) -> Self {
        Projection {
            items: items.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn star() -> Self {
        Projection::new([ProjectionItem::Star])
    }

    pub fn variables<'a>(variables: impl IntoIterator<Item = &'a Variable>) -> Self {
        Projection::new(variables.into_iter().map(ProjectionItem::from))
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, definition: OrderDefinition) -> Self {
        self.ordering = self.ordering.append(definition);
        self
    }

    pub fn skip(mut self, skip: impl Into<Expr>) -> Self {
        self.skip = Some(skip.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Expr>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = conjoin(self.filter.take(), predicate);
        self
    }

    pub fn is_paginated(&self) -> bool {
        !self.ordering.is_empty() || self.skip.is_some() || self.limit.is_some()
    }

    pub fn into_with(self) -> Clause {
        Clause::With(self)
    }

    pub fn into_return(self) -> Clause {
        Clause::Return(self)
    }
}

/// Variables imported into a `CALL { }` subquery.
#[derive(Debug, Clone)]
pub enum CallImports {
    None,
    Star,
    Variables(Vec<Variable>),
}

#[derive(Debug, Clone)]
pub enum Clause {
    Match(Match),
    With(Projection),
    Unwind {
        list: Expr,
        alias: Variable,
    },
    /// `CALL { WITH ... body }`
    Call {
        imports: CallImports,
        body: Box<Clause>,
    },
    /// `CALL apoc.util.validate(...)`
    CallProcedure {
        name: Cow<'static, str>,
        args: Vec<Expr>,
    },
    Create(Pattern),
    Merge(Pattern),
    Set(Vec<(Expr, Expr)>),
    Delete {
        targets: Vec<Expr>,
        detach: bool,
    },
    Return(Projection),
    Union(Union),
    Sequence(Vec<Clause>),
    /// Binds external slots to concrete variables for everything rendered inside `body`.
    ///
    /// Lets a fragment be built once against a placeholder and attached where the real
    /// variable is known.
    Rebind {
        bindings: Vec<(Cow<'static, str>, Variable)>,
        body: Box<Clause>,
    },
    /// Trusted text from the schema.
    Raw(String),
}

impl Clause {
    /// Flattens nested sequences and drops empty ones.
    pub fn sequence(clauses: impl IntoIterator<Item = Clause>) -> Self {
        let mut flat = Vec::new();

        for clause in clauses {
            match clause {
                Clause::Sequence(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Clause::Sequence(flat)
        }
    }

    pub fn empty() -> Self {
        Clause::Sequence(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Clause::Sequence(inner) if inner.iter().all(Clause::is_empty))
    }

    pub fn call(imports: CallImports, body: Clause) -> Self {
        Clause::Call {
            imports,
            body: Box::new(body),
        }
    }

    /// `CALL { WITH a, b ... }`
    pub fn call_with<'a>(imports: impl IntoIterator<Item = &'a Variable>, body: Clause) -> Self {
        Clause::call(CallImports::Variables(imports.into_iter().cloned().collect()), body)
    }

    pub fn procedure(name: impl Into<Cow<'static, str>>, args: impl IntoIterator<Item = Expr>) -> Self {
        Clause::CallProcedure {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn unwind(list: impl Into<Expr>, alias: impl Into<Variable>) -> Self {
        Clause::Unwind {
            list: list.into(),
            alias: alias.into(),
        }
    }

    pub fn set(assignments: impl IntoIterator<Item = (Expr, Expr)>) -> Self {
        Clause::Set(assignments.into_iter().collect())
    }

    pub fn detach_delete(target: impl Into<Expr>) -> Self {
        Clause::Delete {
            targets: vec![target.into()],
            detach: true,
        }
    }

    pub fn delete(target: impl Into<Expr>) -> Self {
        Clause::Delete {
            targets: vec![target.into()],
            detach: false,
        }
    }

    pub fn rebind(slot: impl Into<Cow<'static, str>>, variable: Variable, body: Clause) -> Self {
        Clause::Rebind {
            bindings: vec![(slot.into(), variable)],
            body: Box::new(body),
        }
    }

    /// Appends `next` after `self`.
    pub fn then(self, next: impl Into<Clause>) -> Self {
        Clause::sequence([self, next.into()])
    }
}

impl From<Vec<Clause>> for Clause {
    fn from(clauses: Vec<Clause>) -> Self {
        Clause::sequence(clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_flatten() {
        let inner = Clause::sequence([Clause::Raw("A".into()), Clause::Raw("B".into())]);
        let outer = Clause::sequence([inner, Clause::empty(), Clause::Raw("C".into())]);

        match outer {
            Clause::Sequence(clauses) => assert_eq!(clauses.len(), 3),
            other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn trivial_filters_are_dropped() {
        let m = Match::new(Pattern::node(NodePattern::new(Variable::named("this")))).filter(Predicate::Literal(true));
        assert!(m.filter.is_none());
    }
}
