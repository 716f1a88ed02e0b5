use std::borrow::Cow;

use crate::ast::*;

/// Constant values written into the query text. Request values are never literals, they
/// travel as [`Param`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    String(Cow<'static, str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
}

/// An entry of a map projection, `.title`, `key: expr` or `.*`.
#[derive(Debug, Clone)]
pub enum MapEntry {
    Property(String),
    Keyed(String, Expr),
    AllProperties,
}

/// `apoc.cypher.runFirstColumnSingle(...)` around a clause with its own variable scope.
///
/// The body refers to the outer node through `Variable::External(slot)`; inside the isolated
/// scope it is called `slot`, and the outer variable is passed in under that name. Every
/// parameter the body uses is forwarded as well.
#[derive(Debug, Clone)]
pub struct IsolatedSubquery {
    pub slot: Cow<'static, str>,
    pub outer: Variable,
    pub body: Clause,
    /// Collects every row of the first column instead of taking the first one.
    pub many: bool,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Variable(Variable),
    Property(Box<Expr>, String),
    Param(Param),
    /// A parameter whose value is supplied after rendering.
    ParamRef(String),
    Literal(Literal),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    MapProjection {
        variable: Variable,
        entries: Vec<MapEntry>,
    },
    Function {
        name: Cow<'static, str>,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// `*`, as in `count(*)`.
    Star,
    Arithmetic {
        lhs: Box<Expr>,
        op: ArithmeticOp,
        rhs: Box<Expr>,
    },
    Case {
        when: Box<Predicate>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Predicate(Box<Predicate>),
    /// `[(a)-[r]->(b) WHERE cond | map]`
    PatternComprehension {
        pattern: Box<Pattern>,
        condition: Option<Box<Predicate>>,
        map: Box<Expr>,
    },
    /// `[x IN list WHERE cond | map]`
    ListComprehension {
        variable: Variable,
        list: Box<Expr>,
        condition: Option<Box<Predicate>>,
        map: Option<Box<Expr>>,
    },
    IsolatedSubquery(Box<IsolatedSubquery>),
    /// `list[index]`
    Index {
        list: Box<Expr>,
        index: Box<Expr>,
    },
    /// `reduce(acc = init, x IN list | expr)`
    Reduce {
        accumulator: Variable,
        init: Box<Expr>,
        variable: Variable,
        list: Box<Expr>,
        expr: Box<Expr>,
    },
    /// Trusted text taken from the schema, e.g. custom statements.
    Raw(String),
}

impl Expr {
    pub fn property(base: impl Into<Expr>, key: impl Into<String>) -> Self {
        Expr::Property(Box::new(base.into()), key.into())
    }

    pub fn string(value: impl Into<Cow<'static, str>>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Literal(Literal::Boolean(value))
    }

    pub fn function(name: impl Into<Cow<'static, str>>, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args: args.into_iter().collect(),
            distinct: false,
        }
    }

    pub fn count(expr: impl Into<Expr>) -> Self {
        Expr::function("count", [expr.into()])
    }

    pub fn count_star() -> Self {
        Expr::function("count", [Expr::Star])
    }

    pub fn collect(expr: impl Into<Expr>) -> Self {
        Expr::function("collect", [expr.into()])
    }

    pub fn collect_distinct(expr: impl Into<Expr>) -> Self {
        Expr::Function {
            name: "collect".into(),
            args: vec![expr.into()],
            distinct: true,
        }
    }

    pub fn size(expr: impl Into<Expr>) -> Self {
        Expr::function("size", [expr.into()])
    }

    pub fn head(expr: impl Into<Expr>) -> Self {
        Expr::function("head", [expr.into()])
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Expr)>,
    {
        Expr::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn map_projection(variable: impl Into<Variable>, entries: Vec<MapEntry>) -> Self {
        Expr::MapProjection {
            variable: variable.into(),
            entries,
        }
    }

    pub fn add(self, rhs: impl Into<Expr>) -> Self {
        Expr::Arithmetic {
            lhs: Box::new(self),
            op: ArithmeticOp::Add,
            rhs: Box::new(rhs.into()),
        }
    }

    pub fn subtract(self, rhs: impl Into<Expr>) -> Self {
        Expr::Arithmetic {
            lhs: Box::new(self),
            op: ArithmeticOp::Subtract,
            rhs: Box::new(rhs.into()),
        }
    }

    pub fn case(when: Predicate, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Self {
        Expr::Case {
            when: Box::new(when),
            then: Box::new(then.into()),
            otherwise: Box::new(otherwise.into()),
        }
    }

    pub fn pattern_comprehension(pattern: Pattern, condition: Option<Predicate>, map: impl Into<Expr>) -> Self {
        Expr::PatternComprehension {
            pattern: Box::new(pattern),
            condition: condition.map(Box::new),
            map: Box::new(map.into()),
        }
    }

    pub fn list_comprehension(
        variable: Variable,
        list: impl Into<Expr>,
        condition: Option<Predicate>,
        map: Option<Expr>,
    ) -> Self {
        Expr::ListComprehension {
            variable,
            list: Box::new(list.into()),
            condition: condition.map(Box::new),
            map: map.map(Box::new),
        }
    }

    pub fn isolated(slot: impl Into<Cow<'static, str>>, outer: Variable, body: Clause) -> Self {
        Expr::IsolatedSubquery(Box::new(IsolatedSubquery {
            slot: slot.into(),
            outer,
            body,
            many: false,
        }))
    }

    pub fn isolated_many(slot: impl Into<Cow<'static, str>>, outer: Variable, body: Clause) -> Self {
        Expr::IsolatedSubquery(Box::new(IsolatedSubquery {
            slot: slot.into(),
            outer,
            body,
            many: true,
        }))
    }

    pub fn index(list: impl Into<Expr>, index: impl Into<Expr>) -> Self {
        Expr::Index {
            list: Box::new(list.into()),
            index: Box::new(index.into()),
        }
    }

    pub fn reduce(
        accumulator: Variable,
        init: impl Into<Expr>,
        variable: Variable,
        list: impl Into<Expr>,
        expr: impl Into<Expr>,
    ) -> Self {
        Expr::Reduce {
            accumulator,
            init: Box::new(init.into()),
            variable,
            list: Box::new(list.into()),
            expr: Box::new(expr.into()),
        }
    }
}

impl From<Variable> for Expr {
    fn from(v: Variable) -> Self {
        Expr::Variable(v)
    }
}

impl From<&Variable> for Expr {
    fn from(v: &Variable) -> Self {
        Expr::Variable(v.clone())
    }
}

impl From<Param> for Expr {
    fn from(p: Param) -> Self {
        Expr::Param(p)
    }
}

impl From<Predicate> for Expr {
    fn from(p: Predicate) -> Self {
        Expr::Predicate(Box::new(p))
    }
}

impl From<Literal> for Expr {
    fn from(l: Literal) -> Self {
        Expr::Literal(l)
    }
}
