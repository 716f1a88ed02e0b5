//! Turns a clause tree into Cypher text and the parameters it references.
//!
//! Labels are always quoted, other identifiers only when they are not plain words. Subquery
//! bodies are indented by four spaces.

use std::borrow::Cow;

use graph_value::GraphValue;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

use crate::{Environment, RenderError, ast::*};

const INDENT: &str = "    ";

type Result<T> = std::result::Result<T, RenderError>;

/// Query text with its parameters, in the order they first appear.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub params: IndexMap<String, GraphValue>,
}

/// The renderer.
pub struct Cypher {
    params: IndexMap<String, GraphValue>,
    /// Parameters referenced by name only, filled in after rendering.
    deferred: IndexSet<String>,
    bindings: Vec<(Cow<'static, str>, Variable)>,
}

impl Cypher {
    fn new() -> Self {
        Cypher {
            params: IndexMap::new(),
            deferred: IndexSet::new(),
            bindings: Vec::new(),
        }
    }

    /// Renders `clause`, collecting every parameter it references.
    pub fn build(clause: &Clause, env: &Environment) -> Result<Rendered> {
        let mut cypher = Cypher::new();
        let text = cypher.visit_clause(clause)?.join("\n");

        tracing::trace!(
            query = %text,
            params = cypher.params.len(),
            variables = env.variables_issued(),
            "rendered cypher"
        );

        Ok(Rendered {
            text,
            params: cypher.params,
        })
    }

    /// Renders a single expression, mostly useful for tests.
    pub fn build_expr(expr: &Expr, _env: &Environment) -> Result<Rendered> {
        let mut cypher = Cypher::new();
        let text = cypher.visit_expr(expr)?;

        Ok(Rendered {
            text,
            params: cypher.params,
        })
    }

    fn visit_clause(&mut self, clause: &Clause) -> Result<Vec<String>> {
        match clause {
            Clause::Match(m) => self.visit_match(m),
            Clause::With(projection) => self.visit_projection("WITH", projection),
            Clause::Return(projection) => self.visit_projection("RETURN", projection),
            Clause::Unwind { list, alias } => Ok(vec![format!(
                "UNWIND {} AS {}",
                self.visit_expr(list)?,
                self.visit_variable(alias)?
            )]),
            Clause::Call { imports, body } => self.visit_call(imports, body),
            Clause::CallProcedure { name, args } => {
                let args = self.visit_exprs(args)?;
                Ok(vec![format!("CALL {name}({})", args.join(", "))])
            }
            Clause::Create(pattern) => Ok(vec![format!("CREATE {}", self.visit_pattern(pattern)?)]),
            Clause::Merge(pattern) => Ok(vec![format!("MERGE {}", self.visit_pattern(pattern)?)]),
            Clause::Set(assignments) => self.visit_set(assignments),
            Clause::Delete { targets, detach } => {
                let keyword = if *detach { "DETACH DELETE" } else { "DELETE" };
                let targets = self.visit_exprs(targets)?;
                Ok(vec![format!("{keyword} {}", targets.join(", "))])
            }
            Clause::Union(union) => self.visit_union(union),
            Clause::Sequence(clauses) => {
                let mut lines = Vec::new();
                for clause in clauses {
                    lines.extend(self.visit_clause(clause)?);
                }
                Ok(lines)
            }
            Clause::Rebind { bindings, body } => {
                let depth = self.bindings.len();
                self.bindings.extend(bindings.iter().cloned());
                let lines = self.visit_clause(body);
                self.bindings.truncate(depth);
                lines
            }
            Clause::Raw(text) => Ok(text.lines().map(ToOwned::to_owned).collect()),
        }
    }

    fn visit_match(&mut self, m: &Match) -> Result<Vec<String>> {
        let keyword = if m.optional { "OPTIONAL MATCH" } else { "MATCH" };
        let mut lines = vec![format!("{keyword} {}", self.visit_pattern(&m.pattern)?)];

        if let Some(filter) = m.filter.as_ref().filter(|f| !f.is_trivial()) {
            lines.push(format!("WHERE {}", self.visit_predicate(filter)?));
        }

        Ok(lines)
    }

    fn visit_projection(&mut self, keyword: &str, projection: &Projection) -> Result<Vec<String>> {
        let items = projection
            .items
            .iter()
            .map(|item| self.visit_projection_item(item))
            .collect::<Result<Vec<_>>>()?;

        let distinct = if projection.distinct { "DISTINCT " } else { "" };
        let mut lines = vec![format!("{keyword} {distinct}{}", items.join(", "))];

        if !projection.ordering.is_empty() {
            let ordering = projection
                .ordering
                .0
                .iter()
                .map(|(expr, order)| {
                    let order = match order {
                        Order::Asc => "ASC",
                        Order::Desc => "DESC",
                    };
                    Ok(format!("{} {order}", self.visit_expr(expr)?))
                })
                .collect::<Result<Vec<_>>>()?;

            lines.push(format!("ORDER BY {}", ordering.join(", ")));
        }

        if let Some(skip) = &projection.skip {
            lines.push(format!("SKIP {}", self.visit_expr(skip)?));
        }

        if let Some(limit) = &projection.limit {
            lines.push(format!("LIMIT {}", self.visit_expr(limit)?));
        }

        if let Some(filter) = projection.filter.as_ref().filter(|f| !f.is_trivial()) {
            lines.push(format!("WHERE {}", self.visit_predicate(filter)?));
        }

        Ok(lines)
    }

    fn visit_projection_item(&mut self, item: &ProjectionItem) -> Result<String> {
        match item {
            ProjectionItem::Star => Ok("*".to_owned()),
            ProjectionItem::Expr { expr, alias: None } => self.visit_expr(expr),
            ProjectionItem::Expr {
                expr,
                alias: Some(alias),
            } => {
                let alias = self.visit_variable(alias)?;
                let expr = self.visit_expr(expr)?;

                if expr == alias {
                    Ok(expr)
                } else {
                    Ok(format!("{expr} AS {alias}"))
                }
            }
        }
    }

    fn visit_call(&mut self, imports: &CallImports, body: &Clause) -> Result<Vec<String>> {
        let mut inner = match imports {
            CallImports::None => Vec::new(),
            CallImports::Star => vec!["WITH *".to_owned()],
            CallImports::Variables(variables) => {
                let variables = variables
                    .iter()
                    .map(|v| self.visit_variable(v))
                    .collect::<Result<Vec<_>>>()?;
                vec![format!("WITH {}", variables.join(", "))]
            }
        };

        inner.extend(self.visit_clause(body)?);

        let mut lines = Vec::with_capacity(inner.len() + 2);
        lines.push("CALL {".to_owned());
        lines.extend(inner.into_iter().map(|line| format!("{INDENT}{line}")));
        lines.push("}".to_owned());

        Ok(lines)
    }

    fn visit_set(&mut self, assignments: &[(Expr, Expr)]) -> Result<Vec<String>> {
        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let assignments = assignments
            .iter()
            .map(|(target, value)| Ok(format!("{} = {}", self.visit_expr(target)?, self.visit_expr(value)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(vec![format!("SET {}", assignments.join(", "))])
    }

    fn visit_union(&mut self, union: &Union) -> Result<Vec<String>> {
        let separator = if union.all { "UNION ALL" } else { "UNION" };
        let mut lines = Vec::new();

        for (i, branch) in union.branches.iter().enumerate() {
            if i > 0 {
                lines.push(separator.to_owned());
            }
            lines.extend(self.visit_clause(branch)?);
        }

        Ok(lines)
    }

    fn visit_pattern(&mut self, pattern: &Pattern) -> Result<String> {
        let mut out = self.visit_node_pattern(&pattern.start)?;

        for (relationship, node) in &pattern.chain {
            let variable = match &relationship.variable {
                Some(v) => self.visit_variable(v)?,
                None => String::new(),
            };
            let rel_type = quote_identifier(&relationship.rel_type);

            let (left, right) = match relationship.direction {
                Direction::Left => ("<-", "-"),
                Direction::Right => ("-", "->"),
                Direction::Undirected => ("-", "-"),
            };

            out.push_str(&format!("{left}[{variable}:{rel_type}]{right}"));
            out.push_str(&self.visit_node_pattern(node)?);
        }

        Ok(out)
    }

    fn visit_node_pattern(&mut self, node: &NodePattern) -> Result<String> {
        let variable = match &node.variable {
            Some(v) => self.visit_variable(v)?,
            None => String::new(),
        };

        let labels = node.labels.iter().map(|l| format!(":`{}`", l.replace('`', "``"))).join("");

        Ok(format!("({variable}{labels})"))
    }

    fn visit_variable(&self, variable: &Variable) -> Result<String> {
        match variable {
            Variable::Named(name) => Ok(quote_identifier(name).into_owned()),
            Variable::External(slot) => match self.bindings.iter().rev().find(|(s, _)| s == slot) {
                Some((_, Variable::Named(name))) => Ok(quote_identifier(name).into_owned()),
                // A slot bound to another slot resolves through the outer bindings.
                Some((_, bound @ Variable::External(_))) if bound != variable => self.visit_variable(bound),
                _ => Err(RenderError::UnboundSlot(slot.to_string())),
            },
        }
    }

    fn visit_exprs(&mut self, exprs: &[Expr]) -> Result<Vec<String>> {
        exprs.iter().map(|e| self.visit_expr(e)).collect()
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Variable(v) => self.visit_variable(v),
            Expr::Property(base, key) => Ok(format!("{}.{}", self.visit_expr(base)?, quote_identifier(key))),
            Expr::Param(param) => {
                self.add_parameter(param);
                Ok(format!("${}", param.name()))
            }
            Expr::ParamRef(name) => {
                let root = name.split('.').next().unwrap_or(name);
                self.deferred.insert(root.to_owned());
                Ok(format!("${name}"))
            }
            Expr::Literal(literal) => Ok(visit_literal(literal)),
            Expr::List(items) => Ok(format!("[{}]", self.visit_exprs(items)?.join(", "))),
            Expr::Map(entries) => {
                if entries.is_empty() {
                    return Ok("{}".to_owned());
                }

                let entries = entries
                    .iter()
                    .map(|(key, value)| Ok(format!("{}: {}", quote_identifier(key), self.visit_expr(value)?)))
                    .collect::<Result<Vec<_>>>()?;

                Ok(format!("{{ {} }}", entries.join(", ")))
            }
            Expr::MapProjection { variable, entries } => {
                let variable = self.visit_variable(variable)?;
                let entries = entries
                    .iter()
                    .map(|entry| match entry {
                        MapEntry::Property(name) => Ok(format!(".{}", quote_identifier(name))),
                        MapEntry::Keyed(key, value) => {
                            Ok(format!("{}: {}", quote_identifier(key), self.visit_expr(value)?))
                        }
                        MapEntry::AllProperties => Ok(".*".to_owned()),
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(format!("{variable} {{ {} }}", entries.join(", ")))
            }
            Expr::Function { name, args, distinct } => {
                let distinct = if *distinct { "DISTINCT " } else { "" };
                Ok(format!("{name}({distinct}{})", self.visit_exprs(args)?.join(", ")))
            }
            Expr::Star => Ok("*".to_owned()),
            Expr::Arithmetic { lhs, op, rhs } => {
                let op = match op {
                    ArithmeticOp::Add => "+",
                    ArithmeticOp::Subtract => "-",
                };
                Ok(format!("{} {op} {}", self.visit_expr(lhs)?, self.visit_expr(rhs)?))
            }
            Expr::Case { when, then, otherwise } => Ok(format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                self.visit_predicate(when)?,
                self.visit_expr(then)?,
                self.visit_expr(otherwise)?
            )),
            Expr::Predicate(predicate) => self.visit_predicate(predicate),
            Expr::PatternComprehension {
                pattern,
                condition,
                map,
            } => {
                let pattern = self.visit_pattern(pattern)?;
                let condition = self.visit_condition(condition.as_deref())?;
                Ok(format!("[{pattern}{condition} | {}]", self.visit_expr(map)?))
            }
            Expr::ListComprehension {
                variable,
                list,
                condition,
                map,
            } => {
                let variable = self.visit_variable(variable)?;
                let list = self.visit_expr(list)?;
                let condition = self.visit_condition(condition.as_deref())?;
                let map = match map {
                    Some(map) => format!(" | {}", self.visit_expr(map)?),
                    None => String::new(),
                };
                Ok(format!("[{variable} IN {list}{condition}{map}]"))
            }
            Expr::IsolatedSubquery(subquery) => self.visit_isolated(subquery),
            Expr::Index { list, index } => Ok(format!("{}[{}]", self.visit_expr(list)?, self.visit_expr(index)?)),
            Expr::Reduce {
                accumulator,
                init,
                variable,
                list,
                expr,
            } => Ok(format!(
                "reduce({} = {}, {} IN {} | {})",
                self.visit_variable(accumulator)?,
                self.visit_expr(init)?,
                self.visit_variable(variable)?,
                self.visit_expr(list)?,
                self.visit_expr(expr)?
            )),
            Expr::Raw(text) => Ok(text.clone()),
        }
    }

    fn visit_condition(&mut self, condition: Option<&Predicate>) -> Result<String> {
        match condition.filter(|c| !c.is_trivial()) {
            Some(c) => Ok(format!(" WHERE {}", self.visit_predicate(c)?)),
            None => Ok(String::new()),
        }
    }

    /// The body runs in its own scope, so the outer variable and every parameter it touches
    /// are passed in explicitly.
    fn visit_isolated(&mut self, subquery: &IsolatedSubquery) -> Result<String> {
        let outer = self.visit_variable(&subquery.outer)?;

        let mut inner = Cypher::new();
        inner
            .bindings
            .push((subquery.slot.clone(), Variable::Named(subquery.slot.clone())));

        let body = inner.visit_clause(&subquery.body)?.join(" ");

        let mut forwarded = vec![format!("{}: {outer}", quote_identifier(&subquery.slot))];
        for (name, value) in inner.params {
            forwarded.push(format!("{name}: ${name}"));
            self.params.entry(name).or_insert(value);
        }
        for name in inner.deferred {
            forwarded.push(format!("{name}: ${name}"));
            self.deferred.insert(name);
        }

        let function = if subquery.many {
            "apoc.cypher.runFirstColumnMany"
        } else {
            "apoc.cypher.runFirstColumnSingle"
        };

        Ok(format!(
            "{function}(\"{}\", {{ {} }})",
            escape_string(&body),
            forwarded.join(", ")
        ))
    }

    fn visit_predicate(&mut self, predicate: &Predicate) -> Result<String> {
        match predicate {
            Predicate::Compare { lhs, op, rhs } => Ok(format!(
                "{} {} {}",
                self.visit_expr(lhs)?,
                op.as_str(),
                self.visit_expr(rhs)?
            )),
            Predicate::IsNull(expr) => Ok(format!("{} IS NULL", self.visit_expr(expr)?)),
            Predicate::IsNotNull(expr) => Ok(format!("{} IS NOT NULL", self.visit_expr(expr)?)),
            Predicate::Exists(pattern) => Ok(format!("exists({})", self.visit_pattern(pattern)?)),
            Predicate::Quantified {
                quantifier,
                variable,
                list,
                condition,
            } => Ok(format!(
                "{}({} IN {} WHERE {})",
                quantifier.as_str(),
                self.visit_variable(variable)?,
                self.visit_expr(list)?,
                self.visit_predicate(condition)?
            )),
            Predicate::And(predicates) => self.visit_junction(predicates, "AND", "true"),
            Predicate::Or(predicates) => self.visit_junction(predicates, "OR", "false"),
            Predicate::Not(inner) => {
                let rendered = self.visit_predicate(inner)?;
                match inner.as_ref() {
                    Predicate::And(ps) | Predicate::Or(ps) if ps.len() > 1 => Ok(format!("NOT {rendered}")),
                    _ => Ok(format!("NOT ({rendered})")),
                }
            }
            Predicate::Expr(expr) => self.visit_expr(expr),
            Predicate::Literal(value) => Ok(value.to_string()),
        }
    }

    fn visit_junction(&mut self, predicates: &[Predicate], keyword: &str, empty: &str) -> Result<String> {
        match predicates {
            [] => Ok(empty.to_owned()),
            [single] => self.visit_predicate(single),
            many => {
                let parts = many
                    .iter()
                    .map(|p| self.visit_predicate(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", parts.iter().join(&format!(" {keyword} "))))
            }
        }
    }

    fn add_parameter(&mut self, param: &Param) {
        match self.params.get(param.name()) {
            Some(existing) => debug_assert_eq!(
                existing,
                param.value(),
                "parameter `{}` bound to two different values",
                param.name()
            ),
            None => {
                self.params.insert(param.name().to_owned(), param.value().clone());
            }
        }
    }
}

fn visit_literal(literal: &Literal) -> String {
    match literal {
        Literal::Null => "null".to_owned(),
        Literal::Boolean(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::String(s) => format!("\"{}\"", escape_string(s)),
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn quote_identifier(s: &str) -> Cow<'_, str> {
    if is_plain_identifier(s) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("`{}`", s.replace('`', "``")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn this() -> Variable {
        Variable::named("this")
    }

    #[test]
    fn match_with_where_and_return() {
        let env = Environment::new();
        let title = env.next_param("", "Heat");
        let year = env.next_param("", 1995);

        let query = Clause::sequence([
            Match::new(Pattern::node(NodePattern::new(this()).label("Movie")))
                .filter(Expr::property(&this(), "title").equals(title))
                .filter(Expr::property(&this(), "year").greater_than(year))
                .into(),
            Projection::new([ProjectionItem::aliased(
                Expr::map_projection(this(), vec![MapEntry::Property("title".into())]),
                this(),
            )])
            .into_return(),
        ]);

        let rendered = Cypher::build(&query, &env).unwrap();

        assert_eq!(
            indoc! {"
                MATCH (this:`Movie`)
                WHERE (this.title = $param0 AND this.year > $param1)
                RETURN this { .title } AS this"},
            rendered.text
        );
        assert_eq!(vec!["param0", "param1"], rendered.params.keys().collect::<Vec<_>>());
    }

    #[test]
    fn subqueries_are_indented() {
        let env = Environment::new();
        let actor = env.next_node("this_");
        let edge = env.next_relationship("this_");
        let var = env.next_value("");

        let pattern = Pattern::node(NodePattern::new(this())).related(
            RelationshipPattern::new("ACTED_IN", Direction::Left).named(edge),
            NodePattern::new(actor.clone()).label("Actor"),
        );

        let body = Clause::sequence([
            Match::new(pattern).into(),
            Projection::new([ProjectionItem::aliased(Expr::collect(&actor), var.clone())]).into_return(),
        ]);

        let query = Clause::call_with([&this()], body);
        let rendered = Cypher::build(&query, &env).unwrap();

        assert_eq!(
            indoc! {"
                CALL {
                    WITH this
                    MATCH (this)<-[this_edge1:ACTED_IN]-(this_this0:`Actor`)
                    RETURN collect(this_this0) AS var2
                }"},
            rendered.text
        );
    }

    #[test]
    fn rebind_resolves_external_slots() {
        let env = Environment::new();
        let slot = Variable::external("root");

        let fragment = Projection::new([ProjectionItem::expr(Expr::property(&slot, "id"))]).into_return();
        let query = Clause::rebind("root", Variable::named("this0"), fragment.clone());

        assert_eq!("RETURN this0.id", Cypher::build(&query, &env).unwrap().text);
        assert_eq!(
            Err(RenderError::UnboundSlot("root".into())),
            Cypher::build(&fragment, &env)
        );
    }

    #[test]
    fn isolated_subqueries_forward_params() {
        let env = Environment::new();
        let inner_this = Variable::external("this");
        let limit = env.next_param("", 2);

        let body = Clause::sequence([
            Match::new(
                Pattern::node(NodePattern::new(inner_this.clone())).related(
                    RelationshipPattern::new("LIKES", Direction::Right),
                    NodePattern::new(Variable::named("n")).label("Post"),
                ),
            )
            .into(),
            Projection::new([ProjectionItem::expr(Expr::count(Variable::named("n")).greater_than(limit))])
                .into_return(),
        ]);

        let expr = Expr::isolated("this", Variable::named("this0"), body);
        let rendered = Cypher::build_expr(&expr, &env).unwrap();

        assert_eq!(
            "apoc.cypher.runFirstColumnSingle(\"MATCH (this)-[:LIKES]->(n:`Post`) RETURN count(n) > $param0\", { this: this0, param0: $param0 })",
            rendered.text
        );
        assert_eq!(Some(&GraphValue::Int(2)), rendered.params.get("param0"));
    }

    #[test]
    fn negation_and_quantifiers() {
        let env = Environment::new();
        let v = Variable::named("v");

        let predicate = Predicate::quantified(
            Quantifier::All,
            v.clone(),
            Expr::property(&this(), "tags"),
            Expr::from(&v).not_equals(Expr::string("x\"y")),
        )
        .and(Expr::property(&this(), "deleted").is_null())
        .not();

        let rendered = Cypher::build_expr(&Expr::from(predicate), &env).unwrap();

        assert_eq!(
            "NOT (all(v IN this.tags WHERE v <> \"x\\\"y\") AND this.deleted IS NULL)",
            rendered.text
        );
    }

    #[test]
    fn odd_identifiers_are_quoted() {
        let env = Environment::new();
        let expr = Expr::property(&this(), "first name");

        assert_eq!("this.`first name`", Cypher::build_expr(&expr, &env).unwrap().text);
    }

    #[test]
    fn union_and_pagination() {
        let env = Environment::new();
        let n = Variable::named("n");

        let branch = |label: &str| {
            Clause::sequence([
                Match::new(Pattern::node(NodePattern::new(n.clone()).label(label))).into(),
                Projection::new([ProjectionItem::from(&n)]).into_return(),
            ])
        };

        let query = Clause::sequence([
            Clause::call(CallImports::Star, Union::new([branch("Post"), branch("Comment")]).into()),
            Projection::new([ProjectionItem::from(&n)])
                .order_by(Expr::property(&n, "createdAt").descend())
                .skip(Expr::int(10))
                .limit(Expr::int(5))
                .into_return(),
        ]);

        assert_eq!(
            indoc! {"
                CALL {
                    WITH *
                    MATCH (n:`Post`)
                    RETURN n
                    UNION
                    MATCH (n:`Comment`)
                    RETURN n
                }
                RETURN n
                ORDER BY n.createdAt DESC
                SKIP 10
                LIMIT 5"},
            Cypher::build(&query, &env).unwrap().text
        );
    }
}
