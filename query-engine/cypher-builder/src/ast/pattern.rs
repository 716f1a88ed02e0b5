use crate::ast::Variable;

/// Arrow direction as written, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `<-[]-`
    Left,
    /// `-[]->`
    Right,
    /// `-[]-`
    Undirected,
}

#[derive(Debug, Clone, Default)]
pub struct NodePattern {
    pub variable: Option<Variable>,
    pub labels: Vec<String>,
}

impl NodePattern {
    pub fn new(variable: impl Into<Variable>) -> Self {
        NodePattern {
            variable: Some(variable.into()),
            labels: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        NodePattern::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipPattern {
    pub variable: Option<Variable>,
    pub rel_type: String,
    pub direction: Direction,
}

impl RelationshipPattern {
    pub fn new(rel_type: impl Into<String>, direction: Direction) -> Self {
        RelationshipPattern {
            variable: None,
            rel_type: rel_type.into(),
            direction,
        }
    }

    pub fn named(mut self, variable: impl Into<Variable>) -> Self {
        self.variable = Some(variable.into());
        self
    }
}

/// `(a)-[r:TYPE]->(b)...`
#[derive(Debug, Clone)]
pub struct Pattern {
    pub start: NodePattern,
    pub chain: Vec<(RelationshipPattern, NodePattern)>,
}

impl Pattern {
    pub fn node(start: NodePattern) -> Self {
        Pattern {
            start,
            chain: Vec::new(),
        }
    }

    pub fn related(mut self, relationship: RelationshipPattern, node: NodePattern) -> Self {
        self.chain.push((relationship, node));
        self
    }
}
