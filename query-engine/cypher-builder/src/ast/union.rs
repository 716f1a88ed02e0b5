use crate::ast::Clause;

/// Branches of a `UNION` sharing the same return columns.
#[derive(Debug, Clone, Default)]
pub struct Union {
    pub branches: Vec<Clause>,
    pub all: bool,
}

impl Union {
    pub fn new(branches: impl IntoIterator<Item = Clause>) -> Self {
        Union {
            branches: branches.into_iter().collect(),
            all: false,
        }
    }

    /// Keep duplicate rows, `UNION ALL`.
    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    pub fn push(&mut self, branch: Clause) {
        self.branches.push(branch);
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl From<Union> for Clause {
    fn from(union: Union) -> Self {
        Clause::Union(union)
    }
}
