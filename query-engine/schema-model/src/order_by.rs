use crate::ScalarField;

#[derive(Clone, Copy, PartialEq, Debug, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn from_argument(value: &str) -> Option<Self> {
        match value {
            "ASC" => Some(SortOrder::Ascending),
            "DESC" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

/// Whether a sort key lives on the traversed node or on the relationship.
#[derive(Clone, Copy, PartialEq, Debug, Eq, Hash)]
pub enum OrderTarget {
    Node,
    Edge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: ScalarField,
    pub target: OrderTarget,
    pub sort_order: SortOrder,
}

impl OrderBy {
    pub fn node(field: ScalarField, sort_order: SortOrder) -> Self {
        Self {
            field,
            target: OrderTarget::Node,
            sort_order,
        }
    }

    pub fn edge(field: ScalarField, sort_order: SortOrder) -> Self {
        Self {
            field,
            target: OrderTarget::Edge,
            sort_order,
        }
    }
}
