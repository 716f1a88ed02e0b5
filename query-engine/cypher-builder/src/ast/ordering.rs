use crate::ast::Expr;

/// Defines ordering for an `ORDER BY` statement.
pub type OrderDefinition = (Expr, Order);

/// A list of definitions for the `ORDER BY` statement.
#[derive(Debug, Default, Clone)]
pub struct Ordering(pub Vec<OrderDefinition>);

impl Ordering {
    pub fn append(mut self, value: OrderDefinition) -> Self {
        self.0.push(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The ordering direction
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Order {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

/// An item that can be used in the `ORDER BY` statement
pub trait Orderable
where
    Self: Sized,
{
    /// Order by `self` in the given order
    fn order(self, order: Order) -> OrderDefinition;

    /// Change the order to `ASC`
    fn ascend(self) -> OrderDefinition {
        self.order(Order::Asc)
    }

    /// Change the order to `DESC`
    fn descend(self) -> OrderDefinition {
        self.order(Order::Desc)
    }
}

impl<T> Orderable for T
where
    T: Into<Expr>,
{
    fn order(self, order: Order) -> OrderDefinition {
        (self.into(), order)
    }
}
