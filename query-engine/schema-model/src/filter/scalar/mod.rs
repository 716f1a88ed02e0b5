mod condition;

pub use condition::ScalarCondition;

use crate::ScalarField;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarFilter {
    pub field: ScalarField,
    pub condition: ScalarCondition,
}
