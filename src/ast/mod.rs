pub mod model;
pub mod operators;
pub mod values;

pub use self::model::{
    Assignment, ColumnRef, JoinSpec, Operand, OrderBy, Predicate, QueryModel, SelectItem,
};
pub use self::operators::{CompareOp, JoinKind, SortOrder, StatementKind};
pub use self::values::Value;
