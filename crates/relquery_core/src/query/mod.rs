//! Query composition: accumulated query state, the fluent builder and bulk
//! mutation builders.
//!
//! # Responsibility
//! - Accumulate select/source/join/filter/group/having/order/paging state
//!   through a single-owner builder.
//! - Detect malformed queries before anything is dispatched to the store.
//!
//! # Invariants
//! - A builder is consumed by `build()` or by a terminal fetch; reuse
//!   requires an explicit `clone()` before finalizing.
//! - The first recorded fault wins and is reported by `build()`.

use crate::model::value::ValueKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod builder;
mod bulk;
mod spec;

pub use builder::{BuilderState, JoinTarget, Query, QueryBuilder};
pub use bulk::{Assignment, BulkKind, BulkStatement, DeleteBuilder, UpdateBuilder};
pub use spec::{
    Direction, JoinClause, JoinKind, JoinSource, NullPlacement, OrderSpec, QuerySpec, SelectItem,
};

pub type BuildResult<T> = Result<T, BuildError>;

/// Fault detected while composing or compiling a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    MissingSelect,
    MissingSource,
    OnWithoutJoin,
    FetchWithoutJoin,
    MissingJoinCondition { alias: String },
    InvalidLimit,
    HavingWithoutGroupBy,
    DuplicateAlias { alias: String },
    UnknownRelation { alias: String },
    UnknownColumn { relation: String, column: String },
    TypeMismatch {
        context: String,
        expected: ValueKind,
        found: ValueKind,
    },
    InvalidIdentifier { identifier: String },
    SubqueryShape { columns: usize },
    EmptyAssignments,
    ForeignAssignment { column: String },
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSelect => write!(f, "query has no select targets"),
            Self::MissingSource => write!(f, "query has no source relation"),
            Self::OnWithoutJoin => write!(f, "`on` condition without a preceding join"),
            Self::FetchWithoutJoin => write!(f, "`fetch_join` without a preceding join"),
            Self::MissingJoinCondition { alias } => {
                write!(f, "join of `{alias}` has no association and no `on` condition")
            }
            Self::InvalidLimit => write!(f, "limit must be greater than zero"),
            Self::HavingWithoutGroupBy => write!(f, "`having` requires `group_by`"),
            Self::DuplicateAlias { alias } => write!(f, "relation alias `{alias}` is used twice"),
            Self::UnknownRelation { alias } => {
                write!(f, "relation `{alias}` is not in scope of this query")
            }
            Self::UnknownColumn { relation, column } => {
                write!(f, "relation `{relation}` has no column `{column}`")
            }
            Self::TypeMismatch {
                context,
                expected,
                found,
            } => write!(f, "type mismatch in {context}: expected {expected}, found {found}"),
            Self::InvalidIdentifier { identifier } => {
                write!(f, "`{identifier}` is not a valid identifier")
            }
            Self::SubqueryShape { columns } => {
                write!(f, "subquery must select exactly one column, found {columns}")
            }
            Self::EmptyAssignments => write!(f, "update statement has no assignments"),
            Self::ForeignAssignment { column } => {
                write!(f, "assigned column `{column}` does not belong to the update target")
            }
        }
    }
}

impl Error for BuildError {}
