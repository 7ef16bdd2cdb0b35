//! Bulk update/delete builders.
//!
//! Bulk statements go straight to the store. Rows the caller loaded earlier
//! are not refreshed; reloading them is the caller's job.

use super::{BuildError, BuildResult};
use crate::db::StoreAdapter;
use crate::engine::{Engine, EngineResult};
use crate::expr::{Expr, ExprNode, IntoExpr};
use crate::model::entity::{Entity, EntityPath, RelationRef};
use crate::model::value::SqlType;
use crate::predicate::{self, IntoCondition, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkKind {
    Update,
    Delete,
}

impl BulkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// `column = value` inside an update's `SET` list.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    column: String,
    value: ExprNode,
}

impl Assignment {
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value(&self) -> &ExprNode {
        &self.value
    }
}

/// Finalized bulk mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkStatement {
    Update {
        target: RelationRef,
        assignments: Vec<Assignment>,
        filter: Option<Predicate>,
    },
    Delete {
        target: RelationRef,
        filter: Option<Predicate>,
    },
}

impl BulkStatement {
    pub fn kind(&self) -> BulkKind {
        match self {
            Self::Update { .. } => BulkKind::Update,
            Self::Delete { .. } => BulkKind::Delete,
        }
    }

    pub fn target(&self) -> &RelationRef {
        match self {
            Self::Update { target, .. } | Self::Delete { target, .. } => target,
        }
    }

    pub fn filter(&self) -> Option<&Predicate> {
        match self {
            Self::Update { filter, .. } | Self::Delete { filter, .. } => filter.as_ref(),
        }
    }

    /// Empty for deletes.
    pub fn assignments(&self) -> &[Assignment] {
        match self {
            Self::Update { assignments, .. } => assignments,
            Self::Delete { .. } => &[],
        }
    }

    pub fn execute<S: StoreAdapter>(&self, engine: &Engine<S>) -> EngineResult<u64> {
        engine.execute_bulk(self)
    }
}

/// `UPDATE target SET .. WHERE ..`.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    target: RelationRef,
    assignments: Vec<Assignment>,
    filter: Option<Predicate>,
    fault: Option<BuildError>,
}

impl UpdateBuilder {
    pub fn new<E: Entity>(target: &EntityPath<E>) -> Self {
        Self {
            target: target.relation().clone(),
            assignments: Vec::new(),
            filter: None,
            fault: None,
        }
    }

    /// Assigns `value` to `column`, which must belong to the target.
    ///
    /// `value` may reference the current row, e.g. `age.add(1)`.
    pub fn set<T: SqlType>(mut self, column: &Expr<T>, value: impl IntoExpr<T>) -> Self {
        match column.node() {
            ExprNode::Column { relation, name, .. } if relation == self.target.alias() => {
                self.assignments.push(Assignment {
                    column: name.clone(),
                    value: value.into_expr().into_node(),
                });
            }
            other => {
                if self.fault.is_none() {
                    self.fault = Some(BuildError::ForeignAssignment {
                        column: other.member_name().unwrap_or("<expression>").to_string(),
                    });
                }
            }
        }
        self
    }

    pub fn filter(mut self, condition: impl IntoCondition) -> Self {
        self.filter = predicate::and([self.filter.take(), condition.into_condition()]);
        self
    }

    pub fn build(self) -> BuildResult<BulkStatement> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        if self.assignments.is_empty() {
            return Err(BuildError::EmptyAssignments);
        }
        Ok(BulkStatement::Update {
            target: self.target,
            assignments: self.assignments,
            filter: self.filter,
        })
    }

    /// Builds and executes; returns the affected-row count.
    pub fn execute<S: StoreAdapter>(self, engine: &Engine<S>) -> EngineResult<u64> {
        engine.execute_bulk(&self.build()?)
    }
}

/// `DELETE FROM target WHERE ..`.
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    target: RelationRef,
    filter: Option<Predicate>,
}

impl DeleteBuilder {
    pub fn new<E: Entity>(target: &EntityPath<E>) -> Self {
        Self {
            target: target.relation().clone(),
            filter: None,
        }
    }

    pub fn filter(mut self, condition: impl IntoCondition) -> Self {
        self.filter = predicate::and([self.filter.take(), condition.into_condition()]);
        self
    }

    pub fn build(self) -> BuildResult<BulkStatement> {
        Ok(BulkStatement::Delete {
            target: self.target,
            filter: self.filter,
        })
    }

    pub fn execute<S: StoreAdapter>(self, engine: &Engine<S>) -> EngineResult<u64> {
        engine.execute_bulk(&self.build()?)
    }
}
