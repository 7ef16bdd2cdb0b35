//! Accumulated query state.

use super::{BuildError, BuildResult};
use crate::expr::ExprNode;
use crate::model::entity::RelationRef;
use crate::model::value::ValueKind;
use crate::predicate::Predicate;
use std::collections::HashSet;

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Expr { node: ExprNode, kind: ValueKind },
    /// Every declared column of the relation, in declaration order.
    Entity(RelationRef),
}

impl SelectItem {
    /// Scalar kind; `None` for a full-entity item.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Expr { kind, .. } => Some(*kind),
            Self::Entity(_) => None,
        }
    }

    /// Number of result columns this item occupies.
    pub fn width(&self) -> usize {
        match self {
            Self::Expr { .. } => 1,
            Self::Entity(relation) => relation.columns().len(),
        }
    }

    fn is_aggregate(&self) -> bool {
        match self {
            Self::Expr { node, .. } => node.is_aggregate(),
            Self::Entity(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Where NULLs sort. `Default` leaves it to SQLite, which treats NULL as
/// the smallest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullPlacement {
    #[default]
    Default,
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    expr: ExprNode,
    direction: Direction,
    nulls: NullPlacement,
}

impl OrderSpec {
    pub fn new(expr: ExprNode, direction: Direction) -> Self {
        Self {
            expr,
            direction,
            nulls: NullPlacement::Default,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullPlacement::First;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullPlacement::Last;
        self
    }

    pub fn expr(&self) -> &ExprNode {
        &self.expr
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn nulls(&self) -> NullPlacement {
        self.nulls
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// Origin of a join condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSource {
    /// Condition derived from a declared foreign key.
    Association,
    /// Condition supplied only through `on`.
    Unrelated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub(crate) relation: RelationRef,
    pub(crate) kind: JoinKind,
    pub(crate) source: JoinSource,
    pub(crate) on: Option<Predicate>,
    pub(crate) fetch: bool,
}

impl JoinClause {
    pub fn relation(&self) -> &RelationRef {
        &self.relation
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn source(&self) -> JoinSource {
        self.source
    }

    pub fn on(&self) -> Option<&Predicate> {
        self.on.as_ref()
    }

    pub fn is_fetch(&self) -> bool {
        self.fetch
    }
}

/// Ordered state accumulated by a `QueryBuilder`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub(crate) select: Vec<SelectItem>,
    pub(crate) sources: Vec<RelationRef>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) filter: Option<Predicate>,
    pub(crate) group_by: Vec<ExprNode>,
    pub(crate) having: Option<Predicate>,
    pub(crate) order_by: Vec<OrderSpec>,
    pub(crate) offset: u64,
    pub(crate) limit: Option<u64>,
    pub(crate) fault: Option<BuildError>,
}

impl QuerySpec {
    pub fn select_items(&self) -> &[SelectItem] {
        &self.select
    }

    pub fn sources(&self) -> &[RelationRef] {
        &self.sources
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn filter(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    pub fn group_by(&self) -> &[ExprNode] {
        &self.group_by
    }

    pub fn having(&self) -> Option<&Predicate> {
        self.having.as_ref()
    }

    pub fn order_by(&self) -> &[OrderSpec] {
        &self.order_by
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Every select item is an aggregate and nothing is grouped: the
    /// statement yields exactly one row and paging does not apply.
    pub fn is_aggregate_only(&self) -> bool {
        self.group_by.is_empty()
            && !self.select.is_empty()
            && self.select.iter().all(SelectItem::is_aggregate)
    }

    /// Relations visible to expressions of this query, sources first.
    pub(crate) fn relations(&self) -> impl Iterator<Item = &RelationRef> {
        self.sources
            .iter()
            .chain(self.joins.iter().map(|join| &join.relation))
    }

    /// Shape checks that need no schema or scope information.
    pub fn validate_structure(&self) -> BuildResult<()> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        if self.select.is_empty() {
            return Err(BuildError::MissingSelect);
        }
        if self.sources.is_empty() {
            return Err(BuildError::MissingSource);
        }
        if self.limit == Some(0) {
            return Err(BuildError::InvalidLimit);
        }
        if self.having.is_some() && self.group_by.is_empty() {
            return Err(BuildError::HavingWithoutGroupBy);
        }
        if let Some(join) = self.joins.iter().find(|join| join.on.is_none()) {
            return Err(BuildError::MissingJoinCondition {
                alias: join.relation.alias().to_string(),
            });
        }

        let mut seen = HashSet::new();
        for relation in self.relations() {
            if !seen.insert(relation.alias()) {
                return Err(BuildError::DuplicateAlias {
                    alias: relation.alias().to_string(),
                });
            }
        }
        Ok(())
    }
}
