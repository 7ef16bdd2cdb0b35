//! Fluent single-owner query builder.

use super::spec::{JoinClause, JoinKind, JoinSource, OrderSpec, QuerySpec};
use super::{BuildError, BuildResult};
use crate::db::StoreAdapter;
use crate::engine::{Engine, EngineResult, Page};
use crate::expr::Expr;
use crate::model::entity::{Association, Entity, EntityPath, RelationRef};
use crate::model::value::SqlType;
use crate::predicate::{self, IntoCondition, Predicate};
use crate::projection::Projection;

/// Lifecycle position of a builder.
///
/// `Finalized` is not a variant: finalizing consumes the builder and
/// yields a [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// No source relation yet.
    Empty,
    /// Sources only (plus the implied select of `select_from`).
    Sourced,
    /// Sources plus at least one shaping call.
    Shaped,
}

/// Relation to join, with its condition when derived from an association.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTarget {
    relation: RelationRef,
    source: JoinSource,
    condition: Option<Predicate>,
}

impl<E: Entity> From<&EntityPath<E>> for JoinTarget {
    fn from(path: &EntityPath<E>) -> Self {
        Self {
            relation: path.relation().clone(),
            source: JoinSource::Unrelated,
            condition: None,
        }
    }
}

impl From<Association> for JoinTarget {
    fn from(association: Association) -> Self {
        let (relation, condition) = association.into_parts();
        Self {
            relation,
            source: JoinSource::Association,
            condition: Some(condition),
        }
    }
}

/// Accumulates a `QuerySpec` whose rows are mapped by projection `P`.
#[derive(Debug, Clone)]
pub struct QueryBuilder<P> {
    projection: P,
    spec: QuerySpec,
    shaped: bool,
}

impl<P: Projection> QueryBuilder<P> {
    /// Starts a query selecting `projection`; sources follow with `from`.
    pub fn select(projection: P) -> Self {
        let spec = QuerySpec {
            select: projection.select_items(),
            ..QuerySpec::default()
        };
        Self {
            projection,
            spec,
            shaped: true,
        }
    }

    pub fn state(&self) -> BuilderState {
        if self.spec.sources.is_empty() {
            BuilderState::Empty
        } else if self.shaped {
            BuilderState::Shaped
        } else {
            BuilderState::Sourced
        }
    }

    /// Read-only view of the accumulated state.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    fn fault(&mut self, fault: BuildError) {
        if self.spec.fault.is_none() {
            self.spec.fault = Some(fault);
        }
    }

    fn shape(mut self) -> Self {
        self.shaped = true;
        self
    }

    /// Adds a source relation; several sources form a theta join.
    pub fn from<E: Entity>(mut self, path: &EntityPath<E>) -> Self {
        self.spec.sources.push(path.relation().clone());
        self
    }

    fn push_join(mut self, target: JoinTarget, kind: JoinKind) -> Self {
        self.spec.joins.push(JoinClause {
            relation: target.relation,
            kind,
            source: target.source,
            on: target.condition,
            fetch: false,
        });
        self.shape()
    }

    /// Inner join.
    pub fn join(self, target: impl Into<JoinTarget>) -> Self {
        self.push_join(target.into(), JoinKind::Inner)
    }

    pub fn inner_join(self, target: impl Into<JoinTarget>) -> Self {
        self.push_join(target.into(), JoinKind::Inner)
    }

    pub fn left_join(self, target: impl Into<JoinTarget>) -> Self {
        self.push_join(target.into(), JoinKind::Left)
    }

    /// Adds `condition` to the most recent join's `ON` clause.
    pub fn on(mut self, condition: impl IntoCondition) -> Self {
        match self.spec.joins.last_mut() {
            Some(join) => {
                join.on = predicate::and([join.on.take(), condition.into_condition()]);
            }
            None => self.fault(BuildError::OnWithoutJoin),
        }
        self.shape()
    }

    /// Loads the most recent join's relation together with the primary row.
    pub fn fetch_join(mut self) -> Self {
        match self.spec.joins.last_mut() {
            Some(join) => join.fetch = true,
            None => self.fault(BuildError::FetchWithoutJoin),
        }
        self.shape()
    }

    /// ANDs `condition` into the `WHERE` clause; absent is a no-op.
    pub fn filter(mut self, condition: impl IntoCondition) -> Self {
        self.spec.filter = predicate::and([self.spec.filter.take(), condition.into_condition()]);
        self.shape()
    }

    /// ANDs every present condition into the `WHERE` clause.
    pub fn filter_all<C: IntoCondition>(mut self, conditions: impl IntoIterator<Item = C>) -> Self {
        let combined = predicate::and(conditions);
        self.spec.filter = predicate::and([self.spec.filter.take(), combined]);
        self.shape()
    }

    pub fn group_by<T: SqlType>(mut self, expr: &Expr<T>) -> Self {
        self.spec.group_by.push(expr.arg());
        self.shape()
    }

    pub fn having(mut self, condition: impl IntoCondition) -> Self {
        self.spec.having = predicate::and([self.spec.having.take(), condition.into_condition()]);
        self.shape()
    }

    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.spec.order_by.push(order);
        self.shape()
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.spec.offset = offset;
        self.shape()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        if limit == 0 {
            self.fault(BuildError::InvalidLimit);
        }
        self.spec.limit = Some(limit);
        self.shape()
    }

    /// Finalizes the builder into a read-only query.
    pub fn build(self) -> BuildResult<Query<P>> {
        self.spec.validate_structure()?;
        Ok(Query {
            projection: self.projection,
            spec: self.spec,
        })
    }

    pub(crate) fn into_spec(self) -> QuerySpec {
        self.spec
    }

    pub fn fetch<S: StoreAdapter>(self, engine: &Engine<S>) -> EngineResult<Vec<P::Output>> {
        engine.fetch_list(&self.build()?)
    }

    pub fn fetch_one<S: StoreAdapter>(self, engine: &Engine<S>) -> EngineResult<Option<P::Output>> {
        engine.fetch_one(&self.build()?)
    }

    pub fn fetch_first<S: StoreAdapter>(
        self,
        engine: &Engine<S>,
    ) -> EngineResult<Option<P::Output>> {
        engine.fetch_first(&self.build()?)
    }

    pub fn fetch_page<S: StoreAdapter>(self, engine: &Engine<S>) -> EngineResult<Page<P::Output>> {
        engine.fetch_page(&self.build()?)
    }

    pub fn fetch_count<S: StoreAdapter>(self, engine: &Engine<S>) -> EngineResult<u64> {
        engine.fetch_count(&self.build()?)
    }
}

impl<E: Entity> QueryBuilder<EntityPath<E>> {
    /// `select(path).from(path)`.
    pub fn select_from(path: &EntityPath<E>) -> Self {
        let mut builder = Self::select(path.clone()).from(path);
        builder.shaped = false;
        builder
    }
}

/// Finalized, read-only query.
#[derive(Debug, Clone)]
pub struct Query<P> {
    projection: P,
    spec: QuerySpec,
}

impl<P> Query<P> {
    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::{BuilderState, QueryBuilder};
    use crate::demo::{QMember, QTeam};
    use crate::predicate::Predicate;
    use crate::query::{BuildError, JoinSource};

    #[test]
    fn state_follows_source_then_shape() {
        let member = QMember::default();
        let builder = QueryBuilder::select(member.username.clone());
        assert_eq!(builder.state(), BuilderState::Empty);
        let builder = builder.from(&member.entity);
        assert_eq!(builder.state(), BuilderState::Shaped);

        let builder = QueryBuilder::select_from(&member.entity);
        assert_eq!(builder.state(), BuilderState::Sourced);
        let builder = builder.filter(member.age.gt(10));
        assert_eq!(builder.state(), BuilderState::Shaped);
    }

    #[test]
    fn on_and_fetch_require_a_join() {
        let member = QMember::default();
        let err = QueryBuilder::select_from(&member.entity)
            .on(member.age.gt(1))
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::OnWithoutJoin);

        let err = QueryBuilder::select_from(&member.entity)
            .fetch_join()
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::FetchWithoutJoin);
    }

    #[test]
    fn unrelated_join_needs_on_condition() {
        let member = QMember::default();
        let team = QTeam::default();
        let err = QueryBuilder::select_from(&member.entity)
            .left_join(&team.entity)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingJoinCondition {
                alias: "team".to_string()
            }
        );

        let query = QueryBuilder::select_from(&member.entity)
            .left_join(&team.entity)
            .on(member.username.eq(team.name.clone()))
            .build()
            .unwrap();
        assert_eq!(query.spec().joins()[0].source(), JoinSource::Unrelated);
    }

    #[test]
    fn association_on_clause_is_extended() {
        let member = QMember::default();
        let team = QTeam::default();
        let query = QueryBuilder::select_from(&member.entity)
            .left_join(member.team(&team))
            .on(team.name.eq("teamA"))
            .build()
            .unwrap();
        assert!(matches!(query.spec().joins()[0].on(), Some(Predicate::And(parts)) if parts.len() == 2));
    }

    #[test]
    fn absent_filters_leave_where_empty() {
        let member = QMember::default();
        let query = QueryBuilder::select_from(&member.entity)
            .filter_all([None::<Predicate>, None])
            .build()
            .unwrap();
        assert!(query.spec().filter().is_none());
    }

    #[test]
    fn zero_limit_and_lone_having_fault() {
        let member = QMember::default();
        let err = QueryBuilder::select_from(&member.entity)
            .limit(0)
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::InvalidLimit);

        let err = QueryBuilder::select(member.age.sum())
            .from(&member.entity)
            .having(member.age.sum().gt(10))
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::HavingWithoutGroupBy);
    }
}
