//! Entity metadata and aliased relation handles.
//!
//! # Responsibility
//! - Describe the columns of a mapped table so queries can be validated
//!   before dispatch.
//! - Provide `EntityPath<E>`, the aliased handle used as a query source.
//!
//! # Invariants
//! - `Entity::COLUMNS` order is the order used for full-entity selects and
//!   for `Entity::from_values`.
//! - The first declared column is the identifier column.

use crate::expr::{Expr, ExprNode};
use crate::model::value::{Int, SqlType, Value, ValueKind};
use crate::predicate::{CompareOp, Predicate};
use crate::projection::ProjectionResult;
use crate::query::SelectItem;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// Declared column of a mapped table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Mapped row type.
///
/// The ORM layer proper lives outside this crate; an `Entity` only needs to
/// describe its table and decode a contiguous slice of selected values.
pub trait Entity: Sized {
    const TABLE: &'static str;
    const COLUMNS: &'static [ColumnDef];

    /// Decodes one entity from values laid out in `COLUMNS` order.
    fn from_values(values: &[Value]) -> ProjectionResult<Self>;

    /// Receives an associated relation loaded by a fetch join.
    ///
    /// The default ignores the association.
    fn attach(&mut self, _relation: &RelationRef, _values: &[Value]) -> ProjectionResult<()> {
        Ok(())
    }
}

/// Table reference with the alias it is known by inside one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRef {
    table: &'static str,
    alias: String,
    columns: &'static [ColumnDef],
}

impl RelationRef {
    pub fn new(table: &'static str, alias: impl Into<String>, columns: &'static [ColumnDef]) -> Self {
        Self {
            table,
            alias: alias.into(),
            columns,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        self.columns
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// Aliased handle to an entity's relation.
pub struct EntityPath<E> {
    relation: RelationRef,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityPath<E> {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            relation: RelationRef::new(E::TABLE, alias, E::COLUMNS),
            _entity: PhantomData,
        }
    }

    pub fn relation(&self) -> &RelationRef {
        &self.relation
    }

    pub fn alias(&self) -> &str {
        self.relation.alias()
    }

    /// Typed reference to a column of this relation.
    ///
    /// Existence and declared kind are checked when the query is compiled.
    pub fn column<T: SqlType>(&self, name: &str) -> Expr<T> {
        Expr::from_node(ExprNode::Column {
            relation: self.relation.alias.clone(),
            name: name.to_string(),
            kind: T::KIND,
        })
    }

    /// `count(<identifier>)` over this relation.
    pub fn count(&self) -> Expr<Int> {
        let id = E::COLUMNS.first().map_or("id", |column| column.name);
        self.column::<Int>(id).count()
    }

    /// Full-entity select item.
    pub fn item(&self) -> SelectItem {
        SelectItem::Entity(self.relation.clone())
    }
}

impl<E> Clone for EntityPath<E> {
    fn clone(&self) -> Self {
        Self {
            relation: self.relation.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> Debug for EntityPath<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityPath")
            .field("table", &self.relation.table)
            .field("alias", &self.relation.alias)
            .finish()
    }
}

/// Declared foreign-key relationship used to derive a join condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    target: RelationRef,
    condition: Predicate,
}

impl Association {
    /// Relates `local` (a foreign-key column) to `target.remote_column`.
    pub fn new<T: SqlType, J: Entity>(
        local: &Expr<T>,
        target: &EntityPath<J>,
        remote_column: &str,
    ) -> Self {
        let remote = target.column::<T>(remote_column);
        Self {
            target: target.relation().clone(),
            condition: Predicate::Compare {
                lhs: local.node().clone(),
                op: CompareOp::Eq,
                rhs: remote.into_node(),
            },
        }
    }

    pub fn target(&self) -> &RelationRef {
        &self.target
    }

    pub fn condition(&self) -> &Predicate {
        &self.condition
    }

    pub(crate) fn into_parts(self) -> (RelationRef, Predicate) {
        (self.target, self.condition)
    }
}
