//! Result-row projection.
//!
//! # Responsibility
//! - Describe which select items a projection needs (`select_items`).
//! - Convert one returned row into the caller's output type (`map_row`).
//!
//! # Invariants
//! - Rows are laid out in select-item order, followed by the columns of
//!   fetch-joined relations.
//! - A projection never reads past its own slots; mismatches surface as
//!   `ProjectionError`, never as a panic.

use crate::expr::{Expr, ExprNode};
use crate::model::entity::{Entity, EntityPath, RelationRef};
use crate::model::value::{FromValue, SqlType, Value, ValueError, ValueKind};
use crate::query::SelectItem;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod shape;

pub use shape::{
    decode_required, resolve_bindings, AssignStrategy, ConstructorAssign, ConstructorShape,
    FieldAssign, FieldShape, MemberDef, Projections, ResolvedBinding, Setter, SetterAssign,
    SetterShape, Shape, ShapeProjection,
};

pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Disagreement between a projection and the row it is asked to map.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionError {
    ArityMismatch {
        expected: usize,
        found: usize,
    },
    KindMismatch {
        member: String,
        expected: ValueKind,
        found: ValueKind,
    },
    UnknownMember {
        shape: &'static str,
        member: String,
    },
    /// Field and setter strategies need a name for every binding.
    UnnamedBinding {
        index: usize,
    },
    UnexpectedNull {
        member: String,
    },
    Value {
        member: String,
        source: ValueError,
    },
    MissingSlot {
        target: String,
    },
    NotAnEntity {
        index: usize,
    },
    /// Shapes bind scalar expressions only.
    EntityBinding {
        index: usize,
    },
}

impl Display for ProjectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArityMismatch { expected, found } => {
                write!(f, "expected {expected} values, found {found}")
            }
            Self::KindMismatch {
                member,
                expected,
                found,
            } => write!(f, "member `{member}` expects {expected}, binding yields {found}"),
            Self::UnknownMember { shape, member } => {
                write!(f, "shape `{shape}` has no member `{member}`")
            }
            Self::UnnamedBinding { index } => {
                write!(f, "binding {index} has neither an alias nor a column name")
            }
            Self::UnexpectedNull { member } => write!(f, "`{member}` is null"),
            Self::Value { member, source } => write!(f, "cannot read `{member}`: {source}"),
            Self::MissingSlot { target } => write!(f, "row has no slot for `{target}`"),
            Self::NotAnEntity { index } => write!(f, "select item {index} is not an entity"),
            Self::EntityBinding { index } => {
                write!(f, "binding {index} selects a whole entity; bind its columns instead")
            }
        }
    }
}

impl Error for ProjectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Value { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Reads `value` as `T`, naming `member` on failure.
pub fn decode_member<T: FromValue>(member: &str, value: &Value) -> ProjectionResult<T> {
    T::from_value(value).map_err(|source| ProjectionError::Value {
        member: member.to_string(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    item: SelectItem,
    start: usize,
    fetched: bool,
}

/// Column layout shared by every row of one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    slots: Vec<Slot>,
    width: usize,
}

impl RowLayout {
    /// Select items first, then one entity slot per fetch-joined relation.
    pub fn new(items: &[SelectItem], fetched: &[RelationRef]) -> Self {
        let mut slots = Vec::with_capacity(items.len() + fetched.len());
        let mut start = 0;
        let entries = items
            .iter()
            .cloned()
            .map(|item| (item, false))
            .chain(fetched.iter().cloned().map(|relation| (SelectItem::Entity(relation), true)));
        for (item, is_fetched) in entries {
            let width = item.width();
            slots.push(Slot {
                item,
                start,
                fetched: is_fetched,
            });
            start += width;
        }
        Self {
            slots,
            width: start,
        }
    }

    /// Total number of result columns.
    pub fn width(&self) -> usize {
        self.width
    }
}

/// One returned row plus the layout needed to address it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    layout: Arc<RowLayout>,
    values: Vec<Value>,
}

impl ResultRow {
    pub fn new(layout: Arc<RowLayout>, values: Vec<Value>) -> ProjectionResult<Self> {
        if values.len() != layout.width {
            return Err(ProjectionError::ArityMismatch {
                expected: layout.width,
                found: values.len(),
            });
        }
        Ok(Self { layout, values })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn slot_values(&self, slot: &Slot) -> &[Value] {
        &self.values[slot.start..slot.start + slot.item.width()]
    }

    fn selected(&self) -> impl Iterator<Item = &Slot> {
        self.layout.slots.iter().filter(|slot| !slot.fetched)
    }

    /// Values of the `index`-th select item.
    pub fn item(&self, index: usize) -> Option<(&SelectItem, &[Value])> {
        self.selected()
            .nth(index)
            .map(|slot| (&slot.item, self.slot_values(slot)))
    }

    /// Select items with their values, in select order.
    pub fn items(&self) -> impl Iterator<Item = (&SelectItem, &[Value])> {
        self.selected().map(|slot| (&slot.item, self.slot_values(slot)))
    }

    /// Value selected for `node`, matched structurally. An aliased item
    /// also answers for its unaliased expression.
    pub fn value_of(&self, node: &ExprNode) -> Option<&Value> {
        let exact = self.items().find_map(|(item, values)| match item {
            SelectItem::Expr { node: selected, .. } if selected == node => values.first(),
            _ => None,
        });
        exact.or_else(|| {
            self.items().find_map(|(item, values)| match item {
                SelectItem::Expr {
                    node: ExprNode::Alias { inner, .. },
                    ..
                } if inner.as_ref() == node => values.first(),
                _ => None,
            })
        })
    }

    pub fn value_by_alias(&self, alias: &str) -> Option<&Value> {
        self.items().find_map(|(item, values)| match item {
            SelectItem::Expr {
                node: ExprNode::Alias { alias: name, .. },
                ..
            } if name == alias => values.first(),
            _ => None,
        })
    }

    /// Columns of the entity selected or fetched under `alias`.
    pub fn entity_values(&self, alias: &str) -> Option<&[Value]> {
        self.layout.slots.iter().find_map(|slot| match &slot.item {
            SelectItem::Entity(relation) if relation.alias() == alias => {
                Some(self.slot_values(slot))
            }
            _ => None,
        })
    }

    /// Fetch-joined relations with their columns.
    pub fn fetched(&self) -> impl Iterator<Item = (&RelationRef, &[Value])> {
        self.layout
            .slots
            .iter()
            .filter(|slot| slot.fetched)
            .filter_map(|slot| match &slot.item {
                SelectItem::Entity(relation) => Some((relation, self.slot_values(slot))),
                SelectItem::Expr { .. } => None,
            })
    }
}

/// Maps result rows into an output type.
pub trait Projection {
    type Output;

    /// Select items this projection reads, in order.
    fn select_items(&self) -> Vec<SelectItem>;

    /// Static checks run before the statement is dispatched.
    fn validate(&self) -> ProjectionResult<()> {
        Ok(())
    }

    fn map_row(&self, row: &ResultRow) -> ProjectionResult<Self::Output>;
}

fn describe(node: &ExprNode, index: usize) -> String {
    node.member_name()
        .map_or_else(|| format!("select item {index}"), ToString::to_string)
}

fn scalar_at(row: &ResultRow, index: usize) -> ProjectionResult<(String, &Value)> {
    match row.item(index) {
        Some((SelectItem::Expr { node, .. }, values)) => {
            let value = values.first().ok_or_else(|| ProjectionError::MissingSlot {
                target: describe(node, index),
            })?;
            Ok((describe(node, index), value))
        }
        Some((SelectItem::Entity(_), _)) => Err(ProjectionError::EntityBinding { index }),
        None => Err(ProjectionError::MissingSlot {
            target: format!("select item {index}"),
        }),
    }
}

/// Single non-null scalar; a NULL result is an error.
impl<T: SqlType> Projection for Expr<T> {
    type Output = T::Native;

    fn select_items(&self) -> Vec<SelectItem> {
        vec![self.item()]
    }

    fn map_row(&self, row: &ResultRow) -> ProjectionResult<Self::Output> {
        let (member, value) = scalar_at(row, 0)?;
        if value.is_null() {
            return Err(ProjectionError::UnexpectedNull { member });
        }
        decode_member(&member, value)
    }
}

/// Single scalar read as `Option`.
pub struct Nullable<T> {
    expr: Expr<T>,
}

impl<T: SqlType> Nullable<T> {
    pub fn new(expr: Expr<T>) -> Self {
        Self { expr }
    }

    pub fn expr(&self) -> &Expr<T> {
        &self.expr
    }
}

impl<T> Clone for Nullable<T> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Nullable<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Nullable").field(&self.expr).finish()
    }
}

impl<T: SqlType> Projection for Nullable<T> {
    type Output = Option<T::Native>;

    fn select_items(&self) -> Vec<SelectItem> {
        vec![self.expr.item()]
    }

    fn map_row(&self, row: &ResultRow) -> ProjectionResult<Self::Output> {
        let (member, value) = scalar_at(row, 0)?;
        decode_member(&member, value)
    }
}

/// Whole entity, with fetch-joined associations attached.
impl<E: Entity> Projection for EntityPath<E> {
    type Output = E;

    fn select_items(&self) -> Vec<SelectItem> {
        vec![self.item()]
    }

    fn map_row(&self, row: &ResultRow) -> ProjectionResult<Self::Output> {
        let values = match row.item(0) {
            Some((SelectItem::Entity(_), values)) => values,
            Some((SelectItem::Expr { .. }, _)) => {
                return Err(ProjectionError::NotAnEntity { index: 0 })
            }
            None => {
                return Err(ProjectionError::MissingSlot {
                    target: self.alias().to_string(),
                })
            }
        };
        let mut entity = E::from_values(values)?;
        for (relation, fetched) in row.fetched() {
            entity.attach(relation, fetched)?;
        }
        Ok(entity)
    }
}

/// Heterogeneous select list read back as a [`Tuple`].
#[derive(Debug, Clone, PartialEq)]
pub struct TupleProjection {
    items: Vec<SelectItem>,
}

impl TupleProjection {
    pub fn new(items: impl IntoIterator<Item = SelectItem>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

impl Projection for TupleProjection {
    type Output = Tuple;

    fn select_items(&self) -> Vec<SelectItem> {
        self.items.clone()
    }

    fn map_row(&self, row: &ResultRow) -> ProjectionResult<Self::Output> {
        Ok(Tuple { row: row.clone() })
    }
}

/// Row addressed by originating expression, alias or entity path.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    row: ResultRow,
}

impl Tuple {
    /// Value selected for `expr`; `None` when it is NULL.
    pub fn get<T: SqlType>(&self, expr: &Expr<T>) -> ProjectionResult<Option<T::Native>> {
        let member = expr.node().member_name().unwrap_or("expression").to_string();
        let value = self
            .row
            .value_of(expr.node())
            .ok_or_else(|| ProjectionError::MissingSlot {
                target: member.clone(),
            })?;
        decode_member(&member, value)
    }

    /// Value selected under `alias`.
    pub fn get_alias<V: FromValue>(&self, alias: &str) -> ProjectionResult<V> {
        let value = self
            .row
            .value_by_alias(alias)
            .ok_or_else(|| ProjectionError::MissingSlot {
                target: alias.to_string(),
            })?;
        decode_member(alias, value)
    }

    /// Entity selected (or fetched) under `path`'s alias.
    pub fn entity<E: Entity>(&self, path: &EntityPath<E>) -> ProjectionResult<E> {
        let values = self
            .row
            .entity_values(path.alias())
            .ok_or_else(|| ProjectionError::MissingSlot {
                target: path.alias().to_string(),
            })?;
        E::from_values(values)
    }

    pub fn values(&self) -> &[Value] {
        self.row.values()
    }

    pub fn len(&self) -> usize {
        self.row.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.row.values().is_empty()
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (index, value) in self.row.values().iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}
