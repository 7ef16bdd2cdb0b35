//! Caller-defined output shapes filled by field, setter or constructor
//! assignment.
//!
//! All three strategies resolve bindings the same way, so a shape that
//! supports more than one of them is filled identically by each.

use super::{
    decode_member, Projection, ProjectionError, ProjectionResult, ResultRow, TupleProjection,
};
use crate::model::value::{FromValue, Value, ValueKind};
use crate::query::SelectItem;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// Named output type.
pub trait Shape: Sized {
    const NAME: &'static str;
}

/// Declared member of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberDef {
    pub name: &'static str,
    pub kind: ValueKind,
}

impl MemberDef {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self { name, kind }
    }
}

/// Shape whose public members are assigned directly by name.
pub trait FieldShape: Shape + Default {
    const FIELDS: &'static [MemberDef];

    fn assign_field(&mut self, name: &str, value: &Value) -> ProjectionResult<()>;
}

/// Setter invoked with the member's value.
pub type Setter<S> = fn(&mut S, &Value) -> ProjectionResult<()>;

/// Shape populated through per-member setters.
pub trait SetterShape: Shape + Default {
    fn setter(name: &str) -> Option<(ValueKind, Setter<Self>)>;
}

/// Shape built in one call from positional arguments.
pub trait ConstructorShape: Shape {
    const PARAMETERS: &'static [ValueKind];

    fn construct(args: &[Value]) -> ProjectionResult<Self>;
}

/// One binding resolved against a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBinding<'a> {
    pub index: usize,
    /// Alias, or column name of an unaliased column reference.
    pub name: Option<&'a str>,
    pub kind: ValueKind,
    pub value: &'a Value,
}

impl<'a> ResolvedBinding<'a> {
    fn require_name(&self) -> ProjectionResult<&'a str> {
        self.name
            .ok_or(ProjectionError::UnnamedBinding { index: self.index })
    }
}

fn binding_kinds(items: &[SelectItem]) -> ProjectionResult<Vec<(Option<&str>, ValueKind)>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            SelectItem::Expr { node, kind } => Ok((node.member_name(), *kind)),
            SelectItem::Entity(_) => Err(ProjectionError::EntityBinding { index }),
        })
        .collect()
}

/// Pairs every select item of `row` with its member name and value.
pub fn resolve_bindings(row: &ResultRow) -> ProjectionResult<Vec<ResolvedBinding<'_>>> {
    row.items()
        .enumerate()
        .map(|(index, (item, values))| match item {
            SelectItem::Expr { node, kind } => {
                let value = values.first().ok_or_else(|| ProjectionError::MissingSlot {
                    target: format!("binding {index}"),
                })?;
                Ok(ResolvedBinding {
                    index,
                    name: node.member_name(),
                    kind: *kind,
                    value,
                })
            }
            SelectItem::Entity(_) => Err(ProjectionError::EntityBinding { index }),
        })
        .collect()
}

fn check_kind(member: &str, expected: ValueKind, found: ValueKind) -> ProjectionResult<()> {
    if expected.accepts(found) {
        Ok(())
    } else {
        Err(ProjectionError::KindMismatch {
            member: member.to_string(),
            expected,
            found,
        })
    }
}

/// How a shape is populated from resolved bindings.
pub trait AssignStrategy<S> {
    fn validate(items: &[SelectItem]) -> ProjectionResult<()>;

    fn assemble(bindings: &[ResolvedBinding<'_>]) -> ProjectionResult<S>;
}

/// Direct member assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldAssign;

/// Assignment through setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetterAssign;

/// Positional construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstructorAssign;

impl<S: FieldShape> AssignStrategy<S> for FieldAssign {
    fn validate(items: &[SelectItem]) -> ProjectionResult<()> {
        for (index, (name, kind)) in binding_kinds(items)?.into_iter().enumerate() {
            let name = name.ok_or(ProjectionError::UnnamedBinding { index })?;
            let field = S::FIELDS
                .iter()
                .find(|field| field.name == name)
                .ok_or_else(|| ProjectionError::UnknownMember {
                    shape: S::NAME,
                    member: name.to_string(),
                })?;
            check_kind(name, field.kind, kind)?;
        }
        Ok(())
    }

    fn assemble(bindings: &[ResolvedBinding<'_>]) -> ProjectionResult<S> {
        let mut shape = S::default();
        for binding in bindings {
            shape.assign_field(binding.require_name()?, binding.value)?;
        }
        Ok(shape)
    }
}

impl<S: SetterShape> AssignStrategy<S> for SetterAssign {
    fn validate(items: &[SelectItem]) -> ProjectionResult<()> {
        for (index, (name, kind)) in binding_kinds(items)?.into_iter().enumerate() {
            let name = name.ok_or(ProjectionError::UnnamedBinding { index })?;
            let (expected, _) = S::setter(name).ok_or_else(|| ProjectionError::UnknownMember {
                shape: S::NAME,
                member: name.to_string(),
            })?;
            check_kind(name, expected, kind)?;
        }
        Ok(())
    }

    fn assemble(bindings: &[ResolvedBinding<'_>]) -> ProjectionResult<S> {
        let mut shape = S::default();
        for binding in bindings {
            let name = binding.require_name()?;
            let (_, set) = S::setter(name).ok_or_else(|| ProjectionError::UnknownMember {
                shape: S::NAME,
                member: name.to_string(),
            })?;
            set(&mut shape, binding.value)?;
        }
        Ok(shape)
    }
}

impl<S: ConstructorShape> AssignStrategy<S> for ConstructorAssign {
    fn validate(items: &[SelectItem]) -> ProjectionResult<()> {
        let kinds = binding_kinds(items)?;
        if kinds.len() != S::PARAMETERS.len() {
            return Err(ProjectionError::ArityMismatch {
                expected: S::PARAMETERS.len(),
                found: kinds.len(),
            });
        }
        for (index, ((_, found), expected)) in kinds.iter().zip(S::PARAMETERS).enumerate() {
            check_kind(&format!("{}#{index}", S::NAME), *expected, *found)?;
        }
        Ok(())
    }

    fn assemble(bindings: &[ResolvedBinding<'_>]) -> ProjectionResult<S> {
        if bindings.len() != S::PARAMETERS.len() {
            return Err(ProjectionError::ArityMismatch {
                expected: S::PARAMETERS.len(),
                found: bindings.len(),
            });
        }
        let args: Vec<Value> = bindings.iter().map(|binding| binding.value.clone()).collect();
        S::construct(&args)
    }
}

/// Ordered bindings mapped into shape `S` with strategy `A`.
pub struct ShapeProjection<S, A> {
    bindings: Vec<SelectItem>,
    _shape: PhantomData<fn() -> (S, A)>,
}

impl<S, A> ShapeProjection<S, A> {
    pub fn new(bindings: impl IntoIterator<Item = SelectItem>) -> Self {
        Self {
            bindings: bindings.into_iter().collect(),
            _shape: PhantomData,
        }
    }

    pub fn bindings(&self) -> &[SelectItem] {
        &self.bindings
    }
}

impl<S, A> Clone for ShapeProjection<S, A> {
    fn clone(&self) -> Self {
        Self {
            bindings: self.bindings.clone(),
            _shape: PhantomData,
        }
    }
}

impl<S, A> Debug for ShapeProjection<S, A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeProjection")
            .field("shape", &std::any::type_name::<S>())
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl<S: Shape, A: AssignStrategy<S>> Projection for ShapeProjection<S, A> {
    type Output = S;

    fn select_items(&self) -> Vec<SelectItem> {
        self.bindings.clone()
    }

    fn validate(&self) -> ProjectionResult<()> {
        A::validate(&self.bindings)
    }

    fn map_row(&self, row: &ResultRow) -> ProjectionResult<Self::Output> {
        A::assemble(&resolve_bindings(row)?)
    }
}

/// Entry points for building projections.
pub struct Projections;

impl Projections {
    pub fn tuple(items: impl IntoIterator<Item = SelectItem>) -> TupleProjection {
        TupleProjection::new(items)
    }

    /// Fills `S` by assigning members directly.
    pub fn fields<S: FieldShape>(
        bindings: impl IntoIterator<Item = SelectItem>,
    ) -> ShapeProjection<S, FieldAssign> {
        ShapeProjection::new(bindings)
    }

    /// Fills `S` through its setters.
    pub fn bean<S: SetterShape>(
        bindings: impl IntoIterator<Item = SelectItem>,
    ) -> ShapeProjection<S, SetterAssign> {
        ShapeProjection::new(bindings)
    }

    /// Builds `S` from positional arguments.
    pub fn constructor<S: ConstructorShape>(
        bindings: impl IntoIterator<Item = SelectItem>,
    ) -> ShapeProjection<S, ConstructorAssign> {
        ShapeProjection::new(bindings)
    }
}

/// Reads a member that must not be NULL.
pub fn decode_required<T: FromValue>(member: &str, value: &Value) -> ProjectionResult<T> {
    if value.is_null() {
        return Err(ProjectionError::UnexpectedNull {
            member: member.to_string(),
        });
    }
    decode_member(member, value)
}
