//! Boolean predicate algebra.
//!
//! # Responsibility
//! - Represent filter/having/join conditions as an immutable tree.
//! - Combine optional conditions so that absent operands are identities.
//!
//! # Invariants
//! - Combining flattens nested `And`/`Or` of the same kind.
//! - A combination of one condition is that condition; of none is `None`
//!   (unconstrained), which the compiler renders as no clause at all.

use crate::expr::{Expr, ExprNode};
use crate::model::value::Bool;
use crate::projection::Projection;
use crate::query::{QueryBuilder, QuerySpec};
use std::ops::{BitAnd, BitOr, Not};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

/// Boolean condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        lhs: ExprNode,
        op: CompareOp,
        rhs: ExprNode,
    },
    Between {
        expr: ExprNode,
        low: ExprNode,
        high: ExprNode,
    },
    /// An empty `values` list never matches (`NOT IN ()` always does).
    InList {
        expr: ExprNode,
        values: Vec<ExprNode>,
        negated: bool,
    },
    InQuery {
        expr: ExprNode,
        query: Box<QuerySpec>,
        negated: bool,
    },
    Exists {
        query: Box<QuerySpec>,
        negated: bool,
    },
    IsNull {
        expr: ExprNode,
        negated: bool,
    },
    Like {
        expr: ExprNode,
        pattern: ExprNode,
    },
    IsTrue(ExprNode),
}

#[derive(Clone, Copy)]
enum Junction {
    And,
    Or,
}

fn combine(junction: Junction, parts: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
    let mut flat = Vec::new();
    for part in parts {
        match (junction, part) {
            (Junction::And, Predicate::And(inner)) | (Junction::Or, Predicate::Or(inner)) => {
                flat.extend(inner);
            }
            (_, other) => flat.push(other),
        }
    }
    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ => Some(match junction {
            Junction::And => Predicate::And(flat),
            Junction::Or => Predicate::Or(flat),
        }),
    }
}

impl Predicate {
    /// `self AND other`; an absent `other` leaves `self` unchanged.
    pub fn and(self, other: impl IntoCondition) -> Predicate {
        match combine(Junction::And, std::iter::once(self).chain(other.into_condition())) {
            Some(predicate) => predicate,
            None => Predicate::True,
        }
    }

    /// `self OR other`; an absent `other` leaves `self` unchanged.
    pub fn or(self, other: impl IntoCondition) -> Predicate {
        match combine(Junction::Or, std::iter::once(self).chain(other.into_condition())) {
            Some(predicate) => predicate,
            None => Predicate::False,
        }
    }

    pub fn negate(self) -> Predicate {
        match self {
            Predicate::Not(inner) => *inner,
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Uses the condition as a boolean-valued expression.
    pub fn into_expr(self) -> Expr<Bool> {
        Expr::from_node(ExprNode::Condition(Box::new(self)))
    }

    pub fn exists<P: Projection>(query: QueryBuilder<P>) -> Predicate {
        Predicate::Exists {
            query: Box::new(query.into_spec()),
            negated: false,
        }
    }

    pub fn not_exists<P: Projection>(query: QueryBuilder<P>) -> Predicate {
        Predicate::Exists {
            query: Box::new(query.into_spec()),
            negated: true,
        }
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitAnd for &Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.clone().and(rhs.clone())
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl BitOr for &Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.clone().or(rhs.clone())
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

/// Anything usable as an optional condition.
pub trait IntoCondition {
    fn into_condition(self) -> Option<Predicate>;
}

impl IntoCondition for Predicate {
    fn into_condition(self) -> Option<Predicate> {
        Some(self)
    }
}

impl IntoCondition for Option<Predicate> {
    fn into_condition(self) -> Option<Predicate> {
        self
    }
}

impl IntoCondition for PredicateBuilder {
    fn into_condition(self) -> Option<Predicate> {
        self.value
    }
}

impl IntoCondition for &PredicateBuilder {
    fn into_condition(self) -> Option<Predicate> {
        self.value.clone()
    }
}

/// AND of all present conditions; `None` when every operand is absent.
pub fn and<C: IntoCondition>(conditions: impl IntoIterator<Item = C>) -> Option<Predicate> {
    combine(
        Junction::And,
        conditions.into_iter().filter_map(IntoCondition::into_condition),
    )
}

/// OR of all present conditions; `None` when every operand is absent.
pub fn or<C: IntoCondition>(conditions: impl IntoIterator<Item = C>) -> Option<Predicate> {
    combine(
        Junction::Or,
        conditions.into_iter().filter_map(IntoCondition::into_condition),
    )
}

/// Negation; absent stays absent.
pub fn not(condition: impl IntoCondition) -> Option<Predicate> {
    condition.into_condition().map(Predicate::negate)
}

/// Mutable accumulator for conditions assembled at runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateBuilder {
    value: Option<Predicate>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(&mut self, condition: impl IntoCondition) -> &mut Self {
        self.value = and([self.value.take(), condition.into_condition()]);
        self
    }

    pub fn or(&mut self, condition: impl IntoCondition) -> &mut Self {
        self.value = or([self.value.take(), condition.into_condition()]);
        self
    }

    pub fn and_not(&mut self, condition: impl IntoCondition) -> &mut Self {
        self.and(not(condition))
    }

    pub fn or_not(&mut self, condition: impl IntoCondition) -> &mut Self {
        self.or(not(condition))
    }

    /// Negates the accumulated condition, if any.
    pub fn not(&mut self) -> &mut Self {
        self.value = not(self.value.take());
        self
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&Predicate> {
        self.value.as_ref()
    }

    pub fn build(&self) -> Option<Predicate> {
        self.value.clone()
    }
}
