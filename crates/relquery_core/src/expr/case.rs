//! `CASE` expression builders.
//!
//! Both the searched form (`case_when(p).then(..)`) and the simple form
//! (`expr.when(v).then(..)`) compile to a searched `CASE WHEN .. THEN ..`
//! node; the simple form expands each arm into `subject = value`.

use super::{Expr, ExprNode, IntoExpr};
use crate::model::value::SqlType;
use crate::predicate::{CompareOp, IntoCondition, Predicate};
use std::marker::PhantomData;

/// Starts a searched `CASE` with its first condition.
///
/// An absent condition (`None`) never matches.
pub fn case_when<R: SqlType>(condition: impl IntoCondition) -> CaseThen<R> {
    CaseThen {
        branches: Vec::new(),
        condition: condition_or_false(condition),
        _result: PhantomData,
    }
}

fn condition_or_false(condition: impl IntoCondition) -> Predicate {
    condition.into_condition().unwrap_or(Predicate::False)
}

fn finish<R: SqlType>(branches: Vec<(Predicate, ExprNode)>, otherwise: ExprNode) -> Expr<R> {
    Expr::from_node(ExprNode::Case {
        branches,
        otherwise: Box::new(otherwise),
    })
}

/// Searched `CASE` waiting for the result of its pending condition.
#[derive(Debug, Clone)]
pub struct CaseThen<R> {
    branches: Vec<(Predicate, ExprNode)>,
    condition: Predicate,
    _result: PhantomData<fn() -> R>,
}

impl<R: SqlType> CaseThen<R> {
    pub fn then(self, value: impl IntoExpr<R>) -> CaseBuilder<R> {
        let mut branches = self.branches;
        branches.push((self.condition, value.into_expr().into_node()));
        CaseBuilder {
            branches,
            _result: PhantomData,
        }
    }
}

/// Searched `CASE` with at least one complete arm.
#[derive(Debug, Clone)]
pub struct CaseBuilder<R> {
    branches: Vec<(Predicate, ExprNode)>,
    _result: PhantomData<fn() -> R>,
}

impl<R: SqlType> CaseBuilder<R> {
    pub fn when(self, condition: impl IntoCondition) -> CaseThen<R> {
        CaseThen {
            branches: self.branches,
            condition: condition_or_false(condition),
            _result: PhantomData,
        }
    }

    pub fn otherwise(self, value: impl IntoExpr<R>) -> Expr<R> {
        finish(self.branches, value.into_expr().into_node())
    }
}

/// Simple `CASE` over a subject of type `T` waiting for an arm result.
#[derive(Debug, Clone)]
pub struct SimpleCaseThen<T, R> {
    subject: ExprNode,
    branches: Vec<(Predicate, ExprNode)>,
    value: ExprNode,
    _types: PhantomData<fn() -> (T, R)>,
}

impl<T: SqlType, R: SqlType> SimpleCaseThen<T, R> {
    pub(crate) fn start(subject: ExprNode, value: ExprNode) -> Self {
        Self {
            subject,
            branches: Vec::new(),
            value,
            _types: PhantomData,
        }
    }

    pub fn then(self, result: impl IntoExpr<R>) -> SimpleCase<T, R> {
        let condition = Predicate::Compare {
            lhs: self.subject.clone(),
            op: CompareOp::Eq,
            rhs: self.value,
        };
        let mut branches = self.branches;
        branches.push((condition, result.into_expr().into_node()));
        SimpleCase {
            subject: self.subject,
            branches,
            _types: PhantomData,
        }
    }
}

/// Simple `CASE` with at least one complete arm.
#[derive(Debug, Clone)]
pub struct SimpleCase<T, R> {
    subject: ExprNode,
    branches: Vec<(Predicate, ExprNode)>,
    _types: PhantomData<fn() -> (T, R)>,
}

impl<T: SqlType, R: SqlType> SimpleCase<T, R> {
    pub fn when(self, value: impl IntoExpr<T>) -> SimpleCaseThen<T, R> {
        SimpleCaseThen {
            subject: self.subject,
            branches: self.branches,
            value: value.into_expr().into_node(),
            _types: PhantomData,
        }
    }

    pub fn otherwise(self, value: impl IntoExpr<R>) -> Expr<R> {
        finish(self.branches, value.into_expr().into_node())
    }
}
