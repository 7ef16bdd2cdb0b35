//! Typed expression model.
//!
//! # Responsibility
//! - Represent columns, literals, computed values, aggregates, case
//!   expressions and scalar subqueries as an immutable tree (`ExprNode`).
//! - Tag that tree with a semantic type (`Expr<T>`) so operand mismatches
//!   are rejected by the Rust compiler.
//!
//! # Invariants
//! - Nodes are immutable values; equality is structural, which is what
//!   tuple lookup by expression relies on.
//! - A subquery node always projects exactly one column.

mod case;

pub use case::{case_when, CaseBuilder, CaseThen, SimpleCase, SimpleCaseThen};

use crate::model::value::{Bool, Comparable, Int, Numeric, Real, SqlType, Text, Value, ValueKind};
use crate::predicate::{CompareOp, Predicate};
use crate::projection::Nullable;
use crate::query::{Direction, OrderSpec, QueryBuilder, QuerySpec, SelectItem};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// Binary operator over two sub-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
}

impl BinaryOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Concat => "||",
        }
    }
}

/// Aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateFn {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }
}

/// Untyped expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Column {
        relation: String,
        name: String,
        kind: ValueKind,
    },
    Literal(Value),
    Binary {
        op: BinaryOp,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    Function {
        name: String,
        args: Vec<ExprNode>,
        kind: ValueKind,
    },
    CastText(Box<ExprNode>),
    /// `arg = None` is `COUNT(*)`.
    Aggregate {
        func: AggregateFn,
        arg: Option<Box<ExprNode>>,
    },
    Case {
        branches: Vec<(Predicate, ExprNode)>,
        otherwise: Box<ExprNode>,
    },
    Alias {
        inner: Box<ExprNode>,
        alias: String,
    },
    Condition(Box<Predicate>),
    Subquery(Box<QuerySpec>),
}

/// How many values an expression yields over the rows of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grouping {
    Constant,
    Aggregate,
    PerRow,
}

impl Grouping {
    fn merge(self, other: Grouping) -> Grouping {
        match (self, other) {
            (Grouping::PerRow, _) | (_, Grouping::PerRow) => Grouping::PerRow,
            (Grouping::Aggregate, _) | (_, Grouping::Aggregate) => Grouping::Aggregate,
            _ => Grouping::Constant,
        }
    }

    fn fold(parts: impl IntoIterator<Item = Grouping>) -> Grouping {
        parts.into_iter().fold(Grouping::Constant, Grouping::merge)
    }
}

fn predicate_grouping(predicate: &Predicate) -> Grouping {
    match predicate {
        Predicate::True | Predicate::False | Predicate::Exists { .. } => Grouping::Constant,
        Predicate::And(parts) | Predicate::Or(parts) => {
            Grouping::fold(parts.iter().map(predicate_grouping))
        }
        Predicate::Not(inner) => predicate_grouping(inner),
        Predicate::Compare { lhs, rhs, .. } => lhs.grouping().merge(rhs.grouping()),
        Predicate::Between { expr, low, high } => {
            Grouping::fold([expr.grouping(), low.grouping(), high.grouping()])
        }
        Predicate::InList { expr, values, .. } => {
            Grouping::fold(values.iter().map(ExprNode::grouping)).merge(expr.grouping())
        }
        Predicate::InQuery { expr, .. } | Predicate::IsNull { expr, .. } => expr.grouping(),
        Predicate::Like { expr, pattern } => expr.grouping().merge(pattern.grouping()),
        Predicate::IsTrue(expr) => expr.grouping(),
    }
}

impl ExprNode {
    /// Inferred semantic kind; `None` only for a bare `NULL` literal.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Column { kind, .. } | Self::Function { kind, .. } => Some(*kind),
            Self::Literal(value) => value.kind(),
            Self::Binary { op, lhs, rhs } => match op {
                BinaryOp::Concat => Some(ValueKind::Text),
                _ => {
                    let real = [lhs.kind(), rhs.kind()].contains(&Some(ValueKind::Real));
                    Some(if real {
                        ValueKind::Real
                    } else {
                        ValueKind::Integer
                    })
                }
            },
            Self::CastText(_) => Some(ValueKind::Text),
            Self::Aggregate { func, arg } => match func {
                AggregateFn::Count => Some(ValueKind::Integer),
                AggregateFn::Avg => Some(ValueKind::Real),
                AggregateFn::Sum | AggregateFn::Max | AggregateFn::Min => {
                    arg.as_ref().and_then(|arg| arg.kind())
                }
            },
            Self::Case {
                branches,
                otherwise,
            } => otherwise
                .kind()
                .or_else(|| branches.iter().find_map(|(_, value)| value.kind())),
            Self::Alias { inner, .. } => inner.kind(),
            Self::Condition(_) => Some(ValueKind::Boolean),
            Self::Subquery(spec) => spec.select_items().first().and_then(SelectItem::kind),
        }
    }

    /// Returns whether this node yields a single value per group: it
    /// contains an aggregate and every column sits under one.
    pub fn is_aggregate(&self) -> bool {
        self.grouping() == Grouping::Aggregate
    }

    fn grouping(&self) -> Grouping {
        match self {
            Self::Column { .. } => Grouping::PerRow,
            Self::Literal(_) | Self::Subquery(_) => Grouping::Constant,
            Self::Aggregate { .. } => Grouping::Aggregate,
            Self::Alias { inner, .. } | Self::CastText(inner) => inner.grouping(),
            Self::Binary { lhs, rhs, .. } => lhs.grouping().merge(rhs.grouping()),
            Self::Function { args, .. } => Grouping::fold(args.iter().map(ExprNode::grouping)),
            Self::Case {
                branches,
                otherwise,
            } => branches
                .iter()
                .map(|(when, value)| predicate_grouping(when).merge(value.grouping()))
                .fold(otherwise.grouping(), Grouping::merge),
            Self::Condition(predicate) => predicate_grouping(predicate),
        }
    }

    /// Member name used by field/setter projections: the alias, or the
    /// column name of an unaliased column reference.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            Self::Alias { alias, .. } => Some(alias),
            Self::Column { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<Value> for ExprNode {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// Expression tagged with semantic type `T`.
pub struct Expr<T> {
    node: ExprNode,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for Expr<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            _type: PhantomData,
        }
    }
}

impl<T> Debug for Expr<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Expr").field(&self.node).finish()
    }
}

/// Conversion into a typed expression (literals become bound parameters).
pub trait IntoExpr<T> {
    fn into_expr(self) -> Expr<T>;
}

impl<T: SqlType> IntoExpr<T> for Expr<T> {
    fn into_expr(self) -> Expr<T> {
        self
    }
}

impl<T: SqlType> IntoExpr<T> for &Expr<T> {
    fn into_expr(self) -> Expr<T> {
        self.clone()
    }
}

macro_rules! literal_into_expr {
    ($marker:ty => $($native:ty => $convert:expr),+ $(,)?) => {
        $(
            impl IntoExpr<$marker> for $native {
                fn into_expr(self) -> Expr<$marker> {
                    let convert: fn($native) -> Value = $convert;
                    Expr::from_node(ExprNode::Literal(convert(self)))
                }
            }
        )+
    };
}

literal_into_expr!(Int => i64 => |v| Value::Integer(v), i32 => |v| Value::Integer(i64::from(v)));
literal_into_expr!(Real => f64 => |v| Value::Real(v), i64 => |v| Value::Real(v as f64), i32 => |v| Value::Real(f64::from(v)));
literal_into_expr!(Text => &str => |v| Value::Text(v.to_string()), String => |v| Value::Text(v), &String => |v| Value::Text(v.clone()));
literal_into_expr!(Bool => bool => |v| Value::Boolean(v));

/// Literal expression bound as a statement parameter.
pub fn literal<T: SqlType>(value: impl IntoExpr<T>) -> Expr<T> {
    value.into_expr()
}

/// Alias of [`literal`] matching the `constant` vocabulary of DSL users.
pub fn constant<T: SqlType>(value: impl IntoExpr<T>) -> Expr<T> {
    value.into_expr()
}

/// Named SQL scalar function applied to `args`.
///
/// The name must be a plain identifier; it is validated at compile time.
pub fn apply<T: SqlType>(function: &str, args: impl IntoIterator<Item = ExprNode>) -> Expr<T> {
    Expr::from_node(ExprNode::Function {
        name: function.to_string(),
        args: args.into_iter().collect(),
        kind: T::KIND,
    })
}

/// Scalar subquery embedded as an expression; compiled inline.
pub fn subquery<T: SqlType>(query: QueryBuilder<Expr<T>>) -> Expr<T> {
    Expr::from_node(ExprNode::Subquery(Box::new(query.into_spec())))
}

impl<T: SqlType> Expr<T> {
    pub(crate) fn from_node(node: ExprNode) -> Self {
        Self {
            node,
            _type: PhantomData,
        }
    }

    pub fn node(&self) -> &ExprNode {
        &self.node
    }

    pub fn into_node(self) -> ExprNode {
        self.node
    }

    /// Owned copy of the node, for function arguments.
    pub fn arg(&self) -> ExprNode {
        self.node.clone()
    }

    pub fn kind(&self) -> ValueKind {
        T::KIND
    }

    pub fn item(&self) -> SelectItem {
        SelectItem::Expr {
            node: self.node.clone(),
            kind: T::KIND,
        }
    }

    /// Projection reading this expression as `Option<T::Native>`.
    pub fn nullable(&self) -> Nullable<T> {
        Nullable::new(self.clone())
    }

    pub fn as_(&self, alias: &str) -> Self {
        let inner = match &self.node {
            ExprNode::Alias { inner, .. } => inner.clone(),
            other => Box::new(other.clone()),
        };
        Self::from_node(ExprNode::Alias {
            inner,
            alias: alias.to_string(),
        })
    }

    fn compare(&self, op: CompareOp, rhs: impl IntoExpr<T>) -> Predicate {
        Predicate::Compare {
            lhs: self.node.clone(),
            op,
            rhs: rhs.into_expr().into_node(),
        }
    }

    pub fn eq(&self, rhs: impl IntoExpr<T>) -> Predicate {
        self.compare(CompareOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl IntoExpr<T>) -> Predicate {
        self.compare(CompareOp::Ne, rhs)
    }

    pub fn in_list<I>(&self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: IntoExpr<T>,
    {
        Predicate::InList {
            expr: self.node.clone(),
            values: values.into_iter().map(|v| v.into_expr().into_node()).collect(),
            negated: false,
        }
    }

    pub fn not_in_list<I>(&self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: IntoExpr<T>,
    {
        match self.in_list(values) {
            Predicate::InList { expr, values, .. } => Predicate::InList {
                expr,
                values,
                negated: true,
            },
            other => other,
        }
    }

    pub fn in_query(&self, query: QueryBuilder<Expr<T>>) -> Predicate {
        Predicate::InQuery {
            expr: self.node.clone(),
            query: Box::new(query.into_spec()),
            negated: false,
        }
    }

    pub fn not_in_query(&self, query: QueryBuilder<Expr<T>>) -> Predicate {
        Predicate::InQuery {
            expr: self.node.clone(),
            query: Box::new(query.into_spec()),
            negated: true,
        }
    }

    pub fn is_null(&self) -> Predicate {
        Predicate::IsNull {
            expr: self.node.clone(),
            negated: false,
        }
    }

    pub fn is_not_null(&self) -> Predicate {
        Predicate::IsNull {
            expr: self.node.clone(),
            negated: true,
        }
    }

    pub fn count(&self) -> Expr<Int> {
        Expr::from_node(ExprNode::Aggregate {
            func: AggregateFn::Count,
            arg: Some(Box::new(self.node.clone())),
        })
    }

    /// `CAST(expr AS TEXT)`.
    pub fn string_value(&self) -> Expr<Text> {
        Expr::from_node(ExprNode::CastText(Box::new(self.node.clone())))
    }

    pub fn asc(&self) -> OrderSpec {
        OrderSpec::new(self.node.clone(), Direction::Asc)
    }

    pub fn desc(&self) -> OrderSpec {
        OrderSpec::new(self.node.clone(), Direction::Desc)
    }

    /// Starts a simple `CASE` over this expression; `R` is the result type
    /// fixed by the first `then`.
    pub fn when<R: SqlType>(&self, value: impl IntoExpr<T>) -> SimpleCaseThen<T, R> {
        SimpleCaseThen::start(self.node.clone(), value.into_expr().into_node())
    }

    fn aggregate<R: SqlType>(&self, func: AggregateFn) -> Expr<R> {
        Expr::from_node(ExprNode::Aggregate {
            func,
            arg: Some(Box::new(self.node.clone())),
        })
    }

    fn binary(&self, op: BinaryOp, rhs: ExprNode) -> Self {
        Self::from_node(ExprNode::Binary {
            op,
            lhs: Box::new(self.node.clone()),
            rhs: Box::new(rhs),
        })
    }
}

impl<T: Numeric> Expr<T> {
    pub fn add(&self, rhs: impl IntoExpr<T>) -> Self {
        self.binary(BinaryOp::Add, rhs.into_expr().into_node())
    }

    pub fn subtract(&self, rhs: impl IntoExpr<T>) -> Self {
        self.binary(BinaryOp::Subtract, rhs.into_expr().into_node())
    }

    pub fn multiply(&self, rhs: impl IntoExpr<T>) -> Self {
        self.binary(BinaryOp::Multiply, rhs.into_expr().into_node())
    }

    pub fn divide(&self, rhs: impl IntoExpr<T>) -> Self {
        self.binary(BinaryOp::Divide, rhs.into_expr().into_node())
    }

    pub fn sum(&self) -> Self {
        self.aggregate(AggregateFn::Sum)
    }

    /// Average is always real, even over integer input.
    pub fn avg(&self) -> Expr<Real> {
        self.aggregate(AggregateFn::Avg)
    }

    pub fn gt(&self, rhs: impl IntoExpr<T>) -> Predicate {
        self.compare(CompareOp::Gt, rhs)
    }

    pub fn goe(&self, rhs: impl IntoExpr<T>) -> Predicate {
        self.compare(CompareOp::Gte, rhs)
    }

    pub fn lt(&self, rhs: impl IntoExpr<T>) -> Predicate {
        self.compare(CompareOp::Lt, rhs)
    }

    pub fn loe(&self, rhs: impl IntoExpr<T>) -> Predicate {
        self.compare(CompareOp::Lte, rhs)
    }

    pub fn between(&self, low: impl IntoExpr<T>, high: impl IntoExpr<T>) -> Predicate {
        Predicate::Between {
            expr: self.node.clone(),
            low: low.into_expr().into_node(),
            high: high.into_expr().into_node(),
        }
    }
}

impl Expr<Int> {
    /// Views an integer expression as real for mixed numeric comparison.
    /// Emits no SQL; SQLite compares integer and real operands natively.
    pub fn as_real(&self) -> Expr<Real> {
        Expr::from_node(self.node.clone())
    }
}

impl<T: Comparable> Expr<T> {
    pub fn max(&self) -> Self {
        self.aggregate(AggregateFn::Max)
    }

    pub fn min(&self) -> Self {
        self.aggregate(AggregateFn::Min)
    }
}

impl Expr<Text> {
    pub fn concat(&self, rhs: impl IntoExpr<Text>) -> Self {
        self.binary(BinaryOp::Concat, rhs.into_expr().into_node())
    }

    pub fn lower(&self) -> Self {
        apply("lower", [self.arg()])
    }

    pub fn upper(&self) -> Self {
        apply("upper", [self.arg()])
    }

    /// Raw `LIKE` pattern; `\` escapes `%` and `_`.
    pub fn like(&self, pattern: impl IntoExpr<Text>) -> Predicate {
        Predicate::Like {
            expr: self.node.clone(),
            pattern: pattern.into_expr().into_node(),
        }
    }

    pub fn starts_with(&self, prefix: &str) -> Predicate {
        self.like(format!("{}%", escape_like(prefix)))
    }

    pub fn contains(&self, fragment: &str) -> Predicate {
        self.like(format!("%{}%", escape_like(fragment)))
    }
}

impl Expr<Bool> {
    pub fn is_true(&self) -> Predicate {
        Predicate::IsTrue(self.node.clone())
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{case_when, constant, escape_like, ExprNode};
    use crate::demo::QMember;
    use crate::model::value::{Text, Value, ValueKind};

    #[test]
    fn structurally_equal_expressions_compare_equal() {
        let member = QMember::default();
        assert_eq!(member.age.sum().node(), member.age.sum().node());
        assert_ne!(member.age.sum().node(), member.age.max().node());
        assert_eq!(
            constant::<Text>("A").node(),
            &ExprNode::Literal(Value::Text("A".to_string()))
        );
    }

    #[test]
    fn avg_over_integer_is_real() {
        let member = QMember::default();
        assert_eq!(member.age.avg().node().kind(), Some(ValueKind::Real));
        assert_eq!(member.age.sum().node().kind(), Some(ValueKind::Integer));
        assert_eq!(member.count().node().kind(), Some(ValueKind::Integer));
    }

    #[test]
    fn aggregate_detection_ignores_plain_columns() {
        let member = QMember::default();
        assert!(member.age.max().node().is_aggregate());
        assert!(member.age.max().add(1).node().is_aggregate());
        assert!(!member.age.add(1).node().is_aggregate());
        assert!(!member.username.node().is_aggregate());
    }

    #[test]
    fn aggregate_detection_looks_through_conditions_and_case() {
        let member = QMember::default();
        assert!(member.age.max().gt(30).into_expr().node().is_aggregate());
        assert!(!member.age.gt(30).into_expr().node().is_aggregate());
        assert!(!member.age.max().gt(member.age.clone()).into_expr().node().is_aggregate());

        let many = case_when::<Text>(member.count().gt(2)).then("many").otherwise("few");
        assert!(many.node().is_aggregate());
        let per_row = case_when::<Text>(member.age.gt(2)).then("old").otherwise("young");
        assert!(!per_row.node().is_aggregate());
        assert!(!constant::<Text>("A").node().is_aggregate());
    }

    #[test]
    fn alias_replaces_previous_alias() {
        let member = QMember::default();
        let aliased = member.username.as_("name").as_("title");
        assert_eq!(aliased.node().member_name(), Some("title"));
        assert_eq!(member.age.node().member_name(), Some("age"));
    }

    #[test]
    fn like_escape_covers_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
