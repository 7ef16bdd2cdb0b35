//! SQLite statement compiler.
//!
//! # Responsibility
//! - Translate a `QuerySpec` or `BulkStatement` into statement text plus
//!   ordered positional bindings.
//! - Reject references the schema metadata cannot satisfy before dispatch.
//!
//! # Invariants
//! - Every literal becomes a `?` binding, in textual order.
//! - Identifiers are double-quoted; function names and aliases must be
//!   plain identifiers.
//! - Offset/limit are emitted only for materializing selects that are not
//!   aggregate-only.

use crate::db::CompiledStatement;
use crate::expr::ExprNode;
use crate::model::entity::RelationRef;
use crate::model::value::{Value, ValueKind};
use crate::predicate::Predicate;
use crate::projection::RowLayout;
use crate::query::{
    BuildError, BuildResult, BulkStatement, Direction, JoinKind, NullPlacement, QuerySpec,
    SelectItem,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Compiled select plus the layout its rows follow.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub statement: CompiledStatement,
    pub layout: Arc<RowLayout>,
}

/// Row window applied to a materializing select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowWindow {
    /// The query's own offset/limit.
    Spec,
    /// At most one row, starting at the query's offset.
    FirstOnly,
    /// At most two rows, enough to detect a non-unique result.
    UniqueProbe,
}

/// Compiles `spec` with its own offset/limit.
pub fn compile_query(spec: &QuerySpec) -> BuildResult<CompiledQuery> {
    compile_select(spec, RowWindow::Spec)
}

pub fn compile_select(spec: &QuerySpec, window: RowWindow) -> BuildResult<CompiledQuery> {
    spec.validate_structure()?;
    let fetched: Vec<RelationRef> = spec
        .joins()
        .iter()
        .filter(|join| join.is_fetch())
        .map(|join| join.relation().clone())
        .collect();

    let mut writer = SqlWriter::default();
    writer.with_scope(spec, |writer| {
        writer.sql.push_str("SELECT ");
        writer.select_list(spec.select_items(), &fetched)?;
        writer.body(spec)?;
        writer.order_by(spec)?;
        writer.window(spec, window);
        Ok(())
    })?;

    Ok(CompiledQuery {
        statement: writer.finish(),
        layout: Arc::new(RowLayout::new(spec.select_items(), &fetched)),
    })
}

/// Counting statement over the same sources, joins, filter and grouping,
/// without order or row window.
pub fn compile_count(spec: &QuerySpec) -> BuildResult<CompiledStatement> {
    spec.validate_structure()?;
    let mut writer = SqlWriter::default();
    writer.with_scope(spec, |writer| {
        writer.sql.push_str("SELECT COUNT(*) FROM (SELECT ");
        if spec.is_aggregate_only() {
            writer.select_list(spec.select_items(), &[])?;
        } else {
            writer.sql.push('1');
        }
        writer.body(spec)?;
        writer.sql.push(')');
        Ok(())
    })?;
    Ok(writer.finish())
}

pub fn compile_bulk(statement: &BulkStatement) -> BuildResult<CompiledStatement> {
    let target = statement.target();
    let mut writer = SqlWriter::default();
    writer.scopes.push(vec![target.clone()]);
    match statement {
        BulkStatement::Update { assignments, .. } => {
            writer.sql.push_str("UPDATE ");
            writer.relation(target)?;
            writer.sql.push_str(" SET ");
            for (index, assignment) in assignments.iter().enumerate() {
                let column = target.column(assignment.column()).ok_or_else(|| {
                    BuildError::UnknownColumn {
                        relation: target.alias().to_string(),
                        column: assignment.column().to_string(),
                    }
                })?;
                if let Some(found) = assignment.value().kind() {
                    if !column.kind.accepts(found) {
                        return Err(BuildError::TypeMismatch {
                            context: format!("assignment to `{}`", column.name),
                            expected: column.kind,
                            found,
                        });
                    }
                }
                if index > 0 {
                    writer.sql.push_str(", ");
                }
                writer.sql.push_str(&quote(column.name));
                writer.sql.push_str(" = ");
                writer.expr(assignment.value())?;
            }
        }
        BulkStatement::Delete { .. } => {
            writer.sql.push_str("DELETE FROM ");
            writer.relation(target)?;
        }
    }
    if let Some(filter) = statement.filter() {
        writer.sql.push_str(" WHERE ");
        writer.predicate(filter)?;
    }
    Ok(writer.finish())
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn check_identifier(identifier: &str) -> BuildResult<()> {
    if IDENTIFIER_RE.is_match(identifier) {
        Ok(())
    } else {
        Err(BuildError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

fn limit_value(value: u64) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

#[derive(Default)]
struct SqlWriter {
    sql: String,
    params: Vec<Value>,
    /// Innermost scope last; subqueries see their enclosing relations.
    scopes: Vec<Vec<RelationRef>>,
}

impl SqlWriter {
    fn finish(self) -> CompiledStatement {
        CompiledStatement::new(self.sql, self.params)
    }

    fn with_scope(
        &mut self,
        spec: &QuerySpec,
        write: impl FnOnce(&mut Self) -> BuildResult<()>,
    ) -> BuildResult<()> {
        self.scopes.push(spec.relations().cloned().collect());
        let result = write(self);
        self.scopes.pop();
        result
    }

    fn bind(&mut self, value: Value) {
        self.sql.push('?');
        self.params.push(value);
    }

    fn relation(&mut self, relation: &RelationRef) -> BuildResult<()> {
        check_identifier(relation.alias())?;
        self.sql.push_str(&quote(relation.table()));
        self.sql.push_str(" AS ");
        self.sql.push_str(&quote(relation.alias()));
        Ok(())
    }

    fn entity_columns(&mut self, relation: &RelationRef) -> BuildResult<()> {
        self.lookup(relation.alias())?;
        for (index, column) in relation.columns().iter().enumerate() {
            if index > 0 {
                self.sql.push_str(", ");
            }
            self.sql.push_str(&quote(relation.alias()));
            self.sql.push('.');
            self.sql.push_str(&quote(column.name));
        }
        Ok(())
    }

    fn select_list(&mut self, items: &[SelectItem], fetched: &[RelationRef]) -> BuildResult<()> {
        let mut first = true;
        for item in items {
            if !first {
                self.sql.push_str(", ");
            }
            first = false;
            match item {
                SelectItem::Entity(relation) => self.entity_columns(relation)?,
                SelectItem::Expr {
                    node: ExprNode::Alias { inner, alias },
                    ..
                } => {
                    check_identifier(alias)?;
                    self.expr(inner)?;
                    self.sql.push_str(" AS ");
                    self.sql.push_str(&quote(alias));
                }
                SelectItem::Expr { node, .. } => self.expr(node)?,
            }
        }
        for relation in fetched {
            self.sql.push_str(", ");
            self.entity_columns(relation)?;
        }
        Ok(())
    }

    /// `FROM .. JOIN .. WHERE .. GROUP BY .. HAVING ..`
    fn body(&mut self, spec: &QuerySpec) -> BuildResult<()> {
        self.sql.push_str(" FROM ");
        for (index, source) in spec.sources().iter().enumerate() {
            if index > 0 {
                self.sql.push_str(", ");
            }
            self.relation(source)?;
        }
        for join in spec.joins() {
            self.sql.push_str(match join.kind() {
                JoinKind::Inner => " INNER JOIN ",
                JoinKind::Left => " LEFT JOIN ",
            });
            self.relation(join.relation())?;
            let on = join.on().ok_or_else(|| BuildError::MissingJoinCondition {
                alias: join.relation().alias().to_string(),
            })?;
            self.sql.push_str(" ON ");
            self.predicate(on)?;
        }
        if let Some(filter) = spec.filter() {
            self.sql.push_str(" WHERE ");
            self.predicate(filter)?;
        }
        if !spec.group_by().is_empty() {
            self.sql.push_str(" GROUP BY ");
            self.expr_list(spec.group_by())?;
        }
        if let Some(having) = spec.having() {
            self.sql.push_str(" HAVING ");
            self.predicate(having)?;
        }
        Ok(())
    }

    fn order_by(&mut self, spec: &QuerySpec) -> BuildResult<()> {
        if spec.order_by().is_empty() {
            return Ok(());
        }
        self.sql.push_str(" ORDER BY ");
        for (index, order) in spec.order_by().iter().enumerate() {
            if index > 0 {
                self.sql.push_str(", ");
            }
            self.expr(order.expr())?;
            self.sql.push_str(match order.direction() {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
            match order.nulls() {
                NullPlacement::Default => {}
                NullPlacement::First => self.sql.push_str(" NULLS FIRST"),
                NullPlacement::Last => self.sql.push_str(" NULLS LAST"),
            }
        }
        Ok(())
    }

    fn window(&mut self, spec: &QuerySpec, window: RowWindow) {
        if spec.is_aggregate_only() {
            return;
        }
        let limit = match window {
            RowWindow::Spec => spec.limit(),
            RowWindow::FirstOnly => Some(1),
            RowWindow::UniqueProbe => Some(spec.limit().map_or(2, |limit| limit.min(2))),
        };
        let offset = spec.offset();
        match limit {
            Some(limit) => {
                self.sql.push_str(" LIMIT ");
                self.bind(limit_value(limit));
                if offset > 0 {
                    self.sql.push_str(" OFFSET ");
                    self.bind(limit_value(offset));
                }
            }
            None if offset > 0 => {
                self.sql.push_str(" LIMIT -1 OFFSET ");
                self.bind(limit_value(offset));
            }
            None => {}
        }
    }

    fn lookup(&self, alias: &str) -> BuildResult<&RelationRef> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter())
            .find(|relation| relation.alias() == alias)
            .ok_or_else(|| BuildError::UnknownRelation {
                alias: alias.to_string(),
            })
    }

    fn column(&mut self, alias: &str, name: &str, kind: ValueKind) -> BuildResult<()> {
        let relation = self.lookup(alias)?;
        let column = relation
            .column(name)
            .ok_or_else(|| BuildError::UnknownColumn {
                relation: alias.to_string(),
                column: name.to_string(),
            })?;
        if !kind.accepts(column.kind) {
            return Err(BuildError::TypeMismatch {
                context: format!("column `{alias}.{name}`"),
                expected: kind,
                found: column.kind,
            });
        }
        self.sql.push_str(&quote(alias));
        self.sql.push('.');
        self.sql.push_str(&quote(name));
        Ok(())
    }

    fn expr_list(&mut self, nodes: &[ExprNode]) -> BuildResult<()> {
        for (index, node) in nodes.iter().enumerate() {
            if index > 0 {
                self.sql.push_str(", ");
            }
            self.expr(node)?;
        }
        Ok(())
    }

    fn expr(&mut self, node: &ExprNode) -> BuildResult<()> {
        match node {
            ExprNode::Column {
                relation,
                name,
                kind,
            } => self.column(relation, name, *kind)?,
            ExprNode::Literal(Value::Null) => self.sql.push_str("NULL"),
            ExprNode::Literal(value) => self.bind(value.clone()),
            ExprNode::Binary { op, lhs, rhs } => {
                self.sql.push('(');
                self.expr(lhs)?;
                self.sql.push(' ');
                self.sql.push_str(op.as_sql());
                self.sql.push(' ');
                self.expr(rhs)?;
                self.sql.push(')');
            }
            ExprNode::Function { name, args, .. } => {
                check_identifier(name)?;
                self.sql.push_str(name);
                self.sql.push('(');
                self.expr_list(args)?;
                self.sql.push(')');
            }
            ExprNode::CastText(inner) => {
                self.sql.push_str("CAST(");
                self.expr(inner)?;
                self.sql.push_str(" AS TEXT)");
            }
            ExprNode::Aggregate { func, arg } => {
                self.sql.push_str(func.as_sql());
                self.sql.push('(');
                match arg {
                    Some(arg) => self.expr(arg)?,
                    None => self.sql.push('*'),
                }
                self.sql.push(')');
            }
            ExprNode::Case {
                branches,
                otherwise,
            } => {
                self.sql.push_str("CASE");
                for (condition, value) in branches {
                    self.sql.push_str(" WHEN ");
                    self.predicate(condition)?;
                    self.sql.push_str(" THEN ");
                    self.expr(value)?;
                }
                self.sql.push_str(" ELSE ");
                self.expr(otherwise)?;
                self.sql.push_str(" END");
            }
            ExprNode::Alias { inner, alias } => {
                check_identifier(alias)?;
                self.expr(inner)?;
            }
            ExprNode::Condition(predicate) => {
                self.sql.push('(');
                self.predicate(predicate)?;
                self.sql.push(')');
            }
            ExprNode::Subquery(spec) => self.subquery(spec)?,
        }
        Ok(())
    }

    /// `(SELECT ..)` with the enclosing relations still in scope.
    fn subquery(&mut self, spec: &QuerySpec) -> BuildResult<()> {
        spec.validate_structure()?;
        let columns: usize = spec.select_items().iter().map(SelectItem::width).sum();
        if columns != 1 {
            return Err(BuildError::SubqueryShape { columns });
        }
        self.sql.push('(');
        self.with_scope(spec, |writer| {
            writer.sql.push_str("SELECT ");
            writer.select_list(spec.select_items(), &[])?;
            writer.body(spec)?;
            writer.order_by(spec)?;
            writer.window(spec, RowWindow::Spec);
            Ok(())
        })?;
        self.sql.push(')');
        Ok(())
    }

    /// `EXISTS` accepts any select width.
    fn exists_subquery(&mut self, spec: &QuerySpec) -> BuildResult<()> {
        spec.validate_structure()?;
        self.sql.push('(');
        self.with_scope(spec, |writer| {
            writer.sql.push_str("SELECT 1");
            writer.body(spec)
        })?;
        self.sql.push(')');
        Ok(())
    }

    fn comparable(context: &str, lhs: &ExprNode, rhs: &ExprNode) -> BuildResult<()> {
        match (lhs.kind(), rhs.kind()) {
            (Some(left), Some(right)) if !left.comparable_with(right) => {
                Err(BuildError::TypeMismatch {
                    context: context.to_string(),
                    expected: left,
                    found: right,
                })
            }
            _ => Ok(()),
        }
    }

    fn junction(&mut self, parts: &[Predicate], keyword: &str, empty: &str) -> BuildResult<()> {
        if parts.is_empty() {
            self.sql.push_str(empty);
            return Ok(());
        }
        self.sql.push('(');
        for (index, part) in parts.iter().enumerate() {
            if index > 0 {
                self.sql.push_str(keyword);
            }
            self.predicate(part)?;
        }
        self.sql.push(')');
        Ok(())
    }

    fn predicate(&mut self, predicate: &Predicate) -> BuildResult<()> {
        match predicate {
            Predicate::True => self.sql.push('1'),
            Predicate::False => self.sql.push('0'),
            Predicate::And(parts) => self.junction(parts, " AND ", "1")?,
            Predicate::Or(parts) => self.junction(parts, " OR ", "0")?,
            Predicate::Not(inner) => {
                self.sql.push_str("NOT (");
                self.predicate(inner)?;
                self.sql.push(')');
            }
            Predicate::Compare { lhs, op, rhs } => {
                Self::comparable("comparison", lhs, rhs)?;
                self.expr(lhs)?;
                self.sql.push(' ');
                self.sql.push_str(op.as_sql());
                self.sql.push(' ');
                self.expr(rhs)?;
            }
            Predicate::Between { expr, low, high } => {
                Self::comparable("between", expr, low)?;
                Self::comparable("between", expr, high)?;
                self.expr(expr)?;
                self.sql.push_str(" BETWEEN ");
                self.expr(low)?;
                self.sql.push_str(" AND ");
                self.expr(high)?;
            }
            Predicate::InList {
                expr,
                values,
                negated,
            } => {
                if values.is_empty() {
                    self.sql.push(if *negated { '1' } else { '0' });
                    return Ok(());
                }
                for value in values {
                    Self::comparable("in list", expr, value)?;
                }
                self.expr(expr)?;
                self.sql
                    .push_str(if *negated { " NOT IN (" } else { " IN (" });
                self.expr_list(values)?;
                self.sql.push(')');
            }
            Predicate::InQuery {
                expr,
                query,
                negated,
            } => {
                self.expr(expr)?;
                self.sql.push_str(if *negated { " NOT IN " } else { " IN " });
                self.subquery(query)?;
            }
            Predicate::Exists { query, negated } => {
                self.sql
                    .push_str(if *negated { "NOT EXISTS " } else { "EXISTS " });
                self.exists_subquery(query)?;
            }
            Predicate::IsNull { expr, negated } => {
                self.expr(expr)?;
                self.sql
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::Like { expr, pattern } => {
                self.expr(expr)?;
                self.sql.push_str(" LIKE ");
                self.expr(pattern)?;
                self.sql.push_str(" ESCAPE '\\'");
            }
            Predicate::IsTrue(expr) => {
                self.sql.push('(');
                self.expr(expr)?;
                self.sql.push(')');
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{compile_bulk, compile_count, compile_query, compile_select, RowWindow};
    use crate::demo::{QMember, QTeam};
    use crate::expr::{apply, case_when, subquery};
    use crate::model::value::{Text, Value};
    use crate::query::{BuildError, QueryBuilder, UpdateBuilder};

    #[test]
    fn entity_select_expands_declared_columns() {
        let member = QMember::default();
        let query = QueryBuilder::select_from(&member.entity)
            .filter(member.username.eq("member1"))
            .build()
            .unwrap();
        let compiled = compile_query(query.spec()).unwrap();
        assert_eq!(
            compiled.statement.sql,
            "SELECT \"member\".\"id\", \"member\".\"username\", \"member\".\"age\", \"member\".\"team_id\" \
             FROM \"member\" AS \"member\" WHERE \"member\".\"username\" = ?"
        );
        assert_eq!(
            compiled.statement.params,
            vec![Value::Text("member1".to_string())]
        );
        assert_eq!(compiled.layout.width(), 4);
    }

    #[test]
    fn bindings_follow_text_order_including_window() {
        let member = QMember::default();
        let query = QueryBuilder::select(member.username.clone())
            .from(&member.entity)
            .filter(member.age.between(10, 30))
            .order_by(member.age.desc())
            .order_by(member.username.asc().nulls_last())
            .offset(1)
            .limit(2)
            .build()
            .unwrap();
        let compiled = compile_query(query.spec()).unwrap();
        assert!(compiled
            .statement
            .sql
            .ends_with("ORDER BY \"member\".\"age\" DESC, \"member\".\"username\" ASC NULLS LAST LIMIT ? OFFSET ?"));
        assert_eq!(
            compiled.statement.params,
            vec![
                Value::Integer(10),
                Value::Integer(30),
                Value::Integer(2),
                Value::Integer(1)
            ]
        );
    }

    #[test]
    fn offset_without_limit_uses_unbounded_limit() {
        let member = QMember::default();
        let query = QueryBuilder::select_from(&member.entity)
            .offset(3)
            .build()
            .unwrap();
        let compiled = compile_query(query.spec()).unwrap();
        assert!(compiled.statement.sql.ends_with(" LIMIT -1 OFFSET ?"));
    }

    #[test]
    fn aggregate_only_select_ignores_window() {
        let member = QMember::default();
        let query = QueryBuilder::select(member.age.sum())
            .from(&member.entity)
            .offset(5)
            .limit(1)
            .build()
            .unwrap();
        let compiled = compile_select(query.spec(), RowWindow::UniqueProbe).unwrap();
        assert_eq!(
            compiled.statement.sql,
            "SELECT SUM(\"member\".\"age\") FROM \"member\" AS \"member\""
        );
        assert!(compiled.statement.params.is_empty());
    }

    #[test]
    fn aggregate_condition_and_case_selects_ignore_window() {
        let member = QMember::default();
        let above = QueryBuilder::select(member.age.max().gt(30).into_expr())
            .from(&member.entity)
            .offset(1)
            .build()
            .unwrap();
        let compiled = compile_select(above.spec(), RowWindow::UniqueProbe).unwrap();
        assert!(!compiled.statement.sql.contains("LIMIT"));
        assert!(!compiled.statement.sql.contains("OFFSET"));
        assert_eq!(compiled.statement.params, vec![Value::Integer(30)]);

        let label = case_when::<Text>(member.count().gt(2)).then("many").otherwise("few");
        let size = QueryBuilder::select(label)
            .from(&member.entity)
            .offset(2)
            .limit(1)
            .build()
            .unwrap();
        let compiled = compile_query(size.spec()).unwrap();
        assert!(!compiled.statement.sql.contains("LIMIT"));
        assert_eq!(compiled.statement.params.len(), 3);
    }

    #[test]
    fn nulls_first_is_explicit() {
        let member = QMember::default();
        let query = QueryBuilder::select(member.username.clone())
            .from(&member.entity)
            .order_by(member.username.desc().nulls_first())
            .build()
            .unwrap();
        let compiled = compile_query(query.spec()).unwrap();
        assert!(compiled
            .statement
            .sql
            .ends_with("ORDER BY \"member\".\"username\" DESC NULLS FIRST"));
    }

    #[test]
    fn unique_probe_caps_limit_at_two() {
        let member = QMember::default();
        let query = QueryBuilder::select_from(&member.entity)
            .limit(10)
            .build()
            .unwrap();
        let compiled = compile_select(query.spec(), RowWindow::UniqueProbe).unwrap();
        assert_eq!(compiled.statement.params, vec![Value::Integer(2)]);
    }

    #[test]
    fn count_statement_drops_order_and_window() {
        let member = QMember::default();
        let team = QTeam::default();
        let query = QueryBuilder::select(team.name.clone())
            .from(&member.entity)
            .join(member.team(&team))
            .group_by(&team.name)
            .having(member.age.avg().gt(2.0))
            .order_by(team.name.asc())
            .limit(1)
            .build()
            .unwrap();
        let statement = compile_count(query.spec()).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) FROM (SELECT 1 FROM \"member\" AS \"member\" \
             INNER JOIN \"team\" AS \"team\" ON \"member\".\"team_id\" = \"team\".\"id\" \
             GROUP BY \"team\".\"name\" HAVING AVG(\"member\".\"age\") > ?)"
        );
        assert_eq!(statement.params, vec![Value::Real(2.0)]);
    }

    #[test]
    fn empty_in_list_is_constant_false() {
        let member = QMember::default();
        let query = QueryBuilder::select_from(&member.entity)
            .filter(member.age.in_list(Vec::<i64>::new()))
            .build()
            .unwrap();
        let compiled = compile_query(query.spec()).unwrap();
        assert!(compiled.statement.sql.ends_with(" WHERE 0"));
    }

    #[test]
    fn unknown_relation_and_column_are_build_errors() {
        let member = QMember::default();
        let team = QTeam::default();
        let query = QueryBuilder::select(team.name.clone())
            .from(&member.entity)
            .build()
            .unwrap();
        assert_eq!(
            compile_query(query.spec()).unwrap_err(),
            BuildError::UnknownRelation {
                alias: "team".to_string()
            }
        );

        let query = QueryBuilder::select(member.entity.column::<Text>("nickname"))
            .from(&member.entity)
            .build()
            .unwrap();
        assert_eq!(
            compile_query(query.spec()).unwrap_err(),
            BuildError::UnknownColumn {
                relation: "member".to_string(),
                column: "nickname".to_string()
            }
        );
    }

    #[test]
    fn declared_kind_is_checked() {
        let member = QMember::default();
        let query = QueryBuilder::select(member.entity.column::<Text>("age"))
            .from(&member.entity)
            .build()
            .unwrap();
        assert!(matches!(
            compile_query(query.spec()),
            Err(BuildError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn function_names_must_be_identifiers() {
        let member = QMember::default();
        let bad = apply::<Text>("lower); DROP TABLE member; --", [member.username.arg()]);
        let query = QueryBuilder::select(bad)
            .from(&member.entity)
            .build()
            .unwrap();
        assert!(matches!(
            compile_query(query.spec()),
            Err(BuildError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn correlated_subquery_sees_outer_relation() {
        let member = QMember::default();
        let inner = QMember::new("member_sub");
        let oldest = subquery(
            QueryBuilder::select(inner.age.max())
                .from(&inner.entity)
                .filter(inner.team_id.eq(member.team_id.clone())),
        );
        let query = QueryBuilder::select_from(&member.entity)
            .filter(member.age.eq(oldest))
            .build()
            .unwrap();
        let compiled = compile_query(query.spec()).unwrap();
        assert!(compiled.statement.sql.contains(
            "(SELECT MAX(\"member_sub\".\"age\") FROM \"member\" AS \"member_sub\" \
             WHERE \"member_sub\".\"team_id\" = \"member\".\"team_id\")"
        ));
    }

    #[test]
    fn bulk_update_renders_set_list() {
        let member = QMember::default();
        let statement = UpdateBuilder::new(&member.entity)
            .set(&member.username, "anon")
            .set(&member.age, member.age.add(1))
            .filter(member.age.lt(28))
            .build()
            .unwrap();
        let compiled = compile_bulk(&statement).unwrap();
        assert_eq!(
            compiled.sql,
            "UPDATE \"member\" AS \"member\" SET \"username\" = ?, \"age\" = (\"member\".\"age\" + ?) \
             WHERE \"member\".\"age\" < ?"
        );
        assert_eq!(
            compiled.params,
            vec![
                Value::Text("anon".to_string()),
                Value::Integer(1),
                Value::Integer(28)
            ]
        );
    }
}
