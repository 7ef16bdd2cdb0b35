//! Query execution over a `StoreAdapter`.
//!
//! # Responsibility
//! - Compile finalized queries and bulk statements, dispatch them through
//!   the store adapter and map rows through the query's projection.
//! - Provide the list/unique/first/page/count terminals.
//!
//! # Invariants
//! - Nothing reaches the store before the query compiles and its
//!   projection validates.
//! - Store failures carry the statement text that failed.
//!
//! # Side effects
//! - Emits `query_fetch`, `query_count` and `bulk_execute` log events.

use crate::config::EngineConfig;
use crate::db::{CompiledStatement, DbError, StoreAdapter};
use crate::logging::statement_summary;
use crate::model::value::Value;
use crate::projection::{decode_member, Projection, ProjectionError, ResultRow};
use crate::query::{BuildError, BulkStatement, Query};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

mod compile;

pub use compile::{compile_bulk, compile_count, compile_query, compile_select, CompiledQuery, RowWindow};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug)]
pub enum EngineError {
    Build(BuildError),
    /// A unique fetch matched more than one row.
    NonUniqueResult { returned: usize },
    Projection(ProjectionError),
    StoreExecution { statement: String, source: DbError },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build(err) => write!(f, "invalid query: {err}"),
            Self::NonUniqueResult { returned } => {
                write!(f, "expected at most one row, store returned {returned}")
            }
            Self::Projection(err) => write!(f, "cannot map result row: {err}"),
            Self::StoreExecution { statement, source } => {
                write!(f, "store rejected `{statement}`: {source}")
            }
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Build(err) => Some(err),
            Self::NonUniqueResult { .. } => None,
            Self::Projection(err) => Some(err),
            Self::StoreExecution { source, .. } => Some(source),
        }
    }
}

impl From<BuildError> for EngineError {
    fn from(value: BuildError) -> Self {
        Self::Build(value)
    }
}

impl From<ProjectionError> for EngineError {
    fn from(value: ProjectionError) -> Self {
        Self::Projection(value)
    }
}

/// One window of results plus the total the window was cut from.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub total: u64,
    pub offset: u64,
    pub limit: Option<u64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns whether rows remain after this window.
    pub fn has_more(&self) -> bool {
        self.offset + (self.results.len() as u64) < self.total
    }
}

/// Executes queries against one store.
///
/// The engine holds no mutable state; sharing it across threads is safe
/// whenever the store is.
#[derive(Debug, Clone)]
pub struct Engine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: StoreAdapter> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Every matching row, in store order.
    pub fn fetch_list<P: Projection>(&self, query: &Query<P>) -> EngineResult<Vec<P::Output>> {
        self.fetch_window(query, RowWindow::Spec)
    }

    /// The only matching row, `None` when nothing matches.
    ///
    /// # Errors
    /// - `NonUniqueResult` when more than one row matches.
    pub fn fetch_one<P: Projection>(&self, query: &Query<P>) -> EngineResult<Option<P::Output>> {
        let mut rows = self.fetch_window(query, RowWindow::UniqueProbe)?;
        if rows.len() > 1 {
            return Err(EngineError::NonUniqueResult {
                returned: rows.len(),
            });
        }
        Ok(rows.pop())
    }

    /// First matching row in query order.
    pub fn fetch_first<P: Projection>(&self, query: &Query<P>) -> EngineResult<Option<P::Output>> {
        let rows = self.fetch_window(query, RowWindow::FirstOnly)?;
        Ok(rows.into_iter().next())
    }

    /// Window selected by the query's offset/limit, plus the unwindowed
    /// total. Runs the count and the list as two statements. An
    /// aggregate-only query has no window, so its single row is always listed.
    pub fn fetch_page<P: Projection>(&self, query: &Query<P>) -> EngineResult<Page<P::Output>> {
        query.projection().validate()?;
        let total = self.fetch_count(query)?;
        let windowed = !query.spec().is_aggregate_only();
        let results = if total == 0 || (windowed && query.spec().offset() >= total) {
            Vec::new()
        } else {
            self.fetch_window(query, RowWindow::Spec)?
        };
        Ok(Page {
            total,
            offset: query.spec().offset(),
            limit: query.spec().limit(),
            results,
        })
    }

    /// Number of rows (or groups) the query matches, ignoring order and
    /// window.
    pub fn fetch_count<P: Projection>(&self, query: &Query<P>) -> EngineResult<u64> {
        let statement = compile_count(query.spec())?;
        let rows = self.run_query("query_count", &statement)?;
        let value = rows
            .first()
            .and_then(|row| row.first())
            .cloned()
            .unwrap_or(Value::Integer(0));
        let count: i64 = decode_member("count", &value)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Runs a bulk update or delete; returns the affected-row count.
    pub fn execute_bulk(&self, statement: &BulkStatement) -> EngineResult<u64> {
        let compiled = compile_bulk(statement)?;
        let statement_id = Uuid::new_v4();
        let started_at = Instant::now();
        self.log_statement(statement_id, &compiled);

        match self.store.execute(&compiled) {
            Ok(affected) => {
                info!(
                    "event=bulk_execute module=engine status=ok statement_id={} kind={} target={} affected={} duration_ms={}",
                    statement_id,
                    statement.kind().as_str(),
                    statement.target().table(),
                    affected,
                    started_at.elapsed().as_millis()
                );
                Ok(affected)
            }
            Err(err) => {
                error!(
                    "event=bulk_execute module=engine status=error statement_id={} kind={} duration_ms={} error_code=store_execution_failed error={}",
                    statement_id,
                    statement.kind().as_str(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(EngineError::StoreExecution {
                    statement: compiled.sql,
                    source: err,
                })
            }
        }
    }

    fn fetch_window<P: Projection>(
        &self,
        query: &Query<P>,
        window: RowWindow,
    ) -> EngineResult<Vec<P::Output>> {
        query.projection().validate()?;
        let compiled = compile_select(query.spec(), window)?;
        let rows = self.run_query("query_fetch", &compiled.statement)?;

        let mut mapped = Vec::with_capacity(rows.len());
        for values in rows {
            let row = ResultRow::new(compiled.layout.clone(), values)?;
            mapped.push(query.projection().map_row(&row)?);
        }
        Ok(mapped)
    }

    fn run_query(
        &self,
        event: &str,
        statement: &CompiledStatement,
    ) -> EngineResult<Vec<Vec<Value>>> {
        let statement_id = Uuid::new_v4();
        let started_at = Instant::now();
        self.log_statement(statement_id, statement);

        match self.store.query(statement) {
            Ok(rows) => {
                debug!(
                    "event={event} module=engine status=ok statement_id={} rows={} duration_ms={}",
                    statement_id,
                    rows.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(rows)
            }
            Err(err) => {
                error!(
                    "event={event} module=engine status=error statement_id={} duration_ms={} error_code=store_execution_failed error={}",
                    statement_id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(EngineError::StoreExecution {
                    statement: statement.sql.clone(),
                    source: err,
                })
            }
        }
    }

    fn log_statement(&self, statement_id: Uuid, statement: &CompiledStatement) {
        if self.config.log_statements {
            debug!(
                "event=statement_compiled module=engine statement_id={} params={} sql={}",
                statement_id,
                statement.params.len(),
                statement_summary(&statement.sql)
            );
        }
    }
}
