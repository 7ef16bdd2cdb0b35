//! Typed relational query construction and execution.
//! Queries are composed from typed expressions, compiled to SQLite and
//! mapped back into caller-chosen shapes.

pub mod config;
pub mod db;
pub mod demo;
pub mod engine;
pub mod expr;
pub mod logging;
pub mod model;
pub mod predicate;
pub mod projection;
pub mod query;

pub use config::{ConfigError, EngineConfig};
pub use db::{
    open_store, open_store_in_memory, CompiledStatement, DbError, DbResult, SqliteStore,
    StoreAdapter,
};
pub use engine::{
    compile_bulk, compile_count, compile_query, CompiledQuery, Engine, EngineError,
    EngineResult, Page,
};
pub use expr::{apply, case_when, constant, literal, subquery, Expr, ExprNode, IntoExpr};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{Association, ColumnDef, Entity, EntityPath, RelationRef};
pub use model::value::{Bool, FromValue, Int, Real, SqlType, Text, Value, ValueKind};
pub use predicate::{IntoCondition, Predicate, PredicateBuilder};
pub use projection::{Nullable, Projection, ProjectionError, ProjectionResult, Projections, Tuple};
pub use query::{
    BuildError, BuildResult, BuilderState, BulkStatement, DeleteBuilder, Query, QueryBuilder,
    UpdateBuilder,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
