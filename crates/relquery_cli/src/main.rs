//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run a few queries against an in-memory copy of the sample schema.
//! - Keep output deterministic for quick local sanity checks.
//! - Log events go to `RELQUERY_LOG_DIR`, or a `relquery/logs` directory
//!   under the system temp dir.

use log::info;
use relquery_core::demo::{seed_sample_data, QMember, QTeam};
use relquery_core::{
    core_version, default_log_level, init_logging, open_store_in_memory, Engine, EngineConfig,
    Projections, QueryBuilder, SqliteStore,
};
use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

fn log_dir() -> PathBuf {
    env::var_os("RELQUERY_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("relquery").join("logs"))
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::default();
    let conn = open_store_in_memory(&config)?;
    seed_sample_data(&conn)?;
    let engine = Engine::with_config(SqliteStore::new(&conn), config);
    info!("event=cli_run module=cli status=start");

    let member = QMember::default();
    let team = QTeam::default();

    let total = QueryBuilder::select_from(&member.entity).fetch_count(&engine)?;
    println!("members={total}");

    let stats = QueryBuilder::select(Projections::tuple([
        member.count().item(),
        member.age.sum().item(),
        member.age.avg().item(),
    ]))
    .from(&member.entity)
    .fetch_one(&engine)?;
    if let Some(stats) = stats {
        println!("count,sum,avg={stats}");
    }

    let per_team = QueryBuilder::select(Projections::tuple([
        team.name.item(),
        member.age.avg().item(),
    ]))
    .from(&member.entity)
    .join(member.team(&team))
    .group_by(&team.name)
    .order_by(team.name.asc())
    .fetch(&engine)?;
    for row in per_team {
        println!("team,avg_age={row}");
    }

    let page = QueryBuilder::select(member.username.nullable())
        .from(&member.entity)
        .order_by(member.age.desc())
        .offset(1)
        .limit(2)
        .fetch_page(&engine)?;
    println!("page total={} usernames={:?}", page.total, page.results);
    Ok(())
}

fn main() -> ExitCode {
    println!("relquery_core version={}", core_version());
    let log_dir = log_dir();
    if let Err(err) = init_logging(default_log_level(), &log_dir.to_string_lossy()) {
        eprintln!("relquery: logging disabled: {err}");
    }
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("relquery: {err}");
            ExitCode::FAILURE
        }
    }
}
