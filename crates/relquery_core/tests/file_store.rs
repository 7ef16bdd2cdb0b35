use relquery_core::db::open_store;
use relquery_core::demo::{seed_sample_data, QMember, QTeam};
use relquery_core::{Engine, EngineConfig, Projections, QueryBuilder, SqliteStore};
use std::thread;

#[test]
fn concurrent_readers_each_open_their_own_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relquery.sqlite3");
    let config = EngineConfig::default();
    {
        let conn = open_store(&path, &config).unwrap();
        seed_sample_data(&conn).unwrap();
    }

    let totals: Vec<u64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let conn = open_store(&path, &config).unwrap();
                    let engine = Engine::with_config(SqliteStore::new(&conn), config.clone());
                    let member = QMember::default();
                    QueryBuilder::select_from(&member.entity)
                        .fetch_count(&engine)
                        .unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });
    assert_eq!(totals, vec![4, 4, 4, 4]);
}

#[test]
fn finalized_query_is_shared_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relquery.sqlite3");
    let config = EngineConfig::default();
    {
        let conn = open_store(&path, &config).unwrap();
        seed_sample_data(&conn).unwrap();
    }

    let member = QMember::default();
    let team = QTeam::default();
    let query = QueryBuilder::select(Projections::tuple([
        team.name.item(),
        member.count().item(),
    ]))
    .from(&member.entity)
    .join(member.team(&team))
    .group_by(&team.name)
    .order_by(team.name.asc())
    .build()
    .unwrap();

    thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| {
                let conn = open_store(&path, &config).unwrap();
                let engine = Engine::new(SqliteStore::new(&conn));
                let rows = engine.fetch_list(&query).unwrap();
                let counts: Vec<Option<i64>> = rows
                    .iter()
                    .map(|row| row.get(&member.count()).unwrap())
                    .collect();
                assert_eq!(counts, vec![Some(2), Some(2)]);
            });
        }
    });
}
