use relquery_core::db::open_store_in_memory;
use relquery_core::demo::{insert_member, seed_sample_data, QMember, QTeam};
use relquery_core::predicate::{self, Predicate, PredicateBuilder};
use relquery_core::{Engine, EngineConfig, EngineError, Projections, QueryBuilder, SqliteStore};
use rusqlite::Connection;

fn seeded() -> Connection {
    let conn = open_store_in_memory(&EngineConfig::default()).unwrap();
    seed_sample_data(&conn).unwrap();
    conn
}

#[test]
fn select_from_with_equality_filter() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let found = QueryBuilder::select_from(&member.entity)
        .filter(member.username.eq("member1"))
        .fetch_one(&engine)
        .unwrap()
        .unwrap();
    assert_eq!(found.username.as_deref(), Some("member1"));
    assert_eq!(found.age, 10);
}

#[test]
fn and_chain_matches_filter_all() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let chained = QueryBuilder::select_from(&member.entity)
        .filter(member.username.eq("member1").and(member.age.between(10, 30)))
        .fetch(&engine)
        .unwrap();
    let variadic = QueryBuilder::select_from(&member.entity)
        .filter_all([
            Some(member.username.eq("member1")),
            None,
            Some(member.age.between(10, 30)),
        ])
        .fetch(&engine)
        .unwrap();
    assert_eq!(chained.len(), 1);
    assert_eq!(chained, variadic);
}

#[test]
fn aggregates_over_sample_ages() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let row = QueryBuilder::select(Projections::tuple([
        member.count().item(),
        member.age.sum().item(),
        member.age.avg().item(),
        member.age.max().item(),
        member.age.min().item(),
    ]))
    .from(&member.entity)
    .fetch_one(&engine)
    .unwrap()
    .unwrap();

    assert_eq!(row.get(&member.count()).unwrap(), Some(4));
    assert_eq!(row.get(&member.age.sum()).unwrap(), Some(100));
    assert_eq!(row.get(&member.age.avg()).unwrap(), Some(25.0));
    assert_eq!(row.get(&member.age.max()).unwrap(), Some(40));
    assert_eq!(row.get(&member.age.min()).unwrap(), Some(10));
}

#[test]
fn aggregate_select_ignores_offset_and_limit() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let total = QueryBuilder::select(member.age.sum())
        .from(&member.entity)
        .offset(3)
        .limit(1)
        .fetch_one(&engine)
        .unwrap();
    assert_eq!(total, Some(100));
}

#[test]
fn group_by_team_with_having() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();
    let team = QTeam::default();

    let rows = QueryBuilder::select(Projections::tuple([
        team.name.item(),
        member.age.avg().item(),
    ]))
    .from(&member.entity)
    .join(member.team(&team))
    .group_by(&team.name)
    .having(member.age.avg().gt(2.0))
    .order_by(team.name.asc())
    .fetch(&engine)
    .unwrap();

    let summary: Vec<(Option<String>, Option<f64>)> = rows
        .iter()
        .map(|row| {
            (
                row.get(&team.name).unwrap(),
                row.get(&member.age.avg()).unwrap(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (Some("teamA".to_string()), Some(15.0)),
            (Some("teamB".to_string()), Some(35.0)),
        ]
    );
}

#[test]
fn having_may_use_aggregate_outside_select() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();
    let team = QTeam::default();

    let names = QueryBuilder::select(team.name.clone())
        .from(&member.entity)
        .join(member.team(&team))
        .group_by(&team.name)
        .having(member.age.max().gt(30))
        .fetch(&engine)
        .unwrap();
    assert_eq!(names, vec!["teamB".to_string()]);
}

#[test]
fn order_with_nulls_last() {
    let conn = seeded();
    insert_member(&conn, None, 100, None).unwrap();
    insert_member(&conn, Some("member5"), 100, None).unwrap();
    insert_member(&conn, Some("member6"), 100, None).unwrap();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let names = QueryBuilder::select(member.username.nullable())
        .from(&member.entity)
        .filter(member.age.eq(100))
        .order_by(member.age.desc())
        .order_by(member.username.asc().nulls_last())
        .fetch(&engine)
        .unwrap();
    assert_eq!(
        names,
        vec![Some("member5".to_string()), Some("member6".to_string()), None]
    );
}

#[test]
fn non_null_scalar_projection_rejects_null() {
    let conn = seeded();
    insert_member(&conn, None, 50, None).unwrap();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let err = QueryBuilder::select(member.username.clone())
        .from(&member.entity)
        .filter(member.age.eq(50))
        .fetch(&engine)
        .unwrap_err();
    assert!(matches!(err, EngineError::Projection(_)));
}

#[test]
fn page_reports_total_independent_of_window() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let page = QueryBuilder::select(member.username.clone())
        .from(&member.entity)
        .order_by(member.username.desc())
        .offset(1)
        .limit(2)
        .fetch_page(&engine)
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.offset, 1);
    assert_eq!(page.limit, Some(2));
    assert_eq!(page.results, vec!["member3".to_string(), "member2".to_string()]);
    assert!(page.has_more());

    let past_end = QueryBuilder::select(member.username.clone())
        .from(&member.entity)
        .offset(10)
        .limit(2)
        .fetch_page(&engine)
        .unwrap();
    assert_eq!(past_end.total, 4);
    assert!(past_end.results.is_empty());
}

#[test]
fn aggregate_page_keeps_its_single_row() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let query = QueryBuilder::select(member.age.sum())
        .from(&member.entity)
        .offset(3)
        .limit(1)
        .build()
        .unwrap();
    let page = engine.fetch_page(&query).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.results, vec![100]);
    assert_eq!(page.results, engine.fetch_list(&query).unwrap());
    assert!(!page.has_more());
}

#[test]
fn aggregate_condition_ignores_offset() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let oldest_above_thirty = QueryBuilder::select(member.age.max().gt(30).into_expr())
        .from(&member.entity)
        .offset(1)
        .fetch_one(&engine)
        .unwrap();
    assert_eq!(oldest_above_thirty, Some(true));
}

#[test]
fn ordered_windows_are_stable_and_partition_the_list() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();
    let ordered = || {
        QueryBuilder::select(member.username.clone())
            .from(&member.entity)
            .order_by(member.age.asc())
    };

    let all = ordered().fetch(&engine).unwrap();
    let first = ordered().limit(2).fetch_page(&engine).unwrap();
    let second = ordered().offset(2).limit(2).fetch_page(&engine).unwrap();
    assert_eq!(first.results, ordered().limit(2).fetch(&engine).unwrap());
    let mut joined = first.results.clone();
    joined.extend(second.results);
    assert_eq!(joined, all);
}

#[test]
fn grouped_page_counts_groups() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();
    let team = QTeam::default();

    let page = QueryBuilder::select(team.name.clone())
        .from(&member.entity)
        .join(member.team(&team))
        .group_by(&team.name)
        .order_by(team.name.asc())
        .limit(1)
        .fetch_page(&engine)
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.results, vec!["teamA".to_string()]);
}

#[test]
fn fetch_one_distinguishes_none_one_and_many() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let missing = QueryBuilder::select_from(&member.entity)
        .filter(member.username.eq("nobody"))
        .fetch_one(&engine)
        .unwrap();
    assert!(missing.is_none());

    let err = QueryBuilder::select_from(&member.entity)
        .fetch_one(&engine)
        .unwrap_err();
    assert!(matches!(err, EngineError::NonUniqueResult { returned: 2 }));
}

#[test]
fn fetch_first_matches_head_of_list() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let query = QueryBuilder::select_from(&member.entity)
        .order_by(member.age.desc())
        .build()
        .unwrap();
    let first = engine.fetch_first(&query).unwrap().unwrap();
    let list = engine.fetch_list(&query).unwrap();
    assert_eq!(first, list[0]);
    assert_eq!(first.username.as_deref(), Some("member4"));
}

#[test]
fn fetch_first_without_order_returns_some_matching_row() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let query = QueryBuilder::select_from(&member.entity)
        .filter(member.age.gt(15))
        .build()
        .unwrap();
    let first = engine.fetch_first(&query).unwrap().unwrap();
    let list = engine.fetch_list(&query).unwrap();
    assert_eq!(list.len(), 3);
    assert!(list.contains(&first));
}

#[test]
fn count_ignores_order_and_window() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let count = QueryBuilder::select_from(&member.entity)
        .filter(member.age.gt(15))
        .order_by(member.age.asc())
        .limit(1)
        .fetch_count(&engine)
        .unwrap();
    assert_eq!(count, 3);
}

fn search(member: &QMember, username: Option<&str>, age: Option<i64>) -> Option<Predicate> {
    predicate::and([
        username.map(|name| member.username.eq(name)),
        age.map(|age| member.age.eq(age)),
    ])
}

#[test]
fn dynamic_predicates_skip_absent_parameters() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let count = |condition: Option<Predicate>| {
        QueryBuilder::select_from(&member.entity)
            .filter(condition)
            .fetch_count(&engine)
            .unwrap()
    };
    assert_eq!(count(search(&member, Some("member1"), Some(10))), 1);
    assert_eq!(count(search(&member, Some("member1"), Some(20))), 0);
    assert_eq!(count(search(&member, None, Some(20))), 1);
    assert_eq!(count(search(&member, None, None)), 4);
}

#[test]
fn predicate_builder_accumulates_conditions() {
    let conn = seeded();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let mut builder = PredicateBuilder::new();
    builder.or(member.age.eq(10));
    builder.or(member.age.eq(40));
    builder.and_not(member.username.eq("member4"));

    let names = QueryBuilder::select(member.username.clone())
        .from(&member.entity)
        .filter(&builder)
        .fetch(&engine)
        .unwrap();
    assert_eq!(names, vec!["member1".to_string()]);
}

#[test]
fn string_predicates_escape_wildcards() {
    let conn = seeded();
    insert_member(&conn, Some("50%_off"), 5, None).unwrap();
    let engine = Engine::new(SqliteStore::new(&conn));
    let member = QMember::default();

    let count = |condition: Predicate| {
        QueryBuilder::select_from(&member.entity)
            .filter(condition)
            .fetch_count(&engine)
            .unwrap()
    };
    assert_eq!(count(member.username.starts_with("member")), 4);
    assert_eq!(count(member.username.contains("%_")), 1);
    assert_eq!(count(member.username.contains("r_")), 0);
    assert_eq!(count(member.age.in_list([10, 30])), 2);
    assert_eq!(count(member.age.not_in_list(Vec::<i64>::new())), 5);
    assert_eq!(count(member.team_id.is_null()), 1);
}
