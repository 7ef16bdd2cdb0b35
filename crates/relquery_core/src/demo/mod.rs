//! Sample `team`/`member` schema with entity mappings, query handles and
//! result shapes.
//!
//! Used by the CLI smoke run and by tests; it also shows what a caller
//! declares to make its own tables queryable.

use crate::db::DbResult;
use crate::expr::Expr;
use crate::model::entity::{Association, ColumnDef, Entity, EntityPath, RelationRef};
use crate::model::value::{Int, Text, Value, ValueKind};
use crate::projection::{
    decode_member, decode_required, ConstructorShape, FieldShape, MemberDef, ProjectionError,
    ProjectionResult, Setter, SetterShape, Shape,
};
use rusqlite::{params, Connection};

pub const SAMPLE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS team (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS member (
    id INTEGER PRIMARY KEY,
    username TEXT,
    age INTEGER NOT NULL,
    team_id INTEGER REFERENCES team(id)
);
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

impl Entity for Team {
    const TABLE: &'static str = "team";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::required("id", ValueKind::Integer),
        ColumnDef::required("name", ValueKind::Text),
    ];

    fn from_values(values: &[Value]) -> ProjectionResult<Self> {
        let [id, name] = values else {
            return Err(ProjectionError::ArityMismatch {
                expected: Self::COLUMNS.len(),
                found: values.len(),
            });
        };
        Ok(Self {
            id: decode_required("team.id", id)?,
            name: decode_required("team.name", name)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: i64,
    pub username: Option<String>,
    pub age: i64,
    pub team_id: Option<i64>,
    /// Set only when the team was fetch-joined.
    pub team: Option<Team>,
}

impl Entity for Member {
    const TABLE: &'static str = "member";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::required("id", ValueKind::Integer),
        ColumnDef::nullable("username", ValueKind::Text),
        ColumnDef::required("age", ValueKind::Integer),
        ColumnDef::nullable("team_id", ValueKind::Integer),
    ];

    fn from_values(values: &[Value]) -> ProjectionResult<Self> {
        let [id, username, age, team_id] = values else {
            return Err(ProjectionError::ArityMismatch {
                expected: Self::COLUMNS.len(),
                found: values.len(),
            });
        };
        Ok(Self {
            id: decode_required("member.id", id)?,
            username: decode_member("member.username", username)?,
            age: decode_required("member.age", age)?,
            team_id: decode_member("member.team_id", team_id)?,
            team: None,
        })
    }

    fn attach(&mut self, relation: &RelationRef, values: &[Value]) -> ProjectionResult<()> {
        // A left fetch join without a match yields an all-NULL slot.
        if relation.table() == Team::TABLE && values.iter().any(|value| !value.is_null()) {
            self.team = Some(Team::from_values(values)?);
        }
        Ok(())
    }
}

/// Query handle for `team`.
#[derive(Debug, Clone)]
pub struct QTeam {
    pub entity: EntityPath<Team>,
    pub id: Expr<Int>,
    pub name: Expr<Text>,
}

impl QTeam {
    pub fn new(alias: &str) -> Self {
        let entity = EntityPath::<Team>::new(alias);
        Self {
            id: entity.column("id"),
            name: entity.column("name"),
            entity,
        }
    }
}

impl Default for QTeam {
    fn default() -> Self {
        Self::new("team")
    }
}

/// Query handle for `member`.
#[derive(Debug, Clone)]
pub struct QMember {
    pub entity: EntityPath<Member>,
    pub id: Expr<Int>,
    pub username: Expr<Text>,
    pub age: Expr<Int>,
    pub team_id: Expr<Int>,
}

impl QMember {
    pub fn new(alias: &str) -> Self {
        let entity = EntityPath::<Member>::new(alias);
        Self {
            id: entity.column("id"),
            username: entity.column("username"),
            age: entity.column("age"),
            team_id: entity.column("team_id"),
            entity,
        }
    }

    /// `member.team_id -> team.id`.
    pub fn team(&self, team: &QTeam) -> Association {
        Association::new(&self.team_id, &team.entity, "id")
    }

    pub fn count(&self) -> Expr<Int> {
        self.entity.count()
    }
}

impl Default for QMember {
    fn default() -> Self {
        Self::new("member")
    }
}

/// Member summary usable with every assignment strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDto {
    pub username: String,
    pub age: i64,
}

impl Shape for MemberDto {
    const NAME: &'static str = "MemberDto";
}

impl FieldShape for MemberDto {
    const FIELDS: &'static [MemberDef] = &[
        MemberDef::new("username", ValueKind::Text),
        MemberDef::new("age", ValueKind::Integer),
    ];

    fn assign_field(&mut self, name: &str, value: &Value) -> ProjectionResult<()> {
        match name {
            "username" => self.username = decode_required(name, value)?,
            "age" => self.age = decode_required(name, value)?,
            other => {
                return Err(ProjectionError::UnknownMember {
                    shape: Self::NAME,
                    member: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

impl MemberDto {
    pub fn set_username(&mut self, value: &Value) -> ProjectionResult<()> {
        self.username = decode_required("username", value)?;
        Ok(())
    }

    pub fn set_age(&mut self, value: &Value) -> ProjectionResult<()> {
        self.age = decode_required("age", value)?;
        Ok(())
    }
}

impl SetterShape for MemberDto {
    fn setter(name: &str) -> Option<(ValueKind, Setter<Self>)> {
        match name {
            "username" => Some((ValueKind::Text, Self::set_username as Setter<Self>)),
            "age" => Some((ValueKind::Integer, Self::set_age as Setter<Self>)),
            _ => None,
        }
    }
}

impl ConstructorShape for MemberDto {
    const PARAMETERS: &'static [ValueKind] = &[ValueKind::Text, ValueKind::Integer];

    fn construct(args: &[Value]) -> ProjectionResult<Self> {
        let [username, age] = args else {
            return Err(ProjectionError::ArityMismatch {
                expected: Self::PARAMETERS.len(),
                found: args.len(),
            });
        };
        Ok(Self {
            username: decode_required("MemberDto#0", username)?,
            age: decode_required("MemberDto#1", age)?,
        })
    }
}

/// Differently named target; bindings reach it through aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDto {
    pub name: String,
    pub userage: i64,
}

impl Shape for UserDto {
    const NAME: &'static str = "UserDto";
}

impl FieldShape for UserDto {
    const FIELDS: &'static [MemberDef] = &[
        MemberDef::new("name", ValueKind::Text),
        MemberDef::new("userage", ValueKind::Integer),
    ];

    fn assign_field(&mut self, name: &str, value: &Value) -> ProjectionResult<()> {
        match name {
            "name" => self.name = decode_required(name, value)?,
            "userage" => self.userage = decode_required(name, value)?,
            other => {
                return Err(ProjectionError::UnknownMember {
                    shape: Self::NAME,
                    member: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

impl ConstructorShape for UserDto {
    const PARAMETERS: &'static [ValueKind] = &[ValueKind::Text, ValueKind::Integer];

    fn construct(args: &[Value]) -> ProjectionResult<Self> {
        let [name, userage] = args else {
            return Err(ProjectionError::ArityMismatch {
                expected: Self::PARAMETERS.len(),
                found: args.len(),
            });
        };
        Ok(Self {
            name: decode_required("UserDto#0", name)?,
            userage: decode_required("UserDto#1", userage)?,
        })
    }
}

/// Creates the sample tables when missing.
pub fn install_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(SAMPLE_SCHEMA)?;
    Ok(())
}

/// Inserts a team and returns its id.
pub fn insert_team(conn: &Connection, name: &str) -> DbResult<i64> {
    conn.execute("INSERT INTO team (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a member and returns its id.
pub fn insert_member(
    conn: &Connection,
    username: Option<&str>,
    age: i64,
    team_id: Option<i64>,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO member (username, age, team_id) VALUES (?1, ?2, ?3)",
        params![username, age, team_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Two teams and four members: `member1..member4` aged 10, 20, 30, 40;
/// the first two in `teamA`, the others in `teamB`.
pub fn seed_sample_data(conn: &Connection) -> DbResult<()> {
    install_schema(conn)?;
    let team_a = insert_team(conn, "teamA")?;
    let team_b = insert_team(conn, "teamB")?;
    insert_member(conn, Some("member1"), 10, Some(team_a))?;
    insert_member(conn, Some("member2"), 20, Some(team_a))?;
    insert_member(conn, Some("member3"), 30, Some(team_b))?;
    insert_member(conn, Some("member4"), 40, Some(team_b))?;
    Ok(())
}
