use sql_mapper::accessor::{FieldAccessor, Record};
use sql_mapper::connection::SqlConnection;
use sql_mapper::context::MappingContext;
use sql_mapper::prelude::{Session, SqliteConnection};
use sql_mapper::{RowValues, SqlMapperError};

#[derive(Debug, Default, Clone, PartialEq)]
struct Guest {
    id: i64,
    name: String,
}

impl Record for Guest {
    fn type_name() -> &'static str {
        "Guest"
    }

    fn accessors() -> Vec<FieldAccessor<Self>> {
        vec![
            FieldAccessor::field("id")
                .with_get(|g: &Guest| RowValues::Int(g.id))
                .with_set(|g, v| {
                    g.id = *v
                        .as_int()
                        .ok_or_else(|| SqlMapperError::Mapping("id expects an integer".into()))?;
                    Ok(())
                }),
            FieldAccessor::field("name")
                .with_get(|g: &Guest| RowValues::Text(g.name.clone()))
                .with_set(|g, v| {
                    g.name = v
                        .as_text()
                        .ok_or_else(|| SqlMapperError::Mapping("name expects text".into()))?
                        .to_string();
                    Ok(())
                }),
        ]
    }
}

fn open_session(ctx: &MappingContext) -> Result<Session<'_, SqliteConnection>, SqlMapperError> {
    let mut conn = SqliteConnection::open_in_memory()?;
    conn.execute_script(
        "create table guests (id integer primary key autoincrement, name text not null)",
    )?;
    Session::open(ctx, conn)
}

#[test]
fn insert_and_get_fills_generated_key() -> Result<(), SqlMapperError> {
    let ctx = MappingContext::new();
    let mut session = open_session(&ctx)?;

    let ada = session.insert_and_get(Guest {
        id: 0,
        name: "ada".into(),
    })?;
    assert_eq!(ada.id, 1);

    let bob = session.insert_and_get(Guest {
        id: 0,
        name: "bob".into(),
    })?;
    assert_eq!(bob.id, 2);
    Ok(())
}

#[test]
fn crud_round_trip() -> Result<(), SqlMapperError> {
    let ctx = MappingContext::new();
    let mut session = open_session(&ctx)?;

    let mut ada = session.insert_and_get(Guest {
        id: 0,
        name: "ada".into(),
    })?;

    let found: Option<Guest> = session.read_by_primary_key(&[RowValues::Int(ada.id)])?;
    assert_eq!(found.as_ref(), Some(&ada));
    assert!(session.exists(&ada)?);

    ada.name = "ada lovelace".into();
    assert_eq!(session.update_one(&ada)?, 1);
    let reread: Guest = session.read_one(
        "select id, name from guests where id = ?",
        &[RowValues::Int(ada.id)],
    )?;
    assert_eq!(reread.name, "ada lovelace");

    assert_eq!(session.delete_one(&ada)?, 1);
    assert!(!session.exists(&ada)?);
    assert!(session.read_all::<Guest>()?.is_empty());
    Ok(())
}

#[test]
fn merge_inserts_then_updates() -> Result<(), SqlMapperError> {
    let ctx = MappingContext::new();
    let mut session = open_session(&ctx)?;

    let guest = Guest {
        id: 7,
        name: "grace".into(),
    };
    session.merge_one(&guest)?;
    session.merge_one(&Guest {
        id: 7,
        name: "grace hopper".into(),
    })?;

    let all = session.read_all::<Guest>()?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "grace hopper");
    Ok(())
}

#[test]
fn transaction_rollback_and_commit() -> Result<(), SqlMapperError> {
    let ctx = MappingContext::new();
    let mut session = open_session(&ctx)?;

    session.begin_transaction()?;
    session.insert_one(&Guest {
        id: 0,
        name: "ghost".into(),
    })?;
    session.rollback()?;
    assert!(session.read_all::<Guest>()?.is_empty());

    session.begin_transaction()?;
    session.insert_one(&Guest {
        id: 0,
        name: "kept".into(),
    })?;
    session.commit()?;
    assert_eq!(session.read_all::<Guest>()?.len(), 1);
    Ok(())
}

#[test]
fn file_backed_database_persists() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("guests.db");
    let ctx = MappingContext::new();

    {
        let mut conn = SqliteConnection::open(&path)?;
        conn.execute_script(
            "create table guests (id integer primary key autoincrement, name text not null)",
        )?;
        let mut session = Session::open(&ctx, conn)?;
        session.insert_one(&Guest {
            id: 0,
            name: "ada".into(),
        })?;
    }

    let mut session = Session::open(&ctx, SqliteConnection::open(&path)?)?;
    assert_eq!(session.read_all::<Guest>()?.len(), 1);
    Ok(())
}
