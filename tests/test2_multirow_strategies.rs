use sql_mapper::accessor::{FieldAccessor, Record};
use sql_mapper::connection::SqlConnection;
use sql_mapper::context::MappingContext;
use sql_mapper::multirow::{MultiRowConfig, MultiRowStrategy};
use sql_mapper::prelude::{Session, SqliteConnection};
use sql_mapper::{RowValues, SqlMapperError};

#[derive(Debug, Default, Clone, PartialEq)]
struct Sample {
    id: i64,
    label: String,
}

impl Record for Sample {
    fn type_name() -> &'static str {
        "Sample"
    }

    fn accessors() -> Vec<FieldAccessor<Self>> {
        vec![
            FieldAccessor::field("id")
                .with_get(|s: &Sample| RowValues::Int(s.id))
                .with_set(|s, v| {
                    s.id = *v
                        .as_int()
                        .ok_or_else(|| SqlMapperError::Mapping("id expects an integer".into()))?;
                    Ok(())
                }),
            FieldAccessor::field("label")
                .with_get(|s: &Sample| RowValues::Text(s.label.clone()))
                .with_set(|s, v| {
                    s.label = v
                        .as_text()
                        .ok_or_else(|| SqlMapperError::Mapping("label expects text".into()))?
                        .to_string();
                    Ok(())
                }),
        ]
    }
}

fn samples(n: i64) -> Vec<Sample> {
    (1..=n)
        .map(|i| Sample {
            id: i,
            label: format!("row-{i}"),
        })
        .collect()
}

fn insert_with(strategy: MultiRowStrategy, records: &[Sample]) -> Result<Vec<Sample>, SqlMapperError> {
    let ctx = MappingContext::new().with_multi_row(MultiRowConfig {
        strategy,
        ..MultiRowConfig::default()
    });
    let mut conn = SqliteConnection::open_in_memory()?;
    conn.execute_script("create table samples (id integer not null, label text not null)")?;
    let mut session = Session::open(&ctx, conn)?;

    let counts = session.insert(records)?;
    assert_eq!(counts.iter().sum::<usize>(), records.len());
    session.read_list("select id, label from samples order by id", &[])
}

#[test]
fn strategies_produce_identical_table_state() -> Result<(), SqlMapperError> {
    for n in [0, 1, 31, 32, 33, 67] {
        let records = samples(n);
        let batch = insert_with(MultiRowStrategy::SimpleBatch, &records)?;
        let multirow = insert_with(MultiRowStrategy::MultiRowValues, &records)?;
        let combined = insert_with(MultiRowStrategy::MultiRowAndBatch, &records)?;
        assert_eq!(batch, records, "SimpleBatch, n={n}");
        assert_eq!(multirow, records, "MultiRowValues, n={n}");
        assert_eq!(combined, records, "MultiRowAndBatch, n={n}");
    }
    Ok(())
}

#[test]
fn multirow_merge_upserts_in_bulk() -> Result<(), SqlMapperError> {
    let ctx = MappingContext::new();
    let mut conn = SqliteConnection::open_in_memory()?;
    conn.execute_script("create table samples (id integer primary key, label text not null)")?;
    let mut session = Session::open(&ctx, conn)?;

    session.insert(&samples(40))?;

    let mut updated = samples(50);
    for s in &mut updated {
        s.label = format!("v2-{}", s.id);
    }
    session.merge(&updated)?;

    let all: Vec<Sample> = session.read_list("select id, label from samples order by id", &[])?;
    assert_eq!(all, updated);
    Ok(())
}

#[test]
fn batched_update_and_delete() -> Result<(), SqlMapperError> {
    let ctx = MappingContext::new();
    let mut conn = SqliteConnection::open_in_memory()?;
    conn.execute_script("create table samples (id integer primary key, label text not null)")?;
    let mut session = Session::open(&ctx, conn)?;

    let mut records = samples(10);
    session.insert(&records)?;

    for r in &mut records {
        r.label = format!("renamed-{}", r.id);
    }
    let counts = session.update(&records)?;
    assert_eq!(counts, vec![1; 10]);

    let (gone, kept) = records.split_at(4);
    let counts = session.delete(gone)?;
    assert_eq!(counts, vec![1; 4]);
    assert_eq!(session.read_all::<Sample>()?.len(), kept.len());
    Ok(())
}
