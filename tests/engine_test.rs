//! Storage Engine Tests
//!
//! A table heap and a secondary index driven together through
//! [`StorageEngine`], including a close and reopen of the database file.

use std::sync::Arc;

use ministore::common::PageId;
use ministore::record::{Column, Field, Row, Schema};
use ministore::{IndexId, StorageConfig, StorageEngine};

fn people_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Column::int("id", 0).with_unique(true),
        Column::char("name", 32, 1),
        Column::float("score", 2).with_nullable(true),
    ]))
}

fn person(id: i32) -> Row {
    let score = if id % 5 == 0 {
        Field::Null
    } else {
        Field::Float(id as f32 / 2.0)
    };
    Row::new(vec![Field::Int(id), Field::Char(format!("person-{:04}", id)), score])
}

fn id_key(id: i32) -> Row {
    Row::new(vec![Field::Int(id)])
}

#[test]
fn test_table_with_index_across_reopen() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");
    let schema = people_schema();
    let key_schema = schema.project(&["id"]).unwrap();
    let config = StorageConfig::default()
        .with_pool_size(16)
        .with_leaf_max_size(8)
        .with_internal_max_size(8);

    let first_page: PageId = {
        let engine = StorageEngine::open(&path, config).unwrap();
        let mut table = engine.create_table(schema.clone()).unwrap();
        let mut index = engine.open_index(IndexId(1), key_schema.clone()).unwrap();

        for id in (0..300).rev() {
            let mut row = person(id);
            let rid = table.insert_tuple(&mut row).unwrap();
            let key = row.key_from_row(&schema, &key_schema).unwrap();
            assert!(index.insert_entry(&key, rid).unwrap());
        }

        // Drop every third person from both structures.
        for id in (0..300).step_by(3) {
            let rid = index.scan_key(&id_key(id)).unwrap().unwrap();
            assert!(table.mark_delete(rid).unwrap());
            assert!(table.apply_delete(rid).unwrap());
            assert!(index.remove_entry(&id_key(id)).unwrap());
        }

        let first = table.first_page_id();
        drop(index);
        drop(table);
        engine.close().unwrap();
        first
    };

    let engine = StorageEngine::open(&path, config).unwrap();
    let table = engine.open_table(first_page, schema.clone()).unwrap();
    let index = engine.open_index(IndexId(1), key_schema).unwrap();

    let live: Vec<i32> = (0..300).filter(|id| id % 3 != 0).collect();
    assert_eq!(table.iter().unwrap().count(), live.len());

    // Index order is key order regardless of insertion order.
    let indexed: Vec<i32> = index
        .begin()
        .unwrap()
        .map(|entry| {
            let (key, _) = entry.unwrap();
            match index.key_manager().deserialize_key(&key).unwrap().field(0) {
                Some(Field::Int(v)) => *v,
                other => panic!("unexpected key {:?}", other),
            }
        })
        .collect();
    assert_eq!(indexed, live);

    for id in [1, 2, 100, 298] {
        let rid = index.scan_key(&id_key(id)).unwrap().unwrap();
        let row = table.get_tuple(rid).unwrap().unwrap();
        assert_eq!(row.fields(), person(id).fields());
    }
    assert!(index.scan_key(&id_key(99)).unwrap().is_none());
    assert!(engine.bpm().check_all_unpinned());
}

#[test]
fn test_update_then_relocate() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open(dir.path().join("upd.db"), StorageConfig::default()).unwrap();
    let schema = Arc::new(Schema::new(vec![Column::char("body", 4000, 0)]));
    let mut table = engine.create_table(schema).unwrap();

    let mut a = Row::new(vec![Field::Char("a".repeat(1800))]);
    let mut b = Row::new(vec![Field::Char("b".repeat(1800))]);
    let rid_a = table.insert_tuple(&mut a).unwrap();
    let rid_b = table.insert_tuple(&mut b).unwrap();
    assert_eq!(rid_a.page_id, rid_b.page_id);

    // Growing `a` past the page's free space fails in place...
    let grown = Row::new(vec![Field::Char("A".repeat(3000))]);
    assert!(!table.update_tuple(&grown, rid_a).unwrap());

    // ...so the caller deletes and reinserts it elsewhere.
    assert!(table.mark_delete(rid_a).unwrap());
    assert!(table.apply_delete(rid_a).unwrap());
    let mut moved = grown.clone();
    let new_rid = table.insert_tuple(&mut moved).unwrap();
    assert_ne!(new_rid.page_id, rid_b.page_id);

    let bodies: Vec<usize> = table
        .iter()
        .unwrap()
        .map(|row| match row.unwrap().field(0) {
            Some(Field::Char(s)) => s.len(),
            other => panic!("unexpected field {:?}", other),
        })
        .collect();
    assert_eq!(bodies, [1800, 3000]);
}
