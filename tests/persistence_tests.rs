//! Catalog bootstrap round trips: whatever a closed database persisted must
//! come back identically on reopen.

use acorndb::{Database, Record, Value};

fn simple_values(row: &Record) -> Vec<Value> {
    match row {
        Record::Simple(simple) => simple.values.clone(),
        other => panic!("expected a simple record, got {other:?}"),
    }
}

#[test]
fn test_bootstrap_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let mut db = Database::open(&path).unwrap();
        db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
            .unwrap();
        db.execute("INSERT INTO p (id, n) VALUES (1, 'a'); INSERT INTO p (id, n) VALUES (2, 'b')")
            .unwrap();
    }

    let mut db = Database::open(&path).unwrap();
    let rows = db.query("SELECT * FROM p").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        simple_values(&rows[0]),
        vec![Value::Integer(1), Value::Text("a".into())]
    );
    assert_eq!(
        simple_values(&rows[1]),
        vec![Value::Integer(2), Value::Text("b".into())]
    );
}

#[test]
fn test_reopened_schema_still_validates_inserts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let mut db = Database::open(&path).unwrap();
        db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT NOT NULL, score REAL)")
            .unwrap();
    }

    let mut db = Database::open(&path).unwrap();
    // the bootstrapped schema enforces the same constraints as the original
    let results = db.execute("INSERT INTO p (id) VALUES (1)").unwrap();
    assert!(results[0].is_err());
    db.execute("INSERT INTO p (id, n, score) VALUES (1, 'a', 0.5)")
        .unwrap();
    assert_eq!(db.query("SELECT * FROM p").unwrap().len(), 1);
}

#[test]
fn test_multiple_tables_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let mut db = Database::open(&path).unwrap();
        for t in ["a", "b", "c"] {
            db.execute(&format!("CREATE TABLE {t} (id INT PRIMARY KEY, v TEXT)"))
                .unwrap();
            db.execute(&format!("INSERT INTO {t} (id, v) VALUES (1, '{t}')"))
                .unwrap();
        }
    }

    let mut db = Database::open(&path).unwrap();
    assert_eq!(db.query("SELECT * FROM catalog").unwrap().len(), 3);
    for t in ["a", "b", "c"] {
        let rows = db.query(&format!("SELECT * FROM {t}")).unwrap();
        assert_eq!(
            simple_values(&rows[0]),
            vec![Value::Integer(1), Value::Text(t.into())]
        );
    }
}

#[test]
fn test_deletes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let mut db = Database::open(&path).unwrap();
        db.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();
        for id in 1..=5 {
            db.execute(&format!("INSERT INTO p (id) VALUES ({id})"))
                .unwrap();
        }
        db.execute("DELETE FROM p WHERE id <= 3").unwrap();
    }

    let mut db = Database::open(&path).unwrap();
    let rows = db.query("SELECT * FROM p").unwrap();
    let ids: Vec<Value> = rows.iter().map(|r| simple_values(r)[0].clone()).collect();
    assert_eq!(ids, vec![Value::Integer(4), Value::Integer(5)]);
}

#[test]
fn test_many_rows_round_trip_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    // enough rows to split leaves, inserted in reverse order
    {
        let mut db = Database::open(&path).unwrap();
        db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
            .unwrap();
        for id in (0..300).rev() {
            db.execute(&format!("INSERT INTO p (id, n) VALUES ({id}, 'row{id}')"))
                .unwrap();
        }
    }

    let mut db = Database::open(&path).unwrap();
    let rows = db.query("SELECT * FROM p").unwrap();
    assert_eq!(rows.len(), 300);
    for (expected, row) in rows.iter().enumerate() {
        let values = simple_values(row);
        assert_eq!(values[0], Value::Integer(expected as i64));
        assert_eq!(values[1], Value::Text(format!("row{expected}")));
    }
}
