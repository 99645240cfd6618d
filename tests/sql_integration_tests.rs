//! End-to-end SQL scenarios against a file-backed database.

use acorndb::{Database, Error, Record, StatementOutcome, Value};

fn open_db(dir: &tempfile::TempDir) -> Database {
    Database::open(dir.path().join("test.db")).unwrap()
}

fn simple_values(row: &Record) -> Vec<Value> {
    match row {
        Record::Simple(simple) => simple.values.clone(),
        other => panic!("expected a simple record, got {other:?}"),
    }
}

#[test]
fn test_create_insert_select() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();
    db.execute("INSERT INTO p (id, n) VALUES (1, 'a'); INSERT INTO p (id, n) VALUES (2, 'b')")
        .unwrap();

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
fn test_select_with_where_filter() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();
    db.execute("INSERT INTO p (id, n) VALUES (1, 'a'); INSERT INTO p (id, n) VALUES (2, 'b')")
        .unwrap();

    let rows = db.query("SELECT * FROM p WHERE id >= 2").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        simple_values(&rows[0]),
        vec![Value::Integer(2), Value::Text("b".into())]
    );
}

#[test]
fn test_delete_by_predicate_returns_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();
    db.execute("INSERT INTO p (id, n) VALUES (1, 'a'); INSERT INTO p (id, n) VALUES (2, 'b')")
        .unwrap();

    let results = db.execute("DELETE FROM p WHERE n = 'a'").unwrap();
    assert_eq!(results.len(), 1);
    match results.into_iter().next().unwrap() {
        Ok(StatementOutcome::Delete { keys }) => assert_eq!(keys, vec![1]),
        other => panic!("expected delete outcome, got {other:?}"),
    }

    let rows = db.query("SELECT * FROM p").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        simple_values(&rows[0]),
        vec![Value::Integer(2), Value::Text("b".into())]
    );
}

#[test]
fn test_delete_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();
    db.execute("INSERT INTO p (id, n) VALUES (1, 'a')").unwrap();

    let first = db.execute("DELETE FROM p WHERE id = 1").unwrap();
    match first.into_iter().next().unwrap() {
        Ok(StatementOutcome::Delete { keys }) => assert_eq!(keys, vec![1]),
        other => panic!("expected delete outcome, got {other:?}"),
    }
    // nothing matches the second time around
    let second = db.execute("DELETE FROM p WHERE id = 1").unwrap();
    match second.into_iter().next().unwrap() {
        Ok(StatementOutcome::Delete { keys }) => assert!(keys.is_empty()),
        other => panic!("expected delete outcome, got {other:?}"),
    }
    assert!(db.query("SELECT * FROM p").unwrap().is_empty());
}

#[test]
fn test_select_iterates_in_primary_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();
    for (id, n) in [(30, "c"), (10, "a"), (20, "b")] {
        db.execute(&format!("INSERT INTO p (id, n) VALUES ({id}, '{n}')"))
            .unwrap();
    }

    let rows = db.query("SELECT * FROM p").unwrap();
    let ids: Vec<Value> = rows
        .iter()
        .map(|r| simple_values(r)[0].clone())
        .collect();
    assert_eq!(
        ids,
        vec![Value::Integer(10), Value::Integer(20), Value::Integer(30)]
    );
}

#[test]
fn test_empty_table_select_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);
    db.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();
    assert!(db.query("SELECT * FROM p").unwrap().is_empty());
}

#[test]
fn test_projection_restricts_columns() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT, score REAL)")
        .unwrap();
    db.execute("INSERT INTO p (id, n, score) VALUES (1, 'a', 0.5)")
        .unwrap();

    let rows = db.query("SELECT n, id FROM p").unwrap();
    assert_eq!(
        simple_values(&rows[0]),
        vec![Value::Text("a".into()), Value::Integer(1)]
    );
}

#[test]
fn test_incompatible_comparison_filters_everything() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();
    db.execute("INSERT INTO p (id, n) VALUES (1, 'a')").unwrap();

    // text against integer never matches, but is not an error
    assert!(db.query("SELECT * FROM p WHERE n = 1").unwrap().is_empty());
    assert!(db
        .query("SELECT * FROM p WHERE n <> NULL")
        .unwrap()
        .is_empty());
}

#[test]
fn test_catalog_is_selectable() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();
    let rows = db.query("SELECT * FROM catalog").unwrap();
    assert_eq!(rows.len(), 1);
    let row = match &rows[0] {
        Record::Simple(simple) => simple,
        other => panic!("expected a simple record, got {other:?}"),
    };
    assert_eq!(row.get("name").unwrap(), &Value::Text("p".into()));
    assert_eq!(
        row.get("sql_text").unwrap(),
        &Value::Text("CREATE TABLE p (id INTEGER PRIMARY KEY, n TEXT)".into())
    );
}

#[test]
fn test_delete_from_catalog_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);
    db.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();

    let results = db.execute("DELETE FROM catalog").unwrap();
    assert!(matches!(
        results.into_iter().next().unwrap(),
        Err(Error::Name(_))
    ));
    // the catalog row is still there
    assert_eq!(db.query("SELECT * FROM catalog").unwrap().len(), 1);
}

#[test]
fn test_insert_into_missing_table_is_per_statement_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);
    db.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();

    // the failing statement does not stop the rest of the program
    let results = db
        .execute("INSERT INTO q (id) VALUES (1); INSERT INTO p (id) VALUES (1)")
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(matches!(&results[0], Err(Error::Name(_))));
    assert!(results[1].is_ok());
}

#[test]
fn test_type_mismatch_on_insert() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);
    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();

    let results = db
        .execute("INSERT INTO p (id, n) VALUES (1, 2)")
        .unwrap();
    assert!(matches!(
        results.into_iter().next().unwrap(),
        Err(Error::Type(_))
    ));
}

#[test]
fn test_duplicate_primary_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);
    db.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();
    db.execute("INSERT INTO p (id) VALUES (1)").unwrap();

    let err = db.execute("INSERT INTO p (id) VALUES (1)").unwrap_err();
    assert!(matches!(err, Error::Fatal(_)));
}

#[test]
fn test_duplicate_table_name_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);
    db.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();

    let err = db.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap_err();
    assert!(matches!(err, Error::Fatal(_)));
}

#[test]
fn test_bad_ddl_is_per_statement_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);

    let results = db.execute("CREATE TABLE p (id INT, n TEXT)").unwrap();
    assert!(matches!(
        results.into_iter().next().unwrap(),
        Err(Error::Schema(_))
    ));
}

#[test]
fn test_reserved_statements_report_not_implemented() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);
    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();

    for sql in [
        "UPDATE p SET n = 'x' WHERE id = 1",
        "TRUNCATE p",
        "DROP TABLE p",
    ] {
        let results = db.execute(sql).unwrap();
        assert!(
            matches!(results.into_iter().next().unwrap(), Err(Error::NotImplemented(_))),
            "{sql}"
        );
    }
}

#[test]
fn test_reserved_select_clauses_are_no_ops() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_db(&dir);
    db.execute("CREATE TABLE p (id INT PRIMARY KEY, n TEXT)")
        .unwrap();
    db.execute("INSERT INTO p (id, n) VALUES (1, 'a'); INSERT INTO p (id, n) VALUES (2, 'b')")
        .unwrap();

    let rows = db
        .query("SELECT * FROM p WHERE id >= 1 GROUP BY n HAVING id > 0 ORDER BY n DESC LIMIT 99")
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_stop_on_err_halts_the_program() {
    use acorndb::{parse_program, Pipe, StateManager, VirtualMachine};

    let dir = tempfile::tempdir().unwrap();
    let state = StateManager::open(&dir.path().join("test.db")).unwrap();
    let mut vm = VirtualMachine::new(state, Pipe::new()).unwrap();

    let program = parse_program(
        "CREATE TABLE p (id INT PRIMARY KEY); \
         INSERT INTO q (id) VALUES (1); \
         INSERT INTO p (id) VALUES (1)",
    )
    .unwrap();
    let results = vm.run(&program, true).unwrap();
    // execution stops after the failing insert; the third statement never runs
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}
