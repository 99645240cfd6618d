//! The execution virtual machine.
//!
//! Turns parsed statements into operations over trees, cursors, schemas and
//! in-memory record sets. The VM bootstraps the catalog on construction,
//! dispatches each statement of a program to a typed executor, and pushes
//! SELECT output into the caller-supplied pipe. Domain errors come back as
//! per-statement results; fatal errors (corruption, broken invariants) abort
//! the run.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, error, warn};

use crate::btree::{Cursor, Tree, TreeDeleteResult, TreeInsertResult};
use crate::codec::{deserialize_cell, serialize_record};
use crate::error::{Error, Result};
use crate::parser::{
    parse_program, Comparison, Condition, CreateStmnt, DeleteStmnt, FromSource, InsertStmnt,
    JoinType, Joining, Operand, Program, SelectList, SelectStmnt, SingleSource, Statement, Value,
};
use crate::pipe::Pipe;
use crate::record::{create_catalog_record, create_record, JoinedRecord, Record, SimpleRecord};
use crate::schema::{generate_schema, schema_to_ddl, Schema, CATALOG_TABLE_NAME};
use crate::state::StateManager;

const RECORD_SET_NAME_LEN: usize = 10;

/// What a successfully executed statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    CreateTable,
    Insert { rows_affected: usize },
    /// The primary keys that were deleted, in scan order.
    Delete { keys: Vec<i64> },
    /// Rows were also written to the output pipe.
    Select { rows_emitted: usize },
}

/// Per-statement result. Fatal errors never appear here; they abort `run`.
pub type StatementResult = Result<StatementOutcome>;

pub struct VirtualMachine {
    state: StateManager,
    pipe: Pipe,
    record_sets: HashMap<String, Vec<Record>>,
}

impl VirtualMachine {
    /// Build a VM over opened state, bootstrapping every table recorded in
    /// the catalog. Bootstrap failure means the file is inconsistent.
    pub fn new(state: StateManager, pipe: Pipe) -> Result<Self> {
        let mut vm = Self {
            state,
            pipe,
            record_sets: HashMap::new(),
        };
        vm.bootstrap_catalog()?;
        Ok(vm)
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }

    pub fn pipe_mut(&mut self) -> &mut Pipe {
        &mut self.pipe
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Execute a program statement by statement.
    ///
    /// Returns one result per executed statement. With `stop_on_err`,
    /// execution stops after the first failed statement. Side effects of
    /// completed statements are never rolled back.
    pub fn run(&mut self, program: &Program, stop_on_err: bool) -> Result<Vec<StatementResult>> {
        let mut results = Vec::with_capacity(program.statements.len());
        for stmnt in &program.statements {
            let result = self.execute(stmnt);
            // scratch record sets are confined to one statement
            self.record_sets.clear();
            match result {
                Err(err) if err.is_fatal() => {
                    error!("aborting run on [{stmnt:?}]: {err}");
                    return Err(err);
                }
                Err(err) => {
                    warn!("statement [{stmnt:?}] failed: {err}");
                    results.push(Err(err));
                    if stop_on_err {
                        break;
                    }
                }
                Ok(outcome) => results.push(Ok(outcome)),
            }
        }
        self.state.flush()?;
        Ok(results)
    }

    fn execute(&mut self, stmnt: &Statement) -> Result<StatementOutcome> {
        match stmnt {
            Statement::Create(create) => self.execute_create(create),
            Statement::Insert(insert) => self.execute_insert(insert),
            Statement::Delete(delete) => self.execute_delete(delete),
            Statement::Select(select) => self.execute_select(select),
            Statement::Drop(_) => Err(Error::NotImplemented(
                "DROP TABLE is not implemented".to_string(),
            )),
            Statement::Truncate(_) => Err(Error::NotImplemented(
                "TRUNCATE is not implemented".to_string(),
            )),
            Statement::Update(_) => Err(Error::NotImplemented(
                "UPDATE is not implemented".to_string(),
            )),
        }
    }

    // section: catalog bootstrap

    fn bootstrap_catalog(&mut self) -> Result<()> {
        let catalog_tree = self.state.catalog_tree();
        let catalog_schema = self.state.catalog_schema();
        let mut cursor = Cursor::new(self.state.pager(), &catalog_tree)?;

        while !cursor.end_of_table() {
            let cell = cursor.get_cell()?;
            let row = deserialize_cell(&cell, &catalog_schema)
                .map_err(|e| Error::Corrupted(format!("catalog row does not deserialize: {e}")))?;
            let name = catalog_text(&row, "name")?;
            let root_pagenum = catalog_integer(&row, "root_pagenum")?;
            let sql_text = catalog_text(&row, "sql_text")?;
            debug!("bootstrapping table '{name}' from [{sql_text}]");

            let program = parse_program(&sql_text).map_err(|e| {
                Error::Corrupted(format!("catalog DDL for '{name}' does not parse: {e}"))
            })?;
            if program.statements.len() != 1 {
                return Err(Error::Corrupted(format!(
                    "catalog DDL for '{name}' holds {} statements",
                    program.statements.len()
                )));
            }
            let Statement::Create(create) = &program.statements[0] else {
                return Err(Error::Corrupted(format!(
                    "catalog DDL for '{name}' is not a CREATE statement"
                )));
            };
            let schema = generate_schema(create).map_err(|e| {
                Error::Corrupted(format!("catalog DDL for '{name}' yields no schema: {e}"))
            })?;

            let tree = Tree::open(self.state.pager(), root_pagenum as u32);
            self.state.register_schema(&name, Rc::new(schema));
            self.state.register_tree(&name, tree);
            cursor.advance()?;
        }
        Ok(())
    }

    // section: statement executors

    fn execute_create(&mut self, stmnt: &CreateStmnt) -> Result<StatementOutcome> {
        // 1. schema generation failures surface to the caller
        let schema = generate_schema(stmnt)?;
        let table_name = schema.name.clone();

        // 2. uniqueness is a precondition; callers check via the catalog
        if self.state.table_exists(&table_name) {
            return Err(Error::Fatal(format!(
                "table '{table_name}' already exists"
            )));
        }

        // 3. allocate the table's tree; its root page doubles as the key
        let root_page = self.state.allocate_tree()?;

        // 4.-5. build and serialize the catalog row
        let sql_text = schema_to_ddl(&schema);
        let catalog_schema = self.state.catalog_schema();
        let row = create_catalog_record(
            root_page as i64,
            &table_name,
            root_page,
            &sql_text,
            &catalog_schema,
        );
        let cell = serialize_record(&row)?;

        // 6. insert into the catalog tree
        let catalog_tree = self.state.catalog_tree();
        match catalog_tree.insert(&cell)? {
            TreeInsertResult::Success => {}
            TreeInsertResult::DuplicateKey => {
                return Err(Error::Fatal(format!(
                    "catalog already holds a row keyed {root_page}"
                )))
            }
        }

        // 7.-8. register schema and tree handle
        self.state.register_schema(&table_name, Rc::new(schema));
        self.state
            .register_tree(&table_name, Tree::open(self.state.pager(), root_page));
        Ok(StatementOutcome::CreateTable)
    }

    fn execute_insert(&mut self, stmnt: &InsertStmnt) -> Result<StatementOutcome> {
        let Some(schema) = self.state.get_schema(&stmnt.table_name) else {
            return Err(Error::Name(format!(
                "table '{}' does not exist",
                stmnt.table_name
            )));
        };
        let record = create_record(&stmnt.column_names, &stmnt.values, &schema)?;
        let cell = serialize_record(&record)?;

        let tree = self.tree_for(&stmnt.table_name)?;
        match tree.insert(&cell)? {
            TreeInsertResult::Success => Ok(StatementOutcome::Insert { rows_affected: 1 }),
            status => Err(Error::Fatal(format!(
                "tree insert into '{}' reported {status:?}",
                stmnt.table_name
            ))),
        }
    }

    fn execute_delete(&mut self, stmnt: &DeleteStmnt) -> Result<StatementOutcome> {
        if stmnt.table_name.eq_ignore_ascii_case(CATALOG_TABLE_NAME) {
            return Err(Error::Name(
                "cannot delete from the catalog; drop the table instead".to_string(),
            ));
        }

        // materialize, filter, then collect the surviving primary keys
        let mut rsname = self.materialize(&FromSource::Table(stmnt.table_name.clone()))?;
        if let Some(condition) = &stmnt.where_clause {
            rsname = self.filter_recordset(condition, &rsname)?;
        }

        let mut keys = Vec::new();
        for record in self.recordset(&rsname)? {
            let Record::Simple(simple) = record else {
                return Err(Error::Fatal(
                    "delete scan produced a joined record".to_string(),
                ));
            };
            keys.push(simple.primary_key()?);
        }

        let tree = self.tree_for(&stmnt.table_name)?;
        for &key in &keys {
            let status = tree.delete(key)?;
            if status != TreeDeleteResult::Success {
                warn!("delete of key {key} from '{}' failed", stmnt.table_name);
                return Err(Error::Storage(format!(
                    "tree delete reported {status:?} for key {key}"
                )));
            }
        }
        Ok(StatementOutcome::Delete { keys })
    }

    fn execute_select(&mut self, stmnt: &SelectStmnt) -> Result<StatementOutcome> {
        self.pipe.reset();

        let Some(from_clause) = &stmnt.from_clause else {
            return Ok(StatementOutcome::Select { rows_emitted: 0 });
        };

        let mut rsname = self.materialize(&from_clause.source)?;
        if let Some(condition) = &from_clause.where_clause {
            rsname = self.filter_recordset(condition, &rsname)?;
        }
        if !from_clause.group_by.is_empty()
            || from_clause.having.is_some()
            || !from_clause.order_by.is_empty()
            || from_clause.limit.is_some()
        {
            debug!("GROUP BY / HAVING / ORDER BY / LIMIT accepted but not executed");
        }

        let records = self.recordset(&rsname)?.to_vec();
        let mut emitted = 0;
        for record in &records {
            let projected = project_record(record, &stmnt.select_list)?;
            self.pipe.write(projected);
            emitted += 1;
        }
        Ok(StatementOutcome::Select {
            rows_emitted: emitted,
        })
    }

    // section: materializer

    /// Turn a FROM source into a named record set.
    fn materialize(&mut self, source: &FromSource) -> Result<String> {
        match source {
            FromSource::Table(table_name) => self.materialize_table(table_name),
            FromSource::Single(single) => self.materialize_table(&single.table_name),
            FromSource::Joining(joining) => self.materialize_joining(joining),
        }
    }

    fn materialize_table(&mut self, table_name: &str) -> Result<String> {
        let schema = self.schema_for(table_name)?;
        let tree = self.tree_for(table_name)?;

        let rsname = self.init_recordset();
        let mut cursor = Cursor::new(self.state.pager(), &tree)?;
        while !cursor.end_of_table() {
            let cell = cursor.get_cell()?;
            let record = deserialize_cell(&cell, &schema)?;
            self.append_recordset(&rsname, Record::Simple(record))?;
            cursor.advance()?;
        }
        debug!("materialized table '{table_name}' as record set {rsname}");
        Ok(rsname)
    }

    /// Materialize a chain of joins.
    ///
    /// The parser nests `A JOIN B JOIN C` left-deep, with A in the innermost
    /// position. Unwind the chain onto a stack, materialize the leaf, then
    /// fold each popped join into a pairwise join against the accumulated
    /// record set.
    fn materialize_joining(&mut self, source: &Joining) -> Result<String> {
        let mut stack: Vec<&Joining> = vec![source];
        let mut current = source;
        let leaf = loop {
            match &current.left_source {
                FromSource::Joining(nested) => {
                    stack.push(nested);
                    current = nested;
                }
                FromSource::Single(single) => break single.clone(),
                FromSource::Table(table_name) => {
                    break SingleSource {
                        table_name: table_name.clone(),
                        alias: None,
                    }
                }
            }
        };

        let mut rsname = self.materialize_table(&leaf.table_name)?;
        // only the first pairwise join needs the left source's name; joined
        // records carry per-field origins from then on
        let mut left_name: Option<String> = Some(leaf.source_name().to_string());

        while let Some(join) = stack.pop() {
            let right = &join.right_source;
            let right_rsname = self.materialize_table(&right.table_name)?;
            let right_name = right.source_name().to_string();

            let joined = self.join_recordsets(
                join,
                &rsname,
                &right_rsname,
                left_name.as_deref(),
                &right_name,
            )?;
            self.drop_recordset(&rsname);
            self.drop_recordset(&right_rsname);
            rsname = joined;
            left_name = None;
        }
        Ok(rsname)
    }

    // section: join and filter steps

    /// Pairwise inner join: stable nested loop, left-outer-then-right order,
    /// no deduplication. A join without a condition keeps every pairing.
    fn join_recordsets(
        &mut self,
        join: &Joining,
        left_rsname: &str,
        right_rsname: &str,
        left_name: Option<&str>,
        right_name: &str,
    ) -> Result<String> {
        match join.join_type {
            JoinType::Inner | JoinType::Cross => {}
            other => {
                return Err(Error::NotImplemented(format!(
                    "{other:?} join is not implemented"
                )))
            }
        }

        let left_records = self.recordset(left_rsname)?.to_vec();
        let right_records = self.recordset(right_rsname)?.to_vec();
        let out_name = self.init_recordset();

        for left_record in &left_records {
            for right_record in &right_records {
                let joined = build_joined_record(left_record, right_record, left_name, right_name)?;
                let record = Record::Joined(joined);
                if evaluate_condition(join.condition.as_ref(), &record)? {
                    self.append_recordset(&out_name, record)?;
                }
            }
        }
        Ok(out_name)
    }

    /// Apply a WHERE condition to a record set, producing a filtered set.
    fn filter_recordset(&mut self, condition: &Condition, source_rsname: &str) -> Result<String> {
        let records = self.recordset(source_rsname)?.to_vec();
        let out_name = self.init_recordset();
        for record in records {
            if evaluate_condition(Some(condition), &record)? {
                self.append_recordset(&out_name, record)?;
            }
        }
        self.drop_recordset(source_rsname);
        Ok(out_name)
    }

    // section: name resolution against state

    fn schema_for(&self, table_name: &str) -> Result<Rc<Schema>> {
        if table_name.eq_ignore_ascii_case(CATALOG_TABLE_NAME) {
            return Ok(self.state.catalog_schema());
        }
        self.state
            .get_schema(table_name)
            .ok_or_else(|| Error::Name(format!("table '{table_name}' does not exist")))
    }

    fn tree_for(&self, table_name: &str) -> Result<Tree> {
        if table_name.eq_ignore_ascii_case(CATALOG_TABLE_NAME) {
            return Ok(self.state.catalog_tree());
        }
        if !self.state.table_exists(table_name) {
            return Err(Error::Name(format!("table '{table_name}' does not exist")));
        }
        self.state.get_tree(table_name).ok_or_else(|| {
            Error::Fatal(format!(
                "no tree registered for existing table '{table_name}'"
            ))
        })
    }

    // section: record set store

    fn gen_randkey(&self) -> String {
        (0..RECORD_SET_NAME_LEN)
            .map(|_| fastrand::alphabetic())
            .collect()
    }

    fn init_recordset(&mut self) -> String {
        let mut name = self.gen_randkey();
        while self.record_sets.contains_key(&name) {
            name = self.gen_randkey();
        }
        self.record_sets.insert(name.clone(), Vec::new());
        name
    }

    fn append_recordset(&mut self, name: &str, record: Record) -> Result<()> {
        self.record_sets
            .get_mut(name)
            .ok_or_else(|| Error::Fatal(format!("no record set named {name}")))?
            .push(record);
        Ok(())
    }

    fn recordset(&self, name: &str) -> Result<&[Record]> {
        self.record_sets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Fatal(format!("no record set named {name}")))
    }

    fn drop_recordset(&mut self, name: &str) {
        self.record_sets.remove(name);
    }
}

fn build_joined_record(
    left_record: &Record,
    right_record: &Record,
    left_name: Option<&str>,
    right_name: &str,
) -> Result<JoinedRecord> {
    let Record::Simple(right_simple) = right_record else {
        return Err(Error::Fatal(
            "right side of a join materialized a joined record".to_string(),
        ));
    };
    match (left_name, left_record) {
        (Some(left_name), Record::Simple(left_simple)) => Ok(JoinedRecord::from_simple_records(
            left_simple,
            right_simple,
            left_name,
            right_name,
        )),
        (None, Record::Joined(left_joined)) => Ok(JoinedRecord::from_joined_and_simple(
            left_joined,
            right_simple,
            right_name,
        )),
        _ => Err(Error::Fatal(
            "join record shape disagrees with the join stage".to_string(),
        )),
    }
}

// section: expression evaluation

/// Evaluate a condition against a record. A missing condition is true.
/// Conjunctions bail on the first false; disjunctions succeed on the first
/// true.
fn evaluate_condition(condition: Option<&Condition>, record: &Record) -> Result<bool> {
    let Some(condition) = condition else {
        return Ok(true);
    };
    for and_term in &condition.or_terms {
        let mut and_result = true;
        for comparison in and_term {
            if !evaluate_comparison(comparison, record)? {
                and_result = false;
                break;
            }
        }
        if and_result {
            return Ok(true);
        }
    }
    Ok(false)
}

fn evaluate_comparison(comparison: &Comparison, record: &Record) -> Result<bool> {
    let left = resolve_operand(&comparison.left, record)?;
    let right = resolve_operand(&comparison.right, record)?;
    Ok(comparison.op.evaluate(left.compare(right)))
}

/// Resolve an operand: literals pass through, names resolve against the
/// record (bare names must be unambiguous, scoped names need a joined
/// record).
fn resolve_operand<'a>(operand: &'a Operand, record: &'a Record) -> Result<&'a Value> {
    match operand {
        Operand::Literal(value) => Ok(value),
        Operand::Ident(name) => record.get(name),
        Operand::Scoped(source, column) => record.get_scoped(source, column),
    }
}

// section: projection

/// Restrict a record to the selected columns; `*` passes through.
fn project_record(record: &Record, select_list: &SelectList) -> Result<Record> {
    let SelectList::Columns(columns) = select_list else {
        return Ok(record.clone());
    };
    match record {
        Record::Simple(simple) => {
            let mut projected_columns = Vec::with_capacity(columns.len());
            let mut values = Vec::with_capacity(columns.len());
            for column_ref in columns {
                if let Some(source) = &column_ref.source {
                    return Err(Error::Name(format!(
                        "scoped name '{source}.{}' cannot be resolved against a single-source record",
                        column_ref.column
                    )));
                }
                let pos = simple
                    .schema
                    .column_position(&column_ref.column)
                    .ok_or_else(|| Error::Name(format!("no column '{}'", column_ref.column)))?;
                projected_columns.push(simple.schema.columns[pos].clone());
                values.push(simple.values[pos].clone());
            }
            Ok(Record::Simple(SimpleRecord {
                schema: Rc::new(Schema {
                    name: simple.schema.name.clone(),
                    columns: projected_columns,
                }),
                values,
            }))
        }
        Record::Joined(joined) => {
            let mut fields = Vec::with_capacity(columns.len());
            for column_ref in columns {
                let field = match &column_ref.source {
                    Some(source) => joined.field_scoped(source, &column_ref.column)?,
                    None => joined.field(&column_ref.column)?,
                };
                fields.push(field.clone());
            }
            Ok(Record::Joined(JoinedRecord { fields }))
        }
    }
}

// section: catalog row accessors

fn catalog_text(row: &SimpleRecord, column: &str) -> Result<String> {
    match row.get(column)? {
        Value::Text(text) => Ok(text.clone()),
        other => Err(Error::Corrupted(format!(
            "catalog field '{column}' is not text: {other}"
        ))),
    }
}

fn catalog_integer(row: &SimpleRecord, column: &str) -> Result<i64> {
    match row.get(column)? {
        Value::Integer(i) => Ok(*i),
        other => Err(Error::Corrupted(format!(
            "catalog field '{column}' is not an integer: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::create_record;
    use crate::schema::generate_schema;

    fn schema(sql: &str) -> Rc<Schema> {
        let program = parse_program(sql).unwrap();
        match program.statements.into_iter().next().unwrap() {
            Statement::Create(create) => Rc::new(generate_schema(&create).unwrap()),
            other => panic!("expected create, got {other:?}"),
        }
    }

    fn sample_record() -> Record {
        let s = schema("CREATE TABLE p (id INT PRIMARY KEY, n TEXT, score REAL)");
        let names: Vec<String> = ["id", "n", "score"].iter().map(|s| s.to_string()).collect();
        Record::Simple(
            create_record(
                &names,
                &[
                    Value::Integer(2),
                    Value::Text("b".into()),
                    Value::Real(1.5),
                ],
                &s,
            )
            .unwrap(),
        )
    }

    fn where_condition(sql_tail: &str) -> Condition {
        let program = parse_program(&format!("SELECT * FROM p WHERE {sql_tail}")).unwrap();
        let Statement::Select(select) = program.statements.into_iter().next().unwrap() else {
            panic!("expected select");
        };
        select.from_clause.unwrap().where_clause.unwrap()
    }

    #[test]
    fn test_null_condition_is_true() {
        assert!(evaluate_condition(None, &sample_record()).unwrap());
    }

    #[test]
    fn test_condition_or_of_ands_semantics() {
        let record = sample_record();
        // (false and *) or (true and true)
        let cond = where_condition("id = 1 AND n = 'b' OR id = 2 AND n = 'b'");
        assert!(evaluate_condition(Some(&cond), &record).unwrap());
        let cond = where_condition("id = 1 OR n = 'a'");
        assert!(!evaluate_condition(Some(&cond), &record).unwrap());
        let cond = where_condition("score >= 1.5 AND id < 3");
        assert!(evaluate_condition(Some(&cond), &record).unwrap());
    }

    #[test]
    fn test_incompatible_comparison_is_false_not_error() {
        let record = sample_record();
        let cond = where_condition("n = 2");
        assert!(!evaluate_condition(Some(&cond), &record).unwrap());
        // NULL never compares, even with <>
        let cond = where_condition("n <> NULL");
        assert!(!evaluate_condition(Some(&cond), &record).unwrap());
    }

    #[test]
    fn test_unknown_name_is_name_error() {
        let record = sample_record();
        let cond = where_condition("bogus = 1");
        assert!(matches!(
            evaluate_condition(Some(&cond), &record),
            Err(Error::Name(_))
        ));
    }

    #[test]
    fn test_ambiguous_bare_name_in_join_is_name_error() {
        let ls = schema("CREATE TABLE l (id INT PRIMARY KEY)");
        let rs = schema("CREATE TABLE r (id INT PRIMARY KEY)");
        let names = vec!["id".to_string()];
        let lr = create_record(&names, &[Value::Integer(1)], &ls).unwrap();
        let rr = create_record(&names, &[Value::Integer(1)], &rs).unwrap();
        let joined = Record::Joined(JoinedRecord::from_simple_records(&lr, &rr, "l", "r"));

        let cond = where_condition("id = 1");
        assert!(matches!(
            evaluate_condition(Some(&cond), &joined),
            Err(Error::Name(_))
        ));
        // scoped lookups stay unambiguous
        let cond = where_condition("l.id = 1 AND r.id = 1");
        assert!(evaluate_condition(Some(&cond), &joined).unwrap());
    }

    #[test]
    fn test_projection_restricts_simple_record() {
        let record = sample_record();
        let projected = project_record(
            &record,
            &SelectList::Columns(vec![crate::parser::ColumnRef {
                source: None,
                column: "n".to_string(),
            }]),
        )
        .unwrap();
        let Record::Simple(simple) = projected else {
            panic!("expected simple record");
        };
        assert_eq!(simple.values, vec![Value::Text("b".into())]);
        assert_eq!(simple.schema.columns.len(), 1);
    }

    #[test]
    fn test_projection_star_passes_through() {
        let record = sample_record();
        assert_eq!(project_record(&record, &SelectList::Star).unwrap(), record);
    }
}
