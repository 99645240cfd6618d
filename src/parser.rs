//! SQL parser implementation using nom
//!
//! Produces the statement tree the virtual machine executes: programs of
//! CREATE / INSERT / DELETE / SELECT (plus the reserved DROP, TRUNCATE and
//! UPDATE forms), left-deep join sources, and conditions normalized into
//! disjunctions of conjunctions of comparisons.

use std::cmp::Ordering;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, multispace1},
    combinator::{map, opt, recognize},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use crate::error::{Error, Result};

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl Value {
    /// Compare two values.
    ///
    /// Comparison is defined per pair of kinds: integer with integer, real
    /// with real, integer with real (widened to real), and text with text.
    /// Every other pair, including anything involving `Null`, is incomparable
    /// and yields `None`; every comparison operator evaluates an incomparable
    /// pair to false.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Real(b)) => (*a as f64).partial_cmp(b),
            (Value::Real(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(t) => write!(f, "'{t}'"),
            Value::Null => write!(f, "NULL"),
        }
    }
}

/// Column data types understood by the schema layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Real,
    Text,
}

impl DataType {
    /// Canonical spelling used when DDL is regenerated for the catalog.
    pub fn ddl_name(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Real => "REAL",
            DataType::Text => "TEXT",
        }
    }
}

/// An ordered list of statements, as handed to the virtual machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Create(CreateStmnt),
    Insert(InsertStmnt),
    Delete(DeleteStmnt),
    Select(SelectStmnt),
    Drop(DropStmnt),
    Truncate(TruncateStmnt),
    Update(UpdateStmnt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateStmnt {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub is_primary_key: bool,
    pub is_nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmnt {
    pub table_name: String,
    pub column_names: Vec<String>,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmnt {
    pub table_name: String,
    pub where_clause: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmnt {
    pub select_list: SelectList,
    pub from_clause: Option<FromClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectList {
    Star,
    Columns(Vec<ColumnRef>),
}

/// A possibly source-qualified column reference, e.g. `name` or `t.name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub source: Option<String>,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub source: FromSource,
    pub where_clause: Option<Condition>,
    /// Recognized but not executed.
    pub group_by: Vec<ColumnRef>,
    /// Recognized but not executed.
    pub having: Option<Condition>,
    /// Recognized but not executed.
    pub order_by: Vec<ColumnRef>,
    /// Recognized but not executed.
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    /// A bare table name with no alias machinery.
    Table(String),
    Single(SingleSource),
    Joining(Box<Joining>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleSource {
    pub table_name: String,
    pub alias: Option<String>,
}

impl SingleSource {
    /// The name records from this source are known by: the alias if one was
    /// given, the table name otherwise.
    pub fn source_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }
}

/// One join step. The grammar folds `A JOIN B JOIN C` left-deep, so the
/// right source is always a base relation while the left may nest further.
#[derive(Debug, Clone, PartialEq)]
pub struct Joining {
    pub left_source: FromSource,
    pub right_source: SingleSource,
    pub join_type: JoinType,
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
}

/// A condition in disjunctive normal form: the outer vec ORs together
/// groups of ANDed comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub or_terms: Vec<Vec<Comparison>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    /// A bare identifier, resolved against the current record.
    Ident(String),
    /// A scoped identifier `source.column`, resolved against a joined record.
    Scoped(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl CompareOp {
    /// Apply the operator to a comparison outcome. `None` (incomparable
    /// operands) is false under every operator.
    pub fn evaluate(&self, ordering: Option<Ordering>) -> bool {
        let Some(ord) = ordering else {
            return false;
        };
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::NotEq => ord != Ordering::Equal,
            CompareOp::Less => ord == Ordering::Less,
            CompareOp::LessEq => ord != Ordering::Greater,
            CompareOp::Greater => ord == Ordering::Greater,
            CompareOp::GreaterEq => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropStmnt {
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TruncateStmnt {
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmnt {
    pub table_name: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
}

/// Parse a program: one or more `;`-separated statements.
pub fn parse_program(input: &str) -> Result<Program> {
    let mut statements = Vec::new();
    let mut rest = input;
    loop {
        rest = skip_separators(rest);
        if rest.is_empty() {
            break;
        }
        let (next, statement) = parse_statement(rest)
            .map_err(|e| Error::Parse(format!("invalid statement: {e:?}")))?;
        statements.push(statement);
        let next = next.trim_start();
        if !next.is_empty() && !next.starts_with(';') {
            return Err(Error::Parse(format!(
                "unexpected input after statement: '{next}'"
            )));
        }
        rest = next;
    }
    if statements.is_empty() {
        return Err(Error::Parse("empty program".to_string()));
    }
    Ok(Program { statements })
}

fn skip_separators(input: &str) -> &str {
    let mut rest = input.trim_start();
    while let Some(stripped) = rest.strip_prefix(';') {
        rest = stripped.trim_start();
    }
    rest
}

fn parse_statement(input: &str) -> IResult<&str, Statement> {
    let (input, _) = multispace0.parse(input)?;
    alt((
        parse_create,
        parse_insert,
        parse_select,
        parse_delete,
        parse_drop,
        parse_truncate,
        parse_update,
    ))
    .parse(input)
}

// Words that terminate an implicit table alias.
const RESERVED_WORDS: &[&str] = &[
    "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "JOIN", "ON", "WHERE", "GROUP", "HAVING",
    "ORDER", "LIMIT", "AS", "BY", "AND", "OR", "NOT", "NULL", "PRIMARY", "VALUES", "SET", "FROM",
];

fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS
        .iter()
        .any(|kw| kw.eq_ignore_ascii_case(word))
}

fn parse_identifier(input: &str) -> IResult<&str, String> {
    let (input, first_char) = alpha1.parse(input)?;
    let (input, rest) = many0(alt((alphanumeric1, tag("_")))).parse(input)?;
    let identifier = format!("{}{}", first_char, rest.join(""));
    Ok((input, identifier))
}

// An identifier that is not a keyword; used where a keyword may follow.
fn parse_bare_identifier(input: &str) -> IResult<&str, String> {
    let (rest, ident) = parse_identifier.parse(input)?;
    if is_reserved(&ident) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    Ok((rest, ident))
}

// Parse CREATE TABLE statement
fn parse_create(input: &str) -> IResult<&str, Statement> {
    let (input, _) = tag_no_case("CREATE").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("TABLE").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, table_name) = parse_identifier.parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, columns) = delimited(
        char('('),
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            delimited(multispace0, parse_column_def, multispace0),
        ),
        char(')'),
    )
    .parse(input)?;

    Ok((
        input,
        Statement::Create(CreateStmnt {
            table_name,
            columns,
        }),
    ))
}

fn parse_column_def(input: &str) -> IResult<&str, ColumnDef> {
    let (input, name) = parse_identifier.parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, data_type) = parse_data_type.parse(input)?;
    let (input, constraints) = many0(preceded(multispace1, parse_column_constraint)).parse(input)?;

    let is_primary_key = constraints.contains(&ColumnConstraint::PrimaryKey);
    let not_null = constraints.contains(&ColumnConstraint::NotNull);
    Ok((
        input,
        ColumnDef {
            name,
            data_type,
            is_primary_key,
            is_nullable: !is_primary_key && !not_null,
        },
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnConstraint {
    PrimaryKey,
    NotNull,
}

fn parse_column_constraint(input: &str) -> IResult<&str, ColumnConstraint> {
    alt((
        map(
            (tag_no_case("PRIMARY"), multispace1, tag_no_case("KEY")),
            |_| ColumnConstraint::PrimaryKey,
        ),
        map((tag_no_case("NOT"), multispace1, tag_no_case("NULL")), |_| {
            ColumnConstraint::NotNull
        }),
    ))
    .parse(input)
}

fn parse_data_type(input: &str) -> IResult<&str, DataType> {
    alt((
        map(tag_no_case("INTEGER"), |_| DataType::Integer),
        map(tag_no_case("INT"), |_| DataType::Integer),
        map(tag_no_case("REAL"), |_| DataType::Real),
        map(tag_no_case("FLOAT"), |_| DataType::Real),
        map(tag_no_case("TEXT"), |_| DataType::Text),
    ))
    .parse(input)
}

// Parse INSERT statement
fn parse_insert(input: &str) -> IResult<&str, Statement> {
    let (input, _) = tag_no_case("INSERT").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("INTO").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, table_name) = parse_identifier.parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, column_names) = delimited(
        char('('),
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            delimited(multispace0, parse_identifier, multispace0),
        ),
        char(')'),
    )
    .parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = tag_no_case("VALUES").parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, values) = delimited(
        char('('),
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            delimited(multispace0, parse_value, multispace0),
        ),
        char(')'),
    )
    .parse(input)?;

    Ok((
        input,
        Statement::Insert(InsertStmnt {
            table_name,
            column_names,
            values,
        }),
    ))
}

// Parse DELETE statement
fn parse_delete(input: &str) -> IResult<&str, Statement> {
    let (input, _) = tag_no_case("DELETE").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("FROM").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, table_name) = parse_identifier.parse(input)?;
    let (input, where_clause) = opt(parse_where_clause).parse(input)?;

    Ok((
        input,
        Statement::Delete(DeleteStmnt {
            table_name,
            where_clause,
        }),
    ))
}

// Parse DROP TABLE statement
fn parse_drop(input: &str) -> IResult<&str, Statement> {
    let (input, _) = tag_no_case("DROP").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("TABLE").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, table_name) = parse_identifier.parse(input)?;
    Ok((input, Statement::Drop(DropStmnt { table_name })))
}

// Parse TRUNCATE statement
fn parse_truncate(input: &str) -> IResult<&str, Statement> {
    let (input, _) = tag_no_case("TRUNCATE").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = opt(pair(tag_no_case("TABLE"), multispace1)).parse(input)?;
    let (input, table_name) = parse_identifier.parse(input)?;
    Ok((input, Statement::Truncate(TruncateStmnt { table_name })))
}

// Parse UPDATE statement
fn parse_update(input: &str) -> IResult<&str, Statement> {
    let (input, _) = tag_no_case("UPDATE").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, table_name) = parse_identifier.parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("SET").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, assignments) = separated_list1(
        delimited(multispace0, char(','), multispace0),
        parse_assignment,
    )
    .parse(input)?;
    let (input, where_clause) = opt(parse_where_clause).parse(input)?;

    Ok((
        input,
        Statement::Update(UpdateStmnt {
            table_name,
            assignments,
            where_clause,
        }),
    ))
}

fn parse_assignment(input: &str) -> IResult<&str, Assignment> {
    let (input, column) = parse_identifier.parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char('=').parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, value) = parse_value.parse(input)?;
    Ok((input, Assignment { column, value }))
}

// Parse SELECT statement
fn parse_select(input: &str) -> IResult<&str, Statement> {
    let (input, _) = tag_no_case("SELECT").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, select_list) = parse_select_list.parse(input)?;
    let (input, from_clause) = opt(parse_from_clause).parse(input)?;

    Ok((
        input,
        Statement::Select(SelectStmnt {
            select_list,
            from_clause,
        }),
    ))
}

fn parse_select_list(input: &str) -> IResult<&str, SelectList> {
    if let Ok((input, _)) = char::<&str, nom::error::Error<&str>>('*').parse(input) {
        return Ok((input, SelectList::Star));
    }
    map(
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            parse_column_ref,
        ),
        SelectList::Columns,
    )
    .parse(input)
}

fn parse_column_ref(input: &str) -> IResult<&str, ColumnRef> {
    let (input, first) = parse_bare_identifier.parse(input)?;
    if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>('.').parse(input) {
        let (rest, column) = parse_identifier.parse(rest)?;
        return Ok((
            rest,
            ColumnRef {
                source: Some(first),
                column,
            },
        ));
    }
    Ok((
        input,
        ColumnRef {
            source: None,
            column: first,
        },
    ))
}

fn parse_from_clause(input: &str) -> IResult<&str, FromClause> {
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("FROM").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, source) = parse_from_source.parse(input)?;
    let (input, where_clause) = opt(parse_where_clause).parse(input)?;
    let (input, group_by) = opt(parse_group_by).parse(input)?;
    let (input, having) = opt(parse_having).parse(input)?;
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, limit) = opt(parse_limit).parse(input)?;

    Ok((
        input,
        FromClause {
            source,
            where_clause,
            group_by: group_by.unwrap_or_default(),
            having,
            order_by: order_by.unwrap_or_default(),
            limit,
        },
    ))
}

// Parse a FROM source: a single table followed by zero or more join steps,
// folded left so the first table ends up most deeply nested.
fn parse_from_source(input: &str) -> IResult<&str, FromSource> {
    let (input, first) = parse_single_source.parse(input)?;
    let (input, joins) = many0(parse_join_step).parse(input)?;

    let mut source = FromSource::Single(first);
    for (join_type, right_source, condition) in joins {
        source = FromSource::Joining(Box::new(Joining {
            left_source: source,
            right_source,
            join_type,
            condition,
        }));
    }
    Ok((input, source))
}

fn parse_single_source(input: &str) -> IResult<&str, SingleSource> {
    let (input, table_name) = parse_bare_identifier.parse(input)?;
    let (input, alias) = opt(parse_alias).parse(input)?;
    Ok((input, SingleSource { table_name, alias }))
}

fn parse_alias(input: &str) -> IResult<&str, String> {
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = opt(pair(tag_no_case("AS"), multispace1)).parse(input)?;
    parse_bare_identifier.parse(input)
}

type JoinStep = (JoinType, SingleSource, Option<Condition>);

fn parse_join_step(input: &str) -> IResult<&str, JoinStep> {
    let (input, _) = multispace1.parse(input)?;
    let (input, join_type) = parse_join_type.parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, right_source) = parse_single_source.parse(input)?;
    let (input, condition) = opt(parse_on_clause).parse(input)?;
    Ok((input, (join_type, right_source, condition)))
}

fn parse_join_type(input: &str) -> IResult<&str, JoinType> {
    alt((
        map(
            (tag_no_case("INNER"), multispace1, tag_no_case("JOIN")),
            |_| JoinType::Inner,
        ),
        map(
            (
                tag_no_case("LEFT"),
                opt((multispace1, tag_no_case("OUTER"))),
                multispace1,
                tag_no_case("JOIN"),
            ),
            |_| JoinType::LeftOuter,
        ),
        map(
            (
                tag_no_case("RIGHT"),
                opt((multispace1, tag_no_case("OUTER"))),
                multispace1,
                tag_no_case("JOIN"),
            ),
            |_| JoinType::RightOuter,
        ),
        map(
            (
                tag_no_case("FULL"),
                opt((multispace1, tag_no_case("OUTER"))),
                multispace1,
                tag_no_case("JOIN"),
            ),
            |_| JoinType::FullOuter,
        ),
        map(
            (tag_no_case("CROSS"), multispace1, tag_no_case("JOIN")),
            |_| JoinType::Cross,
        ),
        map(tag_no_case("JOIN"), |_| JoinType::Inner),
    ))
    .parse(input)
}

fn parse_on_clause(input: &str) -> IResult<&str, Condition> {
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("ON").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    parse_condition.parse(input)
}

fn parse_where_clause(input: &str) -> IResult<&str, Condition> {
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("WHERE").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    parse_condition.parse(input)
}

// Conditions come out in disjunctive normal form: AND binds tighter than OR.
fn parse_condition(input: &str) -> IResult<&str, Condition> {
    map(
        separated_list1(
            delimited(multispace1, tag_no_case("OR"), multispace1),
            parse_and_term,
        ),
        |or_terms| Condition { or_terms },
    )
    .parse(input)
}

fn parse_and_term(input: &str) -> IResult<&str, Vec<Comparison>> {
    separated_list1(
        delimited(multispace1, tag_no_case("AND"), multispace1),
        parse_comparison,
    )
    .parse(input)
}

fn parse_comparison(input: &str) -> IResult<&str, Comparison> {
    let (input, left) = parse_operand.parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, op) = parse_compare_op.parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, right) = parse_operand.parse(input)?;
    Ok((input, Comparison { left, op, right }))
}

fn parse_compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        map(tag(">="), |_| CompareOp::GreaterEq),
        map(tag("<="), |_| CompareOp::LessEq),
        map(tag("<>"), |_| CompareOp::NotEq),
        map(tag("!="), |_| CompareOp::NotEq),
        map(tag("="), |_| CompareOp::Eq),
        map(tag("<"), |_| CompareOp::Less),
        map(tag(">"), |_| CompareOp::Greater),
    ))
    .parse(input)
}

fn parse_operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(parse_value, Operand::Literal),
        map(parse_column_ref, |cr| match cr.source {
            Some(source) => Operand::Scoped(source, cr.column),
            None => Operand::Ident(cr.column),
        }),
    ))
    .parse(input)
}

fn parse_value(input: &str) -> IResult<&str, Value> {
    alt((
        map(terminated_keyword("NULL"), |_| Value::Null),
        map(parse_string_literal, Value::Text),
        map(parse_real, Value::Real),
        map(parse_integer, Value::Integer),
    ))
    .parse(input)
}

// A keyword literal that must not run into a longer identifier.
fn terminated_keyword(kw: &'static str) -> impl Fn(&str) -> IResult<&str, ()> {
    move |input: &str| {
        let (rest, _) = tag_no_case::<&str, &str, nom::error::Error<&str>>(kw).parse(input)?;
        if rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )));
        }
        Ok((rest, ()))
    }
}

fn parse_string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(opt(take_while1(|c| c != '\'')), |s: Option<&str>| {
            s.unwrap_or("").to_string()
        }),
        char('\''),
    )
    .parse(input)
}

fn parse_integer(input: &str) -> IResult<&str, i64> {
    let (input, int_str) = recognize(pair(opt(char('-')), digit1)).parse(input)?;
    let value = int_str.parse::<i64>().map_err(|_e| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;
    Ok((input, value))
}

fn parse_real(input: &str) -> IResult<&str, f64> {
    let (input, real_str) = recognize((opt(char('-')), digit1, char('.'), digit1)).parse(input)?;
    let value = real_str.parse::<f64>().map_err(|_e| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;
    Ok((input, value))
}

fn parse_group_by(input: &str) -> IResult<&str, Vec<ColumnRef>> {
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("GROUP").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("BY").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    separated_list1(
        delimited(multispace0, char(','), multispace0),
        parse_column_ref,
    )
    .parse(input)
}

fn parse_having(input: &str) -> IResult<&str, Condition> {
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("HAVING").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    parse_condition.parse(input)
}

fn parse_order_by(input: &str) -> IResult<&str, Vec<ColumnRef>> {
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("ORDER").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("BY").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    separated_list1(
        delimited(multispace0, char(','), multispace0),
        map(
            pair(
                parse_column_ref,
                opt(preceded(
                    multispace1,
                    alt((tag_no_case("ASC"), tag_no_case("DESC"))),
                )),
            ),
            |(cr, _)| cr,
        ),
    )
    .parse(input)
}

fn parse_limit(input: &str) -> IResult<&str, u64> {
    let (input, _) = multispace1.parse(input)?;
    let (input, _) = tag_no_case("LIMIT").parse(input)?;
    let (input, _) = multispace1.parse(input)?;
    let (input, limit_str) = digit1.parse(input)?;
    let limit = limit_str.parse::<u64>().map_err(|_e| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;
    Ok((input, limit))
}
