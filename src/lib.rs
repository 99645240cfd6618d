//! A single-file relational database.
//!
//! Tables live in B-trees of fixed-size pages; the catalog is itself a
//! regular B-tree whose rows hold each table's DDL, re-parsed on open to
//! rebuild schemas and tree handles. A small virtual machine executes parsed
//! statements: scans, filters, inserts, deletes, and left-deep inner joins
//! over in-memory record sets.
//!
//! # Examples
//!
//! ```no_run
//! use acorndb::{Database, Result};
//!
//! # fn main() -> Result<()> {
//! let mut db = Database::open("/tmp/demo.adb")?;
//! db.execute("CREATE TABLE parts (id INTEGER PRIMARY KEY, label TEXT)")?;
//! db.execute("INSERT INTO parts (id, label) VALUES (1, 'bolt')")?;
//! db.execute("INSERT INTO parts (id, label) VALUES (2, 'nut')")?;
//!
//! let rows = db.query("SELECT * FROM parts WHERE id >= 2")?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod btree;
pub mod codec;
mod database;
mod error;
pub mod pager;
pub mod parser;
mod pipe;
pub mod record;
pub mod schema;
mod state;
mod vm;

pub use database::Database;
pub use error::{Error, Result};
pub use parser::{parse_program, Program, Statement, Value};
pub use pipe::Pipe;
pub use record::Record;
pub use state::StateManager;
pub use vm::{StatementOutcome, StatementResult, VirtualMachine};
