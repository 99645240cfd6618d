//! High-level database interface
//!
//! A small connection-style wrapper over the state manager and virtual
//! machine: open a file, feed it SQL text, read rows back.

use std::path::Path;

use crate::error::Result;
use crate::parser::parse_program;
use crate::pipe::Pipe;
use crate::record::Record;
use crate::state::StateManager;
use crate::vm::{StatementResult, VirtualMachine};

pub struct Database {
    vm: VirtualMachine,
}

impl Database {
    /// Create or open a database file. Opening bootstraps every table
    /// recorded in the catalog.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let state = StateManager::open(path.as_ref())?;
        let vm = VirtualMachine::new(state, Pipe::new())?;
        Ok(Self { vm })
    }

    /// Parse and run SQL, returning one result per statement. Failed
    /// statements do not stop the ones after them.
    pub fn execute(&mut self, sql: &str) -> Result<Vec<StatementResult>> {
        let program = parse_program(sql)?;
        self.vm.run(&program, false)
    }

    /// Run SQL and drain whatever the final SELECT wrote to the output pipe.
    /// Any failed statement surfaces as this call's error.
    pub fn query(&mut self, sql: &str) -> Result<Vec<Record>> {
        let program = parse_program(sql)?;
        let results = self.vm.run(&program, false)?;
        for result in results {
            result?;
        }
        Ok(self.vm.pipe_mut().take())
    }

    pub fn vm(&self) -> &VirtualMachine {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut VirtualMachine {
        &mut self.vm
    }
}
