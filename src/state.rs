//! Database-level state: the pager plus the registries of schemas and tree
//! handles the virtual machine borrows by table name.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::btree::Tree;
use crate::error::{Error, Result};
use crate::pager::{Pager, SharedPager, CATALOG_ROOT_PAGE};
use crate::schema::{catalog_schema, Schema};

pub struct StateManager {
    pager: SharedPager,
    catalog_schema: Rc<Schema>,
    schemas: HashMap<String, Rc<Schema>>,
    trees: HashMap<String, Tree>,
}

impl StateManager {
    /// Open a database file. A fresh file gets its catalog root laid out at
    /// the reserved page.
    pub fn open(path: &Path) -> Result<Self> {
        let pager = Pager::open_shared(path)?;
        let fresh = pager.borrow().is_fresh();
        if fresh {
            let tree = Tree::create(&pager)?;
            if tree.root_page() != CATALOG_ROOT_PAGE {
                return Err(Error::Corrupted(format!(
                    "catalog root landed on page {} instead of {CATALOG_ROOT_PAGE}",
                    tree.root_page()
                )));
            }
            pager.borrow_mut().flush()?;
        }
        Ok(Self {
            pager,
            catalog_schema: Rc::new(catalog_schema()),
            schemas: HashMap::new(),
            trees: HashMap::new(),
        })
    }

    pub fn pager(&self) -> SharedPager {
        Rc::clone(&self.pager)
    }

    pub fn catalog_tree(&self) -> Tree {
        Tree::open(Rc::clone(&self.pager), CATALOG_ROOT_PAGE)
    }

    pub fn catalog_schema(&self) -> Rc<Schema> {
        Rc::clone(&self.catalog_schema)
    }

    /// Allocate a fresh tree and return its root page number.
    pub fn allocate_tree(&self) -> Result<u32> {
        Tree::create(&self.pager).map(|tree| tree.root_page())
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        self.schemas.contains_key(table_name)
    }

    pub fn register_schema(&mut self, table_name: &str, schema: Rc<Schema>) {
        self.schemas.insert(table_name.to_string(), schema);
    }

    pub fn register_tree(&mut self, table_name: &str, tree: Tree) {
        self.trees.insert(table_name.to_string(), tree);
    }

    pub fn get_schema(&self, table_name: &str) -> Option<Rc<Schema>> {
        self.schemas.get(table_name).map(Rc::clone)
    }

    pub fn get_tree(&self, table_name: &str) -> Option<Tree> {
        self.trees.get(table_name).cloned()
    }

    pub fn table_count(&self) -> usize {
        self.schemas.len()
    }

    /// Write all cached state back to the file.
    pub fn flush(&self) -> Result<()> {
        self.pager.borrow_mut().flush()
    }
}
