//! B-tree of fixed-size pages.
//!
//! Cells are opaque byte strings whose first 8 bytes are the big-endian
//! record key. Leaf pages hold length-prefixed cells sorted by key and chain
//! through a right-sibling pointer so cursors can walk the table in key
//! order. Interior pages hold sorted (key, child) separators; a child covers
//! the keys at or below its separator, the rightmost child covers the rest.
//!
//! A tree's root page number never changes: when the root fills up, its
//! halves move to fresh pages and the root is rewritten in place as an
//! interior node. Deletion removes cells without rebalancing; cursors skip
//! leaves that have been emptied.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::pager::{Pager, SharedPager, PAGE_SIZE};

const NODE_LEAF: u8 = 1;
const NODE_INTERNAL: u8 = 2;

/// Node page layout (big-endian):
/// [0]     node type
/// [1..3)  cell count (leaf) / entry count (interior)
/// [3..7)  right sibling page (leaf, 0 = none) / rightmost child (interior)
/// [7..)   leaf:     cells, each [u16 len][len bytes]
///         interior: entries, each [i64 key][u32 child]
const NODE_HEADER_SIZE: usize = 7;
const CELL_LEN_BYTES: usize = 2;
const INTERNAL_ENTRY_SIZE: usize = 12;

const LEAF_CAPACITY_BYTES: usize = PAGE_SIZE - NODE_HEADER_SIZE;
const INTERNAL_MAX_ENTRIES: usize = (PAGE_SIZE - NODE_HEADER_SIZE) / INTERNAL_ENTRY_SIZE;

/// Largest accepted cell. Keeps any two cells under half a leaf so splits
/// always terminate.
pub const MAX_CELL_SIZE: usize = 1024;

/// Shortest possible cell: the bare key.
pub const KEY_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeInsertResult {
    Success,
    DuplicateKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeDeleteResult {
    Success,
    NotFound,
}

/// Extract a cell's key from its first 8 bytes.
pub fn cell_key(cell: &[u8]) -> Result<i64> {
    if cell.len() < KEY_SIZE {
        return Err(Error::Corrupted(format!(
            "cell of {} bytes is shorter than a key",
            cell.len()
        )));
    }
    let mut buf = [0u8; KEY_SIZE];
    buf.copy_from_slice(&cell[..KEY_SIZE]);
    Ok(i64::from_be_bytes(buf))
}

enum Node {
    Leaf {
        cells: Vec<Vec<u8>>,
        right_sibling: u32,
    },
    Internal {
        entries: Vec<(i64, u32)>,
        rightmost: u32,
    },
}

enum InsertOutcome {
    Done,
    Duplicate,
    Split { split_key: i64, right_page: u32 },
}

/// A handle on one persistent B-tree, identified by its root page.
#[derive(Clone)]
pub struct Tree {
    pager: SharedPager,
    root_page: u32,
}

impl Tree {
    /// Open a tree whose root page is already known (e.g. from the catalog).
    pub fn open(pager: SharedPager, root_page: u32) -> Self {
        Self { pager, root_page }
    }

    /// Allocate and initialize a brand-new empty tree.
    pub fn create(pager: &SharedPager) -> Result<Self> {
        let root_page = {
            let mut pager = pager.borrow_mut();
            let page_num = pager.allocate_page();
            write_node(
                &mut pager,
                page_num,
                &Node::Leaf {
                    cells: Vec::new(),
                    right_sibling: 0,
                },
            )?;
            page_num
        };
        Ok(Self {
            pager: Rc::clone(pager),
            root_page,
        })
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    /// Insert a cell, keyed by its first 8 bytes.
    pub fn insert(&self, cell: &[u8]) -> Result<TreeInsertResult> {
        if cell.len() > MAX_CELL_SIZE {
            return Err(Error::Storage(format!(
                "cell of {} bytes exceeds the {MAX_CELL_SIZE} byte limit",
                cell.len()
            )));
        }
        let key = cell_key(cell)?;
        let mut pager = self.pager.borrow_mut();
        match insert_into(&mut pager, self.root_page, key, cell)? {
            InsertOutcome::Done => Ok(TreeInsertResult::Success),
            InsertOutcome::Duplicate => Ok(TreeInsertResult::DuplicateKey),
            InsertOutcome::Split {
                split_key,
                right_page,
            } => {
                // The root kept its lower half in place. Move that half to a
                // fresh page and re-root in place as an interior node, so the
                // root page number stays stable.
                let lower = read_node(&mut pager, self.root_page)?;
                let left_page = pager.allocate_page();
                write_node(&mut pager, left_page, &lower)?;
                write_node(
                    &mut pager,
                    self.root_page,
                    &Node::Internal {
                        entries: vec![(split_key, left_page)],
                        rightmost: right_page,
                    },
                )?;
                Ok(TreeInsertResult::Success)
            }
        }
    }

    /// Delete the cell with the given key.
    pub fn delete(&self, key: i64) -> Result<TreeDeleteResult> {
        let mut pager = self.pager.borrow_mut();
        let mut page_num = self.root_page;
        loop {
            match read_node(&mut pager, page_num)? {
                Node::Internal { entries, rightmost } => {
                    page_num = child_for_key(&entries, rightmost, key);
                }
                Node::Leaf {
                    mut cells,
                    right_sibling,
                } => {
                    let mut found = None;
                    for (idx, cell) in cells.iter().enumerate() {
                        if cell_key(cell)? == key {
                            found = Some(idx);
                            break;
                        }
                    }
                    let Some(idx) = found else {
                        return Ok(TreeDeleteResult::NotFound);
                    };
                    cells.remove(idx);
                    write_node(
                        &mut pager,
                        page_num,
                        &Node::Leaf {
                            cells,
                            right_sibling,
                        },
                    )?;
                    return Ok(TreeDeleteResult::Success);
                }
            }
        }
    }
}

/// A stateful pointer into a tree, yielding cells in key order.
pub struct Cursor {
    pager: SharedPager,
    page_num: u32,
    cell_idx: usize,
    end_of_table: bool,
}

impl Cursor {
    /// Position a cursor on the first cell of the tree.
    pub fn new(pager: SharedPager, tree: &Tree) -> Result<Self> {
        let mut cursor = Self {
            pager,
            page_num: tree.root_page(),
            cell_idx: 0,
            end_of_table: false,
        };
        cursor.descend_leftmost()?;
        cursor.skip_empty_leaves()?;
        Ok(cursor)
    }

    pub fn end_of_table(&self) -> bool {
        self.end_of_table
    }

    /// Read the cell under the cursor.
    pub fn get_cell(&self) -> Result<Vec<u8>> {
        if self.end_of_table {
            return Err(Error::Storage("cursor is past the end of table".to_string()));
        }
        let mut pager = self.pager.borrow_mut();
        match read_node(&mut pager, self.page_num)? {
            Node::Leaf { cells, .. } => cells.get(self.cell_idx).cloned().ok_or_else(|| {
                Error::Corrupted(format!(
                    "cursor cell {} out of range on page {}",
                    self.cell_idx, self.page_num
                ))
            }),
            Node::Internal { .. } => Err(Error::Corrupted(format!(
                "cursor landed on interior page {}",
                self.page_num
            ))),
        }
    }

    /// Move to the next cell, following the leaf chain.
    pub fn advance(&mut self) -> Result<()> {
        if self.end_of_table {
            return Ok(());
        }
        self.cell_idx += 1;
        self.skip_empty_leaves()
    }

    fn descend_leftmost(&mut self) -> Result<()> {
        let mut pager = self.pager.borrow_mut();
        loop {
            match read_node(&mut pager, self.page_num)? {
                Node::Internal { entries, rightmost } => {
                    self.page_num = entries.first().map(|e| e.1).unwrap_or(rightmost);
                }
                Node::Leaf { .. } => return Ok(()),
            }
        }
    }

    // Advance over exhausted leaves until a cell or the end of the chain.
    fn skip_empty_leaves(&mut self) -> Result<()> {
        let mut pager = self.pager.borrow_mut();
        loop {
            match read_node(&mut pager, self.page_num)? {
                Node::Leaf {
                    cells,
                    right_sibling,
                } => {
                    if self.cell_idx < cells.len() {
                        return Ok(());
                    }
                    if right_sibling == 0 {
                        self.end_of_table = true;
                        return Ok(());
                    }
                    self.page_num = right_sibling;
                    self.cell_idx = 0;
                }
                Node::Internal { .. } => {
                    return Err(Error::Corrupted(format!(
                        "leaf chain reached interior page {}",
                        self.page_num
                    )))
                }
            }
        }
    }
}

fn child_for_key(entries: &[(i64, u32)], rightmost: u32, key: i64) -> u32 {
    for (separator, child) in entries {
        if key <= *separator {
            return *child;
        }
    }
    rightmost
}

fn insert_into(pager: &mut Pager, page_num: u32, key: i64, cell: &[u8]) -> Result<InsertOutcome> {
    match read_node(pager, page_num)? {
        Node::Leaf {
            mut cells,
            right_sibling,
        } => {
            let mut pos = cells.len();
            for (idx, existing) in cells.iter().enumerate() {
                let existing_key = cell_key(existing)?;
                if existing_key == key {
                    return Ok(InsertOutcome::Duplicate);
                }
                if existing_key > key {
                    pos = idx;
                    break;
                }
            }
            cells.insert(pos, cell.to_vec());

            if leaf_bytes(&cells) <= LEAF_CAPACITY_BYTES {
                write_node(
                    pager,
                    page_num,
                    &Node::Leaf {
                        cells,
                        right_sibling,
                    },
                )?;
                return Ok(InsertOutcome::Done);
            }

            let split_idx = leaf_split_index(&cells);
            let right_cells = cells.split_off(split_idx);
            let split_key = match cells.last() {
                Some(last) => cell_key(last)?,
                None => {
                    return Err(Error::Corrupted(format!(
                        "leaf split of page {page_num} produced an empty left half"
                    )))
                }
            };
            let right_page = pager.allocate_page();
            write_node(
                pager,
                right_page,
                &Node::Leaf {
                    cells: right_cells,
                    right_sibling,
                },
            )?;
            write_node(
                pager,
                page_num,
                &Node::Leaf {
                    cells,
                    right_sibling: right_page,
                },
            )?;
            Ok(InsertOutcome::Split {
                split_key,
                right_page,
            })
        }
        Node::Internal {
            mut entries,
            mut rightmost,
        } => {
            let mut child_idx = None;
            for (idx, (separator, _)) in entries.iter().enumerate() {
                if key <= *separator {
                    child_idx = Some(idx);
                    break;
                }
            }
            let child = match child_idx {
                Some(idx) => entries[idx].1,
                None => rightmost,
            };

            match insert_into(pager, child, key, cell)? {
                InsertOutcome::Done => Ok(InsertOutcome::Done),
                InsertOutcome::Duplicate => Ok(InsertOutcome::Duplicate),
                InsertOutcome::Split {
                    split_key,
                    right_page,
                } => {
                    // The child now covers keys <= split_key; the new right
                    // node covers the rest of the child's old range.
                    match child_idx {
                        Some(idx) => {
                            entries[idx].1 = right_page;
                            entries.insert(idx, (split_key, child));
                        }
                        None => {
                            entries.push((split_key, child));
                            rightmost = right_page;
                        }
                    }

                    if entries.len() <= INTERNAL_MAX_ENTRIES {
                        write_node(pager, page_num, &Node::Internal { entries, rightmost })?;
                        return Ok(InsertOutcome::Done);
                    }

                    let mid = entries.len() / 2;
                    let right_entries = entries.split_off(mid + 1);
                    let (promoted_key, promoted_child) = entries[mid];
                    entries.truncate(mid);

                    let new_right = pager.allocate_page();
                    write_node(
                        pager,
                        new_right,
                        &Node::Internal {
                            entries: right_entries,
                            rightmost,
                        },
                    )?;
                    write_node(
                        pager,
                        page_num,
                        &Node::Internal {
                            entries,
                            rightmost: promoted_child,
                        },
                    )?;
                    Ok(InsertOutcome::Split {
                        split_key: promoted_key,
                        right_page: new_right,
                    })
                }
            }
        }
    }
}

fn leaf_bytes(cells: &[Vec<u8>]) -> usize {
    cells
        .iter()
        .map(|cell| CELL_LEN_BYTES + cell.len())
        .sum::<usize>()
}

// Index splitting an overfull leaf's cells into two halves of roughly equal
// byte weight, at least one cell on each side.
fn leaf_split_index(cells: &[Vec<u8>]) -> usize {
    let total = leaf_bytes(cells);
    let mut acc = 0;
    for (idx, cell) in cells.iter().enumerate() {
        acc += CELL_LEN_BYTES + cell.len();
        if acc >= total / 2 && idx + 1 < cells.len() {
            return idx + 1;
        }
    }
    cells.len().saturating_sub(1).max(1)
}

fn read_node(pager: &mut Pager, page_num: u32) -> Result<Node> {
    let page = pager.read_page(page_num)?;
    let count = u16::from_be_bytes([page[1], page[2]]) as usize;
    let mut pointer = [0u8; 4];
    pointer.copy_from_slice(&page[3..7]);
    let pointer = u32::from_be_bytes(pointer);

    match page[0] {
        NODE_LEAF => {
            let mut cells = Vec::with_capacity(count);
            let mut offset = NODE_HEADER_SIZE;
            for _ in 0..count {
                if offset + CELL_LEN_BYTES > PAGE_SIZE {
                    return Err(Error::Corrupted(format!(
                        "leaf page {page_num} cell directory overruns the page"
                    )));
                }
                let len = u16::from_be_bytes([page[offset], page[offset + 1]]) as usize;
                offset += CELL_LEN_BYTES;
                if offset + len > PAGE_SIZE {
                    return Err(Error::Corrupted(format!(
                        "leaf page {page_num} cell overruns the page"
                    )));
                }
                cells.push(page[offset..offset + len].to_vec());
                offset += len;
            }
            Ok(Node::Leaf {
                cells,
                right_sibling: pointer,
            })
        }
        NODE_INTERNAL => {
            if NODE_HEADER_SIZE + count * INTERNAL_ENTRY_SIZE > PAGE_SIZE {
                return Err(Error::Corrupted(format!(
                    "interior page {page_num} entry count {count} overruns the page"
                )));
            }
            let mut entries = Vec::with_capacity(count);
            let mut offset = NODE_HEADER_SIZE;
            for _ in 0..count {
                let mut key = [0u8; 8];
                key.copy_from_slice(&page[offset..offset + 8]);
                let mut child = [0u8; 4];
                child.copy_from_slice(&page[offset + 8..offset + 12]);
                entries.push((i64::from_be_bytes(key), u32::from_be_bytes(child)));
                offset += INTERNAL_ENTRY_SIZE;
            }
            Ok(Node::Internal {
                entries,
                rightmost: pointer,
            })
        }
        other => Err(Error::Corrupted(format!(
            "page {page_num} has unknown node type {other}"
        ))),
    }
}

fn write_node(pager: &mut Pager, page_num: u32, node: &Node) -> Result<()> {
    let mut page = Box::new([0u8; PAGE_SIZE]);
    match node {
        Node::Leaf {
            cells,
            right_sibling,
        } => {
            page[0] = NODE_LEAF;
            page[1..3].copy_from_slice(&(cells.len() as u16).to_be_bytes());
            page[3..7].copy_from_slice(&right_sibling.to_be_bytes());
            let mut offset = NODE_HEADER_SIZE;
            for cell in cells {
                if offset + CELL_LEN_BYTES + cell.len() > PAGE_SIZE {
                    return Err(Error::Corrupted(format!(
                        "leaf page {page_num} content exceeds page size"
                    )));
                }
                page[offset..offset + CELL_LEN_BYTES]
                    .copy_from_slice(&(cell.len() as u16).to_be_bytes());
                offset += CELL_LEN_BYTES;
                page[offset..offset + cell.len()].copy_from_slice(cell);
                offset += cell.len();
            }
        }
        Node::Internal { entries, rightmost } => {
            page[0] = NODE_INTERNAL;
            page[1..3].copy_from_slice(&(entries.len() as u16).to_be_bytes());
            page[3..7].copy_from_slice(&rightmost.to_be_bytes());
            let mut offset = NODE_HEADER_SIZE;
            for (key, child) in entries {
                if offset + INTERNAL_ENTRY_SIZE > PAGE_SIZE {
                    return Err(Error::Corrupted(format!(
                        "interior page {page_num} content exceeds page size"
                    )));
                }
                page[offset..offset + 8].copy_from_slice(&key.to_be_bytes());
                page[offset + 8..offset + 12].copy_from_slice(&child.to_be_bytes());
                offset += INTERNAL_ENTRY_SIZE;
            }
        }
    }
    pager.write_page(page_num, page)
}
