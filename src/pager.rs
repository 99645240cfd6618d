//! Page cache over the database file.
//!
//! The file is an array of fixed-size pages. Page 0 carries the file header;
//! page 1 is the catalog tree's root, known a priori. Pages are cached in
//! memory and written back on flush.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use fs2::FileExt;

use crate::error::{Error, Result};

pub const PAGE_SIZE: usize = 4096;
/// Root page of the catalog tree.
pub const CATALOG_ROOT_PAGE: u32 = 1;

pub const FILE_MAGIC: &[u8; 6] = b"ACORN\0";
pub const FILE_FORMAT_VERSION: u16 = 1;

/// In-file header layout on page 0 (big-endian on disk):
/// [0..6)   magic:      b"ACORN\0"
/// [6..8)   version:    u16
/// [8..12)  page_count: u32
/// [12..)   reserved:   zero padding
const HEADER_MAGIC_END: usize = 6;
const HEADER_VERSION_END: usize = 8;
const HEADER_PAGE_COUNT_END: usize = 12;

pub type Page = Box<[u8; PAGE_SIZE]>;

/// Shared handle trees and cursors use to reach the pager.
pub type SharedPager = Rc<RefCell<Pager>>;

#[derive(Debug)]
pub struct Pager {
    file: File,
    page_count: u32,
    cache: HashMap<u32, Page>,
    dirty: BTreeSet<u32>,
}

impl Pager {
    /// Open (or create) a database file and take an exclusive lock on it.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|e| Error::FileLocked(format!("{}: {e}", path.display())))?;

        let len = file.metadata()?.len();
        let mut pager = Self {
            file,
            page_count: 1,
            cache: HashMap::new(),
            dirty: BTreeSet::new(),
        };
        if len == 0 {
            // Fresh file: header only. The caller lays out the catalog root.
            pager.dirty.insert(0);
            pager.flush()?;
        } else {
            pager.read_header()?;
        }
        Ok(pager)
    }

    /// Open a pager and wrap it for shared single-threaded use.
    pub fn open_shared(path: &Path) -> Result<SharedPager> {
        Ok(Rc::new(RefCell::new(Self::open(path)?)))
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// A freshly initialized file holds nothing but the header page.
    pub fn is_fresh(&self) -> bool {
        self.page_count == 1
    }

    /// Allocate a zeroed page and return its number.
    pub fn allocate_page(&mut self) -> u32 {
        let page_num = self.page_count;
        self.page_count += 1;
        self.cache.insert(page_num, Box::new([0u8; PAGE_SIZE]));
        self.dirty.insert(page_num);
        page_num
    }

    /// Read a page, via the cache. The returned page is a copy.
    pub fn read_page(&mut self, page_num: u32) -> Result<Page> {
        if page_num == 0 || page_num >= self.page_count {
            return Err(Error::Corrupted(format!(
                "page {page_num} out of bounds (page count {})",
                self.page_count
            )));
        }
        if let Some(page) = self.cache.get(&page_num) {
            return Ok(page.clone());
        }
        let mut buf = Box::new([0u8; PAGE_SIZE]);
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.read_exact(buf.as_mut())?;
        self.cache.insert(page_num, buf.clone());
        Ok(buf)
    }

    /// Replace a page's contents and mark it dirty.
    pub fn write_page(&mut self, page_num: u32, page: Page) -> Result<()> {
        if page_num == 0 || page_num >= self.page_count {
            return Err(Error::Corrupted(format!(
                "write to page {page_num} out of bounds (page count {})",
                self.page_count
            )));
        }
        self.cache.insert(page_num, page);
        self.dirty.insert(page_num);
        Ok(())
    }

    /// Write the header and all dirty pages back to the file and fsync.
    pub fn flush(&mut self) -> Result<()> {
        let dirty: Vec<u32> = self.dirty.iter().copied().collect();
        for page_num in dirty {
            if page_num == 0 {
                continue; // header is rebuilt below
            }
            if let Some(page) = self.cache.get(&page_num) {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.write_all(page.as_ref())?;
            }
        }
        // the header always goes out so page_count stays current
        let header = self.build_header();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(header.as_ref())?;
        self.file.sync_all()?;
        self.dirty.clear();
        Ok(())
    }

    fn build_header(&self) -> Page {
        let mut header = Box::new([0u8; PAGE_SIZE]);
        header[..HEADER_MAGIC_END].copy_from_slice(FILE_MAGIC);
        header[HEADER_MAGIC_END..HEADER_VERSION_END]
            .copy_from_slice(&FILE_FORMAT_VERSION.to_be_bytes());
        header[HEADER_VERSION_END..HEADER_PAGE_COUNT_END]
            .copy_from_slice(&self.page_count.to_be_bytes());
        header
    }

    fn read_header(&mut self) -> Result<()> {
        let mut header = [0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header)?;
        if &header[..HEADER_MAGIC_END] != FILE_MAGIC {
            return Err(Error::Corrupted("bad file magic".to_string()));
        }
        let version = u16::from_be_bytes([header[HEADER_MAGIC_END], header[HEADER_MAGIC_END + 1]]);
        if version != FILE_FORMAT_VERSION {
            return Err(Error::Corrupted(format!(
                "unsupported file format version {version}"
            )));
        }
        let mut count = [0u8; 4];
        count.copy_from_slice(&header[HEADER_VERSION_END..HEADER_PAGE_COUNT_END]);
        self.page_count = u32::from_be_bytes(count);
        if self.page_count == 0 {
            return Err(Error::Corrupted("header page count is zero".to_string()));
        }
        Ok(())
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        // Best effort; explicit flush is the durable path.
        let _ = self.flush();
    }
}
