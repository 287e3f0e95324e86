use std::collections::BTreeMap;

use crate::{
    block::{
        Block, Geometry, Tsb,
        storage::Storage,
    },
    fs::{
        dir::{DirEntry, DirEntryName},
        file::File,
        master::MasterBlock,
        transaction::Transaction,
    },
};

pub mod dir;
pub mod error;
pub mod file;
pub mod master;
pub mod transaction;


pub use error::{Error, Response, Result};

/// A directory and file view of a block store.
pub struct Filesystem<S: Storage> {
    storage: S,
    entries: BTreeMap<DirEntryName, DirEntry>,
}

impl<S: Storage> Filesystem<S> {
    /// Formats a storage device and creates an empty filesystem on it.
    pub fn create(storage: S) -> Result<Self> {
        let mut fs = Self {
            storage,
            entries: BTreeMap::new(),
        };
        fs.format()?;
        Ok(fs)
    }

    /// Mounts the filesystem of an already formatted storage device,
    /// rebuilding the directory from the directory tracks.
    pub fn mount(storage: S) -> Result<Self> {
        MasterBlock::read(&storage)?;

        let mut entries = BTreeMap::new();
        for location in storage.geometry().directory_locations().skip(1) {
            if let Some(entry) = DirEntry::read(&storage, location)? {
                entries.insert(entry.name.clone(), entry);
            }
        }

        log::debug!("Mounted filesystem with {} files", entries.len());
        Ok(Self { storage, entries })
    }

    /// Executes a given closure within the context of a transaction.
    /// If the closure returns `Ok`, the transaction is commited to storage.
    /// Else if `Err` is returned, the transaction is discarded and no changes are made.
    pub fn tx<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<S>) -> Result<T>,
    {
        let mut tx = Transaction::new(self);
        let res = f(&mut tx)?;
        tx.commit()?;
        Ok(res)
    }

    /// Clears the whole device, dropping every file.
    pub fn format(&mut self) -> Result<()> {
        self.tx(|tx| tx.format())?;
        log::info!("Formatted disk ({} blocks)", self.geometry().block_count());
        Ok(())
    }

    pub fn create_file(&mut self, name: &str) -> Result<()> {
        self.tx(|tx| tx.create_file(name))?;
        Ok(())
    }

    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.tx(|tx| tx.write_file(name, data))
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let name = DirEntryName::try_from(name)?;
        let entry = self.entries.get(&name).ok_or(Error::DoesNotExist)?;
        File::read(&self.storage, entry.first)
    }

    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        self.tx(|tx| tx.delete_file(name))
    }

    /// Checks whether a file named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        DirEntryName::try_from(name).is_ok_and(|name| self.entries.contains_key(&name))
    }

    /// Returns the names of every file, in order.
    pub fn files(&self) -> impl Iterator<Item = &DirEntryName> {
        self.entries.keys()
    }

    /// Returns the directory entry of every file, in name order.
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.values()
    }

    /// Returns the number of free directory locations.
    pub fn available_directory_count(&self) -> Result<usize> {
        master::count_free(&self.storage, self.geometry().directory_locations())
    }

    /// Returns the number of free file content locations.
    pub fn available_file_count(&self) -> Result<usize> {
        master::count_free(&self.storage, self.geometry().file_locations())
    }

    /// Reads the raw block at `tsb`.
    pub fn read_block(&self, tsb: Tsb) -> Result<Block> {
        let mut block = Block::default();
        self.storage.read_at(&mut block, tsb)?;
        Ok(block)
    }

    pub fn master(&self) -> Result<MasterBlock> {
        MasterBlock::read(&self.storage)
    }

    pub fn geometry(&self) -> Geometry {
        self.storage.geometry()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
