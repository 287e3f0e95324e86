mod cached;
use cached::*;

use std::collections::BTreeMap;

use crate::{
    block::{Block, Tsb, storage::Storage},
    fs::{
        Filesystem,
        dir::{DirEntry, DirEntryName},
        error::{Error, Result},
        file::File,
        master::MasterBlock,
    },
};

/// Filesystem operation that buffers changes in memory before commiting them to the block store.
pub struct Transaction<'a, S: Storage> {
    storage: CachedStorage<'a, S>,
    fs_entries: &'a mut BTreeMap<DirEntryName, DirEntry>,
    entries: BTreeMap<DirEntryName, DirEntry>,
}

impl<'a, S: Storage> Transaction<'a, S> {
    /// Constructs a `Transaction` for a given filesystem.
    pub(super) fn new(fs: &'a mut Filesystem<S>) -> Self {
        let entries = fs.entries.clone();
        Self {
            storage: CachedStorage::new(&mut fs.storage),
            fs_entries: &mut fs.entries,
            entries,
        }
    }

    /// Commits the transaction to storage, consuming itself.
    pub(super) fn commit(mut self) -> Result<()> {
        self.storage.sync()?;
        *self.fs_entries = self.entries;
        Ok(())
    }

    /// Clears every block of the device and writes a fresh master block.
    pub fn format(&mut self) -> Result<()> {
        let geometry = self.storage.geometry();
        for tsb in geometry.locations() {
            self.storage.write_at(&Block::default(), tsb)?;
        }
        MasterBlock::new(&geometry).write(&mut self.storage)?;
        self.entries.clear();
        Ok(())
    }

    /// Returns the names of every file, in order.
    pub fn files(&self) -> impl Iterator<Item = &DirEntryName> {
        self.entries.keys()
    }

    pub fn find_entry(&self, name: &str) -> Result<&DirEntry> {
        let name = DirEntryName::try_from(name)?;
        self.entries.get(&name).ok_or(Error::DoesNotExist)
    }

    pub fn create_file(&mut self, name: &str) -> Result<DirEntry> {
        let name = DirEntryName::try_from(name)?;
        if self.entries.contains_key(&name) {
            return Err(Error::AlreadyExists);
        }

        let entry = DirEntry::create(&mut self.storage, name.clone())?;
        self.entries.insert(name, entry.clone());
        Ok(entry)
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let first = self.find_entry(name)?.first;
        File::read(&self.storage, first)
    }

    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let first = self.find_entry(name)?.first;
        File::write(&mut self.storage, first, data)
    }

    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        let entry = self.find_entry(name)?.clone();

        File::free(&mut self.storage, entry.first)?;
        entry.clear(&mut self.storage)?;
        MasterBlock::refresh(&mut self.storage)?;

        self.entries.remove(&entry.name);
        Ok(())
    }

    /// Reads the raw block at `tsb`.
    pub fn read_block(&self, tsb: Tsb) -> Result<Block> {
        let mut block = Block::default();
        self.storage.read_at(&mut block, tsb)?;
        Ok(block)
    }
}
