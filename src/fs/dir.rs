use std::fmt;

use crate::{
    block::{Block, BlockHeader, CONTENT_SIZE, Tsb, storage::Storage, trim_fill},
    fs::{
        error::{Error, Result},
        master::MasterBlock,
    },
};

/// How long a directory entry name can be.
pub const NAME_MAX_LEN: usize = CONTENT_SIZE;

/// Represents the name of a directory entry.
/// Guaranteed to be valid UTF-8, non-empty and free of fill bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntryName(Box<str>);

impl DirEntryName {
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let name = str::from_utf8(bytes).map_err(|_| Error::InvalidData)?;
        Self::try_from(name)
    }

    /// Returns the directory entry name as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks whether the name belongs to a swap file.
    pub fn is_swap(&self) -> bool {
        self.0.ends_with(SWAP_EXTENSION)
    }
}

/// Extension of the files that hold swapped-out process images.
pub const SWAP_EXTENSION: &str = ".swp";

impl<'a> TryFrom<&'a str> for DirEntryName {
    type Error = Error;

    fn try_from(name: &'a str) -> Result<Self> {
        if name.is_empty() || name.len() > NAME_MAX_LEN {
            return Err(Error::InvalidData);
        }

        if name.contains('\0') {
            return Err(Error::InvalidData);
        }

        Ok(Self(name.into()))
    }
}

impl fmt::Display for DirEntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a directory entry: a named pointer to the first block of a file chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub location: Tsb,
    pub first: Tsb,
    pub name: DirEntryName,
}

impl DirEntry {
    /// Claims the next free directory location and the next free file location for `name`.
    pub fn create(storage: &mut impl Storage, name: DirEntryName) -> Result<Self> {
        let master = MasterBlock::read(storage)?;
        let location = master.next_directory().ok_or(Error::InsufficientSpace)?;
        let first = master.next_file().ok_or(Error::InsufficientSpace)?;

        let entry = Self {
            location,
            first,
            name,
        };
        entry.write(storage)?;

        let file = Block::new(BlockHeader::occupied(None), &[]);
        storage.write_at(&file, first)?;

        MasterBlock::refresh(storage)?;
        Ok(entry)
    }

    /// Reads the directory entry stored at `location`, if the location is occupied.
    pub fn read(storage: &impl Storage, location: Tsb) -> Result<Option<Self>> {
        let mut block = Block::default();
        storage.read_at(&mut block, location)?;

        let header = block.header();
        if !header.is_occupied() {
            return Ok(None);
        }

        let first = header.next().ok_or(Error::CorruptChain(location))?;
        let name = DirEntryName::try_from_bytes(trim_fill(block.content()))?;
        Ok(Some(Self {
            location,
            first,
            name,
        }))
    }

    pub fn write(&self, storage: &mut impl Storage) -> Result<()> {
        let block = Block::new(
            BlockHeader::occupied(Some(self.first)),
            self.name.as_str().as_bytes(),
        );
        storage.write_at(&block, self.location)?;
        Ok(())
    }

    /// Clears the directory entry's block. The file chain is left untouched.
    pub fn clear(&self, storage: &mut impl Storage) -> Result<()> {
        storage.write_at(&Block::default(), self.location)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Geometry, storage::grid::GridStorage};

    fn formatted() -> GridStorage {
        let mut storage = GridStorage::default();
        MasterBlock::new(&Geometry::default())
            .write(&mut storage)
            .unwrap();
        storage
    }

    #[test]
    fn name_validation() {
        assert!(DirEntryName::try_from("notes").is_ok());
        assert_eq!(DirEntryName::try_from(""), Err(Error::InvalidData));
        assert_eq!(DirEntryName::try_from("a\0b"), Err(Error::InvalidData));
        let long = "x".repeat(NAME_MAX_LEN + 1);
        assert_eq!(DirEntryName::try_from(long.as_str()), Err(Error::InvalidData));
        let longest = "x".repeat(NAME_MAX_LEN);
        assert!(DirEntryName::try_from(longest.as_str()).is_ok());
    }

    #[test]
    fn swap_names() {
        assert!(DirEntryName::try_from("process-1.swp").unwrap().is_swap());
        assert!(!DirEntryName::try_from("swp").unwrap().is_swap());
    }

    #[test]
    fn create_and_read() {
        let mut storage = formatted();
        let name = DirEntryName::try_from("notes").unwrap();

        let entry = DirEntry::create(&mut storage, name).unwrap();
        assert_eq!(entry.location, Tsb::new(0, 0, 1));
        assert_eq!(entry.first, Tsb::new(1, 0, 0));

        let read = DirEntry::read(&storage, entry.location).unwrap();
        assert_eq!(read, Some(entry));

        let master = MasterBlock::read(&storage).unwrap();
        assert_eq!(master.next_directory(), Some(Tsb::new(0, 0, 2)));
        assert_eq!(master.next_file(), Some(Tsb::new(1, 0, 1)));
    }

    #[test]
    fn clear() {
        let mut storage = formatted();
        let name = DirEntryName::try_from("notes").unwrap();
        let entry = DirEntry::create(&mut storage, name).unwrap();

        entry.clear(&mut storage).unwrap();
        assert_eq!(DirEntry::read(&storage, entry.location).unwrap(), None);
    }
}
