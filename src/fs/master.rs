use zerocopy::{FromBytes, Immutable, IntoBytes, Unaligned};

use crate::{
    block::{Block, BlockHeader, Geometry, Tsb, TsbStored, storage::Storage},
    fs::error::{Error, Result},
};

/// Allocation pointers kept in the content of the master block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
pub struct MasterBlock {
    pub next_directory: TsbStored,
    pub next_file: TsbStored,
}

impl MasterBlock {
    /// Constructs the master block of a freshly formatted device.
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            // The master block occupies the first directory location
            next_directory: pointer(geometry.directory_locations().nth(1)),
            next_file: pointer(geometry.file_locations().next()),
        }
    }

    /// Returns the next free directory location, if any.
    pub fn next_directory(&self) -> Option<Tsb> {
        get(self.next_directory)
    }

    /// Returns the next free file location, if any.
    pub fn next_file(&self) -> Option<Tsb> {
        get(self.next_file)
    }

    pub fn read(storage: &impl Storage) -> Result<Self> {
        let mut block = Block::default();
        storage.read_at(&mut block, Tsb::MASTER)?;
        if !block.header().is_occupied() {
            return Err(Error::Unformatted);
        }
        let (master, _) = Self::read_from_prefix(block.content())
            .expect("'content' must be larger than 'MasterBlock'");
        Ok(master)
    }

    pub fn write(&self, storage: &mut impl Storage) -> Result<()> {
        let block = Block::from(self);
        storage.write_at(&block, Tsb::MASTER)?;
        Ok(())
    }

    /// Re-scans the device and points both pointers at the first free locations.
    pub fn refresh(storage: &mut impl Storage) -> Result<Self> {
        let geometry = storage.geometry();
        let master = Self {
            next_directory: pointer(first_free(&*storage, geometry.directory_locations())?),
            next_file: pointer(first_free(&*storage, geometry.file_locations())?),
        };
        master.write(storage)?;
        Ok(master)
    }
}

impl From<&MasterBlock> for Block {
    fn from(value: &MasterBlock) -> Self {
        Block::new(BlockHeader::occupied(None), value.as_bytes())
    }
}

fn pointer(tsb: Option<Tsb>) -> TsbStored {
    tsb.map_or(TsbStored::FULL, TsbStored::from)
}

fn get(stored: TsbStored) -> Option<Tsb> {
    if stored == TsbStored::FULL {
        None
    } else {
        Some(stored.get())
    }
}

/// Returns the first location among `locations` whose block is not occupied.
pub fn first_free(
    storage: &impl Storage,
    locations: impl Iterator<Item = Tsb>,
) -> Result<Option<Tsb>> {
    let mut block = Block::default();
    for tsb in locations {
        storage.read_at(&mut block, tsb)?;
        if !block.header().is_occupied() {
            return Ok(Some(tsb));
        }
    }
    Ok(None)
}

/// Counts the locations among `locations` whose block is not occupied.
pub fn count_free(storage: &impl Storage, locations: impl Iterator<Item = Tsb>) -> Result<usize> {
    let mut block = Block::default();
    let mut count = 0;
    for tsb in locations {
        storage.read_at(&mut block, tsb)?;
        if !block.header().is_occupied() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::storage::grid::GridStorage;

    #[test]
    fn fresh_pointers() {
        let master = MasterBlock::new(&Geometry::default());
        assert_eq!(master.next_directory(), Some(Tsb::new(0, 0, 1)));
        assert_eq!(master.next_file(), Some(Tsb::new(1, 0, 0)));
    }

    #[test]
    fn unformatted() {
        let storage = GridStorage::default();
        assert_eq!(MasterBlock::read(&storage), Err(Error::Unformatted));
    }

    #[test]
    fn write_and_read() {
        let mut storage = GridStorage::default();
        let master = MasterBlock::new(&storage.geometry());
        master.write(&mut storage).unwrap();
        assert_eq!(MasterBlock::read(&storage).unwrap(), master);
    }

    #[test]
    fn refresh_reports_full() {
        let geometry = Geometry {
            tracks: 2,
            sectors: 1,
            blocks: 1,
            directory_tracks: 1,
        };
        let mut storage = GridStorage::new(geometry);
        let occupied = Block::new(BlockHeader::occupied(None), &[]);
        storage.write_at(&occupied, Tsb::MASTER).unwrap();
        storage.write_at(&occupied, Tsb::new(1, 0, 0)).unwrap();

        let master = MasterBlock::refresh(&mut storage).unwrap();
        assert_eq!(master.next_directory(), None);
        assert_eq!(master.next_file(), None);
    }
}
