use crate::{
    block::{Block, BlockHeader, CONTENT_SIZE, Tsb, storage::Storage, trim_fill},
    fs::{
        error::{Error, Result},
        master::{self, MasterBlock},
    },
};

/// Operations on a chain of content blocks linked through their headers.
pub struct File;

impl File {
    /// Returns the number of blocks needed to hold `len` bytes. An empty file still holds one.
    pub fn blocks_for(len: usize) -> usize {
        len.div_ceil(CONTENT_SIZE).max(1)
    }

    /// Returns the locations of the chain starting at `first`, in order.
    pub fn chain(storage: &impl Storage, first: Tsb) -> Result<Vec<Tsb>> {
        let max_len = storage.geometry().file_block_count();
        let mut chain = Vec::new();
        let mut block = Block::default();
        let mut next = Some(first);

        while let Some(tsb) = next {
            if chain.len() == max_len {
                return Err(Error::CorruptChain(tsb));
            }
            storage.read_at(&mut block, tsb)?;
            chain.push(tsb);
            next = block.header().next();
        }

        Ok(chain)
    }

    /// Concatenates the content of every block in the chain, without trailing fill.
    pub fn read(storage: &impl Storage, first: Tsb) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut block = Block::default();
        for tsb in Self::chain(storage, first)? {
            storage.read_at(&mut block, tsb)?;
            data.extend_from_slice(block.content());
        }
        let len = trim_fill(&data).len();
        data.truncate(len);
        Ok(data)
    }

    /// Replaces the content of the chain starting at `first` with `data`,
    /// shrinking or extending the chain as needed.
    pub fn write(storage: &mut impl Storage, first: Tsb, data: &[u8]) -> Result<()> {
        let geometry = storage.geometry();
        let chain = Self::chain(storage, first)?;
        let available = master::count_free(storage, geometry.file_locations())?;
        if available + chain.len() < Self::blocks_for(data.len()) {
            return Err(Error::InsufficientSpace);
        }

        // Keep the first block, release the rest
        for &tsb in &chain[1..] {
            storage.write_at(&Block::default(), tsb)?;
        }
        MasterBlock::refresh(storage)?;

        let mut chunks = data.chunks(CONTENT_SIZE).peekable();
        let mut current = first;
        loop {
            let chunk = chunks.next().unwrap_or_default();
            let next = if chunks.peek().is_some() {
                let master = MasterBlock::read(storage)?;
                Some(master.next_file().ok_or(Error::InsufficientSpace)?)
            } else {
                None
            };

            let block = Block::new(BlockHeader::occupied(next), chunk);
            storage.write_at(&block, current)?;

            let Some(next) = next else {
                break;
            };

            // Claim the next block before the allocation pointer moves on
            let claimed = Block::new(BlockHeader::occupied(None), &[]);
            storage.write_at(&claimed, next)?;
            MasterBlock::refresh(storage)?;

            current = next;
        }

        Ok(())
    }

    /// Clears every block in the chain starting at `first`.
    pub fn free(storage: &mut impl Storage, first: Tsb) -> Result<()> {
        for tsb in Self::chain(storage, first)? {
            storage.write_at(&Block::default(), tsb)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Geometry, storage::grid::GridStorage};

    fn with_file() -> (GridStorage, Tsb) {
        let mut storage = GridStorage::default();
        MasterBlock::new(&Geometry::default())
            .write(&mut storage)
            .unwrap();
        let first = Tsb::new(1, 0, 0);
        storage
            .write_at(&Block::new(BlockHeader::occupied(None), &[]), first)
            .unwrap();
        MasterBlock::refresh(&mut storage).unwrap();
        (storage, first)
    }

    #[test]
    fn blocks_for() {
        assert_eq!(File::blocks_for(0), 1);
        assert_eq!(File::blocks_for(CONTENT_SIZE), 1);
        assert_eq!(File::blocks_for(CONTENT_SIZE + 1), 2);
    }

    #[test]
    fn write_spans_blocks() {
        let (mut storage, first) = with_file();
        let data: Vec<u8> = (1..=150).collect();

        File::write(&mut storage, first, &data).unwrap();

        let chain = File::chain(&storage, first).unwrap();
        assert_eq!(chain.len(), File::blocks_for(data.len()));
        assert_eq!(File::read(&storage, first).unwrap(), data);
    }

    #[test]
    fn rewrite_shrinks_chain() {
        let (mut storage, first) = with_file();
        File::write(&mut storage, first, &[7; 150]).unwrap();
        File::write(&mut storage, first, b"short").unwrap();

        assert_eq!(File::chain(&storage, first).unwrap(), vec![first]);
        assert_eq!(File::read(&storage, first).unwrap(), b"short");

        let free = master::count_free(&storage, storage.geometry().file_locations()).unwrap();
        assert_eq!(free, storage.geometry().file_block_count() - 1);
    }

    #[test]
    fn interior_zeros_survive() {
        let (mut storage, first) = with_file();
        let mut data = vec![1; CONTENT_SIZE - 1];
        data.extend_from_slice(&[0, 0, 2]);

        File::write(&mut storage, first, &data).unwrap();
        assert_eq!(File::read(&storage, first).unwrap(), data);
    }

    #[test]
    fn write_too_large() {
        let (mut storage, first) = with_file();
        let capacity = storage.geometry().file_block_count() * CONTENT_SIZE;

        let res = File::write(&mut storage, first, &vec![1; capacity + 1]);
        assert_eq!(res, Err(Error::InsufficientSpace));
        assert_eq!(File::read(&storage, first).unwrap(), b"");
    }

    #[test]
    fn free() {
        let (mut storage, first) = with_file();
        File::write(&mut storage, first, &[7; 150]).unwrap();
        File::free(&mut storage, first).unwrap();

        let free = master::count_free(&storage, storage.geometry().file_locations()).unwrap();
        assert_eq!(free, storage.geometry().file_block_count());
    }

    #[test]
    fn cyclic_chain() {
        let (mut storage, first) = with_file();
        storage
            .write_at(&Block::new(BlockHeader::occupied(Some(first)), &[]), first)
            .unwrap();
        assert!(matches!(
            File::chain(&storage, first),
            Err(Error::CorruptChain(_))
        ));
    }

    #[test]
    fn invalid_next_location() {
        let (mut storage, first) = with_file();
        let beyond = Tsb::new(9, 0, 0);
        storage
            .write_at(&Block::new(BlockHeader::occupied(Some(beyond)), &[]), first)
            .unwrap();
        assert_eq!(
            File::read(&storage, first),
            Err(Error::Storage(crate::block::storage::Error::InvalidLocation(
                beyond
            )))
        );
    }
}
