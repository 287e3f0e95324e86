use std::collections::BTreeMap;

use crate::block::{
    Block, Geometry, Tsb,
    storage::{Error, Result, Storage},
};

/// Buffers block writes in memory until synced to the wrapped storage.
pub(super) struct CachedStorage<'a, S> {
    inner: &'a mut S,
    cache: BTreeMap<Tsb, Block>,
}

impl<'a, S: Storage> CachedStorage<'a, S> {
    pub(super) fn new(inner: &'a mut S) -> Self {
        Self {
            inner,
            cache: Default::default(),
        }
    }

    pub(super) fn sync(&mut self) -> Result<()> {
        for (tsb, block) in &self.cache {
            self.inner.write_at(block, *tsb)?;
        }
        self.cache.clear();
        Ok(())
    }
}

impl<S: Storage> Storage for CachedStorage<'_, S> {
    fn read_at(&self, block: &mut Block, tsb: Tsb) -> Result<()> {
        if let Some(cached) = self.cache.get(&tsb) {
            *block = *cached;
            Ok(())
        } else {
            self.inner.read_at(block, tsb)
        }
    }

    fn write_at(&mut self, block: &Block, tsb: Tsb) -> Result<()> {
        // Reject locations off the device now rather than at sync
        if !self.inner.geometry().contains(tsb) {
            return Err(Error::InvalidLocation(tsb));
        }
        self.cache.insert(tsb, *block);
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.inner.geometry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::block::{BlockHeader, CONTENT_SIZE, storage::grid::GridStorage};

    fn filled(byte: u8) -> Block {
        Block::new(BlockHeader::occupied(None), &[byte; CONTENT_SIZE])
    }

    #[test]
    fn reads_from_inner() {
        let mut inner = GridStorage::default();
        let write_block = filled(0xAB);
        inner.write_at(&write_block, Tsb::MASTER).unwrap();

        let cached = CachedStorage::new(&mut inner);

        let mut read_block = Block::default();
        cached.read_at(&mut read_block, Tsb::MASTER).unwrap();
        assert_eq!(read_block, write_block);
    }

    #[test]
    fn buffers_writes() {
        let mut inner = GridStorage::default();
        let mut cached = CachedStorage::new(&mut inner);

        let write_block = filled(0xAB);
        cached.write_at(&write_block, Tsb::MASTER).unwrap();

        let mut read_block = Block::default();
        cached.read_at(&mut read_block, Tsb::MASTER).unwrap();
        assert_eq!(read_block, write_block);

        let mut inner_read_block = Block::default();
        cached
            .inner
            .read_at(&mut inner_read_block, Tsb::MASTER)
            .unwrap();
        assert_eq!(inner_read_block, Block::default());
    }

    #[test]
    fn rejects_invalid_location() {
        let mut inner = GridStorage::default();
        let mut cached = CachedStorage::new(&mut inner);
        assert!(cached.write_at(&filled(1), Tsb::new(4, 0, 0)).is_err());
    }

    #[test]
    fn syncs_writes_to_inner() {
        let mut inner = GridStorage::default();
        let mut cached = CachedStorage::new(&mut inner);

        let write_block_1 = filled(0xAB);
        let write_block_2 = filled(0xCD);

        cached.write_at(&write_block_1, Tsb::new(0, 0, 0)).unwrap();
        cached.write_at(&write_block_2, Tsb::new(3, 7, 7)).unwrap();

        cached.sync().unwrap();

        let mut inner_read_block_1 = Block::default();
        let mut inner_read_block_2 = Block::default();

        cached
            .inner
            .read_at(&mut inner_read_block_1, Tsb::new(0, 0, 0))
            .unwrap();
        cached
            .inner
            .read_at(&mut inner_read_block_2, Tsb::new(3, 7, 7))
            .unwrap();

        assert_eq!(inner_read_block_1, write_block_1);
        assert_eq!(inner_read_block_2, write_block_2);
    }
}
