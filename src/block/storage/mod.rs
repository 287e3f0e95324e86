pub mod grid;

use std::fmt;

use crate::block::{Block, Geometry, Tsb};

/// An implementation of `Storage` allows reading and writing whole blocks, as well as determining
/// the device geometry.
pub trait Storage {
    /// Reads the block at `tsb` into `block`.
    fn read_at(&self, block: &mut Block, tsb: Tsb) -> Result<()>;

    /// Writes `block` into the block at `tsb`.
    fn write_at(&mut self, block: &Block, tsb: Tsb) -> Result<()>;

    /// Returns the shape of the device.
    fn geometry(&self) -> Geometry;
}

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    InvalidLocation(Tsb),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLocation(tsb) => write!(f, "Invalid location specified: {tsb}"),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::block::{BlockHeader, CONTENT_SIZE};

    pub trait TestableStorage: Storage {
        fn new_for_test(geometry: Geometry) -> Self;
    }

    fn filled(byte: u8) -> Block {
        Block::new(BlockHeader::occupied(None), &[byte; CONTENT_SIZE])
    }

    pub fn geometry<S: TestableStorage>() {
        let geometry = Geometry::default();
        let storage = S::new_for_test(geometry);
        assert_eq!(storage.geometry(), geometry);
    }

    pub fn write_and_read<S: TestableStorage>() {
        let mut storage = S::new_for_test(Geometry::default());
        let write_block = filled(0xAB);

        storage.write_at(&write_block, Tsb::new(1, 2, 3)).unwrap();

        let mut read_block = Block::default();
        storage.read_at(&mut read_block, Tsb::new(1, 2, 3)).unwrap();

        assert_eq!(read_block, write_block);
    }

    pub fn no_interference<S: TestableStorage>() {
        let mut storage = S::new_for_test(Geometry::default());

        let write_block_0 = filled(0xAB);
        storage.write_at(&write_block_0, Tsb::new(0, 0, 1)).unwrap();

        let write_block_1 = filled(0xCD);
        storage.write_at(&write_block_1, Tsb::new(0, 1, 0)).unwrap();

        let mut read_block_0 = Block::default();
        storage.read_at(&mut read_block_0, Tsb::new(0, 0, 1)).unwrap();
        assert_eq!(read_block_0, write_block_0);

        let mut read_block_1 = Block::default();
        storage.read_at(&mut read_block_1, Tsb::new(0, 1, 0)).unwrap();
        assert_eq!(read_block_1, write_block_1);
    }

    pub fn out_of_bounds<S: TestableStorage>() {
        let geometry = Geometry::default();
        let mut storage = S::new_for_test(geometry);
        let mut block = filled(0xAB);

        for tsb in [
            Tsb::new(geometry.tracks, 0, 0),
            Tsb::new(0, geometry.sectors, 0),
            Tsb::new(0, 0, geometry.blocks),
        ] {
            assert_eq!(
                storage.read_at(&mut block, tsb),
                Err(Error::InvalidLocation(tsb))
            );
            assert_eq!(
                storage.write_at(&block, tsb),
                Err(Error::InvalidLocation(tsb))
            );
        }
    }

    pub fn overwrite<S: TestableStorage>() {
        let mut storage = S::new_for_test(Geometry::default());
        let tsb = Tsb::new(2, 0, 0);

        storage.write_at(&filled(0xAB), tsb).unwrap();

        let write_block_2 = filled(0xCD);
        storage.write_at(&write_block_2, tsb).unwrap();

        let mut read_block = Block::default();
        storage.read_at(&mut read_block, tsb).unwrap();

        assert_eq!(read_block, write_block_2);
    }
}

#[macro_export]
macro_rules! test_storage {
    ($storage:ty) => {
        #[test]
        fn geometry() {
            $crate::block::storage::tests::geometry::<$storage>();
        }

        #[test]
        fn write_and_read() {
            $crate::block::storage::tests::write_and_read::<$storage>();
        }

        #[test]
        fn no_interference() {
            $crate::block::storage::tests::no_interference::<$storage>();
        }

        #[test]
        fn out_of_bounds() {
            $crate::block::storage::tests::out_of_bounds::<$storage>();
        }

        #[test]
        fn overwrite() {
            $crate::block::storage::tests::overwrite::<$storage>();
        }
    };
}
