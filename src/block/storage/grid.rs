use crate::block::{
    Block, Geometry, Tsb,
    storage::{Error, Result, Storage},
};

/// A zero-initialized grid of blocks held in memory for the lifetime of the machine.
#[derive(Clone)]
pub struct GridStorage {
    geometry: Geometry,
    blocks: Box<[Block]>,
}

impl GridStorage {
    /// Constructs a zero-initialized [GridStorage] of given geometry.
    pub fn new(geometry: Geometry) -> Self {
        let blocks = vec![Block::default(); geometry.block_count()].into_boxed_slice();
        Self { geometry, blocks }
    }
}

impl Default for GridStorage {
    fn default() -> Self {
        Self::new(Geometry::default())
    }
}

impl Storage for GridStorage {
    fn read_at(&self, block: &mut Block, tsb: Tsb) -> Result<()> {
        let idx = self.geometry.index(tsb).ok_or(Error::InvalidLocation(tsb))?;
        *block = self.blocks[idx];
        Ok(())
    }

    fn write_at(&mut self, block: &Block, tsb: Tsb) -> Result<()> {
        let idx = self.geometry.index(tsb).ok_or(Error::InvalidLocation(tsb))?;
        self.blocks[idx] = *block;
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }
}
