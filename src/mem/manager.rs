use bitvec::prelude::*;

use crate::{
    mem::{Bounds, Error, Memory, Result, Word},
    proc::Pcb,
};

/// Splits memory into equal partitions and hands them out to processes.
#[derive(Debug, Clone)]
pub struct MemoryManager {
    memory: Memory,
    partition_size: usize,
    /// One bit per partition, set while a process holds it.
    partitions: BitBox,
}

impl MemoryManager {
    /// Constructs a manager of `memory_size` words split into `partition_count` partitions.
    ///
    /// # Panics
    /// Panics if `partition_count` is zero or larger than `memory_size`.
    pub fn new(memory_size: usize, partition_count: usize) -> Self {
        assert!(
            partition_count != 0 && partition_count <= memory_size,
            "cannot split {memory_size} words into {partition_count} partitions"
        );
        Self {
            memory: Memory::new(memory_size),
            partition_size: memory_size / partition_count,
            partitions: bitbox![0; partition_count],
        }
    }

    /// Assigns the lowest free partition to `pcb`.
    /// Returns `None` if every partition is taken, in which case `pcb` is left untouched.
    pub fn allocate(&mut self, pcb: &mut Pcb) -> Option<Bounds> {
        if let Some(bounds) = pcb.bounds {
            return Some(bounds);
        }

        let index = self.partitions.first_zero()?;
        self.partitions.set(index, true);

        let base = index * self.partition_size;
        let bounds = Bounds {
            base,
            limit: base + self.partition_size - 1,
        };
        pcb.bounds = Some(bounds);

        log::debug!("Allocated partition {index} to process {}", pcb.pid);
        Some(bounds)
    }

    /// Zero-fills the partition held by `pcb`, then returns it to the free set.
    pub fn deallocate(&mut self, pcb: &mut Pcb) -> Result<()> {
        let bounds = pcb.bounds.ok_or(Error::NotResident)?;
        let index = bounds.base / self.partition_size;
        if !self.partitions.get(index).is_some_and(|bit| *bit) {
            return Err(Error::NotAllocated);
        }

        self.memory.slice_mut(bounds)?.fill(0);
        self.partitions.set(index, false);
        pcb.bounds = None;

        log::debug!("Released partition {index} of process {}", pcb.pid);
        Ok(())
    }

    /// Reads the word at `location`, relative to the partition of `pcb`,
    /// or absolute when no process is given.
    pub fn read(&self, location: usize, pcb: Option<&Pcb>) -> Result<Word> {
        let addr = self.bounds_of(pcb)?.translate(location)?;
        self.memory.read(addr)
    }

    /// Writes `word` at `location`, relative to the partition of `pcb`,
    /// or absolute when no process is given.
    pub fn write(&mut self, word: Word, location: usize, pcb: Option<&Pcb>) -> Result<()> {
        let addr = self.bounds_of(pcb)?.translate(location)?;
        self.memory.write(addr, word)
    }

    fn bounds_of(&self, pcb: Option<&Pcb>) -> Result<Bounds> {
        match pcb {
            Some(pcb) => pcb.bounds.ok_or(Error::NotResident),
            None => Ok(self.memory.bounds()),
        }
    }

    /// Copies a program image into the start of the partition of `pcb`.
    pub fn load(&mut self, pcb: &Pcb, image: &[Word]) -> Result<()> {
        let bounds = pcb.bounds.ok_or(Error::NotResident)?;
        if image.len() > bounds.len() {
            return Err(Error::ImageTooLarge(image.len()));
        }
        self.memory.slice_mut(bounds)?[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Returns the whole partition of `pcb`.
    pub fn image(&self, pcb: &Pcb) -> Result<&[Word]> {
        let bounds = pcb.bounds.ok_or(Error::NotResident)?;
        self.memory.slice(bounds)
    }

    /// Returns the number of free partitions.
    pub fn available(&self) -> usize {
        self.partitions.count_zeros()
    }

    /// Checks whether partition `index` is held by a process.
    pub fn is_allocated(&self, index: usize) -> bool {
        self.partitions.get(index).is_some_and(|bit| *bit)
    }

    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }
}
