use std::{fmt, ops::RangeInclusive};

pub mod manager;

pub use manager::MemoryManager;

/// One memory cell.
pub type Word = u8;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The access fell outside the permitted bounds.
    OutOfBounds(usize),
    /// The process holds no partition.
    NotResident,
    /// The partition was not allocated.
    NotAllocated,
    /// The program image does not fit into a partition.
    ImageTooLarge(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds(location) => write!(f, "Memory access out of bounds: {location}"),
            Self::NotResident => f.write_str("Process is not in memory"),
            Self::NotAllocated => f.write_str("Partition is not allocated"),
            Self::ImageTooLarge(len) => write!(f, "Program of {len} words does not fit in memory"),
        }
    }
}

/// An inclusive range of absolute memory addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub base: usize,
    pub limit: usize,
}

impl Bounds {
    pub fn len(&self) -> usize {
        self.limit - self.base + 1
    }

    /// Translates a location relative to `base` into an absolute address.
    pub fn translate(&self, location: usize) -> Result<usize> {
        self.base
            .checked_add(location)
            .filter(|&addr| addr <= self.limit)
            .ok_or(Error::OutOfBounds(location))
    }

    pub fn range(&self) -> RangeInclusive<usize> {
        self.base..=self.limit
    }
}

/// A flat array of words.
#[derive(Debug, Clone)]
pub struct Memory {
    words: Box<[Word]>,
}

impl Memory {
    /// Constructs zero-filled memory of `size` words.
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![0; size].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns bounds covering the whole memory.
    pub fn bounds(&self) -> Bounds {
        Bounds {
            base: 0,
            limit: self.words.len().saturating_sub(1),
        }
    }

    pub fn read(&self, addr: usize) -> Result<Word> {
        self.words.get(addr).copied().ok_or(Error::OutOfBounds(addr))
    }

    pub fn write(&mut self, addr: usize, word: Word) -> Result<()> {
        let cell = self.words.get_mut(addr).ok_or(Error::OutOfBounds(addr))?;
        *cell = word;
        Ok(())
    }

    pub fn slice(&self, bounds: Bounds) -> Result<&[Word]> {
        self.words
            .get(bounds.range())
            .ok_or(Error::OutOfBounds(bounds.limit))
    }

    pub fn slice_mut(&mut self, bounds: Bounds) -> Result<&mut [Word]> {
        self.words
            .get_mut(bounds.range())
            .ok_or(Error::OutOfBounds(bounds.limit))
    }

    pub fn as_slice(&self) -> &[Word] {
        &self.words
    }
}
