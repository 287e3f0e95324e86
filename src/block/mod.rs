pub mod storage;

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Size of the header prefix of every block.
pub const HEADER_SIZE: usize = 4;

/// Size of the content that follows the header.
pub const CONTENT_SIZE: usize = BLOCK_SIZE - HEADER_SIZE;

/// An address of a block: track, sector and block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tsb {
    pub track: u8,
    pub sector: u8,
    pub block: u8,
}

impl Tsb {
    /// The location of the master block.
    pub const MASTER: Self = Self::new(0, 0, 0);

    pub const fn new(track: u8, sector: u8, block: u8) -> Self {
        Self {
            track,
            sector,
            block,
        }
    }
}

impl fmt::Display for Tsb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.track, self.sector, self.block)
    }
}

/// A stored address of a block.
#[repr(transparent)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
pub struct TsbStored([u8; 3]);

impl TsbStored {
    /// Marks the end of a chain. Never a valid chain target since it is the master block.
    pub const END: Self = Self([0, 0, 0]);

    /// Marks an exhausted allocation pointer.
    pub const FULL: Self = Self([0xFF, 0xFF, 0xFF]);

    pub fn get(&self) -> Tsb {
        let [track, sector, block] = self.0;
        Tsb::new(track, sector, block)
    }
}

impl From<Tsb> for TsbStored {
    fn from(tsb: Tsb) -> Self {
        Self([tsb.track, tsb.sector, tsb.block])
    }
}

/// Shape of a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub tracks: u8,
    pub sectors: u8,
    pub blocks: u8,
    /// Number of leading tracks reserved for directory entries.
    pub directory_tracks: u8,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            tracks: 4,
            sectors: 8,
            blocks: 8,
            directory_tracks: 1,
        }
    }
}

impl Geometry {
    /// Checks whether `tsb` lies on the device.
    pub fn contains(&self, tsb: Tsb) -> bool {
        tsb.track < self.tracks && tsb.sector < self.sectors && tsb.block < self.blocks
    }

    /// Returns the linear index of `tsb`, or `None` if it is off the device.
    pub fn index(&self, tsb: Tsb) -> Option<usize> {
        if !self.contains(tsb) {
            return None;
        }
        let sectors = usize::from(self.sectors);
        let blocks = usize::from(self.blocks);
        Some(
            (usize::from(tsb.track) * sectors + usize::from(tsb.sector)) * blocks
                + usize::from(tsb.block),
        )
    }

    /// Returns the number of blocks on the device.
    pub fn block_count(&self) -> usize {
        usize::from(self.tracks) * usize::from(self.sectors) * usize::from(self.blocks)
    }

    /// Iterates every location of the device in track, sector, block order.
    pub fn locations(&self) -> impl Iterator<Item = Tsb> + use<> {
        self.tracks_locations(0..self.tracks)
    }

    /// Iterates the locations reserved for directory entries, including the master block.
    pub fn directory_locations(&self) -> impl Iterator<Item = Tsb> + use<> {
        self.tracks_locations(0..self.directory_tracks.min(self.tracks))
    }

    /// Iterates the locations reserved for file content.
    pub fn file_locations(&self) -> impl Iterator<Item = Tsb> + use<> {
        self.tracks_locations(self.directory_tracks.min(self.tracks)..self.tracks)
    }

    /// Returns the number of blocks reserved for file content.
    pub fn file_block_count(&self) -> usize {
        let file_tracks = self.tracks - self.directory_tracks.min(self.tracks);
        usize::from(file_tracks) * usize::from(self.sectors) * usize::from(self.blocks)
    }

    fn tracks_locations(&self, tracks: std::ops::Range<u8>) -> impl Iterator<Item = Tsb> + use<> {
        let (sectors, blocks) = (self.sectors, self.blocks);
        tracks.flat_map(move |track| {
            (0..sectors).flat_map(move |sector| {
                (0..blocks).map(move |block| Tsb::new(track, sector, block))
            })
        })
    }
}

/// The fixed-width prefix of every block.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned)]
pub struct BlockHeader {
    pub flag: u8,
    pub next: TsbStored,
}

impl BlockHeader {
    const OCCUPIED: u8 = 1;

    /// A header of an occupied block pointing at `next`, or ending the chain.
    pub fn occupied(next: Option<Tsb>) -> Self {
        Self {
            flag: Self::OCCUPIED,
            next: next.map_or(TsbStored::END, TsbStored::from),
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.flag == Self::OCCUPIED
    }

    /// Returns the next block in the chain.
    pub fn next(&self) -> Option<Tsb> {
        if self.next == TsbStored::END {
            None
        } else {
            Some(self.next.get())
        }
    }
}

/// Fixed-sized byte sequence, split into a header and content.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout)]
pub struct Block {
    pub data: [u8; BLOCK_SIZE],
}

impl Block {
    /// Constructs a `Block` with given header and content.
    ///
    /// # Panics
    /// Panics if `content` is larger than `CONTENT_SIZE`.
    pub fn new(header: BlockHeader, content: &[u8]) -> Self {
        let mut block = Self::default();
        block.set_header(header);
        block.set_content(content);
        block
    }

    pub fn header(&self) -> BlockHeader {
        let (header, _) = BlockHeader::read_from_prefix(&self.data)
            .expect("'data' must be larger than 'BlockHeader'");
        header
    }

    pub fn set_header(&mut self, header: BlockHeader) {
        self.data[..HEADER_SIZE].copy_from_slice(header.as_bytes());
    }

    pub fn content(&self) -> &[u8] {
        &self.data[HEADER_SIZE..]
    }

    /// Replaces the content, filling the remainder with zeros.
    ///
    /// # Panics
    /// Panics if `content` is larger than `CONTENT_SIZE`.
    pub fn set_content(&mut self, content: &[u8]) {
        assert!(
            content.len() <= CONTENT_SIZE,
            "content of {} bytes does not fit into a block",
            content.len()
        );
        let dst = &mut self.data[HEADER_SIZE..];
        dst.fill(0);
        dst[..content.len()].copy_from_slice(content);
    }
}

impl Default for Block {
    fn default() -> Self {
        Self {
            data: [0u8; BLOCK_SIZE],
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("header", &self.header())
            .field("content", &trim_fill(self.content()))
            .finish()
    }
}

/// Strips trailing fill bytes.
pub fn trim_fill(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let tsb = Tsb::new(1, 2, 3);
        let block = Block::new(BlockHeader::occupied(Some(tsb)), b"abc");
        assert!(block.header().is_occupied());
        assert_eq!(block.header().next(), Some(tsb));
        assert_eq!(trim_fill(block.content()), b"abc");
    }

    #[test]
    fn end_of_chain() {
        let header = BlockHeader::occupied(None);
        assert_eq!(header.next(), None);
        assert!(!BlockHeader::default().is_occupied());
    }

    #[test]
    fn content_is_refilled() {
        let mut block = Block::new(BlockHeader::default(), b"a long piece of content");
        block.set_content(b"short");
        assert_eq!(trim_fill(block.content()), b"short");
    }

    #[test]
    #[should_panic]
    fn content_too_long() {
        Block::new(BlockHeader::default(), &[1; CONTENT_SIZE + 1]);
    }

    #[test]
    fn geometry_regions() {
        let geometry = Geometry::default();
        assert_eq!(geometry.block_count(), 256);
        assert_eq!(geometry.directory_locations().count(), 64);
        assert_eq!(geometry.file_locations().count(), geometry.file_block_count());
        assert_eq!(geometry.file_locations().next(), Some(Tsb::new(1, 0, 0)));
        assert_eq!(geometry.index(Tsb::new(3, 7, 7)), Some(255));
        assert_eq!(geometry.index(Tsb::new(4, 0, 0)), None);
        assert_eq!(geometry.index(Tsb::new(0, 8, 0)), None);
    }

    #[test]
    fn trim_fill_keeps_interior_zeros() {
        assert_eq!(trim_fill(&[1, 0, 2, 0, 0]), &[1, 0, 2]);
        assert_eq!(trim_fill(&[0, 0]), &[] as &[u8]);
    }
}
