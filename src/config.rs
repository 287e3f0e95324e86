use std::num::NonZeroU64;

use crate::{
    block::Geometry,
    proc::scheduler::{DEFAULT_QUANTUM, Policy},
};

/// Machine parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of words of main memory.
    pub memory_size: usize,
    /// Number of equal partitions main memory is split into.
    pub partition_count: usize,
    /// Shape of the disk.
    pub geometry: Geometry,
    pub policy: Policy,
    /// Cycles per time slice under round robin.
    pub quantum: NonZeroU64,
}

impl Config {
    pub fn partition_size(&self) -> usize {
        self.memory_size / self.partition_count
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_size: 768,
            partition_count: 3,
            geometry: Geometry::default(),
            policy: Policy::default(),
            quantum: NonZeroU64::new(DEFAULT_QUANTUM).expect("default quantum is non-zero"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.partition_size(), 256);
        assert_eq!(config.geometry.block_count(), 4 * 8 * 8);
        assert_eq!(config.policy, Policy::RoundRobin);
        assert_eq!(config.quantum.get(), 6);
    }
}
