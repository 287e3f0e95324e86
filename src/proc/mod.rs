use std::{collections::BTreeMap, fmt};

use crate::mem::{Bounds, Word};

pub mod scheduler;

/// A process identifier. Identifiers are never reused within one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u32);

impl Pid {
    pub const fn new(pid: u32) -> Self {
        Self(pid)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A snapshot of the CPU registers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// Offset of the next instruction, relative to the partition base.
    pub pc: usize,
    pub ir: Word,
    pub acc: Word,
    pub x: Word,
    pub y: Word,
    pub z: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Waiting,
    Terminated,
}

impl ProcessState {
    /// Checks whether the process can still be dispatched.
    pub fn is_live(&self) -> bool {
        *self != Self::Terminated
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "New",
            Self::Ready => "Ready",
            Self::Running => "Running",
            Self::Waiting => "Waiting",
            Self::Terminated => "Terminated",
        })
    }
}

/// A process control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcb {
    pub pid: Pid,
    pub registers: Registers,
    /// The partition held by the process, or `None` while its image is on disk.
    pub bounds: Option<Bounds>,
    pub state: ProcessState,
    /// Lower values are more urgent.
    pub priority: i32,
    /// Everything the process has printed.
    pub output: String,
}

impl Pcb {
    pub const DEFAULT_PRIORITY: i32 = 0;

    pub fn new(pid: Pid, priority: i32) -> Self {
        Self {
            pid,
            registers: Registers::default(),
            bounds: None,
            state: ProcessState::New,
            priority,
            output: String::new(),
        }
    }

    /// Checks whether the process holds a memory partition.
    pub fn in_memory(&self) -> bool {
        self.bounds.is_some()
    }

    /// Returns the name of the swap file holding the image of this process.
    pub fn swap_file(&self) -> String {
        swap_file(self.pid)
    }
}

/// Returns the name of the swap file holding the image of process `pid`.
pub fn swap_file(pid: Pid) -> String {
    format!("process-{pid}{}", crate::fs::dir::SWAP_EXTENSION)
}

/// Owns every process control block from load until the process is reaped.
#[derive(Debug, Default)]
pub struct ProcessTable {
    pcbs: BTreeMap<Pid, Pcb>,
    next_pid: u32,
}

impl ProcessTable {
    /// Creates a new process in the `New` state and returns its identifier.
    pub fn create(&mut self, priority: i32) -> Pid {
        let pid = Pid::new(self.next_pid);
        self.next_pid += 1;
        self.pcbs.insert(pid, Pcb::new(pid, priority));
        pid
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.pcbs.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.pcbs.get_mut(&pid)
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Pcb> {
        self.pcbs.remove(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.pcbs.contains_key(&pid)
    }

    /// Iterates every process in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.pcbs.values()
    }

    pub fn len(&self) -> usize {
        self.pcbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcbs.is_empty()
    }
}
