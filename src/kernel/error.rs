use std::fmt;

use crate::{fs, mem, proc::Pid};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The program text could not be turned into an image.
    InvalidProgram(String),
    ProcessNotFound(Pid),
    /// Only freshly loaded processes can be executed.
    ProcessNotNew(Pid),
    /// The process is on the CPU and cannot be swapped out.
    ProcessRunning(Pid),
    /// No partition is free and no process can be swapped out.
    InsufficientMemory,

    Memory(mem::Error),
    Storage(fs::Error),
}

impl From<mem::Error> for Error {
    fn from(err: mem::Error) -> Self {
        Self::Memory(err)
    }
}

impl From<fs::Error> for Error {
    fn from(err: fs::Error) -> Self {
        Self::Storage(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProgram(message) => f.write_str(message),
            Self::ProcessNotFound(pid) => write!(f, "Process does not exist: {pid}"),
            Self::ProcessNotNew(pid) => write!(f, "Process already executed: {pid}"),
            Self::ProcessRunning(pid) => write!(f, "Process is running: {pid}"),
            Self::InsufficientMemory => f.write_str("Insufficient memory"),
            Self::Memory(err) => err.fmt(f),
            Self::Storage(err) => err.fmt(f),
        }
    }
}

/// An irrecoverable condition that halts the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trap {
    pub irq: u8,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid Interrupt Request. irq={}", self.irq)
    }
}
