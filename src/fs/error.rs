use std::fmt;

use crate::block::{Tsb, storage};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Storage(storage::Error),

    AlreadyExists,
    DoesNotExist,
    InsufficientSpace,
    InvalidData,

    Unformatted,
    CorruptChain(Tsb),
}

/// Response codes reported to callers of disk operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Success,
    AlreadyExists,
    DoesNotExist,
    InsufficientSpace,
    InvalidData,
}

impl Error {
    /// Returns the response code for errors that are reported back to the caller.
    /// Device-level errors have none and are raised as faults instead.
    pub fn response(&self) -> Option<Response> {
        match self {
            Self::AlreadyExists => Some(Response::AlreadyExists),
            Self::DoesNotExist => Some(Response::DoesNotExist),
            Self::InsufficientSpace => Some(Response::InsufficientSpace),
            Self::InvalidData => Some(Response::InvalidData),
            Self::Storage(_) | Self::Unformatted | Self::CorruptChain(_) => None,
        }
    }
}

impl Response {
    /// Maps an operation result onto its response code.
    pub fn of<T>(res: &Result<T>) -> Option<Self> {
        match res {
            Ok(_) => Some(Self::Success),
            Err(err) => err.response(),
        }
    }
}

impl From<storage::Error> for Error {
    fn from(err: storage::Error) -> Self {
        Self::Storage(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(err) => err.fmt(f),
            Self::AlreadyExists => f.write_str("File already exists"),
            Self::DoesNotExist => f.write_str("File does not exist"),
            Self::InsufficientSpace => f.write_str("Insufficient disk space"),
            Self::InvalidData => f.write_str("Invalid data"),
            Self::Unformatted => f.write_str("Disk is not formatted"),
            Self::CorruptChain(tsb) => write!(f, "Corrupt file chain at {tsb}"),
        }
    }
}
