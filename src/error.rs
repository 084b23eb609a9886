//! Errors raised when rebuilding a dictionary from externally supplied logs.

use thiserror::Error;

/// Failures at the boundary where logs enter the crate from a transport or
/// storage layer. Local mutation and merge never fail.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An entry in the adds log carries a tombstone instead of a value.
    #[error("adds log entry carries a tombstone")]
    TombstoneInAdds,

    /// An entry in the removes log carries a value instead of a tombstone.
    #[error("removes log entry carries a value")]
    ValueInRemoves,
}

/// Result alias for fallible dictionary operations.
pub type Result<T> = core::result::Result<T, Error>;
