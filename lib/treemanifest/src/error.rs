use std::collections::TryReserveError;

use thiserror::Error;

use crate::node::{Node, NodeEncoding};

/// A record in a manifest blob could not be read.
///
/// The offset is always the position in the blob where the failing record starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Record at offset {offset} has no filename terminator.")]
    MissingNameTerminator { offset: usize },
    #[error(
        "Record at offset {offset} is truncated. Expected a {expected}-byte node but only \
         {available} bytes are left."
    )]
    TruncatedNode {
        offset: usize,
        expected: usize,
        available: usize,
    },
    #[error("Record at offset {offset} has an unknown flag byte 0x{byte:02x}.")]
    UnknownFlag { offset: usize, byte: u8 },
    #[error("Record at offset {offset} is not terminated by a newline.")]
    MissingRecordTerminator { offset: usize },
    #[error("Record at offset {offset} violates the manifest ordering.")]
    OutOfOrder { offset: usize },
}

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("Could not allocate memory for the entry. {0}")]
    Allocation(#[from] TryReserveError),
    #[error("Expected a node of {expected} bytes, got {actual} bytes.")]
    InvalidNodeLength { expected: usize, actual: usize },
    #[error("Expected a node stored as {expected:?}, got {actual:?}.")]
    EncodingMismatch {
        expected: NodeEncoding,
        actual: NodeEncoding,
    },
    #[error("A default entry has no record.")]
    MissingRecord,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("The stored node is not valid hex. {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Failure to resolve a directory entry into its manifest. `E` is the error type of the
/// [`ManifestFetcher`](crate::ManifestFetcher) that was used.
#[derive(Error, Debug)]
pub enum ResolveError<E> {
    #[error("Entry '{name}' is not a directory.")]
    NotADirectory { name: String },
    #[error(transparent)]
    InvalidNode(#[from] NodeError),
    #[error("The fetcher could not provide the manifest. {0}")]
    Fetch(#[source] E),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error while reading the config file. {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config. {0}")]
    Toml(#[from] toml::de::Error),
    #[error("The hash length must be non-zero and its hex form must fit in memory.")]
    InvalidHashLength,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Manifest {node} at '{path}' was not found.")]
    NotFound { node: Node, path: String },
    #[error("Manifest {node} is corrupted. {source}")]
    Corrupt {
        node: Node,
        #[source]
        source: ParseError,
    },
}
