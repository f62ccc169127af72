//! This library implements the entries of a tree manifest: the list of files and subdirectories
//! of one directory snapshot, as stored by a content-addressed version control store.
//!
//! Manifests are parsed from blobs without copying, entries built by hand own a single private
//! copy of their record, and subdirectories are only fetched from the store when they are
//! walked into, through a [`ManifestFetcher`].

pub mod config;

pub mod cursor;

/// Provides [ManifestEntry], a single record of a manifest.
pub mod entry;

pub mod error;

pub mod fetcher;

pub mod manifest;

pub mod node;

/// An in memory [ManifestFetcher](fetcher::ManifestFetcher).
pub mod store;

pub use config::Config;
pub use cursor::ManifestCursor;
pub use entry::{EntryFlag, ManifestEntry};
pub use error::{ConfigError, EntryError, NodeError, ParseError, ResolveError, StoreError};
pub use fetcher::ManifestFetcher;
pub use manifest::Manifest;
pub use node::{Node, NodeEncoding};
pub use store::MemoryStore;

#[cfg(test)]
pub mod test_utils;
