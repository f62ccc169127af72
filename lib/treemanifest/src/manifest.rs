//! The manifest of one directory.
//!
//! A manifest keeps its entries in manifest order: entries are sorted by name bytewise, except
//! that directories are compared as if their name ended with a `/`. A valid manifest never holds
//! two entries with the same name, be it a file and a directory.
//!
//! The subdirectories of a manifest are resolved lazily. Walking down a tree only fetches the
//! directories that are visited, and every directory is fetched at most once per entry.

use std::cmp::Ordering;
use std::fmt::Debug;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::config::Config;
use crate::cursor::ManifestCursor;
use crate::entry::{compare_keys, ManifestEntry, PATH_SEPARATOR};
use crate::error::{EntryError, ParseError, ResolveError};
use crate::fetcher::ManifestFetcher;

#[derive(Clone)]
pub struct Manifest {
    config: Config,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Create a new empty manifest.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    /// Build a manifest from a set of entries in any order. If two entries have the same name
    /// the last one wins.
    ///
    /// Fails on the first entry that [`Manifest::insert`] rejects.
    pub fn from_entries<I>(config: Config, entries: I) -> Result<Self, EntryError>
    where
        I: IntoIterator<Item = ManifestEntry>,
    {
        let mut manifest = Self::new(config);
        for entry in entries {
            manifest.insert(entry)?;
        }
        Ok(manifest)
    }

    /// Parse a manifest blob. The entries share the blob, nothing is copied.
    ///
    /// Returns an error if a record is malformed or if the records are not in manifest order.
    pub fn parse(blob: impl Into<Bytes>, config: Config) -> Result<Self, ParseError> {
        let mut cursor = ManifestCursor::new(blob);
        let mut entries: Vec<ManifestEntry> = Vec::new();

        while !cursor.is_empty() {
            let offset = cursor.position();
            let entry = ManifestEntry::parse(&mut cursor, &config)?;

            if let Some(prev) = entries.last() {
                if prev.cmp_manifest_order(&entry) != Ordering::Less {
                    return Err(ParseError::OutOfOrder { offset });
                }
            }

            // A file sharing the name of a directory always sorts before it, so it has already
            // been parsed if it exists.
            if entry.is_directory() && search(&entries, entry.filename(), false).is_ok() {
                return Err(ParseError::OutOfOrder { offset });
            }

            entries.push(entry);
        }

        debug!(
            entries = entries.len(),
            bytes = cursor.position(),
            "parsed manifest"
        );

        Ok(Self { config, entries })
    }

    /// Returns the format config of this manifest.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the number of entries in this manifest.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries in manifest order.
    #[inline]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }

    /// Returns the index of the entry with the given name.
    pub fn position(&self, name: &[u8]) -> Option<usize> {
        // The sort key of a directory ends with a separator, a name with one would alias it.
        if name.contains(&PATH_SEPARATOR) {
            return None;
        }
        search(&self.entries, name, false)
            .or_else(|_| search(&self.entries, name, true))
            .ok()
    }

    /// Find the entry with the provided name.
    pub fn find(&self, name: &[u8]) -> Option<&ManifestEntry> {
        self.position(name).map(|index| &self.entries[index])
    }

    /// Insert an entry in its place. If an entry with the same name exists it is replaced, even
    /// if one is a file and the other a directory, and the old entry is returned.
    ///
    /// The entry must have a record whose node is stored the way the config of this manifest
    /// says, otherwise the serialized manifest could not be parsed back.
    pub fn insert(&mut self, entry: ManifestEntry) -> Result<Option<ManifestEntry>, EntryError> {
        self.check_format(&entry)?;
        let replaced = self.remove(entry.filename());
        let index = match search(&self.entries, entry.filename(), entry.is_directory()) {
            Ok(index) | Err(index) => index,
        };
        self.entries.insert(index, entry);
        Ok(replaced)
    }

    fn check_format(&self, entry: &ManifestEntry) -> Result<(), EntryError> {
        if entry.is_empty() {
            return Err(EntryError::MissingRecord);
        }

        if entry.encoding() != self.config.node_encoding {
            return Err(EntryError::EncodingMismatch {
                expected: self.config.node_encoding,
                actual: entry.encoding(),
            });
        }

        let expected = self.config.node_width();
        if entry.node().len() != expected {
            return Err(EntryError::InvalidNodeLength {
                expected,
                actual: entry.node().len(),
            });
        }

        Ok(())
    }

    /// Remove the entry with the given name.
    pub fn remove(&mut self, name: &[u8]) -> Option<ManifestEntry> {
        self.position(name).map(|index| self.entries.remove(index))
    }

    /// Serialize this manifest into a blob that [`Manifest::parse`] accepts.
    pub fn serialize(&self) -> Bytes {
        let len = self.entries.iter().map(|e| e.record().len()).sum();
        let mut out = BytesMut::with_capacity(len);
        for entry in &self.entries {
            out.extend_from_slice(entry.record());
        }
        out.freeze()
    }

    /// Find the entry at the given `/` separated path relative to this manifest, fetching the
    /// directories on the way as needed. `root` is the path of this manifest itself, it is empty
    /// for the root of the tree and ends with a `/` otherwise.
    ///
    /// Returns `Ok(None)` if some component of the path does not exist or is not a directory.
    pub fn find_path<'m, F>(
        &'m self,
        fetcher: &F,
        root: &[u8],
        path: &[u8],
    ) -> Result<Option<&'m ManifestEntry>, ResolveError<F::Error>>
    where
        F: ManifestFetcher + ?Sized,
    {
        let mut current = self;
        let mut current_path = root.to_vec();
        let mut components = path
            .split(|b| *b == PATH_SEPARATOR)
            .filter(|c| !c.is_empty())
            .peekable();

        while let Some(name) = components.next() {
            let Some(entry) = current.find(name) else {
                return Ok(None);
            };

            if components.peek().is_none() {
                return Ok(Some(entry));
            }

            if !entry.is_directory() {
                return Ok(None);
            }

            entry.append_to_path(&mut current_path);
            current = entry.get_manifest(fetcher, &current_path)?;
        }

        Ok(None)
    }

    /// Visit every file under this manifest in manifest order, descending into subdirectories.
    /// The visitor is given the full path of each file, starting with `root`.
    pub fn walk_files<F, V>(
        &self,
        fetcher: &F,
        root: &[u8],
        mut visit: V,
    ) -> Result<(), ResolveError<F::Error>>
    where
        F: ManifestFetcher + ?Sized,
        V: FnMut(&[u8], &ManifestEntry),
    {
        let mut path = root.to_vec();
        self.walk_inner(fetcher, &mut path, &mut visit)
    }

    fn walk_inner<F, V>(
        &self,
        fetcher: &F,
        path: &mut Vec<u8>,
        visit: &mut V,
    ) -> Result<(), ResolveError<F::Error>>
    where
        F: ManifestFetcher + ?Sized,
        V: FnMut(&[u8], &ManifestEntry),
    {
        for entry in &self.entries {
            let len = path.len();
            entry.append_to_path(path);
            if entry.is_directory() {
                let child = entry.get_manifest(fetcher, path.as_slice())?;
                child.walk_inner(fetcher, path, visit)?;
            } else {
                visit(path.as_slice(), entry);
            }
            path.truncate(len);
        }
        Ok(())
    }
}

/// Binary search the sorted entries for the sort key of `name`.
fn search(entries: &[ManifestEntry], name: &[u8], is_dir: bool) -> Result<usize, usize> {
    entries.binary_search_by(|probe| {
        compare_keys(probe.filename(), probe.is_directory(), name, is_dir)
    })
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    #[inline(always)]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Manifest {}

impl Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}
