//! Provides the owned and borrowed layout of a manifest entry.
//!
//! An entry is a single record of a manifest:
//!
//! ```txt
//! <filename> 0x00 <node> [<flag>] 0x0a
//! ```
//!
//! Whether the entry was parsed from a blob or built from its parts, its memory is always one
//! block holding the record exactly as it is written on the wire. Parsed entries share that block
//! with the blob they come from, built entries own a private copy. This means serializing an entry
//! never has to reassemble anything.

use std::cmp::Ordering;
use std::fmt::Debug;

use bytes::Bytes;
use once_cell::sync::OnceCell;
use tracing::{debug, debug_span, trace, warn};

use crate::config::Config;
use crate::cursor::ManifestCursor;
use crate::error::{EntryError, NodeError, ParseError, ResolveError};
use crate::fetcher::ManifestFetcher;
use crate::manifest::Manifest;
use crate::node::{Node, NodeEncoding};

/// Terminates the filename of a record.
pub const NAME_TERMINATOR: u8 = 0x00;
/// Terminates a record.
pub const RECORD_TERMINATOR: u8 = b'\n';
/// Appended to the names of directories when building paths.
pub const PATH_SEPARATOR: u8 = b'/';

/// The type of a manifest entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EntryFlag {
    /// A plain file, written without a flag byte.
    #[default]
    Regular,
    /// An executable file: `x`.
    Executable,
    /// A symbolic link: `l`.
    Symlink,
    /// A directory, the entry's node identifies another manifest: `t`.
    Directory,
}

impl EntryFlag {
    /// Parse a flag byte. Returns `None` for anything that is not a known flag.
    #[inline]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'x' => Some(EntryFlag::Executable),
            b'l' => Some(EntryFlag::Symlink),
            b't' => Some(EntryFlag::Directory),
            _ => None,
        }
    }

    /// Returns the flag byte as written in a record, `None` for regular files.
    #[inline]
    pub const fn as_byte(&self) -> Option<u8> {
        match self {
            EntryFlag::Regular => None,
            EntryFlag::Executable => Some(b'x'),
            EntryFlag::Symlink => Some(b'l'),
            EntryFlag::Directory => Some(b't'),
        }
    }
}

/// Who owns the bytes of an entry.
#[derive(Clone)]
enum EntryMemory {
    /// A placeholder entry with no record.
    Empty,
    /// A view into the blob the entry was parsed from.
    Borrowed(Bytes),
    /// A private record built by [`ManifestEntry::new`].
    Owned(Box<[u8]>),
}

/// A single file or directory of a manifest.
#[derive(Clone)]
pub struct ManifestEntry {
    memory: EntryMemory,
    filename_len: usize,
    node_len: usize,
    encoding: NodeEncoding,
    flag: EntryFlag,
    /// The manifest of this directory, once it has been fetched.
    resolved: OnceCell<Box<Manifest>>,
}

impl Default for ManifestEntry {
    fn default() -> Self {
        Self {
            memory: EntryMemory::Empty,
            filename_len: 0,
            node_len: 0,
            encoding: NodeEncoding::default(),
            flag: EntryFlag::Regular,
            resolved: OnceCell::new(),
        }
    }
}

impl ManifestEntry {
    /// Build an entry that owns a copy of the provided filename and node. The node must be in
    /// its stored form, that is `config.node_width()` bytes.
    ///
    /// The filename is not validated, it is up to the caller to not pass a name containing a
    /// null byte, a newline or a path separator.
    pub fn new(
        filename: &[u8],
        node: &[u8],
        flag: EntryFlag,
        config: &Config,
    ) -> Result<Self, EntryError> {
        let expected = config.node_width();
        if node.len() != expected {
            return Err(EntryError::InvalidNodeLength {
                expected,
                actual: node.len(),
            });
        }
        Self::owned(filename, node, flag, config.node_encoding)
    }

    /// Build an owned entry from a binary node, encoding it as the config requires.
    pub fn with_node(
        filename: &[u8],
        node: &Node,
        flag: EntryFlag,
        config: &Config,
    ) -> Result<Self, EntryError> {
        let stored = node.to_stored(config.node_encoding);
        Self::new(filename, &stored, flag, config)
    }

    fn owned(
        filename: &[u8],
        node: &[u8],
        flag: EntryFlag,
        encoding: NodeEncoding,
    ) -> Result<Self, EntryError> {
        let flag_byte = flag.as_byte();
        let len = filename.len() + 1 + node.len() + usize::from(flag_byte.is_some()) + 1;

        let mut block = Vec::new();
        block.try_reserve_exact(len)?;
        block.extend_from_slice(filename);
        block.push(NAME_TERMINATOR);
        block.extend_from_slice(node);
        block.extend(flag_byte);
        block.push(RECORD_TERMINATOR);
        debug_assert_eq!(block.len(), len);

        Ok(Self {
            memory: EntryMemory::Owned(block.into_boxed_slice()),
            filename_len: filename.len(),
            node_len: node.len(),
            encoding,
            flag,
            resolved: OnceCell::new(),
        })
    }

    /// Parse the record starting at the cursor and move the cursor to the start of the next
    /// record. The returned entry shares the blob of the cursor.
    ///
    /// On error the cursor is not moved.
    pub fn parse(cursor: &mut ManifestCursor, config: &Config) -> Result<Self, ParseError> {
        let offset = cursor.position();

        let filename_len = cursor
            .find(NAME_TERMINATOR)
            .ok_or(ParseError::MissingNameTerminator { offset })?;

        let node_start = filename_len + 1;
        let node_len = config.node_width();
        let available = cursor.remaining().len() - node_start;
        if available < node_len {
            return Err(ParseError::TruncatedNode {
                offset,
                expected: node_len,
                available,
            });
        }

        let mut len = node_start + node_len;
        let flag = match cursor.peek(len) {
            Some(RECORD_TERMINATOR) => EntryFlag::Regular,
            Some(byte) => {
                let flag =
                    EntryFlag::from_byte(byte).ok_or(ParseError::UnknownFlag { offset, byte })?;
                len += 1;
                flag
            },
            None => return Err(ParseError::MissingRecordTerminator { offset }),
        };

        if cursor.peek(len) != Some(RECORD_TERMINATOR) {
            return Err(ParseError::MissingRecordTerminator { offset });
        }
        len += 1;

        let record = cursor.split_record(len);
        trace!(offset, len, ?flag, "parsed manifest record");

        Ok(Self {
            memory: EntryMemory::Borrowed(record),
            filename_len,
            node_len,
            encoding: config.node_encoding,
            flag,
            resolved: OnceCell::new(),
        })
    }

    /// Returns the raw record of this entry, including the record terminator. Empty for a
    /// default entry.
    #[inline]
    pub fn record(&self) -> &[u8] {
        match &self.memory {
            EntryMemory::Empty => &[],
            EntryMemory::Borrowed(bytes) => &bytes[..],
            EntryMemory::Owned(block) => &block[..],
        }
    }

    #[inline]
    pub fn filename(&self) -> &[u8] {
        &self.record()[..self.filename_len]
    }

    #[inline]
    pub fn filename_len(&self) -> usize {
        self.filename_len
    }

    /// Returns the node exactly as it is stored in the record.
    #[inline]
    pub fn node(&self) -> &[u8] {
        let start = self.filename_len + 1;
        self.record()
            .get(start..start + self.node_len)
            .unwrap_or_default()
    }

    /// Returns how the node of this entry is stored.
    #[inline]
    pub fn encoding(&self) -> NodeEncoding {
        self.encoding
    }

    /// Decode the stored node into its binary form.
    pub fn node_id(&self) -> Result<Node, NodeError> {
        Node::from_stored(self.node(), self.encoding)
    }

    #[inline]
    pub fn flag(&self) -> EntryFlag {
        self.flag
    }

    /// Returns true if this entry is a directory.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.flag == EntryFlag::Directory
    }

    /// Returns true if this entry owns its memory rather than sharing a manifest blob.
    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self.memory, EntryMemory::Owned(_))
    }

    /// Returns true if this is a default entry with no record.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.memory, EntryMemory::Empty)
    }

    /// Returns the manifest of this directory if it has already been fetched.
    #[inline]
    pub fn resolved(&self) -> Option<&Manifest> {
        self.resolved.get().map(|m| m.as_ref())
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Copy this entry into an owned one that no longer shares the blob it was parsed from.
    /// The resolved manifest, if any, is not carried over.
    pub fn to_owned_entry(&self) -> Result<Self, EntryError> {
        Self::owned(self.filename(), self.node(), self.flag, self.encoding)
    }

    /// Append the filename of this entry to the given path, followed by a `/` if this entry is
    /// a directory.
    pub fn append_to_path(&self, path: &mut Vec<u8>) {
        path.extend_from_slice(self.filename());
        if self.is_directory() {
            path.push(PATH_SEPARATOR);
        }
    }

    /// Returns the manifest of this directory, fetching it on the first call. The `path` is the
    /// full path of this directory from the root of the tree.
    ///
    /// A failed fetch is not cached, the next call will try the fetcher again. When several
    /// threads call this at the same time only one of them runs the fetcher, the others wait for
    /// its result.
    pub fn get_manifest<F>(
        &self,
        fetcher: &F,
        path: &[u8],
    ) -> Result<&Manifest, ResolveError<F::Error>>
    where
        F: ManifestFetcher + ?Sized,
    {
        if !self.is_directory() {
            return Err(ResolveError::NotADirectory {
                name: String::from_utf8_lossy(self.filename()).into_owned(),
            });
        }

        if let Some(manifest) = self.resolved.get() {
            trace!("manifest cache hit");
            return Ok(manifest.as_ref());
        }

        let span = debug_span!("get_manifest", path = %String::from_utf8_lossy(path));
        let _enter = span.enter();

        let manifest = self.resolved.get_or_try_init(|| {
            let node = self.node_id()?;
            match fetcher.fetch(&node, path) {
                Ok(manifest) => {
                    debug!(%node, entries = manifest.len(), "fetched manifest");
                    Ok(Box::new(manifest))
                },
                Err(e) => {
                    warn!(%node, "failed to fetch manifest: {e}");
                    Err(ResolveError::Fetch(e))
                },
            }
        })?;

        Ok(manifest.as_ref())
    }

    /// Compare two entries in manifest order, which sorts directories as if their name ended
    /// with a `/`.
    #[inline]
    pub fn cmp_manifest_order(&self, other: &Self) -> Ordering {
        compare_keys(
            self.filename(),
            self.is_directory(),
            other.filename(),
            other.is_directory(),
        )
    }
}

/// Compare the sort keys of two names.
pub(crate) fn compare_keys(a: &[u8], a_is_dir: bool, b: &[u8], b_is_dir: bool) -> Ordering {
    let a = a.iter().chain(a_is_dir.then_some(&PATH_SEPARATOR));
    let b = b.iter().chain(b_is_dir.then_some(&PATH_SEPARATOR));
    a.cmp(b)
}

impl PartialEq for ManifestEntry {
    /// Entries are equal if their records are, regardless of who owns the memory and whether they
    /// have been resolved.
    fn eq(&self, other: &Self) -> bool {
        self.filename() == other.filename()
            && self.node() == other.node()
            && self.flag == other.flag
    }
}

impl Eq for ManifestEntry {}

impl Debug for ManifestEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = match self.encoding {
            NodeEncoding::Hex => String::from_utf8_lossy(self.node()).into_owned(),
            NodeEncoding::Binary => hex::encode(self.node()),
        };
        f.debug_struct("ManifestEntry")
            .field("filename", &String::from_utf8_lossy(self.filename()))
            .field("node", &node)
            .field("flag", &self.flag)
            .field("owned", &self.is_owned())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::convert::Infallible;

    use super::*;
    use crate::test_utils::*;

    const ALL_FLAGS: [EntryFlag; 4] = [
        EntryFlag::Regular,
        EntryFlag::Executable,
        EntryFlag::Symlink,
        EntryFlag::Directory,
    ];

    #[test]
    fn default_entry_is_empty() {
        let entry = ManifestEntry::default();
        assert!(entry.is_empty());
        assert!(!entry.is_owned());
        assert!(!entry.is_directory());
        assert_eq!(entry.filename(), b"");
        assert_eq!(entry.filename_len(), 0);
        assert_eq!(entry.node(), b"");
        assert_eq!(entry.record(), b"");
        assert_eq!(entry.flag(), EntryFlag::Regular);
    }

    #[test]
    fn flag_bytes() {
        for flag in ALL_FLAGS {
            match flag.as_byte() {
                Some(byte) => assert_eq!(EntryFlag::from_byte(byte), Some(flag)),
                None => assert_eq!(flag, EntryFlag::Regular),
            }
        }
        assert_eq!(EntryFlag::from_byte(b'\n'), None);
        assert_eq!(EntryFlag::from_byte(b'z'), None);
    }

    #[test]
    fn is_directory_only_for_tree_flag() {
        let config = Config::default();
        for flag in ALL_FLAGS {
            let entry = ManifestEntry::new(b"name", &hex_node(1), flag, &config).unwrap();
            assert_eq!(entry.is_directory(), flag == EntryFlag::Directory);
        }
    }

    #[test]
    fn parse_round_trip() {
        let config = Config::default();
        for flag in ALL_FLAGS {
            let node = hex_node(7);
            let mut blob = record(b"some-file.rs", &node, flag);
            let record_len = blob.len();
            // The next record must not be consumed.
            blob.extend_from_slice(&record(b"zzz", &hex_node(8), EntryFlag::Regular));

            let mut cursor = ManifestCursor::new(blob);
            let entry = ManifestEntry::parse(&mut cursor, &config).unwrap();

            assert_eq!(entry.filename(), b"some-file.rs");
            assert_eq!(entry.filename_len(), 12);
            assert_eq!(entry.node(), node.as_slice());
            assert_eq!(entry.flag(), flag);
            assert!(!entry.is_owned());

            let flag_len = usize::from(flag.as_byte().is_some());
            assert_eq!(cursor.position(), 12 + 1 + 40 + flag_len + 1);
            assert_eq!(cursor.position(), record_len);
            assert_eq!(entry.record().len(), record_len);
        }
    }

    #[test]
    fn parse_binary_nodes() {
        let config = binary_config();
        // A binary node may contain the terminator bytes.
        let node: Vec<u8> = (0..20).map(|i| if i % 2 == 0 { 0 } else { b'\n' }).collect();
        let blob = record(b"bin", &node, EntryFlag::Executable);
        let mut cursor = ManifestCursor::new(blob);
        let entry = ManifestEntry::parse(&mut cursor, &config).unwrap();
        assert_eq!(entry.node(), node.as_slice());
        assert_eq!(entry.node_id().unwrap().as_bytes(), node.as_slice());
        assert_eq!(entry.flag(), EntryFlag::Executable);
        assert!(cursor.is_empty());
    }

    #[test]
    fn parsed_entries_share_the_blob() {
        let config = Config::default();
        let blob = Bytes::from(record(b"a", &hex_node(1), EntryFlag::Regular));
        let mut cursor = ManifestCursor::new(blob.clone());
        let entry = ManifestEntry::parse(&mut cursor, &config).unwrap();
        assert_eq!(entry.filename().as_ptr(), blob.as_ptr());
        drop(cursor);
        drop(blob);
        // The entry keeps the blob alive.
        assert_eq!(entry.filename(), b"a");
    }

    #[test]
    fn missing_name_terminator() {
        let config = Config::default();
        let mut cursor = ManifestCursor::new(&b"no-terminator-here"[..]);
        assert_eq!(
            ManifestEntry::parse(&mut cursor, &config),
            Err(ParseError::MissingNameTerminator { offset: 0 })
        );
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn truncated_node() {
        let config = Config::default();
        let mut blob = b"file\0".to_vec();
        blob.extend_from_slice(&hex_node(3)[..39]);
        let mut cursor = ManifestCursor::new(blob);
        assert_eq!(
            ManifestEntry::parse(&mut cursor, &config),
            Err(ParseError::TruncatedNode {
                offset: 0,
                expected: 40,
                available: 39
            })
        );
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn missing_record_terminator() {
        let config = Config::default();
        let mut blob = b"file\0".to_vec();
        blob.extend_from_slice(&hex_node(3));
        let mut cursor = ManifestCursor::new(blob.clone());
        assert_eq!(
            ManifestEntry::parse(&mut cursor, &config),
            Err(ParseError::MissingRecordTerminator { offset: 0 })
        );

        blob.push(b'x');
        let mut cursor = ManifestCursor::new(blob.clone());
        assert_eq!(
            ManifestEntry::parse(&mut cursor, &config),
            Err(ParseError::MissingRecordTerminator { offset: 0 })
        );

        blob.push(b'x');
        let mut cursor = ManifestCursor::new(blob);
        assert_eq!(
            ManifestEntry::parse(&mut cursor, &config),
            Err(ParseError::MissingRecordTerminator { offset: 0 })
        );
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn unknown_flag() {
        let config = Config::default();
        let mut blob = b"file\0".to_vec();
        blob.extend_from_slice(&hex_node(3));
        blob.extend_from_slice(b"q\n");
        let mut cursor = ManifestCursor::new(blob);
        assert_eq!(
            ManifestEntry::parse(&mut cursor, &config),
            Err(ParseError::UnknownFlag {
                offset: 0,
                byte: b'q'
            })
        );
    }

    #[test]
    fn error_offset_is_record_start() {
        let config = Config::default();
        let mut blob = record(b"a", &hex_node(1), EntryFlag::Regular);
        let first_len = blob.len();
        blob.extend_from_slice(b"b\0short");
        let mut cursor = ManifestCursor::new(blob);
        ManifestEntry::parse(&mut cursor, &config).unwrap();
        assert!(matches!(
            ManifestEntry::parse(&mut cursor, &config),
            Err(ParseError::TruncatedNode { offset, .. }) if offset == first_len
        ));
        assert_eq!(cursor.position(), first_len);
    }

    #[test]
    fn owned_entry_is_a_copy() {
        let config = Config::default();
        let mut name = b"owned".to_vec();
        let mut node = hex_node(9);
        let entry = ManifestEntry::new(&name, &node, EntryFlag::Symlink, &config).unwrap();

        name.iter_mut().for_each(|b| *b = b'?');
        node.iter_mut().for_each(|b| *b = b'0');
        drop(name);
        drop(node);

        assert!(entry.is_owned());
        assert_eq!(entry.filename(), b"owned");
        assert_eq!(entry.node(), hex_node(9).as_slice());
        assert_eq!(entry.flag(), EntryFlag::Symlink);
        assert_eq!(
            entry.record(),
            record(b"owned", &hex_node(9), EntryFlag::Symlink).as_slice()
        );
    }

    #[test]
    fn owned_entry_rejects_wrong_node_width() {
        let config = Config::default();
        assert!(matches!(
            ManifestEntry::new(b"f", b"abc", EntryFlag::Regular, &config),
            Err(EntryError::InvalidNodeLength {
                expected: 40,
                actual: 3
            })
        ));
    }

    #[test]
    fn with_node_encodes() {
        let config = Config::default();
        let node = Node::from([0xabu8; 20]);
        let entry = ManifestEntry::with_node(b"f", &node, EntryFlag::Regular, &config).unwrap();
        assert_eq!(entry.node(), "ab".repeat(20).as_bytes());
        assert_eq!(entry.node_id().unwrap(), node);
    }

    #[test]
    fn owned_and_parsed_entries_are_equal() {
        let config = Config::default();
        let owned = entry(b"d", 2, EntryFlag::Directory);
        let mut cursor = ManifestCursor::new(owned.record().to_vec());
        let parsed = ManifestEntry::parse(&mut cursor, &config).unwrap();
        assert_eq!(owned, parsed);
        let detached = parsed.to_owned_entry().unwrap();
        assert!(detached.is_owned());
        assert_eq!(detached, parsed);
    }

    #[test]
    fn append_to_path() {
        let dir = entry(b"b", 1, EntryFlag::Directory);
        let file = entry(b"c", 2, EntryFlag::Regular);

        let mut path = b"a/".to_vec();
        dir.append_to_path(&mut path);
        assert_eq!(path, b"a/b/");

        let mut path = b"a/".to_vec();
        file.append_to_path(&mut path);
        assert_eq!(path, b"a/c");
    }

    #[test]
    fn manifest_order_puts_directories_after_dotted_names() {
        let dir = entry(b"a", 1, EntryFlag::Directory);
        let file = entry(b"a.txt", 2, EntryFlag::Regular);
        let plain = entry(b"a", 3, EntryFlag::Regular);
        assert_eq!(file.cmp_manifest_order(&dir), Ordering::Less);
        assert_eq!(plain.cmp_manifest_order(&file), Ordering::Less);
        assert_eq!(plain.cmp_manifest_order(&dir), Ordering::Less);
    }

    #[test]
    fn get_manifest_is_memoized() {
        let config = Config::default();
        let entry = entry(b"dir", 5, EntryFlag::Directory);
        let calls = Cell::new(0);
        let expected = Node::from_stored(&hex_node(5), NodeEncoding::Hex).unwrap();
        let fetcher = |node: &Node, path: &[u8]| -> Result<Manifest, Infallible> {
            calls.set(calls.get() + 1);
            assert_eq!(node, &expected);
            assert_eq!(path, b"root/dir/");
            Ok(single_file_manifest(&config))
        };

        assert!(!entry.is_resolved());
        let first = entry.get_manifest(&fetcher, b"root/dir/").unwrap();
        let second = entry.get_manifest(&fetcher, b"root/dir/").unwrap();
        assert_eq!(calls.get(), 1);
        assert!(std::ptr::eq(first, second));
        assert!(entry.is_resolved());
        assert!(std::ptr::eq(entry.resolved().unwrap(), first));
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn failed_fetch_is_not_cached() {
        let config = Config::default();
        let entry = entry(b"dir", 5, EntryFlag::Directory);

        let failing = |_: &Node, _: &[u8]| -> Result<Manifest, TestFetchError> {
            Err(TestFetchError)
        };
        assert!(matches!(
            entry.get_manifest(&failing, b"dir/"),
            Err(ResolveError::Fetch(TestFetchError))
        ));
        assert!(!entry.is_resolved());

        let calls = Cell::new(0);
        let working = |_: &Node, _: &[u8]| -> Result<Manifest, TestFetchError> {
            calls.set(calls.get() + 1);
            Ok(single_file_manifest(&config))
        };
        let first = entry.get_manifest(&working, b"dir/").unwrap();
        let second = entry.get_manifest(&working, b"dir/").unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn get_manifest_on_a_file_is_misuse() {
        let config = Config::default();
        let entry = entry(b"file", 5, EntryFlag::Executable);
        let calls = Cell::new(0);
        let fetcher = |_: &Node, _: &[u8]| -> Result<Manifest, Infallible> {
            calls.set(calls.get() + 1);
            Ok(Manifest::new(config))
        };
        match entry.get_manifest(&fetcher, b"file") {
            Err(ResolveError::NotADirectory { name }) => assert_eq!(name, "file"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.get(), 0);
        assert!(!entry.is_resolved());
    }

    #[test]
    fn invalid_stored_node_is_reported() {
        let config = Config::default();
        let node = [b'g'; 40];
        let entry = ManifestEntry::new(b"dir", &node, EntryFlag::Directory, &config).unwrap();
        let fetcher = |_: &Node, _: &[u8]| -> Result<Manifest, Infallible> {
            Ok(Manifest::new(config))
        };
        assert!(matches!(
            entry.get_manifest(&fetcher, b"dir/"),
            Err(ResolveError::InvalidNode(_))
        ));
        assert!(!entry.is_resolved());
    }
}
