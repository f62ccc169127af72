//! Content identifiers of manifest entries.
//!
//! A node is stored in a manifest record either as raw bytes or as lowercase hex text, depending
//! on the convention of the store the manifest came from. [`Node`] is always the binary form,
//! that is what gets handed to a [`ManifestFetcher`](crate::ManifestFetcher).

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::NodeError;

/// A vec that can keep up to 32 bytes without allocating heap space, enough for every hash
/// function we expect a store to use.
pub type InlineVec = SmallVec<[u8; 32]>;

/// How a node is written inside a manifest record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEncoding {
    /// Two lowercase hex characters per byte.
    #[default]
    Hex,
    /// The raw hash bytes.
    Binary,
}

impl NodeEncoding {
    /// Returns the number of bytes a node of `hash_len` binary bytes takes in a record, or
    /// `None` if that does not fit in a `usize`.
    #[inline]
    pub const fn checked_stored_len(&self, hash_len: usize) -> Option<usize> {
        match self {
            NodeEncoding::Hex => hash_len.checked_mul(2),
            NodeEncoding::Binary => Some(hash_len),
        }
    }

    /// Returns the number of bytes a node of `hash_len` binary bytes takes in a record,
    /// saturating at `usize::MAX`.
    #[inline]
    pub const fn stored_len(&self, hash_len: usize) -> usize {
        match self.checked_stored_len(hash_len) {
            Some(len) => len,
            None => usize::MAX,
        }
    }
}

/// The binary content identifier of a file or a directory.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Node(InlineVec);

impl Node {
    /// Decode a node from its stored representation.
    pub fn from_stored(stored: &[u8], encoding: NodeEncoding) -> Result<Self, NodeError> {
        match encoding {
            NodeEncoding::Binary => Ok(Self(stored.into())),
            NodeEncoding::Hex => {
                let mut out = InlineVec::from_elem(0, stored.len() / 2);
                hex::decode_to_slice(stored, &mut out)?;
                Ok(Self(out))
            },
        }
    }

    /// Encode this node the way a record with the given encoding stores it.
    pub fn to_stored(&self, encoding: NodeEncoding) -> InlineVec {
        match encoding {
            NodeEncoding::Binary => self.0.clone(),
            NodeEncoding::Hex => InlineVec::from(hex::encode(&self.0).as_bytes()),
        }
    }

    /// Returns the binary bytes of this node.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for Node {
    #[inline(always)]
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl<const N: usize> From<[u8; N]> for Node {
    #[inline(always)]
    fn from(value: [u8; N]) -> Self {
        Self(value.as_slice().into())
    }
}

impl AsRef<[u8]> for Node {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl Debug for Node {
    #[inline(always)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({self})")
    }
}
