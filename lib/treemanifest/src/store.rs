use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::trace;

use crate::config::Config;
use crate::error::StoreError;
use crate::fetcher::ManifestFetcher;
use crate::manifest::Manifest;
use crate::node::Node;

#[derive(Hash, Eq, PartialEq)]
struct Key {
    node: Node,
    path: Vec<u8>,
}

/// A manifest store that keeps every blob in memory, keyed by node and path.
///
/// Fetched manifests share the stored blob, so fetching the same directory twice does not copy
/// anything either. Cloning the store gives another handle to the same blobs.
#[derive(Clone)]
pub struct MemoryStore {
    config: Config,
    inner: Arc<RwLock<HashMap<Key, Bytes>>>,
}

impl MemoryStore {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            inner: Default::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store a manifest blob. Any previous blob for the same node and path is replaced.
    pub fn insert(&self, node: Node, path: &[u8], blob: impl Into<Bytes>) {
        let key = Key {
            node,
            path: path.to_vec(),
        };
        self.inner.write().insert(key, blob.into());
    }

    /// Serialize and store the given manifest.
    pub fn insert_manifest(&self, node: Node, path: &[u8], manifest: &Manifest) {
        self.insert(node, path, manifest.serialize());
    }

    /// Returns true if a blob is stored for the node and path.
    pub fn contains(&self, node: &Node, path: &[u8]) -> bool {
        let key = Key {
            node: node.clone(),
            path: path.to_vec(),
        };
        self.inner.read().contains_key(&key)
    }

    /// Returns the number of stored blobs.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl ManifestFetcher for MemoryStore {
    type Error = StoreError;

    fn fetch(&self, node: &Node, path: &[u8]) -> Result<Manifest, Self::Error> {
        let key = Key {
            node: node.clone(),
            path: path.to_vec(),
        };
        let blob = self
            .inner
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                node: node.clone(),
                path: String::from_utf8_lossy(path).into_owned(),
            })?;

        trace!(%node, len = blob.len(), "found manifest blob");

        Manifest::parse(blob, self.config).map_err(|source| StoreError::Corrupt {
            node: node.clone(),
            source,
        })
    }
}
