use crate::manifest::Manifest;
use crate::node::Node;

/// The capability to load the manifest of a directory given its node and its path.
///
/// This is the only place where the crate reaches out to a store. An implementation may be
/// backed by a local cache, a remote server or both, and it is free to block. Stores that key
/// their manifests by node alone can simply ignore the path.
///
/// Any closure of type `Fn(&Node, &[u8]) -> Result<Manifest, E>` is a fetcher.
pub trait ManifestFetcher {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the manifest identified by `node`. `path` is the full path of the directory from the
    /// root of the tree, ending with a `/` unless it is the root itself.
    fn fetch(&self, node: &Node, path: &[u8]) -> Result<Manifest, Self::Error>;
}

impl<F, E> ManifestFetcher for F
where
    F: Fn(&Node, &[u8]) -> Result<Manifest, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    #[inline(always)]
    fn fetch(&self, node: &Node, path: &[u8]) -> Result<Manifest, Self::Error> {
        self(node, path)
    }
}
