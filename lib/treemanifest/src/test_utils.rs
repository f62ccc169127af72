use thiserror::Error;

use crate::config::Config;
use crate::entry::{EntryFlag, ManifestEntry};
use crate::manifest::Manifest;
use crate::node::{Node, NodeEncoding};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("test store is unavailable")]
pub struct TestFetchError;

/// Install a tracing subscriber that writes through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn binary_config() -> Config {
    Config {
        node_encoding: NodeEncoding::Binary,
        ..Config::default()
    }
}

/// A 20-byte node with every byte set to `seed`.
pub fn node_id(seed: u8) -> Node {
    Node::from([seed; 20])
}

/// The hex form of [`node_id`].
pub fn hex_node(seed: u8) -> Vec<u8> {
    node_id(seed).to_stored(NodeEncoding::Hex).to_vec()
}

/// Serialize a single record by hand.
pub fn record(name: &[u8], node: &[u8], flag: EntryFlag) -> Vec<u8> {
    let mut out = name.to_vec();
    out.push(0);
    out.extend_from_slice(node);
    out.extend(flag.as_byte());
    out.push(b'\n');
    out
}

/// An owned entry with a hex node, using the default config.
pub fn entry(name: &[u8], seed: u8, flag: EntryFlag) -> ManifestEntry {
    ManifestEntry::new(name, &hex_node(seed), flag, &Config::default()).unwrap()
}

/// An owned entry with a binary node.
pub fn binary_entry(name: &[u8], seed: u8, flag: EntryFlag) -> ManifestEntry {
    ManifestEntry::with_node(name, &node_id(seed), flag, &binary_config()).unwrap()
}

pub fn single_file_manifest(config: &Config) -> Manifest {
    let file = ManifestEntry::with_node(b"file", &node_id(0xff), EntryFlag::Regular, config);
    Manifest::from_entries(*config, [file.unwrap()]).unwrap()
}
