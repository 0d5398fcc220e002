//! # Trie Nodes
//!
//! The three non-empty node shapes of the Patricia trie, RLP-encoded and
//! hashed with Keccak-256. The node encoding is the sole input to the root,
//! so it must be canonical: same records, same root, on every node.

use crate::Nibbles;
use nhb_types::Hash;
use sha3::{Digest, Keccak256};

/// Keccak-256 hash of the empty RLP string: the root of an empty store.
pub const EMPTY_ROOT: Hash = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

/// Node types in the Patricia trie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// Empty node (null reference, hash = EMPTY_ROOT).
    Empty,

    /// Leaf node: remaining key path and the record bytes.
    /// RLP: [hex_prefix_encode(path, true), value]
    Leaf { path: Nibbles, value: Vec<u8> },

    /// Extension node: shared prefix optimization.
    /// RLP: [hex_prefix_encode(path, false), child_hash]
    Extension { path: Nibbles, child: Hash },

    /// Branch node: 16-way branch for each nibble value.
    /// RLP: [child[0], ..., child[15], value]
    Branch {
        children: Box<[Option<Hash>; 16]>,
        /// Optional value if a key terminates at this branch. With fixed
        /// 32-byte keys this only occurs at the root of degenerate tries.
        value: Option<Vec<u8>>,
    },
}

impl TrieNode {
    /// RLP-encode this node for hashing.
    pub fn rlp_encode(&self) -> Vec<u8> {
        match self {
            TrieNode::Empty => vec![0x80],

            TrieNode::Leaf { path, value } => {
                let encoded_path = path.encode_hex_prefix(true);
                rlp_encode_list_items(&[encoded_path, value.clone()])
            }

            TrieNode::Extension { path, child } => {
                let encoded_path = path.encode_hex_prefix(false);
                rlp_encode_list_items(&[encoded_path, child.to_vec()])
            }

            TrieNode::Branch { children, value } => {
                let mut items: Vec<Vec<u8>> = Vec::with_capacity(17);
                for child in children.iter() {
                    match child {
                        Some(hash) => items.push(hash.to_vec()),
                        None => items.push(Vec::new()),
                    }
                }
                items.push(value.clone().unwrap_or_default());
                rlp_encode_list_items(&items)
            }
        }
    }

    /// Keccak-256 hash of the RLP-encoded node.
    pub fn hash(&self) -> Hash {
        if matches!(self, TrieNode::Empty) {
            return EMPTY_ROOT;
        }
        keccak(&self.rlp_encode())
    }
}

fn keccak(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// RLP-encode a byte string.
fn rlp_encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() < 56 {
        let mut result = vec![0x80 + data.len() as u8];
        result.extend_from_slice(data);
        result
    } else {
        let len_bytes = encode_length(data.len());
        let mut result = vec![0xb7 + len_bytes.len() as u8];
        result.extend_from_slice(&len_bytes);
        result.extend_from_slice(data);
        result
    }
}

/// RLP-encode multiple byte strings as a list.
fn rlp_encode_list_items(items: &[Vec<u8>]) -> Vec<u8> {
    let encoded_items: Vec<Vec<u8>> = items.iter().map(|i| rlp_encode_bytes(i)).collect();
    let total_len: usize = encoded_items.iter().map(|e| e.len()).sum();

    let mut result = Vec::with_capacity(total_len + 9);
    if total_len < 56 {
        result.push(0xc0 + total_len as u8);
    } else {
        let len_bytes = encode_length(total_len);
        result.push(0xf7 + len_bytes.len() as u8);
        result.extend_from_slice(&len_bytes);
    }
    for encoded in encoded_items {
        result.extend(encoded);
    }
    result
}

/// Encode a length as minimal big-endian bytes.
fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[start..].to_vec()
}
