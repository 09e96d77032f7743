//! Merkle roots over audit hashes.
//!
//! Leaves and nodes are lowercase hex strings. A parent is the SHA-256 of the
//! UTF-8 concatenation of its children's hex, and the last node of an odd
//! level is paired with itself.

use sha2::{Digest, Sha256};

/// Seed hashed for the root of an empty tree.
pub const EMPTY_TREE: &[u8] = b"EMPTY_TREE";

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Computes the Merkle root of `leaves`.
///
/// # Examples
///
/// ```
/// use nullwipe::audit::merkle::{compute_merkle_root, sha256_hex};
///
/// let leaf = sha256_hex(b"entry");
/// assert_eq!(compute_merkle_root(&[leaf.clone()]), leaf);
/// assert_eq!(compute_merkle_root(&[]), sha256_hex(b"EMPTY_TREE"));
/// ```
#[must_use]
pub fn compute_merkle_root(leaves: &[String]) -> String {
    match leaves {
        [] => sha256_hex(EMPTY_TREE),
        [only] => only.clone(),
        _ => {
            let mut level: Vec<String> = leaves.to_vec();
            while level.len() > 1 {
                level = level
                    .chunks(2)
                    .map(|pair| {
                        let left = &pair[0];
                        let right = pair.get(1).unwrap_or(left);
                        sha256_hex(format!("{left}{right}").as_bytes())
                    })
                    .collect();
            }
            level.swap_remove(0)
        }
    }
}
