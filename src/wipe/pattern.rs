//! Overwrite patterns.
//!
//! Random passes use a keystream derived per block from a 32-byte seed, so
//! any block of the final pass can be regenerated for read-back
//! verification without storing it.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

/// Data written by one overwrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// All zero bytes.
    Zero,
    /// Pseudorandom bytes keyed by `seed`.
    Keystream {
        /// Per-pass seed.
        seed: [u8; 32],
    },
}

impl Pattern {
    /// A keystream pattern with a fresh random seed.
    #[must_use]
    pub fn random() -> Self {
        Self::Keystream {
            seed: rand::random(),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::Keystream { .. } => "random",
        }
    }

    /// Fills `buf` with the content of block `block_index`.
    ///
    /// A shorter buffer receives a prefix of the full block.
    pub fn fill(&self, block_index: u64, buf: &mut [u8]) {
        match self {
            Self::Zero => buf.fill(0),
            Self::Keystream { seed } => {
                let mut hasher = Sha256::new();
                hasher.update(seed);
                hasher.update(block_index.to_le_bytes());
                let mut key = [0u8; 32];
                key.copy_from_slice(&hasher.finalize());
                StdRng::from_seed(key).fill_bytes(buf);
            }
        }
    }

    /// Fills `buf` with the bytes expected at `offset`, for targets written
    /// in blocks of `block_size`.
    pub fn expected_at(&self, offset: u64, block_size: usize, buf: &mut [u8]) {
        if matches!(self, Self::Zero) {
            buf.fill(0);
            return;
        }
        let block_size = block_size as u64;
        let mut scratch = Vec::new();
        let mut done = 0usize;
        while done < buf.len() {
            let pos = offset + done as u64;
            let block_index = pos / block_size;
            let within = usize::try_from(pos % block_size).unwrap_or(0);
            let take = (buf.len() - done).min(usize::try_from(block_size).unwrap_or(usize::MAX) - within);
            scratch.resize(within + take, 0);
            self.fill(block_index, &mut scratch);
            buf[done..done + take].copy_from_slice(&scratch[within..within + take]);
            done += take;
        }
    }
}
