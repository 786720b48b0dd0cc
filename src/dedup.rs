use std::collections::HashMap;

use crate::codec::hash::Hash256;
use crate::errors::{OpError, OpErrorKind, OpResult};

/// Owns the previous-transaction-hash dedup table while compressing one file.
///
/// Indices are assigned in first-seen order starting at 0; the mapping is
/// private to a single `compress` invocation and is never persisted across
/// files.
#[derive(Default)]
pub struct CompressionContext {
    indices: HashMap<Hash256, u32>,
    order: Vec<Hash256>,
}

impl CompressionContext {
    pub fn new() -> Self {
        CompressionContext {
            indices: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Looks up `hash`, assigning it the next index if unseen.
    pub fn index_for(&mut self, hash: Hash256) -> u32 {
        if let Some(&index) = self.indices.get(&hash) {
            return index;
        }
        let index = self.order.len() as u32;
        self.indices.insert(hash, index);
        self.order.push(hash);
        index
    }

    /// Hashes in index order, ready to be written as the trailing table.
    pub fn ordered_hashes(&self) -> &[Hash256] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Owns the reverse (index -> hash) lookup while decompressing one file.
pub struct DecompressionContext {
    hashes: Vec<Hash256>,
}

impl DecompressionContext {
    pub fn new(hashes: Vec<Hash256>) -> Self {
        DecompressionContext { hashes }
    }

    pub fn resolve(&self, index: u32) -> OpResult<Hash256> {
        self.hashes.get(index as usize).copied().ok_or_else(|| {
            OpError::new(OpErrorKind::OutOfRange).join_msg(&format!(
                "dedup index {} out of range (table has {} entries)",
                index,
                self.hashes.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_hash_reuses_index() {
        let mut ctx = CompressionContext::new();
        let h = Hash256([7u8; 32]);
        assert_eq!(ctx.index_for(h), 0);
        assert_eq!(ctx.index_for(h), 0);
        let h2 = Hash256([9u8; 32]);
        assert_eq!(ctx.index_for(h2), 1);
        assert_eq!(ctx.ordered_hashes(), &[h, h2]);
    }

    #[test]
    fn test_decompression_context_resolves_and_rejects_out_of_range() {
        let h = Hash256([3u8; 32]);
        let ctx = DecompressionContext::new(vec![h]);
        assert_eq!(ctx.resolve(0).unwrap(), h);
        assert!(ctx.resolve(1).is_err());
    }
}
