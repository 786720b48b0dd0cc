use std::fmt;

use crate::codec::hash::Hash256;
use crate::proto::ToRaw;

/// Block header, exactly 80 bytes on the wire.
#[derive(Clone, Copy)]
pub struct BlockHeader {
    pub version: u32,
    pub hash_prev_block: Hash256,
    pub hash_merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn new(
        version: u32,
        hash_prev_block: Hash256,
        hash_merkle_root: Hash256,
        time: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        BlockHeader {
            version,
            hash_prev_block,
            hash_merkle_root,
            time,
            bits,
            nonce,
        }
    }
}

impl ToRaw for BlockHeader {
    /// Serializes the header exactly as it appears on the wire: prev-hash and
    /// merkle-root go out byte-reversed relative to how they're held in memory.
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(80);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        let mut prev = self.hash_prev_block.0;
        prev.reverse();
        bytes.extend_from_slice(&prev);
        let mut merkle = self.hash_merkle_root.0;
        merkle.reverse();
        bytes.extend_from_slice(&merkle);
        bytes.extend_from_slice(&self.time.to_le_bytes());
        bytes.extend_from_slice(&self.bits.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }
}

impl fmt::Debug for BlockHeader {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("BlockHeader")
            .field("version", &self.version)
            .field("hash_prev_block", &self.hash_prev_block)
            .field("hash_merkle_root", &self.hash_merkle_root)
            .field("time", &self.time)
            .field("bits", &self.bits)
            .field("nonce", &self.nonce)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_serializes_to_80_bytes() {
        let header = BlockHeader::new(1, Hash256::ZERO, Hash256::ZERO, 0, 0, 0);
        assert_eq!(header.to_bytes().len(), 80);
    }
}
