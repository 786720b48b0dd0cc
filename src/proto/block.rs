use std::fmt;

use crate::codec::hash::Hash256;
use crate::codec::varint::VarInt;
use crate::proto::header::BlockHeader;
use crate::proto::tx::Transaction;
use crate::proto::{ToRaw, MAGIC};

/// A fully parsed block, ready for either canonical or compressed re-emission.
///
/// `hash` is the double-SHA256 of `header` only, computed once at parse time
/// -- it is never recomputed from `transactions`, since nothing here verifies
/// the merkle root.
#[derive(Clone)]
pub struct Block {
    pub size: u32,
    pub header: BlockHeader,
    pub hash: Hash256,
    pub transaction_count: VarInt,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        let hash = Hash256::double_sha256(&header.to_bytes());
        let body_len = Self::body_len(&header, &transactions);
        Block {
            size: body_len as u32,
            header,
            hash,
            transaction_count: VarInt::new(transactions.len() as u64),
            transactions,
        }
    }

    fn body_len(header: &BlockHeader, transactions: &[Transaction]) -> usize {
        let count = VarInt::new(transactions.len() as u64);
        let mut len = header.to_bytes().len() + count.encoded_len();
        for tx in transactions {
            len += tx.to_bytes().len();
        }
        len
    }

    /// Serializes just the header-onward body (everything after the
    /// leading magic+size framing), used both to recompute `size` and by
    /// compressed-container emission which does its own framing.
    pub fn to_body_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header.to_bytes();
        self.transaction_count
            .write_to(&mut bytes)
            .expect("write to Vec<u8> cannot fail");
        for tx in &self.transactions {
            bytes.extend_from_slice(&tx.to_bytes());
        }
        bytes
    }
}

impl ToRaw for Block {
    /// Full canonical on-disk layout: magic, size, body. `size` is derived
    /// from the body length rather than trusted from the struct field, so a
    /// `Block` built by hand (e.g. in a test) still serializes correctly.
    fn to_bytes(&self) -> Vec<u8> {
        let body = self.to_body_bytes();
        let mut bytes = Vec::with_capacity(8 + body.len());
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Block")
            .field("size", &self.size)
            .field("hash", &self.hash)
            .field("transaction_count", &self.transaction_count)
            .finish()
    }
}
