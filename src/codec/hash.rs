use std::borrow::BorrowMut;
use std::fmt;
use std::io::{Read, Write};

use bitcoin_hashes::{sha256d, Hash as _};

use crate::common::utils;
use crate::errors::OpResult;

/// A 32 byte double-SHA256 hash, always held in display (big-endian, the
/// order conventionally printed to humans) byte order in memory. The wire
/// representation is always the reverse of this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Computes the double-SHA256 digest of `data` and returns it in display order.
    pub fn double_sha256(data: &[u8]) -> Hash256 {
        let digest = sha256d::Hash::hash(data);
        let mut bytes = *digest.as_byte_array();
        bytes.reverse();
        Hash256(bytes)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Hash256({})", utils::arr_to_hex(&self.0))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", utils::arr_to_hex(&self.0))
    }
}

/// Trait for structured reading of wire-order 32 byte hashes into the
/// in-memory display-order representation.
pub trait ReadHashExt: Read {
    /// Reads 32 bytes off the wire and stores them reversed, per spec.md §4.2.
    fn read_hash(&mut self) -> OpResult<Hash256> {
        let mut arr = [0u8; 32];
        self.read_exact(arr.borrow_mut())?;
        arr.reverse();
        Ok(Hash256(arr))
    }

    fn read_u8_vec(&mut self, count: u32) -> OpResult<Vec<u8>> {
        let mut buf = vec![0u8; count as usize];
        self.read_exact(buf.borrow_mut())?;
        Ok(buf)
    }
}

impl<R: Read + ?Sized> ReadHashExt for R {}

/// Trait for structured writing of an in-memory display-order hash back out
/// in wire (reversed) order.
pub trait WriteHashExt: Write {
    fn write_hash(&mut self, hash: &Hash256) -> OpResult<()> {
        let mut reversed = hash.0;
        reversed.reverse();
        self.write_all(&reversed)?;
        Ok(())
    }
}

impl<W: Write + ?Sized> WriteHashExt for W {}


impl PartialEq<[u8; 32]> for Hash256 {
    fn eq(&self, other: &[u8; 32]) -> bool {
        self.0 == *other
    }
}
