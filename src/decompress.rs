use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::hash::ReadHashExt;
use crate::dedup::DecompressionContext;
use crate::errors::{OpError, OpErrorKind, OpResult};
use crate::parser::compressed::CompressedBlockRead;
use crate::parser::raw::RawBlockWrite;
use crate::proto::MAGIC_BYTE_SWAPPED;

/// One entry of the header-index permutation, extended with the byte offset
/// discovered while scanning the compressed blocks.
struct BlockRecord {
    original_index: u32,
    byte_offset: u64,
}

/// Reads the `count` + `original_index` header, scans forward over every
/// compressed block recording its offset without parsing its body, then
/// loads the trailing dedup hash table. Per the hash-table load ordering
/// note, the table is loaded here -- before any block is actually parsed --
/// so the second pass can resolve dedup indices inline.
fn preprocess_compressed<R: Read + Seek>(
    input: &mut R,
) -> OpResult<(Vec<BlockRecord>, DecompressionContext)> {
    let count = input.read_u32::<LittleEndian>()?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let original_index = input.read_u32::<LittleEndian>()?;
        records.push(BlockRecord {
            original_index,
            byte_offset: 0,
        });
    }

    for record in records.iter_mut() {
        record.byte_offset = input.stream_position()?;
        let magic = input.read_u32::<LittleEndian>()?;
        if magic != crate::proto::MAGIC {
            return Err(OpError::new(OpErrorKind::BadMagic {
                found: magic,
                is_byte_swapped: magic == MAGIC_BYTE_SWAPPED,
            }));
        }
        let size = input.read_u32::<LittleEndian>()?;
        input.seek(SeekFrom::Current(size as i64))?;
    }

    let n_hashes = input.read_u32::<LittleEndian>()?;
    let mut hashes = Vec::with_capacity(n_hashes as usize);
    for _ in 0..n_hashes {
        hashes.push(input.read_hash()?);
    }

    records.sort_by_key(|r| r.original_index);
    Ok((records, DecompressionContext::new(hashes)))
}

/// Decompresses a compact container back into a canonical `.dat` byte stream
/// equivalent to whatever was originally fed to `compress`.
pub fn decompress<R: Read + Seek, W: Write + Seek>(input: &mut R, output: &mut W) -> OpResult<()> {
    input.seek(SeekFrom::Start(0))?;
    let (records, ctx) = preprocess_compressed(input)?;
    info!(target: "decompress", "Restoring {} blocks in original order ...", records.len());

    for (i, record) in records.iter().enumerate() {
        input.seek(SeekFrom::Start(record.byte_offset))?;
        let block = input.read_compressed_block(&ctx)?;
        output.write_block(&block)?;

        if (i + 1) % 10_000 == 0 {
            debug!(target: "decompress", "Restored {}/{} blocks", i + 1, records.len());
        }
    }
    info!(target: "decompress", "Fin.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::hash::Hash256;
    use crate::compress::compress;
    use crate::proto::block::Block;
    use crate::proto::header::BlockHeader;
    use crate::proto::tx::{Input, Output, Transaction};
    use crate::proto::ToRaw;
    use std::io::Cursor;

    fn block_at_time(time: u32) -> Block {
        let header = BlockHeader::new(1, Hash256::ZERO, Hash256::ZERO, time, 0x1d00ffff, 0);
        let input = Input::new(Hash256::ZERO, 0xFFFF_FFFF, vec![], 0xFFFF_FFFF, vec![]);
        let output = Output::new(5_000_000_000, vec![0x51]);
        let tx = Transaction::new(1, false, vec![input], vec![output], 0);
        Block::new(header, vec![tx])
    }

    #[test]
    fn test_roundtrip_preserves_original_order() {
        let blocks: Vec<_> = [300u32, 100, 200].iter().map(|&t| block_at_time(t)).collect();
        let mut raw = Vec::new();
        for b in &blocks {
            raw.extend_from_slice(&b.to_bytes());
        }

        let mut compressed = Cursor::new(Vec::new());
        compress(&mut Cursor::new(raw.clone()), &mut compressed).unwrap();

        let mut restored = Cursor::new(Vec::new());
        decompress(&mut Cursor::new(compressed.into_inner()), &mut restored).unwrap();

        assert_eq!(restored.into_inner(), raw);
    }

    #[test]
    fn test_roundtrip_dedups_shared_prev_hash() {
        let shared = Hash256([0x11; 32]);
        let header = BlockHeader::new(1, Hash256::ZERO, Hash256::ZERO, 111, 0, 0);
        let input_a = Input::new(shared, 0, vec![], 0xFFFF_FFFF, vec![]);
        let tx_a = Transaction::new(1, false, vec![input_a], vec![Output::new(1, vec![])], 0);
        let block_a = Block::new(header, vec![tx_a]);

        let header_b = BlockHeader::new(1, Hash256::ZERO, Hash256::ZERO, 222, 0, 0);
        let input_b = Input::new(shared, 1, vec![], 0xFFFF_FFFF, vec![]);
        let tx_b = Transaction::new(1, false, vec![input_b], vec![Output::new(1, vec![])], 0);
        let block_b = Block::new(header_b, vec![tx_b]);

        let mut raw = block_a.to_bytes();
        raw.extend_from_slice(&block_b.to_bytes());

        let mut compressed = Cursor::new(Vec::new());
        compress(&mut Cursor::new(raw.clone()), &mut compressed).unwrap();

        let mut restored = Cursor::new(Vec::new());
        decompress(&mut Cursor::new(compressed.into_inner()), &mut restored).unwrap();
        assert_eq!(restored.into_inner(), raw);
    }
}
