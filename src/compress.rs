use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::hash::WriteHashExt;
use crate::dedup::CompressionContext;
use crate::errors::{OpError, OpErrorKind, OpResult};
use crate::parser::compressed::CompressedBlockWrite;
use crate::parser::raw::RawBlockRead;
use crate::proto::{MAGIC, MAGIC_BYTE_SWAPPED};

/// `(time, original_index, byte_offset)` recorded during the preprocess pass.
struct BlockRecord {
    time: u32,
    original_index: u32,
    byte_offset: u64,
}

const HEADER_PREFIX_LEN: u64 = 68; // version(4) + prev hash(32) + merkle root(32), up to `time`
const TIME_FIELD_LEN: u64 = 4;

/// Reads the leading 4 bytes of a potential block. Returns `None` at a clean
/// end-of-file (zero bytes read before any were consumed), propagates any
/// other I/O failure, and otherwise returns the magic value for the caller
/// to validate.
fn peek_magic<R: Read>(reader: &mut R) -> OpResult<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut read_total = 0;
    loop {
        match reader.read(&mut buf[read_total..]) {
            Ok(0) if read_total == 0 => return Ok(None),
            Ok(0) => {
                return Err(OpError::new(OpErrorKind::OutOfRange)
                    .join_msg("truncated block: file ended mid-magic"))
            }
            Ok(n) => {
                read_total += n;
                if read_total == 4 {
                    return Ok(Some(u32::from_le_bytes(buf)));
                }
            }
            Err(e) => return Err(OpError::from(e)),
        }
    }
}

/// Scans the block region once, recording `(time, original_index, offset)`
/// for every block without parsing its body.
fn preprocess<R: Read + Seek>(input: &mut R) -> OpResult<Vec<BlockRecord>> {
    let mut records = Vec::new();
    loop {
        let offset = input.stream_position()?;
        let magic = match peek_magic(input)? {
            None => break,
            Some(m) => m,
        };
        if magic != MAGIC {
            return Err(OpError::new(OpErrorKind::BadMagic {
                found: magic,
                is_byte_swapped: magic == MAGIC_BYTE_SWAPPED,
            }));
        }
        let size = input.read_u32::<LittleEndian>()?;
        input.seek(SeekFrom::Current(HEADER_PREFIX_LEN as i64))?;
        let time = input.read_u32::<LittleEndian>()?;

        let remaining = (size as i64) - (HEADER_PREFIX_LEN as i64) - (TIME_FIELD_LEN as i64);
        if remaining < 0 {
            return Err(OpError::new(OpErrorKind::OutOfRange)
                .join_msg("block size too small to contain a full header"));
        }
        input.seek(SeekFrom::Current(remaining))?;

        records.push(BlockRecord {
            time,
            original_index: records.len() as u32,
            byte_offset: offset,
        });
    }
    // Stable sort: ties keep their original relative order.
    records.sort_by_key(|r| r.time);
    Ok(records)
}

/// Compresses a canonical `.dat` byte stream into the compact container
/// format. `input` must support random access; `output` needs seek+tell for
/// the per-block size backpatch.
pub fn compress<R: Read + Seek, W: Write + Seek>(input: &mut R, output: &mut W) -> OpResult<()> {
    input.seek(SeekFrom::Start(0))?;
    let records = preprocess(input)?;
    info!(target: "compress", "Found {} blocks, writing compressed container ...", records.len());

    output.write_u32::<LittleEndian>(records.len() as u32)?;
    for record in &records {
        output.write_u32::<LittleEndian>(record.original_index)?;
    }

    let mut ctx = CompressionContext::new();
    for (i, record) in records.iter().enumerate() {
        input.seek(SeekFrom::Start(record.byte_offset))?;
        let block = input.read_block()?;
        output.write_compressed_block(&block, &mut ctx)?;

        if (i + 1) % 10_000 == 0 {
            debug!(target: "compress", "Compressed {}/{} blocks", i + 1, records.len());
        }
    }

    output.write_u32::<LittleEndian>(ctx.len() as u32)?;
    for hash in ctx.ordered_hashes() {
        output.write_hash(hash)?;
    }
    info!(target: "compress", "Wrote dedup table with {} entries", ctx.len());
    Ok(())
}
