use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::hash::{Hash256, ReadHashExt, WriteHashExt};
use crate::codec::varint::VarInt;
use crate::dedup::{CompressionContext, DecompressionContext};
use crate::errors::{OpError, OpErrorKind, OpResult};
use crate::proto::block::Block;
use crate::proto::header::BlockHeader;
use crate::proto::tx::{Input, Output, Transaction, Witness};
use crate::proto::{ToRaw, MAGIC, MAGIC_BYTE_SWAPPED};

const VERSION_2: u8 = 0x01;
const FLAG_PRESENT: u8 = 0x02;
const LOCK_TIME_DEFAULT: u8 = 0x04;
const SEQUENCE_NUMBERS_DEFAULT: u8 = 0x08;
const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

/// Trait for writing the entity model out in the compressed container's
/// per-block layout, deduplicating previous-transaction hashes through a
/// shared `CompressionContext` as it goes.
pub trait CompressedBlockWrite: Write + Seek {
    fn write_compressed_block(&mut self, block: &Block, ctx: &mut CompressionContext) -> OpResult<()> {
        self.write_u32::<LittleEndian>(MAGIC)?;
        let size_slot = self.stream_position()?;
        self.write_u32::<LittleEndian>(0)?; // placeholder, backpatched below

        let body_start = self.stream_position()?;
        self.write_all(&block.header.to_bytes())?;
        VarInt::new(block.transactions.len() as u64).write_to(self)?;
        for tx in &block.transactions {
            self.write_compressed_transaction(tx, ctx)?;
        }
        let body_end = self.stream_position()?;

        self.seek(SeekFrom::Start(size_slot))?;
        self.write_u32::<LittleEndian>((body_end - body_start) as u32)?;
        self.seek(SeekFrom::Start(body_end))?;
        Ok(())
    }

    fn write_compressed_transaction(&mut self, tx: &Transaction, ctx: &mut CompressionContext) -> OpResult<()> {
        if tx.version != 1 && tx.version != 2 {
            // Default (non-strict) policy per spec: accept lossily rather than
            // refuse. Only bit 0 survives, so this transaction will come back
            // as version 1 or 2 on decompress, never its original value.
            warn!(
                target: "compress",
                "transaction version {} is outside {{1, 2}}; compressed form will lose it (OpErrorKind::Unsupported not raised)",
                tx.version
            );
        }

        let sequence_numbers_default = tx
            .inputs
            .iter()
            .all(|input| input.sequence_number == DEFAULT_SEQUENCE);

        let mut flags = 0u8;
        if tx.version == 2 {
            flags |= VERSION_2;
        }
        if tx.flag {
            flags |= FLAG_PRESENT;
        }
        if tx.lock_time == 0 {
            flags |= LOCK_TIME_DEFAULT;
        }
        if sequence_numbers_default {
            flags |= SEQUENCE_NUMBERS_DEFAULT;
        }
        self.write_u8(flags)?;

        tx.input_count.write_to(self)?;
        for input in &tx.inputs {
            let index = ctx.index_for(input.prev_transaction_hash);
            self.write_u32::<LittleEndian>(index)?;
            VarInt::new(input.prev_transaction_index as u64).write_to(self)?;
            input.script_length.write_to(self)?;
            self.write_all(&input.script)?;
            if !sequence_numbers_default {
                VarInt::new((input.sequence_number ^ DEFAULT_SEQUENCE) as u64).write_to(self)?;
            }
        }

        tx.output_count.write_to(self)?;
        for output in &tx.outputs {
            VarInt::new(output.value).write_to(self)?;
            output.script_length.write_to(self)?;
            self.write_all(&output.script)?;
        }

        if tx.flag {
            for input in &tx.inputs {
                input.witness_count.write_to(self)?;
                for witness in &input.witnesses {
                    witness.size.write_to(self)?;
                    self.write_all(&witness.data)?;
                }
            }
        }

        if tx.lock_time != 0 {
            self.write_u32::<LittleEndian>(tx.lock_time)?;
        }
        Ok(())
    }
}

impl<W: Write + Seek + ?Sized> CompressedBlockWrite for W {}

/// Trait for reading the compressed container's per-block layout back into
/// the entity model, resolving dedup indices against an already-loaded
/// `DecompressionContext`.
pub trait CompressedBlockRead: Read {
    fn read_compressed_block(&mut self, ctx: &DecompressionContext) -> OpResult<Block> {
        let magic = self.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(OpError::new(OpErrorKind::BadMagic {
                found: magic,
                is_byte_swapped: magic == MAGIC_BYTE_SWAPPED,
            }));
        }
        let size = self.read_u32::<LittleEndian>()?;
        let body = self.read_u8_vec(size)?;
        let mut cursor = Cursor::new(body);

        let header = cursor.read_compressed_header()?;
        let tx_count = VarInt::read_from(&mut cursor)?;
        let mut transactions = Vec::with_capacity(tx_count.0 as usize);
        for _ in 0..tx_count.0 {
            transactions.push(cursor.read_compressed_transaction(ctx)?);
        }

        if cursor.position() != size as u64 {
            return Err(OpError::new(OpErrorKind::OutOfRange).join_msg(&format!(
                "compressed block declared size {} but body consumed {} bytes",
                size,
                cursor.position()
            )));
        }
        Ok(Block::new(header, transactions))
    }

    fn read_compressed_header(&mut self) -> OpResult<BlockHeader> {
        Ok(BlockHeader::new(
            self.read_u32::<LittleEndian>()?,
            self.read_hash()?,
            self.read_hash()?,
            self.read_u32::<LittleEndian>()?,
            self.read_u32::<LittleEndian>()?,
            self.read_u32::<LittleEndian>()?,
        ))
    }

    fn read_compressed_transaction(&mut self, ctx: &DecompressionContext) -> OpResult<Transaction> {
        let flags = self.read_u8()?;
        let version = if flags & VERSION_2 != 0 { 2 } else { 1 };
        let flag = flags & FLAG_PRESENT != 0;
        let sequence_numbers_default = flags & SEQUENCE_NUMBERS_DEFAULT != 0;
        let lock_time_default = flags & LOCK_TIME_DEFAULT != 0;

        let input_count = VarInt::read_from(self)?;
        let mut inputs = Vec::with_capacity(input_count.0 as usize);
        for _ in 0..input_count.0 {
            let dedup_index = self.read_u32::<LittleEndian>()?;
            let prev_hash = ctx.resolve(dedup_index)?;
            let prev_index = VarInt::read_from(self)?.0 as u32;
            let script_len = VarInt::read_from(self)?;
            let script = self.read_u8_vec(script_len.0 as u32)?;
            let sequence = if sequence_numbers_default {
                DEFAULT_SEQUENCE
            } else {
                (VarInt::read_from(self)?.0 as u32) ^ DEFAULT_SEQUENCE
            };
            inputs.push(Input::new(prev_hash, prev_index, script, sequence, vec![]));
        }

        let output_count = VarInt::read_from(self)?;
        let mut outputs = Vec::with_capacity(output_count.0 as usize);
        for _ in 0..output_count.0 {
            let value = VarInt::read_from(self)?.0;
            let script_len = VarInt::read_from(self)?;
            let script = self.read_u8_vec(script_len.0 as u32)?;
            outputs.push(Output::new(value, script));
        }

        if flag {
            for input in inputs.iter_mut() {
                let witness_count = VarInt::read_from(self)?;
                let mut witnesses = Vec::with_capacity(witness_count.0 as usize);
                for _ in 0..witness_count.0 {
                    let size = VarInt::read_from(self)?;
                    let data = self.read_u8_vec(size.0 as u32)?;
                    witnesses.push(Witness { size, data });
                }
                input.witness_count = witness_count;
                input.witnesses = witnesses;
            }
        }

        let lock_time = if lock_time_default {
            0
        } else {
            self.read_u32::<LittleEndian>()?
        };

        Ok(Transaction::new(version, flag, inputs, outputs, lock_time))
    }
}

impl<R: Read + ?Sized> CompressedBlockRead for R {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_block() -> Block {
        let header = BlockHeader::new(1, Hash256::ZERO, Hash256::ZERO, 1_231_006_505, 0x1d00ffff, 2083236893);
        let input = Input::new(Hash256::ZERO, 0xFFFF_FFFF, vec![], 0xFFFF_FFFF, vec![]);
        let output = Output::new(5_000_000_000, vec![0x51]);
        let tx = Transaction::new(1, false, vec![input], vec![output], 0);
        Block::new(header, vec![tx])
    }

    #[test]
    fn test_minimal_block_flags_byte() {
        let block = minimal_block();
        let mut ctx = CompressionContext::new();
        let mut buf = Cursor::new(Vec::new());
        buf.write_compressed_block(&block, &mut ctx).unwrap();

        // magic(4) + size(4) + header(80) + tx_count(1) = flags byte at offset 89.
        let bytes = buf.into_inner();
        let flags = bytes[89];
        assert_eq!(flags, LOCK_TIME_DEFAULT | SEQUENCE_NUMBERS_DEFAULT);
    }

    #[test]
    fn test_compressed_roundtrip_minimal_block() {
        let block = minimal_block();
        let mut ctx = CompressionContext::new();
        let mut buf = Cursor::new(Vec::new());
        buf.write_compressed_block(&block, &mut ctx).unwrap();

        let dctx = DecompressionContext::new(ctx.ordered_hashes().to_vec());
        let mut reader = Cursor::new(buf.into_inner());
        let parsed = reader.read_compressed_block(&dctx).unwrap();

        assert_eq!(parsed.transactions.len(), 1);
        assert_eq!(parsed.transactions[0].version, 1);
        assert_eq!(parsed.transactions[0].lock_time, 0);
        assert_eq!(parsed.transactions[0].inputs[0].sequence_number, 0xFFFF_FFFF);
        assert_eq!(parsed.transactions[0].outputs[0].value, 5_000_000_000);
    }

    #[test]
    fn test_dedup_across_two_inputs() {
        let shared_hash = Hash256([0x42; 32]);
        let input_a = Input::new(shared_hash, 0, vec![], 0xFFFF_FFFF, vec![]);
        let input_b = Input::new(shared_hash, 1, vec![], 0xFFFF_FFFF, vec![]);
        let tx = Transaction::new(
            1,
            false,
            vec![input_a, input_b],
            vec![Output::new(1, vec![])],
            0,
        );
        let mut ctx = CompressionContext::new();
        let mut buf = Cursor::new(Vec::new());
        buf.write_compressed_transaction(&tx, &mut ctx).unwrap();
        assert_eq!(ctx.len(), 1);

        let dctx = DecompressionContext::new(ctx.ordered_hashes().to_vec());
        let mut reader = Cursor::new(buf.into_inner());
        let parsed = reader.read_compressed_transaction(&dctx).unwrap();
        assert_eq!(parsed.inputs[0].prev_transaction_hash, shared_hash);
        assert_eq!(parsed.inputs[1].prev_transaction_hash, shared_hash);
    }

    #[test]
    fn test_non_default_sequence_and_locktime_roundtrip() {
        let input = Input::new(Hash256::ZERO, 0, vec![], 5, vec![]);
        let tx = Transaction::new(1, false, vec![input], vec![Output::new(1, vec![])], 600_000);
        let mut ctx = CompressionContext::new();
        let mut buf = Cursor::new(Vec::new());
        buf.write_compressed_transaction(&tx, &mut ctx).unwrap();

        let dctx = DecompressionContext::new(ctx.ordered_hashes().to_vec());
        let mut reader = Cursor::new(buf.into_inner());
        let parsed = reader.read_compressed_transaction(&dctx).unwrap();
        assert_eq!(parsed.inputs[0].sequence_number, 5);
        assert_eq!(parsed.lock_time, 600_000);
    }
}
