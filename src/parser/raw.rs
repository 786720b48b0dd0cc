use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::hash::{Hash256, ReadHashExt};
use crate::codec::varint::VarInt;
use crate::errors::{OpError, OpErrorKind, OpResult};
use crate::proto::block::Block;
use crate::proto::header::BlockHeader;
use crate::proto::tx::{Input, Output, Transaction, Witness};
use crate::proto::{MAGIC, MAGIC_BYTE_SWAPPED};

/// Trait for structured reading of the canonical `.dat` block layout.
///
/// All types implementing `Read` get these methods for free.
pub trait RawBlockRead: Read {
    /// Reads one full block: magic, size, header, transaction count, transactions.
    /// The declared `size` is used as a hard bound -- the header and every
    /// transaction must consume exactly `size` bytes, or this returns
    /// `OutOfRange`, catching truncated or overlong bodies early instead of
    /// letting a parse run off into the next block's bytes.
    fn read_block(&mut self) -> OpResult<Block> {
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

        let header = cursor.read_block_header()?;
        let tx_count = VarInt::read_from(&mut cursor)?;
        let transactions = cursor.read_transactions(tx_count.0)?;

        if cursor.position() != size as u64 {
            return Err(OpError::new(OpErrorKind::OutOfRange).join_msg(&format!(
                "block declared size {} but body consumed {} bytes",
                size,
                cursor.position()
            )));
        }
        Ok(Block::new(header, transactions))
    }

    fn read_block_header(&mut self) -> OpResult<BlockHeader> {
        Ok(BlockHeader::new(
            self.read_u32::<LittleEndian>()?,
            self.read_hash()?,
            self.read_hash()?,
            self.read_u32::<LittleEndian>()?,
            self.read_u32::<LittleEndian>()?,
            self.read_u32::<LittleEndian>()?,
        ))
    }

    fn read_transactions(&mut self, count: u64) -> OpResult<Vec<Transaction>> {
        let mut txs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            txs.push(self.read_transaction()?);
        }
        Ok(txs)
    }

    /// A transaction's SegWit marker+flag is never peeked directly -- instead
    /// the input count is read speculatively. A real transaction always has
    /// at least one input, so an `input_count` of exactly zero can only mean
    /// the bytes just read were the `0x00` marker; the real count follows the
    /// `0x01` flag byte. This is the same trick Bitcoin Core's own
    /// deserializer uses.
    fn read_transaction(&mut self) -> OpResult<Transaction> {
        let version = self.read_u32::<LittleEndian>()?;

        let mut input_count = VarInt::read_from(self)?;
        let flag = if input_count.0 == 0 {
            let flag_byte = self.read_u8()?;
            if flag_byte != 0x01 {
                return Err(OpError::new(OpErrorKind::OutOfRange)
                    .join_msg(&format!("expected SegWit flag byte 0x01, found 0x{:02x}", flag_byte)));
            }
            input_count = VarInt::read_from(self)?;
            true
        } else {
            false
        };

        let mut inputs = self.read_inputs(input_count.0)?;
        let output_count = VarInt::read_from(self)?;
        let outputs = self.read_outputs(output_count.0)?;

        if flag {
            for input in inputs.iter_mut() {
                let witness_count = VarInt::read_from(self)?;
                let witnesses = self.read_witnesses(witness_count.0)?;
                input.witness_count = witness_count;
                input.witnesses = witnesses;
            }
        }

        let lock_time = self.read_u32::<LittleEndian>()?;
        Ok(Transaction::new(version, flag, inputs, outputs, lock_time))
    }

    fn read_inputs(&mut self, count: u64) -> OpResult<Vec<Input>> {
        let mut inputs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            inputs.push(self.read_input()?);
        }
        Ok(inputs)
    }

    fn read_input(&mut self) -> OpResult<Input> {
        let prev_hash = self.read_hash()?;
        let prev_index = self.read_u32::<LittleEndian>()?;
        let script_len = VarInt::read_from(self)?;
        let script = self.read_u8_vec(script_len.0 as u32)?;
        let sequence = self.read_u32::<LittleEndian>()?;
        Ok(Input::new(prev_hash, prev_index, script, sequence, vec![]))
    }

    fn read_outputs(&mut self, count: u64) -> OpResult<Vec<Output>> {
        let mut outputs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            outputs.push(self.read_output()?);
        }
        Ok(outputs)
    }

    fn read_output(&mut self) -> OpResult<Output> {
        let value = self.read_u64::<LittleEndian>()?;
        let script_len = VarInt::read_from(self)?;
        let script = self.read_u8_vec(script_len.0 as u32)?;
        Ok(Output::new(value, script))
    }

    fn read_witnesses(&mut self, count: u64) -> OpResult<Vec<Witness>> {
        let mut witnesses = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let size = VarInt::read_from(self)?;
            let data = self.read_u8_vec(size.0 as u32)?;
            witnesses.push(Witness { size, data });
        }
        Ok(witnesses)
    }
}

impl<R: Read + ?Sized> RawBlockRead for R {}

/// Trait for writing the entity model back out in the canonical `.dat` layout.
pub trait RawBlockWrite: std::io::Write {
    fn write_block(&mut self, block: &Block) -> OpResult<()> {
        use crate::proto::ToRaw;
        self.write_u32::<LittleEndian>(MAGIC)?;
        let body = block.to_body_bytes();
        self.write_u32::<LittleEndian>(body.len() as u32)?;
        self.write_all(&body)?;
        Ok(())
    }
}

impl<W: std::io::Write + ?Sized> RawBlockWrite for W {}
