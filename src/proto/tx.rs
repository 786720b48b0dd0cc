use std::fmt;

use crate::codec::hash::Hash256;
use crate::codec::varint::VarInt;
use crate::proto::ToRaw;

/// A single witness stack item belonging to one input.
#[derive(Clone)]
pub struct Witness {
    pub size: VarInt,
    pub data: Vec<u8>,
}

impl Witness {
    pub fn new(data: Vec<u8>) -> Self {
        Witness {
            size: VarInt::new(data.len() as u64),
            data,
        }
    }
}

impl ToRaw for Witness {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size.encoded_len() + self.data.len());
        self.size.write_to(&mut bytes).expect("write to Vec<u8> cannot fail");
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

impl fmt::Debug for Witness {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Witness")
            .field("size", &self.size)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// One transaction input.
///
/// `witnesses` is always populated when the owning transaction's
/// SegWit `flag` is set and empty otherwise -- witnesses belong to the
/// input, never to the transaction, even though the canonical wire layout
/// writes all of a transaction's witness data in one block between its
/// outputs and its lock_time.
#[derive(Clone)]
pub struct Input {
    pub prev_transaction_hash: Hash256,
    pub prev_transaction_index: u32,
    pub script_length: VarInt,
    pub script: Vec<u8>,
    pub sequence_number: u32,
    pub witness_count: VarInt,
    pub witnesses: Vec<Witness>,
}

impl Input {
    pub fn new(
        prev_transaction_hash: Hash256,
        prev_transaction_index: u32,
        script: Vec<u8>,
        sequence_number: u32,
        witnesses: Vec<Witness>,
    ) -> Self {
        Input {
            prev_transaction_hash,
            prev_transaction_index,
            script_length: VarInt::new(script.len() as u64),
            script,
            sequence_number,
            witness_count: VarInt::new(witnesses.len() as u64),
            witnesses,
        }
    }

    /// True for the single input of a coinbase transaction: an all-zero
    /// previous-tx hash with index 0xFFFFFFFF.
    pub fn is_coinbase(&self) -> bool {
        self.prev_transaction_hash == Hash256::ZERO && self.prev_transaction_index == 0xFFFF_FFFF
    }
}

impl ToRaw for Input {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 + 4 + 9 + self.script.len() + 4);
        let mut prev = self.prev_transaction_hash.0;
        prev.reverse();
        bytes.extend_from_slice(&prev);
        bytes.extend_from_slice(&self.prev_transaction_index.to_le_bytes());
        self.script_length
            .write_to(&mut bytes)
            .expect("write to Vec<u8> cannot fail");
        bytes.extend_from_slice(&self.script);
        bytes.extend_from_slice(&self.sequence_number.to_le_bytes());
        bytes
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Input")
            .field("prev_transaction_hash", &self.prev_transaction_hash)
            .field("prev_transaction_index", &self.prev_transaction_index)
            .field("script_length", &self.script_length)
            .field("sequence_number", &self.sequence_number)
            .field("witness_count", &self.witness_count)
            .finish()
    }
}

/// One transaction output.
#[derive(Clone)]
pub struct Output {
    pub value: u64,
    pub script_length: VarInt,
    pub script: Vec<u8>,
}

impl Output {
    pub fn new(value: u64, script: Vec<u8>) -> Self {
        Output {
            value,
            script_length: VarInt::new(script.len() as u64),
            script,
        }
    }
}

impl ToRaw for Output {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 9 + self.script.len());
        bytes.extend_from_slice(&self.value.to_le_bytes());
        self.script_length
            .write_to(&mut bytes)
            .expect("write to Vec<u8> cannot fail");
        bytes.extend_from_slice(&self.script);
        bytes
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Output")
            .field("value", &self.value)
            .field("script_length", &self.script_length)
            .finish()
    }
}

/// A transaction. `flag` records whether the SegWit marker+flag (`0x00 0x01`)
/// was present on the wire; it is never inferred from whether any input
/// actually carries witness data, since a flagged transaction with
/// all-empty witnesses is legal and must round-trip back to a flagged one.
#[derive(Clone)]
pub struct Transaction {
    pub version: u32,
    pub flag: bool,
    pub input_count: VarInt,
    pub inputs: Vec<Input>,
    pub output_count: VarInt,
    pub outputs: Vec<Output>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(
        version: u32,
        flag: bool,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        lock_time: u32,
    ) -> Self {
        Transaction {
            version,
            flag,
            input_count: VarInt::new(inputs.len() as u64),
            inputs,
            output_count: VarInt::new(outputs.len() as u64),
            outputs,
            lock_time,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }
}

impl ToRaw for Transaction {
    /// Canonical wire layout: version, optional marker+flag, inputs, outputs,
    /// witnesses (iff flagged), lock_time.
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.version.to_le_bytes());
        if self.flag {
            bytes.extend_from_slice(&[0x00, 0x01]);
        }
        self.input_count
            .write_to(&mut bytes)
            .expect("write to Vec<u8> cannot fail");
        for input in &self.inputs {
            bytes.extend_from_slice(&input.to_bytes());
        }
        self.output_count
            .write_to(&mut bytes)
            .expect("write to Vec<u8> cannot fail");
        for output in &self.outputs {
            bytes.extend_from_slice(&output.to_bytes());
        }
        if self.flag {
            for input in &self.inputs {
                input
                    .witness_count
                    .write_to(&mut bytes)
                    .expect("write to Vec<u8> cannot fail");
                for witness in &input.witnesses {
                    bytes.extend_from_slice(&witness.to_bytes());
                }
            }
        }
        bytes.extend_from_slice(&self.lock_time.to_le_bytes());
        bytes
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Transaction")
            .field("version", &self.version)
            .field("flag", &self.flag)
            .field("input_count", &self.input_count)
            .field("output_count", &self.output_count)
            .field("lock_time", &self.lock_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_coinbase() {
        let input = Input::new(Hash256::ZERO, 0xFFFF_FFFF, vec![], 0xFFFF_FFFF, vec![]);
        assert!(input.is_coinbase());

        let tx = Transaction::new(
            1,
            false,
            vec![input],
            vec![Output::new(5_000_000_000, vec![0x51])],
            0,
        );
        assert!(tx.is_coinbase());
    }

    #[test]
    fn test_non_segwit_serialization_has_no_marker() {
        let input = Input::new(Hash256::ZERO, 0xFFFF_FFFF, vec![], 0xFFFF_FFFF, vec![]);
        let tx = Transaction::new(1, false, vec![input], vec![Output::new(0, vec![])], 0);
        let bytes = tx.to_bytes();
        // version (4) + in_count (1) + input (32+4+1+0+4=41) + out_count (1) + output (8+1+0=9) + lock_time (4)
        assert_eq!(bytes.len(), 4 + 1 + 41 + 1 + 9 + 4);
    }
}
