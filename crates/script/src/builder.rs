//! Script assembly helpers.

use std::fmt;

use memwallet_consensus::constants::MAX_SCRIPT_SIZE;

use crate::opcodes::{
    OP_0, OP_1, OP_1NEGATE, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_RETURN, OP_TRUE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    TooLarge(usize),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::TooLarge(len) => {
                write!(f, "script of {len} bytes exceeds {MAX_SCRIPT_SIZE}")
            }
        }
    }
}

impl std::error::Error for ScriptError {}

#[derive(Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.script.push(opcode);
        self
    }

    /// Pushes `value` using the smallest encoding: small-int opcodes for
    /// -1..=16, otherwise a minimal script number.
    pub fn push_int(self, value: i64) -> Self {
        match value {
            0 => self.push_opcode(OP_0),
            -1 => self.push_opcode(OP_1NEGATE),
            1..=16 => self.push_opcode(OP_1 + (value as u8 - 1)),
            _ => {
                let bytes = script_num(value);
                self.push_data(&bytes)
            }
        }
    }

    pub fn push_data(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.script.push(len as u8);
        } else if len <= 0xff {
            self.script.push(OP_PUSHDATA1);
            self.script.push(len as u8);
        } else if len <= 0xffff {
            self.script.push(OP_PUSHDATA2);
            self.script.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.script.push(OP_PUSHDATA4);
            self.script.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.script.extend_from_slice(data);
        self
    }

    pub fn into_script(self) -> Result<Vec<u8>, ScriptError> {
        if self.script.len() > MAX_SCRIPT_SIZE {
            return Err(ScriptError::TooLarge(self.script.len()));
        }
        Ok(self.script)
    }
}

// Little-endian sign-magnitude, no redundant trailing byte.
fn script_num(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut out = Vec::with_capacity(9);
    while magnitude > 0 {
        out.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}

/// An output anyone can spend.
pub fn op_true_script() -> Vec<u8> {
    vec![OP_TRUE]
}

pub fn null_data_script(data: &[u8]) -> Result<Vec<u8>, ScriptError> {
    ScriptBuilder::new()
        .push_opcode(OP_RETURN)
        .push_data(data)
        .into_script()
}

/// Coinbase signature script: the block height followed by an extra nonce.
pub fn coinbase_sig_script(height: u32, extra_nonce: u64) -> Result<Vec<u8>, ScriptError> {
    ScriptBuilder::new()
        .push_int(i64::from(height))
        .push_int(extra_nonce as i64)
        .into_script()
}

/// Null-data output carrying the height and a random extra nonce so that
/// coinbases at equal heights on competing branches get distinct txids.
pub fn coinbase_extra_nonce_script(height: u32, extra_nonce: u64) -> Result<Vec<u8>, ScriptError> {
    let mut data = [0u8; 12];
    data[..4].copy_from_slice(&height.to_le_bytes());
    data[4..].copy_from_slice(&extra_nonce.to_le_bytes());
    null_data_script(&data)
}
