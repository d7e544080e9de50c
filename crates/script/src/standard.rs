//! Standard script classification utilities.

use crate::opcodes::{
    OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160, OP_RETURN, OP_TRUE,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptType {
    P2Pk,
    P2Pkh,
    P2Sh,
    NullData,
    AnyoneCanSpend,
    Unknown,
}

pub fn classify_script_pubkey(script: &[u8]) -> ScriptType {
    if is_p2pkh(script) {
        ScriptType::P2Pkh
    } else if is_p2sh(script) {
        ScriptType::P2Sh
    } else if is_p2pk(script) {
        ScriptType::P2Pk
    } else if script.first() == Some(&OP_RETURN) {
        ScriptType::NullData
    } else if script == &[OP_TRUE][..] {
        ScriptType::AnyoneCanSpend
    } else {
        ScriptType::Unknown
    }
}

/// The 20-byte hash committed to by a P2PKH or P2SH script.
pub fn extract_script_hash(script: &[u8]) -> Option<[u8; 20]> {
    let bytes = match classify_script_pubkey(script) {
        ScriptType::P2Pkh => &script[3..23],
        ScriptType::P2Sh => &script[2..22],
        _ => return None,
    };
    let mut hash = [0u8; 20];
    hash.copy_from_slice(bytes);
    Some(hash)
}

/// Plain substring search of `needle` inside `script`. This is looser than
/// matching the script template, so a hash embedded in any output form
/// (including bare data pushes) is found.
pub fn script_contains(script: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    script.windows(needle.len()).any(|window| window == needle)
}

fn is_p2pkh(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
}

fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL
}

fn is_p2pk(script: &[u8]) -> bool {
    let key_len = match script.first().copied() {
        Some(len @ 33) | Some(len @ 65) => len,
        _ => return false,
    };
    script.len() == key_len as usize + 2 && script[script.len() - 1] == OP_CHECKSIG
}
