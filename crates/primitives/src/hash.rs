use memwallet_consensus::Hash256;
use ripemd::{Digest as RipemdDigest, Ripemd160};
use sha2::Sha256;

pub fn sha256(data: &[u8]) -> Hash256 {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

pub fn sha256d(data: &[u8]) -> Hash256 {
    sha256(&sha256(data))
}

/// RIPEMD-160 over SHA-256, the 20-byte hash carried by P2PKH/P2SH scripts.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let digest = Ripemd160::digest(sha256(data));
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// Renders a hash the way block explorers and RPCs do: byte-reversed hex.
pub fn hash_to_hex(hash: &Hash256) -> String {
    let mut out = String::with_capacity(64);
    for byte in hash.iter().rev() {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_of_empty_input() {
        let digest = sha256d(b"");
        assert_eq!(
            hash_to_hex(&digest),
            "56944c5d3f98413ef45cf54545538103cc9f298e0575820ad3591376e2e0f65d"
        );
    }

    #[test]
    fn hash160_of_empty_input() {
        assert_eq!(
            hash160(b""),
            [
                0xb4, 0x72, 0xa2, 0x66, 0xd0, 0xbd, 0x89, 0xc1, 0x37, 0x06, 0xa4, 0x13, 0x2c,
                0xcf, 0xb1, 0x6f, 0x7c, 0x3b, 0x9f, 0xcb,
            ]
        );
    }
}
