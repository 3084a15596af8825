//! hash.rs — SHA-256 digest engine
//!
//! One hash domain serves the whole loader: signature checking and boot
//! identity derivation both consume this digest. Always computed over the
//! raw file bytes, never the relocated in-memory copy.

use digest::Digest;
use sha2::Sha256;

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(sha256(b"vanta"), sha256(b"vanta"));
        assert_ne!(sha256(b"vanta"), sha256(b"vantb"));
    }

    #[test]
    fn empty_input_vector() {
        // SHA-256 of the empty string, from FIPS 180-4 example values.
        let expected = [
            0xE3, 0xB0, 0xC4, 0x42, 0x98, 0xFC, 0x1C, 0x14, 0x9A, 0xFB, 0xF4, 0xC8, 0x99, 0x6F,
            0xB9, 0x24, 0x27, 0xAE, 0x41, 0xE4, 0x64, 0x9B, 0x93, 0x4C, 0xA4, 0x95, 0x99, 0x1B,
            0x78, 0x52, 0xB8, 0x55,
        ];
        assert_eq!(sha256(b""), expected);
    }

    #[test]
    fn known_abc_vector() {
        let expected = [
            0xBA, 0x78, 0x16, 0xBF, 0x8F, 0x01, 0xCF, 0xEA, 0x41, 0x41, 0x40, 0xDE, 0x5D, 0xAE,
            0x22, 0x23, 0xB0, 0x03, 0x61, 0xA3, 0x96, 0x17, 0x7A, 0x9C, 0xB4, 0x10, 0xFF, 0x61,
            0xF2, 0x00, 0x15, 0xAD,
        ];
        assert_eq!(sha256(b"abc"), expected);
    }
}
