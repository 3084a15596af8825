//! keys.rs — embedded trusted signing key
//!
//! One RSA-2048 public key, baked in at build time. No dynamic key
//! provisioning: if these constants do not decode, the loader binary
//! itself is corrupt and the boot aborts with `CryptoConfigError` —
//! deliberately distinct from an ordinary signature mismatch.

use alloc::vec::Vec;

use crate::error::{LoadError, LoadResult};

use super::rsa::{RsaPublicKey, MIN_MODULUS_LEN};

/// Modulus of the Vanta kernel signing key, big-endian.
pub const TRUSTED_KERNEL_MODULUS: [u8; 256] = [
    0xF3, 0x79, 0x02, 0xA4, 0x66, 0xB6, 0x13, 0x32, 0x7C, 0xE1, 0x21, 0xB5, 0xEB, 0x6C, 0xB0, 0x46,
    0xFE, 0x0C, 0xB6, 0xFD, 0x1B, 0xFA, 0x0D, 0x86, 0xFF, 0xBE, 0xA0, 0xC3, 0x71, 0x34, 0x00, 0x6A,
    0x4B, 0xDD, 0x03, 0x59, 0x75, 0x35, 0x4F, 0xC7, 0x3D, 0x46, 0x6F, 0xA1, 0xC8, 0xE3, 0x9F, 0x63,
    0x66, 0x4D, 0xE4, 0x04, 0xEC, 0xB4, 0x1B, 0xFF, 0x04, 0x78, 0xF5, 0x4B, 0x12, 0x7F, 0xEF, 0xE1,
    0x2B, 0xAF, 0xC4, 0x38, 0xEE, 0x3C, 0xEA, 0x36, 0x51, 0xDC, 0xB9, 0xF4, 0xD7, 0x65, 0x6A, 0x8C,
    0x2C, 0x67, 0x6E, 0x77, 0xC1, 0xF1, 0x00, 0xBA, 0xD0, 0x26, 0xF8, 0x1B, 0x49, 0xD1, 0xD1, 0x2C,
    0xFC, 0x72, 0xD1, 0xED, 0xDE, 0x59, 0x00, 0x7E, 0xF6, 0xA5, 0x6F, 0x76, 0x10, 0x54, 0xC5, 0x81,
    0x75, 0xCE, 0xBA, 0x0E, 0x4E, 0xC1, 0xB1, 0x62, 0x29, 0xCC, 0x50, 0xFE, 0xE9, 0x10, 0xC5, 0x80,
    0xFA, 0x23, 0xF9, 0x71, 0xBD, 0x63, 0x2C, 0x9A, 0xA7, 0x9B, 0xCE, 0xDC, 0xB0, 0xAA, 0x94, 0x0E,
    0xBF, 0x24, 0x91, 0xFE, 0x77, 0xC6, 0x8E, 0x00, 0x87, 0xD8, 0xE0, 0x95, 0xB4, 0x55, 0x29, 0xCD,
    0xFA, 0x31, 0xC3, 0x30, 0xCF, 0x63, 0xAF, 0x28, 0x77, 0x5B, 0xEB, 0x6E, 0x9A, 0xAD, 0x56, 0x11,
    0x10, 0x8C, 0xB4, 0x0C, 0x38, 0x03, 0x99, 0xEA, 0xFB, 0xE5, 0xC8, 0x30, 0x55, 0x0F, 0xBF, 0x29,
    0x71, 0xE3, 0x77, 0x11, 0x05, 0xB4, 0x51, 0x13, 0xF5, 0x61, 0x8C, 0x18, 0xCA, 0xC2, 0xE6, 0xAC,
    0xF1, 0x7B, 0x44, 0x2E, 0x73, 0xF7, 0x81, 0x8A, 0x2B, 0x9E, 0x11, 0xCB, 0x97, 0x9B, 0x1D, 0x8A,
    0x07, 0x48, 0x2C, 0x81, 0x48, 0x9B, 0xEC, 0x08, 0x30, 0x43, 0x77, 0x89, 0x36, 0xC7, 0x70, 0x18,
    0xDB, 0x97, 0xDA, 0x99, 0x7D, 0xF4, 0xF7, 0xD1, 0xB2, 0xF1, 0x1F, 0x46, 0xB2, 0xAE, 0x4C, 0x37,
];

pub const TRUSTED_KERNEL_EXPONENT: u32 = 65537;

/// Decode the embedded constants into a usable key, once, at startup.
pub fn trusted_kernel_key() -> LoadResult<RsaPublicKey> {
    decode_key(&TRUSTED_KERNEL_MODULUS, TRUSTED_KERNEL_EXPONENT)
}

fn decode_key(modulus: &[u8], exponent: u32) -> LoadResult<RsaPublicKey> {
    if modulus.len() < MIN_MODULUS_LEN {
        return Err(LoadError::CryptoConfigError("modulus too short"));
    }
    // Full-width modulus: the top bit of the leading byte must be set.
    if modulus[0] & 0x80 == 0 {
        return Err(LoadError::CryptoConfigError("modulus top bit clear"));
    }
    // An RSA modulus is a product of odd primes.
    if modulus[modulus.len() - 1] & 0x01 == 0 {
        return Err(LoadError::CryptoConfigError("modulus is even"));
    }
    if exponent < 3 || exponent % 2 == 0 {
        return Err(LoadError::CryptoConfigError("implausible public exponent"));
    }

    let mut n = Vec::with_capacity(modulus.len());
    n.extend_from_slice(modulus);
    Ok(RsaPublicKey {
        modulus: n,
        exponent,
    })
}
