//! 32-bit FNV-1a string hashing.
//!
//! Used to key scriptable buildings and resources by name so lookups
//! don't need to compare strings.

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

pub fn hash32_bytes(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[inline]
pub fn hash32(s: &str) -> u32 {
    hash32_bytes(s.as_bytes())
}
