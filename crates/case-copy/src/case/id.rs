//! Case identifier generation.
//!
//! Uses the operating system's cryptographic random source via `rand`.

use rand::RngCore;

use super::types::CaseId;

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Generate a fresh 128-bit case identifier.
///
/// Rendered as hyphenated lowercase hex with the version-4 and variant
/// bits set, so the ids look like any other random UUID in the store.
pub fn new_case_id() -> CaseId {
    let mut bytes: [u8; 16] = random_bytes();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let h = hex::encode(bytes);
    CaseId(format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    ))
}
