//! SHA-256 helpers shared by match hashing and the audit chain

use ring::hmac;
use sha2::{Digest, Sha256};

/// Length of a finding's match hash in hex characters
pub const MATCH_HASH_LEN: usize = 12;

/// Full lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}

/// Truncated SHA-256 used to identify a matched substring without
/// retaining it. Deterministic across calls and processes.
///
/// The hash is unsalted. Low-entropy categories can be recovered by
/// enumeration from a `ScanResult` alone (there are about 10^9 formatted
/// SSNs), so results that leave the trust boundary should be produced
/// with [`keyed_match_hash`] instead.
pub fn match_hash(matched: &str) -> String {
    let mut full = sha256_hex(matched.as_bytes());
    full.truncate(MATCH_HASH_LEN);
    full
}

/// Truncated HMAC-SHA256 under a deployment key. Deterministic for a given
/// key, and not enumerable without it.
pub fn keyed_match_hash(key: &hmac::Key, matched: &str) -> String {
    let mut full = hex_encode(hmac::sign(key, matched.as_bytes()).as_ref());
    full.truncate(MATCH_HASH_LEN);
    full
}

pub(crate) fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode lowercase or uppercase hex; `None` on odd length or a non-hex digit
pub(crate) fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
