use siphasher::sip::SipHasher24;
use std::hash::Hasher;

// Fixed per-process 128-bit SipHash key. Object iteration is ordered by
// insertion, never by hash, so a stable key does not leak into observable
// ordering.
const KEY0: u64 = 0xA57C99119D45DB87;
const KEY1: u64 = 0x934E39892F6AB5A4;

/// SipHash-2-4 of the raw bytes of an object key.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_keys(KEY0, KEY1);
    hasher.write(bytes);
    hasher.finish()
}
