//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is an XOR with a 4-byte key repeated over the payload. The key
//! position is tied to the payload offset, so a payload that arrives in
//! several pieces can be unmasked piece by piece with
//! [`apply_mask_offset`].

/// XOR `data` with `mask`, starting at key position 0.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    apply_mask_offset(data, mask, 0);
}

/// XOR `data` with `mask` as if `data` started `offset` bytes into the
/// payload.
pub fn apply_mask_offset(data: &mut [u8], mask: [u8; 4], offset: usize) {
    let shift = offset % 4;
    let key = [
        mask[shift],
        mask[(shift + 1) % 4],
        mask[(shift + 2) % 4],
        mask[(shift + 3) % 4],
    ];
    let key_u32 = u32::from_ne_bytes(key);

    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key_u32;
        chunk.copy_from_slice(&val.to_ne_bytes());
    }
    for (byte, k) in chunks.into_remainder().iter_mut().zip(key) {
        *byte ^= k;
    }
}

/// Produce a masking key for an outgoing frame.
///
/// Falls back to a time-derived key if the OS generator fails.
#[must_use]
pub fn generate_mask() -> [u8; 4] {
    let mut key = [0u8; 4];
    if getrandom::getrandom(&mut key).is_err() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0x1234_5678);
        key = nanos.wrapping_mul(0x9E37_79B9).to_le_bytes();
    }
    key
}
