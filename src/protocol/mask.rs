//! XOR masking of frame payloads (RFC 6455 Section 5.3).

use crate::error::{Error, Result};

/// Scalar byte-by-byte XOR masking.
///
/// Byte `i` is XORed with `mask[i % 4]`. Applying the same mask twice
/// restores the input.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking, equivalent to [`apply_mask`].
///
/// Processes eight bytes per step with a `u64` XOR and finishes the tail
/// byte by byte.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let wide = [
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ];
    let mask_u64 = u64::from_ne_bytes(wide);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = (u64::from_ne_bytes(word) ^ mask_u64).to_ne_bytes();
        chunk.copy_from_slice(&masked);
    }

    // Every full chunk is a multiple of 4 bytes, so the tail restarts at mask[0].
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Draw a fresh masking key from the operating system's CSPRNG.
///
/// # Errors
///
/// Returns `Error::Io` if the random source is unavailable.
pub fn generate_mask() -> Result<[u8; 4]> {
    let mut key = [0u8; 4];
    getrandom::getrandom(&mut key)
        .map_err(|e| Error::Io(format!("random source unavailable: {e}")))?;
    Ok(key)
}
