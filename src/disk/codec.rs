//! The byte-pair encoding used for every field and every data byte on the
//! disk: each logical byte is stored followed by a zero pad byte, so the
//! image holds half as many logical bytes as raw bytes.

/// Raw bytes occupied by one logical byte.
pub const PAIR_SIZE: usize = 2;

/// Terminates names in the volume header and in catalog entries.
pub const TERMINATOR: u8 = 0x04;

/// Encode one logical byte as its on-disk pair.
#[inline]
pub fn encode(value: u8) -> [u8; PAIR_SIZE] {
    [value, 0x00]
}

/// Read the logical byte at logical `index` of a raw region.
#[inline]
pub fn byte_at(raw: &[u8], index: usize) -> u8 {
    raw[index * PAIR_SIZE]
}

/// Write a logical byte at logical `index` of a raw region, including its pad
/// byte.
#[inline]
pub fn set_byte_at(raw: &mut [u8], index: usize, value: u8) {
    raw[index * PAIR_SIZE..(index + 1) * PAIR_SIZE].copy_from_slice(&encode(value));
}

/// Read a little-endian 16-bit value stored as two consecutive logical bytes.
pub fn u16_at(raw: &[u8], index: usize) -> u16 {
    (byte_at(raw, index) as u16) | (byte_at(raw, index + 1) as u16) << 8
}

pub fn set_u16_at(raw: &mut [u8], index: usize, value: u16) {
    set_byte_at(raw, index, (value & 0xFF) as u8);
    set_byte_at(raw, index + 1, (value >> 8) as u8);
}

/// Decode up to `count` logical bytes into a string, stopping early at the
/// terminator.  Anything after the first terminator is ignored.
pub fn decode(raw: &[u8], count: usize) -> String {
    raw.iter()
        .step_by(PAIR_SIZE)
        .take(count)
        .take_while(|&&c| c != TERMINATOR)
        .map(|&c| c as char)
        .collect()
}

/// Decode a doubled payload into `out`.  `raw` must hold exactly
/// `out.len()` pairs.
pub fn decode_into(raw: &[u8], out: &mut [u8]) {
    assert_eq!(raw.len(), out.len() * PAIR_SIZE);
    for (byte, pair) in out.iter_mut().zip(raw.chunks(PAIR_SIZE)) {
        *byte = pair[0];
    }
}

/// Encode a payload into its doubled form.  `raw` must have room for
/// exactly `data.len()` pairs.
pub fn encode_into(data: &[u8], raw: &mut [u8]) {
    assert_eq!(raw.len(), data.len() * PAIR_SIZE);
    for (&byte, pair) in data.iter().zip(raw.chunks_mut(PAIR_SIZE)) {
        pair.copy_from_slice(&encode(byte));
    }
}
