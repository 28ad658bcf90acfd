//! Script numbers: little-endian sign-magnitude integers.

use crate::{DogeError, Result};

/// Default maximum byte length of a numeric operand.
pub const DEFAULT_MAX_NUM_SIZE: usize = 4;

/// Lock-time operands may use five bytes so they can reach 2^39 - 1.
pub const LOCKTIME_MAX_NUM_SIZE: usize = 5;

/// Decode a script number of at most `max_len` bytes.
pub fn decode_num(data: &[u8], max_len: usize) -> Result<i64> {
    if data.len() > max_len {
        return Err(DogeError::Structural(format!(
            "Script number of {} bytes exceeds {} bytes",
            data.len(),
            max_len
        )));
    }
    if data.is_empty() {
        return Ok(0);
    }

    let mut result = 0i64;
    for (i, &byte) in data.iter().enumerate() {
        result |= (byte as i64) << (8 * i);
    }

    // Last byte contains sign bit
    let last = data[data.len() - 1];
    if last & 0x80 != 0 {
        let mask = !(0x80i64 << (8 * (data.len() - 1)));
        Ok(-(result & mask))
    } else {
        Ok(result)
    }
}

/// Encode `value` in the minimal script number form.
pub fn encode_num(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut out = Vec::new();
    while magnitude > 0 {
        out.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    // If the top bit is taken, an extra byte carries the sign.
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}

/// Boolean coercion: empty, all zeros, or all zeros with a trailing 0x80
/// (negative zero) are false; everything else is true.
pub fn cast_to_bool(data: &[u8]) -> bool {
    for (i, &byte) in data.iter().enumerate() {
        if byte != 0 {
            return !(i == data.len() - 1 && byte == 0x80);
        }
    }
    false
}

pub fn encode_bool(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}
