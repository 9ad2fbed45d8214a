//! Compact 4-byte representation of minutiae.
//!
//! Every minutia is a little-endian `u32`:
//!
//! | bits   | content                                  |
//! |--------|------------------------------------------|
//! | 31..21 | X coordinate                             |
//! | 20..10 | Y coordinate                             |
//! | 9..2   | angle, `round(angle · 255 / 2π)`          |
//! | 1..0   | kind                                     |

use std::f64::consts::TAU;

use crate::consts::MAX_ENCODED_COORDINATE;
use crate::error::{Error, Result};
use crate::types::{Minutia, MinutiaKind};

pub const ENCODED_MINUTIA_SIZE: usize = 4;

const ANGLE_STEPS: f64 = 255.0;

fn check_coordinate(name: &str, value: i32) -> Result<u32> {
    if (0..=MAX_ENCODED_COORDINATE).contains(&value) {
        Ok(value as u32)
    } else {
        Err(Error::InvalidArgument(format!(
            "{} coordinate {} is outside 0..={}",
            name, value, MAX_ENCODED_COORDINATE
        )))
    }
}

#[inline]
fn quantize_angle(angle: f64) -> u32 {
    ((angle * ANGLE_STEPS / TAU).round() as u32).min(255)
}

pub fn encode_minutia(minutia: &Minutia) -> Result<u32> {
    let x = check_coordinate("x", minutia.x)?;
    let y = check_coordinate("y", minutia.y)?;
    let angle = quantize_angle(minutia.angle);
    let kind = minutia.kind.code() as u32;
    Ok(x << 21 | y << 10 | angle << 2 | kind)
}

pub fn decode_minutia(word: u32) -> Result<Minutia> {
    let code = (word & 0b11) as u8;
    let kind = MinutiaKind::from_code(code)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown minutia kind code {}", code)))?;
    let x = (word >> 21) & 0x7ff;
    let y = (word >> 10) & 0x7ff;
    let angle = ((word >> 2) & 0xff) as f64 * TAU / ANGLE_STEPS;
    Ok(Minutia::new(x as i32, y as i32, angle, kind))
}

pub fn encode(minutiae: &[Minutia]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(minutiae.len() * ENCODED_MINUTIA_SIZE);
    for minutia in minutiae {
        bytes.extend_from_slice(&encode_minutia(minutia)?.to_le_bytes());
    }
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<Vec<Minutia>> {
    if bytes.len() % ENCODED_MINUTIA_SIZE != 0 {
        return Err(Error::MalformedLength(bytes.len()));
    }
    bytes
        .chunks_exact(ENCODED_MINUTIA_SIZE)
        .map(|chunk| decode_minutia(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
        .collect()
}
