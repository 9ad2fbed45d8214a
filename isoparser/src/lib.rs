//! Reader for ISO/IEC 19794-2:2005 finger minutiae records (`FMR`).

use std::path::Path;

use thiserror::Error;

/// Size of the record header preceding the finger views.
const HEADER_SIZE: usize = 24;
const VIEW_HEADER_SIZE: usize = 4;
const MINUTIA_SIZE: usize = 6;
/// Angles are stored in units of 360/256 degrees.
const ANGLE_UNIT_DEGREES: f32 = 1.40625;

#[derive(Debug)]
pub struct Record {
    pub capture_equipment: u16,
    pub x_image_size: u16,
    pub y_image_size: u16,
    pub x_resolution: u16,
    pub y_resolution: u16,
    pub views: Vec<View>,
}

#[derive(Debug)]
pub struct View {
    pub finger_position: u8,
    pub impr_type: u8,
    pub finger_quality: u8,
    pub minutiae: Vec<Minutia>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Minutia {
    pub ty: MinutiaType,
    pub x: u16,
    pub y: u16,
    /// Direction in degrees.
    pub angle: f32,
    pub quality: u8,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum MinutiaType {
    Other = 0b00,
    RidgeEnding = 0b01,
    RidgeBifurcation = 0b10,
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("not a finger minutiae record")]
    InvalidFormat,
    #[error("record length {declared} does not match file size {actual}")]
    InvalidLength { declared: u32, actual: usize },
    #[error("record ends unexpectedly at byte {0}")]
    Truncated(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Bounds-checked big-endian reader over the record bytes.
struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, position: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.position + count;
        let slice = self
            .bytes
            .get(self.position..end)
            .ok_or(ParseError::Truncated(self.position))?;
        self.position = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

pub fn load_iso(path: impl AsRef<Path>) -> Result<Record> {
    let file = std::fs::read(path)?;
    parse_iso(&file)
}

pub fn parse_iso(file: &[u8]) -> Result<Record> {
    if file.len() < HEADER_SIZE {
        return Err(ParseError::Truncated(file.len()));
    }
    let mut cursor = Cursor::new(file);

    if cursor.take(4)? != b"FMR\0" {
        return Err(ParseError::InvalidFormat);
    }
    let _version = cursor.take(4)?;

    let length = cursor.u32()?;
    if length as usize != file.len() {
        return Err(ParseError::InvalidLength {
            declared: length,
            actual: file.len(),
        });
    }

    let capture_equipment = cursor.u16()?;
    let x_image_size = cursor.u16()?;
    let y_image_size = cursor.u16()?;
    let x_resolution = cursor.u16()?;
    let y_resolution = cursor.u16()?;
    let n_finger_views = cursor.u8()?;
    let _reserved_byte = cursor.u8()?;

    let mut record = Record {
        capture_equipment,
        x_image_size,
        y_image_size,
        x_resolution,
        y_resolution,
        views: Vec::with_capacity(n_finger_views as usize),
    };

    for _ in 0..n_finger_views {
        record.views.push(parse_view(&mut cursor)?);
    }
    Ok(record)
}

fn parse_view(cursor: &mut Cursor) -> Result<View> {
    let header = cursor.take(VIEW_HEADER_SIZE)?;
    let mut view = View {
        finger_position: header[0],
        impr_type: header[1],
        finger_quality: header[2],
        minutiae: Vec::with_capacity(header[3] as usize),
    };

    for _ in 0..header[3] {
        let raw = cursor.take(MINUTIA_SIZE)?;
        let raw_x = u16::from_be_bytes([raw[0], raw[1]]);
        let raw_y = u16::from_be_bytes([raw[2], raw[3]]);
        const MASK: u16 = 0b11000000_00000000;
        let ty = (raw_x & MASK) >> MASK.trailing_zeros();

        view.minutiae.push(Minutia {
            ty: match ty {
                0b00 => MinutiaType::Other,
                0b01 => MinutiaType::RidgeEnding,
                0b10 => MinutiaType::RidgeBifurcation,
                _ => return Err(ParseError::InvalidFormat),
            },
            x: raw_x & !MASK,
            y: raw_y & !MASK,
            angle: raw[4] as f32 * ANGLE_UNIT_DEGREES,
            quality: raw[5],
        });
    }

    // extended data block, skipped
    let extended_length = cursor.u16()? as usize;
    cursor.take(extended_length)?;

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(minutiae: &[(u8, u16, u16, u8, u8)]) -> Vec<u8> {
        let mut view = vec![3, 0, 80, minutiae.len() as u8];
        for &(ty, x, y, angle, quality) in minutiae {
            view.extend_from_slice(&((ty as u16) << 14 | x).to_be_bytes());
            view.extend_from_slice(&y.to_be_bytes());
            view.push(angle);
            view.push(quality);
        }
        view.extend_from_slice(&0u16.to_be_bytes());

        let mut bytes = b"FMR\0 20\0".to_vec();
        bytes.extend_from_slice(&((HEADER_SIZE + view.len()) as u32).to_be_bytes());
        for value in &[0u16, 400, 500, 197, 197] {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        bytes.push(1);
        bytes.push(0);
        bytes.extend_from_slice(&view);
        bytes
    }

    #[test]
    fn parses_single_view() {
        let bytes = record(&[(1, 100, 200, 64, 60), (2, 7, 350, 0, 90)]);
        let record = parse_iso(&bytes).unwrap();
        assert_eq!((record.x_image_size, record.y_image_size), (400, 500));
        assert_eq!(record.views.len(), 1);

        let view = &record.views[0];
        assert_eq!(view.finger_position, 3);
        assert_eq!(view.minutiae.len(), 2);
        assert_eq!(
            view.minutiae[0],
            Minutia {
                ty: MinutiaType::RidgeEnding,
                x: 100,
                y: 200,
                angle: 90.0,
                quality: 60,
            }
        );
        assert_eq!(view.minutiae[1].ty, MinutiaType::RidgeBifurcation);
    }

    #[test]
    fn rejects_broken_records() {
        let good = record(&[(1, 100, 200, 64, 60)]);

        let mut wrong_magic = good.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(parse_iso(&wrong_magic), Err(ParseError::InvalidFormat)));

        let mut longer = good.clone();
        longer.push(0);
        assert!(matches!(parse_iso(&longer), Err(ParseError::InvalidLength { .. })));

        assert!(matches!(parse_iso(&good[..10]), Err(ParseError::Truncated(_))));

        let mut bad_type = record(&[(3, 100, 200, 64, 60)]);
        assert!(matches!(parse_iso(&bad_type), Err(ParseError::InvalidFormat)));

        // declare two minutiae but store one
        bad_type = record(&[(1, 100, 200, 64, 60)]);
        bad_type[HEADER_SIZE + 3] = 2;
        assert!(matches!(parse_iso(&bad_type), Err(ParseError::Truncated(_))));
    }
}
