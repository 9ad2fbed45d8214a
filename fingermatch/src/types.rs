use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::normalize_angle;

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MinutiaKind {
    Unknown = 0,
    End = 1,
    Bifurcation = 2,
}

impl MinutiaKind {
    /// Two-bit code used by the compact encoding.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MinutiaKind::Unknown),
            1 => Some(MinutiaKind::End),
            2 => Some(MinutiaKind::Bifurcation),
            _ => None,
        }
    }
}

impl Default for MinutiaKind {
    fn default() -> Self {
        MinutiaKind::Unknown
    }
}

/// Represents a single minutia.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Minutia {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Orientation in radians, within `[0, 2π)`.
    pub angle: f64,
    /// Type of the minutia.
    pub kind: MinutiaKind,
    /// Auxiliary marker carried along by extractors. Not part of the identity.
    #[serde(default)]
    pub flag: bool,
}

impl Minutia {
    pub fn new(x: i32, y: i32, angle: f64, kind: MinutiaKind) -> Self {
        Minutia {
            x,
            y,
            angle: normalize_angle(angle),
            kind,
            flag: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

impl PartialEq for Minutia {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y && self.angle == other.angle
    }
}

/// A point on the plane in floating point coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Represents a type-safe index of a minutia in the arena of one fingerprint.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct MinutiaId(pub(crate) u32);

impl fmt::Debug for MinutiaId {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for MinutiaId {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt::Display::fmt(&self.0, f)
    }
}

impl MinutiaId {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for MinutiaId {
    #[inline]
    fn from(index: usize) -> Self {
        MinutiaId(index as u32)
    }
}

impl From<u32> for MinutiaId {
    #[inline]
    fn from(index: u32) -> Self {
        MinutiaId(index)
    }
}

/// Pair of corresponding minutiae on two fingerprints (query and template).
#[derive(Debug, Copy, Clone)]
pub struct MinutiaPair {
    /// Minutia on the query fingerprint.
    pub query: MinutiaId,
    /// Corresponding minutia on the template fingerprint.
    pub template: MinutiaId,
    /// Similarity of the descriptor comparison the pair originates from.
    pub value: f64,
}

impl MinutiaPair {
    pub fn new(query: MinutiaId, template: MinutiaId, value: f64) -> Self {
        MinutiaPair {
            query,
            template,
            value,
        }
    }
}

impl PartialEq for MinutiaPair {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query && self.template == other.template
    }
}

impl Eq for MinutiaPair {}
