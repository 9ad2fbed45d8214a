use std::cmp::Reverse;
use std::fs;
use std::io;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Minutia, MinutiaKind};

/// One line of an `.xyt` file, before conversion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RawMinutia {
    pub x: i32,
    pub y: i32,
    /// Direction in degrees.
    pub t: i32,
    /// Quality, 0 when the column is missing.
    pub q: i32,
    pub kind: MinutiaKind,
}

impl RawMinutia {
    pub fn to_minutia(&self) -> Minutia {
        Minutia::new(self.x, self.y, (self.t as f64).to_radians(), self.kind)
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

/// Reads `x y theta [quality]` lines. Blank lines are skipped.
pub fn parse_xyt_from(reader: impl BufRead) -> Result<Vec<RawMinutia>> {
    let mut minutiae = vec![];
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut columns = line.split_whitespace().map(|column| {
            column
                .parse::<i32>()
                .map_err(|e| parse_error(number, format!("`{}`: {}", column, e)))
        });
        let mut next = |name: &str| {
            columns
                .next()
                .unwrap_or_else(|| Err(parse_error(number, format!("missing {}", name))))
        };
        let x = next("x")?;
        let y = next("y")?;
        let t = next("theta")?;
        let q = match columns.next() {
            Some(q) => q?,
            None => 0,
        };
        if columns.next().is_some() {
            return Err(parse_error(number, "too many columns"));
        }

        minutiae.push(RawMinutia {
            x,
            y,
            t,
            q,
            kind: MinutiaKind::Unknown,
        });
    }

    Ok(minutiae)
}

/// Reads minutia kinds from a MINDTCT `.min` file (4 header lines, then one
/// colon-separated record per minutia).
pub fn parse_min_kinds_from(reader: impl BufRead) -> Result<Vec<MinutiaKind>> {
    let mut kinds = vec![];
    for (index, line) in reader.lines().enumerate().skip(4) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kind = line
            .split(':')
            .nth(4)
            .ok_or_else(|| parse_error(index + 1, "missing minutia type column"))?;
        kinds.push(match kind.trim() {
            "RIG" => MinutiaKind::End,
            "BIF" => MinutiaKind::Bifurcation,
            other => return Err(parse_error(index + 1, format!("unknown minutia type `{}`", other))),
        });
    }
    Ok(kinds)
}

/// Parses an `.xyt` file. Kinds are taken from the `.min` file next to it, if any.
pub fn parse(xyt_path: impl AsRef<Path>) -> Result<Vec<RawMinutia>> {
    let xyt_path = xyt_path.as_ref();
    let mut minutiae = parse_xyt_from(io::BufReader::new(fs::File::open(xyt_path)?))?;

    let min_path = xyt_path.with_extension("min");
    if min_path.exists() {
        let kinds = parse_min_kinds_from(io::BufReader::new(fs::File::open(&min_path)?))?;
        if kinds.len() != minutiae.len() {
            log::warn!(
                "{} lists {} minutiae, {} has {}; ignoring kinds",
                min_path.display(),
                kinds.len(),
                xyt_path.display(),
                minutiae.len()
            );
        } else {
            for (minutia, kind) in minutiae.iter_mut().zip(kinds) {
                minutia.kind = kind;
            }
        }
    }

    Ok(minutiae)
}

/// Keeps at most `max_minutiae` minutiae of the highest quality, preserving the
/// file order among equal qualities.
pub fn prune(minutiae: &[RawMinutia], max_minutiae: usize) -> Vec<Minutia> {
    let mut minutiae = minutiae.to_vec();
    if minutiae.len() > max_minutiae {
        minutiae.sort_by_key(|m| Reverse(m.q));
        minutiae.truncate(max_minutiae);
    }
    minutiae.iter().map(RawMinutia::to_minutia).collect()
}
