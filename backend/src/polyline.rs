//! Encoded polyline format (5 decimal places, zig-zag deltas in 5-bit chunks
//! offset by 63).

use shared::Coordinate;
use thiserror::Error;

const PRECISION: f64 = 1e5;
const CHUNK_OFFSET: u8 = 63;
const CONTINUATION_BIT: u64 = 0x20;
const CHUNK_MASK: u64 = 0x1f;
/// A value never needs more than 32 bits, i.e. 7 chunks.
const MAX_SHIFT: u32 = 30;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolylineError {
    #[error("invalid character {found:?} at byte {position}")]
    InvalidCharacter { found: char, position: usize },
    #[error("encoded path ends in the middle of a value starting at byte {0}")]
    Truncated(usize),
    #[error("value starting at byte {0} is too long")]
    Overlong(usize),
    #[error("latitude at byte {0} has no matching longitude")]
    UnpairedLatitude(usize),
    #[error("point {index} is outside WGS84 bounds: ({lat}, {lon})")]
    OutOfRange { index: usize, lat: f64, lon: f64 },
}

pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut coordinates = Vec::with_capacity(bytes.len() / 4);
    let mut cursor = 0usize;
    let mut lat = 0i64;
    let mut lon = 0i64;

    while cursor < bytes.len() {
        let lat_start = cursor;
        lat += read_value(bytes, &mut cursor)?;
        if cursor >= bytes.len() {
            return Err(PolylineError::UnpairedLatitude(lat_start));
        }
        lon += read_value(bytes, &mut cursor)?;

        let point = Coordinate::new(lat as f64 / PRECISION, lon as f64 / PRECISION);
        if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
            return Err(PolylineError::OutOfRange {
                index: coordinates.len(),
                lat: point.lat,
                lon: point.lon,
            });
        }
        coordinates.push(point);
    }

    Ok(coordinates)
}

fn read_value(bytes: &[u8], cursor: &mut usize) -> Result<i64, PolylineError> {
    let start = *cursor;
    let mut result = 0u64;
    let mut shift = 0u32;

    loop {
        let Some(&byte) = bytes.get(*cursor) else {
            return Err(PolylineError::Truncated(start));
        };
        if !(CHUNK_OFFSET..=CHUNK_OFFSET + 0x3f).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                found: byte as char,
                position: *cursor,
            });
        }
        if shift > MAX_SHIFT {
            return Err(PolylineError::Overlong(start));
        }
        *cursor += 1;

        let chunk = u64::from(byte - CHUNK_OFFSET);
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;
        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }

    let value = (result >> 1) as i64;
    Ok(if result & 1 == 1 { !value } else { value })
}

pub fn encode(coordinates: &[Coordinate]) -> String {
    let mut encoded = String::with_capacity(coordinates.len() * 8);
    let mut prev_lat = 0i64;
    let mut prev_lon = 0i64;

    for point in coordinates {
        let lat = (point.lat * PRECISION).round() as i64;
        let lon = (point.lon * PRECISION).round() as i64;
        write_value(&mut encoded, lat - prev_lat);
        write_value(&mut encoded, lon - prev_lon);
        prev_lat = lat;
        prev_lon = lon;
    }

    encoded
}

fn write_value(out: &mut String, delta: i64) {
    let mut value = if delta < 0 {
        !((delta as u64) << 1)
    } else {
        (delta as u64) << 1
    };
    while value >= CONTINUATION_BIT {
        out.push((((value & CHUNK_MASK) | CONTINUATION_BIT) as u8 + CHUNK_OFFSET) as char);
        value >>= 5;
    }
    out.push((value as u8 + CHUNK_OFFSET) as char);
}
