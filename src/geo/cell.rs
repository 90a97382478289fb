//! Geohash cells
//!
//! Bucket keys are standard base32 geohashes, encoded and decoded by the
//! `geohash` crate. Neighbors are found by stepping one cell span from the
//! decoded cell's center.

use std::sync::Arc;

use geohash::Coord;

use crate::error::{Error, Result};

use super::coordinate::Coordinate;

/// Longest supported key (about 3.7cm x 1.9cm cells)
pub const MAX_PRECISION: usize = 12;

/// Spatial bucket key (a geohash string)
///
/// Cheap to clone; it is embedded in every group id and message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey(Arc<str>);

impl BucketKey {
    /// Parse and validate a geohash string
    pub fn parse(key: &str) -> Result<Self> {
        if key.is_empty() || key.len() > MAX_PRECISION {
            return Err(Error::InvalidBucketKey(key.to_string()));
        }
        geohash::decode_bbox(key).map_err(|_| Error::InvalidBucketKey(key.to_string()))?;
        Ok(Self(Arc::from(key)))
    }

    /// Wrap a string already known to be a valid geohash
    #[cfg(test)]
    pub(crate) fn from_raw(key: &str) -> Self {
        Self(Arc::from(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters, i.e. the precision it was encoded at
    pub fn precision(&self) -> usize {
        self.0.len()
    }

    fn invalid(&self) -> Error {
        Error::InvalidBucketKey(self.0.to_string())
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Area covered by a geohash cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&coordinate.latitude())
            && (self.min_lon..=self.max_lon).contains(&coordinate.longitude())
    }
}

/// Encode a coordinate at the given precision
pub fn encode(coordinate: &Coordinate, precision: usize) -> Result<BucketKey> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(Error::InvalidPrecision(precision));
    }

    let point = Coord {
        x: coordinate.longitude(),
        y: coordinate.latitude(),
    };
    let key = geohash::encode(point, precision).map_err(|_| Error::InvalidCoordinate {
        latitude: coordinate.latitude(),
        longitude: coordinate.longitude(),
    })?;

    Ok(BucketKey(Arc::from(key)))
}

/// Decode a key into the cell it covers
pub fn bounding_box(key: &BucketKey) -> Result<BoundingBox> {
    let rect = geohash::decode_bbox(key.as_str()).map_err(|_| key.invalid())?;
    Ok(BoundingBox {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lon: rect.min().x,
        max_lon: rect.max().x,
    })
}

/// The 8 surrounding cells plus `key` itself
///
/// Order is row by row from north-west to south-east. Longitude wraps at the
/// antimeridian; rows past a pole are omitted.
pub fn neighbors(key: &BucketKey) -> Result<Vec<BucketKey>> {
    let bbox = bounding_box(key)?;
    let (center_lat, center_lon) = bbox.center();
    let mut out: Vec<BucketKey> = Vec::with_capacity(9);

    for dy in [1.0, 0.0, -1.0] {
        let lat = center_lat + dy * bbox.lat_span();
        if !(-90.0..=90.0).contains(&lat) {
            continue;
        }
        for dx in [-1.0, 0.0, 1.0] {
            let mut lon = center_lon + dx * bbox.lon_span();
            if lon > 180.0 {
                lon -= 360.0;
            } else if lon < -180.0 {
                lon += 360.0;
            }
            let cell = geohash::encode(Coord { x: lon, y: lat }, key.precision())
                .map_err(|_| key.invalid())?;
            // At precision 1 the wrapped neighbors can coincide
            if !out.iter().any(|k| k.as_str() == cell) {
                out.push(BucketKey(Arc::from(cell)));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn keys(v: &[BucketKey]) -> Vec<&str> {
        v.iter().map(|k| k.as_str()).collect()
    }

    #[test]
    fn test_encode_known_values() {
        let c = coord(57.64911, 10.40744);
        assert_eq!(encode(&c, 11).unwrap().as_str(), "u4pruydqqvj");

        let paris = coord(48.8566, 2.3522);
        assert_eq!(encode(&paris, 4).unwrap().as_str(), "u09t");
        assert_eq!(encode(&paris, 7).unwrap().as_str(), "u09tvw0");

        let london = coord(51.5074, -0.1278);
        assert_eq!(encode(&london, 5).unwrap().as_str(), "gcpvj");
    }

    #[test]
    fn test_encode_corners() {
        assert_eq!(encode(&coord(0.001, 0.001), 4).unwrap().as_str(), "s000");
        assert_eq!(encode(&coord(-0.001, -0.001), 4).unwrap().as_str(), "7zzz");
        assert_eq!(encode(&coord(89.99, 179.99), 4).unwrap().as_str(), "zzzz");
        assert_eq!(encode(&coord(-89.99, -179.99), 4).unwrap().as_str(), "0000");
    }

    #[test]
    fn test_encode_deterministic() {
        let c = coord(48.86, 2.35);
        for precision in 1..=MAX_PRECISION {
            let a = encode(&c, precision).unwrap();
            let b = encode(&c, precision).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.precision(), precision);
        }
    }

    #[test]
    fn test_encode_invalid_precision() {
        let c = coord(0.0, 0.0);
        assert_eq!(encode(&c, 0), Err(Error::InvalidPrecision(0)));
        assert_eq!(encode(&c, 13), Err(Error::InvalidPrecision(13)));
    }

    #[test]
    fn test_shorter_key_is_prefix() {
        let c = coord(48.95, 2.2);
        let long = encode(&c, 9).unwrap();
        let short = encode(&c, 4).unwrap();
        assert!(long.as_str().starts_with(short.as_str()));
    }

    #[test]
    fn test_bounding_box_contains_source() {
        let c = coord(48.8566, 2.3522);
        let key = encode(&c, 4).unwrap();
        let bbox = bounding_box(&key).unwrap();

        assert!(bbox.contains(&c));
        assert_eq!(bbox.min_lat, 48.69140625);
        assert_eq!(bbox.max_lat, 48.8671875);
        assert_eq!(bbox.min_lon, 2.109375);
        assert_eq!(bbox.max_lon, 2.4609375);
    }

    #[test]
    fn test_neighbors_known_cell() {
        let key = BucketKey::parse("ezs42").unwrap();
        let n = neighbors(&key).unwrap();
        assert_eq!(
            keys(&n),
            vec!["ezefx", "ezs48", "ezs49", "ezefr", "ezs42", "ezs43", "ezefp", "ezs40", "ezs41"]
        );
    }

    #[test]
    fn test_neighbors_around_paris() {
        let key = BucketKey::parse("u09t").unwrap();
        let n = neighbors(&key).unwrap();
        assert_eq!(
            keys(&n),
            vec!["u09q", "u09w", "u09y", "u09m", "u09t", "u09v", "u09k", "u09s", "u09u"]
        );
    }

    #[test]
    fn test_neighbors_wrap_antimeridian() {
        // s000 sits on the equator/prime meridian; 7zzz, kpbp and friends are
        // across both lines
        let n = neighbors(&BucketKey::parse("s000").unwrap()).unwrap();
        assert_eq!(n.len(), 9);
        assert!(keys(&n).contains(&"7zzz"));

        // zzzz touches the north pole and the antimeridian
        let n = neighbors(&BucketKey::parse("zzzz").unwrap()).unwrap();
        assert_eq!(
            keys(&n),
            vec!["zzzx", "zzzz", "bpbp", "zzzw", "zzzy", "bpbn"]
        );
    }

    #[test]
    fn test_neighbors_reject_bad_key() {
        let bad = BucketKey::from_raw("u09a");
        assert_eq!(
            neighbors(&bad),
            Err(Error::InvalidBucketKey("u09a".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(BucketKey::parse("").is_err());
        assert!(BucketKey::parse("u09a").is_err()); // 'a' is not in the alphabet
        assert!(BucketKey::parse("u09tvw0f6u09t").is_err()); // 13 chars
        assert!(BucketKey::parse("u09t").is_ok());
    }
}
