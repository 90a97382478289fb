//! Coordinate to bucket mapping

use crate::error::Result;

use super::coordinate::Coordinate;
use super::cell::{self, BucketKey};
use super::radius::Radius;

/// Maps coordinates to spatial buckets
///
/// Stateless; all methods are pure. Kept as a type so the registry can hold
/// one next to its other collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoIndex;

impl GeoIndex {
    pub fn new() -> Self {
        Self
    }

    /// Bucket for a coordinate at an explicit precision
    pub fn bucket_for(&self, coordinate: &Coordinate, precision: usize) -> Result<BucketKey> {
        cell::encode(coordinate, precision)
    }

    /// Bucket for a coordinate at the precision band of `radius`
    pub fn bucket_for_radius(&self, coordinate: &Coordinate, radius: Radius) -> Result<BucketKey> {
        cell::encode(coordinate, radius.precision())
    }

    /// The bucket itself plus its (up to) 8 adjacent buckets
    pub fn neighbors(&self, key: &BucketKey) -> Result<Vec<BucketKey>> {
        cell::neighbors(key)
    }

    /// Whether `coordinate` lies in `key` or one of its neighbors
    pub fn is_nearby(&self, key: &BucketKey, coordinate: &Coordinate) -> Result<bool> {
        let candidate = cell::encode(coordinate, key.precision())?;
        Ok(self.neighbors(key)?.contains(&candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_for_radius_uses_band() {
        let index = GeoIndex::new();
        let paris = Coordinate::new(48.8566, 2.3522).unwrap();

        assert_eq!(
            index.bucket_for_radius(&paris, Radius::Meters5000).unwrap().as_str(),
            "u09t"
        );
        assert_eq!(
            index.bucket_for_radius(&paris, Radius::Meters100).unwrap().as_str(),
            "u09tvw0"
        );
    }

    #[test]
    fn test_bucket_for_matches_radius_precision() {
        let index = GeoIndex::new();
        let c = Coordinate::new(51.5074, -0.1278).unwrap();

        for radius in Radius::ALL {
            assert_eq!(
                index.bucket_for(&c, radius.precision()).unwrap(),
                index.bucket_for_radius(&c, radius).unwrap()
            );
        }
    }

    #[test]
    fn test_is_nearby() {
        let index = GeoIndex::new();
        let key = BucketKey::parse("u09t").unwrap();

        // same cell
        assert!(index.is_nearby(&key, &Coordinate::new(48.80, 2.25).unwrap()).unwrap());
        // u09w is the northern neighbor
        assert!(index.is_nearby(&key, &Coordinate::new(48.95, 2.2).unwrap()).unwrap());
        // London is far away
        assert!(!index.is_nearby(&key, &Coordinate::new(51.5074, -0.1278).unwrap()).unwrap());
    }
}
