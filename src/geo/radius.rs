//! Accepted chat radii and their geohash precision bands

use crate::error::{Error, Result};

/// Chat radius chosen by the participant
///
/// Only these four values are accepted. Each maps to the geohash precision
/// whose cell is the smallest one still spanning the radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Radius {
    /// 100 m, precision 7 (~153m x 153m cells)
    Meters100,
    /// 500 m, precision 6 (~1.2km x 0.6km cells)
    Meters500,
    /// 1 km, precision 5 (~4.9km x 4.9km cells)
    #[default]
    Meters1000,
    /// 5 km, precision 4 (~39km x 19.5km cells)
    Meters5000,
}

impl Radius {
    pub const ALL: [Radius; 4] = [
        Radius::Meters100,
        Radius::Meters500,
        Radius::Meters1000,
        Radius::Meters5000,
    ];

    /// Parse a radius given in meters
    pub fn from_meters(meters: u32) -> Result<Self> {
        match meters {
            100 => Ok(Radius::Meters100),
            500 => Ok(Radius::Meters500),
            1000 => Ok(Radius::Meters1000),
            5000 => Ok(Radius::Meters5000),
            other => Err(Error::InvalidRadius(other)),
        }
    }

    pub fn meters(&self) -> u32 {
        match self {
            Radius::Meters100 => 100,
            Radius::Meters500 => 500,
            Radius::Meters1000 => 1000,
            Radius::Meters5000 => 5000,
        }
    }

    /// Geohash precision used for buckets at this radius
    pub fn precision(&self) -> usize {
        match self {
            Radius::Meters100 => 7,
            Radius::Meters500 => 6,
            Radius::Meters1000 => 5,
            Radius::Meters5000 => 4,
        }
    }
}

impl std::fmt::Display for Radius {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.meters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_meters() {
        for radius in Radius::ALL {
            assert_eq!(Radius::from_meters(radius.meters()).unwrap(), radius);
        }
        assert_eq!(Radius::from_meters(250), Err(Error::InvalidRadius(250)));
        assert_eq!(Radius::from_meters(0), Err(Error::InvalidRadius(0)));
    }

    #[test]
    fn test_larger_radius_coarser_precision() {
        let precisions: Vec<usize> = Radius::ALL.iter().map(|r| r.precision()).collect();
        assert_eq!(precisions, vec![7, 6, 5, 4]);
    }

    #[test]
    fn test_default_is_one_kilometer() {
        assert_eq!(Radius::default(), Radius::Meters1000);
        assert_eq!(Radius::default().to_string(), "1000m");
    }
}
