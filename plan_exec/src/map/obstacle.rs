//! # Obstacle
//!
//! Obstacles are axis-aligned boxes described by their centre and half extents, in the local NED
//! frame with altitude positive up.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::MapError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of numeric fields in an obstacle record.
pub const OBSTACLE_RECORD_LEN: usize = 6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A box shaped obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// North position of the box centre
    pub north_m: f64,

    /// East position of the box centre
    pub east_m: f64,

    /// Altitude of the box centre
    pub alt_m: f64,

    /// Half of the box's extent along the north axis
    pub d_north_m: f64,

    /// Half of the box's extent along the east axis
    pub d_east_m: f64,

    /// Half of the box's height
    pub d_alt_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Obstacle {
    pub fn new(
        north_m: f64,
        east_m: f64,
        alt_m: f64,
        d_north_m: f64,
        d_east_m: f64,
        d_alt_m: f64,
    ) -> Self {
        Self {
            north_m,
            east_m,
            alt_m,
            d_north_m,
            d_east_m,
            d_alt_m,
        }
    }

    /// Build an obstacle from a raw numeric record in the order
    /// `(north, east, alt, d_north, d_east, d_alt)`.
    pub fn from_record(record: &[f64]) -> Result<Self, MapError> {
        match *record {
            [north_m, east_m, alt_m, d_north_m, d_east_m, d_alt_m] => Ok(Self::new(
                north_m, east_m, alt_m, d_north_m, d_east_m, d_alt_m,
            )),
            _ => Err(MapError::InvalidRecordLength(record.len())),
        }
    }

    /// Checks the obstacle describes a real box, returning the reason it doesn't if not.
    pub fn validate(&self) -> Result<(), &'static str> {
        let fields = [
            self.north_m,
            self.east_m,
            self.alt_m,
            self.d_north_m,
            self.d_east_m,
            self.d_alt_m,
        ];

        if fields.iter().any(|f| !f.is_finite()) {
            return Err("all fields must be finite");
        }

        if self.d_north_m < 0.0 || self.d_east_m < 0.0 || self.d_alt_m < 0.0 {
            return Err("half extents must be non-negative");
        }

        Ok(())
    }

    /// Altitude of the top surface of the box.
    pub fn top_m(&self) -> f64 {
        self.alt_m + self.d_alt_m
    }

    /// Returns true if the obstacle, grown by the safety distance, reaches above the given
    /// altitude and so must be rasterised into that altitude's grid.
    pub fn intrudes(&self, target_altitude_m: f64, safety_distance_m: f64) -> bool {
        self.top_m() + safety_distance_m > target_altitude_m
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_record() -> Result<(), MapError> {
        let obs = Obstacle::from_record(&[-310.2, -439.3, 85.5, 5.0, 5.0, 85.5])?;

        assert_eq!(obs.north_m, -310.2);
        assert_eq!(obs.east_m, -439.3);
        assert_eq!(obs.top_m(), 171.0);

        assert_eq!(
            Obstacle::from_record(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            Err(MapError::InvalidRecordLength(5))
        );
        assert_eq!(
            Obstacle::from_record(&[1.0; 7]),
            Err(MapError::InvalidRecordLength(7))
        );

        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(Obstacle::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0).validate().is_ok());
        assert!(Obstacle::new(f64::NAN, 0.0, 0.0, 1.0, 1.0, 1.0)
            .validate()
            .is_err());
        assert!(Obstacle::new(0.0, 0.0, 0.0, 1.0, -1.0, 1.0)
            .validate()
            .is_err());
        assert!(Obstacle::new(0.0, 0.0, f64::INFINITY, 1.0, 1.0, 1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_intrudes() {
        // Top surface at 4 m
        let obs = Obstacle::new(0.0, 0.0, 2.0, 1.0, 1.0, 2.0);

        assert!(obs.intrudes(3.0, 0.0));
        assert!(!obs.intrudes(4.0, 0.0));
        assert!(obs.intrudes(4.0, 0.5));
        assert!(!obs.intrudes(10.0, 5.0));
        assert!(obs.intrudes(10.0, 6.5));
    }
}
