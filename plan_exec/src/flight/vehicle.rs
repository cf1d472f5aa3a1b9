//! # Vehicle interface
//!
//! Abstraction over the connection to a vehicle, allowing the [`FlightMgr`](super::FlightMgr) to
//! be driven by a real autopilot link or by the [`SimVehicle`](super::SimVehicle).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::loader::GeodeticHome;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Snapshot of the vehicle's state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Position in the local north-east-down frame
    pub local_position_m: Vector3<f64>,

    /// Velocity in the local north-east-down frame
    pub local_velocity_m_s: Vector3<f64>,

    /// Altitude above the geodetic reference
    pub global_alt_m: f64,

    /// Altitude of the home position above the geodetic reference
    pub home_alt_m: f64,

    pub armed: bool,

    /// True if the vehicle is accepting commands from this software
    pub guided: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VehicleError {
    #[error("The vehicle rejected the {0} command: {1}")]
    CommandRejected(&'static str, &'static str),

    #[error("The connection to the vehicle has been closed")]
    Disconnected,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Commands which can be sent to a vehicle.
pub trait Vehicle {
    fn telemetry(&self) -> Telemetry;

    fn arm(&mut self) -> Result<(), VehicleError>;

    fn disarm(&mut self) -> Result<(), VehicleError>;

    /// Switch the vehicle into guided mode, so that it follows commands from this software.
    fn take_control(&mut self) -> Result<(), VehicleError>;

    fn release_control(&mut self) -> Result<(), VehicleError>;

    fn takeoff(&mut self, altitude_m: f64) -> Result<(), VehicleError>;

    fn land(&mut self) -> Result<(), VehicleError>;

    /// Fly to the given local position, facing the given heading.
    fn cmd_position(
        &mut self,
        north_m: f64,
        east_m: f64,
        altitude_m: f64,
        heading_rad: f64,
    ) -> Result<(), VehicleError>;

    fn set_home_position(&mut self, home: GeodeticHome) -> Result<(), VehicleError>;

    /// Close the connection to the vehicle.
    fn stop(&mut self);
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Telemetry {
    /// Altitude above the local origin.
    pub fn altitude_m(&self) -> f64 {
        -self.local_position_m.z
    }

    pub fn horizontal_position_m(&self) -> Vector2<f64> {
        self.local_position_m.xy()
    }

    pub fn horizontal_speed_m_s(&self) -> f64 {
        self.local_velocity_m_s.xy().norm()
    }

    /// Altitude above the home position.
    pub fn alt_above_home_m(&self) -> f64 {
        self.global_alt_m - self.home_alt_m
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            local_position_m: Vector3::zeros(),
            local_velocity_m_s: Vector3::zeros(),
            global_alt_m: 0.0,
            home_alt_m: 0.0,
            armed: false,
            guided: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_telemetry_accessors() {
        let tel = Telemetry {
            local_position_m: Vector3::new(3.0, 4.0, -5.0),
            local_velocity_m_s: Vector3::new(0.6, -0.8, 2.0),
            global_alt_m: 12.0,
            home_alt_m: 7.0,
            ..Default::default()
        };

        assert_eq!(tel.altitude_m(), 5.0);
        assert_eq!(tel.horizontal_position_m(), Vector2::new(3.0, 4.0));
        assert!((tel.horizontal_speed_m_s() - 1.0).abs() < 1e-12);
        assert_eq!(tel.alt_above_home_m(), 5.0);
    }
}
