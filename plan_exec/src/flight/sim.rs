//! # Simulated vehicle
//!
//! A kinematic point mass which climbs and descends at a fixed rate and flies towards commanded
//! positions at a capped horizontal speed. There is no attitude or wind model.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, trace, warn};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::loader::GeodeticHome;

use super::{FlightError, FlightEvent, FlightMgr, Telemetry, Vehicle, VehicleError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Length of one simulation step
    pub time_step_s: f64,

    /// Vertical speed while climbing or descending
    pub climb_rate_m_s: f64,

    /// Maximum horizontal speed
    pub max_speed_m_s: f64,

    /// Initial local `(north, east)` position
    pub start_north_m: f64,
    pub start_east_m: f64,

    /// Maximum altitude above home at which the vehicle may be disarmed
    pub disarm_alt_max_m: f64,
}

#[derive(Debug, Clone)]
pub struct SimVehicle {
    params: SimParams,

    /// Position in the local north-east-down frame
    position_m: Vector3<f64>,

    /// Velocity over the last step
    velocity_m_s: Vector3<f64>,

    armed: bool,
    guided: bool,
    connected: bool,

    home: Option<GeodeticHome>,

    mode: SimMode,

    /// Highest altitude reached so far
    max_alt_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum SimMode {
    Idle,
    Takeoff { alt_m: f64 },
    Goto { north_m: f64, east_m: f64, alt_m: f64 },
    Land,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            time_step_s: 0.1,
            climb_rate_m_s: 2.0,
            max_speed_m_s: 5.0,
            start_north_m: 0.0,
            start_east_m: 0.0,
            disarm_alt_max_m: 0.1,
        }
    }
}

impl SimVehicle {
    pub fn new(params: SimParams) -> Self {
        Self {
            position_m: Vector3::new(params.start_north_m, params.start_east_m, 0.0),
            velocity_m_s: Vector3::zeros(),
            armed: false,
            guided: false,
            connected: true,
            home: None,
            mode: SimMode::Idle,
            max_alt_m: 0.0,
            params,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn max_alt_m(&self) -> f64 {
        self.max_alt_m
    }

    pub fn home(&self) -> Option<GeodeticHome> {
        self.home
    }

    /// Advance the simulation by one time step.
    pub fn step(&mut self) {
        let dt = self.params.time_step_s;
        let previous = self.position_m;

        let (horizontal_target, alt_target) = match self.mode {
            SimMode::Idle => (None, None),
            SimMode::Takeoff { alt_m } => (None, Some(alt_m)),
            SimMode::Goto {
                north_m,
                east_m,
                alt_m,
            } => (Some(Vector2::new(north_m, east_m)), Some(alt_m)),
            SimMode::Land => (None, Some(0.0)),
        };

        if let Some(target) = horizontal_target {
            let to_target = target - self.position_m.xy();
            let max_step = self.params.max_speed_m_s * dt;
            let step = if to_target.norm() <= max_step {
                to_target
            } else {
                to_target.normalize() * max_step
            };

            self.position_m.x += step.x;
            self.position_m.y += step.y;
        }

        if let Some(alt_m) = alt_target {
            let to_target = alt_m - self.alt_m();
            let max_step = self.params.climb_rate_m_s * dt;
            let step = to_target.max(-max_step).min(max_step);

            self.position_m.z -= step;
        }

        if self.mode == SimMode::Land && self.position_m.z >= 0.0 {
            self.position_m.z = 0.0;
            self.mode = SimMode::Idle;
            debug!("Sim vehicle touched down");
        }

        self.velocity_m_s = (self.position_m - previous) / dt;
        self.max_alt_m = self.max_alt_m.max(self.alt_m());

        trace!(
            "Sim position {:?}, velocity {:?}",
            self.position_m.as_slice(),
            self.velocity_m_s.as_slice()
        );
    }

    fn alt_m(&self) -> f64 {
        -self.position_m.z
    }

    fn check_connected(&self, cmd: &'static str) -> Result<(), VehicleError> {
        if self.connected {
            Ok(())
        } else {
            warn!("Sim vehicle received {} after the connection was closed", cmd);
            Err(VehicleError::Disconnected)
        }
    }

    fn check_flying(&self, cmd: &'static str) -> Result<(), VehicleError> {
        self.check_connected(cmd)?;

        if !self.armed {
            return Err(VehicleError::CommandRejected(cmd, "vehicle is not armed"));
        }
        if !self.guided {
            return Err(VehicleError::CommandRejected(cmd, "vehicle is not in guided mode"));
        }

        Ok(())
    }
}

impl Vehicle for SimVehicle {
    fn telemetry(&self) -> Telemetry {
        let home_alt_m = self.home.map(|h| h.alt_m).unwrap_or(0.0);

        Telemetry {
            local_position_m: self.position_m,
            local_velocity_m_s: self.velocity_m_s,
            global_alt_m: home_alt_m + self.alt_m(),
            home_alt_m,
            armed: self.armed,
            guided: self.guided,
        }
    }

    fn arm(&mut self) -> Result<(), VehicleError> {
        self.check_connected("arm")?;
        self.armed = true;
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), VehicleError> {
        self.check_connected("disarm")?;
        if self.alt_m() > self.params.disarm_alt_max_m {
            return Err(VehicleError::CommandRejected("disarm", "vehicle is airborne"));
        }
        self.armed = false;
        self.mode = SimMode::Idle;
        Ok(())
    }

    fn take_control(&mut self) -> Result<(), VehicleError> {
        self.check_connected("take_control")?;
        self.guided = true;
        Ok(())
    }

    fn release_control(&mut self) -> Result<(), VehicleError> {
        self.check_connected("release_control")?;
        self.guided = false;
        Ok(())
    }

    fn takeoff(&mut self, altitude_m: f64) -> Result<(), VehicleError> {
        self.check_flying("takeoff")?;
        self.mode = SimMode::Takeoff { alt_m: altitude_m };
        Ok(())
    }

    fn land(&mut self) -> Result<(), VehicleError> {
        self.check_flying("land")?;
        self.mode = SimMode::Land;
        Ok(())
    }

    fn cmd_position(
        &mut self,
        north_m: f64,
        east_m: f64,
        altitude_m: f64,
        _heading_rad: f64,
    ) -> Result<(), VehicleError> {
        self.check_flying("cmd_position")?;
        self.mode = SimMode::Goto {
            north_m,
            east_m,
            alt_m: altitude_m,
        };
        Ok(())
    }

    fn set_home_position(&mut self, home: GeodeticHome) -> Result<(), VehicleError> {
        self.check_connected("set_home_position")?;
        self.home = Some(home);
        Ok(())
    }

    fn stop(&mut self) {
        info!("Closing sim vehicle connection");
        self.connected = false;
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Fly the mission against the simulated vehicle, returning the number of cycles taken.
///
/// Each cycle steps the simulation once, then passes position, velocity and state events to the
/// manager in that order.
pub fn run_mission(
    mgr: &mut FlightMgr,
    vehicle: &mut SimVehicle,
    max_cycles: usize,
) -> Result<usize, FlightError> {
    for cycle in 0..max_cycles {
        vehicle.step();

        let tel = vehicle.telemetry();
        mgr.handle_event(FlightEvent::LocalPosition(tel), vehicle)?;
        mgr.handle_event(FlightEvent::LocalVelocity(tel), vehicle)?;
        mgr.handle_event(FlightEvent::State(vehicle.telemetry()), vehicle)?;

        if !mgr.in_mission() {
            info!("Mission complete after {} cycles", cycle + 1);
            return Ok(cycle + 1);
        }
    }

    Err(FlightError::CycleLimitReached(max_cycles))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
