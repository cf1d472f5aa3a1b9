//! # Flight manager
//!
//! This module implements the [`FlightMgr`] state machine, which takes a vehicle from the ground,
//! through the planned waypoints and back down again. The machine is broken down into a number of
//! states:
//!
//! - `Manual` - The vehicle is not under the control of this software.
//! - `Arming` - Arm and guided mode have been requested, waiting for the vehicle to arm.
//! - `Planning` - The mission has been planned, waiting for the next state update to take off.
//! - `Takeoff` - Climbing to the target altitude.
//! - `Waypoint` - Flying towards the current waypoint.
//! - `Landing` - Descending after reaching the final waypoint.
//! - `Disarming` - Disarm and manual mode have been requested, waiting for the vehicle to comply.
//!
//! The machine is event driven. Each [`FlightEvent`] carries a [`Telemetry`] snapshot, and commands
//! are sent to the vehicle through the [`Vehicle`] trait.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod sim;
mod vehicle;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use sim::{run_mission, SimParams, SimVehicle};
pub use vehicle::{Telemetry, Vehicle, VehicleError};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::VecDeque, fmt::Display};

use log::{debug, error, info};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::{
    loader::ColliderData,
    mission::{MissionError, MissionPlan, MissionPlanner, Waypoint},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightParams {
    /// Fraction of the target altitude at which takeoff is considered complete
    pub takeoff_alt_fraction: f64,

    /// Horizontal distance to a waypoint at which it is considered reached
    pub waypoint_radius_m: f64,

    /// Maximum horizontal speed at which landing may begin
    pub landing_speed_max_m_s: f64,

    /// Maximum altitude above home at which the vehicle is considered landed
    pub landed_alt_max_m: f64,

    /// Maximum local down position at which the vehicle is considered landed
    pub landed_down_max_m: f64,
}

/// Flight manager
///
/// Holds the mission to fly and the state of the flight.
pub struct FlightMgr {
    params: FlightParams,

    planner: MissionPlanner,

    colliders: ColliderData,

    /// Local `(north, east)` position of the mission goal
    goal_local_m: Vector2<f64>,

    state: FlightState,

    /// False once the vehicle has been handed back after the mission
    in_mission: bool,

    target: Option<Waypoint>,

    /// Waypoints not yet commanded
    waypoints: VecDeque<Waypoint>,

    plan: Option<MissionPlan>,

    /// The reason planning failed, if it did
    planning_error: Option<MissionError>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightState {
    Manual,
    Arming,
    Planning,
    Takeoff,
    Waypoint,
    Landing,
    Disarming,
}

/// Events which drive the flight manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlightEvent {
    LocalPosition(Telemetry),
    LocalVelocity(Telemetry),
    State(Telemetry),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlightError {
    #[error("Vehicle error: {0}")]
    VehicleError(#[from] VehicleError),

    #[error("The mission did not finish within {0} cycles")]
    CycleLimitReached(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for FlightParams {
    fn default() -> Self {
        Self {
            takeoff_alt_fraction: 0.95,
            waypoint_radius_m: 1.0,
            landing_speed_max_m_s: 1.0,
            landed_alt_max_m: 0.1,
            landed_down_max_m: 0.01,
        }
    }
}

impl FlightMgr {
    pub fn new(
        params: FlightParams,
        planner: MissionPlanner,
        colliders: ColliderData,
        goal_local_m: Vector2<f64>,
    ) -> Self {
        Self {
            params,
            planner,
            colliders,
            goal_local_m,
            state: FlightState::Manual,
            in_mission: true,
            target: None,
            waypoints: VecDeque::new(),
            plan: None,
            planning_error: None,
        }
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    /// True until the vehicle has landed, disarmed and been handed back.
    pub fn in_mission(&self) -> bool {
        self.in_mission
    }

    pub fn plan(&self) -> Option<&MissionPlan> {
        self.plan.as_ref()
    }

    pub fn planning_error(&self) -> Option<&MissionError> {
        self.planning_error.as_ref()
    }

    /// The waypoint currently being flown to.
    pub fn target(&self) -> Option<&Waypoint> {
        self.target.as_ref()
    }

    /// Process a single event, sending any required commands to the vehicle.
    pub fn handle_event<V: Vehicle>(
        &mut self,
        event: FlightEvent,
        vehicle: &mut V,
    ) -> Result<(), FlightError> {
        match event {
            FlightEvent::LocalPosition(tel) => self.on_local_position(&tel, vehicle),
            FlightEvent::LocalVelocity(tel) => self.on_local_velocity(&tel, vehicle),
            FlightEvent::State(tel) => self.on_state(&tel, vehicle),
        }
    }

    fn on_local_position<V: Vehicle>(
        &mut self,
        tel: &Telemetry,
        vehicle: &mut V,
    ) -> Result<(), FlightError> {
        match self.state {
            FlightState::Takeoff => {
                let target_alt_m = self.planner.params().target_altitude_m;
                if tel.altitude_m() > self.params.takeoff_alt_fraction * target_alt_m {
                    self.waypoint_transition(vehicle)?;
                }
            }
            FlightState::Waypoint => {
                let reached = match self.target {
                    Some(ref t) => {
                        t.horizontal_dist_m(tel.horizontal_position_m())
                            < self.params.waypoint_radius_m
                    }
                    None => true,
                };

                if reached {
                    if !self.waypoints.is_empty() {
                        self.waypoint_transition(vehicle)?;
                    } else if tel.horizontal_speed_m_s() < self.params.landing_speed_max_m_s {
                        self.landing_transition(vehicle)?;
                    }
                }
            }
            _ => (),
        }

        Ok(())
    }

    fn on_local_velocity<V: Vehicle>(
        &mut self,
        tel: &Telemetry,
        vehicle: &mut V,
    ) -> Result<(), FlightError> {
        if self.state == FlightState::Landing
            && tel.alt_above_home_m() < self.params.landed_alt_max_m
            && tel.local_position_m.z.abs() < self.params.landed_down_max_m
        {
            self.disarming_transition(vehicle)?;
        }

        Ok(())
    }

    fn on_state<V: Vehicle>(&mut self, tel: &Telemetry, vehicle: &mut V) -> Result<(), FlightError> {
        if !self.in_mission {
            return Ok(());
        }

        match self.state {
            FlightState::Manual => self.arming_transition(vehicle)?,
            FlightState::Arming if tel.armed => self.plan_path(tel, vehicle)?,
            FlightState::Planning => self.takeoff_transition(vehicle)?,
            FlightState::Disarming if !tel.armed && !tel.guided => self.manual_transition(vehicle),
            _ => (),
        }

        Ok(())
    }

    fn set_state(&mut self, state: FlightState) {
        self.state = state;
        info!("FlightMgr state change to: {}", state);
    }

    fn arming_transition<V: Vehicle>(&mut self, vehicle: &mut V) -> Result<(), FlightError> {
        self.set_state(FlightState::Arming);
        vehicle.arm()?;
        vehicle.take_control()?;
        Ok(())
    }

    /// Plan the mission from the current position, moving to `Planning` on success or abandoning
    /// the mission on failure.
    fn plan_path<V: Vehicle>(&mut self, tel: &Telemetry, vehicle: &mut V) -> Result<(), FlightError> {
        self.set_state(FlightState::Planning);

        vehicle.set_home_position(self.colliders.home)?;

        match self.planner.plan(
            &self.colliders.obstacles,
            tel.horizontal_position_m(),
            self.goal_local_m,
        ) {
            Ok(plan) => {
                info!("Mission planned with {} waypoints", plan.waypoints.len());
                for wp in plan.waypoints.iter() {
                    debug!("Waypoint {:?}", wp.as_array());
                }

                self.waypoints = plan.waypoints.iter().copied().collect();
                self.plan = Some(plan);
                Ok(())
            }
            Err(e) => {
                error!("Planning failed, abandoning mission: {}", e);
                self.planning_error = Some(e);
                self.disarming_transition(vehicle)
            }
        }
    }

    fn takeoff_transition<V: Vehicle>(&mut self, vehicle: &mut V) -> Result<(), FlightError> {
        self.set_state(FlightState::Takeoff);
        vehicle.takeoff(self.planner.params().target_altitude_m)?;
        Ok(())
    }

    fn waypoint_transition<V: Vehicle>(&mut self, vehicle: &mut V) -> Result<(), FlightError> {
        let wp = match self.waypoints.pop_front() {
            Some(wp) => wp,
            None => {
                // Nothing left to fly to
                self.target = None;
                return self.landing_transition(vehicle);
            }
        };

        self.set_state(FlightState::Waypoint);
        info!("Target position {:?}", wp.as_array());
        vehicle.cmd_position(wp.north_m, wp.east_m, wp.alt_m, wp.heading_rad)?;
        self.target = Some(wp);

        Ok(())
    }

    fn landing_transition<V: Vehicle>(&mut self, vehicle: &mut V) -> Result<(), FlightError> {
        self.set_state(FlightState::Landing);
        vehicle.land()?;
        Ok(())
    }

    fn disarming_transition<V: Vehicle>(&mut self, vehicle: &mut V) -> Result<(), FlightError> {
        self.set_state(FlightState::Disarming);
        vehicle.disarm()?;
        vehicle.release_control()?;
        Ok(())
    }

    fn manual_transition<V: Vehicle>(&mut self, vehicle: &mut V) {
        self.set_state(FlightState::Manual);
        vehicle.stop();
        self.in_mission = false;
    }
}

impl Display for FlightState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightState::Manual => write!(f, "FlightState::Manual"),
            FlightState::Arming => write!(f, "FlightState::Arming"),
            FlightState::Planning => write!(f, "FlightState::Planning"),
            FlightState::Takeoff => write!(f, "FlightState::Takeoff"),
            FlightState::Waypoint => write!(f, "FlightState::Waypoint"),
            FlightState::Landing => write!(f, "FlightState::Landing"),
            FlightState::Disarming => write!(f, "FlightState::Disarming"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
